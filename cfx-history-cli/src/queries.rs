//! Turn configuration sections into library filters and date generators

use crate::config::{
    DatesConfig, FieldFilterConfig, LibrarySection, QueryConfig, RoleAtDateConfig, WhitelistConfig,
};
use anyhow::{bail, Context, Result};
use cfx_history::{
    CompositeFilter, ConstantIntervalGenerator, DatesGenerator, Decoded, DecreasingIntervalGenerator,
    EntityField, FieldFilter, FieldValue, FixedListGenerator, Role, RoleAtDateFilter, StaticFilter, Step,
    WhitelistFilter,
};

pub fn field_filter(config: &FieldFilterConfig) -> Result<FieldFilter> {
    let field: EntityField = config.field.parse()?;

    let parse_all = |texts: &[String]| -> Result<Vec<FieldValue>> {
        texts
            .iter()
            .map(|text| field.parse_value(text).map_err(Into::into))
            .collect()
    };

    let filter = FieldFilter::builder(field)
        .accepted_values(parse_all(&config.accepted)?)
        .forbidden_values(parse_all(&config.forbidden)?)
        .accepted_substrings(config.contains.iter().cloned())
        .forbidden_substrings(config.not_contains.iter().cloned())
        .build()
        .with_context(|| format!("Invalid filter on field '{}'", config.field))?;
    Ok(filter)
}

/// Whitelist from the configured ids and/or file (ids from both are combined)
pub fn whitelist(config: &WhitelistConfig) -> Result<WhitelistFilter> {
    let mut ids = config.ids.clone();
    if let Some(path) = &config.file {
        let from_file = WhitelistFilter::from_file(path)?;
        if ids.is_empty() {
            return Ok(from_file);
        }
        ids.extend(from_file.ids().iter().cloned());
    }
    Ok(WhitelistFilter::from_ids(ids))
}

/// Static filters applied while building the library
pub fn library_filters(section: &LibrarySection) -> Result<Vec<Box<dyn StaticFilter>>> {
    let mut filters: Vec<Box<dyn StaticFilter>> = Vec::new();
    if let Some(config) = &section.whitelist {
        filters.push(Box::new(whitelist(config)?));
    }
    for config in &section.fields {
        filters.push(Box::new(field_filter(config)?));
    }
    for config in &section.role_at {
        filters.push(Box::new(role_at_date_filter(config)?));
    }
    Ok(filters)
}

fn parse_role(text: &str) -> Result<Role> {
    match Role::decode(text) {
        Decoded::Known(role) => Ok(role),
        Decoded::Unrecognized(raw) => bail!("Unknown role '{}'", raw),
    }
}

fn parse_roles(texts: &[String]) -> Result<Vec<Role>> {
    texts.iter().map(|text| parse_role(text)).collect()
}

pub fn role_at_date_filter(config: &RoleAtDateConfig) -> Result<RoleAtDateFilter> {
    if config.roles.is_empty() {
        bail!("Role filter at {} has no roles", config.date);
    }
    let roles = parse_roles(&config.roles)
        .with_context(|| format!("Invalid roles for role filter at {}", config.date))?;
    Ok(RoleAtDateFilter::new(config.date, roles))
}

pub fn composite_filter(query: &QueryConfig) -> Result<CompositeFilter> {
    let mut filter = CompositeFilter::new().with_label(&query.name);

    if !query.roles.is_empty() {
        let roles = parse_roles(&query.roles)
            .with_context(|| format!("Invalid roles in query '{}'", query.name))?;
        filter = filter.with_roles(roles);
    }
    for config in &query.fields {
        filter = filter.with_field_filter(field_filter(config)?);
    }
    for config in &query.role_at {
        filter = filter.with_role_at_date(role_at_date_filter(config)?);
    }
    if let Some(config) = &query.whitelist {
        filter = filter.with_whitelist(whitelist(config)?);
    }

    Ok(filter)
}

pub fn dates_generator(config: &DatesConfig) -> Result<Box<dyn DatesGenerator>> {
    let generator: Box<dyn DatesGenerator> = match config {
        DatesConfig::Decreasing => Box::new(DecreasingIntervalGenerator::new()),
        DatesConfig::Constant { months, days } => Box::new(
            ConstantIntervalGenerator::new(Step::new(*months, *days))
                .context("Invalid [dates] section")?,
        ),
        DatesConfig::Fixed { dates } => Box::new(FixedListGenerator::new(dates.clone())),
    };
    Ok(generator)
}
