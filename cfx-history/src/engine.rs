//! Query engine: per-date state counts over a built library
//!
//! A run first discards entities that can never match (their owners never held the
//! searched roles, or no filter's static part accepts them), then samples every
//! timestamp produced by the date generator. Timestamps are independent of each
//! other, so they are sampled on the rayon pool and merged back in order.

use crate::config::EngineConfig;
use crate::dates::{first_of_month, DatesGenerator};
use crate::entity::Entity;
use crate::filters::CompositeFilter;
use crate::library::HistoryLibrary;
use crate::results::{AllResultsPerDates, OneTimestampResult};
use crate::types::{HistoryError, Result, Timestamp};
use crate::vocabulary::{Role, State};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Cooperative cancellation flag, checked before each sampled timestamp
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Outcome of sampling one timestamp, before merging
struct Sample<'a> {
    result: OneTimestampResult,
    matched_ids: Vec<&'a str>,
    found: bool,
}

/// Runs aggregation queries against one library
pub struct QueryEngine<'a> {
    library: &'a HistoryLibrary,
    config: EngineConfig,
    cancellation: CancellationToken,
}

impl<'a> QueryEngine<'a> {
    pub fn new(library: &'a HistoryLibrary) -> Self {
        Self {
            library,
            config: EngineConfig::default(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Builder method: set the engine configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builder method: share a cancellation token with the caller
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Count entity states at every sampled date
    ///
    /// An entity is counted at a date when it matches any of `filters` there (every
    /// entity matches when `filters` is empty) and already exists at that date.
    /// Leading dates sampled before the first counted entity are dropped.
    pub fn gather_state_counts_for_each_date(
        &self,
        filters: &[CompositeFilter],
        dates: &dyn DatesGenerator,
    ) -> Result<AllResultsPerDates> {
        let started = Instant::now();
        let mut results = AllResultsPerDates::new();

        let candidates = self.candidates(filters);
        log::info!("Number of entities to consider: {}", candidates.len());

        let Some(earliest) = candidates
            .iter()
            .map(|entity| entity.earliest_submit_date())
            .min()
        else {
            log::info!("No data");
            return Ok(results);
        };
        log::info!(
            "Earliest submit date among {} entities: {}",
            candidates.len(),
            earliest
        );

        let timestamps = dates.dates_since(first_of_month(earliest));

        let samples: Vec<Sample<'_>> = if self.config.parallel {
            timestamps
                .par_iter()
                .map(|&timestamp| self.sample(&candidates, filters, timestamp))
                .collect::<Result<_>>()?
        } else {
            timestamps
                .iter()
                .map(|&timestamp| self.sample(&candidates, filters, timestamp))
                .collect::<Result<_>>()?
        };

        for sample in samples {
            for id in sample.matched_ids {
                results.add_matched_id(id);
            }
            if sample.found {
                results.mark_match_found();
            }
            if results.at_least_one_match() {
                results.push(sample.result);
            }
        }

        log::info!(
            "{} timestamps sampled, {} kept, {} entities matched in {:?}",
            timestamps.len(),
            results.timestamp_results().len(),
            results.matched_ids().len(),
            started.elapsed()
        );
        Ok(results)
    }

    /// Entities that can match at least one filter at some date
    fn candidates(&self, filters: &[CompositeFilter]) -> Vec<&'a Entity> {
        let entities = self.library.entities();
        if filters.is_empty() {
            return entities.iter().collect();
        }

        let searched_roles: HashSet<Role> = filters
            .iter()
            .filter_map(CompositeFilter::role_filter)
            .flat_map(|role_filter| role_filter.allowed_roles().iter().copied())
            .collect();

        entities
            .iter()
            .filter(|entity| {
                searched_roles.is_empty() || searched_roles.is_subset(entity.all_historical_roles())
            })
            .filter(|entity| filters.iter().any(|filter| filter.match_static(entity)))
            .collect()
    }

    fn sample(
        &self,
        candidates: &[&'a Entity],
        filters: &[CompositeFilter],
        timestamp: Timestamp,
    ) -> Result<Sample<'a>> {
        if self.cancellation.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }

        let mut sample = Sample {
            result: OneTimestampResult::new(timestamp),
            matched_ids: Vec::new(),
            found: false,
        };

        for &entity in candidates {
            let matches =
                filters.is_empty() || filters.iter().any(|filter| filter.matches(entity, timestamp));
            if !matches {
                continue;
            }

            sample.matched_ids.push(entity.id());
            let state = entity.state_at_date(timestamp);
            if state != State::NotCreatedYet {
                sample.result.add_one_result_for_state(state);
                sample.found = true;
            }
        }

        Ok(sample)
    }
}

/// Run one aggregation with the default engine configuration
pub fn gather_state_counts_for_each_date(
    library: &HistoryLibrary,
    filters: &[CompositeFilter],
    dates: &dyn DatesGenerator,
) -> Result<AllResultsPerDates> {
    QueryEngine::new(library).gather_state_counts_for_each_date(filters, dates)
}
