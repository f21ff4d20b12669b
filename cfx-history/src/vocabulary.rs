//! Closed vocabularies: lifecycle states, roles, and the classification enums
//!
//! Every enum decodes from export text through an explicit decode function that
//! returns [`Decoded`]. Unrecognized text never fails: `decode_or_fallback` logs it
//! and returns the enum's designated fallback variant so the record can still be
//! loaded and audited later.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Outcome of decoding a piece of export text into a vocabulary value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    /// The text maps to a known symbolic value
    Known(T),
    /// The text could not be classified; the raw text is kept for auditing
    Unrecognized(String),
}

impl<T> Decoded<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Decoded::Known(_))
    }

    pub fn known(self) -> Option<T> {
        match self {
            Decoded::Known(value) => Some(value),
            Decoded::Unrecognized(_) => None,
        }
    }
}

/// Canonical comparison form of export text: trimmed, upper case, `_` separators
fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $name:ident (fallback $fallback:ident) {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration (and sort) order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Variant used when export text cannot be classified
            pub const FALLBACK: $name = $name::$fallback;

            /// Canonical export text of this value
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }

            /// Decode export text (case-insensitive, spaces and dashes read as `_`)
            pub fn decode(raw: &str) -> Decoded<$name> {
                let wanted = normalize(raw);
                $(
                    if wanted == normalize($text) $(|| wanted == normalize($alias))* {
                        return Decoded::Known($name::$variant);
                    }
                )+
                Decoded::Unrecognized(raw.to_string())
            }

            /// Decode export text, logging and falling back when it is unrecognized
            pub fn decode_or_fallback(raw: &str) -> $name {
                match Self::decode(raw) {
                    Decoded::Known(value) => value,
                    Decoded::Unrecognized(text) => {
                        log::error!(
                            "{} '{}' not supported, using {}",
                            stringify!($name),
                            text,
                            Self::FALLBACK
                        );
                        Self::FALLBACK
                    }
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self::decode_or_fallback(&raw)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Ok(Self::from(raw))
            }
        }
    };
}

vocabulary! {
    /// Lifecycle state of a change request, including the two sentinels
    pub enum State (fallback Unknown) {
        /// No transition has happened yet at the query date
        NotCreatedYet => "NOT_CREATED_YET",
        NoValue => "NO_VALUE",
        Submitted => "SUBMITTED"
            | "In_Analysis" | "Opened" | "Qualifying" | "InConsultation" | "InAnalysis" | "Cloning",
        Analysed => "ANALYSED" | "WaitingAssignment",
        Assigned => "ASSIGNED" | "InResolution",
        Resolved => "RESOLVED" | "InVerification" | "FunctionalValidation",
        Rejected => "REJECTED" | "Duplicate",
        Postponed => "POSTPONED" | "WaitingDecision",
        Verified => "VERIFIED",
        Validated => "VALIDATED" | "SafetyValidation",
        /// A transition happened, to a value that could not be classified
        Unknown => "UNKNOWN",
        Closed => "CLOSED",
    }
}

vocabulary! {
    /// Organizational subsystem an owner belongs to
    pub enum Role (fallback Tbd) {
        Sw => "SW",
        Ats => "ATS",
        Ssi => "SSI",
        CocDe => "COC_DE",
        Saf => "SAF",
        TcmTc => "TCM_TC",
        Subsys => "SUBSYS",
        Tracy => "TRACY",
        Qualite => "QUALITE",
        Systeme => "SYSTEME",
        Rivs => "RIVS",
        AtsEviden => "ATS_EVIDEN",
        Radio => "RADIO",
        Installation => "INSTALLATION",
        TcmTm1 => "TCM_TM1",
        Adonem => "ADONEM",
        TcmTm2 => "TCM_TM2",
        SwVal => "SW_VAL",
        Projet => "PROJET",
        SwAnalysesSecu => "SW_ANALYSES_SECU",
        Cs => "CS",
        AtcManager => "ATC_MANAGER",
        Reseau => "RESEAU",
        Scft => "SCFT",
        ItfMr => "ITF_MR",
        Tbd => "TBD",
        Gumps => "GUMPS",
        SwTestsSecu => "SW_TESTS_SECU",
        V3 => "V3",
        Tcr3 => "TCR3",
    }
}

vocabulary! {
    /// Workflow action that produced a state transition
    pub enum ActionKind (fallback Unrecognized) {
        Submit => "Submit",
        Analyse => "Analyse",
        Assign => "Assign",
        Resolve => "Resolve",
        ReSubmit => "ReSubmit",
        Reject => "Reject",
        Postpone => "Postpone",
        Verify => "Verify",
        Validate => "Validate",
        Close => "Close",
        Reopen => "Reopen",
        Modify => "Modify",
        Import => "Import",
        Unrecognized => "Unrecognized",
    }
}

vocabulary! {
    pub enum Category (fallback ToBeClassified) {
        NoCategoryDefined => "NO_CATEGORY_DEFINED",
        Minor => "MINOR",
        Major => "MAJOR",
        Critical => "CRITICAL",
        Blocking => "BLOCKING",
        ToBeClassified => "TO_BE_CLASSIFIED",
    }
}

vocabulary! {
    pub enum RequestType (fallback ToBeClassified) {
        Defect => "DEFECT",
        ChangeRequest => "CHANGE_REQUEST",
        Question => "QUESTION",
        Task => "TASK",
        ToBeClassified => "TO_BE_CLASSIFIED",
    }
}

vocabulary! {
    pub enum RejectionCause (fallback ToBeClassified) {
        /// Explicitly "no rejection"
        None => "NONE",
        Duplicate => "DUPLICATE",
        NotAProblem => "NOT_A_PROBLEM",
        NoLongerApplicable => "NO_LONGER_APPLICABLE",
        OutOfScope => "OUT_OF_SCOPE",
        WorksAsDesigned => "WORKS_AS_DESIGNED",
        ToBeClassified => "TO_BE_CLASSIFIED",
    }
}

vocabulary! {
    /// Cyber-security classification
    pub enum SecurityRelevance (fallback Undefined) {
        Yes => "YES",
        No => "NO",
        Mitigated => "MITIGATED",
        Undefined => "UNDEFINED",
    }
}

/// Keywords of configuration-unit text, per subsystem, in lookup order
const CONFIG_UNIT_KEYWORDS: &[(Role, &[&str])] = &[
    (Role::Tcr3, &["S003_Component TCR3", "TCR3"]),
    (
        Role::Sw,
        &[
            "Component MES",
            "Component PAE",
            "Component PAS",
            "Applicatif PAS",
            "S002_Subsystem Automatic Train Control",
            "Module Application PAS",
            "Module Application PAL",
            "S003_Component PAL",
            "S003_Component Atelier de Développement Logiciel",
            "S003_Component Canevas",
            "S004_Module PAI",
        ],
    ),
    (
        Role::Subsys,
        &[
            "CDB",
            "MDT",
            "Eurobalise",
            "Tiroir Calculateur",
            "Transition par balise",
            "Odotachy",
            "EVC/DMI/JRU",
            "Logiciel de service",
            "Compte à rebour",
            "S003_Component Niveau 3 - Sol",
            "S003_Component Niveau 3 - Bord",
            "S003_Component PPN",
            "S004_Module GenTel",
        ],
    ),
    (Role::Tracy, &["Cyclos"]),
    (
        Role::Ats,
        &[
            "Automatic Train Supervision",
            "S001_System ATSP",
            "Tube",
            "SIMEV",
            "SIFOR",
            "Foxtrot",
            "S003_Component Master",
            "S004_Module Package AD",
            "Module Master",
            "S003_Component Package AD",
            "ATS",
            "Atelier de paramétrage",
            "S002_Subsystem SECU IHM",
            "S002_Subsystem RTO",
            "Serveur d'authentification",
            "Boitier PERLE Signalisation NT Durcisssement",
        ],
    ),
    (
        Role::CocDe,
        &["S002_Subsystem Invariants", "Invariants", "Paramètres", "S003_Component SMT3"],
    ),
    (Role::TcmTc, &["SIMECH", "Gumps", "Outils", "XT_OT", "S003_Component TU"]),
    (Role::Radio, &["RADIO", "Baie Centrale Radio"]),
    (Role::AtsEviden, &["COEUR CK", "FGPT", "MES SIL2"]),
    (Role::Reseau, &["Réseau", "Commutateur", "pare-feu"]),
    (Role::Adonem, &["ADONEM"]),
    (Role::TcmTm1, &["Plateforme", "Usine"]),
    (Role::TcmTm2, &["Site"]),
    (
        Role::Systeme,
        &[
            "S001_System Système NExTEO ATC",
            "S001_System Système NExTEO",
            "Performances du système",
            "Interfaces Signalisation",
            "Interfaces Voie",
            "S003_Component Inferfaces Matériel Roulant",
        ],
    ),
    (Role::ItfMr, &["S002_Subsystem Interfaces_NEXTEO"]),
    (
        Role::Projet,
        &[
            "Management du projet",
            "Mise en Service Commerciale NExTEO",
            "Module Formulaires COVASEC",
        ],
    ),
    (Role::AtcManager, &["Matériels complémentaires"]),
    (Role::Saf, &["Fiabilité"]),
    (Role::Installation, &["SBL", "S004_Module Installation"]),
];

/// Map a "fixed in" / "system structure" configuration-unit text to its subsystem
///
/// The first subsystem owning a keyword contained in the text (case-insensitive) wins.
pub fn role_from_config_unit(config_unit: &str) -> Option<Role> {
    let haystack = config_unit.to_lowercase();
    CONFIG_UNIT_KEYWORDS
        .iter()
        .find(|(_, keywords)| {
            keywords
                .iter()
                .any(|keyword| haystack.contains(&keyword.to_lowercase()))
        })
        .map(|(role, _)| *role)
}
