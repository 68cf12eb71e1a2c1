//! Roster normalization
//!
//! Personnel rows from every roster source are normalized into [`Officer`]s
//! and deduplicated on `(name, phone)`, keeping the first occurrence so the
//! source's order (shift lead first) survives.

use crate::types::Officer;
use cuadrante_common::text::collapse_upper;
use std::collections::HashSet;

/// Phone sentinel for missing numbers
pub const UNKNOWN_PHONE: &str = "unknown";

/// Rank abbreviations recognised as the leading name token ("PT. JUAN PEREZ")
const RANK_ABBREVIATIONS: &[&str] = &[
    "SUBCOM", "CPT", "PAT", "IJ", "IT", "SI", "PT", "PP", "AG", "SC", "CM", "ST", "TE", "CT",
    "MY", "TC", "CR", "SV", "SS",
];

/// A roster row before normalization
#[derive(Debug, Clone, Default)]
pub struct RawOfficer {
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl RawOfficer {
    pub fn new(name: Option<String>, phone: Option<String>) -> Self {
        Self { name, phone }
    }
}

impl Officer {
    /// Normalize one roster row; rows without a name are dropped
    pub fn from_raw(raw: &RawOfficer) -> Option<Officer> {
        let name = collapse_upper(raw.name.as_deref()?);
        if name.is_empty() {
            return None;
        }

        let phone = match raw.phone.as_deref().map(str::trim) {
            None | Some("") | Some("0") => UNKNOWN_PHONE.to_string(),
            Some(p) => p.to_string(),
        };

        let initials = rank_prefix(&name)
            .map(str::to_string)
            .unwrap_or_else(|| name.chars().take(2).collect());

        Some(Officer {
            name,
            phone,
            initials,
        })
    }
}

/// Rank abbreviation the name starts with, if any
fn rank_prefix(name: &str) -> Option<&'static str> {
    let first = name.split_whitespace().next()?.trim_end_matches('.');
    RANK_ABBREVIATIONS.iter().copied().find(|abbr| *abbr == first)
}

/// Normalize and deduplicate a roster, preserving first-seen order
pub fn build_roster<'a>(rows: impl IntoIterator<Item = &'a RawOfficer>) -> Vec<Officer> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    rows.into_iter()
        .filter_map(Officer::from_raw)
        .filter(|o| seen.insert((o.name.clone(), o.phone.clone())))
        .collect()
}
