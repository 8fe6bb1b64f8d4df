//! Name and age predicates for snapshots and VMs

use crate::array::ArraySnapshot;
use crate::error::{Result, SweepError};
use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Selects array snapshots eligible for deletion
#[derive(Debug, Clone)]
pub struct SnapshotFilter {
    pattern: Pattern,
    min_age_secs: Option<i64>,
    now: DateTime<Utc>,
}

impl SnapshotFilter {
    pub fn new(pattern: &str, min_age_hours: Option<u64>, now: DateTime<Utc>) -> Result<Self> {
        let min_age_secs = min_age_hours.map(|hours| {
            i64::try_from(hours)
                .unwrap_or(i64::MAX)
                .saturating_mul(3600)
        });

        Ok(Self {
            pattern: Pattern::new(pattern)?,
            min_age_secs,
            now,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn name_matches(&self, name: &str) -> bool {
        self.pattern.matches_with(name, MATCH_OPTIONS)
    }

    /// A snapshot of unknown age never passes an age threshold
    pub fn old_enough(&self, snapshot: &ArraySnapshot) -> bool {
        match (self.min_age_secs, snapshot.creation_time) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(min_age), Some(created)) => self.now.timestamp().saturating_sub(created) >= min_age,
        }
    }

    pub fn matches(&self, snapshot: &ArraySnapshot) -> bool {
        self.name_matches(&snapshot.name) && self.old_enough(snapshot)
    }
}

/// Include/exclude wildcard lists over VM names
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl NameFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Empty include list admits every name not excluded
    pub fn allows(&self, name: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| p.matches_with(name, MATCH_OPTIONS));
        included && !self.exclude.iter().any(|p| p.matches_with(name, MATCH_OPTIONS))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(SweepError::from))
        .collect()
}
