use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::format::group_thousands;

/// A repository owned by the target user, as listed by the REST API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub name: String,
    pub default_branch: String,
}

/// One entry of `/stats/code_frequency`.
///
/// The API encodes each week as `[unix_seconds, additions, deletions]`, with
/// deletions reported as a negative number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeFrequencyWeek {
    pub week: DateTime<Utc>,
    pub additions: i64,
    pub deletions: i64,
}

impl<'de> Deserialize<'de> for CodeFrequencyWeek {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let (seconds, additions, deletions) = <(i64, i64, i64)>::deserialize(deserializer)?;
        let week = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
            serde::de::Error::custom(format!("week timestamp out of range: {seconds}"))
        })?;
        Ok(Self {
            week,
            additions,
            deletions,
        })
    }
}

/// Running line-count totals. Deletions are kept as a magnitude.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Churn {
    pub added: i64,
    pub deleted: i64,
}

impl Churn {
    pub fn fold_week(&mut self, week: &CodeFrequencyWeek) {
        self.added = self.added.saturating_add(week.additions);
        self.deleted = self.deleted.saturating_add(week.deletions.saturating_abs());
    }

    pub fn absorb(&mut self, other: Churn) {
        self.added = self.added.saturating_add(other.added);
        self.deleted = self.deleted.saturating_add(other.deleted);
    }

    pub fn net(&self) -> i64 {
        self.added.saturating_sub(self.deleted)
    }
}

impl FromIterator<CodeFrequencyWeek> for Churn {
    fn from_iter<I: IntoIterator<Item = CodeFrequencyWeek>>(iter: I) -> Self {
        let mut churn = Churn::default();
        for week in iter {
            churn.fold_week(&week);
        }
        churn
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub repos: u64,
    pub commits: u64,
    pub churn: Churn,
}

impl Stats {
    /// The `(element id, rendered value)` pairs written into the card.
    pub fn fields(&self) -> [(&'static str, String); 5] {
        [
            ("commit_data", group_thousands(self.commits)),
            ("repo_data", group_thousands(self.repos)),
            ("loc_data", group_thousands(self.churn.net())),
            ("loc_add", group_thousands(self.churn.added)),
            ("loc_del", group_thousands(self.churn.deleted)),
        ]
    }
}
