use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use compact_str::CompactString;

use crate::{
    history::{HistoryEntry, RawRevision},
    model::{ArticleRef, MonthlyCount, Revision},
};

pub const TAG_REVERTED: &str = "mw-reverted";
pub const TAG_UNDO: &str = "mw-undo";
pub const TAG_MANUAL_REVERT: &str = "mw-manual-revert";

pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for DateTime<Utc> {
    fn timestamp(&self) -> DateTime<Utc> {
        *self
    }
}

impl Timestamped for Revision {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for HistoryEntry {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for RawRevision {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// `YYYY-MM` key of the calendar month containing `timestamp`.
pub fn month_key(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m").to_string()
}

/// Count revisions per calendar month. Input order does not matter.
pub fn aggregate_by_month<'a, R, I>(revisions: I) -> BTreeMap<String, usize>
where
    R: Timestamped + 'a,
    I: IntoIterator<Item = &'a R>,
{
    let mut counts = BTreeMap::new();
    for revision in revisions {
        *counts.entry(month_key(revision.timestamp())).or_insert(0) += 1;
    }
    counts
}

/// Flatten monthly counts into rows for `article`.
pub fn monthly_rows(article: &ArticleRef, counts: &BTreeMap<String, usize>) -> Vec<MonthlyCount> {
    counts
        .iter()
        .map(|(month, count)| MonthlyCount {
            article: article.title.clone(),
            language: article.language.clone(),
            month: month.clone(),
            count: *count,
        })
        .collect()
}

/// Anything that can be brought into the canonical [`Revision`] shape.
pub trait NormalizeRevision {
    fn normalize(&self) -> Revision;
}

impl NormalizeRevision for RawRevision {
    fn normalize(&self) -> Revision {
        let has_tag = |tag: &str| self.tags.iter().any(|t| t == tag);
        Revision {
            timestamp: self.timestamp,
            size: self.size,
            editor: self.user.clone().unwrap_or_default(),
            reverted: has_tag(TAG_REVERTED),
            is_reversion: has_tag(TAG_UNDO) || has_tag(TAG_MANUAL_REVERT),
        }
    }
}

impl NormalizeRevision for Revision {
    fn normalize(&self) -> Revision {
        self.clone()
    }
}

impl NormalizeRevision for HistoryEntry {
    // the REST feed carries no tags, so the revert flags stay unset
    fn normalize(&self) -> Revision {
        Revision {
            timestamp: self.timestamp,
            size: self.size,
            editor: self
                .user
                .as_ref()
                .and_then(|user| user.name.clone())
                .unwrap_or_else(CompactString::default),
            reverted: false,
            is_reversion: false,
        }
    }
}

/// Canonical form of a raw revision; normalizing a [`Revision`] again is a no-op.
pub fn normalize_revision<R: NormalizeRevision + ?Sized>(raw: &R) -> Revision {
    raw.normalize()
}
