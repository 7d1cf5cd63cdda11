//! Edit counts between two instants, via the REST `history/counts/edits` endpoint.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    aggregate::month_key,
    client::{action_url, page_url, WikiClient},
    error::FetchError,
    history::page_revisions,
    model::ArticleRef,
    transport::{Sleeper, Transport},
};

// Source: https://www.mediawiki.org/wiki/API:Revisions (rvstart accepts ISO 8601)
const TIMESTAMP_FORMAT_LONG: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Which side of an instant to look for the nearest revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The first revision at or after the instant.
    Newer,
    /// The last revision at or before the instant.
    Older,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Newer => "newer",
            Direction::Older => "older",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct EditCount {
    pub count: u64,
    /// The server capped the count; the range should be narrowed.
    #[serde(rename = "limit", default)]
    pub limited: bool,
}

impl<T: Transport, S: Sleeper> WikiClient<T, S> {
    /// Id of the revision nearest to `at` in `direction`.
    pub fn revision_id_at(
        &mut self,
        article: &ArticleRef,
        at: DateTime<Utc>,
        direction: Direction,
    ) -> Result<u64, FetchError> {
        let start = at.format(TIMESTAMP_FORMAT_LONG).to_string();
        let url = action_url(
            self.config(),
            &article.language,
            &[
                ("action", "query"),
                ("prop", "revisions"),
                ("titles", article.title.as_str()),
                ("rvlimit", "1"),
                ("rvprop", "ids|timestamp"),
                ("rvdir", direction.as_str()),
                ("rvstart", start.as_str()),
            ],
        );
        let payload = self.get_json(&url)?;
        page_revisions(&payload, &url)?
            .first()
            .and_then(|revision| revision.get("revid"))
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| {
                FetchError::NotFound(format!("no revision of {article} {} {start}", direction.as_str()))
            })
    }

    /// Number of edits to `article` between `from` and `to`.
    #[instrument(skip(self, article), fields(article = %article))]
    pub fn count_edits(
        &mut self,
        article: &ArticleRef,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<EditCount, FetchError> {
        let from_id = self.revision_id_at(article, from, Direction::Newer)?;
        let to_id = self.revision_id_at(article, to, Direction::Older)?;
        if from_id > to_id {
            // the first revision after `from` is already past `to`
            return Ok(EditCount::default());
        }

        let url = format!(
            "{}?from={from_id}&to={to_id}",
            page_url(
                self.config(),
                &article.language,
                &article.title,
                "/history/counts/edits"
            )
        );
        let payload = self.get_page_json(&url)?;
        let count: EditCount = serde_json::from_value(payload)
            .map_err(|e| FetchError::parse(&url, format!("malformed edit count: {e}")))?;
        if count.limited {
            tracing::warn!(message = "edit count was capped by the server, narrow the range", %from, %to);
        }
        Ok(count)
    }

    /// Edit counts per calendar month from the month containing `start` up to `end`.
    ///
    /// Months without any revision count as zero.
    pub fn edit_counts_by_month(
        &mut self,
        article: &ArticleRef,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BTreeMap<String, EditCount>, FetchError> {
        let mut counts = BTreeMap::new();
        let mut month = first_of_month(start.date_naive());

        while let Some(first) = month {
            let month_start = first.and_time(chrono::NaiveTime::MIN).and_utc();
            if month_start >= end {
                break;
            }
            let next = next_month(first);
            let month_end = match next {
                Some(next) => next.and_time(chrono::NaiveTime::MIN).and_utc() - Duration::seconds(1),
                None => end,
            };

            let count = match self.count_edits(article, month_start, month_end) {
                Ok(count) => count,
                Err(FetchError::NotFound(_)) => EditCount::default(),
                Err(e) => return Err(e),
            };
            counts.insert(month_key(month_start), count);
            month = next;
        }

        Ok(counts)
    }
}

fn first_of_month(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
}

fn next_month(first: NaiveDate) -> Option<NaiveDate> {
    if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    }
}
