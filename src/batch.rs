//! Running the retrieval pipelines over articles × language editions.
//!
//! Pairs are processed one after another. A failing pair never aborts the
//! batch; it is recorded in the [`BatchReport`] together with the reason.

use std::fmt;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::Serialize;

use crate::{
    aggregate::{aggregate_by_month, monthly_rows, normalize_revision},
    client::WikiClient,
    contributions::ContributionJoiner,
    error::FetchError,
    history::HistoryFilter,
    model::{ArticleRef, ContributionRow, MonthlyCount, ProtectionEvent, Revision},
    outcome::Outcome,
    transport::{Sleeper, Transport},
};

/// One (article, language) pair that could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub title: String,
    pub language: CompactString,
    /// [`FetchError::kind`] of the failure.
    pub kind: &'static str,
    pub retryable: bool,
    pub reason: String,
}

/// Records of a batch run plus an account of every pair.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub records: Vec<T>,
    pub succeeded: usize,
    pub empty: usize,
    pub failed: Vec<BatchFailure>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            succeeded: 0,
            empty: 0,
            failed: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    /// Number of pairs processed.
    pub fn pairs(&self) -> usize {
        self.succeeded + self.empty + self.failed.len()
    }

    fn record(&mut self, title: &str, language: &str, outcome: Outcome<T>) {
        match outcome {
            Outcome::Found(items) => {
                self.succeeded += 1;
                self.records.extend(items);
            }
            Outcome::Empty => self.empty += 1,
            Outcome::Failed(error) => self.fail(title, language, &error),
        }
    }

    fn fail(&mut self, title: &str, language: &str, error: &FetchError) {
        tracing::warn!(message = "pair failed", title, language, kind = error.kind(), error = %error);
        self.failed.push(BatchFailure {
            title: title.to_string(),
            language: language.into(),
            kind: error.kind(),
            retryable: error.is_retryable(),
            reason: error.to_string(),
        });
    }
}

impl<T> fmt::Display for BatchReport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pairs: {} succeeded, {} empty, {} failed; {} records",
            self.pairs(),
            self.succeeded,
            self.empty,
            self.failed.len(),
            self.records.len()
        )
    }
}

/// Batch driver. Titles are given in `source_language` and resolved to the
/// equivalent article of every target language.
pub struct Harvester<T, S> {
    client: WikiClient<T, S>,
    source_language: CompactString,
    history_filter: Option<HistoryFilter>,
}

impl<T: Transport, S: Sleeper> Harvester<T, S> {
    pub fn new(client: WikiClient<T, S>, source_language: &str) -> Self {
        Self {
            client,
            source_language: source_language.into(),
            history_filter: None,
        }
    }

    /// Server-side filter for the monthly history pipeline.
    pub fn with_history_filter(mut self, filter: Option<HistoryFilter>) -> Self {
        self.history_filter = filter;
        self
    }

    pub fn client(&self) -> &WikiClient<T, S> {
        &self.client
    }

    pub fn into_client(self) -> WikiClient<T, S> {
        self.client
    }

    /// Revisions per calendar month, walking the history back to `stop_time`.
    pub fn monthly_counts(
        &mut self,
        titles: &[String],
        languages: &[String],
        stop_time: DateTime<Utc>,
    ) -> BatchReport<MonthlyCount> {
        let filter = self.history_filter;
        self.run("monthly", titles, languages, |client, article| {
            Outcome::from_result(client.fetch_history(article, stop_time, filter)).map(|entries| {
                // the last page may reach past the stop time
                let kept: Vec<_> = entries
                    .iter()
                    .filter(|entry| entry.timestamp >= stop_time)
                    .collect();
                monthly_rows(article, &aggregate_by_month(kept))
            })
        })
    }

    /// Normalized revisions joined with editor edit counts.
    ///
    /// The editor-count cache lives for this call only.
    pub fn revisions(
        &mut self,
        titles: &[String],
        languages: &[String],
        stop_time: Option<DateTime<Utc>>,
    ) -> BatchReport<ContributionRow> {
        let mut joiner = ContributionJoiner::new();
        let report = self.run("revisions", titles, languages, |client, article| {
            Outcome::from_result(client.fetch_history_detailed(article, None, stop_time)).map(|raw| {
                let revisions: Vec<Revision> = raw.iter().map(normalize_revision).collect();
                joiner.join(client, &revisions, article)
            })
        });
        if joiner.failed_lookups() > 0 {
            tracing::warn!(
                message = "some editor edit counts defaulted to zero",
                failed_lookups = joiner.failed_lookups()
            );
        }
        report
    }

    pub fn protections(
        &mut self,
        titles: &[String],
        languages: &[String],
    ) -> BatchReport<ProtectionEvent> {
        self.run("protections", titles, languages, |client, article| {
            client.protection_events(article)
        })
    }

    fn run<R>(
        &mut self,
        pipeline: &'static str,
        titles: &[String],
        languages: &[String],
        mut job: impl FnMut(&mut WikiClient<T, S>, &ArticleRef) -> Outcome<R>,
    ) -> BatchReport<R> {
        let mut report = BatchReport::default();

        for title in titles {
            for language in languages {
                let resolved = self
                    .client
                    .resolve_title(title, &self.source_language, language);
                let article = match resolved {
                    Ok(resolved) => ArticleRef::new(&resolved, language),
                    Err(FetchError::NotFound(what)) => {
                        tracing::info!(
                            message = "no article in this language",
                            title = title.as_str(),
                            language = language.as_str(),
                            what = what.as_str()
                        );
                        report.empty += 1;
                        continue;
                    }
                    Err(e) => {
                        report.fail(title, language, &e);
                        continue;
                    }
                };

                let span = tracing::info_span!("pair", pipeline, article = %article);
                let _enter = span.enter();
                let outcome = job(&mut self.client, &article);
                report.record(title, language, outcome);
            }
        }

        tracing::info!(
            message = "batch finished",
            pipeline,
            pairs = report.pairs(),
            succeeded = report.succeeded,
            empty = report.empty,
            failed = report.failed.len(),
            records = report.records.len()
        );
        report
    }
}
