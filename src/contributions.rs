//! Joining editor-wide edit counts onto per-revision rows.

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::{
    client::{action_url, WikiClient},
    error::FetchError,
    model::{ArticleRef, ContributionRow, EditorProfile, Revision},
    transport::{Sleeper, Transport},
};

impl<T: Transport, S: Sleeper> WikiClient<T, S> {
    /// Total number of edits of `editor` on the `language` edition.
    pub fn editor_edit_count(&mut self, editor: &str, language: &str) -> Result<u64, FetchError> {
        let url = action_url(
            self.config(),
            language,
            &[
                ("action", "query"),
                ("list", "users"),
                ("usprop", "editcount"),
                ("ususers", editor),
            ],
        );
        let payload = self.get_json(&url)?;
        let user = payload
            .get("query")
            .and_then(|query| query.get("users"))
            .and_then(Value::as_array)
            .and_then(|users| users.first())
            .ok_or_else(|| FetchError::parse(&url, "missing `query.users`"))?;

        if user.get("missing").is_some() || user.get("invalid").is_some() {
            return Err(FetchError::NotFound(format!("user {editor} on {language}")));
        }
        user.get("editcount")
            .and_then(Value::as_u64)
            .ok_or_else(|| FetchError::parse(&url, "user entry has no `editcount`"))
    }
}

/// Per-run cache of editor edit counts keyed by `(editor, language)`.
///
/// Create one joiner per extraction run; counts are never shared across runs.
#[derive(Debug, Default)]
pub struct ContributionJoiner {
    totals: FxHashMap<(CompactString, CompactString), u64>,
    failed_lookups: usize,
}

impl ContributionJoiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached edit count of `editor`; lookup failures count as zero.
    pub fn total_edits<T: Transport, S: Sleeper>(
        &mut self,
        client: &mut WikiClient<T, S>,
        editor: &str,
        language: &str,
    ) -> u64 {
        // suppressed user names cannot be looked up
        if editor.is_empty() {
            return 0;
        }

        let key = (CompactString::from(editor), CompactString::from(language));
        if let Some(total) = self.totals.get(&key) {
            return *total;
        }

        let total = match client.editor_edit_count(editor, language) {
            Ok(total) => total,
            Err(e) => {
                if !e.is_not_found() {
                    self.failed_lookups += 1;
                }
                tracing::warn!(message = "edit count lookup failed, using zero", editor, language, error = %e);
                0
            }
        };
        self.totals.insert(key, total);
        total
    }

    /// Left join of editor totals onto `revisions` of `article`.
    ///
    /// Produces exactly one row per input revision. `article_edits` is the
    /// number of input revisions sharing the row's editor.
    pub fn join<T: Transport, S: Sleeper>(
        &mut self,
        client: &mut WikiClient<T, S>,
        revisions: &[Revision],
        article: &ArticleRef,
    ) -> Vec<ContributionRow> {
        let mut per_editor: FxHashMap<&str, u64> = FxHashMap::default();
        for revision in revisions {
            *per_editor.entry(revision.editor.as_str()).or_insert(0) += 1;
        }

        let mut editors: Vec<&str> = per_editor.keys().copied().collect();
        editors.sort_unstable();
        let totals: FxHashMap<&str, u64> = editors
            .into_iter()
            .map(|editor| (editor, self.total_edits(client, editor, &article.language)))
            .collect();

        revisions
            .iter()
            .map(|revision| {
                let editor = revision.editor.as_str();
                ContributionRow {
                    article: article.title.clone(),
                    language: article.language.clone(),
                    editor: revision.editor.clone(),
                    timestamp: revision.timestamp,
                    size: revision.size,
                    reverted: revision.reverted,
                    is_reversion: revision.is_reversion,
                    total_edits: totals.get(editor).copied().unwrap_or(0),
                    article_edits: per_editor.get(editor).copied().unwrap_or(0),
                }
            })
            .collect()
    }

    /// Every editor looked up so far, ordered by language then name.
    pub fn profiles(&self) -> Vec<EditorProfile> {
        let mut profiles: Vec<EditorProfile> = self
            .totals
            .iter()
            .map(|((editor, language), total)| EditorProfile {
                editor: editor.clone(),
                language: language.clone(),
                total_edit_count: *total,
            })
            .collect();
        profiles.sort_by(|a, b| (&a.language, &a.editor).cmp(&(&b.language, &b.editor)));
        profiles
    }

    /// Lookups that failed for reasons other than a missing user.
    pub fn failed_lookups(&self) -> usize {
        self.failed_lookups
    }
}

/// [`ContributionJoiner::join`] with a fresh cache.
pub fn join_contribution_counts<T: Transport, S: Sleeper>(
    client: &mut WikiClient<T, S>,
    revisions: &[Revision],
    article: &ArticleRef,
) -> Vec<ContributionRow> {
    ContributionJoiner::new().join(client, revisions, article)
}

impl ContributionRow {
    /// Fraction of the editor's total activity spent on this article.
    pub fn activity_share(&self) -> Option<f64> {
        (self.total_edits > 0).then(|| self.article_edits as f64 / self.total_edits as f64)
    }
}
