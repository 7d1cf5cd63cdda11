use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::{
    client::{action_url, page_url, WikiClient},
    error::FetchError,
    model::ArticleRef,
    transport::{Sleeper, Transport},
};

/// Properties requested for every revision of the detailed history.
const DETAILED_RVPROP: &str = "ids|timestamp|flags|comment|user|tags|size";

/// Server-side filters understood by the REST history endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryFilter {
    Reverted,
    Anonymous,
    Bot,
    Editors,
    Minor,
}

impl HistoryFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryFilter::Reverted => "reverted",
            HistoryFilter::Anonymous => "anonymous",
            HistoryFilter::Bot => "bot",
            HistoryFilter::Editors => "editors",
            HistoryFilter::Minor => "minor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reverted" => Some(HistoryFilter::Reverted),
            "anonymous" => Some(HistoryFilter::Anonymous),
            "bot" => Some(HistoryFilter::Bot),
            "editors" => Some(HistoryFilter::Editors),
            "minor" => Some(HistoryFilter::Minor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HistoryUser {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<CompactString>,
}

/// One revision as delivered by the REST history feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub minor: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub delta: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub user: Option<HistoryUser>,
}

/// One revision as delivered by the query API with [`DETAILED_RVPROP`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawRevision {
    #[serde(default)]
    pub revid: u64,
    #[serde(default)]
    pub parentid: u64,
    pub timestamp: DateTime<Utc>,
    // absent when the user name was suppressed
    #[serde(default)]
    pub user: Option<CompactString>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "presence_flag")]
    pub minor: bool,
}

// the legacy JSON format marks flags as `"minor": ""`
fn presence_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(!matches!(value, Value::Null | Value::Bool(false)))
}

/// Deserialize every element of `entries`, dropping (and logging) malformed ones.
pub(crate) fn lenient_entries<E: serde::de::DeserializeOwned>(
    entries: Vec<Value>,
    url: &str,
) -> Vec<E> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(message = "skipping malformed entry", url, error = %e);
                None
            }
        })
        .collect()
}

/// The `continue` envelope of a query API response, as query parameters.
pub(crate) fn continuation_params(payload: &Value, token: &str) -> Option<Vec<(String, String)>> {
    let envelope = payload.get("continue")?.as_object()?;
    envelope.get(token)?;

    let params = envelope
        .iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((key.clone(), value))
        })
        .collect();
    Some(params)
}

impl<T: Transport, S: Sleeper> WikiClient<T, S> {
    /// Walk the REST history feed of `article` from the newest revision backwards.
    ///
    /// Stops as soon as the oldest accumulated revision is older than
    /// `stop_time`, when the feed has no `older` page, or when a page comes
    /// back empty. A missing first page yields an empty history; a page that
    /// goes missing after revisions were fetched is a parse error.
    #[instrument(skip(self, article), fields(article = %article))]
    pub fn fetch_history(
        &mut self,
        article: &ArticleRef,
        stop_time: DateTime<Utc>,
        filter: Option<HistoryFilter>,
    ) -> Result<Vec<HistoryEntry>, FetchError> {
        let mut url = page_url(self.config(), &article.language, &article.title, "/history");
        if let Some(filter) = filter {
            url.push_str("?filter=");
            url.push_str(filter.as_str());
        }

        let mut accumulated: Vec<HistoryEntry> = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            let payload = match self.get_page_json(&url) {
                Ok(payload) => payload,
                Err(FetchError::NotFound(_)) if accumulated.is_empty() => {
                    tracing::info!(message = "no history for article", url = url.as_str());
                    break;
                }
                Err(FetchError::NotFound(what)) => {
                    return Err(vanished_page(&url, &what, accumulated.len()))
                }
                Err(e) => return Err(e),
            };

            let entries = match payload.get("revisions") {
                Some(Value::Array(entries)) => entries.clone(),
                _ => return Err(FetchError::parse(&url, "missing `revisions` array")),
            };
            let entries: Vec<HistoryEntry> = lenient_entries(entries, &url);
            if entries.is_empty() {
                // an empty page with a continuation is treated as the end of usable data
                break;
            }
            accumulated.extend(entries);

            if let Some(oldest) = accumulated.last() {
                tracing::debug!(
                    message = "fetched history page",
                    oldest = %oldest.timestamp,
                    total = accumulated.len()
                );
                if oldest.timestamp < stop_time {
                    break;
                }
            }

            next = payload
                .get("older")
                .and_then(Value::as_str)
                .filter(|older| !older.is_empty() && *older != url)
                .map(str::to_string);
        }

        Ok(accumulated)
    }

    /// Walk the query API revision list of `article`, following `rvcontinue`.
    ///
    /// Requests size, tags, comment and user for every revision. `user`
    /// restricts the list to one editor; `stop_time` ends the walk early once
    /// the oldest accumulated revision predates it.
    #[instrument(skip(self, article), fields(article = %article))]
    pub fn fetch_history_detailed(
        &mut self,
        article: &ArticleRef,
        user: Option<&str>,
        stop_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawRevision>, FetchError> {
        let limit = self.config().page_limit.to_string();
        let mut accumulated: Vec<RawRevision> = Vec::new();
        let mut continuation: Vec<(String, String)> = Vec::new();

        loop {
            let mut params: Vec<(&str, &str)> = vec![
                ("action", "query"),
                ("prop", "revisions"),
                ("rvlimit", limit.as_str()),
                ("titles", article.title.as_str()),
            ];
            params.extend(continuation.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            if let Some(user) = user {
                params.push(("rvuser", user));
            }
            params.push(("rvprop", DETAILED_RVPROP));
            let url = action_url(self.config(), &article.language, &params);

            let payload = match self.get_page_json(&url) {
                Ok(payload) => payload,
                Err(FetchError::NotFound(_)) if accumulated.is_empty() => break,
                Err(FetchError::NotFound(what)) => {
                    return Err(vanished_page(&url, &what, accumulated.len()))
                }
                Err(e) => return Err(e),
            };

            let entries = page_revisions(&payload, &url)?;
            let entries: Vec<RawRevision> = lenient_entries(entries, &url);
            if entries.is_empty() {
                break;
            }
            accumulated.extend(entries);

            if let (Some(stop_time), Some(oldest)) = (stop_time, accumulated.last()) {
                if oldest.timestamp < stop_time {
                    break;
                }
            }

            match continuation_params(&payload, "rvcontinue") {
                Some(next) => continuation = next,
                None => break,
            }
        }

        tracing::debug!(message = "fetched detailed history", total = accumulated.len());
        Ok(accumulated)
    }

    /// Number of revisions in the detailed history, optionally of one editor.
    pub fn count_revisions(
        &mut self,
        article: &ArticleRef,
        user: Option<&str>,
    ) -> Result<usize, FetchError> {
        Ok(self.fetch_history_detailed(article, user, None)?.len())
    }
}

/// A continuation page that is missing although earlier pages were served.
pub(crate) fn vanished_page(url: &str, what: &str, fetched: usize) -> FetchError {
    tracing::warn!(message = "page vanished during pagination", url, what, fetched);
    FetchError::parse(
        url,
        format!("page vanished after {fetched} entries were fetched ({what})"),
    )
}

/// The `revisions` of the first page in `query.pages`; empty for missing pages.
pub(crate) fn page_revisions(payload: &Value, url: &str) -> Result<Vec<Value>, FetchError> {
    let pages = payload
        .get("query")
        .and_then(|query| query.get("pages"))
        .and_then(Value::as_object)
        .ok_or_else(|| FetchError::parse(url, "missing `query.pages`"))?;

    let Some(page) = pages.values().next() else {
        return Ok(Vec::new());
    };
    if page.get("missing").is_some() || page.get("invalid").is_some() {
        tracing::info!(message = "page does not exist", url);
        return Ok(Vec::new());
    }

    match page.get("revisions") {
        Some(Value::Array(revisions)) => Ok(revisions.clone()),
        None => Ok(Vec::new()),
        Some(_) => Err(FetchError::parse(url, "`revisions` is not an array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::prelude::*;

    fn article() -> ArticleRef {
        ArticleRef::new("Earth", "en")
    }

    #[test]
    fn follows_older_links_until_exhausted() {
        let transport = MockTransport::new()
            .route(
                "older_than=2",
                rest_page(
                    vec![rest_entry(1, "2020-01-01T00:00:00Z", "C", 10)],
                    None,
                ),
            )
            .route(
                "/history",
                rest_page(
                    vec![
                        rest_entry(3, "2024-03-01T00:00:00Z", "A", 30),
                        rest_entry(2, "2023-03-01T00:00:00Z", "B", 20),
                    ],
                    Some("https://rest.test/en/page/Earth/history?older_than=2"),
                ),
            );
        let mut client = test_client(transport);
        let history = client
            .fetch_history(&article(), ts("2000-01-01T00:00:00Z"), None)
            .unwrap();

        assert_eq!(history.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(client.request_count(), 2);
        assert_eq!(client.sleeper().slept, vec![TEST_DELAY, TEST_DELAY]);
    }

    #[test]
    fn stops_once_oldest_entry_passes_stop_time() {
        let transport = MockTransport::new()
            .route("older_than=2", rest_page(vec![], None))
            .route(
                "/history",
                rest_page(
                    vec![
                        rest_entry(3, "2024-03-01T00:00:00Z", "A", 30),
                        rest_entry(2, "2019-03-01T00:00:00Z", "B", 20),
                    ],
                    Some("https://rest.test/en/page/Earth/history?older_than=2"),
                ),
            );
        let mut client = test_client(transport);
        let history = client
            .fetch_history(&article(), ts("2020-01-01T00:00:00Z"), None)
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(client.request_count(), 1);
    }

    #[test]
    fn empty_first_page_terminates() {
        let transport = MockTransport::new().route(
            "/history",
            rest_page(vec![], Some("https://rest.test/en/page/Earth/history?older_than=9")),
        );
        let mut client = test_client(transport);
        let history = client
            .fetch_history(&article(), ts("2020-01-01T00:00:00Z"), None)
            .unwrap();
        assert!(history.is_empty());
        assert_eq!(client.request_count(), 1);
    }

    #[test]
    fn missing_article_has_empty_history() {
        let mut client = test_client(MockTransport::new());
        let history = client
            .fetch_history(&article(), ts("2020-01-01T00:00:00Z"), None)
            .unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn missing_continuation_page_fails_the_walk() {
        let transport = MockTransport::new()
            .route("older_than=2", status(404, r#"{"httpCode":404,"httpReason":"Not Found"}"#))
            .route(
                "/history",
                rest_page(
                    vec![
                        rest_entry(3, "2024-03-01T00:00:00Z", "A", 30),
                        rest_entry(2, "2023-03-01T00:00:00Z", "B", 20),
                    ],
                    Some("https://rest.test/en/page/Earth/history?older_than=2"),
                ),
            );
        let mut client = test_client(transport);
        let error = client
            .fetch_history(&article(), ts("2000-01-01T00:00:00Z"), None)
            .unwrap_err();
        assert!(matches!(error, FetchError::Parse { .. }));
        assert!(error.to_string().contains("after 2 entries"));
    }

    #[test]
    fn missing_detailed_continuation_page_fails_the_walk() {
        let transport = MockTransport::new()
            .route("rvcontinue=", status(404, "Not Found"))
            .route(
                "prop=revisions",
                legacy_page(
                    vec![legacy_revision(2, "2023-06-01T00:00:00Z", "B", 6, &[])],
                    Some("20230101000000|1"),
                ),
            );
        let mut client = test_client(transport);
        let error = client
            .fetch_history_detailed(&article(), None, None)
            .unwrap_err();
        assert!(matches!(error, FetchError::Parse { .. }));
    }

    #[test]
    fn filter_is_sent_to_the_server() {
        let transport = MockTransport::new().route("/history", rest_page(vec![], None));
        let mut client = test_client(transport);
        client
            .fetch_history(
                &article(),
                ts("2020-01-01T00:00:00Z"),
                Some(HistoryFilter::Reverted),
            )
            .unwrap();
        assert_eq!(
            client.transport().requests[0],
            "https://rest.test/en/page/Earth/history?filter=reverted"
        );
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let transport = MockTransport::new().route(
            "/history",
            json_ok(json!({
                "revisions": [
                    {"id": 5, "timestamp": "not a date"},
                    rest_entry(4, "2024-01-01T00:00:00Z", "A", 1),
                ]
            })),
        );
        let mut client = test_client(transport);
        let history = client
            .fetch_history(&article(), ts("2020-01-01T00:00:00Z"), None)
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, 4);
    }

    #[test]
    fn payload_without_revisions_is_a_parse_error() {
        let transport = MockTransport::new().route("/history", json_ok(json!({"oops": 1})));
        let mut client = test_client(transport);
        let error = client
            .fetch_history(&article(), ts("2020-01-01T00:00:00Z"), None)
            .unwrap_err();
        assert!(matches!(error, FetchError::Parse { .. }));
    }

    #[test]
    fn detailed_history_follows_continue_tokens() {
        let transport = MockTransport::new()
            .route(
                "rvcontinue=20230101000000%7C2",
                legacy_page(
                    vec![legacy_revision(1, "2022-01-01T00:00:00Z", "C", 5, &[])],
                    None,
                ),
            )
            .route(
                "prop=revisions",
                legacy_page(
                    vec![
                        legacy_revision(3, "2024-01-01T00:00:00Z", "A", 7, &["mw-reverted"]),
                        legacy_revision(2, "2023-06-01T00:00:00Z", "B", 6, &["mw-undo"]),
                    ],
                    Some("20230101000000|2"),
                ),
            );
        let mut client = test_client(transport);
        let revisions = client.fetch_history_detailed(&article(), None, None).unwrap();

        assert_eq!(revisions.len(), 3);
        assert_eq!(revisions[0].tags, vec!["mw-reverted".to_string()]);
        assert_eq!(revisions[2].user.as_deref(), Some("C"));
        let first = &client.transport().requests[0];
        assert!(first.starts_with("https://en.api.test/w/api.php?action=query&prop=revisions"));
        assert!(first.contains("rvlimit=500"));
        assert!(first.contains("rvprop=ids%7Ctimestamp%7Cflags%7Ccomment%7Cuser%7Ctags%7Csize"));
        assert!(client.transport().requests[1].contains("continue=%7C%7C"));
    }

    #[test]
    fn detailed_history_can_be_restricted_to_a_user() {
        let transport = MockTransport::new().route(
            "prop=revisions",
            legacy_page(vec![legacy_revision(1, "2022-01-01T00:00:00Z", "Jimbo", 5, &[])], None),
        );
        let mut client = test_client(transport);
        assert_eq!(client.count_revisions(&article(), Some("Jimbo")).unwrap(), 1);
        assert!(client.transport().requests[0].contains("rvuser=Jimbo"));
    }

    #[test]
    fn detailed_history_of_missing_page_is_empty() {
        let transport = MockTransport::new().route(
            "prop=revisions",
            json_ok(json!({"query": {"pages": {"-1": {"ns": 0, "title": "Earth", "missing": ""}}}})),
        );
        let mut client = test_client(transport);
        assert!(client
            .fetch_history_detailed(&article(), None, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn legacy_flags_and_hidden_users_are_decoded() {
        let revision: RawRevision = serde_json::from_value(json!({
            "revid": 9,
            "parentid": 8,
            "minor": "",
            "userhidden": "",
            "timestamp": "2024-05-01T10:00:00Z",
            "size": 1200,
            "tags": []
        }))
        .unwrap();
        assert!(revision.minor);
        assert_eq!(revision.user, None);
        assert_eq!(revision.timestamp, ts("2024-05-01T10:00:00Z"));
    }

    #[test]
    fn history_filters_parse_back() {
        for filter in [
            HistoryFilter::Reverted,
            HistoryFilter::Anonymous,
            HistoryFilter::Bot,
            HistoryFilter::Editors,
            HistoryFilter::Minor,
        ] {
            assert_eq!(HistoryFilter::parse(filter.as_str()), Some(filter));
        }
        assert_eq!(HistoryFilter::parse("everything"), None);
    }
}
