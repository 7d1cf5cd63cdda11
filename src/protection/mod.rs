//! Page protection log retrieval and normalization.
//!
//! Raw `list=logevents&letype=protect` entries are turned into
//! [`ProtectionEvent`]s. The expiry of an event is read from the first source
//! that is actually present:
//!
//! 1. `params.details[].expiry` (the `edit` restriction if there is one),
//!    a machine timestamp or `infinite`;
//! 2. `params.description`, free text in the wiki's content language;
//! 3. the log comment, free text as well.
//!
//! A structured value that cannot be read falls back to the description.
//! Unprotections carry no expiry. Text that no grammar accepts yields
//! [`ExpiryOrigin::Unparsable`] for that event only.

pub mod expiry;
pub mod locale;

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use compact_str::CompactString;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

pub use expiry::{indefinite_expiry, parse_structured_expiry, Expiry, INDEFINITE_EXPIRY_UNIX};
pub use locale::{DateGrammar, GrammarSpec, LocaleExpiryParser, LocaleRegistry};

use crate::{
    client::{action_url, WikiClient},
    error::FetchError,
    history::{continuation_params, lenient_entries, vanished_page},
    model::{ArticleRef, ExpiryOrigin, ProtectionAction, ProtectionEvent},
    outcome::Outcome,
    transport::{Sleeper, Transport},
};

const LOG_PROPS: &str = "title|type|user|timestamp|comment|details";
const TIMESTAMP_FORMAT_LONG: &str = "%Y-%m-%dT%H:%M:%SZ";

/// `[edit=autoconfirmed]` restriction pairs of a protection description.
static RESTRICTION_PAIR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[([^=\]]+)=([^\]]+)\]").ok());

/// One protection log entry as returned by the query API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawLogEvent {
    #[serde(default)]
    pub logid: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub action: String,
    // absent when the performer was suppressed
    #[serde(default)]
    pub user: Option<CompactString>,
    pub timestamp: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub params: Value,
}

impl RawLogEvent {
    fn description(&self) -> Option<&str> {
        self.params
            .get("description")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    fn details(&self) -> &[Value] {
        match self.params.get("details") {
            Some(Value::Array(details)) => details.as_slice(),
            _ => &[],
        }
    }

    /// Expiry of the `edit` restriction, or of the first restriction that has one.
    fn structured_expiry(&self) -> Option<&str> {
        fn expiry_of(detail: &Value) -> Option<&str> {
            detail.get("expiry").and_then(Value::as_str)
        }

        let details = self.details();
        details
            .iter()
            .find(|detail| detail.get("type").and_then(Value::as_str) == Some("edit"))
            .and_then(expiry_of)
            .or_else(|| details.iter().find_map(expiry_of))
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

impl<T: Transport, S: Sleeper> WikiClient<T, S> {
    /// All protection log entries of `article`, following `lecontinue`.
    #[instrument(skip(self, article), fields(article = %article))]
    pub fn fetch_protection_log(&mut self, article: &ArticleRef) -> Result<Vec<RawLogEvent>, FetchError> {
        let limit = self.config().page_limit.to_string();
        let mut accumulated: Vec<RawLogEvent> = Vec::new();
        let mut continuation: Vec<(String, String)> = Vec::new();

        loop {
            let mut params: Vec<(&str, &str)> = vec![
                ("action", "query"),
                ("list", "logevents"),
                ("letype", "protect"),
                ("letitle", article.title.as_str()),
                ("lelimit", limit.as_str()),
                ("leprop", LOG_PROPS),
            ];
            params.extend(continuation.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            let url = action_url(self.config(), &article.language, &params);

            let payload = match self.get_page_json(&url) {
                Ok(payload) => payload,
                Err(FetchError::NotFound(what)) if !accumulated.is_empty() => {
                    return Err(vanished_page(&url, &what, accumulated.len()))
                }
                Err(e) => return Err(e),
            };
            let entries = match payload.get("query").and_then(|query| query.get("logevents")) {
                Some(Value::Array(entries)) => entries.clone(),
                _ => return Err(FetchError::parse(&url, "missing `query.logevents` array")),
            };
            let entries: Vec<RawLogEvent> = lenient_entries(entries, &url);
            if entries.is_empty() {
                break;
            }
            accumulated.extend(entries);

            match continuation_params(&payload, "lecontinue") {
                Some(next) => continuation = next,
                None => break,
            }
        }

        tracing::debug!(message = "fetched protection log", total = accumulated.len());
        Ok(accumulated)
    }

    /// Normalized protection events of `article`.
    ///
    /// Fetch failures are returned as [`Outcome::Failed`] so a batch can
    /// carry on with the next article.
    pub fn protection_events(&mut self, article: &ArticleRef) -> Outcome<ProtectionEvent> {
        let raw = match self.fetch_protection_log(article) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(message = "protection log unavailable", article = %article, error = %e);
                return Outcome::from_result(Err(e));
            }
        };

        let events = raw
            .iter()
            .filter_map(|event| normalize_log_event(article, event, self.locales()))
            .collect();
        Outcome::from_result(Ok(events))
    }
}

/// Convert one raw log entry; entries without a readable timestamp are dropped.
pub fn normalize_log_event(
    article: &ArticleRef,
    raw: &RawLogEvent,
    locales: &LocaleRegistry,
) -> Option<ProtectionEvent> {
    let timestamp = match NaiveDateTime::parse_from_str(&raw.timestamp, TIMESTAMP_FORMAT_LONG) {
        Ok(dt) => DateTime::from_naive_utc_and_offset(dt, Utc),
        Err(e) => {
            tracing::warn!(
                message = "skipping log event with unreadable timestamp",
                logid = raw.logid,
                timestamp = %raw.timestamp,
                error = %e
            );
            return None;
        }
    };

    let action = ProtectionAction::from_log_action(&raw.action);
    let (protection_type, level) = restrictions(raw);
    let (expiry, expiry_origin) = resolve_expiry(raw, &action, &article.language, locales);
    if expiry_origin == ExpiryOrigin::Unparsable {
        tracing::warn!(
            message = "unparsable protection expiry",
            article = %article,
            logid = raw.logid
        );
    }

    Some(ProtectionEvent {
        article: article.clone(),
        action,
        actor: raw.user.clone(),
        timestamp,
        level,
        protection_type,
        expiry,
        expiry_origin,
        comment: raw.comment.clone(),
    })
}

/// `(types, levels)` from `params.details`, or from the description's
/// `[type=level]` pairs when there are no details.
fn restrictions(raw: &RawLogEvent) -> (Vec<String>, Vec<String>) {
    let details = raw.details();
    if !details.is_empty() {
        let field = |name: &str| -> Vec<String> {
            details
                .iter()
                .filter_map(|detail| detail.get(name).and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        };
        return (field("type"), field("level"));
    }

    let (Some(description), Some(pair)) = (raw.description(), RESTRICTION_PAIR.as_ref()) else {
        return (Vec::new(), Vec::new());
    };
    pair.captures_iter(description)
        .map(|caps| (caps[1].trim().to_string(), caps[2].trim().to_string()))
        .unzip()
}

fn resolve_expiry(
    raw: &RawLogEvent,
    action: &ProtectionAction,
    language: &str,
    locales: &LocaleRegistry,
) -> (Option<DateTime<Utc>>, ExpiryOrigin) {
    if *action == ProtectionAction::Unprotect {
        return (None, ExpiryOrigin::Absent);
    }

    let free_text = |text: &str| match locales.parse(language, text) {
        Expiry::At(instant) => (Some(instant), ExpiryOrigin::FreeText),
        Expiry::Unparsable(_) => (None, ExpiryOrigin::Unparsable),
    };

    if let Some(structured) = raw.structured_expiry() {
        match parse_structured_expiry(structured) {
            Expiry::At(instant) => return (Some(instant), ExpiryOrigin::Structured),
            Expiry::Unparsable(_) => {
                return match raw.description() {
                    Some(description) => free_text(description),
                    None => (None, ExpiryOrigin::Unparsable),
                };
            }
        }
    }

    if let Some(description) = raw.description() {
        return free_text(description);
    }

    let comment = raw.comment.trim();
    if !comment.is_empty() {
        return free_text(comment);
    }

    (None, ExpiryOrigin::Absent)
}
