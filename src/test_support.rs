//! Scripted transport, recording sleeper and JSON fixtures shared by the tests.
//!
//! Nothing in here touches the network or sleeps.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::{
    client::WikiClient,
    config::ClientConfig,
    error::TransportError,
    transport::{RawResponse, Sleeper, Transport},
};

pub mod prelude {
    pub(crate) use super::proptest as proptest_support;
    pub(crate) use super::{
        json_ok, legacy_page, legacy_revision, log_event, log_page, rest_entry, rest_page,
        status, test_client, throttled, ts, MockTransport, TEST_COOLDOWN, TEST_DELAY,
    };
    pub(crate) use crate::error::FetchError;
    pub(crate) use crate::model::*;
    pub(crate) use crate::transport::RawResponse;
    pub(crate) use proptest::prelude::*;
    pub(crate) use serde_json::json;
}

pub const TEST_DELAY: Duration = Duration::from_secs(3);
pub const TEST_COOLDOWN: Duration = Duration::from_secs(1800);

enum Script {
    Sticky(Result<RawResponse, String>),
    /// Replayed in order; the last response repeats forever.
    Sequence(Vec<RawResponse>),
}

/// Answers each URL with the script of the first route whose pattern is a
/// substring of it. Unmatched URLs get a REST-style 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Vec<(String, Script)>,
    /// Every requested URL, in order.
    pub requests: Vec<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, pattern: &str, response: RawResponse) -> Self {
        self.routes.push((pattern.to_string(), Script::Sticky(Ok(response))));
        self
    }

    pub fn route_seq(mut self, pattern: &str, responses: Vec<RawResponse>) -> Self {
        self.routes.push((pattern.to_string(), Script::Sequence(responses)));
        self
    }

    /// Fail at the transport level, as a dropped connection would.
    pub fn route_err(mut self, pattern: &str, message: &str) -> Self {
        self.routes
            .push((pattern.to_string(), Script::Sticky(Err(message.to_string()))));
        self
    }
}

impl Transport for MockTransport {
    fn get(&mut self, url: &str) -> Result<RawResponse, TransportError> {
        self.requests.push(url.to_string());

        let script = self
            .routes
            .iter_mut()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, script)| script);

        match script {
            Some(Script::Sticky(Ok(response))) => Ok(response.clone()),
            Some(Script::Sticky(Err(message))) => Err(TransportError::Other(message.clone())),
            Some(Script::Sequence(responses)) => {
                if responses.len() > 1 {
                    Ok(responses.remove(0))
                } else {
                    responses
                        .first()
                        .cloned()
                        .ok_or_else(|| TransportError::Other("empty response sequence".into()))
                }
            }
            None => Ok(status(404, r#"{"httpCode":404,"httpReason":"Not Found"}"#)),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pub slept: Vec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.slept.push(duration);
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        rest_base: "https://rest.test".to_string(),
        action_api: "https://{lang}.api.test/w/api.php".to_string(),
        user_agent: "editwars-tests".to_string(),
        timeout: Duration::from_secs(1),
        courtesy_delay: TEST_DELAY,
        throttle_cooldown: TEST_COOLDOWN,
        page_limit: 500,
    }
}

pub fn test_client(transport: MockTransport) -> WikiClient<MockTransport, RecordingSleeper> {
    WikiClient::new(transport, RecordingSleeper::default(), test_config())
}

pub fn json_ok(value: Value) -> RawResponse {
    RawResponse::ok(value.to_string())
}

pub fn status(code: u16, body: &str) -> RawResponse {
    RawResponse {
        status: code,
        body: body.to_string(),
    }
}

pub fn throttled() -> RawResponse {
    status(
        429,
        r#"{"httpCode":429,"httpReason":"Too Many Requests"}"#,
    )
}

/// `2024-01-01T00:00:00Z` style timestamp.
pub fn ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .expect("test timestamps are RFC 3339")
        .with_timezone(&Utc)
}

/// One entry of the REST history feed.
pub fn rest_entry(id: u64, timestamp: &str, user: &str, size: u64) -> Value {
    json!({
        "id": id,
        "timestamp": timestamp,
        "minor": false,
        "size": size,
        "comment": "",
        "delta": 0,
        "user": {"id": id * 10, "name": user}
    })
}

/// A REST history page; `older` is the ready-made URL of the next page.
pub fn rest_page(entries: Vec<Value>, older: Option<&str>) -> RawResponse {
    let mut page = json!({
        "revisions": entries,
        "latest": "https://rest.test/latest",
    });
    if let Some(older) = older {
        page["older"] = Value::String(older.to_string());
    }
    json_ok(page)
}

/// One revision of the query API with every detailed property.
pub fn legacy_revision(id: u64, timestamp: &str, user: &str, size: u64, tags: &[&str]) -> Value {
    json!({
        "revid": id,
        "parentid": id.saturating_sub(1),
        "timestamp": timestamp,
        "user": user,
        "size": size,
        "comment": "",
        "tags": tags,
    })
}

/// A query API page of revisions, continued by `rvcontinue` when given.
pub fn legacy_page(revisions: Vec<Value>, rvcontinue: Option<&str>) -> RawResponse {
    let mut page = json!({
        "batchcomplete": "",
        "query": {"pages": {"42": {"pageid": 42, "ns": 0, "title": "Page", "revisions": revisions}}},
    });
    if let Some(token) = rvcontinue {
        page["continue"] = json!({"rvcontinue": token, "continue": "||"});
    }
    json_ok(page)
}

/// One protection log entry performed by `Admin`.
pub fn log_event(action: &str, timestamp: &str, params: Value, comment: &str) -> Value {
    json!({
        "logid": 1,
        "ns": 0,
        "title": "Page",
        "pageid": 42,
        "logpage": 42,
        "params": params,
        "type": "protect",
        "action": action,
        "user": "Admin",
        "timestamp": timestamp,
        "comment": comment,
    })
}

/// A page of `list=logevents`, continued by `lecontinue` when given.
pub fn log_page(events: Vec<Value>, lecontinue: Option<&str>) -> RawResponse {
    let mut page = json!({
        "batchcomplete": "",
        "query": {"logevents": events},
    });
    if let Some(token) = lecontinue {
        page["continue"] = json!({"lecontinue": token, "continue": "-||"});
    }
    json_ok(page)
}

pub mod proptest {
    use proptest::prelude::*;
    use serde_json::Value;

    use super::rest_entry;

    /// Unix seconds between 2001 and 2030.
    pub fn revision_second() -> impl Strategy<Value = i64> {
        978_307_200i64..1_893_455_999
    }

    /// REST history pages, newest revision first, as the feed delivers them.
    pub fn history_pages(max_pages: usize) -> impl Strategy<Value = Vec<Vec<Value>>> {
        prop::collection::vec(revision_second(), 1..60).prop_flat_map(move |mut seconds| {
            seconds.sort_unstable_by(|a, b| b.cmp(a));
            let total = seconds.len();
            (1..=max_pages.min(total)).prop_map(move |pages| {
                let per_page = total.div_ceil(pages);
                seconds
                    .chunks(per_page)
                    .enumerate()
                    .map(|(page, chunk)| {
                        chunk
                            .iter()
                            .enumerate()
                            .map(|(i, second)| {
                                let id = (total - page * per_page - i) as u64;
                                let timestamp = chrono::DateTime::from_timestamp(*second, 0)
                                    .unwrap_or_default()
                                    .format("%Y-%m-%dT%H:%M:%SZ")
                                    .to_string();
                                rest_entry(id, &timestamp, "Editor", 100)
                            })
                            .collect()
                    })
                    .collect()
            })
        })
    }
}
