use serde_json::Value;
use tracing::instrument;

use crate::{
    config::ClientConfig,
    error::{FetchError, TransportError},
    protection::LocaleRegistry,
    transport::{HttpTransport, Sleeper, ThreadSleeper, Transport},
};

/// Action API error codes that mean "there is nothing there".
const NOT_FOUND_CODES: &[&str] = &[
    "missingtitle",
    "invalidtitle",
    "nosuchuser",
    "nosuchrevid",
    "nosuchpageid",
];
/// Action API error codes that mean "slow down".
const THROTTLE_CODES: &[&str] = &["ratelimited", "maxlag"];

enum Attempt {
    Done(Value),
    Throttled,
}

/// Synchronous client for the REST and query-style wiki APIs.
///
/// All retrieval operations (`resolve_title`, `fetch_history`,
/// `fetch_protection_log`, ...) are methods on this type; they are defined in
/// the module of the component they belong to.
pub struct WikiClient<T = HttpTransport, S = ThreadSleeper> {
    transport: T,
    sleeper: S,
    config: ClientConfig,
    locales: LocaleRegistry,
    request_count: usize,
}

impl WikiClient<HttpTransport, ThreadSleeper> {
    pub fn from_config(config: ClientConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(transport, ThreadSleeper, config))
    }
}

impl<T: Transport, S: Sleeper> WikiClient<T, S> {
    pub fn new(transport: T, sleeper: S, config: ClientConfig) -> Self {
        Self {
            transport,
            sleeper,
            config,
            locales: LocaleRegistry::with_defaults(),
            request_count: 0,
        }
    }

    /// Replace the expiry grammars, e.g. to add a language.
    pub fn with_locales(mut self, locales: LocaleRegistry) -> Self {
        self.locales = locales;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn locales(&self) -> &LocaleRegistry {
        &self.locales
    }

    /// Number of HTTP requests issued so far, retries included.
    pub fn request_count(&self) -> usize {
        self.request_count
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// [`Self::get_json`] preceded by the courtesy delay; used for every page of a paginated feed.
    pub(crate) fn get_page_json(&mut self, url: &str) -> Result<Value, FetchError> {
        self.sleeper.sleep(self.config.courtesy_delay);
        self.get_json(url)
    }

    /// GET `url` and decode the JSON body.
    ///
    /// A throttled request is retried exactly once after the cooldown. A
    /// second throttle surfaces as [`FetchError::Throttled`].
    #[instrument(skip(self))]
    pub(crate) fn get_json(&mut self, url: &str) -> Result<Value, FetchError> {
        if let Attempt::Done(payload) = self.attempt(url)? {
            return Ok(payload);
        }

        let cooldown = self.config.throttle_cooldown;
        tracing::warn!(
            message = "throttled, cooling down before retrying once",
            url,
            cooldown_secs = cooldown.as_secs()
        );
        self.sleeper.sleep(cooldown);

        match self.attempt(url)? {
            Attempt::Done(payload) => Ok(payload),
            Attempt::Throttled => {
                tracing::error!(message = "throttled again after cooldown, giving up", url);
                Err(FetchError::Throttled {
                    url: url.to_string(),
                })
            }
        }
    }

    fn attempt(&mut self, url: &str) -> Result<Attempt, FetchError> {
        self.request_count += 1;
        let response = self
            .transport
            .get(url)
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        if response.status == 429 {
            return Ok(Attempt::Throttled);
        }

        let payload: Option<Value> = serde_json::from_str(&response.body).ok();
        if payload.as_ref().is_some_and(is_throttle_payload) {
            return Ok(Attempt::Throttled);
        }

        if response.status == 404 {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !response.is_success() {
            return Err(FetchError::transport(
                url,
                format!("unexpected HTTP status {}", response.status),
            ));
        }

        let payload =
            payload.ok_or_else(|| FetchError::parse(url, "response body is not valid JSON"))?;

        if let Some(error) = payload.get("error") {
            let code = error.get("code").and_then(Value::as_str).unwrap_or("unknown");
            let info = error.get("info").and_then(Value::as_str).unwrap_or("");
            if NOT_FOUND_CODES.contains(&code) {
                return Err(FetchError::NotFound(format!("{code}: {info}")));
            }
            return Err(FetchError::parse(url, format!("API error [{code}]: {info}")));
        }

        Ok(Attempt::Done(payload))
    }
}

fn is_throttle_payload(payload: &Value) -> bool {
    // the REST API reports errors in an envelope with `httpCode`
    if payload.get("httpCode").and_then(Value::as_u64) == Some(429) {
        return true;
    }
    payload
        .get("error")
        .and_then(|error| error.get("code"))
        .and_then(Value::as_str)
        .is_some_and(|code| THROTTLE_CODES.contains(&code))
}

/// Percent-encode one path segment or query value.
pub(crate) fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Query API URL for `language` with `params` in the given order.
pub(crate) fn action_url(config: &ClientConfig, language: &str, params: &[(&str, &str)]) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        query.append_pair(key, value);
    }
    query.append_pair("format", "json");
    format!("{}?{}", config.action_api_for(language), query.finish())
}

/// REST API URL for a page of `language`; `suffix` starts with `/`.
pub(crate) fn page_url(config: &ClientConfig, language: &str, title: &str, suffix: &str) -> String {
    format!(
        "{}/page/{}{}",
        config.rest_base_for(language),
        encode(title),
        suffix
    )
}
