use std::time::Duration;

pub const DEFAULT_REST_BASE: &str = "https://api.wikimedia.org/core/v1/wikipedia";
/// `{lang}` is replaced by the language code.
pub const DEFAULT_ACTION_API: &str = "https://{lang}.wikipedia.org/w/api.php";
pub const DEFAULT_USER_AGENT: &str = concat!(
    "editwars/",
    env!("CARGO_PKG_VERSION"),
    " (edit war metadata harvester)"
);

/// Settings shared by every request a [`crate::client::WikiClient`] makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base of the REST metadata API (history, language links, counts).
    pub rest_base: String,
    /// Template of the legacy query API; `{lang}` is substituted per request.
    pub action_api: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Paid before every paginated page request.
    pub courtesy_delay: Duration,
    /// Paid once after a throttling response, before the single retry.
    pub throttle_cooldown: Duration,
    /// `rvlimit` / `lelimit` for query API pages.
    pub page_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rest_base: DEFAULT_REST_BASE.to_string(),
            action_api: DEFAULT_ACTION_API.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            courtesy_delay: Duration::from_secs(3),
            throttle_cooldown: Duration::from_secs(30 * 60),
            page_limit: 500,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `EDITWARS_*` environment variables.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `EDITWARS_*` keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let number = |key: &str| -> Option<u64> {
            let raw = value(key)?;
            match raw.parse() {
                Ok(number) => Some(number),
                Err(_) => {
                    tracing::warn!(message = "ignoring non-numeric configuration value", key, value = raw.as_str());
                    None
                }
            }
        };

        let defaults = Self::default();
        Self {
            rest_base: value("EDITWARS_REST_BASE").unwrap_or(defaults.rest_base),
            action_api: value("EDITWARS_ACTION_API").unwrap_or(defaults.action_api),
            user_agent: value("EDITWARS_USER_AGENT").unwrap_or(defaults.user_agent),
            timeout: number("EDITWARS_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            courtesy_delay: number("EDITWARS_COURTESY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.courtesy_delay),
            throttle_cooldown: number("EDITWARS_THROTTLE_COOLDOWN_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.throttle_cooldown),
            page_limit: number("EDITWARS_PAGE_LIMIT")
                .and_then(|limit| u32::try_from(limit).ok())
                .unwrap_or(defaults.page_limit),
        }
    }

    pub fn action_api_for(&self, language: &str) -> String {
        self.action_api.replace("{lang}", language)
    }

    pub fn rest_base_for(&self, language: &str) -> String {
        format!("{}/{}", self.rest_base.trim_end_matches('/'), language)
    }
}
