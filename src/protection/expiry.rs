use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// 2029-12-31T23:59:59Z
pub const INDEFINITE_EXPIRY_UNIX: i64 = 1_893_455_999;

// Source: https://github.com/mediawiki-utilities/python-mwtypes/blob/523a93f98fe1372938fc15872b5abb1f267cc643/mwtypes/timestamp.py#L12
const TIMESTAMP_FORMAT_LONG: &str = "%Y-%m-%dT%H:%M:%SZ";
const TIMESTAMP_FORMAT_SHORT: &str = "%Y%m%d%H%M%S";

/// Machine-readable sentinels for "no expiry".
const STRUCTURED_INDEFINITE: &[&str] = &["infinite", "infinity", "indefinite", "never"];

/// The single representation of "this protection never expires".
///
/// Using a far-future instant instead of `None` keeps expiry comparisons
/// free of null handling.
pub fn indefinite_expiry() -> DateTime<Utc> {
    DateTime::from_timestamp(INDEFINITE_EXPIRY_UNIX, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Result of reading one expiry value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expiry {
    /// An absolute UTC instant; indefinite protections use [`indefinite_expiry`].
    At(DateTime<Utc>),
    /// No grammar accepted the text. Carries the raw text for diagnostics.
    Unparsable(String),
}

impl Expiry {
    pub fn indefinite() -> Self {
        Expiry::At(indefinite_expiry())
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Expiry::At(instant) => Some(*instant),
            Expiry::Unparsable(_) => None,
        }
    }

    pub fn is_indefinite(&self) -> bool {
        self.instant() == Some(indefinite_expiry())
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Expiry::At(_))
    }
}

/// Parse the `expiry` field of `params.details`.
pub fn parse_structured_expiry(raw: &str) -> Expiry {
    let text = raw.trim();
    if STRUCTURED_INDEFINITE
        .iter()
        .any(|token| text.eq_ignore_ascii_case(token))
    {
        return Expiry::indefinite();
    }

    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT_LONG)
        .or_else(|_| NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT_SHORT))
        .map(|dt| Expiry::At(DateTime::from_naive_utc_and_offset(dt, Utc)))
        .unwrap_or_else(|_| Expiry::Unparsable(raw.to_string()))
}
