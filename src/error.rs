/// Failure of the transport seam itself (DNS, TLS, connection reset, timeout...).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be completed or the server answered with an unexpected status.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
    /// The server throttled the request and the single retry was throttled as well.
    #[error("request to {url} was throttled after one cooldown retry")]
    Throttled { url: String },
    /// A legitimately empty answer: no translation, no such page, no such user.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unexpected payload from {url}: {reason}")]
    Parse { url: String, reason: String },
}

impl FetchError {
    pub(crate) fn transport(url: &str, message: impl Into<String>) -> Self {
        FetchError::Transport {
            url: url.to_string(),
            source: TransportError::Other(message.into()),
        }
    }

    pub(crate) fn parse(url: &str, reason: impl Into<String>) -> Self {
        FetchError::Parse {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether running the same request again later may succeed.
    ///
    /// Never true for [`FetchError::NotFound`], so callers do not mistake
    /// throttling for an article without history.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Throttled { .. } | FetchError::Transport { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }

    /// Short machine-friendly label used in batch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport { .. } => "transport",
            FetchError::Throttled { .. } => "throttled",
            FetchError::NotFound(_) => "not_found",
            FetchError::Parse { .. } => "parse",
        }
    }
}
