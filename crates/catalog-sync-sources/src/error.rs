use thiserror::Error;

/// Failures reported by remote list adapters and scrapers.
///
/// The variants carry the distinctions the sync run acts on: whether the
/// remote session is gone, whether the call can be retried on a later run and
/// whether a lookup simply found nothing.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network error, timeout or a dropped page; the call may be retried on a later run
    #[error("transient remote failure: {0}")]
    Transient(String),

    /// The remote answered but refused the request
    #[error("remote rejected request: {0}")]
    Rejected(String),

    /// The remote took the request but its answer does not say what happened
    #[error("remote outcome unknown: {0}")]
    UnknownOutcome(String),

    /// No browser page or token could be obtained, nothing was sent
    #[error("could not open remote session: {0}")]
    SessionAcquisition(String),

    /// The session died mid-run; nothing more can be sent through it
    #[error("remote session lost: {0}")]
    SessionLost(String),

    /// The lookup ran but no external id exists for the title
    #[error("no match found for '{0}'")]
    LookupUnavailable(String),

    #[error("{0} is not supported by {1}")]
    Unsupported(&'static str, &'static str),
}

impl SourceError {
    pub fn transient(message: impl Into<String>) -> Self {
        SourceError::Transient(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        SourceError::Rejected(message.into())
    }

    /// Classify a non-success HTTP status: throttling and server errors are
    /// worth retrying later, everything else is a refusal.
    pub fn from_status(status: u16, context: &str) -> Self {
        if status == 429 || status >= 500 {
            SourceError::Transient(format!("{} returned HTTP {}", context, status))
        } else {
            SourceError::Rejected(format!("{} returned HTTP {}", context, status))
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }

    /// The session cannot be used for anything else in this run
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::SessionAcquisition(_) | SourceError::SessionLost(_))
    }

    /// Short label used when grouping failures in summaries
    pub fn category(&self) -> &'static str {
        match self {
            SourceError::Transient(_) => "transient",
            SourceError::Rejected(_) => "rejected",
            SourceError::UnknownOutcome(_) => "unknown_outcome",
            SourceError::SessionAcquisition(_) => "session",
            SourceError::SessionLost(_) => "session_lost",
            SourceError::LookupUnavailable(_) => "unavailable",
            SourceError::Unsupported(..) => "unsupported",
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() || error.is_request() {
            SourceError::Transient(error.to_string())
        } else if error.is_decode() {
            SourceError::Rejected(format!("unexpected response body: {}", error))
        } else {
            SourceError::Transient(error.to_string())
        }
    }
}

impl From<chromiumoxide::error::CdpError> for SourceError {
    fn from(error: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;
        match error {
            CdpError::Timeout => SourceError::Transient("browser call timed out".to_string()),
            CdpError::NotFound => SourceError::Transient("page element not found".to_string()),
            CdpError::ChannelSendError(_) | CdpError::NoResponse => SourceError::SessionLost(error.to_string()),
            other => SourceError::Transient(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(error: serde_json::Error) -> Self {
        SourceError::Rejected(format!("malformed JSON from remote: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(SourceError::transient("timeout").is_transient());
        assert!(!SourceError::rejected("403").is_transient());
        assert!(SourceError::SessionLost("closed".into()).is_fatal());
        assert!(SourceError::SessionAcquisition("no chromium".into()).is_fatal());
        assert!(!SourceError::transient("timeout").is_fatal());
        assert_eq!(SourceError::Unsupported("reorder", "tmdb").to_string(), "reorder is not supported by tmdb");
    }

    #[test]
    fn test_from_status() {
        assert!(SourceError::from_status(429, "add").is_transient());
        assert!(SourceError::from_status(503, "add").is_transient());
        assert!(matches!(SourceError::from_status(404, "add"), SourceError::Rejected(_)));
    }
}
