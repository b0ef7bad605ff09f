/// Result type alias for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Rate limited")]
    RateLimited,

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("Fetch attempt timed out")]
    Timeout,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SourceError {
    /// Transient failures are retried within the source's retry budget;
    /// everything else is reclassified immediately as hard or soft
    /// depending on whether the source is REQUIRED.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::RateLimited | SourceError::Timeout => true,
            SourceError::Http(status) => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return SourceError::Timeout;
        }
        if let Some(status) = e.status() {
            if status.as_u16() == 429 {
                return SourceError::RateLimited;
            }
            return SourceError::Http(status.as_u16());
        }
        if e.is_decode() {
            return SourceError::Decode(e.to_string());
        }
        SourceError::Other(anyhow::anyhow!(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        assert!(SourceError::Http(503).is_transient());
        assert!(SourceError::RateLimited.is_transient());
        assert!(SourceError::Timeout.is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        assert!(!SourceError::Http(404).is_transient());
        assert!(!SourceError::Decode("bad json".to_string()).is_transient());
        assert!(!SourceError::MissingCredential("api key").is_transient());
    }
}
