use thiserror::Error;

/// How the caller should react to a failed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network hiccup or timeout; retry on the next scheduled poll.
    Transient,
    /// Parse failure or an unusable room; retrying will not help until the
    /// target is edited.
    Permanent,
    /// No resolver is registered for the platform.
    Unsupported,
}

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("http status {status} from {url}")]
    HttpStatus { status: u16, url: String },
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("request timed out")]
    Timeout,
    #[error("platform not supported: {0}")]
    PlatformNotSupported(String),
    #[error("streamer not found")]
    StreamerNotFound,
    #[error("streamer banned")]
    StreamerBanned,
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("other: {0}")]
    Other(String),
}

impl ResolverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HttpError(e) if e.is_decode() => ErrorKind::Permanent,
            Self::HttpError(_) | Self::Timeout => ErrorKind::Transient,
            Self::HttpStatus { status, .. } if *status >= 500 || *status == 429 => {
                ErrorKind::Transient
            }
            Self::PlatformNotSupported(_) => ErrorKind::Unsupported,
            _ => ErrorKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ResolverError::Timeout.kind(), ErrorKind::Transient);
        assert_eq!(
            ResolverError::HttpStatus {
                status: 503,
                url: "https://x".into()
            }
            .kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            ResolverError::HttpStatus {
                status: 404,
                url: "https://x".into()
            }
            .kind(),
            ErrorKind::Permanent
        );
        assert_eq!(
            ResolverError::PlatformNotSupported("kick".into()).kind(),
            ErrorKind::Unsupported
        );
        assert_eq!(ResolverError::StreamerNotFound.kind(), ErrorKind::Permanent);
    }
}
