//! Error types for the service worker core.

use thiserror::Error;

/// Result type alias for service worker operations.
pub type Result<T> = std::result::Result<T, ServiceWorkerError>;

/// Errors that can escape an event's lifetime future.
#[derive(Error, Debug)]
pub enum ServiceWorkerError {
    /// A precache resource could not be fetched or stored.
    #[error("Install failed for {url}: {reason}")]
    Install { url: String, reason: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Clients error: {0}")]
    Clients(String),

    #[error("Config error: {0}")]
    Config(String),

    /// A handler was handed an event of the wrong kind.
    #[error("Unexpected event: expected {expected}, got {actual}")]
    UnexpectedEvent {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceWorkerError {
    /// Create an install error.
    pub fn install(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Install {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a cache error.
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a notification error.
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Create a clients error.
    pub fn clients(msg: impl Into<String>) -> Self {
        Self::Clients(msg.into())
    }

    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable label used as a log field.
    pub fn category(&self) -> &'static str {
        match self {
            ServiceWorkerError::Install { .. } => "install",
            ServiceWorkerError::Cache(_) => "cache",
            ServiceWorkerError::Network(_) => "network",
            ServiceWorkerError::Notification(_) => "notification",
            ServiceWorkerError::Clients(_) => "clients",
            ServiceWorkerError::Config(_) => "config",
            ServiceWorkerError::UnexpectedEvent { .. } => "unexpected_event",
            ServiceWorkerError::Io(_) => "io",
            ServiceWorkerError::Url(_) => "url",
            ServiceWorkerError::Json(_) => "json",
        }
    }
}

/// A push payload that could not be interpreted.
///
/// This is the only failure the push handler recovers from.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("payload is not well-formed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload is JSON but not an object (found {0})")]
    NotAnObject(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(ServiceWorkerError::install("/", "404").category(), "install");
        assert_eq!(ServiceWorkerError::network("dns").category(), "network");
        assert_eq!(
            ServiceWorkerError::UnexpectedEvent {
                expected: "push",
                actual: "fetch"
            }
            .category(),
            "unexpected_event"
        );
    }

    #[test]
    fn test_install_error_message() {
        let err = ServiceWorkerError::install("http://localhost:8080/", "status 404");
        assert_eq!(
            err.to_string(),
            "Install failed for http://localhost:8080/: status 404"
        );
    }

    #[test]
    fn test_url_error_converts() {
        let err: ServiceWorkerError = url::Url::parse("not a url").unwrap_err().into();
        assert_eq!(err.category(), "url");
    }
}
