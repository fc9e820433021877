// src/error.rs
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Why a single fetch attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Parse,
    RateLimited,
    Unavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Parse => "parse",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: ErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::parse(format!("decoding response body: {e}"))
        } else if e.is_timeout() {
            FetchError::network(format!("request timed out: {e}"))
        } else if let Some(status) = e.status() {
            FetchError::unavailable(format!("http status {status}"))
        } else {
            FetchError::network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::parse(format!("invalid json: {e}"))
    }
}

/// Failure of one upsert. Neither variant is retried within the cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistError {
    /// Throttling or a network blip; the next cycle will overwrite anyway.
    #[error("transient store error: {0}")]
    Transient(String),

    /// Backend unreachable or misconfigured (missing table, bad credentials).
    #[error("fatal store error: {0}")]
    Fatal(String),
}

impl PersistError {
    pub fn kind_str(&self) -> &'static str {
        match self {
            PersistError::Transient(_) => "transient",
            PersistError::Fatal(_) => "fatal",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, PersistError::Fatal(_))
    }
}

/// Anything that must stop the process before the scheduler starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{present} is set but {missing} is not; static credentials need both")]
    PartialCredentials {
        present: &'static str,
        missing: &'static str,
    },

    #[error("building http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("binding liveness listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("installing metrics recorder: {0}")]
    Metrics(String),
}
