//! Request failure taxonomy.

use thiserror::Error;

/// Statuses the client treats as permanent: retrying cannot change the answer.
pub const PERMANENT_STATUSES: [u16; 2] = [401, 404];

/// Retry eligibility of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 404/401-equivalent; never retried
    PermanentHttp,
    /// Anything else; retried up to the policy cap
    Transient,
}

/// A single failed fetch or mutation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

impl QueryError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        QueryError::Http {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            QueryError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self.status() {
            Some(status) if PERMANENT_STATUSES.contains(&status) => ErrorClass::PermanentHttp,
            _ => ErrorClass::Transient,
        }
    }
}

/// Terminal failure handed back once the retry policy gives up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("request failed after {attempts} attempt(s): {error}")]
pub struct QueryFailure {
    /// Total calls made, including the first
    pub attempts: u32,
    /// Error from the last attempt
    #[source]
    pub error: QueryError,
}

impl QueryFailure {
    pub fn class(&self) -> ErrorClass {
        self.error.class()
    }
}
