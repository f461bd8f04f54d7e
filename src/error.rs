// =============================================================================
// Error taxonomy shared by every subsystem
// =============================================================================
//
// Every layer boundary (HTTP, cache, database, encryption) converts its native
// error type into one of these variants via `From`, so call sites propagate
// with `?` rather than hand-rolled matching.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration missing: {0}")]
    ConfigMissing(String),

    #[error("upstream returned {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    #[error("upstream network error: {0}")]
    UpstreamNetwork(String),

    #[error("failed to decode upstream response: {0}")]
    UpstreamDecode(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("conflicting record: {0}")]
    DbConflict(String),

    #[error("database unavailable: {0}")]
    DbUnavailable(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("precondition not met: {0}")]
    Precondition(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::UpstreamDecode(e.to_string())
        } else if let Some(status) = e.status() {
            Error::UpstreamHttp {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            Error::UpstreamNetwork(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::UpstreamDecode(e.to_string())
    }
}

impl From<diesel::result::Error> for Error {
    fn from(e: diesel::result::Error) -> Self {
        use diesel::result::DatabaseErrorKind;
        use diesel::result::Error as DieselError;
        match e {
            DieselError::NotFound => Error::Validation("record not found".into()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Error::DbConflict(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Error::DbConflict(info.message().to_string())
            }
            other => Error::DbUnavailable(other.to_string()),
        }
    }
}

impl From<diesel_async::pooled_connection::bb8::RunError> for Error {
    fn from(e: diesel_async::pooled_connection::bb8::RunError) -> Self {
        Error::DbUnavailable(e.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::CacheUnavailable(e.to_string())
    }
}
