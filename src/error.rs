use axum::http::StatusCode;
use sqlx::error::ErrorKind;
use thiserror::Error;
use tracing::error;

/// Failures surfaced by the persistence layer.
///
/// Driver errors are classified once, in `From<sqlx::Error>`, so the SQLite
/// and Postgres stores report the same variant for the same condition.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database unavailable: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("unknown user reference: {0}")]
    ForeignKeyViolation(String),

    #[error("record not found")]
    NotFound,

    #[error("malformed credential digest: {0}")]
    MalformedCredential(String),

    /// Deliberately says nothing about which half of the pair was wrong.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("timestamp could not be encoded: {0}")]
    Timestamp(#[from] time::error::Format),

    #[error("schema setup failed: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub(crate) fn schema(err: sqlx::Error) -> Self {
        match StoreError::from(err) {
            StoreError::Database(e) => StoreError::Schema(e),
            other => other,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateKey(_))
    }

    /// A single row the query returned could not be turned into a record.
    /// The query itself ran, so later rows are still readable.
    pub fn is_row_decode(&self) -> bool {
        matches!(
            self,
            StoreError::Database(sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_))
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::DuplicateKey(_) => StatusCode::CONFLICT,
            StoreError::ForeignKeyViolation(_) | StoreError::NotFound => StatusCode::NOT_FOUND,
            StoreError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            StoreError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Maps a store failure onto the `(StatusCode, String)` rejection handlers return.
/// Server-side failures are logged and reported without driver detail.
pub fn reject(err: StoreError) -> (StatusCode, String) {
    let status = err.status_code();
    if status.is_server_error() {
        error!(error = %err, "request failed");
        (status, "Internal server error".to_string())
    } else {
        (status, err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) => match db.kind() {
                ErrorKind::UniqueViolation => StoreError::DuplicateKey(db.message().to_string()),
                ErrorKind::ForeignKeyViolation => {
                    StoreError::ForeignKeyViolation(db.message().to_string())
                }
                _ => StoreError::Database(sqlx::Error::Database(db)),
            },
            e @ (sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_)) => StoreError::Connection(e),
            e => StoreError::Database(e),
        }
    }
}
