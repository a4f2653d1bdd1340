use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrmError {
    /// Model registration failed (missing or duplicate primary key, bad field list).
    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("'{model}' object has no attribute '{attribute}'")]
    UnknownAttribute { model: String, attribute: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolErrorPostgres(#[from] bb8::RunError<tokio_postgres::Error>),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    /// The statement failed and the rollback issued afterwards failed too.
    #[error("rollback failed ({rollback}) after statement error: {original}")]
    RollbackFailed {
        original: Box<OrmError>,
        rollback: Box<OrmError>,
    },
}

#[cfg(feature = "sqlite")]
impl From<bb8::RunError<OrmError>> for OrmError {
    fn from(err: bb8::RunError<OrmError>) -> Self {
        match err {
            bb8::RunError::User(inner) => inner,
            bb8::RunError::TimedOut => {
                OrmError::ConnectionError("SQLite pool checkout timed out".to_string())
            }
        }
    }
}
