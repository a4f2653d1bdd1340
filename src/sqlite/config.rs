use std::future::Future;
use std::sync::Arc;

use bb8::{ManageConnection, Pool};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::PoolConfig;
use crate::error::OrmError;

/// A rusqlite connection shared with the blocking thread that runs its statements.
pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// bb8 manager opening rusqlite connections on a blocking thread.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    path: String,
}

impl SqliteManager {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Build a pool sized from the config's `minsize` / `maxsize`.
    ///
    /// # Errors
    /// Returns `OrmError::ConfigError` when `db` is missing, or the error raised while opening
    /// the initial connections.
    pub async fn build_pool(config: &PoolConfig) -> Result<Pool<SqliteManager>, OrmError> {
        let path = config
            .db
            .clone()
            .ok_or_else(|| OrmError::ConfigError("db is required".to_string()))?;
        info!("create sqlite connection pool for {path}");
        Pool::builder()
            .max_size(config.maxsize)
            .min_idle(Some(config.minsize))
            .build(SqliteManager::new(path))
            .await
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = OrmError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let path = self.path.clone();
        async move {
            let conn = tokio::task::spawn_blocking(move || {
                let conn = rusqlite::Connection::open(&path)?;
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                Ok::<_, OrmError>(conn)
            })
            .await
            .map_err(|e| OrmError::ConnectionError(format!("sqlite open join error: {e}")))??;
            Ok(Arc::new(Mutex::new(conn)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let handle = Arc::clone(conn);
        async move {
            super::connection::run_blocking(handle, |guard| {
                // a checkout dropped mid-transaction comes back with the transaction still open
                if !guard.is_autocommit() {
                    warn!("rolling back transaction left open on a returned sqlite connection");
                    guard.execute_batch("ROLLBACK")?;
                }
                guard.execute_batch("SELECT 1")?;
                Ok(())
            })
            .await
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
