use async_trait::async_trait;

use crate::config::PoolConfig;
use crate::connection::DbConnection;
use crate::error::OrmError;
use crate::results::DbRow;
use crate::translation::PlaceholderStyle;
use crate::types::{DatabaseType, RowValues};

#[cfg(feature = "postgres")]
use crate::postgres::{PgManager, PostgresConnection};
#[cfg(feature = "sqlite")]
use crate::sqlite::{SqliteConnection, SqliteManager};

/// Bounded pool of connections for one backend.
#[derive(Clone)]
pub enum OrmPool {
    /// `SQLite` connection pool
    #[cfg(feature = "sqlite")]
    Sqlite(bb8::Pool<SqliteManager>),
    /// `PostgreSQL` connection pool
    #[cfg(feature = "postgres")]
    Postgres(bb8::Pool<PgManager>),
}

impl std::fmt::Debug for OrmPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => f.debug_tuple("Sqlite").field(&pool.state()).finish(),
            #[cfg(feature = "postgres")]
            Self::Postgres(pool) => f.debug_tuple("Postgres").field(&pool.state()).finish(),
        }
    }
}

impl OrmPool {
    /// Validate `config` and open the pool for its backend.
    ///
    /// # Errors
    /// Returns `OrmError::ConfigError` for invalid options or a backend that is not compiled
    /// in, and the driver's error if the initial connections cannot be opened.
    pub async fn create(config: &PoolConfig) -> Result<Self, OrmError> {
        config.validate()?;
        match config.backend {
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => Ok(OrmPool::Sqlite(SqliteManager::build_pool(config).await?)),
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => Ok(OrmPool::Postgres(PgManager::build_pool(config).await?)),
            #[allow(unreachable_patterns)]
            other => Err(OrmError::ConfigError(format!(
                "{other:?} support is not enabled in this build"
            ))),
        }
    }

    /// Check out a connection, waiting until one is free.
    ///
    /// The connection goes back to the pool when the returned value is dropped.
    ///
    /// # Errors
    /// Returns the pool's checkout error (timeout or failure to open a connection).
    pub async fn acquire(&self) -> Result<PooledConnection, OrmError> {
        match self {
            #[cfg(feature = "sqlite")]
            OrmPool::Sqlite(pool) => {
                let conn = pool.get_owned().await?;
                Ok(PooledConnection::Sqlite(SqliteConnection::new(conn)))
            }
            #[cfg(feature = "postgres")]
            OrmPool::Postgres(pool) => {
                let client = pool.get_owned().await?;
                Ok(PooledConnection::Postgres(PostgresConnection::new(client)))
            }
        }
    }

    /// `(connections, idle_connections)` currently held by the pool.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        let state = match self {
            #[cfg(feature = "sqlite")]
            OrmPool::Sqlite(pool) => pool.state(),
            #[cfg(feature = "postgres")]
            OrmPool::Postgres(pool) => pool.state(),
        };
        (state.connections, state.idle_connections)
    }
}

/// A connection checked out of an [`OrmPool`].
#[derive(Debug)]
pub enum PooledConnection {
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteConnection),
    #[cfg(feature = "postgres")]
    Postgres(PostgresConnection),
}

impl PooledConnection {
    fn inner(&mut self) -> &mut dyn DbConnection {
        match self {
            #[cfg(feature = "sqlite")]
            PooledConnection::Sqlite(conn) => conn,
            #[cfg(feature = "postgres")]
            PooledConnection::Postgres(conn) => conn,
        }
    }
}

#[async_trait]
impl DbConnection for PooledConnection {
    fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            #[cfg(feature = "sqlite")]
            PooledConnection::Sqlite(conn) => conn.placeholder_style(),
            #[cfg(feature = "postgres")]
            PooledConnection::Postgres(conn) => conn.placeholder_style(),
        }
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), OrmError> {
        self.inner().execute_batch(sql).await
    }

    async fn query(
        &mut self,
        sql: &str,
        params: &[RowValues],
        limit: Option<usize>,
    ) -> Result<Vec<DbRow>, OrmError> {
        self.inner().query(sql, params, limit).await
    }

    async fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, OrmError> {
        self.inner().execute(sql, params).await
    }

    async fn begin(&mut self) -> Result<(), OrmError> {
        self.inner().begin().await
    }

    async fn commit(&mut self) -> Result<(), OrmError> {
        self.inner().commit().await
    }

    async fn rollback(&mut self) -> Result<(), OrmError> {
        self.inner().rollback().await
    }
}
