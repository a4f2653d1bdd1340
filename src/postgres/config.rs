use std::future::Future;

use bb8::{ManageConnection, Pool};
use tokio_postgres::{Client, NoTls};
use tracing::{info, warn};

use crate::config::PoolConfig;
use crate::error::OrmError;

/// A pooled Postgres client plus whether it has a transaction open.
///
/// The flag is set by `begin` and cleared by `commit` / `rollback`; a client returned to the
/// pool with it still set is discarded instead of reused.
pub struct PgClient {
    pub(crate) client: Client,
    pub(crate) in_transaction: bool,
}

impl std::fmt::Debug for PgClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgClient")
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

/// bb8 manager for Postgres clients.
#[derive(Debug, Clone)]
pub struct PgManager {
    config: tokio_postgres::Config,
}

impl PgManager {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }

    /// Translate pool options into a driver config.
    ///
    /// # Errors
    /// Returns `OrmError::ConfigError` if `user`, `password` or `db` is missing.
    pub fn from_pool_config(config: &PoolConfig) -> Result<Self, OrmError> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .ok_or_else(|| OrmError::ConfigError(format!("{name} is required")))
        };
        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .user(&required(&config.user, "user")?)
            .password(&required(&config.password, "password")?)
            .dbname(&required(&config.db, "db")?)
            .options(&format!("-c client_encoding={}", config.charset));
        Ok(Self::new(pg))
    }

    /// Build a pool sized from the config's `minsize` / `maxsize`.
    ///
    /// # Errors
    /// Returns `OrmError::ConfigError` for incomplete options, or the driver error raised while
    /// opening the initial connections.
    pub async fn build_pool(config: &PoolConfig) -> Result<Pool<PgManager>, OrmError> {
        let manager = Self::from_pool_config(config)?;
        info!(
            "create postgres connection pool for {}:{}",
            config.host, config.port
        );
        Ok(Pool::builder()
            .max_size(config.maxsize)
            .min_idle(Some(config.minsize))
            .build(manager)
            .await?)
    }
}

impl ManageConnection for PgManager {
    type Connection = PgClient;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        async move {
            let (client, connection) = cfg.connect(NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!("postgres connection closed with error: {e}");
                }
            });
            Ok(PgClient {
                client,
                in_transaction: false,
            })
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.client.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        if conn.in_transaction {
            warn!("discarding postgres connection returned with an open transaction");
            return true;
        }
        conn.client.is_closed()
    }
}
