use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bb8::PooledConnection;

use crate::connection::DbConnection;
use crate::error::OrmError;
use crate::results::DbRow;
use crate::translation::PlaceholderStyle;
use crate::types::RowValues;

use super::config::{SharedSqliteConnection, SqliteManager};
use super::params::Params;
use super::query::build_rows;

/// Connection checked out of the `SQLite` pool; returned to the pool on drop.
pub struct SqliteConnection {
    conn: PooledConnection<'static, SqliteManager>,
}

impl SqliteConnection {
    pub(crate) fn new(conn: PooledConnection<'static, SqliteManager>) -> Self {
        Self { conn }
    }

    fn conn_handle(&self) -> SharedSqliteConnection {
        Arc::clone(&*self.conn)
    }

    /// Run synchronous rusqlite work on this connection from a blocking thread.
    ///
    /// # Errors
    /// Returns whatever the closure returns, or `OrmError::ExecutionError` if the blocking
    /// task could not be joined.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, OrmError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, OrmError> + Send + 'static,
        R: Send + 'static,
    {
        run_blocking(self.conn_handle(), func).await
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection").finish_non_exhaustive()
    }
}

pub(crate) async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, OrmError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, OrmError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| OrmError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}

#[async_trait]
impl DbConnection for SqliteConnection {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Sqlite
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), OrmError> {
        let sql_owned = sql.to_owned();
        self.with_connection(move |guard| Ok(guard.execute_batch(&sql_owned)?))
            .await
    }

    async fn query(
        &mut self,
        sql: &str,
        params: &[RowValues],
        limit: Option<usize>,
    ) -> Result<Vec<DbRow>, OrmError> {
        let sql_owned = sql.to_owned();
        let params = Params::convert(params);
        self.with_connection(move |guard| {
            let mut stmt = guard.prepare(&sql_owned)?;
            build_rows(&mut stmt, &params.0, limit)
        })
        .await
    }

    async fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, OrmError> {
        let sql_owned = sql.to_owned();
        let params = Params::convert(params);
        self.with_connection(move |guard| {
            let mut stmt = guard.prepare_cached(&sql_owned)?;
            Ok(stmt.execute(&params.as_refs()[..])?)
        })
        .await
    }

    async fn begin(&mut self) -> Result<(), OrmError> {
        self.execute_batch("BEGIN").await
    }

    async fn commit(&mut self) -> Result<(), OrmError> {
        self.execute_batch("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), OrmError> {
        self.execute_batch("ROLLBACK").await
    }
}
