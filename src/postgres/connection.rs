use std::fmt;

use async_trait::async_trait;
use bb8::PooledConnection;

use crate::connection::DbConnection;
use crate::error::OrmError;
use crate::results::DbRow;
use crate::translation::PlaceholderStyle;
use crate::types::RowValues;

use super::config::PgManager;
use super::params::as_refs;
use super::query::build_rows;

/// Client checked out of the Postgres pool; returned to the pool on drop.
pub struct PostgresConnection {
    client: PooledConnection<'static, PgManager>,
}

impl PostgresConnection {
    pub(crate) fn new(client: PooledConnection<'static, PgManager>) -> Self {
        Self { client }
    }
}

impl fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConnection").finish_non_exhaustive()
    }
}

#[async_trait]
impl DbConnection for PostgresConnection {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Postgres
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), OrmError> {
        Ok(self.client.client.batch_execute(sql).await?)
    }

    async fn query(
        &mut self,
        sql: &str,
        params: &[RowValues],
        limit: Option<usize>,
    ) -> Result<Vec<DbRow>, OrmError> {
        let rows = self.client.client.query(sql, &as_refs(params)).await?;
        build_rows(&rows, limit)
    }

    async fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, OrmError> {
        let affected = self.client.client.execute(sql, &as_refs(params)).await?;
        usize::try_from(affected)
            .map_err(|e| OrmError::ExecutionError(format!("affected row count overflow: {e}")))
    }

    async fn begin(&mut self) -> Result<(), OrmError> {
        self.client.in_transaction = true;
        self.execute_batch("BEGIN").await
    }

    async fn commit(&mut self) -> Result<(), OrmError> {
        self.execute_batch("COMMIT").await?;
        self.client.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), OrmError> {
        self.execute_batch("ROLLBACK").await?;
        self.client.in_transaction = false;
        Ok(())
    }
}
