use async_trait::async_trait;

use crate::error::OrmError;
use crate::results::DbRow;
use crate::translation::PlaceholderStyle;
use crate::types::RowValues;

/// One checked-out connection, as seen by the executor.
///
/// Statements handed to these methods are already translated to the driver's placeholder
/// syntax (see [`DbConnection::placeholder_style`]).
#[async_trait]
pub trait DbConnection: Send {
    /// Placeholder syntax the driver expects.
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Run one or more parameterless statements.
    async fn execute_batch(&mut self, sql: &str) -> Result<(), OrmError>;

    /// Run a query, fetching at most `limit` rows when given.
    async fn query(
        &mut self,
        sql: &str,
        params: &[RowValues],
        limit: Option<usize>,
    ) -> Result<Vec<DbRow>, OrmError>;

    /// Run a DML statement and return the number of rows affected.
    async fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, OrmError>;

    async fn begin(&mut self) -> Result<(), OrmError>;

    async fn commit(&mut self) -> Result<(), OrmError>;

    async fn rollback(&mut self) -> Result<(), OrmError>;
}
