use std::sync::Arc;

use tracing::info;

use crate::config::PoolConfig;
use crate::connection::DbConnection;
use crate::error::OrmError;
use crate::pool::{OrmPool, PooledConnection};
use crate::results::DbRow;
use crate::translation::translate_statement;
use crate::types::{DatabaseType, RowValues};

/// Handle to a connection pool plus the options it was built from.
///
/// Cloning is cheap; clones share the same pool.
///
/// ```rust,no_run
/// use sql_model_orm::prelude::*;
///
/// # async fn demo() -> Result<(), OrmError> {
/// let db = Database::connect(PoolConfig::new(DatabaseType::Sqlite, "root", "pw", "blog.db")).await?;
/// db.execute_batch("create table if not exists t (id bigint primary key, name text)").await?;
/// let inserted = db
///     .execute("insert into t (id, name) values (?, ?)", &[1.into(), "a".into()], true)
///     .await?;
/// assert_eq!(inserted, 1);
/// let rows = db.select("select id, name from t", &[], None).await?;
/// assert_eq!(rows.len(), 1);
/// # Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: OrmPool,
    config: Arc<PoolConfig>,
}

impl Database {
    /// Validate `config` and build the pool.
    ///
    /// # Errors
    /// Returns `OrmError::ConfigError` for missing or inconsistent options, or the driver error
    /// raised while opening the initial connections.
    pub async fn connect(config: PoolConfig) -> Result<Self, OrmError> {
        info!("create database connection pool...");
        let pool = OrmPool::create(&config).await?;
        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    /// Check out a connection; it returns to the pool when dropped.
    ///
    /// # Errors
    /// Returns the pool checkout error.
    pub async fn acquire(&self) -> Result<PooledConnection, OrmError> {
        self.pool.acquire().await
    }

    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> DatabaseType {
        self.config.backend
    }

    /// Autocommit mode configured for the pool; model mutations run with it.
    #[must_use]
    pub fn autocommit(&self) -> bool {
        self.config.autocommit
    }

    #[must_use]
    pub fn pool(&self) -> &OrmPool {
        &self.pool
    }

    /// Run a query written with `?` placeholders, fetching at most `limit` rows when given.
    ///
    /// # Errors
    /// Returns the checkout error or the driver error unchanged.
    pub async fn select(
        &self,
        sql: &str,
        args: &[RowValues],
        limit: Option<usize>,
    ) -> Result<Vec<DbRow>, OrmError> {
        let mut conn = self.acquire().await?;
        select_on(&mut conn, sql, args, limit).await
    }

    /// Run a mutation written with `?` placeholders and return the affected row count.
    ///
    /// With `autocommit == false` the statement runs inside an explicit transaction.
    ///
    /// # Errors
    /// Returns the statement's error unchanged after rolling back, or
    /// `OrmError::RollbackFailed` when the rollback fails as well.
    pub async fn execute(
        &self,
        sql: &str,
        args: &[RowValues],
        autocommit: bool,
    ) -> Result<usize, OrmError> {
        let mut conn = self.acquire().await?;
        execute_on(&mut conn, sql, args, autocommit).await
    }

    /// Run parameterless statements (DDL, pragmas) on one connection.
    ///
    /// # Errors
    /// Returns the checkout error or the driver error unchanged.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), OrmError> {
        let mut conn = self.acquire().await?;
        info!("SQL: {sql}");
        let stmt = translate_statement(sql, conn.placeholder_style());
        conn.execute_batch(&stmt).await
    }
}

/// Translate, bind and run a query on an already checked-out connection.
///
/// # Errors
/// Returns the driver error unchanged.
pub async fn select_on<C>(
    conn: &mut C,
    sql: &str,
    args: &[RowValues],
    limit: Option<usize>,
) -> Result<Vec<DbRow>, OrmError>
where
    C: DbConnection + ?Sized,
{
    info!("SQL: {sql} args: {args:?}");
    let stmt = translate_statement(sql, conn.placeholder_style());
    let rows = conn.query(&stmt, args, limit).await?;
    info!("rows returned: {}", rows.len());
    Ok(rows)
}

/// Translate, bind and run a mutation on an already checked-out connection.
///
/// Outside autocommit mode this issues `begin`, runs the statement and `commit`s. Any failure
/// is followed by a `rollback` before the original error is returned.
///
/// # Errors
/// Returns the original error after a successful rollback, or `OrmError::RollbackFailed` when
/// the rollback fails too.
pub async fn execute_on<C>(
    conn: &mut C,
    sql: &str,
    args: &[RowValues],
    autocommit: bool,
) -> Result<usize, OrmError>
where
    C: DbConnection + ?Sized,
{
    info!("SQL: {sql} args: {args:?}");
    let stmt = translate_statement(sql, conn.placeholder_style());
    if autocommit {
        return conn.execute(&stmt, args).await;
    }

    conn.begin().await?;
    let outcome = match conn.execute(&stmt, args).await {
        Ok(affected) => conn.commit().await.map(|()| affected),
        Err(e) => Err(e),
    };
    match outcome {
        Ok(affected) => Ok(affected),
        Err(original) => match conn.rollback().await {
            Ok(()) => Err(original),
            Err(rollback) => Err(OrmError::RollbackFailed {
                original: Box::new(original),
                rollback: Box::new(rollback),
            }),
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::translation::PlaceholderStyle;

    /// Connection double that records every call and fails on request.
    #[derive(Default)]
    pub(crate) struct ScriptedConnection {
        pub calls: Vec<String>,
        pub rows: Vec<DbRow>,
        pub affected: usize,
        pub fail_execute: bool,
        pub fail_commit: bool,
        pub fail_rollback: bool,
        pub postgres: bool,
    }

    #[async_trait]
    impl DbConnection for ScriptedConnection {
        fn placeholder_style(&self) -> PlaceholderStyle {
            if self.postgres {
                PlaceholderStyle::Postgres
            } else {
                PlaceholderStyle::Sqlite
            }
        }

        async fn execute_batch(&mut self, sql: &str) -> Result<(), OrmError> {
            self.calls.push(format!("batch {sql}"));
            Ok(())
        }

        async fn query(
            &mut self,
            sql: &str,
            params: &[RowValues],
            limit: Option<usize>,
        ) -> Result<Vec<DbRow>, OrmError> {
            self.calls
                .push(format!("query {sql} {params:?} limit={limit:?}"));
            let mut rows = self.rows.clone();
            if let Some(limit) = limit {
                rows.truncate(limit);
            }
            Ok(rows)
        }

        async fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, OrmError> {
            self.calls.push(format!("execute {sql} {params:?}"));
            if self.fail_execute {
                return Err(OrmError::ExecutionError("UNIQUE constraint failed".into()));
            }
            Ok(self.affected)
        }

        async fn begin(&mut self) -> Result<(), OrmError> {
            self.calls.push("begin".into());
            Ok(())
        }

        async fn commit(&mut self) -> Result<(), OrmError> {
            self.calls.push("commit".into());
            if self.fail_commit {
                return Err(OrmError::ExecutionError("database is locked".into()));
            }
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), OrmError> {
            self.calls.push("rollback".into());
            if self.fail_rollback {
                return Err(OrmError::ConnectionError("connection reset".into()));
            }
            Ok(())
        }
    }

    fn row(id: i64) -> DbRow {
        DbRow::new(Arc::new(vec!["id".to_string()]), vec![RowValues::Int(id)])
    }

    #[tokio::test]
    async fn autocommit_skips_transaction_calls() {
        let mut conn = ScriptedConnection {
            affected: 1,
            ..Default::default()
        };
        let n = execute_on(&mut conn, "delete from `t` where `id` = ?", &[1.into()], true)
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(conn.calls, vec!["execute delete from `t` where `id` = ?1 [Int(1)]"]);
    }

    #[tokio::test]
    async fn explicit_transaction_commits_on_success() {
        let mut conn = ScriptedConnection {
            affected: 1,
            ..Default::default()
        };
        execute_on(&mut conn, "update `t` set `name`=? where `id` = ?", &["a".into(), 1.into()], false)
            .await
            .unwrap();
        assert_eq!(conn.calls.first().map(String::as_str), Some("begin"));
        assert_eq!(conn.calls.last().map(String::as_str), Some("commit"));
        assert!(!conn.calls.iter().any(|c| c == "rollback"));
    }

    #[tokio::test]
    async fn failure_rolls_back_before_error_is_returned() {
        let mut conn = ScriptedConnection {
            fail_execute: true,
            ..Default::default()
        };
        let err = execute_on(&mut conn, "insert into `t` (`id`) values(?)", &[1.into()], false)
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::ExecutionError(ref m) if m == "UNIQUE constraint failed"));
        assert_eq!(conn.calls.len(), 3);
        assert_eq!(conn.calls[0], "begin");
        assert_eq!(conn.calls[2], "rollback");
    }

    #[tokio::test]
    async fn commit_failure_also_rolls_back() {
        let mut conn = ScriptedConnection {
            affected: 1,
            fail_commit: true,
            ..Default::default()
        };
        let err = execute_on(&mut conn, "delete from `t`", &[], false)
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::ExecutionError(_)));
        assert_eq!(conn.calls.last().map(String::as_str), Some("rollback"));
    }

    #[tokio::test]
    async fn rollback_failure_is_reported_with_original() {
        let mut conn = ScriptedConnection {
            fail_execute: true,
            fail_rollback: true,
            ..Default::default()
        };
        let err = execute_on(&mut conn, "delete from `t`", &[], false)
            .await
            .unwrap_err();
        match err {
            OrmError::RollbackFailed { original, rollback } => {
                assert!(matches!(*original, OrmError::ExecutionError(_)));
                assert!(matches!(*rollback, OrmError::ConnectionError(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn select_translates_and_caps_rows() {
        let mut conn = ScriptedConnection {
            rows: vec![row(1), row(2), row(3)],
            postgres: true,
            ..Default::default()
        };
        let rows = select_on(&mut conn, "select `id` from `t` where `id` > ?", &[0.into()], Some(2))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            conn.calls,
            vec![r#"query select "id" from "t" where "id" > $1 [Int(0)] limit=Some(2)"#]
        );
    }
}
