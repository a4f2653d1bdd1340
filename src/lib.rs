//! A small async ORM over pooled `SQLite` and Postgres connections.
//!
//! Models are declared once with [`model!`]; the declaration is turned into a [`Schema`]
//! holding the column metadata and the select/insert/update/delete statements. Instances are
//! dynamic [`Record`]s, and the [`Model`] trait runs them through a [`Database`] pool.
//!
//! ```rust,no_run
//! use sql_model_orm::prelude::*;
//!
//! model! {
//!     pub struct User in "users" {
//!         id: FieldDescriptor::string_with_ddl("varchar(50)").primary_key(),
//!         email: FieldDescriptor::string(),
//!         admin: FieldDescriptor::boolean().with_default(false),
//!     }
//! }
//!
//! # async fn demo() -> Result<(), OrmError> {
//! let db = Database::connect(PoolConfig::new(DatabaseType::Sqlite, "root", "pw", "app.db")).await?;
//! db.execute_batch(&User::schema()?.create_table_sql()).await?;
//!
//! let mut user = User::with_values([("id", "u-1"), ("email", "a@example.com")])?;
//! user.save(&db).await?;
//!
//! let found = User::find(&db, "u-1".into()).await?;
//! assert_eq!(found.map(|u| u.value("admin")), Some(RowValues::Bool(false)));
//! # Ok(()) }
//! ```

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("enable at least one of the `sqlite` or `postgres` features");

pub mod prelude;

pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod field;
pub mod model;
pub mod pool;
pub mod results;
pub mod schema;
pub mod translation;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::PoolConfig;
pub use connection::DbConnection;
pub use error::OrmError;
pub use executor::{Database, execute_on, select_on};
pub use field::{FieldDefault, FieldDescriptor, FieldKind};
pub use model::{FindOptions, Limit, Model, Record};
pub use pool::{OrmPool, PooledConnection};
pub use results::DbRow;
pub use schema::{Schema, SchemaBuilder};
pub use translation::{PlaceholderStyle, translate_statement};
pub use types::{DatabaseType, RowValues};
