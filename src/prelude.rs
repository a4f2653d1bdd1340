//! Convenient imports for common functionality.
//!
//! ```rust
//! use sql_model_orm::prelude::*;
//! ```

pub use crate::config::PoolConfig;
pub use crate::connection::DbConnection;
pub use crate::error::OrmError;
pub use crate::executor::{Database, execute_on, select_on};
pub use crate::field::{FieldDefault, FieldDescriptor, FieldKind};
pub use crate::model;
pub use crate::model::{FindOptions, Limit, Model, Record};
pub use crate::pool::{OrmPool, PooledConnection};
pub use crate::results::DbRow;
pub use crate::schema::{Schema, SchemaBuilder};
pub use crate::translation::{PlaceholderStyle, translate_statement};
pub use crate::types::{DatabaseType, RowValues};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PgManager, PostgresConnection};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnection, SqliteManager};
