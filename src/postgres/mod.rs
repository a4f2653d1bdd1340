// PostgreSQL backend.
//
// - config: bb8 connection manager and pool setup
// - params: `ToSql` for `RowValues`
// - query: row extraction
// - connection: the pooled client

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{PgClient, PgManager};
pub use connection::PostgresConnection;
