// SQLite backend.
//
// - config: bb8 connection manager and pool setup
// - params: conversion from `RowValues` to rusqlite values
// - query: row extraction
// - connection: the pooled connection driven through `spawn_blocking`

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{SharedSqliteConnection, SqliteManager};
pub use connection::SqliteConnection;
