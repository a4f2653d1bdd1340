use serde::{Deserialize, Serialize};

use crate::error::OrmError;
use crate::types::DatabaseType;

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_charset() -> String {
    "utf8".to_string()
}

fn default_true() -> bool {
    true
}

fn default_maxsize() -> u32 {
    10
}

fn default_minsize() -> u32 {
    1
}

/// Options used to build the connection pool.
///
/// `user`, `password` and `db` are required; everything else has a default. For `SQLite`
/// the `db` value is the database path (or `file:` URI) and the network options are unused.
///
/// ```rust
/// use sql_model_orm::prelude::*;
///
/// let cfg = PoolConfig::from_json_str(r#"{"user":"root","password":"pw","db":"blogs"}"#).unwrap();
/// assert_eq!(cfg.host, "localhost");
/// assert_eq!(cfg.port, 3306);
/// assert_eq!(cfg.maxsize, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default)]
    pub backend: DatabaseType,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: Option<String>,
    #[serde(default = "default_charset")]
    pub charset: String,
    /// When false, every mutation is wrapped in an explicit begin/commit.
    #[serde(default = "default_true")]
    pub autocommit: bool,
    #[serde(default = "default_maxsize")]
    pub maxsize: u32,
    #[serde(default = "default_minsize")]
    pub minsize: u32,
}

impl PoolConfig {
    /// Config with defaults and the three required options filled in.
    #[must_use]
    pub fn new(
        backend: DatabaseType,
        user: impl Into<String>,
        password: impl Into<String>,
        db: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            host: default_host(),
            port: default_port(),
            user: Some(user.into()),
            password: Some(password.into()),
            db: Some(db.into()),
            charset: default_charset(),
            autocommit: true,
            maxsize: default_maxsize(),
            minsize: default_minsize(),
        }
    }

    /// Parse a JSON object; absent keys take their defaults.
    ///
    /// # Errors
    /// Returns `OrmError::ConfigError` if the JSON is malformed or has wrongly typed values.
    pub fn from_json_str(json: &str) -> Result<Self, OrmError> {
        serde_json::from_str(json)
            .map_err(|e| OrmError::ConfigError(format!("invalid pool config: {e}")))
    }

    /// Build from `key=value` style pairs (`host`, `port`, `user`, `password`, `db`,
    /// `charset`, `autocommit`, `maxsize`, `minsize`, `backend`).
    ///
    /// # Errors
    /// Returns `OrmError::ConfigError` for unknown keys or values that do not parse.
    pub fn from_options<'a, I>(options: I) -> Result<Self, OrmError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut cfg = PoolConfig {
            backend: DatabaseType::default(),
            host: default_host(),
            port: default_port(),
            user: None,
            password: None,
            db: None,
            charset: default_charset(),
            autocommit: true,
            maxsize: default_maxsize(),
            minsize: default_minsize(),
        };
        for (key, value) in options {
            match key {
                "backend" => {
                    cfg.backend = <DatabaseType as clap::ValueEnum>::from_str(value, true)
                        .map_err(|e| OrmError::ConfigError(format!("backend: {e}")))?;
                }
                "host" => cfg.host = value.to_string(),
                "port" => cfg.port = parse_option(key, value)?,
                "user" => cfg.user = Some(value.to_string()),
                "password" => cfg.password = Some(value.to_string()),
                "db" => cfg.db = Some(value.to_string()),
                "charset" => cfg.charset = value.to_string(),
                "autocommit" => cfg.autocommit = parse_option(key, value)?,
                "maxsize" => cfg.maxsize = parse_option(key, value)?,
                "minsize" => cfg.minsize = parse_option(key, value)?,
                other => {
                    return Err(OrmError::ConfigError(format!(
                        "unknown pool option: {other}"
                    )));
                }
            }
        }
        Ok(cfg)
    }

    /// Check required options and pool bounds.
    ///
    /// # Errors
    /// Returns `OrmError::ConfigError` if `user`, `password` or `db` is missing, or if the
    /// pool size bounds are inconsistent.
    pub fn validate(&self) -> Result<(), OrmError> {
        if self.user.is_none() {
            return Err(OrmError::ConfigError("user is required".to_string()));
        }
        if self.password.is_none() {
            return Err(OrmError::ConfigError("password is required".to_string()));
        }
        if self.db.is_none() {
            return Err(OrmError::ConfigError("db is required".to_string()));
        }
        if self.maxsize == 0 {
            return Err(OrmError::ConfigError(
                "maxsize must be at least 1".to_string(),
            ));
        }
        if self.minsize > self.maxsize {
            return Err(OrmError::ConfigError(format!(
                "minsize ({}) exceeds maxsize ({})",
                self.minsize, self.maxsize
            )));
        }
        Ok(())
    }
}

fn parse_option<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, OrmError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| OrmError::ConfigError(format!("{key}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_applies_defaults() {
        let cfg =
            PoolConfig::from_json_str(r#"{"user":"root","password":"111111","db":"test"}"#)
                .unwrap();
        assert_eq!(cfg.backend, DatabaseType::Sqlite);
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 3306);
        assert_eq!(cfg.charset, "utf8");
        assert!(cfg.autocommit);
        assert_eq!((cfg.minsize, cfg.maxsize), (1, 10));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_required_options_fail_validation() {
        let cfg = PoolConfig::from_json_str(r#"{"user":"root","db":"test"}"#).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, OrmError::ConfigError(ref m) if m == "password is required"));

        let cfg = PoolConfig::from_options([("user", "root"), ("password", "x")]).unwrap();
        assert!(matches!(cfg.validate(), Err(OrmError::ConfigError(_))));
    }

    #[test]
    fn options_parse_typed_values() {
        let cfg = PoolConfig::from_options([
            ("backend", "postgres"),
            ("user", "app"),
            ("password", "secret"),
            ("db", "blogs"),
            ("port", "5432"),
            ("autocommit", "false"),
            ("maxsize", "4"),
            ("minsize", "2"),
        ])
        .unwrap();
        assert_eq!(cfg.backend, DatabaseType::Postgres);
        assert_eq!(cfg.port, 5432);
        assert!(!cfg.autocommit);
        assert_eq!((cfg.minsize, cfg.maxsize), (2, 4));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn bad_options_are_rejected() {
        assert!(PoolConfig::from_options([("port", "abc")]).is_err());
        assert!(PoolConfig::from_options([("loop", "x")]).is_err());
        let mut cfg = PoolConfig::new(DatabaseType::Sqlite, "u", "p", "db");
        cfg.minsize = 11;
        assert!(cfg.validate().is_err());
    }
}
