//! Field descriptors: the per-column metadata a model declares.
//!
//! Descriptors are plain values. Nothing here touches a database; defaults are only resolved
//! when a record reads an unset field.

use std::fmt;
use std::sync::Arc;

use crate::types::RowValues;

/// Built-in column kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    DateTime,
    Text,
    Boolean,
}

impl FieldKind {
    /// Column type used when the descriptor does not override it.
    #[must_use]
    pub fn default_sql_type(self) -> &'static str {
        match self {
            FieldKind::String => "varchar(255)",
            FieldKind::Integer => "bigint",
            FieldKind::Float => "real",
            FieldKind::DateTime => "datetime",
            FieldKind::Text => "text",
            FieldKind::Boolean => "boolean",
        }
    }

    /// Whether a field of this kind may be the primary key.
    #[must_use]
    pub fn can_be_primary_key(self) -> bool {
        matches!(self, FieldKind::String | FieldKind::Integer | FieldKind::Float)
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            FieldKind::String => "StringField",
            FieldKind::Integer => "IntegerField",
            FieldKind::Float => "FloatField",
            FieldKind::DateTime => "DateTimeField",
            FieldKind::Text => "TextField",
            FieldKind::Boolean => "BooleanField",
        }
    }
}

/// Default value of a field: nothing, a literal, or a zero-argument factory.
#[derive(Clone, Default)]
pub enum FieldDefault {
    #[default]
    None,
    Literal(RowValues),
    Factory(Arc<dyn Fn() -> RowValues + Send + Sync>),
}

impl FieldDefault {
    /// Produce the default value, invoking the factory if there is one.
    #[must_use]
    pub fn resolve(&self) -> Option<RowValues> {
        match self {
            FieldDefault::None => None,
            FieldDefault::Literal(value) => Some(value.clone()),
            FieldDefault::Factory(factory) => Some(factory()),
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, FieldDefault::None)
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::None => f.write_str("None"),
            FieldDefault::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            FieldDefault::Factory(_) => f.write_str("Factory(<fn>)"),
        }
    }
}

/// Describes one mapped column.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    kind: FieldKind,
    name: Option<String>,
    sql_type: String,
    primary_key: bool,
    default: FieldDefault,
}

impl FieldDescriptor {
    fn new(kind: FieldKind, default: FieldDefault) -> Self {
        Self {
            kind,
            name: None,
            sql_type: kind.default_sql_type().to_string(),
            primary_key: false,
            default,
        }
    }

    /// `varchar(255)` column, no default.
    #[must_use]
    pub fn string() -> Self {
        Self::new(FieldKind::String, FieldDefault::None)
    }

    /// String column with a caller-chosen DDL type, e.g. `varchar(50)`.
    #[must_use]
    pub fn string_with_ddl(ddl: impl Into<String>) -> Self {
        let mut field = Self::string();
        field.sql_type = ddl.into();
        field
    }

    /// `bigint` column defaulting to `0`.
    #[must_use]
    pub fn integer() -> Self {
        Self::new(FieldKind::Integer, FieldDefault::Literal(RowValues::Int(0)))
    }

    /// `real` column defaulting to `0.0`.
    #[must_use]
    pub fn float() -> Self {
        Self::new(FieldKind::Float, FieldDefault::Literal(RowValues::Float(0.0)))
    }

    /// `datetime` column, no default. Never a primary key.
    #[must_use]
    pub fn datetime() -> Self {
        Self::new(FieldKind::DateTime, FieldDefault::None)
    }

    /// `text` column, no default. Never a primary key.
    #[must_use]
    pub fn text() -> Self {
        Self::new(FieldKind::Text, FieldDefault::None)
    }

    /// `boolean` column, no default. Never a primary key.
    #[must_use]
    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean, FieldDefault::None)
    }

    /// Use `name` as the column name instead of the attribute name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the field as the primary key.
    ///
    /// Only string, integer and float fields can hold the primary key; schema registration
    /// rejects the flag on other kinds.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, value: impl Into<RowValues>) -> Self {
        self.default = FieldDefault::Literal(value.into());
        self
    }

    /// Default computed on first read of an unset field, e.g. a timestamp or generated id.
    #[must_use]
    pub fn with_default_fn<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> RowValues + Send + Sync + 'static,
    {
        self.default = FieldDefault::Factory(Arc::new(factory));
        self
    }

    #[must_use]
    pub fn no_default(mut self) -> Self {
        self.default = FieldDefault::None;
        self
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Explicit column name, if one was given.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn sql_type(&self) -> &str {
        &self.sql_type
    }

    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    #[must_use]
    pub fn default_value(&self) -> &FieldDefault {
        &self.default
    }

    /// Column name for this field when declared as `attribute`.
    #[must_use]
    pub fn column_name<'a>(&'a self, attribute: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(attribute)
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}, {}: {}>",
            self.kind.label(),
            self.sql_type,
            self.name.as_deref().unwrap_or("None")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_follow_kind() {
        assert_eq!(FieldDescriptor::string().sql_type(), "varchar(255)");
        assert_eq!(FieldDescriptor::integer().sql_type(), "bigint");
        assert_eq!(FieldDescriptor::float().sql_type(), "real");
        assert_eq!(FieldDescriptor::text().sql_type(), "text");
        assert_eq!(
            FieldDescriptor::integer().default_value().resolve(),
            Some(RowValues::Int(0))
        );
        assert!(FieldDescriptor::string().default_value().is_none());
    }

    #[test]
    fn only_some_kinds_can_hold_the_key() {
        assert!(FieldKind::String.can_be_primary_key());
        assert!(FieldKind::Float.can_be_primary_key());
        assert!(!FieldKind::DateTime.can_be_primary_key());
        assert!(!FieldKind::Boolean.can_be_primary_key());
        assert!(FieldDescriptor::text().primary_key().is_primary_key());
    }

    #[test]
    fn column_name_falls_back_to_attribute() {
        let field = FieldDescriptor::string();
        assert_eq!(field.column_name("email"), "email");
        let field = field.named("email_address");
        assert_eq!(field.column_name("email"), "email_address");
    }

    #[test]
    fn factory_default_is_invoked_each_resolve() {
        use std::sync::atomic::{AtomicI64, Ordering};
        let counter = Arc::new(AtomicI64::new(0));
        let c = Arc::clone(&counter);
        let field = FieldDescriptor::integer()
            .with_default_fn(move || RowValues::Int(c.fetch_add(1, Ordering::SeqCst) + 10));
        assert_eq!(field.default_value().resolve(), Some(RowValues::Int(10)));
        assert_eq!(field.default_value().resolve(), Some(RowValues::Int(11)));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn display_matches_log_format() {
        let field = FieldDescriptor::string().named("email");
        assert_eq!(field.to_string(), "<StringField, varchar(255): email>");
    }
}
