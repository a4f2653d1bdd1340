//! Model runtime: dynamic records scoped to a [`Schema`] and the CRUD operations every model
//! gets from the [`Model`] trait.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::OrmError;
use crate::executor::Database;
use crate::field::FieldKind;
use crate::results::DbRow;
use crate::schema::{Schema, quote_identifier};
use crate::translation::PlaceholderStyle;
use crate::types::RowValues;

/// Column alias used by [`Model::find_number`].
pub const NUMBER_ALIAS: &str = "_num_";

/// Attribute values of one model instance.
///
/// Values are sparse: an attribute that was never set is absent rather than `Null`.
#[derive(Clone)]
pub struct Record {
    schema: &'static Schema,
    values: HashMap<String, RowValues>,
}

impl Record {
    #[must_use]
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            values: HashMap::new(),
        }
    }

    /// Record pre-populated with `values`.
    #[must_use]
    pub fn with_values<I, K, V>(schema: &'static Schema, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RowValues>,
    {
        Self {
            schema,
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build a record from a returned row.
    ///
    /// Columns are mapped back to attribute names through the schema; columns the schema does
    /// not know keep their own name. Cells are coerced to the field kind where the driver
    /// reports a looser type (`SQLite` integers for booleans, text for datetimes).
    #[must_use]
    pub fn from_row(schema: &'static Schema, row: &DbRow) -> Self {
        let values = row
            .iter()
            .map(|(column, value)| {
                let attribute = schema.attribute_for_column(column).unwrap_or(column);
                let value = match schema.descriptor(attribute) {
                    Some(descriptor) => coerce(descriptor.kind(), value.clone()),
                    None => value.clone(),
                };
                (attribute.to_string(), value)
            })
            .collect();
        Self { schema, values }
    }

    #[must_use]
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    #[must_use]
    pub fn values(&self) -> &HashMap<String, RowValues> {
        &self.values
    }

    /// Read an attribute.
    ///
    /// A declared attribute that was never set reads as `Ok(None)`.
    ///
    /// # Errors
    /// Returns `OrmError::UnknownAttribute` when the name is neither set nor declared.
    pub fn get(&self, name: &str) -> Result<Option<&RowValues>, OrmError> {
        match self.values.get(name) {
            Some(value) => Ok(Some(value)),
            None if self.schema.descriptor(name).is_some() => Ok(None),
            None => Err(self.unknown(name)),
        }
    }

    /// The attribute's value, or `Null` when unset.
    #[must_use]
    pub fn value(&self, name: &str) -> RowValues {
        self.values.get(name).cloned().unwrap_or(RowValues::Null)
    }

    /// The attribute's value, falling back to the field default.
    ///
    /// A default is resolved at most once: it is stored on the record, so later reads see the
    /// same value even when the default comes from a factory.
    ///
    /// # Errors
    /// Returns `OrmError::UnknownAttribute` when `name` is not a declared field.
    pub fn value_or_default(&mut self, name: &str) -> Result<RowValues, OrmError> {
        match self.values.get(name) {
            Some(value) if !value.is_null() => return Ok(value.clone()),
            _ => {}
        }
        let descriptor = self
            .schema
            .descriptor(name)
            .ok_or_else(|| self.unknown(name))?;
        match descriptor.default_value().resolve() {
            Some(value) => {
                debug!("using default value for {name}: {value:?}");
                self.values.insert(name.to_string(), value.clone());
                Ok(value)
            }
            None => Ok(RowValues::Null),
        }
    }

    /// Insert or overwrite an attribute. Nothing is validated until the record hits the database.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<RowValues>) {
        self.values.insert(name.into(), value.into());
    }

    fn unknown(&self, name: &str) -> OrmError {
        OrmError::UnknownAttribute {
            model: self.schema.model_name().to_string(),
            attribute: name.to_string(),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.schema.model_name())
            .field("values", &self.values)
            .finish()
    }
}

/// An unset attribute and one holding `Null` compare equal, matching [`Record::value`].
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema)
            && self.values.iter().all(|(k, v)| other.value(k) == *v)
            && other.values.iter().all(|(k, v)| self.value(k) == *v)
    }
}

#[allow(clippy::cast_precision_loss)]
fn coerce(kind: FieldKind, value: RowValues) -> RowValues {
    match (kind, value) {
        (FieldKind::Boolean, RowValues::Int(i)) => RowValues::Bool(i != 0),
        (FieldKind::Float, RowValues::Int(i)) => RowValues::Float(i as f64),
        (FieldKind::DateTime, value @ RowValues::Text(_)) => match value.as_timestamp() {
            Some(ts) => RowValues::Timestamp(ts),
            None => value,
        },
        (_, value) => value,
    }
}

/// Access a schema registered in a `LazyLock`, re-raising a registration failure.
///
/// # Errors
/// Returns `OrmError::SchemaError` with the original message when registration failed.
pub fn registered(cell: &'static Result<Schema, OrmError>) -> Result<&'static Schema, OrmError> {
    match cell {
        Ok(schema) => Ok(schema),
        Err(OrmError::SchemaError(message)) => Err(OrmError::SchemaError(message.clone())),
        Err(other) => Err(OrmError::SchemaError(other.to_string())),
    }
}

/// Row limit for [`Model::find_all`]: a count, or an `(offset, count)` pair.
///
/// A count of `0` applies no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Count(i64),
    Range(i64, i64),
}

impl Limit {
    /// Parse a limit given as one or two integer values.
    ///
    /// # Errors
    /// Returns `OrmError::InvalidArgument` for any other shape.
    pub fn from_values(values: &[RowValues]) -> Result<Self, OrmError> {
        match values {
            [RowValues::Int(count)] => Ok(Limit::Count(*count)),
            [RowValues::Int(offset), RowValues::Int(count)] => Ok(Limit::Range(*offset, *count)),
            other => Err(OrmError::InvalidArgument(format!(
                "Invalid limit value: {other:?}"
            ))),
        }
    }
}

impl From<i64> for Limit {
    fn from(count: i64) -> Self {
        Limit::Count(count)
    }
}

impl From<i32> for Limit {
    fn from(count: i32) -> Self {
        Limit::Count(i64::from(count))
    }
}

impl From<(i64, i64)> for Limit {
    fn from((offset, count): (i64, i64)) -> Self {
        Limit::Range(offset, count)
    }
}

/// Filters for [`Model::find_all`]. Every part is optional.
///
/// ```rust
/// use sql_model_orm::prelude::*;
///
/// let opts = FindOptions::new()
///     .filter("`user_id` = ?", vec!["u-1".into()])
///     .order_by("`created_at` desc")
///     .limit((10, 5));
/// assert_eq!(opts.limit, Some(Limit::Range(10, 5)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub where_clause: Option<String>,
    pub args: Vec<RowValues>,
    pub order_by: Option<String>,
    pub limit: Option<Limit>,
}

impl FindOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, clause: impl Into<String>, args: Vec<RowValues>) -> Self {
        self.where_clause = Some(clause.into());
        self.args = args;
        self
    }

    #[must_use]
    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by = Some(clause.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Set the limit from raw values, as accepted by [`Limit::from_values`].
    ///
    /// # Errors
    /// Returns `OrmError::InvalidArgument` for a malformed limit.
    pub fn try_limit(mut self, values: &[RowValues]) -> Result<Self, OrmError> {
        self.limit = Some(Limit::from_values(values)?);
        Ok(self)
    }
}

/// Statement and arguments for a `find_all` call.
///
/// Blank `where` / `order by` clauses are left out, and `Limit::Count(0)` means no limit.
///
/// `SQLite` takes `limit offset, count`; Postgres has no such form, so ranges are rendered
/// as `limit count offset offset` there.
#[must_use]
pub fn find_all_statement(
    schema: &Schema,
    options: &FindOptions,
    style: PlaceholderStyle,
) -> (String, Vec<RowValues>) {
    let mut sql = schema.select_template().to_string();
    let mut args = Vec::new();
    if let Some(clause) = non_blank(options.where_clause.as_deref()) {
        sql.push_str(" where ");
        sql.push_str(clause);
        args.extend(options.args.iter().cloned());
    }
    if let Some(order) = non_blank(options.order_by.as_deref()) {
        sql.push_str(" order by ");
        sql.push_str(order);
    }
    match options.limit {
        Some(Limit::Count(0)) | None => {}
        Some(Limit::Count(count)) => {
            sql.push_str(" limit ?");
            args.push(RowValues::Int(count));
        }
        Some(Limit::Range(offset, count)) => match style {
            PlaceholderStyle::Sqlite => {
                sql.push_str(" limit ?, ?");
                args.push(RowValues::Int(offset));
                args.push(RowValues::Int(count));
            }
            PlaceholderStyle::Postgres => {
                sql.push_str(" limit ? offset ?");
                args.push(RowValues::Int(count));
                args.push(RowValues::Int(offset));
            }
        },
    }
    (sql, args)
}

fn non_blank(clause: Option<&str>) -> Option<&str> {
    clause.filter(|c| !c.trim().is_empty())
}

/// `select <expr> as _num_ from <table> [where <clause>]`
#[must_use]
pub fn find_number_statement(schema: &Schema, select_expr: &str, where_clause: Option<&str>) -> String {
    let mut sql = format!(
        "select {select_expr} as {NUMBER_ALIAS} from {}",
        quote_identifier(schema.table_name())
    );
    if let Some(clause) = where_clause {
        sql.push_str(" where ");
        sql.push_str(clause);
    }
    sql
}

/// CRUD operations shared by every model type.
///
/// Implementors only wire up the schema and the wrapped [`Record`]; the [`model!`](crate::model!)
/// macro does that for you.
#[async_trait]
pub trait Model: Sized + Send + Sync {
    /// The registered schema for this model type.
    ///
    /// # Errors
    /// Returns `OrmError::SchemaError` if the model's declaration is invalid.
    fn schema() -> Result<&'static Schema, OrmError>;

    fn from_record(record: Record) -> Self;

    fn record(&self) -> &Record;

    fn record_mut(&mut self) -> &mut Record;

    /// An instance with no attributes set.
    ///
    /// # Errors
    /// Returns `OrmError::SchemaError` if the model's declaration is invalid.
    fn new() -> Result<Self, OrmError> {
        Ok(Self::from_record(Record::new(Self::schema()?)))
    }

    /// An instance with the given attributes set.
    ///
    /// # Errors
    /// Returns `OrmError::SchemaError` if the model's declaration is invalid.
    fn with_values<I, K, V>(values: I) -> Result<Self, OrmError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RowValues>,
    {
        Ok(Self::from_record(Record::with_values(
            Self::schema()?,
            values,
        )))
    }

    /// Look up one instance by primary key.
    ///
    /// # Errors
    /// Returns the schema error, checkout error or driver error.
    async fn find(db: &Database, pk: RowValues) -> Result<Option<Self>, OrmError> {
        let schema = Self::schema()?;
        let rows = db.select(&schema.select_by_key_sql(), &[pk], Some(1)).await?;
        Ok(rows
            .first()
            .map(|row| Self::from_record(Record::from_row(schema, row))))
    }

    /// All instances matching `options`.
    ///
    /// # Errors
    /// Returns the schema error, checkout error or driver error.
    async fn find_all(db: &Database, options: FindOptions) -> Result<Vec<Self>, OrmError> {
        let schema = Self::schema()?;
        let (sql, args) = find_all_statement(schema, &options, db.backend().into());
        let rows = db.select(&sql, &args, None).await?;
        Ok(rows
            .iter()
            .map(|row| Self::from_record(Record::from_row(schema, row)))
            .collect())
    }

    /// Evaluate an aggregate such as `count(id)` over the model's table.
    ///
    /// # Errors
    /// Returns the schema error, checkout error or driver error.
    async fn find_number(
        db: &Database,
        select_expr: &str,
        where_clause: Option<&str>,
        args: &[RowValues],
    ) -> Result<Option<RowValues>, OrmError> {
        let schema = Self::schema()?;
        let sql = find_number_statement(schema, select_expr, where_clause);
        let rows = db.select(&sql, args, Some(1)).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get(NUMBER_ALIAS))
            .cloned())
    }

    /// Insert this instance, filling unset fields from their defaults.
    ///
    /// An affected row count other than 1 is logged, not returned as an error.
    ///
    /// # Errors
    /// Returns the schema error, checkout error or driver error.
    async fn save(&mut self, db: &Database) -> Result<(), OrmError> {
        let schema = Self::schema()?;
        let record = self.record_mut();
        let mut args = Vec::with_capacity(schema.fields().len() + 1);
        args.push(record.value_or_default(schema.primary_key())?);
        for field in schema.fields() {
            args.push(record.value_or_default(field)?);
        }
        let rows = db
            .execute(schema.insert_template(), &args, db.autocommit())
            .await?;
        if rows != 1 {
            warn!("failed to insert record: affected rows: {rows}");
        }
        Ok(())
    }

    /// Write every non-key field back by primary key. Defaults are not applied.
    ///
    /// # Errors
    /// Returns `OrmError::InvalidArgument` for a model without non-key fields, otherwise the
    /// schema error, checkout error or driver error.
    async fn update(&self, db: &Database) -> Result<(), OrmError> {
        let schema = Self::schema()?;
        if schema.fields().is_empty() {
            return Err(OrmError::InvalidArgument(format!(
                "{} has no fields to update",
                schema.model_name()
            )));
        }
        let record = self.record();
        let mut args: Vec<RowValues> = schema.fields().iter().map(|f| record.value(f)).collect();
        args.push(record.value(schema.primary_key()));
        let rows = db
            .execute(schema.update_template(), &args, db.autocommit())
            .await?;
        if rows != 1 {
            warn!("failed to update by primary key: affected rows: {rows}");
        }
        Ok(())
    }

    /// Delete this instance by primary key.
    ///
    /// # Errors
    /// Returns the schema error, checkout error or driver error.
    async fn remove(&self, db: &Database) -> Result<(), OrmError> {
        let schema = Self::schema()?;
        let args = [self.record().value(schema.primary_key())];
        let rows = db
            .execute(schema.delete_template(), &args, db.autocommit())
            .await?;
        if rows != 1 {
            warn!("failed to remove by primary key: affected rows: {rows}");
        }
        Ok(())
    }
}

/// Declare a model type backed by a [`Record`].
///
/// The schema is derived on first use and cached for the life of the process. The table name
/// defaults to the type name; `in "table"` overrides it.
///
/// ```rust
/// use sql_model_orm::prelude::*;
///
/// model! {
///     pub struct Blog in "blogs" {
///         id: FieldDescriptor::string_with_ddl("varchar(50)").primary_key(),
///         name: FieldDescriptor::string(),
///         created_at: FieldDescriptor::float(),
///     }
/// }
///
/// let schema = Blog::schema().unwrap();
/// assert_eq!(
///     schema.insert_template(),
///     "insert into `blogs` (`id`, `name`,`created_at`) values(?,?,?)"
/// );
/// let mut blog = Blog::new().unwrap();
/// blog.set("name", "notes");
/// assert_eq!(blog.value("name"), RowValues::Text("notes".into()));
/// ```
#[macro_export]
macro_rules! model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident $(in $table:literal)? {
            $($attr:ident : $field:expr),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name($crate::model::Record);

        impl $crate::model::Model for $name {
            fn schema() -> ::std::result::Result<&'static $crate::schema::Schema, $crate::error::OrmError> {
                static SCHEMA: ::std::sync::LazyLock<
                    ::std::result::Result<$crate::schema::Schema, $crate::error::OrmError>,
                > = ::std::sync::LazyLock::new(|| {
                    let builder = $crate::schema::Schema::builder(stringify!($name));
                    $(let builder = builder.table($table);)?
                    builder
                        $(.field(stringify!($attr), $field))*
                        .build()
                });
                $crate::model::registered(&SCHEMA)
            }

            fn from_record(record: $crate::model::Record) -> Self {
                Self(record)
            }

            fn record(&self) -> &$crate::model::Record {
                &self.0
            }

            fn record_mut(&mut self) -> &mut $crate::model::Record {
                &mut self.0
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::model::Record;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl ::std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::field::FieldDescriptor;

    static FACTORY_CALLS: AtomicUsize = AtomicUsize::new(0);

    crate::model! {
        struct Comment in "comments" {
            id: FieldDescriptor::string().primary_key(),
            blog_id: FieldDescriptor::string().named("blog"),
            votes: FieldDescriptor::integer(),
            pinned: FieldDescriptor::boolean(),
            posted: FieldDescriptor::float().with_default_fn(|| {
                FACTORY_CALLS.fetch_add(1, Ordering::SeqCst);
                RowValues::Float(1_700_000_000.5)
            }),
        }
    }

    crate::model! {
        struct TwoKeys {
            a: FieldDescriptor::integer().primary_key(),
            b: FieldDescriptor::integer().primary_key(),
        }
    }

    #[test]
    fn macro_registers_schema_once() {
        let first = Comment::schema().unwrap();
        let second = Comment::schema().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.table_name(), "comments");
        assert_eq!(
            first.select_template(),
            "select `id`, `blog`,`votes`,`pinned`,`posted` from `comments`"
        );
    }

    #[test]
    fn invalid_declaration_fails_before_any_instance() {
        let err = TwoKeys::new().unwrap_err();
        assert!(
            matches!(err, OrmError::SchemaError(ref m) if m == "Duplicate primary key for field: b")
        );
    }

    #[test]
    fn unknown_attribute_is_an_error() {
        let comment = Comment::new().unwrap();
        assert_eq!(comment.get("votes").unwrap(), None);
        let err = comment.get("nope").unwrap_err();
        assert_eq!(err.to_string(), "'Comment' object has no attribute 'nope'");
        assert_eq!(comment.value("nope"), RowValues::Null);
    }

    #[test]
    fn default_factory_runs_once_per_instance() {
        let mut comment = Comment::new().unwrap();
        let before = FACTORY_CALLS.load(Ordering::SeqCst);
        let first = comment.value_or_default("posted").unwrap();
        let second = comment.value_or_default("posted").unwrap();
        assert_eq!(first, second);
        assert_eq!(FACTORY_CALLS.load(Ordering::SeqCst), before + 1);
        assert_eq!(comment.get("posted").unwrap(), Some(&first));

        assert_eq!(comment.value_or_default("votes").unwrap(), RowValues::Int(0));
        assert_eq!(comment.value_or_default("blog_id").unwrap(), RowValues::Null);
        assert_eq!(comment.get("blog_id").unwrap(), None);
    }

    #[test]
    fn explicit_null_falls_back_to_default() {
        let mut comment = Comment::with_values([("votes", RowValues::Null)]).unwrap();
        assert_eq!(comment.value_or_default("votes").unwrap(), RowValues::Int(0));
    }

    #[test]
    fn rows_map_columns_back_to_attributes() {
        let schema = Comment::schema().unwrap();
        let row = DbRow::new(
            Arc::new(vec![
                "id".to_string(),
                "blog".to_string(),
                "pinned".to_string(),
                "posted".to_string(),
            ]),
            vec![
                RowValues::Text("c1".into()),
                RowValues::Text("b1".into()),
                RowValues::Int(1),
                RowValues::Int(3),
            ],
        );
        let record = Record::from_row(schema, &row);
        assert_eq!(record.value("blog_id"), RowValues::Text("b1".into()));
        assert_eq!(record.value("pinned"), RowValues::Bool(true));
        assert_eq!(record.value("posted"), RowValues::Float(3.0));
        assert!(record.get("blog").is_err());
    }

    #[test]
    fn find_all_statement_composes_clauses() {
        let schema = Comment::schema().unwrap();
        let options = FindOptions::new()
            .filter("`blog` = ?", vec!["b1".into()])
            .order_by("`posted` desc")
            .limit(5);
        let (sql, args) = find_all_statement(schema, &options, PlaceholderStyle::Sqlite);
        assert_eq!(
            sql,
            "select `id`, `blog`,`votes`,`pinned`,`posted` from `comments` where `blog` = ? order by `posted` desc limit ?"
        );
        assert_eq!(args, vec![RowValues::Text("b1".into()), RowValues::Int(5)]);
    }

    #[test]
    fn blank_clauses_and_zero_count_are_skipped() {
        let schema = Comment::schema().unwrap();
        let options = FindOptions::new()
            .filter("  ", vec!["ignored".into()])
            .order_by("")
            .limit(0);
        let (sql, args) = find_all_statement(schema, &options, PlaceholderStyle::Sqlite);
        assert_eq!(sql, schema.select_template());
        assert!(args.is_empty());
    }

    #[test]
    fn unset_and_null_attributes_compare_equal() {
        let mut left = Comment::with_values([("id", "c1")]).unwrap();
        let right = Comment::with_values([("id", RowValues::from("c1")), ("pinned", RowValues::Null)])
            .unwrap();
        assert_eq!(left, right);
        assert_eq!(right, left);
        left.set("pinned", true);
        assert_ne!(left, right);
    }

    #[test]
    fn range_limit_binds_offset_then_count() {
        let schema = Comment::schema().unwrap();
        let options = FindOptions::new().limit((10, 5));
        let (sql, args) = find_all_statement(schema, &options, PlaceholderStyle::Sqlite);
        assert!(sql.ends_with("from `comments` limit ?, ?"));
        assert_eq!(args, vec![RowValues::Int(10), RowValues::Int(5)]);

        let (sql, args) = find_all_statement(schema, &options, PlaceholderStyle::Postgres);
        assert!(sql.ends_with(" limit ? offset ?"));
        assert_eq!(args, vec![RowValues::Int(5), RowValues::Int(10)]);
    }

    #[test]
    fn malformed_limits_are_rejected() {
        assert_eq!(
            Limit::from_values(&[RowValues::Int(3)]).unwrap(),
            Limit::Count(3)
        );
        for bad in [
            vec![],
            vec![RowValues::Text("5".into())],
            vec![RowValues::Int(1), RowValues::Int(2), RowValues::Int(3)],
        ] {
            assert!(matches!(
                FindOptions::new().try_limit(&bad),
                Err(OrmError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn find_number_uses_alias() {
        let schema = Comment::schema().unwrap();
        assert_eq!(
            find_number_statement(schema, "count(id)", Some("`votes` > ?")),
            "select count(id) as _num_ from `comments` where `votes` > ?"
        );
    }
}
