//! Schema derivation: turns a model's declared fields into column metadata and the four
//! canonical statements every model instance runs.

use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::error::OrmError;
use crate::field::FieldDescriptor;

/// Quote a column or table name as a backtick identifier, doubling embedded backticks.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `?,?,...` with `count` markers.
#[must_use]
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

/// Immutable per-model metadata plus precomputed SQL templates.
///
/// Built once per model type through [`Schema::builder`]; a built schema is never changed,
/// so it can be shared freely between tasks.
#[derive(Debug, Clone)]
pub struct Schema {
    model_name: String,
    table_name: String,
    primary_key: String,
    fields: Vec<String>,
    mappings: Vec<(String, FieldDescriptor)>,
    attribute_index: HashMap<String, usize>,
    column_to_attribute: HashMap<String, String>,
    escaped_columns: Vec<String>,
    select_template: String,
    insert_template: String,
    update_template: String,
    delete_template: String,
}

/// Collects field declarations for one model in declaration order.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    model_name: String,
    table_name: Option<String>,
    fields: Vec<(String, FieldDescriptor)>,
}

impl SchemaBuilder {
    /// Override the table name (defaults to the model name).
    #[must_use]
    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Declare `attribute`, mapped by `descriptor`.
    #[must_use]
    pub fn field(mut self, attribute: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.push((attribute.into(), descriptor));
        self
    }

    /// Derive the schema.
    ///
    /// # Errors
    /// Returns `OrmError::SchemaError` when no field or more than one field is marked as the
    /// primary key, when the key is a kind that cannot hold one, or when an attribute is
    /// declared twice.
    pub fn build(self) -> Result<Schema, OrmError> {
        let table_name = self
            .table_name
            .unwrap_or_else(|| self.model_name.clone());
        info!("found model: {} (table: {})", self.model_name, table_name);

        let mut seen = HashSet::new();
        let mut primary_key: Option<&str> = None;
        let mut fields = Vec::new();
        for (attribute, descriptor) in &self.fields {
            if !seen.insert(attribute.as_str()) {
                return Err(OrmError::SchemaError(format!(
                    "Duplicate field: {attribute}"
                )));
            }
            info!("  found mapping: {} ==> {}", attribute, descriptor);
            if descriptor.is_primary_key() {
                if !descriptor.kind().can_be_primary_key() {
                    return Err(OrmError::SchemaError(format!(
                        "Field {attribute} of kind {} cannot be a primary key",
                        descriptor.kind().label()
                    )));
                }
                if primary_key.is_some() {
                    return Err(OrmError::SchemaError(format!(
                        "Duplicate primary key for field: {attribute}"
                    )));
                }
                primary_key = Some(attribute.as_str());
            } else {
                fields.push(attribute.clone());
            }
        }
        let primary_key = primary_key
            .ok_or_else(|| OrmError::SchemaError("Primary key not found".to_string()))?
            .to_string();

        let attribute_index: HashMap<String, usize> = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, (attribute, _))| (attribute.clone(), i))
            .collect();
        let column_to_attribute: HashMap<String, String> = self
            .fields
            .iter()
            .map(|(attribute, descriptor)| {
                (descriptor.column_name(attribute).to_string(), attribute.clone())
            })
            .collect();

        let column_of = |attribute: &str| {
            let (attr, descriptor) = &self.fields[attribute_index[attribute]];
            descriptor.column_name(attr).to_string()
        };
        let escaped_columns: Vec<String> = fields
            .iter()
            .map(|f| quote_identifier(&column_of(f)))
            .collect();
        let pk = quote_identifier(&column_of(&primary_key));
        let table = quote_identifier(&table_name);

        let columns = escaped_columns.join(",");
        let select_template = if escaped_columns.is_empty() {
            format!("select {pk} from {table}")
        } else {
            format!("select {pk}, {columns} from {table}")
        };
        let insert_template = if escaped_columns.is_empty() {
            format!("insert into {table} ({pk}) values(?)")
        } else {
            format!(
                "insert into {table} ({pk}, {columns}) values({})",
                placeholders(fields.len() + 1)
            )
        };
        let assignments = escaped_columns
            .iter()
            .map(|c| format!("{c}=?"))
            .collect::<Vec<_>>()
            .join(",");
        let update_template = format!("update {table} set {assignments} where {pk} = ?");
        let delete_template = format!("delete from {table} where {pk} = ?");

        Ok(Schema {
            model_name: self.model_name,
            table_name,
            primary_key,
            fields,
            mappings: self.fields,
            attribute_index,
            column_to_attribute,
            escaped_columns,
            select_template,
            insert_template,
            update_template,
            delete_template,
        })
    }
}

impl Schema {
    /// Start declaring the fields of `model_name`.
    ///
    /// ```rust
    /// use sql_model_orm::prelude::*;
    ///
    /// let schema = Schema::builder("User")
    ///     .table("user")
    ///     .field("id", FieldDescriptor::integer().primary_key())
    ///     .field("name", FieldDescriptor::string())
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(schema.insert_template(), "insert into `user` (`id`, `name`) values(?,?)");
    /// ```
    #[must_use]
    pub fn builder(model_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            model_name: model_name.into(),
            table_name: None,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Attribute name holding the primary key.
    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Column name of the primary key.
    #[must_use]
    pub fn primary_key_column(&self) -> &str {
        self.column_name(&self.primary_key)
            .unwrap_or(self.primary_key.as_str())
    }

    /// Non-key attribute names in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Backtick-quoted non-key column names in declaration order.
    #[must_use]
    pub fn escaped_columns(&self) -> &[String] {
        &self.escaped_columns
    }

    /// All declared `(attribute, descriptor)` pairs in declaration order.
    #[must_use]
    pub fn mappings(&self) -> &[(String, FieldDescriptor)] {
        &self.mappings
    }

    #[must_use]
    pub fn descriptor(&self, attribute: &str) -> Option<&FieldDescriptor> {
        self.attribute_index
            .get(attribute)
            .map(|&idx| &self.mappings[idx].1)
    }

    #[must_use]
    pub fn column_name(&self, attribute: &str) -> Option<&str> {
        self.attribute_index.get(attribute).map(|&idx| {
            let (attr, descriptor) = &self.mappings[idx];
            descriptor.column_name(attr)
        })
    }

    /// Attribute mapped to `column`, if the column belongs to this model.
    #[must_use]
    pub fn attribute_for_column(&self, column: &str) -> Option<&str> {
        self.column_to_attribute.get(column).map(String::as_str)
    }

    #[must_use]
    pub fn select_template(&self) -> &str {
        &self.select_template
    }

    /// Arguments: `[primary key, ...fields]`.
    #[must_use]
    pub fn insert_template(&self) -> &str {
        &self.insert_template
    }

    /// Arguments: `[...fields, primary key]`.
    #[must_use]
    pub fn update_template(&self) -> &str {
        &self.update_template
    }

    /// Arguments: `[primary key]`.
    #[must_use]
    pub fn delete_template(&self) -> &str {
        &self.delete_template
    }

    /// `<select> where <pk> = ?`
    #[must_use]
    pub fn select_by_key_sql(&self) -> String {
        format!(
            "{} where {} = ?",
            self.select_template,
            quote_identifier(self.primary_key_column())
        )
    }

    /// `create table if not exists` statement built from the descriptors' column types.
    #[must_use]
    pub fn create_table_sql(&self) -> String {
        let columns = self
            .mappings
            .iter()
            .map(|(attribute, descriptor)| {
                let mut column = format!(
                    "{} {}",
                    quote_identifier(descriptor.column_name(attribute)),
                    descriptor.sql_type()
                );
                if descriptor.is_primary_key() {
                    column.push_str(" not null primary key");
                }
                column
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "create table if not exists {} ({columns})",
            quote_identifier(&self.table_name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_schema() -> Schema {
        Schema::builder("User")
            .table("t")
            .field("id", FieldDescriptor::integer().primary_key())
            .field("name", FieldDescriptor::string())
            .build()
            .unwrap()
    }

    #[test]
    fn templates_are_bit_exact() {
        let schema = user_schema();
        assert_eq!(schema.select_template(), "select `id`, `name` from `t`");
        assert_eq!(
            schema.insert_template(),
            "insert into `t` (`id`, `name`) values(?,?)"
        );
        assert_eq!(
            schema.update_template(),
            "update `t` set `name`=? where `id` = ?"
        );
        assert_eq!(schema.delete_template(), "delete from `t` where `id` = ?");
        assert_eq!(
            schema.select_by_key_sql(),
            "select `id`, `name` from `t` where `id` = ?"
        );
    }

    #[test]
    fn insert_placeholders_match_field_count() {
        for extra in 0..6 {
            let mut builder =
                Schema::builder("M").field("pk", FieldDescriptor::string().primary_key());
            for i in 0..extra {
                builder = builder.field(format!("f{i}"), FieldDescriptor::integer());
            }
            let schema = builder.build().unwrap();
            assert_eq!(schema.fields().len(), extra);
            assert_eq!(
                schema.insert_template().matches('?').count(),
                schema.fields().len() + 1
            );
            assert_eq!(
                schema.update_template().matches('?').count(),
                schema.fields().len() + 1
            );
        }
    }

    #[test]
    fn multiple_columns_keep_declaration_order() {
        let schema = Schema::builder("Blog")
            .field("name", FieldDescriptor::string())
            .field("id", FieldDescriptor::string().primary_key())
            .field("summary", FieldDescriptor::string().named("blog_summary"))
            .field("created_at", FieldDescriptor::float())
            .build()
            .unwrap();
        assert_eq!(schema.table_name(), "Blog");
        assert_eq!(schema.primary_key(), "id");
        assert_eq!(schema.fields(), ["name", "summary", "created_at"]);
        assert_eq!(
            schema.select_template(),
            "select `id`, `name`,`blog_summary`,`created_at` from `Blog`"
        );
        assert_eq!(
            schema.update_template(),
            "update `Blog` set `name`=?,`blog_summary`=?,`created_at`=? where `id` = ?"
        );
        assert_eq!(schema.attribute_for_column("blog_summary"), Some("summary"));
    }

    #[test]
    fn missing_primary_key_fails() {
        let err = Schema::builder("NoKey")
            .field("name", FieldDescriptor::string())
            .build()
            .unwrap_err();
        assert!(matches!(err, OrmError::SchemaError(ref m) if m == "Primary key not found"));
    }

    #[test]
    fn duplicate_primary_key_fails() {
        let err = Schema::builder("TwoKeys")
            .field("a", FieldDescriptor::integer().primary_key())
            .field("b", FieldDescriptor::string().primary_key())
            .build()
            .unwrap_err();
        assert!(
            matches!(err, OrmError::SchemaError(ref m) if m == "Duplicate primary key for field: b")
        );
    }

    #[test]
    fn primary_key_on_unsupported_kind_names_the_field() {
        let err = Schema::builder("Event")
            .field("at", FieldDescriptor::datetime().primary_key())
            .field("name", FieldDescriptor::string())
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            OrmError::SchemaError(ref m) if m == "Field at of kind DateTimeField cannot be a primary key"
        ));
    }

    #[test]
    fn duplicate_attribute_fails() {
        let err = Schema::builder("Twice")
            .field("id", FieldDescriptor::integer().primary_key())
            .field("name", FieldDescriptor::string())
            .field("name", FieldDescriptor::text())
            .build()
            .unwrap_err();
        assert!(matches!(err, OrmError::SchemaError(_)));
    }

    #[test]
    fn key_only_model_has_valid_select_and_insert() {
        let schema = Schema::builder("Tag")
            .field("label", FieldDescriptor::string().primary_key())
            .build()
            .unwrap();
        assert_eq!(schema.select_template(), "select `label` from `Tag`");
        assert_eq!(schema.insert_template(), "insert into `Tag` (`label`) values(?)");
    }

    #[test]
    fn identifiers_are_escaped() {
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn create_table_uses_sql_types() {
        let schema = user_schema();
        assert_eq!(
            schema.create_table_sql(),
            "create table if not exists `t` (`id` bigint not null primary key, `name` varchar(255))"
        );
    }
}
