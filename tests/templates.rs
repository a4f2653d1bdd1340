use sql_model_orm::prelude::*;

model! {
    pub struct User in "users" {
        id: FieldDescriptor::string_with_ddl("varchar(50)").primary_key(),
        email: FieldDescriptor::string_with_ddl("varchar(50)"),
        passwd: FieldDescriptor::string_with_ddl("varchar(50)"),
        admin: FieldDescriptor::boolean(),
        image: FieldDescriptor::string_with_ddl("varchar(500)").named("avatar"),
    }
}

model! {
    struct Tag {
        name: FieldDescriptor::string().primary_key(),
    }
}

model! {
    struct Keyless {
        title: FieldDescriptor::string(),
    }
}

#[test]
fn templates_follow_declaration_order() {
    let schema = User::schema().unwrap();
    assert_eq!(schema.primary_key(), "id");
    assert_eq!(schema.fields(), ["email", "passwd", "admin", "image"]);
    assert_eq!(
        schema.select_template(),
        "select `id`, `email`,`passwd`,`admin`,`avatar` from `users`"
    );
    assert_eq!(
        schema.insert_template(),
        "insert into `users` (`id`, `email`,`passwd`,`admin`,`avatar`) values(?,?,?,?,?)"
    );
    assert_eq!(
        schema.update_template(),
        "update `users` set `email`=?,`passwd`=?,`admin`=?,`avatar`=? where `id` = ?"
    );
    assert_eq!(schema.delete_template(), "delete from `users` where `id` = ?");
    assert_eq!(
        schema.insert_template().matches('?').count(),
        schema.fields().len() + 1
    );
}

#[test]
fn key_only_model_renders_without_column_list() {
    let schema = Tag::schema().unwrap();
    assert_eq!(schema.table_name(), "Tag");
    assert_eq!(schema.select_template(), "select `name` from `Tag`");
    assert_eq!(schema.insert_template(), "insert into `Tag` (`name`) values(?)");
}

#[test]
fn missing_primary_key_surfaces_on_first_use() {
    let err = Keyless::new().unwrap_err();
    assert!(matches!(err, OrmError::SchemaError(ref m) if m == "Primary key not found"));
    // registration is not retried
    assert!(Keyless::schema().is_err());
}

#[test]
fn postgres_templates_use_numbered_markers() {
    let schema = User::schema().unwrap();
    assert_eq!(
        translate_statement(schema.update_template(), PlaceholderStyle::Postgres),
        r#"update "users" set "email"=$1,"passwd"=$2,"admin"=$3,"avatar"=$4 where "id" = $5"#
    );
    assert_eq!(
        translate_statement(&schema.select_by_key_sql(), PlaceholderStyle::Sqlite),
        "select `id`, `email`,`passwd`,`admin`,`avatar` from `users` where `id` = ?1"
    );
}
