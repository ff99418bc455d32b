//! SQL emission for the one normative dialect (§4.6): canonical "SQL
//! Server style", bracket-quoted identifiers, schema-qualified names.

use schema_core::model::{FieldModel, ForeignKeyModel, IndexKind, IndexModel};
use schema_core::types::{sql_type_string, SqlType};

fn bracket(ident: &str) -> String {
    format!("[{ident}]")
}

fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", bracket(schema), bracket(table))
}

fn column_def(field: &FieldModel) -> String {
    let ty = sql_type_string(field);
    let identity = if field.is_identity { " IDENTITY(1,1)" } else { "" };
    let null = if field.is_nullable { "NULL" } else { "NOT NULL" };
    format!("{} {ty}{identity} {null}", bracket(&field.name))
}

/// Default literal for a freshly-added NOT NULL column, by type family
/// (§4.6): integer/decimal/float get `0` (`1` if the column name ends in
/// `ID`), `bit` gets `0`, datetime gets `GETDATE()`, character/text types
/// get `''`, `uniqueidentifier` gets `NEWID()`.
pub fn default_literal_for(field: &FieldModel) -> String {
    use SqlType::*;
    match field.sql_type {
        Int | BigInt | SmallInt | TinyInt | Decimal | Numeric | Float | Money | SmallMoney => {
            if field.name.to_ascii_uppercase().ends_with("ID") {
                "1".to_string()
            } else {
                "0".to_string()
            }
        }
        Bit => "0".to_string(),
        DateTime => "GETDATE()".to_string(),
        VarChar | NVarChar | Char | NChar | Text | NText => "''".to_string(),
        UniqueIdentifier => "NEWID()".to_string(),
        Binary | VarBinary => "0x".to_string(),
        Unsupported => "NULL".to_string(),
    }
}

/// `CREATE TABLE [schema].[T] (col-defs, CONSTRAINT [PK_T] PRIMARY KEY ([pkField]))`.
pub fn create_table_sql(schema: &str, table: &str, fields: &[FieldModel]) -> String {
    let pk = fields.iter().find(|f| f.is_primary_key).expect("CreateTable step always carries its PK field");
    let cols: Vec<String> = fields.iter().map(column_def).collect();
    format!(
        "CREATE TABLE {} ({}, CONSTRAINT {} PRIMARY KEY ({}))",
        qualified(schema, table),
        cols.join(", "),
        bracket(&format!("PK_{table}")),
        bracket(&pk.name)
    )
}

/// `ALTER TABLE [T] ADD [c] <typeSql> <NULL|NOT NULL> <defaultSql>`, plus a
/// second statement dropping the synthetic default constraint when the
/// column is nullable (§4.6: "queries `sys.default_constraints`").
pub fn add_column_sql(schema: &str, table: &str, field: &FieldModel) -> Vec<String> {
    let ty = sql_type_string(field);
    let null = if field.is_nullable { "NULL" } else { "NOT NULL" };
    let default_literal = default_literal_for(field);
    let mut statements =
        vec![format!("ALTER TABLE {} ADD {} {ty} {null} DEFAULT {default_literal}", qualified(schema, table), bracket(&field.name))];
    if field.is_nullable {
        statements.push(drop_synthetic_default_sql(schema, table, &field.name));
    }
    statements
}

fn drop_synthetic_default_sql(schema: &str, table: &str, column: &str) -> String {
    format!(
        "DECLARE @constraint_name sysname; \
SELECT @constraint_name = dc.name FROM sys.default_constraints dc \
JOIN sys.columns c ON c.default_object_id = dc.object_id AND c.object_id = dc.parent_object_id \
WHERE dc.parent_object_id = OBJECT_ID('{qualified}') AND c.name = '{column}'; \
IF @constraint_name IS NOT NULL EXEC('ALTER TABLE {qualified} DROP CONSTRAINT [' + @constraint_name + ']')",
        qualified = qualified(schema, table),
    )
}

/// `ALTER TABLE [T] ALTER COLUMN [c] <typeSql> <NULL|NOT NULL>`. Callers run
/// the data-safety probe (`safety::probe`) before emitting this.
pub fn alter_column_sql(schema: &str, table: &str, field: &FieldModel) -> String {
    let ty = sql_type_string(field);
    let null = if field.is_nullable { "NULL" } else { "NOT NULL" };
    format!("ALTER TABLE {} ALTER COLUMN {} {ty} {null}", qualified(schema, table), bracket(&field.name))
}

pub fn foreign_key_name(table: &str, fk: &ForeignKeyModel) -> String {
    format!("FK_{table}_{}", fk.column)
}

/// `ALTER TABLE ... WITH NOCHECK ADD CONSTRAINT ... FOREIGN KEY ...` followed
/// by `ALTER TABLE ... CHECK CONSTRAINT ...` (§4.6). The caller is
/// responsible for also emitting the companion index (§4.6: "additionally
/// emit a non-clustered index on the FK column").
pub fn add_foreign_key_sql(schema: &str, table: &str, fk: &ForeignKeyModel) -> Vec<String> {
    let name = foreign_key_name(table, fk);
    vec![
        format!(
            "ALTER TABLE {} WITH NOCHECK ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
            qualified(schema, table),
            bracket(&name),
            bracket(&fk.column),
            qualified(schema, &fk.target_table),
            bracket(&fk.target_column)
        ),
        format!("ALTER TABLE {} CHECK CONSTRAINT {}", qualified(schema, table), bracket(&name)),
    ]
}

/// An auto-generated non-clustered, non-unique index over a single FK
/// column, synthesized by the runner alongside every `AddForeignKey` step.
pub fn fk_auto_index(fk: &ForeignKeyModel) -> IndexModel {
    IndexModel { fields: vec![fk.column.clone()], is_unique: false, is_alternate_key: false, kind: IndexKind::NonClustered, name: None }
}

/// `IF NOT EXISTS (... sys.indexes ...) BEGIN CREATE [UNIQUE] [CLUSTERED|NONCLUSTERED] INDEX [n] ON [schema].[T](cols) END`.
/// `index` must already have its fields resolved via `resolveIndexFieldNames`.
pub fn add_index_sql(schema: &str, table: &str, index: &IndexModel, name: &str) -> String {
    let cols: Vec<String> = index.fields.iter().map(|f| bracket(f)).collect();
    let unique = if index.is_unique { "UNIQUE " } else { "" };
    let kind = match index.kind {
        IndexKind::Clustered => "CLUSTERED",
        IndexKind::NonClustered => "NONCLUSTERED",
    };
    format!(
        "IF NOT EXISTS (SELECT 1 FROM sys.indexes WHERE name = '{name}' AND object_id = OBJECT_ID('{qualified}')) \
BEGIN CREATE {unique}{kind} INDEX {name_bracket} ON {qualified}({cols}) END",
        qualified = qualified(schema, table),
        name_bracket = bracket(name),
        cols = cols.join(", "),
    )
}
