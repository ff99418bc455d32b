//! Data-loss safety probes run before a narrowing `AlterColumn` (§4.6.1): a
//! read-only existence query that returns a row iff at least one live value
//! would be truncated or rounded by the target precision/scale.

use schema_core::model::FieldModel;
use schema_core::types::{sql_type_string, SqlType, MAX_LENGTH_MARKER};

use crate::executor::SqlExecutor;

fn bracket(ident: &str) -> String {
    format!("[{ident}]")
}

fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", bracket(schema), bracket(table))
}

/// Is this field's type family ever subject to the probe? Only size-bearing
/// string/binary types and the decimal family narrow in a way that can lose
/// data; everything else alters freely.
fn is_probeable_family(sql_type: SqlType) -> bool {
    sql_type.is_size_bearing() || sql_type.is_decimal_family()
}

/// Builds the probe query for `field`, or `None` if no probe applies:
/// narrowing to the MAX sentinel is always safe, and non size-bearing,
/// non-decimal types are never narrowed destructively in the first place.
pub fn probe_sql(schema: &str, table: &str, field: &FieldModel) -> Option<String> {
    if !is_probeable_family(field.sql_type) {
        return None;
    }
    if field.precision == Some(MAX_LENGTH_MARKER) {
        return None;
    }
    let qualified = qualified(schema, table);
    let col = bracket(&field.name);
    if field.sql_type.is_decimal_family() {
        let p = field.precision.unwrap_or(18);
        let s = field.scale.unwrap_or(0);
        return Some(format!(
            "SELECT TOP 1 1 FROM {qualified} WITH (READPAST) WHERE TRY_CONVERT(decimal({p},{s}), {col}) IS NULL OR TRY_CONVERT(decimal({p},{s}), {col}) <> {col}"
        ));
    }
    let p = field.precision.unwrap_or(1);
    Some(match field.sql_type {
        SqlType::Char | SqlType::NChar => {
            format!("SELECT TOP 1 1 FROM {qualified} WITH (READPAST) WHERE LEN({col}) > {p}")
        }
        SqlType::NVarChar => {
            format!("SELECT TOP 1 1 FROM {qualified} WITH (READPAST) WHERE DATALENGTH({col}) > {}", p * 2)
        }
        _ => format!("SELECT TOP 1 1 FROM {qualified} WITH (READPAST) WHERE DATALENGTH({col}) > {p}"),
    })
}

/// Runs the probe and reports whether narrowing `field` is safe. A field
/// whose type isn't subject to the probe, or whose target is the MAX
/// sentinel, is always safe.
pub async fn is_narrowing_safe<E: SqlExecutor>(executor: &E, schema: &str, table: &str, field: &FieldModel) -> Result<bool, E::Error> {
    match probe_sql(schema, table, field) {
        None => Ok(true),
        Some(sql) => Ok(!executor.query_exists(&sql).await?),
    }
}

/// `UPDATE [T] SET [c] = CONVERT(<typeSql>, [c])`, run before the ALTER when
/// both `@reducesize` and `@allowdataloss` are present (§4.6.3: "an
/// intermediate UPDATE converting values to the target width").
pub fn truncating_update_sql(schema: &str, table: &str, field: &FieldModel) -> String {
    let ty = sql_type_string(field);
    let col = bracket(&field.name);
    format!("UPDATE {} SET {col} = CONVERT({ty}, {col})", qualified(schema, table))
}
