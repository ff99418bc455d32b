//! The live-schema loader contract's SQL implementation (§4.4, §6): a narrow
//! introspection port the host implements per driver, and the type
//! normalization that turns raw vendor metadata into the canonical lattice.

use std::collections::BTreeSet;

use async_trait::async_trait;

use schema_core::loader::SchemaLoader;
use schema_core::model::{DatabaseModel, FieldModel, ForeignKeyModel, IndexKind, IndexModel, RelationshipType, TableModel};
use schema_core::types::SqlType;

use crate::error::Error;

/// One reported column, in the shape `INFORMATION_SCHEMA.COLUMNS` provides it.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub character_maximum_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub is_nullable: bool,
}

#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub is_unique: bool,
}

/// The introspection port (§6): "queries equivalent to listing base tables
/// in a namespace, listing columns..., listing referential constraints...,
/// and listing non-primary-key indexes...". One abstract trait, implemented
/// per vendor driver (§9).
#[async_trait]
pub trait SqlIntrospector: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn list_tables(&self, schema: &str) -> Result<Vec<String>, Self::Error>;
    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>, Self::Error>;
    async fn list_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyInfo>, Self::Error>;
    async fn list_indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexInfo>, Self::Error>;
}

/// Normalizes a raw vendor column into the canonical lattice (§4.4): known
/// types strip any precision the lattice doesn't model (`int`, `datetime`,
/// ...), `text`/`ntext` are forced to the MAX sentinel, `money`/`smallmoney`
/// are rewritten to their fixed-precision `decimal` equivalent, and anything
/// unrecognized becomes [`SqlType::Unsupported`] carrying the raw type name.
fn normalize_column_type(col: &ColumnInfo) -> (SqlType, Option<i32>, Option<i32>, Option<String>) {
    match col.data_type.to_ascii_lowercase().as_str() {
        "int" => (SqlType::Int, None, None, None),
        "bigint" => (SqlType::BigInt, None, None, None),
        "smallint" => (SqlType::SmallInt, None, None, None),
        "tinyint" => (SqlType::TinyInt, None, None, None),
        "bit" => (SqlType::Bit, None, None, None),
        "nvarchar" => (SqlType::NVarChar, col.character_maximum_length, None, None),
        "varchar" => (SqlType::VarChar, col.character_maximum_length, None, None),
        "nchar" => (SqlType::NChar, col.character_maximum_length, None, None),
        "char" => (SqlType::Char, col.character_maximum_length, None, None),
        "text" => (SqlType::Text, Some(schema_core::types::MAX_LENGTH_MARKER), None, None),
        "ntext" => (SqlType::NText, Some(schema_core::types::MAX_LENGTH_MARKER), None, None),
        "decimal" => (SqlType::Decimal, col.numeric_precision, col.numeric_scale, None),
        "numeric" => (SqlType::Numeric, col.numeric_precision, col.numeric_scale, None),
        "money" => (SqlType::Decimal, Some(19), Some(4), None),
        "smallmoney" => (SqlType::Decimal, Some(10), Some(4), None),
        "float" => (SqlType::Float, None, None, None),
        "datetime" => (SqlType::DateTime, None, None, None),
        "uniqueidentifier" => (SqlType::UniqueIdentifier, None, None, None),
        "binary" => (SqlType::Binary, col.character_maximum_length, None, None),
        "varbinary" => (SqlType::VarBinary, col.character_maximum_length, None, None),
        other => (SqlType::Unsupported, None, None, Some(other.to_string())),
    }
}

fn field_from_column(col: &ColumnInfo) -> FieldModel {
    let (sql_type, precision, scale, raw_type) = normalize_column_type(col);
    FieldModel {
        name: col.name.clone(),
        sql_type,
        is_nullable: col.is_nullable,
        is_primary_key: false,
        is_identity: false,
        is_optional: false,
        precision,
        scale,
        attributes: BTreeSet::new(),
        raw_type,
    }
}

fn index_from_info(info: &IndexInfo) -> IndexModel {
    IndexModel {
        fields: info.columns.clone(),
        is_unique: info.is_unique,
        is_alternate_key: false,
        kind: IndexKind::NonClustered,
        name: info.name.clone(),
    }
}

/// Implements [`SchemaLoader`] over any [`SqlIntrospector`], building an
/// "actual" [`DatabaseModel`] the planner can diff against a parsed target.
pub struct SqlSchemaLoader<I> {
    introspector: I,
}

impl<I> SqlSchemaLoader<I> {
    pub fn new(introspector: I) -> Self {
        Self { introspector }
    }
}

#[async_trait]
impl<I> SchemaLoader for SqlSchemaLoader<I>
where
    I: SqlIntrospector,
{
    type Error = Error;

    #[tracing::instrument(skip(self))]
    async fn load(&self, schema: &str) -> Result<DatabaseModel, Self::Error> {
        let mut model = DatabaseModel::new();
        let table_names = self.introspector.list_tables(schema).await.map_err(|e| Error::Executor(Box::new(e)))?;

        for table_name in &table_names {
            let columns = self.introspector.list_columns(schema, table_name).await.map_err(|e| Error::Executor(Box::new(e)))?;
            let foreign_keys = self.introspector.list_foreign_keys(schema, table_name).await.map_err(|e| Error::Executor(Box::new(e)))?;
            let indexes = self.introspector.list_indexes(schema, table_name).await.map_err(|e| Error::Executor(Box::new(e)))?;

            if columns.is_empty() {
                return Err(Error::Introspection(format!("table `{table_name}` was listed with no columns")));
            }
            if let Some(bad) = indexes.iter().find(|idx| idx.columns.is_empty()) {
                let name = bad.name.as_deref().unwrap_or("<unnamed>");
                return Err(Error::Introspection(format!("index `{name}` on table `{table_name}` was listed with no columns")));
            }

            let mut table = TableModel::new(table_name.clone());
            table.fields = columns.iter().map(field_from_column).collect();
            table.foreign_keys = foreign_keys
                .iter()
                .map(|fk| ForeignKeyModel {
                    column: fk.column.clone(),
                    target_table: fk.referenced_table.clone(),
                    target_column: fk.referenced_column.clone(),
                    is_nullable: fk.is_nullable,
                    relationship: RelationshipType::OneToOne,
                })
                .collect();
            table.indexes = indexes.iter().map(index_from_info).collect();

            tracing::debug!(table = %table_name, columns = table.fields.len(), "loaded table");
            model.insert_table(table);
        }

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn col(name: &str, data_type: &str, max_len: Option<i32>, precision: Option<i32>, scale: Option<i32>) -> ColumnInfo {
        ColumnInfo {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            character_maximum_length: max_len,
            numeric_precision: precision,
            numeric_scale: scale,
        }
    }

    #[test]
    fn nvarchar_max_length_passes_through_as_the_sentinel() {
        let (ty, p, _, _) = normalize_column_type(&col("Bio", "nvarchar", Some(-1), None, None));
        assert_eq!(ty, SqlType::NVarChar);
        assert_eq!(p, Some(-1));
    }

    #[test]
    fn text_is_forced_to_max_regardless_of_reported_length() {
        let (ty, p, _, _) = normalize_column_type(&col("Notes", "text", Some(2147483647), None, None));
        assert_eq!(ty, SqlType::Text);
        assert_eq!(p, Some(schema_core::types::MAX_LENGTH_MARKER));
    }

    #[test]
    fn money_normalizes_to_fixed_decimal() {
        let (ty, p, s, _) = normalize_column_type(&col("Price", "money", None, None, None));
        assert_eq!(ty, SqlType::Decimal);
        assert_eq!(p, Some(19));
        assert_eq!(s, Some(4));
    }

    #[test]
    fn datetime_strips_any_reported_precision() {
        let (ty, p, s, _) = normalize_column_type(&col("CreatedAt", "datetime", None, Some(3), None));
        assert_eq!(ty, SqlType::DateTime);
        assert_eq!(p, None);
        assert_eq!(s, None);
    }

    #[test]
    fn unrecognized_type_becomes_unsupported_with_raw_name() {
        let (ty, _, _, raw) = normalize_column_type(&col("Geo", "geometry", None, None, None));
        assert_eq!(ty, SqlType::Unsupported);
        assert_eq!(raw.as_deref(), Some("geometry"));
    }

    #[derive(Debug, thiserror::Error)]
    #[error("fake introspector error")]
    struct FakeIntrospectorError;

    #[derive(Default)]
    struct FakeIntrospector {
        tables: Vec<String>,
        columns: Vec<ColumnInfo>,
        foreign_keys: Vec<ForeignKeyInfo>,
        indexes: Vec<IndexInfo>,
    }

    #[async_trait]
    impl SqlIntrospector for FakeIntrospector {
        type Error = FakeIntrospectorError;

        async fn list_tables(&self, _schema: &str) -> Result<Vec<String>, Self::Error> {
            Ok(self.tables.clone())
        }

        async fn list_columns(&self, _schema: &str, _table: &str) -> Result<Vec<ColumnInfo>, Self::Error> {
            Ok(self.columns.clone())
        }

        async fn list_foreign_keys(&self, _schema: &str, _table: &str) -> Result<Vec<ForeignKeyInfo>, Self::Error> {
            Ok(self.foreign_keys.clone())
        }

        async fn list_indexes(&self, _schema: &str, _table: &str) -> Result<Vec<IndexInfo>, Self::Error> {
            Ok(self.indexes.clone())
        }
    }

    #[tokio::test]
    async fn load_builds_a_table_from_introspected_columns() {
        let introspector = FakeIntrospector {
            tables: vec!["User".into()],
            columns: vec![col("UserID", "int", None, None, None), col("Username", "nvarchar", Some(100), None, None)],
            ..Default::default()
        };
        let loader = SqlSchemaLoader::new(introspector);
        let model = loader.load("dbo").await.expect("should load");
        assert_eq!(model.table_count(), 1);
        assert!(model.table("User").unwrap().field("Username").is_some());
    }

    #[tokio::test]
    async fn load_rejects_a_table_reported_with_no_columns() {
        let introspector = FakeIntrospector { tables: vec!["User".into()], ..Default::default() };
        let loader = SqlSchemaLoader::new(introspector);
        let err = loader.load("dbo").await.unwrap_err();
        assert!(matches!(err, Error::Introspection(_)));
    }

    #[tokio::test]
    async fn load_rejects_an_index_reported_with_no_columns() {
        let introspector = FakeIntrospector {
            tables: vec!["User".into()],
            columns: vec![col("UserID", "int", None, None, None)],
            indexes: vec![IndexInfo { name: Some("IX_broken".into()), columns: vec![], is_unique: false }],
            ..Default::default()
        };
        let loader = SqlSchemaLoader::new(introspector);
        let err = loader.load("dbo").await.unwrap_err();
        assert!(matches!(err, Error::Introspection(_)));
    }
}
