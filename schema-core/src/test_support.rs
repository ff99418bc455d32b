//! Small in-crate test fixtures (§4 of the ambient test-tooling stack):
//! model builders and a fake [`crate::loader::SchemaLoader`] that hands back
//! a canned [`DatabaseModel`] instead of hitting a database.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::loader::SchemaLoader;
use crate::model::{DatabaseModel, FieldModel, TableModel};
use crate::types::SqlType;

pub fn int_pk(table: &str) -> FieldModel {
    FieldModel {
        name: format!("{table}ID"),
        sql_type: SqlType::Int,
        is_nullable: false,
        is_primary_key: true,
        is_identity: true,
        is_optional: false,
        precision: None,
        scale: None,
        attributes: BTreeSet::new(),
        raw_type: None,
    }
}

pub fn nvarchar(name: &str, precision: i32) -> FieldModel {
    FieldModel {
        name: name.to_string(),
        sql_type: SqlType::NVarChar,
        is_nullable: false,
        is_primary_key: false,
        is_identity: false,
        is_optional: false,
        precision: Some(precision),
        scale: None,
        attributes: BTreeSet::new(),
        raw_type: None,
    }
}

pub struct FakeSchemaLoader {
    model: DatabaseModel,
}

impl FakeSchemaLoader {
    pub fn new(model: DatabaseModel) -> Self {
        Self { model }
    }

    pub fn empty() -> Self {
        Self { model: DatabaseModel::new() }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("fake loader never fails")]
pub struct FakeLoaderError;

#[async_trait]
impl SchemaLoader for FakeSchemaLoader {
    type Error = FakeLoaderError;

    async fn load(&self, _schema: &str) -> Result<DatabaseModel, Self::Error> {
        Ok(self.model.clone())
    }
}

pub fn single_table_model(table: TableModel) -> DatabaseModel {
    let mut model = DatabaseModel::new();
    model.insert_table(table);
    model
}
