//! The connector-agnostic schema model (§3): tables, fields, foreign keys,
//! indexes, and the mixins they're composed from.

use indexmap::IndexMap;
use std::collections::BTreeSet;

use crate::types::SqlType;

/// A full schema, as produced either by the DSL parser or by a
/// [`crate::loader::SchemaLoader`].
///
/// Tables are keyed by their lowercased name so lookups are case-insensitive
/// (§3: "model names are compared case-insensitively"), while each
/// [`TableModel`] retains its own canonically-cased `name` for emission.
#[derive(Debug, Clone, Default)]
pub struct DatabaseModel {
    tables: IndexMap<String, TableModel>,
    mixins: IndexMap<String, MixinModel>,
}

impl DatabaseModel {
    pub fn new() -> Self {
        Self { tables: IndexMap::new(), mixins: IndexMap::new() }
    }

    pub fn insert_table(&mut self, table: TableModel) {
        self.tables.insert(table.name.to_ascii_lowercase(), table);
    }

    pub fn table(&self, name: &str) -> Option<&TableModel> {
        self.tables.get(&name.to_ascii_lowercase())
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut TableModel> {
        self.tables.get_mut(&name.to_ascii_lowercase())
    }

    /// Tables in insertion (discovery) order — the order the planner walks them in.
    pub fn tables(&self) -> impl Iterator<Item = &TableModel> {
        self.tables.values()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn insert_mixin(&mut self, mixin: MixinModel) {
        self.mixins.insert(mixin.name.to_ascii_lowercase(), mixin);
    }

    pub fn mixin(&self, name: &str) -> Option<&MixinModel> {
        self.mixins.get(&name.to_ascii_lowercase())
    }

    pub fn mixins(&self) -> impl Iterator<Item = &MixinModel> {
        self.mixins.values()
    }
}

#[derive(Debug, Clone)]
pub struct TableModel {
    pub name: String,
    pub fields: Vec<FieldModel>,
    pub foreign_keys: Vec<ForeignKeyModel>,
    pub indexes: Vec<IndexModel>,
    pub attributes: BTreeSet<String>,
    /// Names of mixins merged into this table, either by explicit `with` at
    /// parse time or structurally re-detected by the exporter.
    pub mixins_applied: BTreeSet<String>,
}

impl TableModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
            attributes: BTreeSet::new(),
            mixins_applied: BTreeSet::new(),
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldModel> {
        self.fields.iter_mut().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key(&self) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.is_primary_key)
    }
}

#[derive(Debug, Clone)]
pub struct FieldModel {
    pub name: String,
    pub sql_type: SqlType,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub is_identity: bool,
    pub is_optional: bool,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
    pub attributes: BTreeSet<String>,
    /// The raw vendor type name, set only when `sql_type == SqlType::Unsupported`.
    pub raw_type: Option<String>,
}

impl FieldModel {
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipType {
    OneToOne,
    OneToMany,
}

#[derive(Debug, Clone)]
pub struct ForeignKeyModel {
    pub column: String,
    pub target_table: String,
    pub target_column: String,
    pub is_nullable: bool,
    pub relationship: RelationshipType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Clustered,
    NonClustered,
}

#[derive(Debug, Clone)]
pub struct IndexModel {
    pub fields: Vec<String>,
    pub is_unique: bool,
    /// `key(...)` vs `index(...)` in the DSL; governs the `AK_`/`IX_` name prefix.
    pub is_alternate_key: bool,
    pub kind: IndexKind,
    /// Explicit name, when the DSL or the live schema supplied one;
    /// otherwise a name is synthesized downstream (§4.6.2).
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MixinModel {
    pub name: String,
    pub fields: Vec<FieldModel>,
    pub foreign_keys: Vec<ForeignKeyModel>,
    pub indexes: Vec<IndexModel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookup_is_case_insensitive() {
        let mut db = DatabaseModel::new();
        db.insert_table(TableModel::new("Customer"));
        assert!(db.table("customer").is_some());
        assert!(db.table("CUSTOMER").is_some());
        assert_eq!(db.table("customer").unwrap().name, "Customer");
    }

    #[test]
    fn field_lookup_is_case_insensitive() {
        let mut t = TableModel::new("Customer");
        t.fields.push(FieldModel {
            name: "Email".into(),
            sql_type: SqlType::NVarChar,
            is_nullable: true,
            is_primary_key: false,
            is_identity: false,
            is_optional: true,
            precision: Some(100),
            scale: None,
            attributes: BTreeSet::new(),
            raw_type: None,
        });
        assert!(t.field("email").is_some());
    }
}
