//! The diff planner (§4.5): a purely structural comparison of a target and
//! an actual [`DatabaseModel`] into an ordered [`MigrationPlan`]. No SQL
//! appears anywhere in this module.

use crate::model::{DatabaseModel, FieldModel, ForeignKeyModel, IndexModel, TableModel};
use crate::types::MAX_LENGTH_MARKER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    CreateTable,
    AddColumn,
    AlterColumn,
    AddForeignKey,
    AddIndex,
}

#[derive(Debug, Clone)]
pub enum MigrationStep {
    CreateTable { table: String, fields: Vec<FieldModel> },
    AddColumn { table: String, field: FieldModel },
    /// `field` is the target's definition; the actual table already has a
    /// column of this name with a narrower or differently-scaled type.
    AlterColumn { table: String, field: FieldModel },
    AddForeignKey { table: String, fk: ForeignKeyModel },
    AddIndex { table: String, index: IndexModel },
}

impl MigrationStep {
    pub fn kind(&self) -> ActionKind {
        match self {
            MigrationStep::CreateTable { .. } => ActionKind::CreateTable,
            MigrationStep::AddColumn { .. } => ActionKind::AddColumn,
            MigrationStep::AlterColumn { .. } => ActionKind::AlterColumn,
            MigrationStep::AddForeignKey { .. } => ActionKind::AddForeignKey,
            MigrationStep::AddIndex { .. } => ActionKind::AddIndex,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            MigrationStep::CreateTable { table, .. }
            | MigrationStep::AddColumn { table, .. }
            | MigrationStep::AlterColumn { table, .. }
            | MigrationStep::AddForeignKey { table, .. }
            | MigrationStep::AddIndex { table, .. } => table,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtraIndex {
    pub table: String,
    pub index: IndexModel,
}

#[derive(Debug, Clone, Default)]
pub struct ExtrasReport {
    pub extra_indexes: Vec<ExtraIndex>,
}

#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    pub steps: Vec<MigrationStep>,
    pub extras: ExtrasReport,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps_of(&self, kind: ActionKind) -> impl Iterator<Item = &MigrationStep> {
        self.steps.iter().filter(move |s| s.kind() == kind)
    }
}

/// `resolveIndexFieldNames` (§4.5.1): replaces any index field that names a
/// foreign-key target table with that foreign key's local column, leaving
/// everything else untouched. The sole place DSL model-name references are
/// lowered to real columns for index comparison and emission.
pub fn resolve_index_field_names(index: &IndexModel, table: &TableModel) -> IndexModel {
    let fields = index
        .fields
        .iter()
        .map(|f| {
            table
                .foreign_keys
                .iter()
                .find(|fk| fk.target_table.eq_ignore_ascii_case(f))
                .map(|fk| fk.column.clone())
                .unwrap_or_else(|| f.clone())
        })
        .collect();
    IndexModel { fields, ..index.clone() }
}

fn same_index(a: &IndexModel, b: &IndexModel) -> bool {
    a.is_unique == b.is_unique
        && a.fields.len() == b.fields.len()
        && a.fields.iter().zip(b.fields.iter()).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// Is `target_precision` wider than (or equal-but-not-narrower-than)
/// `actual_precision`, treating [`MAX_LENGTH_MARKER`] as wider than any
/// finite value?
fn is_wider_precision(target: Option<i32>, actual: Option<i32>) -> bool {
    match (target, actual) {
        (Some(MAX_LENGTH_MARKER), Some(MAX_LENGTH_MARKER)) => false,
        (Some(MAX_LENGTH_MARKER), _) => true,
        (_, Some(MAX_LENGTH_MARKER)) => false,
        (Some(t), Some(a)) => t > a,
        (None, None) => false,
        (Some(_), None) => true,
        (None, Some(_)) => false,
    }
}

/// Decimal family widening: a precision increase, or an equal precision
/// with a scale increase, counts as a widen; anything else is a narrow.
fn is_wider_decimal(target_p: Option<i32>, target_s: Option<i32>, actual_p: Option<i32>, actual_s: Option<i32>) -> bool {
    let (tp, ap) = (target_p.unwrap_or(18), actual_p.unwrap_or(18));
    let (ts, as_) = (target_s.unwrap_or(0), actual_s.unwrap_or(0));
    tp > ap || (tp == ap && ts > as_)
}

/// Decides whether `target`'s definition of a column that also exists in
/// `actual` warrants an `AlterColumn` step, per §4.5 step 3 and §4.6.3's
/// `@reducesize` gate. Only size-bearing string/binary types and the
/// decimal family are ever altered; identical definitions are a no-op.
fn plan_alter_column(target: &FieldModel, actual: &FieldModel) -> Option<FieldModel> {
    if target.sql_type.is_size_bearing() && actual.sql_type.is_size_bearing() && target.sql_type == actual.sql_type {
        // A field with no explicit precision still has a type-level default
        // width (§4.1), so resolve that default before comparing — otherwise
        // an omitted target precision reads as narrower than anything.
        let default_precision = target.sql_type.info().default_precision;
        let target_precision = target.precision.or(default_precision);
        let actual_precision = actual.precision.or(default_precision);
        if target_precision == actual_precision {
            return None;
        }
        let widen = is_wider_precision(target_precision, actual_precision);
        if widen || target.has_attribute("reducesize") {
            return Some(target.clone());
        }
        return None;
    }
    if target.sql_type.is_decimal_family() && actual.sql_type.is_decimal_family() {
        if target.precision == actual.precision && target.scale == actual.scale {
            return None;
        }
        let widen = is_wider_decimal(target.precision, target.scale, actual.precision, actual.scale);
        if widen || target.has_attribute("reducesize") {
            return Some(target.clone());
        }
        return None;
    }
    None
}

/// Computes the migration plan to bring `actual` in line with `target`.
///
/// Steps are generated in five discovery-ordered buckets (one per
/// [`ActionKind`]) and concatenated in fixed action order at the end, which
/// by construction satisfies §4.5's "action-major, discovery-minor"
/// ordering law without an explicit sort.
#[tracing::instrument(skip_all)]
pub fn plan(target: &DatabaseModel, actual: &DatabaseModel) -> MigrationPlan {
    let mut create_table = Vec::new();
    let mut add_column = Vec::new();
    let mut alter_column = Vec::new();
    let mut add_fk = Vec::new();
    let mut add_index = Vec::new();
    let mut extra_indexes = Vec::new();

    for t_table in target.tables() {
        match actual.table(&t_table.name) {
            None => {
                tracing::debug!(table = %t_table.name, "planning CreateTable");
                create_table.push(MigrationStep::CreateTable { table: t_table.name.clone(), fields: t_table.fields.clone() });
                for fk in &t_table.foreign_keys {
                    if target.table(&fk.target_table).is_some() {
                        add_fk.push(MigrationStep::AddForeignKey { table: t_table.name.clone(), fk: fk.clone() });
                    }
                }
                for idx in &t_table.indexes {
                    let resolved = resolve_index_field_names(idx, t_table);
                    add_index.push(MigrationStep::AddIndex { table: t_table.name.clone(), index: resolved });
                }
            }
            Some(a_table) => {
                for f in &t_table.fields {
                    if a_table.field(&f.name).is_none() {
                        tracing::debug!(table = %t_table.name, column = %f.name, "planning AddColumn");
                        add_column.push(MigrationStep::AddColumn { table: t_table.name.clone(), field: f.clone() });
                    } else if let Some(af) = a_table.field(&f.name) {
                        if let Some(altered) = plan_alter_column(f, af) {
                            tracing::debug!(table = %t_table.name, column = %f.name, "planning AlterColumn");
                            alter_column.push(MigrationStep::AlterColumn { table: t_table.name.clone(), field: altered });
                        }
                    }
                }

                for fk in &t_table.foreign_keys {
                    if target.table(&fk.target_table).is_none() {
                        continue;
                    }
                    let already_present =
                        a_table.foreign_keys.iter().any(|afk| afk.target_table.eq_ignore_ascii_case(&fk.target_table));
                    if !already_present {
                        tracing::debug!(table = %t_table.name, target = %fk.target_table, "planning AddForeignKey");
                        add_fk.push(MigrationStep::AddForeignKey { table: t_table.name.clone(), fk: fk.clone() });
                    }
                }

                let normalized_target: Vec<IndexModel> =
                    t_table.indexes.iter().map(|idx| resolve_index_field_names(idx, t_table)).collect();

                for idx in &normalized_target {
                    if !a_table.indexes.iter().any(|aidx| same_index(idx, aidx)) {
                        tracing::debug!(table = %t_table.name, fields = ?idx.fields, "planning AddIndex");
                        add_index.push(MigrationStep::AddIndex { table: t_table.name.clone(), index: idx.clone() });
                    }
                }
                for aidx in &a_table.indexes {
                    if !normalized_target.iter().any(|tidx| same_index(tidx, aidx)) {
                        extra_indexes.push(ExtraIndex { table: t_table.name.clone(), index: aidx.clone() });
                    }
                }
            }
        }
    }

    let mut steps = Vec::with_capacity(create_table.len() + add_column.len() + alter_column.len() + add_fk.len() + add_index.len());
    steps.extend(create_table);
    steps.extend(add_column);
    steps.extend(alter_column);
    steps.extend(add_fk);
    steps.extend(add_index);

    tracing::info!(
        create_table = steps.iter().filter(|s| s.kind() == ActionKind::CreateTable).count(),
        add_column = steps.iter().filter(|s| s.kind() == ActionKind::AddColumn).count(),
        alter_column = steps.iter().filter(|s| s.kind() == ActionKind::AlterColumn).count(),
        add_foreign_key = steps.iter().filter(|s| s.kind() == ActionKind::AddForeignKey).count(),
        add_index = steps.iter().filter(|s| s.kind() == ActionKind::AddIndex).count(),
        extra_indexes = extra_indexes.len(),
        "plan complete"
    );

    MigrationPlan { steps, extras: ExtrasReport { extra_indexes } }
}
