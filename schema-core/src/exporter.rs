//! The model exporter (§4.7): emits DSL source from a schema model, closing
//! the round-trip described in §8.

use std::collections::BTreeSet;
use std::path::Path;

use crate::model::{DatabaseModel, ForeignKeyModel, RelationshipType, TableModel};
use crate::types::{dmd_type_string, SqlType};

/// Writes one `.dmd` file per table in `model` into `dir`.
#[tracing::instrument(skip(model))]
pub fn export(model: &DatabaseModel, dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    for table in model.tables() {
        let rendered = render_table(table, model);
        let path = dir.join(format!("{}.dmd", table.name));
        tracing::debug!(table = %table.name, path = %path.display(), "exporting table");
        std::fs::write(path, rendered)?;
    }
    Ok(())
}

/// Mixins whose every field is present on `table` (by name) or marked
/// `isOptional` — the structural re-detection rule of §4.7.
fn applied_mixin_names(table: &TableModel, model: &DatabaseModel) -> Vec<String> {
    let mut names: Vec<String> = model
        .mixins()
        .filter(|mixin| {
            !mixin.fields.is_empty()
                && mixin.fields.iter().all(|mf| table.field(&mf.name).is_some() || mf.is_optional)
        })
        .map(|mixin| mixin.name.clone())
        .collect();
    names.sort();
    names
}

fn mixin_field_names(table: &TableModel, model: &DatabaseModel, applied: &[String]) -> BTreeSet<String> {
    applied
        .iter()
        .filter_map(|name| model.mixin(name))
        .flat_map(|m| m.fields.iter().map(|f| f.name.to_ascii_lowercase()))
        .filter(|name| table.field(name).is_some())
        .collect()
}

/// Strips the conventional `{Target}ID` (or bare `{Target}`) suffix from a
/// foreign-key column name, case-insensitively, to recover the semantic
/// alias a user would have written with `as`.
fn strip_conventional_suffix(column: &str, target_table: &str) -> Option<String> {
    let with_id = format!("{target_table}ID");
    if let Some(stripped) = strip_suffix_ci(column, &with_id) {
        return Some(stripped);
    }
    strip_suffix_ci(column, target_table)
}

fn strip_suffix_ci(s: &str, suffix: &str) -> Option<String> {
    if s.len() < suffix.len() {
        return None;
    }
    let split = s.len() - suffix.len();
    if s[split..].eq_ignore_ascii_case(suffix) {
        Some(s[..split].to_string())
    } else {
        None
    }
}

fn render_relation_line(fk: &ForeignKeyModel) -> String {
    let keyword = match fk.relationship {
        RelationshipType::OneToOne => "model",
        RelationshipType::OneToMany => "models",
    };
    let nullable_mark = if fk.is_nullable { "?" } else { "" };
    let default_column = format!("{}ID", fk.target_table);
    if fk.column.eq_ignore_ascii_case(&default_column) {
        format!("    {keyword} {}{nullable_mark}", fk.target_table)
    } else {
        let alias = strip_conventional_suffix(&fk.column, &fk.target_table).unwrap_or_else(|| fk.column.clone());
        if alias.is_empty() {
            format!("    {keyword} {}{nullable_mark}", fk.target_table)
        } else {
            format!("    {keyword} {}{nullable_mark} as {alias}", fk.target_table)
        }
    }
}

/// Renders a single table's DSL source, given the full model (needed for
/// mixin re-detection and FK target lookups). Pure — no filesystem access —
/// so it's directly testable without a temp directory.
pub fn render_table(table: &TableModel, model: &DatabaseModel) -> String {
    let applied = applied_mixin_names(table, model);
    let mixin_fields = mixin_field_names(table, model, &applied);

    let header = if applied.is_empty() {
        format!("model {} {{\n", table.name)
    } else {
        format!("model {} with {} {{\n", table.name, applied.join(", "))
    };

    let pk_name_lower = table.primary_key().map(|f| f.name.to_ascii_lowercase());
    let fk_columns: BTreeSet<String> = table.foreign_keys.iter().map(|fk| fk.column.to_ascii_lowercase()).collect();

    let mut relations: Vec<&ForeignKeyModel> = table
        .foreign_keys
        .iter()
        .filter(|fk| !mixin_fields.contains(&fk.column.to_ascii_lowercase()))
        .collect();
    relations.sort_by(|a, b| {
        (a.target_table.to_ascii_lowercase(), a.column.to_ascii_lowercase())
            .cmp(&(b.target_table.to_ascii_lowercase(), b.column.to_ascii_lowercase()))
    });
    let relation_lines: Vec<String> = relations.iter().map(|fk| render_relation_line(fk)).collect();

    let mut plain_fields: Vec<_> = table
        .fields
        .iter()
        .filter(|f| {
            let lower = f.name.to_ascii_lowercase();
            Some(&lower) != pk_name_lower.as_ref() && !fk_columns.contains(&lower) && !mixin_fields.contains(&lower)
        })
        .collect();
    plain_fields.sort_by_key(|f| f.name.to_ascii_lowercase());

    let field_lines: Vec<String> = plain_fields
        .iter()
        .map(|f| {
            if f.sql_type == SqlType::Unsupported {
                format!("    # {} {}", dmd_type_string(f), f.name)
            } else {
                format!("    {} {}", dmd_type_string(f), f.name)
            }
        })
        .collect();

    let index_lines: Vec<String> = table
        .indexes
        .iter()
        .filter_map(|idx| render_index_line(idx, table))
        .collect();

    let attr_lines: Vec<String> = table.attributes.iter().map(|a| format!("    @{a}")).collect();

    let mut body_lines = Vec::new();
    body_lines.extend(relation_lines);
    body_lines.extend(field_lines);
    body_lines.extend(index_lines);
    body_lines.extend(attr_lines);

    let mut out = header;
    for line in &body_lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("}\n");
    out
}

/// Omits the single-column PK index and any index all of whose columns are
/// FK columns; maps remaining columns through the FK column→target-table
/// mapping for display.
fn render_index_line(idx: &crate::model::IndexModel, table: &TableModel) -> Option<String> {
    let pk_name = table.primary_key().map(|f| f.name.as_str());
    if idx.fields.len() == 1 && Some(idx.fields[0].as_str()) == pk_name {
        return None;
    }
    if idx.fields.iter().all(|f| table.foreign_keys.iter().any(|fk| fk.column.eq_ignore_ascii_case(f))) {
        return None;
    }
    let display_fields: Vec<String> = idx
        .fields
        .iter()
        .map(|f| {
            table
                .foreign_keys
                .iter()
                .find(|fk| fk.column.eq_ignore_ascii_case(f))
                .map(|fk| fk.target_table.clone())
                .unwrap_or_else(|| f.clone())
        })
        .collect();
    let joined = display_fields.join(", ");
    Some(if idx.is_unique {
        format!("    key({joined})")
    } else {
        format!("    index({joined})")
    })
}
