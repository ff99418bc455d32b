//! The DSL front-end (§4.3): a line-oriented, hand-rolled recursive-descent
//! parser for `.dmd` (model) and `.dmdx` (mixin) files.
//!
//! Parsing happens in two passes over a directory: all mixins are read
//! first, then all models, so that `with <Mixin>` can always resolve
//! against an already-known mixin regardless of file order. Within the
//! model pass, `extends <Name>` attaches to a table parsed earlier in the
//! same pass; a table extended before it is declared is a reference error.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{DslError, DslErrorKind};
use crate::model::{
    DatabaseModel, FieldModel, ForeignKeyModel, IndexKind, IndexModel, MixinModel, RelationshipType, TableModel,
};
use crate::types::{DmdType, MAX_LENGTH_MARKER};

pub type Result<T> = std::result::Result<T, DslError>;

const PK_OVERRIDE_TYPES: &[&str] = &["guid", "long", "bool", "float", "datetime"];

/// One declaration block's worth of parsed content, shared by `model`,
/// `extends`, and `mixin` bodies.
#[derive(Debug, Default)]
struct BlockContents {
    fields: Vec<FieldModel>,
    foreign_keys: Vec<ForeignKeyModel>,
    indexes: Vec<IndexModel>,
    attributes: BTreeSet<String>,
}

enum TopItem {
    Mixin(MixinModel),
    Model { name: String, pk_override: Option<DmdType>, with_mixin: Option<String>, body: BlockContents, header_line: usize },
    Extends { name: String, body: BlockContents, header_line: usize },
}

/// A source line with comments stripped and whitespace trimmed, paired with
/// its 1-based line number for error reporting.
struct Line<'a> {
    number: usize,
    text: &'a str,
}

fn strip_comment(line: &str) -> &str {
    let cut = [line.find("//"), line.find('#')].into_iter().flatten().min();
    match cut {
        Some(i) => &line[..i],
        None => line,
    }
}

fn logical_lines(source: &str) -> Vec<Line<'_>> {
    source
        .split('\n')
        .enumerate()
        .map(|(i, raw)| Line { number: i + 1, text: strip_comment(raw).trim() })
        .filter(|l| !l.text.is_empty())
        .collect()
}

/// Parses a single `.dmd` or `.dmdx` file's text into its top-level items.
fn parse_file(file: &Path, source: &str) -> Result<Vec<TopItem>> {
    let lines = logical_lines(source);
    let mut items = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        let err = |kind: DslErrorKind, at: usize| DslError { file: file.to_path_buf(), line: at, kind };

        let (keyword, rest) = split_keyword(line.text);
        match keyword {
            "mixin" => {
                let (name, header_rest) = header_name(rest).ok_or_else(|| {
                    err(DslErrorKind::MalformedMixinHeader(line.text.to_string()), line.number)
                })?;
                if !header_rest.trim().is_empty() {
                    return Err(err(DslErrorKind::MalformedMixinHeader(line.text.to_string()), line.number));
                }
                let (body_lines, next) = take_block(&lines, i + 1, file)?;
                let body = parse_block(file, &body_lines)?;
                items.push(TopItem::Mixin(MixinModel {
                    name,
                    fields: body.fields,
                    foreign_keys: body.foreign_keys,
                    indexes: body.indexes,
                }));
                i = next;
            }
            "model" => {
                let (pk_override, name, with_mixin) =
                    parse_model_header(rest, file, line.number)?;
                let (body_lines, next) = take_block(&lines, i + 1, file)?;
                let body = parse_block(file, &body_lines)?;
                items.push(TopItem::Model { name, pk_override, with_mixin, body, header_line: line.number });
                i = next;
            }
            "extends" => {
                let (name, header_rest) = header_name(rest).ok_or_else(|| {
                    err(DslErrorKind::MalformedModelHeader(line.text.to_string()), line.number)
                })?;
                if !header_rest.trim().is_empty() {
                    return Err(err(DslErrorKind::MalformedModelHeader(line.text.to_string()), line.number));
                }
                let (body_lines, next) = take_block(&lines, i + 1, file)?;
                let body = parse_block(file, &body_lines)?;
                items.push(TopItem::Extends { name, body, header_line: line.number });
                i = next;
            }
            "}" => {
                return Err(err(DslErrorKind::UnexpectedBlockClose, line.number));
            }
            _ => {
                return Err(err(DslErrorKind::MalformedLine(line.text.to_string()), line.number));
            }
        }
    }
    Ok(items)
}

/// Splits a header line into its leading keyword and the remainder (with a
/// trailing `{`, if any, stripped).
fn split_keyword(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((kw, rest)) => (kw, rest.trim()),
        None => (text, ""),
    }
}

/// Pulls `IDENT` off the front of a header remainder, stripping a trailing
/// `{` from whatever's left. Returns `(ident, rest_after_ident)`.
fn header_name(rest: &str) -> Option<(String, String)> {
    let rest = rest.strip_suffix('{').unwrap_or(rest).trim();
    let (name, tail) = match rest.split_once(char::is_whitespace) {
        Some((n, t)) => (n, t.trim()),
        None => (rest, ""),
    };
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), tail.to_string()))
}

fn parse_model_header(rest: &str, file: &Path, at: usize) -> Result<(Option<DmdType>, String, Option<String>)> {
    let rest = rest.strip_suffix('{').unwrap_or(rest).trim();
    let malformed = || DslError { file: file.to_path_buf(), line: at, kind: DslErrorKind::MalformedModelHeader(rest.to_string()) };
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(malformed());
    }
    if tokens[0].eq_ignore_ascii_case("int") && tokens.len() >= 2 {
        return Err(DslError { file: file.to_path_buf(), line: at, kind: DslErrorKind::ExplicitIntPrimaryKey });
    }
    let (pk_override, name, mut idx) = if tokens.len() >= 2
        && PK_OVERRIDE_TYPES.iter().any(|t| t.eq_ignore_ascii_case(tokens[0]))
    {
        let ty = DmdType::try_parse(tokens[0]).ok_or_else(malformed)?;
        (Some(ty), tokens[1].to_string(), 2)
    } else {
        (None, tokens[0].to_string(), 1)
    };
    let mut with_mixin = None;
    if idx < tokens.len() {
        if tokens[idx].eq_ignore_ascii_case("with") && idx + 1 < tokens.len() {
            with_mixin = Some(tokens[idx + 1].to_string());
            idx += 2;
        } else {
            return Err(malformed());
        }
    }
    if idx != tokens.len() {
        return Err(malformed());
    }
    Ok((pk_override, name, with_mixin))
}

/// Collects the body lines of a block (everything up to and including its
/// closing `}`), returning them plus the index just past the `}`.
fn take_block<'a>(lines: &'a [Line<'a>], start: usize, file: &Path) -> Result<(Vec<&'a Line<'a>>, usize)> {
    let mut body = Vec::new();
    let mut i = start;
    while i < lines.len() {
        if lines[i].text == "}" {
            return Ok((body, i + 1));
        }
        body.push(&lines[i]);
        i += 1;
    }
    let at = lines.last().map(|l| l.number).unwrap_or(start);
    Err(DslError { file: file.to_path_buf(), line: at, kind: DslErrorKind::UnterminatedBlock })
}

fn parse_block(file: &Path, lines: &[&Line<'_>]) -> Result<BlockContents> {
    let mut block = BlockContents::default();
    for line in lines {
        parse_block_line(file, line, &mut block)?;
    }
    Ok(block)
}

fn parse_block_line(file: &Path, line: &Line<'_>, block: &mut BlockContents) -> Result<()> {
    let text = line.text;
    let err = |kind: DslErrorKind| DslError { file: file.to_path_buf(), line: line.number, kind };

    if let Some(rest) = text.strip_prefix('@') {
        if rest.is_empty() {
            return Err(err(DslErrorKind::MalformedLine(text.to_string())));
        }
        block.attributes.insert(rest.to_string());
        return Ok(());
    }

    let is_bang_relation = text.starts_with('!');
    let stripped = text.trim_start_matches('!').trim_start();
    let (keyword, _) = split_keyword(stripped);

    if keyword.eq_ignore_ascii_case("model") || keyword.eq_ignore_ascii_case("models") {
        parse_relation_line(file, line, stripped, is_bang_relation, block)?;
        return Ok(());
    }
    if keyword.eq_ignore_ascii_case("index") {
        parse_collection_line(file, line, stripped, false, block)?;
        return Ok(());
    }
    if keyword.eq_ignore_ascii_case("key") {
        parse_collection_line(file, line, stripped, true, block)?;
        return Ok(());
    }
    parse_field_line(file, line, text, block)
}

fn parse_relation_line(
    file: &Path,
    line: &Line<'_>,
    text: &str,
    is_optional: bool,
    block: &mut BlockContents,
) -> Result<()> {
    let err = || DslError { file: file.to_path_buf(), line: line.number, kind: DslErrorKind::MalformedLine(text.to_string()) };
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(err());
    }
    let relationship = if tokens[0].eq_ignore_ascii_case("model") {
        RelationshipType::OneToOne
    } else {
        RelationshipType::OneToMany
    };
    let mut target = tokens[1];
    let mut nullable = false;
    if let Some(stripped) = target.strip_suffix('?') {
        target = stripped;
        nullable = true;
    }
    let mut idx = 2;
    let mut alias: Option<&str> = None;
    if idx < tokens.len() && tokens[idx].eq_ignore_ascii_case("as") && idx + 1 < tokens.len() {
        alias = Some(tokens[idx + 1].trim_end_matches('?'));
        idx += 2;
    }
    if idx != tokens.len() {
        return Err(err());
    }

    let column = match alias {
        None => format!("{target}ID"),
        Some(a) if a.to_ascii_uppercase().ends_with("ID") => a.to_string(),
        Some(a) => format!("{a}{target}ID"),
    };

    block.fields.push(FieldModel {
        name: column.clone(),
        sql_type: crate::types::SqlType::Int,
        is_nullable: nullable,
        is_primary_key: false,
        is_identity: false,
        is_optional,
        precision: None,
        scale: None,
        attributes: BTreeSet::new(),
        raw_type: None,
    });
    block.foreign_keys.push(ForeignKeyModel {
        column,
        target_table: target.to_string(),
        target_column: format!("{target}ID"),
        is_nullable: nullable,
        relationship,
    });
    Ok(())
}

fn parse_collection_line(
    file: &Path,
    line: &Line<'_>,
    text: &str,
    is_alternate_key: bool,
    block: &mut BlockContents,
) -> Result<()> {
    let err = || DslError { file: file.to_path_buf(), line: line.number, kind: DslErrorKind::MalformedLine(text.to_string()) };
    let open = text.find('(').ok_or_else(err)?;
    let close = text.find(')').ok_or_else(err)?;
    if close < open {
        return Err(err());
    }
    let inner = &text[open + 1..close];
    let fields: Vec<String> = inner.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    if fields.is_empty() {
        return Err(err());
    }
    let trailer = text[close + 1..].trim();
    let is_unique = is_alternate_key || trailer.eq_ignore_ascii_case("@unique");
    if !trailer.is_empty() && !trailer.eq_ignore_ascii_case("@unique") {
        return Err(err());
    }
    block.indexes.push(IndexModel { fields, is_unique, is_alternate_key, kind: IndexKind::NonClustered, name: None });
    Ok(())
}

fn parse_field_line(file: &Path, line: &Line<'_>, text: &str, block: &mut BlockContents) -> Result<()> {
    let err = |kind: DslErrorKind| DslError { file: file.to_path_buf(), line: line.number, kind };
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < 2 {
        return Err(err(DslErrorKind::MalformedLine(text.to_string())));
    }
    let mut type_token = tokens[0];
    let mut nullable = false;
    if let Some(stripped) = type_token.strip_suffix('?') {
        type_token = stripped;
        nullable = true;
    }
    let (base, precision, scale) = parse_type_token(type_token).ok_or_else(|| err(DslErrorKind::MalformedLine(text.to_string())))?;
    let dmd = DmdType::try_parse(base).ok_or_else(|| err(DslErrorKind::UnknownType(base.to_string())))?;

    let name = tokens[1].to_string();
    let attrs: BTreeSet<String> = tokens[2..]
        .iter()
        .map(|t| t.strip_prefix('@').map(str::to_string).ok_or_else(|| err(DslErrorKind::MalformedLine(text.to_string()))))
        .collect::<Result<_>>()?;

    let (sql_type, default_precision, default_scale) = dmd.to_sql();
    let is_explicit_max = precision == Some(MAX_LENGTH_MARKER);
    let is_forced_max_type = matches!(dmd, DmdType::Text | DmdType::UText);
    if is_explicit_max && !is_forced_max_type && !sql_type.info().supports_max {
        return Err(err(DslErrorKind::MaxNotSupportedForType(base.to_string())));
    }
    let (precision, scale) = match dmd {
        DmdType::Money | DmdType::SmallMoney | DmdType::Text | DmdType::UText => (default_precision, default_scale),
        _ => (precision.or(default_precision), scale.or(default_scale)),
    };

    block.fields.push(FieldModel {
        name,
        sql_type,
        is_nullable: nullable,
        is_primary_key: false,
        is_identity: false,
        is_optional: false,
        precision,
        scale,
        attributes: attrs,
        raw_type: None,
    });
    Ok(())
}

/// Parses `base`, `base(n)`, `base(n,s)`, or `base(max)` into
/// `(base, precision, scale)`.
fn parse_type_token(token: &str) -> Option<(&str, Option<i32>, Option<i32>)> {
    match token.find('(') {
        None => Some((token, None, None)),
        Some(open) => {
            token.strip_suffix(')')?;
            let base = &token[..open];
            let inner = &token[open + 1..token.len() - 1];
            if inner.eq_ignore_ascii_case("max") {
                return Some((base, Some(MAX_LENGTH_MARKER), None));
            }
            let mut parts = inner.split(',');
            let precision: i32 = parts.next()?.trim().parse().ok()?;
            let scale = match parts.next() {
                Some(s) => Some(s.trim().parse().ok()?),
                None => None,
            };
            if parts.next().is_some() {
                return None;
            }
            Some((base, Some(precision), scale))
        }
    }
}

/// Synthesizes the primary key field for a freshly declared `model` block.
fn synthesize_pk(table: &str, pk_override: Option<DmdType>, no_identity: bool) -> FieldModel {
    let dmd = pk_override.unwrap_or(DmdType::Int);
    let (sql_type, precision, scale) = dmd.to_sql();
    let is_identity = !no_identity && !dmd.is_guid_like();
    FieldModel {
        name: format!("{table}ID"),
        sql_type,
        is_nullable: false,
        is_primary_key: true,
        is_identity,
        is_optional: false,
        precision,
        scale,
        attributes: BTreeSet::new(),
        raw_type: None,
    }
}

fn apply_block(table: &mut TableModel, body: BlockContents) {
    table.fields.extend(body.fields);
    table.foreign_keys.extend(body.foreign_keys);
    table.indexes.extend(body.indexes);
    table.attributes.extend(body.attributes);
}

fn merge_mixin(table: &mut TableModel, mixin: &MixinModel) {
    table.fields.extend(mixin.fields.iter().cloned());
    table.foreign_keys.extend(mixin.foreign_keys.iter().cloned());
    table.indexes.extend(mixin.indexes.iter().cloned());
    table.mixins_applied.insert(mixin.name.clone());
}

/// Parses every `.dmdx` file then every `.dmd` file in `dir` (non-recursive)
/// into a single [`DatabaseModel`].
pub fn parse_model_dir(dir: &Path) -> Result<DatabaseModel> {
    let mixin_files = collect_files(dir, "dmdx")?;
    let model_files = collect_files(dir, "dmd")?;

    let mut model = DatabaseModel::new();

    for path in &mixin_files {
        let source = read_file(path)?;
        for item in parse_file(path, &source)? {
            if let TopItem::Mixin(m) = item {
                model.insert_mixin(m);
            }
        }
    }

    for path in &model_files {
        let source = read_file(path)?;
        for item in parse_file(path, &source)? {
            match item {
                TopItem::Model { name, pk_override, with_mixin, body, header_line } => {
                    let no_identity = body.attributes.iter().any(|a| a.eq_ignore_ascii_case("NoIdentity"));
                    let mut table = TableModel::new(name.clone());
                    table.fields.push(synthesize_pk(&name, pk_override, no_identity));
                    apply_block(&mut table, body);
                    if let Some(mixin_name) = with_mixin {
                        let mixin = model.mixin(&mixin_name).cloned().ok_or_else(|| DslError {
                            file: path.clone(),
                            line: header_line,
                            kind: DslErrorKind::UnknownMixin(mixin_name.clone()),
                        })?;
                        merge_mixin(&mut table, &mixin);
                    }
                    model.insert_table(table);
                }
                TopItem::Extends { name, body, header_line } => {
                    let table = model.table_mut(&name).ok_or_else(|| DslError {
                        file: path.clone(),
                        line: header_line,
                        kind: DslErrorKind::UnknownTableForExtends(name.clone()),
                    })?;
                    apply_block(table, body);
                }
                TopItem::Mixin(_) => {}
            }
        }
    }

    Ok(model)
}

fn collect_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| DslError { file: dir.to_path_buf(), line: 0, kind: DslErrorKind::MalformedLine(e.to_string()) })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case(extension)).unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| DslError { file: path.to_path_buf(), line: 0, kind: DslErrorKind::MalformedLine(e.to_string()) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse_one(file: &str, source: &str) -> Vec<TopItem> {
        parse_file(Path::new(file), source).expect("should parse")
    }

    #[test]
    fn simple_model_gets_synthesized_int_identity_pk() {
        let items = parse_one(
            "user.dmd",
            indoc! {"
                model User {
                    nvarchar(100) Username
                }
            "},
        );
        assert_eq!(items.len(), 1);
        let TopItem::Model { name, pk_override, body, .. } = &items[0] else { panic!("expected model") };
        assert_eq!(name, "User");
        assert!(pk_override.is_none());
        assert_eq!(body.fields.len(), 1);
        assert_eq!(body.fields[0].name, "Username");
    }

    #[test]
    fn explicit_int_pk_is_rejected() {
        let err = parse_file(Path::new("x.dmd"), "model int User {\n}\n").unwrap_err();
        assert!(matches!(err.kind, DslErrorKind::ExplicitIntPrimaryKey));
    }

    #[test]
    fn guid_pk_override_parses() {
        let items = parse_one("x.dmd", "model guid Session {\n}\n");
        let TopItem::Model { pk_override, .. } = &items[0] else { panic!() };
        assert_eq!(*pk_override, Some(DmdType::Guid));
    }

    #[test]
    fn relation_line_with_default_alias() {
        let items = parse_one(
            "order.dmd",
            indoc! {"
                model Order {
                    model User
                }
            "},
        );
        let TopItem::Model { body, .. } = &items[0] else { panic!() };
        assert_eq!(body.foreign_keys[0].column, "UserID");
        assert_eq!(body.foreign_keys[0].relationship, RelationshipType::OneToOne);
    }

    #[test]
    fn relation_line_with_custom_alias_not_ending_in_id() {
        let items = parse_one("order.dmd", "model Order {\n    model User as Buyer\n}\n");
        let TopItem::Model { body, .. } = &items[0] else { panic!() };
        assert_eq!(body.foreign_keys[0].column, "BuyerUserID");
    }

    #[test]
    fn relation_line_with_alias_ending_in_id_used_verbatim() {
        let items = parse_one("order.dmd", "model Order {\n    model User as OwnerID\n}\n");
        let TopItem::Model { body, .. } = &items[0] else { panic!() };
        assert_eq!(body.foreign_keys[0].column, "OwnerID");
    }

    #[test]
    fn models_line_is_one_to_many() {
        let items = parse_one("order.dmd", "model Order {\n    models LineItem\n}\n");
        let TopItem::Model { body, .. } = &items[0] else { panic!() };
        assert_eq!(body.foreign_keys[0].relationship, RelationshipType::OneToMany);
    }

    #[test]
    fn index_line_parses_fields_and_unique_marker() {
        let items = parse_one("c.dmd", "model Client {\n    index(Email, ClientStatus) @unique\n}\n");
        let TopItem::Model { body, .. } = &items[0] else { panic!() };
        assert_eq!(body.indexes[0].fields, vec!["Email".to_string(), "ClientStatus".to_string()]);
        assert!(body.indexes[0].is_unique);
        assert!(!body.indexes[0].is_alternate_key);
    }

    #[test]
    fn key_line_is_always_unique_alternate_key() {
        let items = parse_one("c.dmd", "model Client {\n    key(Email)\n}\n");
        let TopItem::Model { body, .. } = &items[0] else { panic!() };
        assert!(body.indexes[0].is_unique);
        assert!(body.indexes[0].is_alternate_key);
    }

    #[test]
    fn max_precision_parses_to_sentinel() {
        let items = parse_one("c.dmd", "model Client {\n    nvarchar(max) Notes\n}\n");
        let TopItem::Model { body, .. } = &items[0] else { panic!() };
        assert_eq!(body.fields[0].precision, Some(MAX_LENGTH_MARKER));
    }

    #[test]
    fn unknown_type_is_an_error() {
        let err = parse_file(Path::new("c.dmd"), "model Client {\n    zorp Notes\n}\n").unwrap_err();
        assert!(matches!(err.kind, DslErrorKind::UnknownType(_)));
    }

    #[test]
    fn max_on_a_type_without_a_max_form_is_an_error() {
        let err = parse_file(Path::new("c.dmd"), "model Client {\n    cstring(max) Notes\n}\n").unwrap_err();
        assert!(matches!(err.kind, DslErrorKind::MaxNotSupportedForType(_)));
    }

    #[test]
    fn max_on_decimal_is_an_error() {
        let err = parse_file(Path::new("c.dmd"), "model Invoice {\n    decimal(max) Amount\n}\n").unwrap_err();
        assert!(matches!(err.kind, DslErrorKind::MaxNotSupportedForType(_)));
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let err = parse_file(Path::new("c.dmd"), "model Client {\n    int X\n").unwrap_err();
        assert!(matches!(err.kind, DslErrorKind::UnterminatedBlock));
    }

    #[test]
    fn no_identity_attribute_is_recorded_on_table() {
        let items = parse_one("c.dmd", "model Client {\n    @NoIdentity\n}\n");
        let TopItem::Model { body, .. } = &items[0] else { panic!() };
        assert!(body.attributes.contains("NoIdentity"));
    }

    #[test]
    fn field_attributes_are_captured() {
        let items = parse_one("c.dmd", "model Client {\n    nvarchar(60) Username @reducesize @allowdataloss\n}\n");
        let TopItem::Model { body, .. } = &items[0] else { panic!() };
        assert!(body.fields[0].has_attribute("reducesize"));
        assert!(body.fields[0].has_attribute("allowdataloss"));
    }
}
