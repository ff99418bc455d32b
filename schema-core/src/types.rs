//! The type lattice: a closed DSL-side enumeration, a closed canonical
//! SQL-side enumeration, and a total mapping between them (§4.1).
//!
//! Neither enumeration ever grows at runtime — unsupported live-side types
//! (`geometry`, `datetime2`, `date`, `time`, `datetimeoffset`) are carried as
//! [`SqlType::Unsupported`] rather than extending the enum, so the mapping
//! stays total without the lattice needing to track every vendor type.

use crate::model::FieldModel;

/// Sentinel precision meaning "the largest variable-length size the vendor
/// supports" (MAX in SQL Server terms). Kept as a single constant everywhere
/// the model, parser, exporter, and SQL emitter need to recognize MAX (§9:
/// "do not introduce a separate boolean").
pub const MAX_LENGTH_MARKER: i32 = -1;

/// The DSL-surface type a model or mixin field is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DmdType {
    Int,
    BigInt,
    SmallInt,
    TinyInt,
    Bool,
    Long,
    Short,
    String,
    UString,
    CString,
    UCString,
    Text,
    UText,
    Decimal,
    Money,
    SmallMoney,
    Float,
    DateTime,
    Guid,
    Binary,
    VarBinary,
}

/// The canonical SQL type a [`FieldModel`] is actually stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Int,
    BigInt,
    SmallInt,
    TinyInt,
    Bit,
    NVarChar,
    VarChar,
    NChar,
    Char,
    Text,
    NText,
    Decimal,
    Numeric,
    Money,
    SmallMoney,
    Float,
    DateTime,
    UniqueIdentifier,
    Binary,
    VarBinary,
    /// A live-side type the lattice has no DSL equivalent for (`geometry`,
    /// `datetime2`, `date`, `time`, `datetimeoffset`). The actual vendor type
    /// name is carried on [`FieldModel::raw_type`], not in this variant, so
    /// `SqlType` stays `Copy`.
    Unsupported,
}

/// How a canonical SQL type's precision/scale suffix is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecisionRule {
    None,
    Required,
    PrecisionWithScaleRequired,
    Optional,
}

/// Static facts about a canonical SQL type, independent of any particular field.
#[derive(Debug, Clone, Copy)]
pub struct SqlTypeInfo {
    pub precision_rule: PrecisionRule,
    pub supports_max: bool,
    pub default_precision: Option<i32>,
    pub default_scale: Option<i32>,
}

impl SqlType {
    pub fn info(self) -> SqlTypeInfo {
        use PrecisionRule::*;
        use SqlType::*;
        match self {
            Int | BigInt | SmallInt | TinyInt | Bit | DateTime | UniqueIdentifier | Float | Money | SmallMoney => {
                SqlTypeInfo { precision_rule: None, supports_max: false, default_precision: None, default_scale: None }
            }
            // `text`/`ntext` always render with the MAX marker; the suffix is
            // hardcoded in `sql_type_string`, not derived from a stored precision.
            Text | NText => SqlTypeInfo { precision_rule: None, supports_max: true, default_precision: None, default_scale: None },
            VarChar | NVarChar | VarBinary => SqlTypeInfo {
                precision_rule: Required,
                supports_max: true,
                default_precision: Some(50),
                default_scale: None,
            },
            Char | NChar | Binary => SqlTypeInfo {
                precision_rule: Required,
                supports_max: false,
                default_precision: Some(1),
                default_scale: None,
            },
            Decimal | Numeric => SqlTypeInfo {
                precision_rule: PrecisionWithScaleRequired,
                supports_max: false,
                default_precision: Some(18),
                default_scale: Some(0),
            },
            Unsupported => {
                SqlTypeInfo { precision_rule: None, supports_max: false, default_precision: None, default_scale: None }
            }
        }
    }

    /// Case-insensitive lookup of a canonical SQL type by its surface name.
    pub fn try_parse(code: &str) -> Option<SqlType> {
        use SqlType::*;
        Some(match code.to_ascii_lowercase().as_str() {
            "int" => Int,
            "bigint" => BigInt,
            "smallint" => SmallInt,
            "tinyint" => TinyInt,
            "bit" => Bit,
            "nvarchar" => NVarChar,
            "varchar" => VarChar,
            "nchar" => NChar,
            "char" => Char,
            "text" => Text,
            "ntext" => NText,
            "decimal" => Decimal,
            "numeric" => Numeric,
            "money" => Money,
            "smallmoney" => SmallMoney,
            "float" => Float,
            "datetime" => DateTime,
            "uniqueidentifier" => UniqueIdentifier,
            "binary" => Binary,
            "varbinary" => VarBinary,
            _ => return None,
        })
    }

    /// The base SQL keyword, with no precision/scale suffix.
    pub fn base_name(self) -> &'static str {
        use SqlType::*;
        match self {
            Int => "int",
            BigInt => "bigint",
            SmallInt => "smallint",
            TinyInt => "tinyint",
            Bit => "bit",
            NVarChar => "nvarchar",
            VarChar => "varchar",
            NChar => "nchar",
            Char => "char",
            Text => "varchar",
            NText => "nvarchar",
            Decimal => "decimal",
            Numeric => "numeric",
            Money => "money",
            SmallMoney => "smallmoney",
            Float => "float",
            DateTime => "datetime",
            UniqueIdentifier => "uniqueidentifier",
            Binary => "binary",
            VarBinary => "varbinary",
            Unsupported => "unsupported",
        }
    }

    /// Decimal and numeric are interchangeable for equality purposes (§4.1).
    pub fn is_decimal_family(self) -> bool {
        matches!(self, SqlType::Decimal | SqlType::Numeric)
    }

    /// Size-bearing string/binary types considered by the planner's alter-column rule (§4.5 step 3).
    pub fn is_size_bearing(self) -> bool {
        matches!(
            self,
            SqlType::VarChar | SqlType::NVarChar | SqlType::Char | SqlType::NChar | SqlType::Binary | SqlType::VarBinary
        )
    }

    /// The canonical DSL-surface type this SQL type round-trips to (used by
    /// the exporter). `None` for [`SqlType::Unsupported`] — those fields are
    /// rendered as comment lines instead of being reconstructed into a
    /// `DmdType` (§4.1: the reverse mapping is total only "over supported types").
    pub fn to_dmd(self) -> Option<DmdType> {
        use SqlType::*;
        Some(match self {
            Int => DmdType::Int,
            BigInt => DmdType::BigInt,
            SmallInt => DmdType::SmallInt,
            TinyInt => DmdType::TinyInt,
            Bit => DmdType::Bool,
            VarChar => DmdType::String,
            NVarChar => DmdType::UString,
            Char => DmdType::CString,
            NChar => DmdType::UCString,
            Text => DmdType::Text,
            NText => DmdType::UText,
            Decimal | Numeric => DmdType::Decimal,
            Money => DmdType::Money,
            SmallMoney => DmdType::SmallMoney,
            Float => DmdType::Float,
            DateTime => DmdType::DateTime,
            UniqueIdentifier => DmdType::Guid,
            Binary => DmdType::Binary,
            VarBinary => DmdType::VarBinary,
            Unsupported => return None,
        })
    }
}

impl DmdType {
    pub fn try_parse(code: &str) -> Option<DmdType> {
        use DmdType::*;
        Some(match code.to_ascii_lowercase().as_str() {
            "int" => Int,
            "bigint" => BigInt,
            "smallint" => SmallInt,
            "tinyint" => TinyInt,
            "bool" => Bool,
            "long" => Long,
            "short" => Short,
            "string" => String,
            "ustring" => UString,
            "cstring" => CString,
            "ucstring" => UCString,
            "text" => Text,
            "utext" => UText,
            "decimal" => Decimal,
            "money" => Money,
            "smallmoney" => SmallMoney,
            "float" => Float,
            "datetime" => DateTime,
            "guid" => Guid,
            "binary" => Binary,
            "varbinary" => VarBinary,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use DmdType::*;
        match self {
            Int => "int",
            BigInt => "bigint",
            SmallInt => "smallint",
            TinyInt => "tinyint",
            Bool => "bool",
            Long => "long",
            Short => "short",
            String => "string",
            UString => "ustring",
            CString => "cstring",
            UCString => "ucstring",
            Text => "text",
            UText => "utext",
            Decimal => "decimal",
            Money => "money",
            SmallMoney => "smallmoney",
            Float => "float",
            DateTime => "datetime",
            Guid => "guid",
            Binary => "binary",
            VarBinary => "varbinary",
        }
    }

    /// Does this DSL type force-disable identity on the primary key? (§3, §4.3: "guid forces isIdentity=false")
    pub fn is_guid_like(self) -> bool {
        matches!(self, DmdType::Guid)
    }

    /// The total forward mapping from DSL type to canonical SQL type (§4.1).
    ///
    /// `money`/`smallmoney` are rewritten straight to their fixed-precision
    /// decimal equivalents here rather than to `SqlType::Money`/`SmallMoney` —
    /// those SQL variants exist in the lattice only to round-trip a value a
    /// vendor connector might hand back, per the normalization rule in §4.1/§4.4.
    pub fn to_sql(self) -> (SqlType, Option<i32>, Option<i32>) {
        use DmdType::*;
        match self {
            Int => (SqlType::Int, None, None),
            BigInt | Long => (SqlType::BigInt, None, None),
            SmallInt | Short => (SqlType::SmallInt, None, None),
            TinyInt => (SqlType::TinyInt, None, None),
            Bool => (SqlType::Bit, None, None),
            String => (SqlType::VarChar, None, None),
            UString => (SqlType::NVarChar, None, None),
            CString => (SqlType::Char, None, None),
            UCString => (SqlType::NChar, None, None),
            Text => (SqlType::Text, Some(MAX_LENGTH_MARKER), None),
            UText => (SqlType::NText, Some(MAX_LENGTH_MARKER), None),
            Decimal => (SqlType::Decimal, None, None),
            Money => (SqlType::Decimal, Some(19), Some(4)),
            SmallMoney => (SqlType::Decimal, Some(10), Some(4)),
            Float => (SqlType::Float, None, None),
            DateTime => (SqlType::DateTime, None, None),
            Guid => (SqlType::UniqueIdentifier, None, None),
            Binary => (SqlType::Binary, None, None),
            VarBinary => (SqlType::VarBinary, None, None),
        }
    }
}

/// Renders the canonical SQL declaration suffix for a field, per the
/// `precisionType` rule in §4.1: no suffix, `(p)`, `(p,s)`, or `(max)`.
pub fn sql_type_string(field: &FieldModel) -> String {
    if field.sql_type == SqlType::Unsupported {
        let base = field.raw_type.as_deref().unwrap_or("unsupported");
        return match (field.precision, field.scale) {
            (Some(p), Some(s)) => format!("{base}({p},{s})"),
            (Some(p), None) => format!("{base}({p})"),
            _ => base.to_string(),
        };
    }
    let base = field.sql_type.base_name();
    match field.sql_type {
        SqlType::Text => "varchar(max)".to_string(),
        SqlType::NText => "nvarchar(max)".to_string(),
        t if t.info().supports_max && field.precision == Some(MAX_LENGTH_MARKER) => format!("{base}(max)"),
        SqlType::VarChar | SqlType::NVarChar | SqlType::Char | SqlType::NChar | SqlType::Binary | SqlType::VarBinary => {
            let p = field.precision.or(field.sql_type.info().default_precision).unwrap_or(1);
            format!("{base}({p})")
        }
        SqlType::Decimal | SqlType::Numeric => {
            let info = field.sql_type.info();
            let p = field.precision.or(info.default_precision).unwrap_or(18);
            let s = field.scale.or(info.default_scale).unwrap_or(0);
            format!("{base}({p},{s})")
        }
        _ => base.to_string(),
    }
}

/// Renders the DSL-surface type string for a field, the inverse of parsing,
/// used by the exporter (§4.1 `dmdTypeString`). For [`SqlType::Unsupported`]
/// fields this renders the raw vendor type name rather than a `DmdType` —
/// the exporter wraps the result in a `#`-comment line itself.
pub fn dmd_type_string(field: &FieldModel) -> String {
    if field.sql_type == SqlType::Unsupported {
        return sql_type_string(field);
    }
    let dmd = field.sql_type.to_dmd().expect("checked above");
    let name = dmd.name();
    match field.sql_type {
        SqlType::Text | SqlType::NText => name.to_string(),
        t if t.info().precision_rule == PrecisionRule::Required && field.precision == Some(MAX_LENGTH_MARKER) => {
            format!("{name}(max)")
        }
        SqlType::VarChar | SqlType::NVarChar | SqlType::Char | SqlType::NChar | SqlType::Binary | SqlType::VarBinary => {
            match field.precision {
                Some(p) => format!("{name}({p})"),
                None => name.to_string(),
            }
        }
        SqlType::Decimal | SqlType::Numeric => match (field.precision, field.scale) {
            (Some(p), Some(s)) => format!("{name}({p},{s})"),
            (Some(p), None) => format!("{name}({p})"),
            _ => name.to_string(),
        },
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldModel;

    fn field(sql_type: SqlType, precision: Option<i32>, scale: Option<i32>) -> FieldModel {
        FieldModel {
            name: "f".into(),
            sql_type,
            is_nullable: false,
            is_primary_key: false,
            is_identity: false,
            is_optional: false,
            precision,
            scale,
            attributes: Default::default(),
            raw_type: None,
        }
    }

    #[test]
    fn dmd_to_sql_is_total_and_case_insensitive() {
        for code in ["int", "BIGINT", "Guid", "money", "utext"] {
            let dmd = DmdType::try_parse(code).expect("should parse");
            let _ = dmd.to_sql();
        }
    }

    #[test]
    fn money_rewrites_straight_to_fixed_decimal() {
        let (sql, p, s) = DmdType::Money.to_sql();
        assert_eq!(sql, SqlType::Decimal);
        assert_eq!(p, Some(19));
        assert_eq!(s, Some(4));
    }

    #[test]
    fn sql_type_string_renders_max_sentinel() {
        let f = field(SqlType::NVarChar, Some(MAX_LENGTH_MARKER), None);
        assert_eq!(sql_type_string(&f), "nvarchar(max)");
    }

    #[test]
    fn text_and_ntext_always_render_varchar_max() {
        let f = field(SqlType::Text, Some(37), None);
        assert_eq!(sql_type_string(&f), "varchar(max)");
        let f = field(SqlType::NText, None, None);
        assert_eq!(sql_type_string(&f), "nvarchar(max)");
    }

    #[test]
    fn decimal_renders_precision_and_scale() {
        let f = field(SqlType::Decimal, Some(19), Some(4));
        assert_eq!(sql_type_string(&f), "decimal(19,4)");
    }

    #[test]
    fn dmd_type_string_round_trips_nvarchar() {
        let f = field(SqlType::NVarChar, Some(100), None);
        assert_eq!(dmd_type_string(&f), "ustring(100)");
    }

    #[test]
    fn dmd_type_string_round_trips_max() {
        let f = field(SqlType::VarChar, Some(MAX_LENGTH_MARKER), None);
        assert_eq!(dmd_type_string(&f), "string(max)");
    }

    #[test]
    fn numeric_and_decimal_are_equal_in_family() {
        assert!(SqlType::Decimal.is_decimal_family());
        assert!(SqlType::Numeric.is_decimal_family());
    }
}
