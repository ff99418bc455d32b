use std::fmt;
use std::path::PathBuf;

/// Which of the three front-end error categories a [`DslError`] belongs to.
///
/// The category is informational only — all three abort the current
/// operation the same way (§7 propagation policy) — but hosts that want to
/// report "3 parse errors, 1 reference error" separately can group on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parse,
    Reference,
    Type,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DslErrorKind {
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("`{0}(max)` is not valid; `{0}` has no MAX-length form")]
    MaxNotSupportedForType(String),
    #[error("explicit `int` primary key declaration is not allowed; omit the type to get the default")]
    ExplicitIntPrimaryKey,
    #[error("malformed `model` header: `{0}`")]
    MalformedModelHeader(String),
    #[error("malformed `mixin` header: `{0}`")]
    MalformedMixinHeader(String),
    #[error("unterminated block, missing closing `}}`")]
    UnterminatedBlock,
    #[error("unexpected `}}` with no open block")]
    UnexpectedBlockClose,
    #[error("malformed line: `{0}`")]
    MalformedLine(String),
    #[error("`extends` references unknown model `{0}`")]
    UnknownTableForExtends(String),
    #[error("`with` references unknown mixin `{0}`")]
    UnknownMixin(String),
}

impl DslErrorKind {
    pub fn category(&self) -> ErrorCategory {
        use DslErrorKind::*;
        match self {
            UnknownType(_) | MaxNotSupportedForType(_) | ExplicitIntPrimaryKey => ErrorCategory::Type,
            UnknownTableForExtends(_) | UnknownMixin(_) => ErrorCategory::Reference,
            MalformedModelHeader(_) | MalformedMixinHeader(_) | UnterminatedBlock | UnexpectedBlockClose
            | MalformedLine(_) => ErrorCategory::Parse,
        }
    }
}

/// A parse, reference, or type error raised by the DSL front-end, carrying
/// the offending file and line (§7: "carries the offending line").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DslError {
    pub file: PathBuf,
    pub line: usize,
    pub kind: DslErrorKind,
}

impl fmt::Display for DslError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file.display(), self.line, self.kind)
    }
}

impl std::error::Error for DslError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl DslError {
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

/// Top-level error type for the connector-agnostic core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Dsl(#[from] DslError),

    /// Connectivity or introspection failure surfaced by a [`crate::loader::SchemaLoader`].
    #[error("schema loader failed: {0}")]
    Loader(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, Error>;
