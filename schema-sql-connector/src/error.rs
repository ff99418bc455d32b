//! Error types local to the SQL connector. Execution failures are *not*
//! part of this enum — see [`crate::runner::StepFailure`] — this enum only
//! covers what aborts a `run` or `load` call outright.

/// Top-level error type for the connector.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("executor error: {0}")]
    Executor(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("introspection query returned malformed data: {0}")]
    Introspection(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for schema_core::Error {
    fn from(err: Error) -> Self {
        schema_core::Error::Loader(Box::new(err))
    }
}
