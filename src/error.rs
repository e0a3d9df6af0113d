use thiserror::Error;

/// Errors surfaced by the extract → build → emit pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("no steps or decisions found in input")]
    ExtractionEmpty,

    #[error("record {index} (\"{label}\") has no non-empty `{field}`")]
    MissingRequiredField {
        field: &'static str,
        index: usize,
        label: String,
    },

    #[error("input is {len} bytes, larger than the {limit}-byte limit")]
    InputTooLarge { len: usize, limit: usize },

    /// Duplicate ids or dangling edges; the builder never produces these.
    #[error("flow graph integrity violated: {0}")]
    Serialization(String),

    #[error("failed to write document: {0}")]
    Write(String),
}

impl Error {
    /// Recoverable conditions the caller should report as a warning.
    pub fn is_warning(&self) -> bool {
        matches!(self, Error::ExtractionEmpty)
    }
}
