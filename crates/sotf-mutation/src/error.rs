//! Error types for the `sotf-mutation` crate.

/// Errors raised while loading or validating a trait catalog.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// The catalog file could not be read.
    #[error("failed to read trait catalog: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The catalog JSON is malformed.
    #[error("failed to parse trait catalog: {source}")]
    Parse {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// Two catalog entries share a name.
    #[error("duplicate trait name in catalog: {0}")]
    DuplicateTrait(String),

    /// A catalog entry has an empty name.
    #[error("trait at index {index} has an empty name")]
    UnnamedTrait {
        /// Position of the entry in the catalog file.
        index: usize,
    },
}
