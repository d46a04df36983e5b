//! Error types for decoder construction and decode calls.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the decoder, its collaborators and the serving layer.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// An option is present but holds a value of the wrong type or range.
    #[error("Invalid option `{key}`: {reason}")]
    Config {
        /// Option name
        key: String,
        /// What is wrong with the value
        reason: String,
    },

    /// A required option was never set.
    #[error("Missing required option `{0}`")]
    MissingOption(String),

    /// A model artifact could not be read.
    #[error("Unable to load model artifact {path:?}: {source}")]
    Artifact {
        /// Artifact path
        path: PathBuf,
        /// Underlying reader failure
        #[source]
        source: candle_core::Error,
    },

    /// The embedded metadata of an artifact is absent or malformed.
    #[error("Malformed metadata in {path:?}: {reason}")]
    Metadata {
        /// Artifact path
        path: PathBuf,
        /// Parse failure description
        reason: String,
    },

    /// The metadata names a model type no factory knows about.
    #[error("Unknown model type `{0}`")]
    UnknownModelType(String),

    /// A sentence exceeded the length bound while strict truncation is on.
    #[error("Sentence {sentence} has {length} tokens, exceeding max length {max_length}")]
    Truncated {
        /// Position of the sentence in the submitted batch
        sentence: usize,
        /// True length of the sentence
        length: usize,
        /// The bound supplied by the caller
        max_length: usize,
    },

    /// An allocation does not fit into the context's workspace reservation.
    #[error("Workspace exhausted: requested {requested} bytes, reserved {reserved} bytes")]
    WorkspaceExhausted {
        /// Bytes needed by the operation
        requested: usize,
        /// Bytes reserved by the execution context
        reserved: usize,
    },

    /// The scorer's execution context has been dropped.
    #[error("Execution context of scorer {0} has been released")]
    ContextReleased(String),

    /// The scorer was used before `init` bound it to a context.
    #[error("Scorer {0} used before initialization")]
    NotInitialized(String),

    /// A restricted token id lies outside the model's output vocabulary.
    #[error("Shortlist word {word} is outside the output vocabulary of size {vocab_size}")]
    ShortlistOutOfVocab {
        /// Offending token id
        word: u32,
        /// Size of the model's output vocabulary
        vocab_size: usize,
    },

    /// Ensemble members disagree on the number of output columns.
    #[error("Scorer {scorer} produced {columns} output columns, expected {expected}")]
    ColumnMismatch {
        /// Tag of the disagreeing scorer
        scorer: String,
        /// Output columns of the disagreeing scorer
        columns: usize,
        /// Output columns of the first scorer in the ensemble
        expected: usize,
    },

    /// The search returned no hypothesis for a submitted sentence.
    #[error("Search produced no hypothesis for sentence {0}")]
    NoHypothesis(usize),

    /// Tensor computation failure.
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// The translation service has shut down and the request can not be answered.
    #[error("Translation service is closed")]
    ServiceClosed,

    /// The batch a request was decoded in failed as a whole.
    #[error("Batch decode failed: {0}")]
    BatchFailed(String),
}

impl DecodeError {
    /// Create a Config error.
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a Metadata error.
    pub fn metadata(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DecodeError>;
