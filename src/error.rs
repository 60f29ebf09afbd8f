//! Error type shared by the record reader, decoder, streams and iterators.
//!
//! Errors coming from the filesystem, the image codecs, protobuf decoding
//! and ndarray are carried as-is.

use std::path::PathBuf;

use thiserror::Error;

use crate::dataset::common_structs::ElementSpec;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Protobuf(#[from] prost::DecodeError),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error("invalid config file: {0}")]
    Config(#[from] serde_json::Error),

    /// Truncated record or checksum mismatch in a record file
    #[error("corrupt record in {path:?}: {reason}")]
    CorruptRecord { path: PathBuf, reason: String },

    #[error("feature `{key}` missing or of the wrong type in record")]
    MissingFeature { key: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("element spec mismatch: expected {expected}, got {found}")]
    ElementSpecMismatch {
        expected: ElementSpec,
        found: ElementSpec,
    },

    #[error("iterator has not been initialized, run one of its initializers first")]
    Uninitialized,

    #[error("initializer belongs to iterator {owner}, not to iterator {target}")]
    ForeignInitializer { owner: u64, target: u64 },

    #[error("end of sequence")]
    OutOfRange,
}
