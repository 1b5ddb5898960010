use std::io;

use thiserror::Error;

use crate::tag::FourCC;

/// Errors raised while reading, writing or transforming tag data.
#[derive(Debug, Error)]
pub enum TagError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Parse error at a specific byte position
    #[error("Parse error at position {position}: {message}")]
    Parse { position: u64, message: String },

    #[error("Expected a '{expected}' tag, found '{found}'")]
    WrongClass { expected: FourCC, found: FourCC },

    #[error("Unsupported '{class}' tag version {version}")]
    UnsupportedVersion { class: FourCC, version: u16 },

    /// Missing substructure, inconsistent sizes, bad indices, open edge rings
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Never produced by the built-in converters, which each run one file to
    /// completion. Batches check their cancel flag between files; a custom
    /// converter passed to `convert_directory` returns this to stop its batch
    /// mid-file without the file counting as a failure.
    #[error("Conversion cancelled")]
    Cancelled,
}

impl From<binrw::Error> for TagError {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(e) => TagError::Io(e),
            other => TagError::Parse {
                position: binrw_position(&other),
                message: other.to_string(),
            },
        }
    }
}

fn binrw_position(err: &binrw::Error) -> u64 {
    match err {
        binrw::Error::BadMagic { pos, .. }
        | binrw::Error::AssertFail { pos, .. }
        | binrw::Error::NoVariantMatch { pos }
        | binrw::Error::EnumErrors { pos, .. } => *pos,
        binrw::Error::Custom { pos, .. } => *pos,
        _ => 0,
    }
}

/// Result type for tag operations
pub type Result<T> = std::result::Result<T, TagError>;
