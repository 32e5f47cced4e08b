use std::collections::TryReserveError;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], for callers that only need to know
/// which part of an invocation failed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    Io,
    Codec,
    Format,
    Resource,
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O failure while {context}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Codec failure")]
    Codec(#[from] CodecError),

    #[error("Invalid container data")]
    Format(#[from] FormatError),

    #[error("Resource exhausted")]
    Resource(#[from] ResourceError),

    #[error("Invalid configuration")]
    Config(#[from] ConfigError),
}

impl Error {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Error {
        Error::Io { context, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io { .. } => ErrorKind::Io,
            Error::Codec(_) => ErrorKind::Codec,
            Error::Format(_) => ErrorKind::Format,
            Error::Resource(_) => ErrorKind::Resource,
            Error::Config(_) => ErrorKind::Config,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Compressed data is malformed")]
    Malformed,

    #[error("Decompressed data does not fit in {capacity} bytes")]
    CapacityExceeded { capacity: usize },

    #[error("Expected {expected} decompressed bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Codec `{0}` is not supported by this build")]
    Unsupported(String),

    #[error("Offload engine is no longer running")]
    EngineStopped,

    #[error("Codec internal fault")]
    Internal(#[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Chunk index is truncated")]
    Truncated,

    #[error("Chunk index holds no offsets")]
    EmptyIndex,

    #[error("First chunk offset is not zero")]
    NonZeroFirstOffset,

    #[error("Chunk offsets decrease at position {index}")]
    NotMonotonic { index: usize },

    #[error("Index describes {actual} chunks, expected {expected} for the recorded size")]
    ChunkCountMismatch { expected: u64, actual: u64 },

    #[error("Recorded last chunk size {recorded} disagrees with expected {expected}")]
    LastChunkMismatch { recorded: u64, expected: u64 },

    #[error("Unexpected data after the end of the chunk index")]
    TrailingData,

    #[error("Range {start:#x}..{end:#x} is outside of {file_size} available bytes")]
    DataOutOfBounds { start: u64, end: u64, file_size: u64 },

    #[error("Length prefix of chunk {chunk} disagrees with the chunk index")]
    FrameMismatch { chunk: u64 },

    #[error("Compressed chunk of {len} bytes cannot be framed")]
    ChunkTooLarge { len: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Could not allocate {requested} bytes")]
    Allocation {
        requested: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("Could not start worker pool")]
    ThreadPool(#[source] rayon::ThreadPoolBuildError),

    #[error("Could not start offload engine")]
    Thread(#[source] std::io::Error),
}

/// Allocates an empty buffer able to hold exactly `len` bytes, reporting
/// allocation failure instead of aborting.
pub(crate) fn alloc_buffer(len: usize) -> std::result::Result<Vec<u8>, ResourceError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|source| ResourceError::Allocation {
            requested: len,
            source,
        })?;
    Ok(buf)
}
