use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot use codec `{name}`")]
    Codec {
        name: String,
        #[source]
        source: rangepack_format::Error,
    },

    #[error("Cannot set up the pipeline")]
    Setup {
        #[source]
        source: rangepack_format::Error,
    },

    #[error("Cannot compress `{}`", .path.display())]
    Compress {
        path: PathBuf,
        #[source]
        source: rangepack_format::Error,
    },

    #[error("Cannot decompress `{}`", .path.display())]
    Decompress {
        path: PathBuf,
        #[source]
        source: rangepack_format::Error,
    },

    #[error("Cannot open chunk index `{}`", .path.display())]
    OpenIndex {
        path: PathBuf,
        #[source]
        source: rangepack_format::Error,
    },

    #[error("Chunk index `{}` does not match a chunk size of {chunk_size}", .path.display())]
    IndexMismatch {
        path: PathBuf,
        chunk_size: usize,
        #[source]
        source: rangepack_format::FormatError,
    },

    #[error("Cannot open compressed file `{}`", .path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read {length} bytes at offset {offset} of `{}`", .path.display())]
    ReadRange {
        path: PathBuf,
        offset: u64,
        length: usize,
        #[source]
        source: rangepack_format::Error,
    },

    #[error("Cannot write output")]
    WriteOutput {
        #[source]
        source: std::io::Error,
    },
}
