//! Chunked compression of large files with random-access decompression.
//!
//! A file is cut into fixed-size chunks that are compressed independently and
//! concatenated into a data file. A side file, the [`ChunkIndex`], records
//! where each chunk starts so any range of the original can be restored by
//! decompressing only the chunks that overlap it.

mod cache;
mod chunk;
mod codec;
mod compress;
mod compression;
mod config;
mod decompress;
mod error;
mod index;
mod offload;
mod processor;
mod storage;

pub use cache::{CacheStats, PageCache};
pub use chunk::{chunk_count, split, Chunk};
pub use codec::{available_codecs, codec_by_name, Codec, ZlibCodec};
pub use compress::Compressor;
pub use compression::Compression;
pub use config::{defaults, Config, ConfigError, ContainerFormat};
pub use decompress::Decompressor;
pub use error::{CodecError, Error, ErrorKind, FormatError, ResourceError, Result};
pub use index::{ChunkIndex, FRAME_PREFIX_LEN};
pub use offload::OffloadCodec;
pub use processor::{ChunkProcessor, DecompressJob};
pub use storage::{
    AppendSink, FileSink, MemorySource, MmapSource, OutputFile, PreallocatedSink,
    RandomAccessSource, SourceView,
};

#[doc(hidden)]
pub use comde;
