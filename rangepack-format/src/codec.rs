//! Per-chunk compression strategies.
//!
//! Every codec is stateless from the caller's point of view and safe to share
//! between the workers of a [`ChunkProcessor`](crate::ChunkProcessor).

use std::io::{self, Write};
use std::sync::Arc;

use flate2::write::ZlibEncoder;
use flate2::{Decompress, FlushDecompress, Status};

use crate::compression::Compression;
use crate::error::{CodecError, Result};
use crate::offload::OffloadCodec;

pub trait Codec: Send + Sync {
    fn name(&self) -> &str;

    /// Compresses a whole chunk. The output may be larger than the input.
    fn compress(&self, source: &[u8]) -> std::result::Result<Vec<u8>, CodecError>;

    /// Decompresses a whole chunk into at most `capacity` bytes.
    fn decompress(
        &self,
        source: &[u8],
        capacity: usize,
    ) -> std::result::Result<Vec<u8>, CodecError>;
}

impl<C: Codec + ?Sized> Codec for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn compress(&self, source: &[u8]) -> std::result::Result<Vec<u8>, CodecError> {
        (**self).compress(source)
    }

    fn decompress(
        &self,
        source: &[u8],
        capacity: usize,
    ) -> std::result::Result<Vec<u8>, CodecError> {
        (**self).decompress(source, capacity)
    }
}

impl<C: Codec + ?Sized> Codec for Arc<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn compress(&self, source: &[u8]) -> std::result::Result<Vec<u8>, CodecError> {
        (**self).compress(source)
    }

    fn decompress(
        &self,
        source: &[u8],
        capacity: usize,
    ) -> std::result::Result<Vec<u8>, CodecError> {
        (**self).decompress(source, capacity)
    }
}

/// zlib streams at a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct ZlibCodec {
    level: flate2::Compression,
}

impl ZlibCodec {
    /// Levels above 9 are clamped to 9.
    pub fn new(level: u32) -> ZlibCodec {
        ZlibCodec {
            level: flate2::Compression::new(level.min(9)),
        }
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }
}

impl Default for ZlibCodec {
    fn default() -> Self {
        ZlibCodec::new(crate::config::defaults::LEVEL)
    }
}

impl Codec for ZlibCodec {
    fn name(&self) -> &str {
        "zlib"
    }

    fn compress(&self, source: &[u8]) -> std::result::Result<Vec<u8>, CodecError> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(source.len() / 2 + 64), self.level);
        encoder.write_all(source).map_err(CodecError::Internal)?;
        encoder.finish().map_err(CodecError::Internal)
    }

    fn decompress(
        &self,
        source: &[u8],
        capacity: usize,
    ) -> std::result::Result<Vec<u8>, CodecError> {
        // One spare byte tells an exact fit apart from a truncated inflate.
        let mut out = Vec::with_capacity(capacity.saturating_add(1));
        let mut inflater = Decompress::new(true);

        let status = inflater
            .decompress_vec(source, &mut out, FlushDecompress::Finish)
            .map_err(|_| CodecError::Malformed)?;

        match status {
            Status::StreamEnd if out.len() <= capacity => Ok(out),
            Status::StreamEnd => Err(CodecError::CapacityExceeded { capacity }),
            Status::Ok | Status::BufError if out.len() > capacity => {
                Err(CodecError::CapacityExceeded { capacity })
            }
            Status::Ok | Status::BufError => Err(CodecError::Malformed),
        }
    }
}

/// A `Write` sink that refuses to grow past a fixed capacity.
pub(crate) struct BoundedWriter {
    buf: Vec<u8>,
    capacity: usize,
    overflowed: bool,
}

impl BoundedWriter {
    pub(crate) fn new(capacity: usize) -> BoundedWriter {
        BoundedWriter {
            buf: Vec::with_capacity(capacity),
            capacity,
            overflowed: false,
        }
    }

    pub(crate) fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl Write for BoundedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.capacity {
            self.overflowed = true;
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "decompressed chunk exceeds its capacity",
            ));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub const fn available_codecs() -> &'static [&'static str] {
    &[
        "zlib", "stored", "deflate", "zstd", "xz", "snappy", "brotli", "offload",
    ]
}

/// Resolves a codec by name. `offload` runs zlib on a dedicated engine thread;
/// `offload:<name>` runs any other codec there instead.
pub fn codec_by_name(name: &str, level: u32) -> Result<Box<dyn Codec>> {
    if let Some(rest) = name.strip_prefix("offload") {
        let inner = match rest.strip_prefix(':') {
            Some(inner) => codec_by_name(inner, level)?,
            None if rest.is_empty() => Box::new(ZlibCodec::new(level)),
            None => return Err(CodecError::Unsupported(name.to_string()).into()),
        };
        let codec = OffloadCodec::new(inner, OffloadCodec::DEFAULT_QUEUE_DEPTH)?;
        return Ok(Box::new(codec));
    }

    let codec: Box<dyn Codec> = match name {
        "zlib" => Box::new(ZlibCodec::new(level)),
        other => match Compression::from_name(other) {
            Some(compression) => Box::new(compression),
            None => return Err(CodecError::Unsupported(other.to_string()).into()),
        },
    };

    Ok(codec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"The quick brown fox jumps over the lazy dog. "
            .iter()
            .cycle()
            .take(8192)
            .copied()
            .collect()
    }

    #[test]
    fn zlib_roundtrip() {
        let codec = ZlibCodec::default();
        let data = sample();
        let compressed = codec.compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(codec.decompress(&compressed, data.len()).unwrap(), data);
    }

    #[test]
    fn zlib_output_is_a_zlib_stream() {
        let compressed = ZlibCodec::new(9).compress(b"hello").unwrap();
        // CMF byte for deflate with a 32K window.
        assert_eq!(compressed[0], 0x78);
    }

    #[test]
    fn zlib_is_deterministic() {
        let codec = ZlibCodec::new(9);
        let data = sample();
        assert_eq!(codec.compress(&data).unwrap(), codec.compress(&data).unwrap());
    }

    #[test]
    fn zlib_rejects_small_capacity() {
        let codec = ZlibCodec::default();
        let data = sample();
        let compressed = codec.compress(&data).unwrap();
        match codec.decompress(&compressed, data.len() - 1) {
            Err(CodecError::CapacityExceeded { capacity }) => assert_eq!(capacity, data.len() - 1),
            other => panic!("unexpected result: {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn zlib_rejects_garbage() {
        let codec = ZlibCodec::default();
        assert!(matches!(
            codec.decompress(b"definitely not zlib", 1024),
            Err(CodecError::Malformed)
        ));
    }

    #[test]
    fn level_is_clamped() {
        assert_eq!(ZlibCodec::new(42).level(), 9);
        assert_eq!(ZlibCodec::new(1).level(), 1);
    }

    #[test]
    fn bounded_writer() {
        let mut writer = BoundedWriter::new(4);
        writer.write_all(b"abcd").unwrap();
        assert!(!writer.overflowed());
        assert!(writer.write_all(b"e").is_err());
        assert!(writer.overflowed());
        assert_eq!(writer.into_inner(), b"abcd");
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(codec_by_name("zlib", 9).unwrap().name(), "zlib");
        assert_eq!(codec_by_name("stored", 9).unwrap().name(), "stored");
        assert_eq!(codec_by_name("offload", 9).unwrap().name(), "offload");
        assert!(codec_by_name("lzham", 9).is_err());
        assert!(codec_by_name("offloader", 9).is_err());
    }

    #[test]
    fn boxed_codec_delegates() {
        let codec: Box<dyn Codec> = Box::new(ZlibCodec::default());
        let data = sample();
        let compressed = codec.compress(&data).unwrap();
        assert_eq!(codec.decompress(&compressed, data.len()).unwrap(), data);
    }
}
