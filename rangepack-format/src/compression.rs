//! Chunk codecs backed by `comde`. Each is compiled in behind its own cargo
//! feature; `stored` is always present.

use std::fmt;
use std::io::Cursor;

#[cfg(feature = "brotli")]
use comde::brotli::{BrotliCompressor, BrotliDecompressor};
#[cfg(feature = "deflate")]
use comde::deflate::{DeflateCompressor, DeflateDecompressor};
#[cfg(feature = "snappy")]
use comde::snappy::{SnappyCompressor, SnappyDecompressor};
#[cfg(feature = "xz")]
use comde::xz::{XzCompressor, XzDecompressor};
#[cfg(feature = "zstd")]
use comde::zstd::{ZstdCompressor, ZstdDecompressor};
use comde::{
    stored::{StoredCompressor, StoredDecompressor},
    Compressor, Decompressor,
};

use crate::codec::{BoundedWriter, Codec};
use crate::error::CodecError;

#[derive(Clone, Copy, Eq, PartialEq)]
pub enum Compression {
    Stored,
    Deflate,
    Zstd,
    Xz,
    Snappy,
    Brotli,
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Stored
    }
}

impl Compression {
    pub const fn available_variants() -> &'static [&'static str] {
        &["stored", "brotli", "deflate", "snappy", "xz", "zstd"]
    }

    pub fn from_name(name: &str) -> Option<Compression> {
        Some(match name {
            "stored" => Compression::Stored,
            "deflate" => Compression::Deflate,
            "zstd" | "zstandard" => Compression::Zstd,
            "xz" => Compression::Xz,
            "snappy" => Compression::Snappy,
            "brotli" => Compression::Brotli,
            _ => return None,
        })
    }

    /// Short lowercase name, as accepted by [`Compression::from_name`].
    pub const fn name(self) -> &'static str {
        match self {
            Compression::Stored => "stored",
            Compression::Deflate => "deflate",
            Compression::Zstd => "zstd",
            Compression::Xz => "xz",
            Compression::Snappy => "snappy",
            Compression::Brotli => "brotli",
        }
    }

    fn unsupported(self) -> CodecError {
        CodecError::Unsupported(self.name().to_string())
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Compression::Stored => "stored",
            Compression::Deflate => "DEFLATE",
            Compression::Zstd => "Zstandard",
            Compression::Xz => "xz",
            Compression::Snappy => "Snappy",
            Compression::Brotli => "Brotli",
        })
    }
}

impl fmt::Debug for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Codec for Compression {
    fn name(&self) -> &str {
        Compression::name(*self)
    }

    fn compress(&self, source: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(source.len() / 2 + 64);
        let mut reader = source;
        let mut writer = Cursor::new(&mut out);

        let written = match self {
            Compression::Stored => StoredCompressor.compress(&mut writer, &mut reader),
            #[cfg(feature = "deflate")]
            Compression::Deflate => DeflateCompressor.compress(&mut writer, &mut reader),
            #[cfg(feature = "zstd")]
            Compression::Zstd => ZstdCompressor.compress(&mut writer, &mut reader),
            #[cfg(feature = "xz")]
            Compression::Xz => XzCompressor.compress(&mut writer, &mut reader),
            #[cfg(feature = "snappy")]
            Compression::Snappy => SnappyCompressor.compress(&mut writer, &mut reader),
            #[cfg(feature = "brotli")]
            Compression::Brotli => BrotliCompressor.compress(&mut writer, &mut reader),
            #[allow(unreachable_patterns)]
            missing => return Err(missing.unsupported()),
        };

        written.map_err(CodecError::Internal)?;
        Ok(out)
    }

    fn decompress(&self, source: &[u8], capacity: usize) -> Result<Vec<u8>, CodecError> {
        let mut writer = BoundedWriter::new(capacity);

        let copied = match self {
            Compression::Stored => StoredDecompressor.copy(source, &mut writer),
            #[cfg(feature = "deflate")]
            Compression::Deflate => DeflateDecompressor.copy(source, &mut writer),
            #[cfg(feature = "zstd")]
            Compression::Zstd => ZstdDecompressor.copy(source, &mut writer),
            #[cfg(feature = "xz")]
            Compression::Xz => XzDecompressor.copy(source, &mut writer),
            #[cfg(feature = "snappy")]
            Compression::Snappy => SnappyDecompressor.copy(source, &mut writer),
            #[cfg(feature = "brotli")]
            Compression::Brotli => BrotliDecompressor.copy(source, &mut writer),
            #[allow(unreachable_patterns)]
            missing => return Err(missing.unsupported()),
        };

        match copied {
            Ok(_) => Ok(writer.into_inner()),
            Err(_) if writer.overflowed() => Err(CodecError::CapacityExceeded { capacity }),
            Err(_) => Err(CodecError::Malformed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"This, this, this, this, this is a compressable string string string.\n"
            .iter()
            .cycle()
            .take(4096)
            .copied()
            .collect()
    }

    #[test]
    fn stored_roundtrip() {
        let data = sample();
        let compressed = Codec::compress(&Compression::Stored, &data).unwrap();
        assert_eq!(compressed, data);
        assert_eq!(
            Codec::decompress(&Compression::Stored, &compressed, data.len()).unwrap(),
            data
        );
    }

    #[test]
    fn stored_respects_capacity() {
        let data = sample();
        assert!(matches!(
            Codec::decompress(&Compression::Stored, &data, 10),
            Err(CodecError::CapacityExceeded { capacity: 10 })
        ));
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn deflate_roundtrip() {
        let data = sample();
        let compressed = Codec::compress(&Compression::Deflate, &data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(
            Codec::decompress(&Compression::Deflate, &compressed, data.len()).unwrap(),
            data
        );
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn zstd_roundtrip() {
        let data = sample();
        let compressed = Codec::compress(&Compression::Zstd, &data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(
            Codec::decompress(&Compression::Zstd, &compressed, data.len()).unwrap(),
            data
        );
    }

    #[cfg(not(feature = "xz"))]
    #[test]
    fn disabled_codec_is_unsupported() {
        assert!(matches!(
            Codec::compress(&Compression::Xz, b"abc"),
            Err(CodecError::Unsupported(_))
        ));
    }

    #[test]
    fn names_roundtrip() {
        for name in Compression::available_variants() {
            let compression = Compression::from_name(name).unwrap();
            assert_eq!(compression.name(), *name);
        }
        assert_eq!(Compression::from_name("zstandard"), Some(Compression::Zstd));
        assert_eq!(Compression::from_name("rar"), None);
    }
}
