//! The chunk index: where every compressed chunk lives in the data file.
//!
//! # Side file layout
//!
//! All fields are little-endian.
//!
//! | field            | type        |
//! |------------------|-------------|
//! | original size    | `u64`       |
//! | offset count     | `u64`       |
//! | offsets          | `[u64]`     |
//! | last chunk size  | `u64`, [`ContainerFormat::Framed`] only |

use std::fs::OpenOptions;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::ops::Range;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::chunk::{chunk_count, trailing_len};
use crate::config::ContainerFormat;
use crate::error::{Error, FormatError, Result};

/// Bytes of the length prefix in front of every framed chunk.
pub const FRAME_PREFIX_LEN: u64 = 4;

/// Upper bound on offsets preallocated before they are actually read.
const PREALLOCATE_LIMIT: u64 = 1 << 20;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ChunkIndex {
    original_size: u64,
    offsets: Vec<u64>,
    /// Raw size of a short final chunk, as recorded by the framed format.
    last_chunk_size: Option<u64>,
}

impl Default for ChunkIndex {
    fn default() -> Self {
        ChunkIndex::new()
    }
}

impl ChunkIndex {
    /// An empty index, seeded with the leading zero offset.
    pub fn new() -> ChunkIndex {
        ChunkIndex {
            original_size: 0,
            offsets: vec![0],
            last_chunk_size: None,
        }
    }

    /// Builds an index from parts, checking offset invariants.
    pub fn from_parts(original_size: u64, offsets: Vec<u64>) -> std::result::Result<ChunkIndex, FormatError> {
        check_offsets(&offsets)?;
        Ok(ChunkIndex {
            original_size,
            offsets,
            last_chunk_size: None,
        })
    }

    /// Records one more compressed chunk of `compressed_len` bytes.
    #[inline(always)]
    pub fn push(&mut self, compressed_len: u64) {
        let previous = self.offsets.last().copied().unwrap_or(0);
        self.offsets.push(previous + compressed_len);
    }

    /// Sets the uncompressed size once every chunk has been pushed.
    pub fn finish(&mut self, original_size: u64, chunk_size: usize) {
        self.original_size = original_size;
        self.last_chunk_size = Some(trailing_len(original_size, chunk_size));
    }

    #[inline(always)]
    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    #[inline(always)]
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    #[inline(always)]
    pub fn last_chunk_size(&self) -> Option<u64> {
        self.last_chunk_size
    }

    #[inline(always)]
    pub fn chunk_count(&self) -> u64 {
        self.offsets.len() as u64 - 1
    }

    /// Total bytes of the compressed data file.
    #[inline(always)]
    pub fn compressed_size(&self) -> u64 {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Byte range chunk `i` occupies in the compressed data file.
    #[inline(always)]
    pub fn compressed_range(&self, i: u64) -> Range<u64> {
        let i = i as usize;
        self.offsets[i]..self.offsets[i + 1]
    }

    /// Bytes spanned by `count` chunks starting at chunk `start`.
    #[inline(always)]
    pub fn view_size(&self, start: u64, count: u64) -> u64 {
        let start = start as usize;
        self.offsets[start + count as usize] - self.offsets[start]
    }

    /// Raw size of chunk `i`. Only the final chunk may be shorter than `chunk_size`.
    pub fn chunk_raw_len(&self, i: u64, chunk_size: usize) -> u64 {
        let chunk_size = chunk_size as u64;
        if i + 1 == self.chunk_count() {
            if let Some(last) = self.last_chunk_size.filter(|&len| len != 0) {
                return last;
            }
        }
        chunk_size.min(self.original_size.saturating_sub(i * chunk_size))
    }

    /// Checks that the index describes a file chunked with `chunk_size`.
    pub fn validate(&self, chunk_size: usize) -> std::result::Result<(), FormatError> {
        let expected = chunk_count(self.original_size, chunk_size);
        let actual = self.chunk_count();
        if expected != actual {
            return Err(FormatError::ChunkCountMismatch { expected, actual });
        }

        if let Some(recorded) = self.last_chunk_size {
            let expected = trailing_len(self.original_size, chunk_size);
            if recorded != expected {
                return Err(FormatError::LastChunkMismatch { recorded, expected });
            }
        }

        Ok(())
    }

    pub fn write<W: Write>(&self, writer: &mut W, format: ContainerFormat) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(self.original_size)?;
        writer.write_u64::<LittleEndian>(self.offsets.len() as u64)?;
        for offset in self.offsets.iter() {
            writer.write_u64::<LittleEndian>(*offset)?;
        }
        if format == ContainerFormat::Framed {
            writer.write_u64::<LittleEndian>(self.last_chunk_size.unwrap_or(0))?;
        }
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R, format: ContainerFormat) -> Result<ChunkIndex> {
        let original_size = read_field(reader)?;
        let count = read_field(reader)?;
        if count == 0 {
            return Err(FormatError::EmptyIndex.into());
        }

        let mut offsets = Vec::with_capacity(count.min(PREALLOCATE_LIMIT) as usize);
        for _ in 0..count {
            offsets.push(read_field(reader)?);
        }
        check_offsets(&offsets)?;

        let last_chunk_size = match format {
            ContainerFormat::Baseline => None,
            ContainerFormat::Framed => Some(read_field(reader)?),
        };

        let mut probe = [0u8; 1];
        let trailing = reader
            .read(&mut probe)
            .map_err(|source| Error::io("reading chunk index", source))?;
        if trailing != 0 {
            return Err(FormatError::TrailingData.into());
        }

        tracing::debug!(
            original_size,
            chunks = count - 1,
            compressed_size = offsets[offsets.len() - 1],
            %format,
            "read chunk index"
        );

        Ok(ChunkIndex {
            original_size,
            offsets,
            last_chunk_size,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, format: ContainerFormat) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())
            .map_err(|source| Error::io("creating chunk index", source))?;

        let mut writer = BufWriter::new(file);
        self.write(&mut writer, format)
            .and_then(|_| writer.flush())
            .map_err(|source| Error::io("writing chunk index", source))
    }

    pub fn load<P: AsRef<Path>>(path: P, format: ContainerFormat) -> Result<ChunkIndex> {
        let file = OpenOptions::new()
            .read(true)
            .open(path.as_ref())
            .map_err(|source| Error::io("opening chunk index", source))?;

        ChunkIndex::read(&mut BufReader::new(file), format)
    }
}

fn read_field<R: Read>(reader: &mut R) -> Result<u64> {
    reader.read_u64::<LittleEndian>().map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::Format(FormatError::Truncated)
        } else {
            Error::io("reading chunk index", e)
        }
    })
}

fn check_offsets(offsets: &[u64]) -> std::result::Result<(), FormatError> {
    match offsets.first() {
        None => return Err(FormatError::EmptyIndex),
        Some(&first) if first != 0 => return Err(FormatError::NonZeroFirstOffset),
        _ => {}
    }

    match offsets.windows(2).position(|pair| pair[1] < pair[0]) {
        Some(index) => Err(FormatError::NotMonotonic { index: index + 1 }),
        None => Ok(()),
    }
}
