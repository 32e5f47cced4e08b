use std::convert::TryFrom;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::cache::PageCache;
use crate::chunk::Chunk;
use crate::codec::Codec;
use crate::config::{Config, ContainerFormat};
use crate::error::{alloc_buffer, Error, FormatError, Result};
use crate::index::{ChunkIndex, FRAME_PREFIX_LEN};
use crate::processor::{ChunkProcessor, DecompressJob};
use crate::storage::{MmapSource, OutputFile, PreallocatedSink, RandomAccessSource};

/// Restores original bytes from a compressed data file and its index.
///
/// Compressed bytes are always fetched through a [`PageCache`], one batch of
/// up to `chunks_per_window` chunks at a time.
#[derive(Debug)]
pub struct Decompressor<C> {
    config: Config,
    codec: C,
    processor: ChunkProcessor,
}

impl<C: Codec> Decompressor<C> {
    pub fn new(config: Config, codec: C) -> Result<Decompressor<C>> {
        config.validate()?;
        let processor = ChunkProcessor::new(config.threads)?;

        Ok(Decompressor {
            config,
            codec,
            processor,
        })
    }

    #[inline(always)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decompresses every chunk of `index` into `sink`, which is first sized
    /// to the original length. Each chunk lands at its absolute offset.
    pub fn decompress<S, W>(&self, index: &ChunkIndex, cache: &mut PageCache<S>, mut sink: W) -> Result<()>
    where
        S: RandomAccessSource,
        W: PreallocatedSink,
    {
        index.validate(self.config.chunk_size)?;

        tracing::info!(
            size = index.original_size(),
            chunks = index.chunk_count(),
            codec = self.codec.name(),
            format = %self.config.format,
            "decompressing"
        );

        sink.set_length(index.original_size())
            .map_err(|e| Error::io("sizing output file", e))?;

        let count = index.chunk_count();
        let batch = self.config.chunks_per_window as u64;
        let mut next = 0u64;

        while next + batch < count {
            self.decompress_batch(index, cache, next, batch, &mut sink)?;
            next += batch;
        }

        if next < count {
            self.decompress_batch(index, cache, next, count - next, &mut sink)?;
        }

        sink.flush()
            .map_err(|e| Error::io("flushing output file", e))?;

        let stats = cache.stats();
        tracing::info!(
            hits = stats.hits,
            misses = stats.misses,
            evictions = stats.evictions,
            "decompressed"
        );

        Ok(())
    }

    /// Decompresses `compressed` into `output` using the index at
    /// `index_path`, read in the configured format.
    pub fn decompress_file<P, Q, R>(&self, compressed: P, index_path: Q, output: R) -> Result<ChunkIndex>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        R: AsRef<Path>,
    {
        let index = ChunkIndex::load(index_path, self.config.format)?;
        let source = MmapSource::open(compressed).map_err(|e| Error::io("opening compressed file", e))?;
        let mut cache = PageCache::new(source, &self.config)?;
        let sink = OutputFile::create(output).map_err(|e| Error::io("creating output file", e))?;

        self.decompress(&index, &mut cache, sink)?;
        Ok(index)
    }

    /// Returns `len` bytes of the original file starting at `offset`,
    /// decompressing only the chunks that overlap the range.
    pub fn read_range<S>(
        &self,
        index: &ChunkIndex,
        cache: &mut PageCache<S>,
        offset: u64,
        len: usize,
    ) -> Result<Vec<u8>>
    where
        S: RandomAccessSource,
    {
        index.validate(self.config.chunk_size)?;

        let end = match offset.checked_add(len as u64) {
            Some(end) if end <= index.original_size() => end,
            _ => {
                return Err(FormatError::DataOutOfBounds {
                    start: offset,
                    end: offset.saturating_add(len as u64),
                    file_size: index.original_size(),
                }
                .into())
            }
        };

        if len == 0 {
            return Ok(Vec::new());
        }

        let chunk_size = self.config.chunk_size as u64;
        let first = offset / chunk_size;
        let last = (end - 1) / chunk_size;
        let batch = self.config.chunks_per_window as u64;

        let mut out = alloc_buffer(len)?;
        let mut next = first;
        while next <= last {
            let count = (last - next + 1).min(batch);
            let chunks = self.decode_chunks(index, cache, next, count)?;

            for (i, raw) in chunks.iter().enumerate() {
                let chunk_start = (next + i as u64) * chunk_size;
                let from = (offset.max(chunk_start) - chunk_start) as usize;
                let to = (end.min(chunk_start + raw.len() as u64) - chunk_start) as usize;
                out.extend_from_slice(&raw[from..to]);
            }

            next += count;
        }

        tracing::debug!(
            start = format_args!("{:#x}", offset),
            len,
            chunks = last - first + 1,
            "read range"
        );

        Ok(out)
    }

    fn decompress_batch<S, W>(
        &self,
        index: &ChunkIndex,
        cache: &mut PageCache<S>,
        first: u64,
        count: u64,
        sink: &mut W,
    ) -> Result<()>
    where
        S: RandomAccessSource,
        W: PreallocatedSink,
    {
        let chunks = self.decode_chunks(index, cache, first, count)?;
        let chunk_size = self.config.chunk_size as u64;

        for (i, chunk) in chunks.iter().enumerate() {
            let global = first + i as u64;
            sink.write_at(global * chunk_size, chunk)
                .map_err(|e| Error::io("writing output file", e))?;
        }

        tracing::debug!(
            first,
            count,
            start = format_args!("{:#x}", first * chunk_size),
            "decompressed batch"
        );

        Ok(())
    }

    /// Fetches the compressed span of `count` chunks from `first` and
    /// decompresses them, in chunk order.
    fn decode_chunks<S: RandomAccessSource>(
        &self,
        index: &ChunkIndex,
        cache: &mut PageCache<S>,
        first: u64,
        count: u64,
    ) -> Result<Vec<Chunk>> {
        let base = index.offsets()[first as usize];
        let span = index.view_size(first, count);
        let span = usize::try_from(span).map_err(|_| FormatError::DataOutOfBounds {
            start: base,
            end: base.saturating_add(span),
            file_size: cache.file_size(),
        })?;

        let view = cache.read_range(base, span)?;

        let jobs = (first..first + count)
            .map(|i| {
                let range = index.compressed_range(i);
                let local = &view[(range.start - base) as usize..(range.end - base) as usize];
                Ok(DecompressJob {
                    source: self.unframe(i, local)?,
                    expected_len: index.chunk_raw_len(i, self.config.chunk_size) as usize,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.processor.decompress_batch(&self.codec, &jobs)
    }

    fn unframe<'a>(&self, chunk: u64, bytes: &'a [u8]) -> Result<&'a [u8]> {
        if self.config.format != ContainerFormat::Framed {
            return Ok(bytes);
        }

        let prefix_len = FRAME_PREFIX_LEN as usize;
        if bytes.len() < prefix_len {
            return Err(FormatError::FrameMismatch { chunk }.into());
        }

        let recorded = LittleEndian::read_u32(&bytes[..prefix_len]) as usize;
        if recorded != bytes.len() - prefix_len {
            return Err(FormatError::FrameMismatch { chunk }.into());
        }

        Ok(&bytes[prefix_len..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ZlibCodec;
    use crate::compress::Compressor;
    use crate::storage::MemorySource;
    use crate::ErrorKind;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 256) as u8 ^ (i / 977) as u8).collect()
    }

    fn small_config() -> Config {
        Config::default()
            .with_chunk_size(1024)
            .with_chunks_per_window(3)
            .with_page_size(2048)
            .with_page_alignment(512)
            .with_page_count(2)
            .with_threads(3)
    }

    fn packed(config: &Config, data: &[u8]) -> (ChunkIndex, Vec<u8>) {
        let compressor = Compressor::new(config.clone(), ZlibCodec::new(9)).unwrap();
        let mut out = Vec::new();
        let index = compressor
            .compress(&MemorySource::new(data.to_vec()), &mut out)
            .unwrap();
        (index, out)
    }

    #[test]
    fn batches_and_remainder_restore_everything() {
        let config = small_config();
        let data = pattern(10 * 1024 + 321);
        let (index, compressed) = packed(&config, &data);

        let decompressor = Decompressor::new(config.clone(), ZlibCodec::new(9)).unwrap();
        let mut cache = PageCache::new(MemorySource::new(compressed), &config).unwrap();
        let mut out = Vec::new();
        decompressor.decompress(&index, &mut cache, &mut out).unwrap();

        assert_eq!(out, data);
        assert!(cache.stats().misses > 0);
    }

    #[test]
    fn framed_roundtrip() {
        let config = small_config().with_format(ContainerFormat::Framed);
        let data = pattern(5 * 1024 + 1);
        let (index, compressed) = packed(&config, &data);

        let decompressor = Decompressor::new(config.clone(), ZlibCodec::new(9)).unwrap();
        let mut cache = PageCache::new(MemorySource::new(compressed), &config).unwrap();
        let mut out = Vec::new();
        decompressor.decompress(&index, &mut cache, &mut out).unwrap();

        assert_eq!(out, data);
    }

    #[test]
    fn corrupt_frame_prefix_is_detected() {
        let config = small_config().with_format(ContainerFormat::Framed);
        let data = pattern(2048);
        let (index, mut compressed) = packed(&config, &data);
        compressed[0] ^= 0xff;

        let decompressor = Decompressor::new(config.clone(), ZlibCodec::new(9)).unwrap();
        let mut cache = PageCache::new(MemorySource::new(compressed), &config).unwrap();
        let err = decompressor
            .decompress(&index, &mut cache, Vec::<u8>::new())
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Format(FormatError::FrameMismatch { chunk: 0 })
        ));
    }

    #[test]
    fn read_range_spans_chunk_boundaries() {
        let config = small_config();
        let data = pattern(9 * 1024 + 50);
        let (index, compressed) = packed(&config, &data);

        let decompressor = Decompressor::new(config.clone(), ZlibCodec::new(9)).unwrap();
        let mut cache = PageCache::new(MemorySource::new(compressed), &config).unwrap();

        for &(offset, len) in &[(0u64, 10usize), (1000, 100), (1024, 1024), (500, 7000), (9 * 1024, 50)] {
            let bytes = decompressor
                .read_range(&index, &mut cache, offset, len)
                .unwrap();
            assert_eq!(bytes, &data[offset as usize..offset as usize + len]);
        }

        assert!(decompressor
            .read_range(&index, &mut cache, 3, 0)
            .unwrap()
            .is_empty());

        let err = decompressor
            .read_range(&index, &mut cache, 9 * 1024, 51)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn mismatched_chunk_size_is_a_format_error() {
        let config = small_config();
        let (index, compressed) = packed(&config, &pattern(4096));

        let other = config.clone().with_chunk_size(2048);
        let decompressor = Decompressor::new(other.clone(), ZlibCodec::new(9)).unwrap();
        let mut cache = PageCache::new(MemorySource::new(compressed), &other).unwrap();
        let mut out = Vec::new();

        let err = decompressor
            .decompress(&index, &mut cache, &mut out)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(out.is_empty());
    }

    #[test]
    fn index_claiming_huge_size_is_a_format_error() {
        let config = small_config();
        let index = ChunkIndex::from_parts(u64::MAX, vec![0]).unwrap();

        let decompressor = Decompressor::new(config.clone(), ZlibCodec::new(9)).unwrap();
        let mut cache = PageCache::new(MemorySource::new(vec![0u8; 64]), &config).unwrap();

        let err = decompressor
            .read_range(&index, &mut cache, 0, 10)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::ChunkCountMismatch { actual: 0, .. })
        ));
    }
}
