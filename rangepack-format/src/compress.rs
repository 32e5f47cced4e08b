use std::convert::TryFrom;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::chunk::Chunk;
use crate::codec::Codec;
use crate::config::{Config, ContainerFormat};
use crate::error::{Error, FormatError, Result};
use crate::index::{ChunkIndex, FRAME_PREFIX_LEN};
use crate::processor::ChunkProcessor;
use crate::storage::{AppendSink, FileSink, MmapSource, RandomAccessSource};

/// Drives a source through the splitter and the worker pool, appending
/// compressed chunks to a sink in their original order.
#[derive(Debug)]
pub struct Compressor<C> {
    config: Config,
    codec: C,
    processor: ChunkProcessor,
}

impl<C: Codec> Compressor<C> {
    pub fn new(config: Config, codec: C) -> Result<Compressor<C>> {
        config.validate()?;
        let processor = ChunkProcessor::new(config.threads)?;

        Ok(Compressor {
            config,
            codec,
            processor,
        })
    }

    #[inline(always)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline(always)]
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Compresses all of `source` into `sink` and returns the finished index.
    ///
    /// Full map windows are processed first, then whatever remains. The
    /// index is not persisted; see [`Compressor::compress_file`].
    pub fn compress<S, W>(&self, source: &S, mut sink: W) -> Result<ChunkIndex>
    where
        S: RandomAccessSource + ?Sized,
        W: AppendSink,
    {
        let total = source.size();
        let window = self.config.map_window_size();

        tracing::info!(
            size = total,
            chunk_size = self.config.chunk_size,
            codec = self.codec.name(),
            format = %self.config.format,
            "compressing"
        );

        let mut index = ChunkIndex::new();
        let mut offset = 0u64;

        while total - offset >= window {
            self.compress_window(source, offset, window as usize, &mut index, &mut sink)?;
            offset += window;
        }

        if offset < total {
            let remainder = (total - offset) as usize;
            self.compress_window(source, offset, remainder, &mut index, &mut sink)?;
        }

        index.finish(total, self.config.chunk_size);
        sink.flush()
            .map_err(|e| Error::io("flushing compressed data", e))?;

        tracing::info!(
            chunks = index.chunk_count(),
            compressed_size = index.compressed_size(),
            "compressed"
        );

        Ok(index)
    }

    /// Compresses the file at `input` into `output`, writing the index to
    /// `index_path` in the configured format.
    pub fn compress_file<P, Q, R>(&self, input: P, output: Q, index_path: R) -> Result<ChunkIndex>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        R: AsRef<Path>,
    {
        let source = MmapSource::open(input).map_err(|e| Error::io("opening source file", e))?;
        let sink = FileSink::create(output).map_err(|e| Error::io("creating compressed file", e))?;

        let index = self.compress(&source, sink)?;
        index.save(index_path, self.config.format)?;
        Ok(index)
    }

    fn compress_window<S, W>(
        &self,
        source: &S,
        offset: u64,
        len: usize,
        index: &mut ChunkIndex,
        sink: &mut W,
    ) -> Result<()>
    where
        S: RandomAccessSource + ?Sized,
        W: AppendSink,
    {
        let compressed = {
            let view = source
                .map_range(offset, len)
                .map_err(|e| Error::io("mapping source window", e))?;
            let chunks = self.processor.split(&view, self.config.chunk_size)?;
            self.processor.compress_batch(&self.codec, &chunks)?
        };

        let before = index.compressed_size();
        for chunk in compressed.iter() {
            self.append_chunk(chunk, index, sink)?;
        }

        tracing::debug!(
            start = format_args!("{:#x}", offset),
            len = format_args!("{:#x}", len),
            chunks = compressed.len(),
            compressed = index.compressed_size() - before,
            "compressed window"
        );

        Ok(())
    }

    fn append_chunk<W: AppendSink>(&self, chunk: &Chunk, index: &mut ChunkIndex, sink: &mut W) -> Result<()> {
        let mut written = chunk.len() as u64;

        if self.config.format == ContainerFormat::Framed {
            let len = u32::try_from(chunk.len())
                .map_err(|_| FormatError::ChunkTooLarge { len: chunk.len() })?;
            let mut prefix = [0u8; FRAME_PREFIX_LEN as usize];
            LittleEndian::write_u32(&mut prefix, len);
            sink.append(&prefix)
                .map_err(|e| Error::io("writing compressed data", e))?;
            written += FRAME_PREFIX_LEN;
        }

        sink.append(chunk)
            .map_err(|e| Error::io("writing compressed data", e))?;
        index.push(written);
        Ok(())
    }
}
