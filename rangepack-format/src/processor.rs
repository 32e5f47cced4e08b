use rayon::prelude::*;

use crate::chunk::{self, Chunk};
use crate::codec::Codec;
use crate::error::{CodecError, Error, ResourceError, Result};

/// One compressed chunk to decompress, with the exact raw size it must expand to.
#[derive(Debug, Clone, Copy)]
pub struct DecompressJob<'a> {
    pub source: &'a [u8],
    pub expected_len: usize,
}

/// Fans a batch of chunks out over a worker pool.
///
/// Results are stored by input position, so the output never depends on the
/// order in which workers finish. Every call blocks until the whole batch is
/// done; a failing chunk fails the batch.
pub struct ChunkProcessor {
    pool: rayon::ThreadPool,
}

impl ChunkProcessor {
    /// `threads == 0` sizes the pool to the available parallelism.
    pub fn new(threads: usize) -> Result<ChunkProcessor> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("rangepack-worker-{}", i))
            .build()
            .map_err(ResourceError::ThreadPool)?;

        Ok(ChunkProcessor { pool })
    }

    #[inline(always)]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Splits `region` into owned chunks on this processor's workers.
    pub fn split(&self, region: &[u8], chunk_size: usize) -> Result<Vec<Chunk>> {
        self.pool.install(|| chunk::split(region, chunk_size))
    }

    /// Runs `f` over every item and returns the results in input order.
    /// On failure, the error of the lowest failing position is returned.
    pub fn process_batch<T, F>(&self, items: &[T], f: F) -> Result<Vec<Chunk>>
    where
        T: Sync,
        F: Fn(&T) -> Result<Chunk> + Sync + Send,
    {
        let slots: Vec<Result<Chunk>> = self
            .pool
            .install(|| items.par_iter().map(|item| f(item)).collect());

        slots.into_iter().collect()
    }

    pub fn compress_batch<C: Codec + ?Sized>(&self, codec: &C, chunks: &[Chunk]) -> Result<Vec<Chunk>> {
        self.process_batch(chunks, |chunk| {
            let compressed = codec.compress(chunk)?;
            Ok(Chunk::new(compressed))
        })
    }

    pub fn decompress_batch<C: Codec + ?Sized>(
        &self,
        codec: &C,
        jobs: &[DecompressJob<'_>],
    ) -> Result<Vec<Chunk>> {
        self.process_batch(jobs, |job| {
            let raw = codec.decompress(job.source, job.expected_len)?;
            if raw.len() != job.expected_len {
                return Err(Error::Codec(CodecError::LengthMismatch {
                    expected: job.expected_len,
                    actual: raw.len(),
                }));
            }
            Ok(Chunk::new(raw))
        })
    }
}

impl std::fmt::Debug for ChunkProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkProcessor")
            .field("threads", &self.threads())
            .finish()
    }
}
