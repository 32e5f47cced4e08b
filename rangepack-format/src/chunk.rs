use std::ops::Deref;

use rayon::prelude::*;

use crate::config::ConfigError;
use crate::error::{alloc_buffer, ResourceError, Result};

/// An owned buffer holding one chunk, raw or compressed.
#[derive(Clone, Eq, PartialEq)]
pub struct Chunk {
    data: Vec<u8>,
}

impl Chunk {
    #[inline(always)]
    pub fn new(data: Vec<u8>) -> Chunk {
        Chunk { data }
    }

    pub fn copy_from(bytes: &[u8]) -> std::result::Result<Chunk, ResourceError> {
        let mut data = alloc_buffer(bytes.len())?;
        data.extend_from_slice(bytes);
        Ok(Chunk { data })
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline(always)]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Deref for Chunk {
    type Target = [u8];

    #[inline(always)]
    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for Chunk {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk").field("len", &self.data.len()).finish()
    }
}

/// Copies `region` into owned chunks of `chunk_size` bytes.
///
/// A region that is an exact multiple of `chunk_size` yields only full chunks.
/// Otherwise the full chunks are followed by one chunk holding exactly the
/// trailing `len % chunk_size` bytes; a region shorter than one chunk yields a
/// single short chunk. An empty region yields nothing.
pub fn split(region: &[u8], chunk_size: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(ConfigError::ZeroChunkSize.into());
    }

    let chunks = region
        .par_chunks(chunk_size)
        .map(Chunk::copy_from)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(chunks)
}

/// Number of chunks needed to hold `len` bytes.
#[inline(always)]
pub fn chunk_count(len: u64, chunk_size: usize) -> u64 {
    let chunk_size = chunk_size as u64;
    len / chunk_size + (len % chunk_size != 0) as u64
}

/// Raw size of the final chunk when it is shorter than `chunk_size`, else 0.
#[inline(always)]
pub fn trailing_len(len: u64, chunk_size: usize) -> u64 {
    len % chunk_size as u64
}
