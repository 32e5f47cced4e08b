//! Tunables shared by the compression and decompression pipelines.

use std::fmt;

pub mod defaults {
    /// Nominal raw size of a chunk: 64 KiB.
    pub const CHUNK_SIZE: usize = 64 * 1024;
    /// Chunks per map window, and per decompression batch.
    pub const CHUNKS_PER_WINDOW: usize = 1024;
    /// Maximum zlib compression.
    pub const LEVEL: u32 = 9;
    pub const PAGE_COUNT: usize = 5;
    /// Size of one cache page: 640 KiB.
    pub const PAGE_SIZE: usize = 640 * 1024;
    /// Every cache page starts on this boundary.
    pub const PAGE_ALIGNMENT: u64 = 64 * 1024;
}

/// Layout of the data file and its chunk index.
#[derive(Clone, Copy, Eq, PartialEq)]
pub enum ContainerFormat {
    /// Plain concatenation of compressed chunks; index holds the original size and offsets.
    Baseline,
    /// Each chunk carries a 4-byte length prefix and the index ends with the
    /// raw size of a short final chunk. Not interchangeable with `Baseline`.
    Framed,
}

impl Default for ContainerFormat {
    fn default() -> Self {
        ContainerFormat::Baseline
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerFormat::Baseline => write!(f, "baseline"),
            ContainerFormat::Framed => write!(f, "framed"),
        }
    }
}

impl fmt::Debug for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    pub chunk_size: usize,
    pub chunks_per_window: usize,
    pub level: u32,
    pub page_count: usize,
    pub page_size: usize,
    pub page_alignment: u64,
    /// Worker pool size. Zero picks the available parallelism.
    pub threads: usize,
    pub format: ContainerFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            chunk_size: defaults::CHUNK_SIZE,
            chunks_per_window: defaults::CHUNKS_PER_WINDOW,
            level: defaults::LEVEL,
            page_count: defaults::PAGE_COUNT,
            page_size: defaults::PAGE_SIZE,
            page_alignment: defaults::PAGE_ALIGNMENT,
            threads: 0,
            format: ContainerFormat::Baseline,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Chunk size must not be zero")]
    ZeroChunkSize,

    #[error("A map window must hold at least one chunk")]
    ZeroWindow,

    #[error("Page cache needs at least one page")]
    ZeroPageCount,

    #[error("Page size must not be zero")]
    ZeroPageSize,

    #[error("Page alignment must not be zero")]
    ZeroAlignment,

    #[error("Chunk size {0} does not fit a 4-byte length")]
    ChunkTooLarge(usize),

    #[error("Map window of {chunks} chunks of {chunk_size} bytes is too large")]
    WindowTooLarge { chunks: usize, chunk_size: usize },
}

impl Config {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_chunks_per_window(mut self, chunks: usize) -> Self {
        self.chunks_per_window = chunks;
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_page_count(mut self, page_count: usize) -> Self {
        self.page_count = page_count;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_page_alignment(mut self, alignment: u64) -> Self {
        self.page_alignment = alignment;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_format(mut self, format: ContainerFormat) -> Self {
        self.format = format;
        self
    }

    /// Bytes covered by one map window.
    #[inline(always)]
    pub fn map_window_size(&self) -> u64 {
        self.chunk_size as u64 * self.chunks_per_window as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.chunks_per_window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.page_count == 0 {
            return Err(ConfigError::ZeroPageCount);
        }
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.page_alignment == 0 {
            return Err(ConfigError::ZeroAlignment);
        }
        if self.chunk_size as u64 > u32::MAX as u64 {
            return Err(ConfigError::ChunkTooLarge(self.chunk_size));
        }
        if self.chunk_size.checked_mul(self.chunks_per_window).is_none() {
            return Err(ConfigError::WindowTooLarge {
                chunks: self.chunks_per_window,
                chunk_size: self.chunk_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_constants() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 65536);
        assert_eq!(config.map_window_size(), 65536 * 1024);
        assert_eq!(config.level, 9);
        assert_eq!(config.page_count, 5);
        assert_eq!(config.page_size, 640 * 1024);
        assert_eq!(config.page_alignment, 65536);
        assert_eq!(config.format, ContainerFormat::Baseline);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_values() {
        let base = Config::default();
        assert_eq!(
            base.clone().with_chunk_size(0).validate(),
            Err(ConfigError::ZeroChunkSize)
        );
        assert_eq!(
            base.clone().with_chunks_per_window(0).validate(),
            Err(ConfigError::ZeroWindow)
        );
        assert_eq!(
            base.clone().with_page_count(0).validate(),
            Err(ConfigError::ZeroPageCount)
        );
        assert_eq!(
            base.clone().with_page_size(0).validate(),
            Err(ConfigError::ZeroPageSize)
        );
        assert_eq!(
            base.with_page_alignment(0).validate(),
            Err(ConfigError::ZeroAlignment)
        );
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn rejects_chunks_larger_than_frame_prefix() {
        let config = Config::default().with_chunk_size(u32::MAX as usize + 1);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ChunkTooLarge(u32::MAX as usize + 1))
        );
    }
}
