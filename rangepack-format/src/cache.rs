//! Paged access to the compressed data file.
//!
//! The cache holds a fixed number of pages, each an owned copy of an aligned
//! window of the file. A read that falls entirely inside a resident page is
//! served from memory. A miss fetches a new window into the next slot of the
//! ring, replacing whatever lived there regardless of how recently it was used.

use std::convert::TryFrom;
use std::ops::Range;

use crate::config::{Config, ConfigError};
use crate::error::{alloc_buffer, Error, FormatError, Result};
use crate::storage::RandomAccessSource;

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Default)]
struct Page {
    start: u64,
    data: Vec<u8>,
}

impl Page {
    #[inline(always)]
    fn end(&self) -> u64 {
        self.start + self.data.len() as u64
    }

    #[inline(always)]
    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline(always)]
    fn contains(&self, start: u64, end: u64) -> bool {
        !self.is_empty() && start >= self.start && end <= self.end()
    }
}

pub struct PageCache<S> {
    source: S,
    file_size: u64,
    pages: Vec<Page>,
    next_slot: usize,
    page_size: usize,
    alignment: u64,
    stats: CacheStats,
}

impl<S: RandomAccessSource> PageCache<S> {
    pub fn new(source: S, config: &Config) -> Result<PageCache<S>> {
        PageCache::with_capacity(
            source,
            config.page_count,
            config.page_size,
            config.page_alignment,
        )
    }

    pub fn with_capacity(
        source: S,
        page_count: usize,
        page_size: usize,
        alignment: u64,
    ) -> Result<PageCache<S>> {
        if page_count == 0 {
            return Err(ConfigError::ZeroPageCount.into());
        }
        if page_size == 0 {
            return Err(ConfigError::ZeroPageSize.into());
        }
        if alignment == 0 {
            return Err(ConfigError::ZeroAlignment.into());
        }

        let file_size = source.size();
        let pages = std::iter::repeat_with(Page::default)
            .take(page_count)
            .collect();

        Ok(PageCache {
            source,
            file_size,
            pages,
            next_slot: 0,
            page_size,
            alignment,
            stats: CacheStats::default(),
        })
    }

    /// Returns `size` bytes of the compressed file starting at `start`.
    ///
    /// The slice borrows the cache; it stays valid until the next call.
    pub fn read_range(&mut self, start: u64, size: usize) -> Result<&[u8]> {
        let end = match start.checked_add(size as u64) {
            Some(end) if end <= self.file_size => end,
            _ => {
                return Err(FormatError::DataOutOfBounds {
                    start,
                    end: start.saturating_add(size as u64),
                    file_size: self.file_size,
                }
                .into())
            }
        };

        if size == 0 {
            return Ok(&[]);
        }

        let slot = match self.pages.iter().position(|page| page.contains(start, end)) {
            Some(slot) => {
                self.stats.hits += 1;
                tracing::trace!(
                    slot,
                    start = format_args!("{:#x}", start),
                    size,
                    "page cache hit"
                );
                slot
            }
            None => self.install(start, end)?,
        };

        let page = &self.pages[slot];
        let offset = (start - page.start) as usize;
        Ok(&page.data[offset..offset + size])
    }

    fn install(&mut self, start: u64, end: u64) -> Result<usize> {
        let aligned = start - start % self.alignment;
        let wanted = (self.page_size as u64).max(end - aligned);
        let view = wanted.min(self.file_size - aligned);
        let view = usize::try_from(view).map_err(|_| FormatError::DataOutOfBounds {
            start,
            end,
            file_size: self.file_size,
        })?;

        let mut data = alloc_buffer(view)?;
        {
            let mapped = self
                .source
                .map_range(aligned, view)
                .map_err(|e| Error::io("mapping compressed data", e))?;
            data.extend_from_slice(&mapped);
        }

        let slot = self.next_slot;
        let evicted = !self.pages[slot].is_empty();
        if evicted {
            self.stats.evictions += 1;
        }
        self.stats.misses += 1;

        tracing::trace!(
            slot,
            start = format_args!("{:#x}", aligned),
            end = format_args!("{:#x}", aligned + view as u64),
            evicted,
            "page cache miss"
        );

        self.pages[slot] = Page {
            start: aligned,
            data,
        };
        self.next_slot = (slot + 1) % self.pages.len();

        Ok(slot)
    }
}

impl<S> PageCache<S> {
    #[inline(always)]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Resident byte range of every slot, in slot order.
    pub fn resident(&self) -> Vec<Option<Range<u64>>> {
        self.pages
            .iter()
            .map(|page| {
                if page.is_empty() {
                    None
                } else {
                    Some(page.start..page.end())
                }
            })
            .collect()
    }

    /// Slot the next miss will overwrite.
    #[inline(always)]
    pub fn next_slot(&self) -> usize {
        self.next_slot
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.pages.len()
    }

    #[inline(always)]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    #[inline(always)]
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

impl<S> std::fmt::Debug for PageCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("file_size", &self.file_size)
            .field("resident", &self.resident())
            .field("next_slot", &self.next_slot)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySource;
    use crate::ErrorKind;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn miss_miss_hit_then_evict_first_slot() {
        let data = pattern(5000);
        let mut cache = PageCache::with_capacity(MemorySource::new(data.clone()), 2, 1000, 1000).unwrap();

        assert_eq!(cache.read_range(0, 100).unwrap(), &data[0..100]);
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 1, evictions: 0 });

        assert_eq!(cache.read_range(1000, 100).unwrap(), &data[1000..1100]);
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 2, evictions: 0 });

        assert_eq!(cache.read_range(0, 100).unwrap(), &data[0..100]);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 2, evictions: 0 });

        assert_eq!(cache.read_range(2000, 100).unwrap(), &data[2000..2100]);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 3, evictions: 1 });
        assert_eq!(cache.resident(), vec![Some(2000..3000), Some(1000..2000)]);
        assert_eq!(cache.next_slot(), 1);
    }

    #[test]
    fn eviction_ignores_recency() {
        let capacity = 3;
        let data = pattern(10_000);
        let mut cache = PageCache::with_capacity(MemorySource::new(data), capacity, 1000, 1000).unwrap();

        for i in 0..capacity as u64 {
            cache.read_range(i * 1000, 10).unwrap();
        }
        // Touch slot 0 last; it is still the one replaced.
        cache.read_range(5, 10).unwrap();
        assert_eq!(cache.next_slot(), 0);

        cache.read_range(capacity as u64 * 1000, 10).unwrap();
        assert_eq!(cache.resident()[0], Some(3000..4000));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn hits_do_not_touch_the_source() {
        let data = pattern(4096);
        let mut cache = PageCache::with_capacity(MemorySource::new(data), 2, 1024, 512).unwrap();

        cache.read_range(600, 100).unwrap();
        assert_eq!(cache.source().reads(), 1);
        assert_eq!(cache.resident()[0], Some(512..1536));

        cache.read_range(512, 1024).unwrap();
        cache.read_range(1000, 1).unwrap();
        assert_eq!(cache.source().reads(), 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn pages_are_clamped_at_end_of_file() {
        let data = pattern(2500);
        let mut cache = PageCache::with_capacity(MemorySource::new(data.clone()), 2, 1000, 1000).unwrap();

        assert_eq!(cache.read_range(2400, 100).unwrap(), &data[2400..]);
        assert_eq!(cache.resident()[0], Some(2000..2500));
    }

    #[test]
    fn oversized_requests_extend_the_page() {
        let data = pattern(10_000);
        let mut cache = PageCache::with_capacity(MemorySource::new(data.clone()), 2, 1000, 1000).unwrap();

        assert_eq!(cache.read_range(1500, 3000).unwrap(), &data[1500..4500]);
        assert_eq!(cache.resident()[0], Some(1000..4500));
        assert_eq!(cache.read_range(4000, 500).unwrap(), &data[4000..4500]);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn reads_past_end_are_rejected() {
        let mut cache = PageCache::with_capacity(MemorySource::new(pattern(100)), 2, 64, 64).unwrap();

        let err = cache.read_range(90, 20).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(cache.read_range(100, 0).unwrap().is_empty());
        assert_eq!(cache.source().reads(), 0);
    }

    #[test]
    fn zero_capacity_is_a_config_error() {
        let err = PageCache::with_capacity(MemorySource::new(vec![]), 0, 64, 64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
