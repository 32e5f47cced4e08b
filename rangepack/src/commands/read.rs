use std::io::Write;

use rangepack_format::{ChunkIndex, Decompressor, MmapSource, PageCache};

use crate::cli::ReadArgs;
use crate::error::{Error, Result};

pub fn run(args: ReadArgs) -> Result<()> {
    let config = args.layout.config(Some(&args.cache));
    let codec = super::codec(&args.layout, &config)?;
    let index_path = args
        .index
        .clone()
        .unwrap_or_else(|| super::default_index_path(&args.input));

    let index = ChunkIndex::load(&index_path, config.format).map_err(|source| Error::OpenIndex {
        path: index_path.clone(),
        source,
    })?;
    let source = MmapSource::open(&args.input).map_err(|source| Error::OpenFile {
        path: args.input.clone(),
        source,
    })?;
    let mut cache = PageCache::new(source, &config).map_err(|source| Error::Setup { source })?;
    let decompressor = Decompressor::new(config, codec).map_err(|source| Error::Setup { source })?;

    let bytes = decompressor
        .read_range(&index, &mut cache, args.offset, args.length)
        .map_err(|source| Error::ReadRange {
            path: args.input.clone(),
            offset: args.offset,
            length: args.length,
            source,
        })?;

    let stats = cache.stats();
    tracing::debug!(
        hits = stats.hits,
        misses = stats.misses,
        evictions = stats.evictions,
        "cache"
    );

    let written = match &args.output {
        Some(path) => std::fs::write(path, &bytes),
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(&bytes).and_then(|_| lock.flush())
        }
    };

    written.map_err(|source| Error::WriteOutput { source })
}
