use humansize::{file_size_opts as options, FileSize};
use rangepack_format::Compressor;

use crate::cli::CompressArgs;
use crate::error::{Error, Result};

pub fn run(args: CompressArgs) -> Result<()> {
    let config = args.layout.config(None);
    let codec = super::codec(&args.layout, &config)?;
    let index_path = args
        .index
        .clone()
        .unwrap_or_else(|| super::default_index_path(&args.output));

    let compressor = Compressor::new(config, codec).map_err(|source| Error::Setup { source })?;
    let index = compressor
        .compress_file(&args.input, &args.output, &index_path)
        .map_err(|source| Error::Compress {
            path: args.input.clone(),
            source,
        })?;

    let original = index.original_size();
    let compressed = index.compressed_size();
    tracing::info!(
        index = %index_path.display(),
        chunks = index.chunk_count(),
        "wrote chunk index"
    );

    println!(
        "{} -> {} ({} chunks, {:.1}%)",
        original
            .file_size(options::BINARY)
            .unwrap_or_else(|_| format!("{} B", original)),
        compressed
            .file_size(options::BINARY)
            .unwrap_or_else(|_| format!("{} B", compressed)),
        index.chunk_count(),
        if original == 0 {
            100.0
        } else {
            compressed as f64 / original as f64 * 100.0
        }
    );

    Ok(())
}
