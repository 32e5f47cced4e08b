use humansize::{file_size_opts as options, FileSize};
use rangepack_format::{ChunkIndex, ContainerFormat};

use crate::cli::InfoArgs;
use crate::error::{Error, Result};

#[inline(always)]
fn size(bytes: u64) -> String {
    bytes
        .file_size(options::BINARY)
        .unwrap_or_else(|_| format!("{} B", bytes))
}

pub fn run(args: InfoArgs) -> Result<()> {
    let format = if args.framed {
        ContainerFormat::Framed
    } else {
        ContainerFormat::Baseline
    };

    let index = ChunkIndex::load(&args.index, format).map_err(|source| Error::OpenIndex {
        path: args.index.clone(),
        source,
    })?;

    if let Some(chunk_size) = args.chunk_size {
        index
            .validate(chunk_size)
            .map_err(|source| Error::IndexMismatch {
                path: args.index.clone(),
                chunk_size,
                source,
            })?;
    }

    let offsets = index.offsets();
    let largest = offsets.windows(2).map(|w| w[1] - w[0]).max().unwrap_or(0);

    if args.json {
        let value = serde_json::json!({
            "format": format.to_string(),
            "original_size": index.original_size(),
            "compressed_size": index.compressed_size(),
            "chunks": index.chunk_count(),
            "largest_chunk": largest,
            "last_chunk_size": index.last_chunk_size(),
        });
        println!("{}", value);
        return Ok(());
    }

    println!("Format:           {}", format);
    println!("Original size:    {}", size(index.original_size()));
    println!("Compressed size:  {}", size(index.compressed_size()));
    println!("Chunks:           {}", index.chunk_count());
    println!("Largest chunk:    {}", size(largest));
    if let Some(last) = index.last_chunk_size() {
        println!("Last chunk size:  {}", size(last));
    }

    Ok(())
}
