use rangepack_format::Decompressor;

use crate::cli::DecompressArgs;
use crate::error::{Error, Result};

pub fn run(args: DecompressArgs) -> Result<()> {
    let config = args.layout.config(Some(&args.cache));
    let codec = super::codec(&args.layout, &config)?;
    let index_path = args
        .index
        .clone()
        .unwrap_or_else(|| super::default_index_path(&args.input));

    let decompressor = Decompressor::new(config, codec).map_err(|source| Error::Setup { source })?;
    let index = decompressor
        .decompress_file(&args.input, &index_path, &args.output)
        .map_err(|source| Error::Decompress {
            path: args.input.clone(),
            source,
        })?;

    tracing::info!(
        output = %args.output.display(),
        bytes = index.original_size(),
        "restored"
    );

    Ok(())
}
