use std::path::PathBuf;

use rangepack_format::{defaults, Config, ContainerFormat};
use structopt::clap::AppSettings::*;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "rangepack",
    about = "Compress large files into chunked containers and decompress any byte range.",
    settings = &[SubcommandRequiredElseHelp, DisableHelpSubcommand, VersionlessSubcommands],
)]
pub struct CliOpts {
    #[structopt(short, long, help = "Show debug output", global = true)]
    pub verbose: bool,

    #[structopt(subcommand)]
    pub cmd: Commands,
}

#[derive(Debug, StructOpt)]
pub enum Commands {
    #[structopt(name = "c", visible_alias = "compress", about = "Compress a file")]
    Compress(CompressArgs),

    #[structopt(name = "x", visible_alias = "decompress", about = "Restore a compressed file")]
    Decompress(DecompressArgs),

    #[structopt(name = "r", visible_alias = "read", about = "Decompress one byte range")]
    Read(ReadArgs),

    #[structopt(name = "i", visible_alias = "info", about = "Show chunk index statistics")]
    Info(InfoArgs),
}

/// Options shared by every command that touches compressed data.
#[derive(Debug, StructOpt)]
pub struct LayoutArgs {
    #[structopt(long, default_value = "65536", help = "Raw bytes per chunk")]
    pub chunk_size: usize,

    #[structopt(long = "window", default_value = "1024", help = "Chunks per map window and decompression batch")]
    pub chunks_per_window: usize,

    #[structopt(long, help = "Use the framed container format")]
    pub framed: bool,

    #[structopt(
        short = "j",
        long,
        default_value = "0",
        help = "Worker threads [0: available parallelism]"
    )]
    pub threads: usize,

    #[structopt(
        short = "C",
        long,
        default_value = "zlib",
        help = "Chunk codec (zlib, stored, deflate, zstd, xz, snappy, brotli, offload[:<codec>])"
    )]
    pub codec: String,

    #[structopt(short, long, default_value = "9", help = "Compression level")]
    pub level: u32,
}

#[derive(Debug, StructOpt)]
pub struct CacheArgs {
    #[structopt(long, default_value = "5", help = "Pages held by the compressed file cache")]
    pub page_count: usize,

    #[structopt(long, default_value = "655360", help = "Bytes fetched per cache page")]
    pub page_size: usize,

    #[structopt(long, default_value = "65536", help = "Alignment of cache page starts")]
    pub page_alignment: u64,
}

impl LayoutArgs {
    #[inline(always)]
    pub fn format(&self) -> ContainerFormat {
        if self.framed {
            ContainerFormat::Framed
        } else {
            ContainerFormat::Baseline
        }
    }

    pub fn config(&self, cache: Option<&CacheArgs>) -> Config {
        let config = Config::default()
            .with_chunk_size(self.chunk_size)
            .with_chunks_per_window(self.chunks_per_window)
            .with_level(self.level)
            .with_threads(self.threads)
            .with_format(self.format());

        match cache {
            Some(cache) => config
                .with_page_count(cache.page_count)
                .with_page_size(cache.page_size)
                .with_page_alignment(cache.page_alignment),
            None => config
                .with_page_count(defaults::PAGE_COUNT)
                .with_page_size(defaults::PAGE_SIZE)
                .with_page_alignment(defaults::PAGE_ALIGNMENT),
        }
    }
}

#[derive(Debug, StructOpt)]
pub struct CompressArgs {
    #[structopt(parse(from_os_str), help = "File to compress")]
    pub input: PathBuf,

    #[structopt(parse(from_os_str), help = "Compressed data file to create")]
    pub output: PathBuf,

    #[structopt(
        long,
        parse(from_os_str),
        help = "Chunk index to create [default: <output>.fat]"
    )]
    pub index: Option<PathBuf>,

    #[structopt(flatten)]
    pub layout: LayoutArgs,
}

#[derive(Debug, StructOpt)]
pub struct DecompressArgs {
    #[structopt(parse(from_os_str), help = "Compressed data file")]
    pub input: PathBuf,

    #[structopt(parse(from_os_str), help = "Restored file to create")]
    pub output: PathBuf,

    #[structopt(long, parse(from_os_str), help = "Chunk index [default: <input>.fat]")]
    pub index: Option<PathBuf>,

    #[structopt(flatten)]
    pub layout: LayoutArgs,

    #[structopt(flatten)]
    pub cache: CacheArgs,
}

#[derive(Debug, StructOpt)]
pub struct ReadArgs {
    #[structopt(parse(from_os_str), help = "Compressed data file")]
    pub input: PathBuf,

    #[structopt(help = "Offset into the original file")]
    pub offset: u64,

    #[structopt(help = "Number of bytes to read")]
    pub length: usize,

    #[structopt(long, parse(from_os_str), help = "Chunk index [default: <input>.fat]")]
    pub index: Option<PathBuf>,

    #[structopt(
        short,
        long = "out",
        parse(from_os_str),
        help = "Write the bytes to a file instead of stdout"
    )]
    pub output: Option<PathBuf>,

    #[structopt(flatten)]
    pub layout: LayoutArgs,

    #[structopt(flatten)]
    pub cache: CacheArgs,
}

#[derive(Debug, StructOpt)]
pub struct InfoArgs {
    #[structopt(parse(from_os_str), help = "Chunk index file")]
    pub index: PathBuf,

    #[structopt(long, help = "Read the framed container format")]
    pub framed: bool,

    #[structopt(long, help = "Check the index against this chunk size")]
    pub chunk_size: Option<usize>,

    #[structopt(long, help = "Print JSON instead of text")]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_defaults_match_library() {
        let opts = CliOpts::from_iter(&["rangepack", "c", "in.bin", "out.bin"]);
        match opts.cmd {
            Commands::Compress(args) => {
                assert_eq!(args.layout.config(None), Config::default());
                assert_eq!(args.index, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn decompress_cache_options() {
        let opts = CliOpts::from_iter(&[
            "rangepack",
            "decompress",
            "--framed",
            "--page-count",
            "2",
            "--page-size",
            "4096",
            "in.z",
            "out.bin",
        ]);
        match opts.cmd {
            Commands::Decompress(args) => {
                let config = args.layout.config(Some(&args.cache));
                assert_eq!(config.format, ContainerFormat::Framed);
                assert_eq!(config.page_count, 2);
                assert_eq!(config.page_size, 4096);
                assert_eq!(config.page_alignment, defaults::PAGE_ALIGNMENT);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
