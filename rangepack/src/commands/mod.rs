pub mod compress;
pub mod decompress;
pub mod info;
pub mod read;

pub use compress::run as compress;
pub use decompress::run as decompress;
pub use info::run as info;
pub use read::run as read;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use rangepack_format::{codec_by_name, Codec, Config};

use crate::cli::LayoutArgs;
use crate::error::{Error, Result};

/// `<data file>.fat`, next to the compressed data file.
pub(crate) fn default_index_path(data_file: &Path) -> PathBuf {
    let mut name = OsString::from(data_file.as_os_str());
    name.push(".fat");
    PathBuf::from(name)
}

pub(crate) fn codec(layout: &LayoutArgs, config: &Config) -> Result<Box<dyn Codec>> {
    codec_by_name(&layout.codec, config.level).map_err(|source| Error::Codec {
        name: layout.codec.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_sits_next_to_data_file() {
        assert_eq!(
            default_index_path(Path::new("/tmp/big.bin.z")),
            PathBuf::from("/tmp/big.bin.z.fat")
        );
        assert_eq!(default_index_path(Path::new("data")), PathBuf::from("data.fat"));
    }
}
