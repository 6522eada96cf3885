//! Raw-binary image loading for `load=` directives.
//!
//! Files are byte streams splatted at the region's base (offset 0 of
//! the region); no container format is interpreted.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use retro80_core::lock;

use crate::registry::MemUnit;

/// Image loading failure.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("cannot read image {path}: {source}")]
    Io {
        /// Path from the configuration.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The image does not fit the region.
    #[error("image {path} is {image} bytes but region {region} holds {size}")]
    TooLarge {
        /// Path from the configuration.
        path: PathBuf,
        /// Image length in bytes.
        image: usize,
        /// Region instance name.
        region: String,
        /// Region capacity in cells.
        size: usize,
    },
    /// Raw-byte images only make sense for 8-bit cell regions.
    #[error("image {path} targets a non-byte region {region}")]
    UnsupportedWidth {
        /// Path from the configuration.
        path: PathBuf,
        /// Region instance name.
        region: String,
    },
}

/// Reads `path` and deposits its bytes into the region starting at
/// offset 0. Works on ROMs too — this is the loader, not the bus.
///
/// Returns the number of bytes loaded.
///
/// # Errors
///
/// See [`LoadError`].
pub fn load_image(path: &Path, region: &MemUnit) -> Result<usize, LoadError> {
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let MemUnit::U8(handle) = region else {
        return Err(LoadError::UnsupportedWidth {
            path: path.to_path_buf(),
            region: region.name(),
        });
    };

    let mut mem = lock(handle);
    if bytes.len() > mem.size() {
        return Err(LoadError::TooLarge {
            path: path.to_path_buf(),
            image: bytes.len(),
            region: mem.name().to_string(),
            size: mem.size(),
        });
    }
    for (offset, byte) in bytes.iter().enumerate() {
        // In-bounds by the length check; deposit cannot fail here.
        let _ = mem.deposit(*byte, offset);
    }
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use retro80_core::{lock, Memory};
    use tempfile::NamedTempFile;

    use super::{load_image, LoadError};
    use crate::registry::MemUnit;

    fn image(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(bytes).expect("write image");
        file
    }

    #[test]
    fn image_lands_at_region_offset_zero() {
        let file = image(&[0x3E, 0x42, 0x76]);
        let region = MemUnit::U8(Memory::rom(0x0800, 0xF800).into_handle());

        let loaded = load_image(file.path(), &region).expect("image fits");
        assert_eq!(loaded, 3);

        let MemUnit::U8(handle) = &region else {
            unreachable!()
        };
        let mem = lock(handle);
        assert_eq!(mem.read(0), Some(0x3E));
        assert_eq!(mem.read(1), Some(0x42));
        assert_eq!(mem.read(2), Some(0x76));
    }

    #[test]
    fn oversized_image_is_rejected() {
        let file = image(&[0u8; 32]);
        let region = MemUnit::U8(Memory::ram(16, 0).into_handle());
        assert!(matches!(
            load_image(file.path(), &region),
            Err(LoadError::TooLarge { image: 32, size: 16, .. })
        ));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let region = MemUnit::U8(Memory::ram(16, 0).into_handle());
        assert!(matches!(
            load_image(std::path::Path::new("/nonexistent/image.bin"), &region),
            Err(LoadError::Io { .. })
        ));
    }
}
