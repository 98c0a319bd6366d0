//! Writer configuration

use crate::error::{AviError, Result};
use crate::types::codec;
use std::str::FromStr;

/// Largest segment the writer will produce by default (2 GiB - 256 MiB)
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = (2 << 30) - (256 << 20);

/// Smallest accepted segment size
pub const MIN_SEGMENT_SIZE: u64 = 4096;

/// Largest accepted segment size; keeps every RIFF size field within 32 bits
pub const MAX_SEGMENT_SIZE: u64 = (1 << 31) - 1;

/// Frame compression mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Compression {
    /// Raw 24-bit BGR rows, padded to 4 bytes
    #[default]
    None,
    /// Run-length encoded 24-bit BGR
    Rle,
}

impl Compression {
    /// Value of the BITMAPINFOHEADER compression field
    pub fn bitmap_compression(self) -> u32 {
        match self {
            Compression::None => codec::BI_RGB,
            Compression::Rle => codec::BI_RLE8,
        }
    }

    /// Stream handler FourCC for the strh chunk
    pub fn handler(self) -> [u8; 4] {
        match self {
            Compression::None => codec::DIB,
            Compression::Rle => codec::MRLE,
        }
    }

    /// Map a BITMAPINFOHEADER compression value back to a mode.
    ///
    /// Some writers store the `mrle` FourCC instead of `BI_RLE8`.
    pub fn from_bitmap_compression(value: u32) -> Option<Self> {
        match value {
            codec::BI_RGB => Some(Compression::None),
            codec::BI_RLE8 => Some(Compression::Rle),
            v if v.to_le_bytes() == codec::MRLE => Some(Compression::Rle),
            _ => None,
        }
    }
}

impl FromStr for Compression {
    type Err = AviError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "raw" => Ok(Compression::None),
            "rle" => Ok(Compression::Rle),
            other => Err(AviError::InvalidParameter(format!(
                "unknown compression mode '{}'",
                other
            ))),
        }
    }
}

/// Reference point for idx1 chunk offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum IndexOrigin {
    /// First byte after the `movi` FourCC; the first frame has offset 0
    #[default]
    MoviData,
    /// The `movi` FourCC itself; the first frame has offset 4
    MoviList,
}

impl IndexOrigin {
    /// Distance from the origin to the first byte of movi data
    pub fn bias(self) -> u32 {
        match self {
            IndexOrigin::MoviData => 0,
            IndexOrigin::MoviList => 4,
        }
    }
}

/// Writer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WriterConfig {
    /// Frame compression
    pub compression: Compression,
    /// Reference point for index offsets
    pub index_origin: IndexOrigin,
    /// Size at which a new AVIX segment is started
    pub max_segment_size: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            compression: Compression::None,
            index_origin: IndexOrigin::MoviData,
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
        }
    }
}

impl WriterConfig {
    /// Set compression mode
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set index offset origin
    pub fn with_index_origin(mut self, index_origin: IndexOrigin) -> Self {
        self.index_origin = index_origin;
        self
    }

    /// Set the segment split threshold
    pub fn with_max_segment_size(mut self, max_segment_size: u64) -> Self {
        self.max_segment_size = max_segment_size;
        self
    }

    /// Check that the configuration can produce a valid file
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SEGMENT_SIZE..=MAX_SEGMENT_SIZE).contains(&self.max_segment_size) {
            return Err(AviError::InvalidParameter(format!(
                "max_segment_size {} outside {}..={}",
                self.max_segment_size, MIN_SEGMENT_SIZE, MAX_SEGMENT_SIZE
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WriterConfig::default();
        assert_eq!(config.compression, Compression::None);
        assert_eq!(config.index_origin, IndexOrigin::MoviData);
        assert_eq!(config.max_segment_size, 1792 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_compression_from_str() {
        assert_eq!("rle".parse::<Compression>().unwrap(), Compression::Rle);
        assert_eq!("RAW".parse::<Compression>().unwrap(), Compression::None);
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert!(matches!(
            "h264".parse::<Compression>(),
            Err(AviError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_compression_tags() {
        assert_eq!(Compression::None.bitmap_compression(), 0);
        assert_eq!(Compression::Rle.bitmap_compression(), 1);
        assert_eq!(
            Compression::from_bitmap_compression(1),
            Some(Compression::Rle)
        );
        assert_eq!(
            Compression::from_bitmap_compression(u32::from_le_bytes(*b"mrle")),
            Some(Compression::Rle)
        );
        // BI_JPEG in a Windows bitmap header
        assert_eq!(Compression::from_bitmap_compression(4), None);
        assert_eq!(Compression::from_bitmap_compression(2), None);
    }

    #[test]
    fn test_segment_size_bounds() {
        let config = WriterConfig::default().with_max_segment_size(100);
        assert!(config.validate().is_err());

        let config = WriterConfig::default().with_max_segment_size(u32::MAX as u64);
        assert!(config.validate().is_err());

        let config = WriterConfig::default().with_max_segment_size(MIN_SEGMENT_SIZE);
        assert!(config.validate().is_ok());
    }
}
