//! Minimal AVI writer
//!
//! This crate writes video-only AVI files from a sequence of raster images.
//! Frames are stored either as raw 24-bit BGR or run-length encoded, one
//! `00dc` chunk per frame, followed by an `idx1` index.
//!
//! # Features
//!
//! - Incremental writing: each frame goes straight to the sink
//! - Raw DIB or lossless 24-bit RLE frames
//! - Automatic `AVIX` segments for very long recordings
//! - A reader for inspecting and decoding the files it writes
//!
//! # Example
//!
//! ```no_run
//! use easyavi::Compression;
//! use image::{Rgb, RgbImage};
//!
//! let mut avi = easyavi::open("example.avi", 640, 480, 30, Compression::None)?;
//! for i in 0..30u8 {
//!     avi.write(&RgbImage::from_pixel(640, 480, Rgb([i * 8, 0, 0])))?;
//! }
//! avi.close()?;
//! # Ok::<(), easyavi::AviError>(())
//! ```

mod chunks;
mod config;
mod error;
mod frame;
mod reader;
pub mod rle;
mod types;
mod writer;

pub use chunks::{chunk_ids, ChunkId, ChunkType, FourCC, IndexEntry, RiffChunk};
pub use config::{
    Compression, IndexOrigin, WriterConfig, DEFAULT_MAX_SEGMENT_SIZE, MAX_SEGMENT_SIZE,
    MIN_SEGMENT_SIZE,
};
pub use error::{AviError, Result};
pub use frame::FrameSource;
pub use reader::{AviReader, SegmentInfo, StreamInfo};
pub use types::{codec, AviFlags, AviHeader, Rect, StreamHeader, StreamType, VideoFormat};
pub use writer::AviWriter;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Open an AVI file for writing.
///
/// Writes the provisional header immediately; frames follow through
/// [`AviWriter::write`] and the file becomes playable after
/// [`AviWriter::close`].
pub fn open<P: AsRef<Path>>(
    path: P,
    width: u32,
    height: u32,
    fps: u32,
    compression: Compression,
) -> Result<AviWriter<BufWriter<File>>> {
    AviWriter::create(
        path,
        width,
        height,
        fps,
        WriterConfig::default().with_compression(compression),
    )
}
