//! AVI header structures

/// AVI main header (avih chunk)
#[derive(Debug, Clone)]
pub struct AviHeader {
    /// Microseconds per frame
    pub microseconds_per_frame: u32,
    /// Maximum bytes per second
    pub max_bytes_per_sec: u32,
    /// Padding granularity
    pub padding_granularity: u32,
    /// AVI flags
    pub flags: AviFlags,
    /// Total number of frames
    pub total_frames: u32,
    /// Initial frames (for interleaved files)
    pub initial_frames: u32,
    /// Number of streams
    pub streams: u32,
    /// Suggested buffer size
    pub suggested_buffer_size: u32,
    /// Video width
    pub width: u32,
    /// Video height
    pub height: u32,
}

impl AviHeader {
    /// Size of the avih payload
    pub const SIZE: usize = 56;

    /// Byte offset of `total_frames` within the payload
    pub const TOTAL_FRAMES_OFFSET: u64 = 16;

    /// Byte offset of `suggested_buffer_size` within the payload
    pub const SUGGESTED_BUFFER_OFFSET: u64 = 28;

    /// Calculate frame rate in fps
    pub fn frame_rate(&self) -> f64 {
        if self.microseconds_per_frame > 0 {
            1_000_000.0 / self.microseconds_per_frame as f64
        } else {
            0.0
        }
    }
}

/// avih flags word
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AviFlags(pub u32);

impl AviFlags {
    /// An idx1 chunk follows movi
    pub const HAS_INDEX: AviFlags = AviFlags(0x10);

    /// Whether the file declares an idx1 chunk
    pub fn has_index(self) -> bool {
        self.0 & Self::HAS_INDEX.0 != 0
    }
}

/// Stream header (strh chunk)
#[derive(Debug, Clone)]
pub struct StreamHeader {
    /// Stream type
    pub stream_type: StreamType,
    /// FourCC handler/codec
    pub handler: [u8; 4],
    /// Stream flags
    pub flags: u32,
    /// Priority
    pub priority: u16,
    /// Language
    pub language: u16,
    /// Initial frames
    pub initial_frames: u32,
    /// Time scale
    pub scale: u32,
    /// Rate (frames per second = rate/scale)
    pub rate: u32,
    /// Index of the first frame of this stream
    pub start: u32,
    /// Length in frames
    pub length: u32,
    /// Suggested buffer size
    pub suggested_buffer_size: u32,
    /// Quality (-1 for default)
    pub quality: u32,
    /// Sample size (0 for variable)
    pub sample_size: u32,
    /// Frame rectangle
    pub frame: Rect,
}

impl StreamHeader {
    /// Size of the strh payload
    pub const SIZE: usize = 56;

    /// Byte offset of `length` within the payload
    pub const LENGTH_OFFSET: u64 = 32;

    /// Byte offset of `suggested_buffer_size` within the payload
    pub const SUGGESTED_BUFFER_OFFSET: u64 = 36;

    /// Frame rate of the stream
    pub fn frame_rate(&self) -> f64 {
        if self.scale > 0 {
            self.rate as f64 / self.scale as f64
        } else {
            0.0
        }
    }
}

/// Stream type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Video,
    Unknown([u8; 4]),
}

impl StreamType {
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Self {
        match fourcc {
            b"vids" => StreamType::Video,
            _ => StreamType::Unknown(*fourcc),
        }
    }

    pub fn to_fourcc(self) -> [u8; 4] {
        match self {
            StreamType::Video => *b"vids",
            StreamType::Unknown(fourcc) => fourcc,
        }
    }
}

/// Frame rectangle, stored as unsigned 16-bit edges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: u16,
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
}

/// Video format (BITMAPINFOHEADER)
#[derive(Debug, Clone)]
pub struct VideoFormat {
    /// Structure size
    pub size: u32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels (positive for bottom-up)
    pub height: i32,
    /// Number of planes (always 1)
    pub planes: u16,
    /// Bits per pixel
    pub bit_count: u16,
    /// Compression tag
    pub compression: u32,
    /// Image size in bytes (0 when compressed)
    pub image_size: u32,
    /// Horizontal resolution
    pub x_pels_per_meter: i32,
    /// Vertical resolution
    pub y_pels_per_meter: i32,
    /// Colors used
    pub colors_used: u32,
    /// Important colors
    pub colors_important: u32,
}

impl VideoFormat {
    /// Size of a BITMAPINFOHEADER
    pub const SIZE: u32 = 40;

    /// Get absolute height
    pub fn abs_height(&self) -> u32 {
        self.height.unsigned_abs()
    }

    /// Check if rows are stored top-down
    pub fn is_top_down(&self) -> bool {
        self.height < 0
    }
}

/// Bitmap compression tags and stream handlers
pub mod codec {
    /// Uncompressed RGB
    pub const BI_RGB: u32 = 0;
    /// Run-length encoding. With 24 bits per pixel every run value is a
    /// BGR triple; this is how the Microsoft RLE decoder (`mrle`) reads it.
    pub const BI_RLE8: u32 = 1;

    /// Handler for uncompressed frames
    pub const DIB: [u8; 4] = *b"DIB ";
    /// Handler for run-length encoded frames
    pub const MRLE: [u8; 4] = *b"mrle";
}
