//! RIFF chunk reading and writing

use crate::error::{AviError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

/// FourCC (Four Character Code) identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create from bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        FourCC(bytes)
    }

    /// Get as string
    pub fn as_str(&self) -> String {
        String::from_utf8_lossy(&self.0).to_string()
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl std::fmt::Debug for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FourCC(\"{}\")", self.as_str())
    }
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(bytes: [u8; 4]) -> Self {
        FourCC(bytes)
    }
}

/// Well-known chunk IDs
pub mod chunk_ids {
    use super::FourCC;

    pub const RIFF: FourCC = FourCC(*b"RIFF");
    pub const AVI: FourCC = FourCC(*b"AVI ");
    pub const AVIX: FourCC = FourCC(*b"AVIX");
    pub const LIST: FourCC = FourCC(*b"LIST");
    pub const HDRL: FourCC = FourCC(*b"hdrl");
    pub const AVIH: FourCC = FourCC(*b"avih");
    pub const STRL: FourCC = FourCC(*b"strl");
    pub const STRH: FourCC = FourCC(*b"strh");
    pub const STRF: FourCC = FourCC(*b"strf");
    pub const MOVI: FourCC = FourCC(*b"movi");
    pub const IDX1: FourCC = FourCC(*b"idx1");
    pub const JUNK: FourCC = FourCC(*b"JUNK");
}

/// Stream data chunk id: two-digit stream number and a two-letter type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkId {
    /// Raw FourCC
    pub fourcc: FourCC,
    /// Stream number, when the id starts with two digits
    pub stream_number: Option<u8>,
    /// Chunk type
    pub chunk_type: ChunkType,
}

impl ChunkId {
    /// Video frame chunk of `stream` (`00dc` for the first stream)
    pub const fn video(stream: u8) -> Self {
        ChunkId {
            fourcc: FourCC([b'0' + stream / 10 % 10, b'0' + stream % 10, b'd', b'c']),
            stream_number: Some(stream),
            chunk_type: ChunkType::Video,
        }
    }

    /// Classify an id read from a file
    pub fn parse(fourcc: FourCC) -> Self {
        let [hi, lo, c, d] = fourcc.0;
        let stream_number = (hi.is_ascii_digit() && lo.is_ascii_digit())
            .then(|| (hi - b'0') * 10 + (lo - b'0'));

        // dc and db both carry whole frames
        let chunk_type = match (stream_number, c.to_ascii_lowercase(), d.to_ascii_lowercase()) {
            (Some(_), b'd', b'c' | b'b') => ChunkType::Video,
            _ => ChunkType::Other,
        };

        ChunkId {
            fourcc,
            stream_number,
            chunk_type,
        }
    }

    /// Check if this is a video frame chunk
    pub fn is_video(&self) -> bool {
        self.chunk_type == ChunkType::Video
    }
}

/// Chunk type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    /// Video frame
    Video,
    /// Anything else
    Other,
}

/// Size of a chunk on disk: header, payload and pad byte
pub fn padded_size(data_len: usize) -> usize {
    8 + ((data_len + 1) & !1)
}

/// Read the id and declared size of the chunk starting at `offset`
pub fn read_chunk_header(data: &[u8], offset: usize) -> Result<(FourCC, u32)> {
    if offset + 8 > data.len() {
        return Err(AviError::InsufficientData {
            needed: 8,
            available: data.len().saturating_sub(offset),
        });
    }

    let mut cursor = Cursor::new(&data[offset..offset + 8]);
    let mut id_bytes = [0u8; 4];
    cursor.read_exact(&mut id_bytes)?;
    let size = cursor.read_u32::<LittleEndian>()?;

    Ok((FourCC(id_bytes), size))
}

/// Write one chunk: id, unpadded size, payload, pad byte if the payload is odd
pub fn write_chunk<W: Write>(writer: &mut W, id: FourCC, data: &[u8]) -> Result<()> {
    let size = u32::try_from(data.len()).map_err(|_| {
        AviError::InvalidParameter(format!("chunk '{}' of {} bytes exceeds 4 GiB", id, data.len()))
    })?;

    writer.write_all(id.as_bytes())?;
    writer.write_u32::<LittleEndian>(size)?;
    writer.write_all(data)?;

    // Pad to word boundary
    if data.len() % 2 != 0 {
        writer.write_all(&[0])?;
    }

    Ok(())
}

/// RIFF chunk
#[derive(Debug, Clone)]
pub struct RiffChunk {
    /// Chunk ID
    pub id: FourCC,
    /// Chunk size (not including header)
    pub size: u32,
    /// Chunk data
    pub data: Vec<u8>,
}

impl RiffChunk {
    /// Read chunk from data, returning it and the offset of the next chunk
    pub fn read(data: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (id, size) = read_chunk_header(data, offset)?;
        let padded = padded_size(size as usize);

        if offset + padded > data.len() {
            // A missing final pad byte is tolerated
            if offset + 8 + size as usize > data.len() {
                return Err(AviError::InsufficientData {
                    needed: size as usize,
                    available: data.len().saturating_sub(offset + 8),
                });
            }
        }

        let chunk_data = data[offset + 8..offset + 8 + size as usize].to_vec();

        Ok((
            RiffChunk {
                id,
                size,
                data: chunk_data,
            },
            (offset + padded).min(data.len()),
        ))
    }
}

/// LIST chunk (container for other chunks)
#[derive(Debug, Clone)]
pub struct ListChunk {
    /// List type
    pub list_type: FourCC,
    /// Child chunks
    pub chunks: Vec<RiffChunk>,
}

impl ListChunk {
    /// Parse LIST payload (list type followed by child chunks)
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(AviError::InsufficientData {
                needed: 4,
                available: data.len(),
            });
        }

        let mut list_type = [0u8; 4];
        list_type.copy_from_slice(&data[0..4]);

        let mut chunks = Vec::new();
        let mut offset = 4;

        while offset + 8 <= data.len() {
            match RiffChunk::read(data, offset) {
                Ok((chunk, next_offset)) => {
                    chunks.push(chunk);
                    offset = next_offset;
                }
                Err(_) => break,
            }
        }

        Ok(ListChunk {
            list_type: FourCC(list_type),
            chunks,
        })
    }

    /// Find chunk by ID
    pub fn find_chunk(&self, id: FourCC) -> Option<&RiffChunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    /// Find nested LIST chunks of the given type
    pub fn find_lists(&self, list_type: FourCC) -> Vec<ListChunk> {
        self.chunks
            .iter()
            .filter(|c| c.id == chunk_ids::LIST)
            .filter_map(|c| ListChunk::parse(&c.data).ok())
            .filter(|l| l.list_type == list_type)
            .collect()
    }
}

/// AVI index entry (idx1 format)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Chunk ID
    pub chunk_id: FourCC,
    /// Flags
    pub flags: u32,
    /// Offset from movi list
    pub offset: u32,
    /// Size of chunk data
    pub size: u32,
}

impl IndexEntry {
    /// Index flags
    pub const KEYFRAME: u32 = 0x10;

    /// Size of one idx1 record
    pub const SIZE: usize = 16;

    /// Read from data
    pub fn read(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(AviError::InsufficientData {
                needed: Self::SIZE,
                available: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let mut id_bytes = [0u8; 4];
        cursor.read_exact(&mut id_bytes)?;

        Ok(IndexEntry {
            chunk_id: FourCC(id_bytes),
            flags: cursor.read_u32::<LittleEndian>()?,
            offset: cursor.read_u32::<LittleEndian>()?,
            size: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// Write to writer
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self.chunk_id.as_bytes())?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.size)?;
        Ok(())
    }

    /// Check if this is a keyframe
    pub fn is_keyframe(&self) -> bool {
        (self.flags & Self::KEYFRAME) != 0
    }
}

/// Parse idx1 index
pub fn parse_index(data: &[u8]) -> Vec<IndexEntry> {
    data.chunks_exact(IndexEntry::SIZE)
        .filter_map(|record| IndexEntry::read(record).ok())
        .collect()
}
