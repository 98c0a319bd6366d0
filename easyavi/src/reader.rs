//! AVI reader for files produced by [`AviWriter`](crate::AviWriter)
//!
//! Parses every RIFF segment, the video stream headers and the idx1 index,
//! and turns indexed frames back into top-down RGB images.

use crate::chunks::{chunk_ids, parse_index, read_chunk_header, ChunkId, FourCC, IndexEntry, ListChunk};
use crate::config::Compression;
use crate::error::{AviError, Result};
use crate::frame;
use crate::rle;
use crate::types::{AviFlags, AviHeader, Rect, StreamHeader, StreamType, VideoFormat};
use byteorder::{LittleEndian, ReadBytesExt};
use image::RgbImage;
use std::io::{Cursor, Read};

/// Video stream description (strh + strf)
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Stream header
    pub header: StreamHeader,
    /// Bitmap format
    pub video_format: VideoFormat,
}

impl StreamInfo {
    /// Compression mode, if it is one this crate writes
    pub fn compression(&self) -> Option<Compression> {
        Compression::from_bitmap_compression(self.video_format.compression)
    }
}

/// One RIFF segment of the file
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    /// Form type: `AVI ` or `AVIX`
    pub form: FourCC,
    /// File offset of the RIFF FourCC
    pub offset: usize,
    /// Declared RIFF size
    pub riff_size: u32,
    /// Main header of this segment
    pub header: AviHeader,
    /// Stream header of this segment
    pub stream_header: StreamHeader,
    /// File offset of the first byte after the movi FourCC
    pub movi_data_offset: usize,
    /// Declared movi LIST size (includes the FourCC)
    pub movi_size: u32,
    /// idx1 entries
    pub index: Vec<IndexEntry>,
    /// File offset idx1 offsets are measured from
    index_base: usize,
}

impl SegmentInfo {
    /// Bytes of frame chunks inside movi
    pub fn movi_data_size(&self) -> u32 {
        self.movi_size.saturating_sub(4)
    }
}

/// AVI reader
pub struct AviReader<'a> {
    data: &'a [u8],
    stream: StreamInfo,
    segments: Vec<SegmentInfo>,
}

impl<'a> AviReader<'a> {
    /// Parse a complete file
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let mut segments = Vec::new();
        let mut stream = None;
        let mut offset = 0;

        while offset + 8 <= data.len() {
            let (segment, info) = parse_segment(data, offset)?;
            if stream.is_none() {
                stream = Some(info);
            }
            offset = segment.offset + 8 + ((segment.riff_size as usize + 1) & !1);
            segments.push(segment);
        }

        if segments.is_empty() {
            return Err(AviError::InsufficientData {
                needed: 12,
                available: data.len(),
            });
        }
        let stream = stream.ok_or(AviError::MissingChunk("strl"))?;

        log::debug!(
            "Parsed AVI: {} segment(s), {} frames",
            segments.len(),
            segments.iter().map(|s| s.index.len()).sum::<usize>()
        );

        Ok(AviReader {
            data,
            stream,
            segments,
        })
    }

    /// Main header of the first segment
    pub fn header(&self) -> &AviHeader {
        &self.segments[0].header
    }

    /// Video stream of the first segment
    pub fn stream(&self) -> &StreamInfo {
        &self.stream
    }

    /// All RIFF segments in file order
    pub fn segments(&self) -> &[SegmentInfo] {
        &self.segments
    }

    /// Indexed frames across all segments
    pub fn frame_count(&self) -> usize {
        self.segments.iter().map(|s| s.index.len()).sum()
    }

    /// Locate frame `n`: its segment and index entry
    fn locate(&self, n: usize) -> Result<(&SegmentInfo, &IndexEntry)> {
        let mut remaining = n;
        for segment in &self.segments {
            if remaining < segment.index.len() {
                return Ok((segment, &segment.index[remaining]));
            }
            remaining -= segment.index.len();
        }
        Err(AviError::InvalidParameter(format!(
            "frame {} out of range ({} frames)",
            n,
            self.frame_count()
        )))
    }

    /// Payload of frame `n`, as declared by its chunk header
    pub fn frame_data(&self, n: usize) -> Result<&'a [u8]> {
        let (segment, entry) = self.locate(n)?;
        if !ChunkId::parse(entry.chunk_id).is_video() {
            return Err(AviError::InvalidChunk {
                id: entry.chunk_id.0,
                message: "index entry is not a video frame".into(),
            });
        }

        let position = segment.index_base + entry.offset as usize;
        let (id, size) = read_chunk_header(self.data, position)?;

        if id != entry.chunk_id || size != entry.size {
            return Err(AviError::InvalidChunk {
                id: entry.chunk_id.0,
                message: format!(
                    "index points at '{}' of {} bytes, expected {} bytes",
                    id, size, entry.size
                ),
            });
        }

        let start = position + 8;
        let end = start + size as usize;
        if end > self.data.len() {
            return Err(AviError::InsufficientData {
                needed: size as usize,
                available: self.data.len().saturating_sub(start),
            });
        }
        Ok(&self.data[start..end])
    }

    /// Packed BGR rows of frame `n` in stored (bottom-up) order
    pub fn frame_bgr(&self, n: usize) -> Result<Vec<u8>> {
        let format = &self.stream.video_format;
        let width = format.width.unsigned_abs();
        let height = format.abs_height();
        let payload = self.frame_data(n)?;

        match self.stream.compression() {
            Some(Compression::None) => frame::unpad(payload, width, height),
            Some(Compression::Rle) => rle::decode(payload, width as usize, height as usize),
            None => Err(AviError::InvalidChunk {
                id: *chunk_ids::STRF.as_bytes(),
                message: format!("unsupported compression {}", format.compression),
            }),
        }
    }

    /// Frame `n` as a top-down RGB image
    pub fn decode_frame(&self, n: usize) -> Result<RgbImage> {
        let format = &self.stream.video_format;
        let bgr = self.frame_bgr(n)?;
        frame::bgr_to_image(
            &bgr,
            format.width.unsigned_abs(),
            format.abs_height(),
            !format.is_top_down(),
        )
    }
}

/// Parse the RIFF segment at `offset`
fn parse_segment(data: &[u8], offset: usize) -> Result<(SegmentInfo, StreamInfo)> {
    let (riff, riff_size) = read_chunk_header(data, offset)?;
    if riff != chunk_ids::RIFF {
        return Err(AviError::InvalidRiff);
    }
    if offset + 12 > data.len() {
        return Err(AviError::InsufficientData {
            needed: 12,
            available: data.len() - offset,
        });
    }

    let form = FourCC([
        data[offset + 8],
        data[offset + 9],
        data[offset + 10],
        data[offset + 11],
    ]);
    if form != chunk_ids::AVI && form != chunk_ids::AVIX {
        return Err(AviError::InvalidAvi);
    }

    let end = (offset + 8 + riff_size as usize).min(data.len());
    let mut header = None;
    let mut stream = None;
    let mut movi = None;
    let mut index = Vec::new();
    let mut pos = offset + 12;

    while pos + 8 <= end {
        let (id, size) = read_chunk_header(data, pos)?;
        let body_end = (pos + 8 + size as usize).min(end);
        let body = &data[pos + 8..body_end];

        if id == chunk_ids::LIST && body.len() >= 4 {
            let list_type = FourCC([body[0], body[1], body[2], body[3]]);
            if list_type == chunk_ids::HDRL {
                let list = ListChunk::parse(body)?;
                let (avih, info) = parse_hdrl(&list)?;
                header = Some(avih);
                stream = Some(info);
            } else if list_type == chunk_ids::MOVI {
                movi = Some((pos + 12, size));
            } else {
                log::debug!("Skipping list: {}", list_type);
            }
        } else if id == chunk_ids::IDX1 {
            index = parse_index(body);
        } else if id != chunk_ids::JUNK {
            log::debug!("Skipping chunk: {}", id);
        }

        pos += 8 + ((size as usize + 1) & !1);
    }

    let header = header.ok_or(AviError::MissingChunk("hdrl"))?;
    let stream = stream.ok_or(AviError::MissingChunk("strl"))?;
    let (movi_data_offset, movi_size) = movi.ok_or(AviError::MissingChunk("movi"))?;
    let index_base = detect_index_base(data, movi_data_offset, &index)?;

    Ok((
        SegmentInfo {
            form,
            offset,
            riff_size,
            header,
            stream_header: stream.header.clone(),
            movi_data_offset,
            movi_size,
            index,
            index_base,
        },
        stream,
    ))
}

/// Offsets are either relative to the movi data or to the movi FourCC
fn detect_index_base(data: &[u8], movi_data_offset: usize, index: &[IndexEntry]) -> Result<usize> {
    let Some(first) = index.first() else {
        return Ok(movi_data_offset);
    };

    for base in [movi_data_offset, movi_data_offset - 4] {
        let position = base + first.offset as usize;
        if let Ok((id, _)) = read_chunk_header(data, position) {
            if id == first.chunk_id {
                return Ok(base);
            }
        }
    }

    Err(AviError::InvalidChunk {
        id: *chunk_ids::IDX1.as_bytes(),
        message: format!("first entry offset {} does not point at a chunk", first.offset),
    })
}

fn parse_hdrl(list: &ListChunk) -> Result<(AviHeader, StreamInfo)> {
    let avih = list
        .find_chunk(chunk_ids::AVIH)
        .ok_or(AviError::MissingChunk("avih"))?;
    let header = parse_avih(&avih.data)?;

    let strl = list
        .find_lists(chunk_ids::STRL)
        .into_iter()
        .next()
        .ok_or(AviError::MissingChunk("strl"))?;
    let strh = strl
        .find_chunk(chunk_ids::STRH)
        .ok_or(AviError::MissingChunk("strh"))?;
    let strf = strl
        .find_chunk(chunk_ids::STRF)
        .ok_or(AviError::MissingChunk("strf"))?;

    let stream_header = parse_strh(&strh.data)?;
    if stream_header.stream_type != StreamType::Video {
        return Err(AviError::InvalidChunk {
            id: *chunk_ids::STRH.as_bytes(),
            message: format!(
                "unsupported stream type {}",
                FourCC(stream_header.stream_type.to_fourcc())
            ),
        });
    }
    let video_format = parse_video_format(&strf.data)?;

    Ok((
        header,
        StreamInfo {
            header: stream_header,
            video_format,
        },
    ))
}

/// Parse avih (main AVI header)
fn parse_avih(data: &[u8]) -> Result<AviHeader> {
    if data.len() < AviHeader::SIZE {
        return Err(AviError::InvalidChunk {
            id: *b"avih",
            message: "Header too short".into(),
        });
    }

    let mut cursor = Cursor::new(data);

    let header = AviHeader {
        microseconds_per_frame: cursor.read_u32::<LittleEndian>()?,
        max_bytes_per_sec: cursor.read_u32::<LittleEndian>()?,
        padding_granularity: cursor.read_u32::<LittleEndian>()?,
        flags: AviFlags(cursor.read_u32::<LittleEndian>()?),
        total_frames: cursor.read_u32::<LittleEndian>()?,
        initial_frames: cursor.read_u32::<LittleEndian>()?,
        streams: cursor.read_u32::<LittleEndian>()?,
        suggested_buffer_size: cursor.read_u32::<LittleEndian>()?,
        width: cursor.read_u32::<LittleEndian>()?,
        height: cursor.read_u32::<LittleEndian>()?,
    };

    log::debug!(
        "AVI header: {}x{}, {} frames, {:.2} fps",
        header.width,
        header.height,
        header.total_frames,
        header.frame_rate()
    );

    Ok(header)
}

/// Parse strh (stream header)
fn parse_strh(data: &[u8]) -> Result<StreamHeader> {
    if data.len() < StreamHeader::SIZE {
        return Err(AviError::InvalidChunk {
            id: *b"strh",
            message: "Stream header too short".into(),
        });
    }

    let mut cursor = Cursor::new(data);

    let mut type_bytes = [0u8; 4];
    cursor.read_exact(&mut type_bytes)?;

    let mut handler = [0u8; 4];
    cursor.read_exact(&mut handler)?;

    Ok(StreamHeader {
        stream_type: StreamType::from_fourcc(&type_bytes),
        handler,
        flags: cursor.read_u32::<LittleEndian>()?,
        priority: cursor.read_u16::<LittleEndian>()?,
        language: cursor.read_u16::<LittleEndian>()?,
        initial_frames: cursor.read_u32::<LittleEndian>()?,
        scale: cursor.read_u32::<LittleEndian>()?,
        rate: cursor.read_u32::<LittleEndian>()?,
        start: cursor.read_u32::<LittleEndian>()?,
        length: cursor.read_u32::<LittleEndian>()?,
        suggested_buffer_size: cursor.read_u32::<LittleEndian>()?,
        quality: cursor.read_u32::<LittleEndian>()?,
        sample_size: cursor.read_u32::<LittleEndian>()?,
        frame: Rect {
            left: cursor.read_u16::<LittleEndian>()?,
            top: cursor.read_u16::<LittleEndian>()?,
            right: cursor.read_u16::<LittleEndian>()?,
            bottom: cursor.read_u16::<LittleEndian>()?,
        },
    })
}

/// Parse video format (BITMAPINFOHEADER)
fn parse_video_format(data: &[u8]) -> Result<VideoFormat> {
    if data.len() < VideoFormat::SIZE as usize {
        return Err(AviError::InvalidChunk {
            id: *b"strf",
            message: "Video format too short".into(),
        });
    }

    let mut cursor = Cursor::new(data);

    let format = VideoFormat {
        size: cursor.read_u32::<LittleEndian>()?,
        width: cursor.read_i32::<LittleEndian>()?,
        height: cursor.read_i32::<LittleEndian>()?,
        planes: cursor.read_u16::<LittleEndian>()?,
        bit_count: cursor.read_u16::<LittleEndian>()?,
        compression: cursor.read_u32::<LittleEndian>()?,
        image_size: cursor.read_u32::<LittleEndian>()?,
        x_pels_per_meter: cursor.read_i32::<LittleEndian>()?,
        y_pels_per_meter: cursor.read_i32::<LittleEndian>()?,
        colors_used: cursor.read_u32::<LittleEndian>()?,
        colors_important: cursor.read_u32::<LittleEndian>()?,
    };

    if format.width <= 0 || format.height == 0 || format.bit_count != 24 {
        return Err(AviError::InvalidChunk {
            id: *b"strf",
            message: format!(
                "unsupported bitmap {}x{} at {} bpp",
                format.width, format.height, format.bit_count
            ),
        });
    }

    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexOrigin, WriterConfig};
    use crate::writer::AviWriter;
    use image::Rgb;

    fn write_avi(width: u32, height: u32, frames: &[RgbImage], config: WriterConfig) -> Vec<u8> {
        let mut avi = AviWriter::new(Cursor::new(Vec::new()), width, height, 30, config).unwrap();
        for frame in frames {
            avi.write(frame).unwrap();
        }
        avi.close().unwrap().into_inner()
    }

    #[test]
    fn test_reader_headers() {
        let data = write_avi(4, 2, &[RgbImage::new(4, 2)], WriterConfig::default());
        let reader = AviReader::new(&data).unwrap();

        assert_eq!(reader.header().width, 4);
        assert_eq!(reader.header().height, 2);
        assert_eq!(reader.header().total_frames, 1);
        assert_eq!(reader.header().streams, 1);
        assert!(reader.header().flags.has_index());
        assert_eq!(reader.header().suggested_buffer_size, 24);

        let stream = reader.stream();
        assert_eq!(stream.header.stream_type, StreamType::Video);
        assert_eq!(stream.header.length, 1);
        assert_eq!(stream.header.frame_rate(), 30.0);
        assert_eq!(stream.header.frame.right, 4);
        assert_eq!(stream.video_format.bit_count, 24);
        assert_eq!(stream.video_format.image_size, 24);
        assert_eq!(stream.compression(), Some(Compression::None));
    }

    #[test]
    fn test_reader_both_index_origins() {
        let frames = vec![
            RgbImage::from_pixel(3, 3, Rgb([10, 20, 30])),
            RgbImage::from_pixel(3, 3, Rgb([40, 50, 60])),
        ];
        for origin in [IndexOrigin::MoviData, IndexOrigin::MoviList] {
            let config = WriterConfig::default().with_index_origin(origin);
            let data = write_avi(3, 3, &frames, config);
            let reader = AviReader::new(&data).unwrap();

            assert_eq!(reader.frame_count(), 2);
            assert_eq!(reader.decode_frame(0).unwrap(), frames[0]);
            assert_eq!(reader.decode_frame(1).unwrap(), frames[1]);
        }
    }

    #[test]
    fn test_reader_frame_out_of_range() {
        let data = write_avi(2, 2, &[], WriterConfig::default());
        let reader = AviReader::new(&data).unwrap();
        assert_eq!(reader.frame_count(), 0);
        assert_eq!(reader.segments()[0].movi_data_size(), 0);
        assert!(matches!(
            reader.frame_data(0),
            Err(AviError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_reader_rejects_non_riff() {
        assert!(matches!(
            AviReader::new(b"NOT_RIFF____"),
            Err(AviError::InvalidRiff)
        ));
    }

    #[test]
    fn test_reader_rejects_wave() {
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(b"WAVE");

        assert!(matches!(AviReader::new(&data), Err(AviError::InvalidAvi)));
    }

    #[test]
    fn test_reader_detects_bad_index() {
        let mut data = write_avi(2, 2, &[RgbImage::new(2, 2)], WriterConfig::default());
        // idx1 record offset lives at 264
        data[264..268].copy_from_slice(&100u32.to_le_bytes());

        assert!(matches!(
            AviReader::new(&data),
            Err(AviError::InvalidChunk { id, .. }) if &id == b"idx1"
        ));
    }
}
