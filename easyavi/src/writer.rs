//! AVI writer
//!
//! Frames are written to the sink as they arrive. Header fields that depend on
//! the final frame count are written as placeholders and patched on close.

use crate::chunks::{chunk_ids, padded_size, write_chunk, ChunkId, FourCC, IndexEntry};
use crate::config::{Compression, WriterConfig, MAX_SEGMENT_SIZE};
use crate::error::{AviError, Result};
use crate::frame::{self, FrameSource};
use crate::rle;
use crate::types::{AviFlags, AviHeader, StreamHeader, StreamType, VideoFormat};
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;

/// Chunk id of every frame
const FRAME_CHUNK: ChunkId = ChunkId::video(0);

/// One RIFF segment being written
#[derive(Debug, Default)]
struct Segment {
    /// Position of the RIFF FourCC
    riff_offset: u64,
    /// Position of the movi LIST FourCC
    movi_offset: u64,
    /// avih total_frames and strh length fields
    frame_fields: Vec<u64>,
    /// avih and strh suggested buffer size fields
    buffer_fields: Vec<u64>,
    /// idx1 entries in write order
    index: Vec<IndexEntry>,
    /// Frames in this segment
    frames: u32,
    /// Bytes of frame chunks on disk, headers and padding included
    movi_bytes: u64,
    /// Largest declared chunk size in this segment
    max_chunk_size: u32,
}

impl Segment {
    /// First byte after the movi FourCC
    fn movi_data_start(&self) -> u64 {
        self.movi_offset + 12
    }

    /// Bytes the segment would occupy after appending a chunk of `data_len`
    fn projected_size(&self, data_len: usize) -> u64 {
        self.movi_bytes
            + padded_size(data_len) as u64
            + (self.index.len() as u64 + 1) * IndexEntry::SIZE as u64
    }

    /// RIFF size field the segment would close with after appending a chunk
    fn riff_size_after(&self, data_len: usize) -> u64 {
        self.movi_data_start() - self.riff_offset + self.projected_size(data_len)
    }
}

/// Writer for a single-stream video AVI file
pub struct AviWriter<W: Write + Seek> {
    /// Released on close
    writer: Option<W>,
    config: WriterConfig,
    width: u32,
    height: u32,
    fps: u32,
    segment: Segment,
    segments_closed: u32,
    total_frames: u64,
    data_size: u64,
    max_chunk_size: u32,
}

impl AviWriter<BufWriter<File>> {
    /// Create a file at `path` and write the provisional header
    pub fn create<P: AsRef<Path>>(
        path: P,
        width: u32,
        height: u32,
        fps: u32,
        config: WriterConfig,
    ) -> Result<Self> {
        validate_params(width, height, fps, &config)?;
        let file = File::create(path.as_ref())?;
        log::debug!("Created {}", path.as_ref().display());
        Self::new(BufWriter::new(file), width, height, fps, config)
    }
}

impl<W: Write + Seek> AviWriter<W> {
    /// Wrap a sink and write the provisional header
    pub fn new(mut writer: W, width: u32, height: u32, fps: u32, config: WriterConfig) -> Result<Self> {
        validate_params(width, height, fps, &config)?;

        let mut avi = AviWriter {
            writer: None,
            config,
            width,
            height,
            fps,
            segment: Segment::default(),
            segments_closed: 0,
            total_frames: 0,
            data_size: 0,
            max_chunk_size: 0,
        };
        avi.start_segment(&mut writer)?;
        avi.writer = Some(writer);

        Ok(avi)
    }

    /// Append one frame
    pub fn write<F: FrameSource + ?Sized>(&mut self, frame: &F) -> Result<()> {
        let mut writer = self
            .writer
            .take()
            .ok_or(AviError::InvalidState("write after close"))?;
        let result = self.write_frame(&mut writer, frame);
        self.writer = Some(writer);
        result
    }

    /// Patch the header, append the index and release the sink.
    ///
    /// The sink is handed back already flushed. A second call fails.
    pub fn close(&mut self) -> Result<W> {
        let mut writer = self
            .writer
            .take()
            .ok_or(AviError::InvalidState("writer already closed"))?;
        self.finish_segment(&mut writer)?;
        writer.flush()?;

        log::debug!(
            "AVI finalized: {} frames, {} bytes of frame data, {} segment(s)",
            self.total_frames,
            self.data_size,
            self.segments_closed
        );

        Ok(writer)
    }

    fn write_frame<F: FrameSource + ?Sized>(&mut self, writer: &mut W, frame: &F) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(AviError::InvalidDimensions {
                expected_width: self.width,
                expected_height: self.height,
                width: frame.width(),
                height: frame.height(),
            });
        }

        let payload = match self.config.compression {
            Compression::None => frame::to_dib(frame),
            Compression::Rle => rle::encode(
                &frame::bottom_up_bgr(frame),
                self.width as usize,
                self.height as usize,
            ),
        };
        let size = u32::try_from(payload.len()).map_err(|_| {
            AviError::InvalidParameter(format!("encoded frame of {} bytes exceeds 4 GiB", payload.len()))
        })?;

        if self.segment.frames > 0
            && self.segment.projected_size(payload.len()) >= self.config.max_segment_size
        {
            self.finish_segment(writer)?;
            self.start_segment(writer)?;
        }
        size_field(self.segment.riff_size_after(payload.len()))?;

        let position = writer.stream_position()?;
        let offset = (position - self.segment.movi_data_start()) as u32 + self.config.index_origin.bias();
        write_chunk(writer, FRAME_CHUNK.fourcc, &payload)?;

        self.segment.index.push(IndexEntry {
            chunk_id: FRAME_CHUNK.fourcc,
            flags: IndexEntry::KEYFRAME,
            offset,
            size,
        });
        self.segment.frames += 1;
        self.segment.movi_bytes += padded_size(payload.len()) as u64;
        self.segment.max_chunk_size = self.segment.max_chunk_size.max(size);
        self.total_frames += 1;
        self.data_size += size as u64;
        self.max_chunk_size = self.max_chunk_size.max(size);

        log::trace!("Frame {} written: {} bytes at offset {}", self.total_frames, size, offset);

        Ok(())
    }

    /// Write RIFF, hdrl and the opening of movi
    fn start_segment(&mut self, writer: &mut W) -> Result<()> {
        let continuation = self.segments_closed > 0;
        let riff_offset = writer.stream_position()?;

        writer.write_all(chunk_ids::RIFF.as_bytes())?;
        writer.write_u32::<LittleEndian>(0)?; // Size placeholder
        let form = if continuation { chunk_ids::AVIX } else { chunk_ids::AVI };
        writer.write_all(form.as_bytes())?;

        self.segment = Segment {
            riff_offset,
            ..Default::default()
        };

        let hdrl_start = begin_list(writer, chunk_ids::HDRL)?;
        self.write_avih(writer)?;
        let strl_start = begin_list(writer, chunk_ids::STRL)?;
        self.write_strh(writer)?;
        self.write_strf(writer)?;
        end_list(writer, strl_start)?;
        end_list(writer, hdrl_start)?;

        self.segment.movi_offset = begin_list(writer, chunk_ids::MOVI)?;

        log::debug!(
            "Segment {} ({}) started, movi at {}",
            self.segments_closed,
            form,
            self.segment.movi_offset
        );

        Ok(())
    }

    /// Close movi, write idx1, close RIFF, patch placeholders
    fn finish_segment(&mut self, writer: &mut W) -> Result<()> {
        end_list(writer, self.segment.movi_offset)?;

        let index_size = self.segment.index.len() * IndexEntry::SIZE;
        writer.write_all(chunk_ids::IDX1.as_bytes())?;
        writer.write_u32::<LittleEndian>(size_field(index_size as u64)?)?;
        for entry in &self.segment.index {
            entry.write(writer)?;
        }

        let end = writer.stream_position()?;
        let riff_size = size_field(end - self.segment.riff_offset - 8)?;
        patch_u32(writer, self.segment.riff_offset + 4, riff_size)?;
        for &pos in &self.segment.frame_fields {
            patch_u32(writer, pos, self.segment.frames)?;
        }
        for &pos in &self.segment.buffer_fields {
            patch_u32(writer, pos, self.segment.max_chunk_size)?;
        }
        writer.seek(SeekFrom::Start(end))?;

        self.segments_closed += 1;
        log::debug!(
            "Segment closed: {} frames, RIFF size {}",
            self.segment.frames,
            riff_size
        );

        Ok(())
    }

    /// Write avih chunk
    fn write_avih(&mut self, writer: &mut W) -> Result<()> {
        let mut avih = Cursor::new(Vec::with_capacity(AviHeader::SIZE));
        let frame_size = frame::frame_size(self.width, self.height);

        avih.write_u32::<LittleEndian>(1_000_000 / self.fps)?;
        avih.write_u32::<LittleEndian>(
            frame_size.saturating_mul(self.fps as u64).min(u32::MAX as u64) as u32,
        )?;
        avih.write_u32::<LittleEndian>(0)?; // padding granularity
        avih.write_u32::<LittleEndian>(AviFlags::HAS_INDEX.0)?;
        avih.write_u32::<LittleEndian>(0)?; // total frames (patched)
        avih.write_u32::<LittleEndian>(0)?; // initial frames
        avih.write_u32::<LittleEndian>(1)?; // streams
        avih.write_u32::<LittleEndian>(0)?; // suggested buffer size (patched)
        avih.write_u32::<LittleEndian>(self.width)?;
        avih.write_u32::<LittleEndian>(self.height)?;
        avih.write_all(&[0u8; 16])?; // reserved

        let data_start = writer.stream_position()? + 8;
        self.segment
            .frame_fields
            .push(data_start + AviHeader::TOTAL_FRAMES_OFFSET);
        self.segment
            .buffer_fields
            .push(data_start + AviHeader::SUGGESTED_BUFFER_OFFSET);
        write_chunk(writer, chunk_ids::AVIH, avih.get_ref())
    }

    /// Write strh chunk
    fn write_strh(&mut self, writer: &mut W) -> Result<()> {
        let mut strh = Cursor::new(Vec::with_capacity(StreamHeader::SIZE));
        // Frames of earlier segments
        let start = (self.total_frames).min(u32::MAX as u64) as u32;

        strh.write_all(&StreamType::Video.to_fourcc())?;
        strh.write_all(&self.config.compression.handler())?;
        strh.write_u32::<LittleEndian>(0)?; // flags
        strh.write_u16::<LittleEndian>(0)?; // priority
        strh.write_u16::<LittleEndian>(0)?; // language
        strh.write_u32::<LittleEndian>(0)?; // initial frames
        strh.write_u32::<LittleEndian>(1)?; // scale
        strh.write_u32::<LittleEndian>(self.fps)?; // rate
        strh.write_u32::<LittleEndian>(start)?;
        strh.write_u32::<LittleEndian>(0)?; // length (patched)
        strh.write_u32::<LittleEndian>(0)?; // suggested buffer size (patched)
        strh.write_u32::<LittleEndian>(u32::MAX)?; // quality: default
        strh.write_u32::<LittleEndian>(0)?; // sample size
        strh.write_u16::<LittleEndian>(0)?; // frame rect
        strh.write_u16::<LittleEndian>(0)?;
        strh.write_u16::<LittleEndian>(self.width as u16)?; // checked on open
        strh.write_u16::<LittleEndian>(self.height as u16)?;

        let data_start = writer.stream_position()? + 8;
        self.segment
            .frame_fields
            .push(data_start + StreamHeader::LENGTH_OFFSET);
        self.segment
            .buffer_fields
            .push(data_start + StreamHeader::SUGGESTED_BUFFER_OFFSET);
        write_chunk(writer, chunk_ids::STRH, strh.get_ref())
    }

    /// Write strf chunk (BITMAPINFOHEADER)
    fn write_strf(&mut self, writer: &mut W) -> Result<()> {
        let mut strf = Cursor::new(Vec::with_capacity(VideoFormat::SIZE as usize));
        let image_size = match self.config.compression {
            Compression::None => frame::frame_size(self.width, self.height) as u32,
            Compression::Rle => 0,
        };

        strf.write_u32::<LittleEndian>(VideoFormat::SIZE)?;
        strf.write_i32::<LittleEndian>(self.width as i32)?;
        strf.write_i32::<LittleEndian>(self.height as i32)?; // positive: bottom-up
        strf.write_u16::<LittleEndian>(1)?; // planes
        strf.write_u16::<LittleEndian>(24)?; // bit count
        strf.write_u32::<LittleEndian>(self.config.compression.bitmap_compression())?;
        strf.write_u32::<LittleEndian>(image_size)?;
        strf.write_i32::<LittleEndian>(0)?; // x pels per meter
        strf.write_i32::<LittleEndian>(0)?; // y pels per meter
        strf.write_u32::<LittleEndian>(0)?; // colors used
        strf.write_u32::<LittleEndian>(0)?; // colors important

        write_chunk(writer, chunk_ids::STRF, strf.get_ref())
    }

    /// Frame width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Frames per second
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Compression mode
    pub fn compression(&self) -> Compression {
        self.config.compression
    }

    /// Frames written so far, across all segments
    pub fn frame_count(&self) -> u64 {
        self.total_frames
    }

    /// Sum of declared frame chunk sizes
    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    /// Largest declared frame chunk size
    pub fn max_chunk_size(&self) -> u32 {
        self.max_chunk_size
    }

    /// Index entries of the segment being written
    pub fn index(&self) -> &[IndexEntry] {
        &self.segment.index
    }

    /// Number of RIFF segments started
    pub fn segment_count(&self) -> u32 {
        if self.writer.is_some() {
            self.segments_closed + 1
        } else {
            self.segments_closed
        }
    }

    /// Whether the sink has been released
    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

impl<W: Write + Seek> Drop for AviWriter<W> {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.close() {
                log::warn!("Failed to finalize AVI on drop: {}", e);
            }
        }
    }
}

fn validate_params(width: u32, height: u32, fps: u32, config: &WriterConfig) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(AviError::InvalidParameter(format!(
            "frame size {}x{} must be positive",
            width, height
        )));
    }
    // strh stores the frame rectangle as 16-bit edges
    if width > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(AviError::InvalidParameter(format!(
            "frame size {}x{} exceeds {}x{}",
            width,
            height,
            u16::MAX,
            u16::MAX
        )));
    }
    if fps == 0 {
        return Err(AviError::InvalidParameter("fps must be positive".into()));
    }
    config.validate()?;

    // A single frame must stay within the segment limit
    let frame_bound = max_encoded_size(width, height, config.compression);
    if frame_bound > MAX_SEGMENT_SIZE {
        return Err(AviError::InvalidParameter(format!(
            "{}x{} frames may encode to {} bytes, above the {} byte segment limit",
            width, height, frame_bound, MAX_SEGMENT_SIZE
        )));
    }
    Ok(())
}

/// Largest chunk payload a frame of this size can produce
fn max_encoded_size(width: u32, height: u32, compression: Compression) -> u64 {
    match compression {
        Compression::None => frame::frame_size(width, height),
        // one count-1 run per pixel, one marker per row
        Compression::Rle => (width as u64 * 4 + 2) * height as u64,
    }
}

/// Narrow a RIFF size to its 32-bit field
fn size_field(size: u64) -> Result<u32> {
    u32::try_from(size).map_err(|_| {
        AviError::InvalidParameter(format!("RIFF size {} exceeds 4 GiB", size))
    })
}

/// Write a LIST header with a placeholder size; returns its position
fn begin_list<W: Write + Seek>(writer: &mut W, list_type: FourCC) -> Result<u64> {
    let start = writer.stream_position()?;
    writer.write_all(chunk_ids::LIST.as_bytes())?;
    writer.write_u32::<LittleEndian>(0)?; // Size placeholder
    writer.write_all(list_type.as_bytes())?;
    Ok(start)
}

/// Patch the size of the LIST started at `start` to end at the current position
fn end_list<W: Write + Seek>(writer: &mut W, start: u64) -> Result<()> {
    let end = writer.stream_position()?;
    patch_u32(writer, start + 4, size_field(end - start - 8)?)?;
    writer.seek(SeekFrom::Start(end))?;
    Ok(())
}

fn patch_u32<W: Write + Seek>(writer: &mut W, position: u64, value: u32) -> Result<()> {
    writer.seek(SeekFrom::Start(position))?;
    writer.write_u32::<LittleEndian>(value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexOrigin;
    use image::{Rgb, RgbImage};

    /// Offset of the movi LIST in a single-stream file
    const MOVI_OFFSET: usize = 212;

    fn u32_at(data: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
    }

    fn writer(width: u32, height: u32, config: WriterConfig) -> AviWriter<Cursor<Vec<u8>>> {
        AviWriter::new(Cursor::new(Vec::new()), width, height, 30, config).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let mut avi = writer(2, 2, WriterConfig::default());
        let data = avi.close().unwrap().into_inner();

        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..12], b"AVI ");
        assert_eq!(&data[12..16], b"LIST");
        assert_eq!(u32_at(&data, 16), 192);
        assert_eq!(&data[20..24], b"hdrl");
        assert_eq!(&data[24..28], b"avih");
        assert_eq!(u32_at(&data, 28), 56);
        assert_eq!(u32_at(&data, 32), 33333);
        assert_eq!(&data[88..92], b"LIST");
        assert_eq!(&data[96..100], b"strl");
        assert_eq!(&data[100..104], b"strh");
        assert_eq!(&data[108..112], b"vids");
        assert_eq!(&data[112..116], b"DIB ");
        assert_eq!(&data[164..168], b"strf");
        assert_eq!(u32_at(&data, 168), 40);
        assert_eq!(&data[MOVI_OFFSET..MOVI_OFFSET + 4], b"LIST");
        assert_eq!(&data[MOVI_OFFSET + 8..MOVI_OFFSET + 12], b"movi");
    }

    #[test]
    fn test_empty_file() {
        let mut avi = writer(2, 2, WriterConfig::default());
        let data = avi.close().unwrap().into_inner();

        // movi holds only its FourCC, idx1 is empty
        assert_eq!(u32_at(&data, MOVI_OFFSET + 4), 4);
        assert_eq!(&data[224..228], b"idx1");
        assert_eq!(u32_at(&data, 228), 0);
        assert_eq!(data.len(), 232);
        assert_eq!(u32_at(&data, 4), 224);
        // avih total frames and strh length
        assert_eq!(u32_at(&data, 48), 0);
        assert_eq!(u32_at(&data, 140), 0);
    }

    #[test]
    fn test_single_red_frame() {
        let mut avi = writer(2, 2, WriterConfig::default());
        avi.write(&RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]))).unwrap();

        assert_eq!(avi.frame_count(), 1);
        assert_eq!(avi.index().len(), 1);
        assert_eq!(avi.index()[0].offset, 0);
        assert_eq!(avi.index()[0].size, 16);

        let data = avi.close().unwrap().into_inner();
        assert_eq!(&data[224..228], b"00dc");
        assert_eq!(u32_at(&data, 228), 16);
        assert_eq!(&data[232..240], &[0, 0, 255, 0, 0, 255, 0, 0]);
        assert_eq!(u32_at(&data, MOVI_OFFSET + 4), 4 + 24);

        // idx1 follows the frame
        assert_eq!(&data[248..252], b"idx1");
        assert_eq!(u32_at(&data, 252), 16);
        assert_eq!(&data[256..260], b"00dc");
        assert_eq!(u32_at(&data, 260), IndexEntry::KEYFRAME);
        assert_eq!(u32_at(&data, 264), 0);
        assert_eq!(u32_at(&data, 268), 16);

        assert_eq!(data.len(), 272);
        assert_eq!(u32_at(&data, 4), 264);
        assert_eq!(u32_at(&data, 48), 1); // avih total frames
        assert_eq!(u32_at(&data, 60), 16); // avih suggested buffer
        assert_eq!(u32_at(&data, 140), 1); // strh length
        assert_eq!(u32_at(&data, 144), 16); // strh suggested buffer
    }

    #[test]
    fn test_counters_track_writes() {
        let config = WriterConfig::default().with_compression(Compression::Rle);
        let mut avi = writer(3, 1, config);
        let solid = RgbImage::from_pixel(3, 1, Rgb([1, 2, 3]));
        let noisy = RgbImage::from_fn(3, 1, |x, _| Rgb([x as u8, 0, 0]));

        avi.write(&solid).unwrap();
        avi.write(&noisy).unwrap();

        // solid: one run + EOB = 6; noisy: absolute run of 3 + pad + EOB = 14
        assert_eq!(avi.index()[0].size, 6);
        assert_eq!(avi.index()[1].size, 14);
        assert_eq!(avi.index()[1].offset, 8 + 6);
        assert_eq!(avi.data_size(), 20);
        assert_eq!(avi.max_chunk_size(), 14);
        assert_eq!(
            avi.data_size(),
            avi.index().iter().map(|e| e.size as u64).sum::<u64>()
        );
    }

    #[test]
    fn test_chunk_sizes_are_even() {
        let config = WriterConfig::default().with_compression(Compression::Rle);
        let mut avi = writer(5, 1, config);
        // literal of 3 (2 + 9 + pad), run of 2 (4), end of bitmap (2)
        let img = RgbImage::from_fn(5, 1, |x, _| {
            if x < 3 {
                Rgb([x as u8 + 1, 0, 0])
            } else {
                Rgb([9, 9, 9])
            }
        });
        avi.write(&img).unwrap();
        assert_eq!(avi.index()[0].size, 18);

        let mut avi = writer(1, 1, WriterConfig::default());
        avi.write(&RgbImage::new(1, 1)).unwrap();
        avi.write(&RgbImage::new(1, 1)).unwrap();
        // 1x1 raw rows pad to 4 bytes
        assert_eq!(avi.index()[0].size, 4);
        assert_eq!(avi.index()[1].offset, 12);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut avi = writer(4, 4, WriterConfig::default());
        avi.write(&RgbImage::new(4, 4)).unwrap();

        let err = avi.write(&RgbImage::new(4, 3)).unwrap_err();
        assert!(matches!(
            err,
            AviError::InvalidDimensions {
                expected_width: 4,
                expected_height: 4,
                width: 4,
                height: 3
            }
        ));
        assert_eq!(avi.index().len(), 1);
        assert_eq!(avi.frame_count(), 1);

        // writer is still usable
        avi.write(&RgbImage::new(4, 4)).unwrap();
        assert_eq!(avi.index().len(), 2);
    }

    #[test]
    fn test_invalid_parameters() {
        let sink = || Cursor::new(Vec::new());
        assert!(matches!(
            AviWriter::new(sink(), 0, 10, 30, WriterConfig::default()),
            Err(AviError::InvalidParameter(_))
        ));
        assert!(matches!(
            AviWriter::new(sink(), 10, 0, 30, WriterConfig::default()),
            Err(AviError::InvalidParameter(_))
        ));
        assert!(matches!(
            AviWriter::new(sink(), 10, 10, 0, WriterConfig::default()),
            Err(AviError::InvalidParameter(_))
        ));
        assert!(matches!(
            AviWriter::new(sink(), 10, 10, 30, WriterConfig::default().with_max_segment_size(1)),
            Err(AviError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_frame_rectangle_limits() {
        let sink = || Cursor::new(Vec::new());
        let mut avi = AviWriter::new(sink(), 65535, 1, 30, WriterConfig::default()).unwrap();
        let data = avi.close().unwrap().into_inner();
        // strh frame rectangle right edge
        assert_eq!(u16::from_le_bytes([data[160], data[161]]), 65535);

        assert!(matches!(
            AviWriter::new(sink(), 65536, 1, 30, WriterConfig::default()),
            Err(AviError::InvalidParameter(_))
        ));
        assert!(matches!(
            AviWriter::new(sink(), 1, 70000, 30, WriterConfig::default()),
            Err(AviError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_frame_must_fit_in_segment() {
        let sink = || Cursor::new(Vec::new());
        // 40000x20000 raw is 2.4 GB
        assert!(matches!(
            AviWriter::new(sink(), 40000, 20000, 30, WriterConfig::default()),
            Err(AviError::InvalidParameter(_))
        ));

        // 1.8 GB raw fits; worst-case RLE of the same size does not
        assert!(AviWriter::new(sink(), 30000, 20000, 30, WriterConfig::default()).is_ok());
        let rle = WriterConfig::default().with_compression(Compression::Rle);
        assert!(matches!(
            AviWriter::new(sink(), 30000, 20000, 30, rle),
            Err(AviError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_riff_size_overflow_is_rejected() {
        let mut avi = writer(2, 2, WriterConfig::default());
        // An empty segment is never split, so only the size check stops this
        avi.segment.movi_bytes = u32::MAX as u64 - 100;

        assert!(matches!(
            avi.write(&RgbImage::new(2, 2)),
            Err(AviError::InvalidParameter(_))
        ));
        assert_eq!(avi.frame_count(), 0);
        assert!(avi.index().is_empty());

        // Nothing reached the sink
        avi.segment.movi_bytes = 0;
        avi.write(&RgbImage::new(2, 2)).unwrap();
        let data = avi.close().unwrap().into_inner();
        assert_eq!(data.len(), 272);
    }

    #[test]
    fn test_size_field() {
        assert_eq!(size_field(u32::MAX as u64).unwrap(), u32::MAX);
        assert!(matches!(
            size_field(u32::MAX as u64 + 1),
            Err(AviError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_close_twice() {
        let mut avi = writer(2, 2, WriterConfig::default());
        avi.close().unwrap();
        assert!(avi.is_closed());
        assert!(matches!(avi.close(), Err(AviError::InvalidState(_))));
    }

    #[test]
    fn test_write_after_close() {
        let mut avi = writer(2, 2, WriterConfig::default());
        avi.close().unwrap();
        assert!(matches!(
            avi.write(&RgbImage::new(2, 2)),
            Err(AviError::InvalidState(_))
        ));
    }

    #[test]
    fn test_movi_list_origin() {
        let config = WriterConfig::default().with_index_origin(IndexOrigin::MoviList);
        let mut avi = writer(4, 1, config);
        avi.write(&RgbImage::new(4, 1)).unwrap();
        avi.write(&RgbImage::new(4, 1)).unwrap();

        assert_eq!(avi.index()[0].offset, 4);
        assert_eq!(avi.index()[1].offset, 4 + 8 + 12);
    }

    #[test]
    fn test_segment_split() {
        // 64x16 raw frame = 3072 bytes, two never fit in a 4 KiB segment
        let config = WriterConfig::default().with_max_segment_size(4096);
        let mut avi = writer(64, 16, config);
        for _ in 0..3 {
            avi.write(&RgbImage::new(64, 16)).unwrap();
        }

        assert_eq!(avi.frame_count(), 3);
        assert_eq!(avi.segment_count(), 3);
        assert_eq!(avi.index().len(), 1);
        assert_eq!(avi.index()[0].offset, 0);

        let data = avi.close().unwrap().into_inner();
        assert_eq!(avi.segment_count(), 3);

        // second segment starts right after the first
        let first_len = u32_at(&data, 4) as usize + 8;
        assert_eq!(&data[first_len..first_len + 4], b"RIFF");
        assert_eq!(&data[first_len + 8..first_len + 12], b"AVIX");
        // strh start of the second segment counts earlier frames
        assert_eq!(u32_at(&data, first_len + 136), 1);
    }

    #[test]
    fn test_drop_finalizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.avi");
        {
            let mut avi = AviWriter::create(&path, 2, 2, 25, WriterConfig::default()).unwrap();
            avi.write(&RgbImage::new(2, 2)).unwrap();
        }

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 272);
        assert_eq!(u32_at(&data, 48), 1);
    }
}
