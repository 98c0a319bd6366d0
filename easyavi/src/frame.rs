//! Frame input and DIB pixel layout
//!
//! Frames arrive top-down as RGB triples. AVI stores them bottom-up as BGR,
//! with every raw row padded to a multiple of four bytes.

use crate::error::{AviError, Result};
use image::{DynamicImage, GenericImageView, ImageBuffer, Luma, Rgb, RgbImage, Rgba};
use std::ops::Deref;

/// Anything that can hand out a raster of RGB triples.
///
/// Row 0 is the top of the image.
pub trait FrameSource {
    /// Width in pixels
    fn width(&self) -> u32;

    /// Height in pixels
    fn height(&self) -> u32;

    /// Colour of the pixel at (x, y) as `[r, g, b]`
    fn rgb(&self, x: u32, y: u32) -> [u8; 3];

    /// Append row `y` to `out` as packed BGR triples
    fn bgr_row(&self, y: u32, out: &mut Vec<u8>) {
        for x in 0..self.width() {
            let [r, g, b] = self.rgb(x, y);
            out.extend_from_slice(&[b, g, r]);
        }
    }
}

impl<C> FrameSource for ImageBuffer<Rgb<u8>, C>
where
    C: Deref<Target = [u8]>,
{
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        self.get_pixel(x, y).0
    }

    fn bgr_row(&self, y: u32, out: &mut Vec<u8>) {
        let row_len = self.dimensions().0 as usize * 3;
        let start = y as usize * row_len;
        let raw: &[u8] = self.as_raw();
        for px in raw[start..start + row_len].chunks_exact(3) {
            out.extend_from_slice(&[px[2], px[1], px[0]]);
        }
    }
}

impl<C> FrameSource for ImageBuffer<Rgba<u8>, C>
where
    C: Deref<Target = [u8]>,
{
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let [r, g, b, _] = self.get_pixel(x, y).0;
        [r, g, b]
    }
}

impl<C> FrameSource for ImageBuffer<Luma<u8>, C>
where
    C: Deref<Target = [u8]>,
{
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let [l] = self.get_pixel(x, y).0;
        [l, l, l]
    }
}

impl FrameSource for DynamicImage {
    fn width(&self) -> u32 {
        GenericImageView::width(self)
    }

    fn height(&self) -> u32 {
        GenericImageView::height(self)
    }

    fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let [r, g, b, _] = self.get_pixel(x, y).0;
        [r, g, b]
    }
}

/// Bytes per raw DIB row, padded to a multiple of four
pub fn stride(width: u32) -> usize {
    (width as usize * 3 + 3) & !3
}

/// Raw DIB size of one frame
pub fn frame_size(width: u32, height: u32) -> u64 {
    stride(width) as u64 * height as u64
}

/// Packed BGR rows, bottom row first, no padding
pub fn bottom_up_bgr<F: FrameSource + ?Sized>(frame: &F) -> Vec<u8> {
    let (width, height) = (frame.width(), frame.height());
    let mut out = Vec::with_capacity(width as usize * height as usize * 3);
    for y in (0..height).rev() {
        frame.bgr_row(y, &mut out);
    }
    out
}

/// Raw DIB payload: bottom-up BGR rows padded to the row stride
pub fn to_dib<F: FrameSource + ?Sized>(frame: &F) -> Vec<u8> {
    let (width, height) = (frame.width(), frame.height());
    let row_stride = stride(width);
    let mut out = Vec::with_capacity(row_stride * height as usize);
    for y in (0..height).rev() {
        frame.bgr_row(y, &mut out);
        out.resize(out.len().next_multiple_of(4), 0);
    }
    out
}

/// Strip row padding from a raw DIB payload
pub fn unpad(dib: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let row_stride = stride(width);
    let row_len = width as usize * 3;
    let needed = row_stride * height as usize;
    if dib.len() < needed {
        return Err(AviError::InsufficientData {
            needed,
            available: dib.len(),
        });
    }

    let mut out = Vec::with_capacity(row_len * height as usize);
    for row in dib.chunks_exact(row_stride).take(height as usize) {
        out.extend_from_slice(&row[..row_len]);
    }
    Ok(out)
}

/// Turn packed BGR rows back into a top-down RGB image
pub fn bgr_to_image(bgr: &[u8], width: u32, height: u32, bottom_up: bool) -> Result<RgbImage> {
    let row_len = width as usize * 3;
    let mut rgb = Vec::with_capacity(bgr.len());
    let rows: Box<dyn Iterator<Item = &[u8]>> = if bottom_up {
        Box::new(bgr.chunks_exact(row_len).rev())
    } else {
        Box::new(bgr.chunks_exact(row_len))
    };
    for row in rows {
        for px in row.chunks_exact(3) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }
    }

    let available = rgb.len();
    ImageBuffer::from_raw(width, height, rgb).ok_or(AviError::InsufficientData {
        needed: row_len * height as usize,
        available,
    })
}
