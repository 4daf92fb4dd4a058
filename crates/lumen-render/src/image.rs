//! CPU-side pixel buffers.
//!
//! Decoding is delegated to the `image` crate; this module only owns the
//! layout rules and bounds-checked access.

use std::path::Path;

use crate::error::{RenderError, Result};
use crate::paint::Color;

/// Bits per pixel of an [`Image`].
///
/// Channel layouts:
/// - `Eight`: luminance
/// - `Sixteen`: luminance + alpha
/// - `TwentyFour`: RGB
/// - `ThirtyTwo`: RGBA (straight alpha)
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BitDepth {
    Eight,
    Sixteen,
    TwentyFour,
    #[default]
    ThirtyTwo,
}

impl BitDepth {
    pub const ALL: [BitDepth; 4] = [
        BitDepth::Eight,
        BitDepth::Sixteen,
        BitDepth::TwentyFour,
        BitDepth::ThirtyTwo,
    ];

    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            BitDepth::Eight => 1,
            BitDepth::Sixteen => 2,
            BitDepth::TwentyFour => 3,
            BitDepth::ThirtyTwo => 4,
        }
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.bytes_per_pixel() as u32 * 8
    }

    pub const fn from_bits(bits: u32) -> Option<BitDepth> {
        match bits {
            8 => Some(BitDepth::Eight),
            16 => Some(BitDepth::Sixteen),
            24 => Some(BitDepth::TwentyFour),
            32 => Some(BitDepth::ThirtyTwo),
            _ => None,
        }
    }
}

/// A 2D pixel buffer.
///
/// Invariant: when present, `pixels.len() == width * height * bytes_per_pixel`.
/// An image may be unallocated (GPU-only); reads then return zero and the first
/// write allocates a zeroed buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    depth: BitDepth,
    pixels: Option<Vec<u8>>,
}

impl Image {
    /// Allocates a zeroed image.
    pub fn new(width: u32, height: u32, depth: BitDepth) -> Self {
        let len = Self::expected_len(width, height, depth);
        Self {
            width,
            height,
            depth,
            pixels: Some(vec![0; len]),
        }
    }

    /// Describes an image without allocating its pixel buffer.
    pub fn unallocated(width: u32, height: u32, depth: BitDepth) -> Self {
        Self {
            width,
            height,
            depth,
            pixels: None,
        }
    }

    /// Wraps an existing buffer, validating its length.
    pub fn from_raw(width: u32, height: u32, depth: BitDepth, pixels: Vec<u8>) -> Result<Self> {
        let expected = Self::expected_len(width, height, depth);
        if pixels.len() != expected {
            return Err(RenderError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            depth,
            pixels: Some(pixels),
        })
    }

    /// Decodes an image file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let decoded = ::image::open(path).map_err(|source| RenderError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_dynamic(decoded))
    }

    /// Converts a decoded image, keeping the narrowest matching layout.
    pub fn from_dynamic(decoded: ::image::DynamicImage) -> Self {
        let (width, height) = (decoded.width(), decoded.height());
        let (depth, pixels) = match decoded {
            ::image::DynamicImage::ImageLuma8(buf) => (BitDepth::Eight, buf.into_raw()),
            ::image::DynamicImage::ImageLumaA8(buf) => (BitDepth::Sixteen, buf.into_raw()),
            ::image::DynamicImage::ImageRgb8(buf) => (BitDepth::TwentyFour, buf.into_raw()),
            other => (BitDepth::ThirtyTwo, other.into_rgba8().into_raw()),
        };
        Self {
            width,
            height,
            depth,
            pixels: Some(pixels),
        }
    }

    #[inline]
    fn expected_len(width: u32, height: u32, depth: BitDepth) -> usize {
        width as usize * height as usize * depth.bytes_per_pixel()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn bit_depth(&self) -> BitDepth {
        self.depth
    }

    /// Length in bytes of a fully allocated buffer.
    #[inline]
    pub fn byte_len(&self) -> usize {
        Self::expected_len(self.width, self.height, self.depth)
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.pixels.is_some()
    }

    /// Read-only view of the pixel buffer, if allocated.
    #[inline]
    pub fn pixels(&self) -> Option<&[u8]> {
        self.pixels.as_deref()
    }

    /// Mutable pixel buffer; allocates it on first use.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        let len = self.byte_len();
        self.pixels.get_or_insert_with(|| vec![0; len])
    }

    fn offset(&self, x: u32, y: u32) -> Result<usize> {
        if x >= self.width || y >= self.height {
            return Err(RenderError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok((y as usize * self.width as usize + x as usize) * self.depth.bytes_per_pixel())
    }

    /// Returns the pixel at `(x, y)` as little-endian packed channel bytes.
    pub fn pixel(&self, x: u32, y: u32) -> Result<u32> {
        let at = self.offset(x, y)?;
        let Some(pixels) = self.pixels.as_deref() else {
            return Ok(0);
        };
        let bpp = self.depth.bytes_per_pixel();
        Ok(pixels[at..at + bpp]
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, b)| acc | (u32::from(*b) << (8 * i))))
    }

    /// Writes a little-endian packed pixel value. Bytes beyond the bit depth are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, value: u32) -> Result<()> {
        let at = self.offset(x, y)?;
        let bpp = self.depth.bytes_per_pixel();
        let bytes = value.to_le_bytes();
        self.pixels_mut()[at..at + bpp].copy_from_slice(&bytes[..bpp]);
        Ok(())
    }

    /// Decodes the pixel at `(x, y)` into a premultiplied color.
    pub fn color_at(&self, x: u32, y: u32) -> Result<Color> {
        let at = self.offset(x, y)?;
        let Some(pixels) = self.pixels.as_deref() else {
            return Ok(Color::TRANSPARENT);
        };
        let p = &pixels[at..at + self.depth.bytes_per_pixel()];
        Ok(match self.depth {
            BitDepth::Eight => Color::from_rgba8(p[0], p[0], p[0], 255),
            BitDepth::Sixteen => Color::from_rgba8(p[0], p[0], p[0], p[1]),
            BitDepth::TwentyFour => Color::from_rgba8(p[0], p[1], p[2], 255),
            BitDepth::ThirtyTwo => Color::from_rgba8(p[0], p[1], p[2], p[3]),
        })
    }

    /// Encodes `color` into the pixel at `(x, y)`, dropping channels the depth lacks.
    pub fn put_color(&mut self, x: u32, y: u32, color: Color) -> Result<()> {
        let at = self.offset(x, y)?;
        let depth = self.depth;
        let [r, g, b, a] = color.to_rgba8();
        let p = &mut self.pixels_mut()[at..at + depth.bytes_per_pixel()];
        match depth {
            BitDepth::Eight => p[0] = luminance(r, g, b),
            BitDepth::Sixteen => {
                p[0] = luminance(r, g, b);
                p[1] = a;
            }
            BitDepth::TwentyFour => p.copy_from_slice(&[r, g, b]),
            BitDepth::ThirtyTwo => p.copy_from_slice(&[r, g, b, a]),
        }
        Ok(())
    }

    /// Sets every pixel to `color`.
    pub fn fill(&mut self, color: Color) {
        let (w, h) = self.size();
        if w == 0 || h == 0 {
            return;
        }
        // Encode once, then replicate the pixel bytes.
        let mut probe = Image::new(1, 1, self.depth);
        let _ = probe.put_color(0, 0, color);
        let texel = probe.pixels.unwrap_or_default();
        for chunk in self.pixels_mut().chunks_exact_mut(texel.len()) {
            chunk.copy_from_slice(&texel);
        }
    }

    /// Samples with integer texel coordinates, wrapping or clamping out-of-range
    /// coordinates. Empty images sample as transparent.
    pub fn sample(&self, x: i64, y: i64, wrapped: bool) -> Color {
        if self.width == 0 || self.height == 0 {
            return Color::TRANSPARENT;
        }
        let (w, h) = (i64::from(self.width), i64::from(self.height));
        let (sx, sy) = if wrapped {
            (x.rem_euclid(w), y.rem_euclid(h))
        } else {
            (x.clamp(0, w - 1), y.clamp(0, h - 1))
        };
        self.color_at(sx as u32, sy as u32)
            .unwrap_or(Color::TRANSPARENT)
    }

    /// Returns the image as tightly packed straight-alpha RGBA8 bytes.
    pub fn to_rgba8(&self) -> Vec<u8> {
        if self.depth == BitDepth::ThirtyTwo {
            if let Some(pixels) = self.pixels.as_deref() {
                return pixels.to_vec();
            }
        }
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                let c = self.color_at(x, y).unwrap_or(Color::TRANSPARENT);
                out.extend_from_slice(&c.to_rgba8());
            }
        }
        out
    }
}

/// Rec. 601 integer luminance; exact for gray inputs.
#[inline]
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((u32::from(r) * 77 + u32::from(g) * 150 + u32::from(b) * 29 + 128) >> 8) as u8
}
