// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Owned pixel buffers and integer areas.

use alloc::vec;
use alloc::vec::Vec;

use thiserror::Error;

use crate::canvas::RectF;

/// Pixel format of a [`DrawBuf`].
///
/// Multi-byte formats are stored little-endian: 32-bit pixels are the bytes
/// B, G, R, A and [`ColorFormat::Rgb888`] is B, G, R.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    /// 32-bit color with straight alpha.
    Argb8888,
    /// 32-bit color with premultiplied alpha.
    Argb8888Premultiplied,
    /// 32-bit color whose alpha byte is ignored.
    Xrgb8888,
    /// 24-bit color.
    Rgb888,
    /// 16-bit color: 5 bits red, 6 bits green, 5 bits blue.
    Rgb565,
    /// [`ColorFormat::Rgb565`] color plane followed by an 8-bit alpha plane.
    Rgb565A8,
    /// 8-bit luminance.
    L8,
    /// 8-bit alpha only.
    A8,
}

impl ColorFormat {
    /// Bytes per pixel in the color plane.
    #[inline]
    pub const fn pixel_size(self) -> u32 {
        match self {
            Self::Argb8888 | Self::Argb8888Premultiplied | Self::Xrgb8888 => 4,
            Self::Rgb888 => 3,
            Self::Rgb565 | Self::Rgb565A8 => 2,
            Self::L8 | Self::A8 => 1,
        }
    }

    /// Returns `true` for the 32-bit formats a canvas can bind directly.
    #[inline]
    pub const fn is_native(self) -> bool {
        matches!(
            self,
            Self::Argb8888 | Self::Argb8888Premultiplied | Self::Xrgb8888
        )
    }
}

/// Errors raised by [`DrawBuf`] geometry operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufError {
    /// The stride cannot hold a full row.
    #[error("stride {stride} is smaller than the minimum row size {min}")]
    StrideTooSmall {
        /// Requested stride in bytes.
        stride: u32,
        /// Bytes in one row of pixels.
        min: u32,
    },
    /// The pixel data is shorter than the geometry requires.
    #[error("buffer needs {needed} bytes but holds {len}")]
    TooShort {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        len: usize,
    },
    /// The operation is not available for this format.
    #[error("operation not supported for {0:?}")]
    Unsupported(ColorFormat),
}

/// Geometry and format of a [`DrawBuf`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageHeader {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes between the starts of consecutive rows of the color plane.
    pub stride: u32,
    /// Pixel format.
    pub format: ColorFormat,
}

impl ImageHeader {
    /// Bytes in one row of pixels, without padding.
    #[inline]
    pub const fn row_size(&self) -> u32 {
        self.width * self.format.pixel_size()
    }

    /// Bytes the data of an image with this header must hold.
    ///
    /// For [`ColorFormat::Rgb565A8`] this includes the alpha plane, whose
    /// stride is half the color stride.
    pub const fn data_size(&self) -> usize {
        let color = self.stride as usize * self.height as usize;
        match self.format {
            ColorFormat::Rgb565A8 => color + color / 2,
            _ => color,
        }
    }
}

/// An owned pixel buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawBuf {
    /// Geometry and format.
    pub header: ImageHeader,
    data: Vec<u8>,
}

impl DrawBuf {
    /// Allocate a zeroed buffer with tightly packed rows.
    pub fn new(width: u32, height: u32, format: ColorFormat) -> Self {
        let header = ImageHeader {
            width,
            height,
            stride: width * format.pixel_size(),
            format,
        };
        Self {
            data: vec![0; header.data_size()],
            header,
        }
    }

    /// Allocate a zeroed buffer with an explicit stride.
    pub fn with_stride(
        width: u32,
        height: u32,
        format: ColorFormat,
        stride: u32,
    ) -> Result<Self, BufError> {
        let header = ImageHeader {
            width,
            height,
            stride,
            format,
        };
        if stride < header.row_size() {
            return Err(BufError::StrideTooSmall {
                stride,
                min: header.row_size(),
            });
        }
        Ok(Self {
            data: vec![0; header.data_size()],
            header,
        })
    }

    /// Wrap existing pixel data, checking that it covers `header`.
    pub fn from_data(header: ImageHeader, data: Vec<u8>) -> Result<Self, BufError> {
        if header.stride < header.row_size() {
            return Err(BufError::StrideTooSmall {
                stride: header.stride,
                min: header.row_size(),
            });
        }
        if data.len() < header.data_size() {
            return Err(BufError::TooShort {
                needed: header.data_size(),
                len: data.len(),
            });
        }
        Ok(Self { header, data })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.header.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Row stride in bytes.
    #[inline]
    pub fn stride(&self) -> u32 {
        self.header.stride
    }

    /// Pixel format.
    #[inline]
    pub fn format(&self) -> ColorFormat {
        self.header.format
    }

    /// Bytes per pixel of the color plane.
    #[inline]
    pub fn pixel_size(&self) -> u32 {
        self.header.format.pixel_size()
    }

    /// Raw pixel bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw pixel bytes.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The color-plane pixels of row `y`, without padding.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.header.height {
            return None;
        }
        let start = y as usize * self.header.stride as usize;
        self.data
            .get(start..start + self.header.row_size() as usize)
    }

    /// Mutable color-plane pixels of row `y`, without padding.
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.header.height {
            return None;
        }
        let start = y as usize * self.header.stride as usize;
        let len = self.header.row_size() as usize;
        self.data.get_mut(start..start + len)
    }

    /// Repack rows in place to a new stride.
    ///
    /// Row contents are kept; padding bytes after the move are unspecified.
    /// Fails if `stride` cannot hold a row or the data is too short for the
    /// new geometry.
    pub fn adjust_stride(&mut self, stride: u32) -> Result<(), BufError> {
        let old = self.header.stride as usize;
        if stride == self.header.stride {
            return Ok(());
        }
        if self.header.format == ColorFormat::Rgb565A8 {
            return Err(BufError::Unsupported(self.header.format));
        }
        let row = self.header.row_size();
        if stride < row {
            return Err(BufError::StrideTooSmall { stride, min: row });
        }
        let new_header = ImageHeader {
            stride,
            ..self.header
        };
        if self.data.len() < new_header.data_size() {
            return Err(BufError::TooShort {
                needed: new_header.data_size(),
                len: self.data.len(),
            });
        }

        let new = stride as usize;
        let row = row as usize;
        let height = self.header.height as usize;
        if new < old {
            for y in 1..height {
                self.data.copy_within(y * old..y * old + row, y * new);
            }
        } else {
            for y in (1..height).rev() {
                self.data.copy_within(y * old..y * old + row, y * new);
            }
        }
        self.header = new_header;
        Ok(())
    }
}

/// Integer rectangle, half-open: `x0..x1` by `y0..y1`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RectI {
    /// Minimum X coordinate (inclusive).
    pub x0: i32,
    /// Minimum Y coordinate (inclusive).
    pub y0: i32,
    /// Maximum X coordinate (exclusive).
    pub x1: i32,
    /// Maximum Y coordinate (exclusive).
    pub y1: i32,
}

impl RectI {
    /// Create a rectangle from min/max corners.
    #[inline]
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Create a rectangle from an origin and a size.
    #[inline]
    pub const fn from_origin_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Width; zero or negative for empty rectangles.
    #[inline]
    pub const fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    /// Height; zero or negative for empty rectangles.
    #[inline]
    pub const fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    /// Returns `true` if the rectangle contains no pixels.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Offset by `(dx, dy)`.
    #[inline]
    pub const fn translate(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x0 + dx, self.y0 + dy, self.x1 + dx, self.y1 + dy)
    }

    /// Convert to a float rectangle.
    #[inline]
    pub fn to_f32(self) -> RectF {
        RectF::new(
            self.x0 as f32,
            self.y0 as f32,
            self.x1 as f32,
            self.y1 as f32,
        )
    }
}
