// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The raster engine seam.
//!
//! A [`RasterEngine`] binds a [`Canvas`] over a [`Surface`]: borrowed,
//! 32-bit premultiplied pixel memory stored as B, G, R, A bytes. The
//! canvas is a small stateful 2D API (transform, clip, current path, paint,
//! stroke) in the style of cairo or plutovg. The rest of this crate only
//! talks to the engine through these two traits.

use core::fmt;
use core::ops::{Deref, DerefMut};

use kurbo::Affine;
use peniko::{Brush, Fill};
use thiserror::Error;

use crate::path::FPoint;
use crate::paint::StrokeStyle;

/// Bytes per pixel of a canvas surface.
pub const SURFACE_BPP: u32 = 4;

/// A simple axis-aligned rectangle in f32 coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RectF {
    /// Minimum X coordinate.
    pub x0: f32,
    /// Minimum Y coordinate.
    pub y0: f32,
    /// Maximum X coordinate.
    pub x1: f32,
    /// Maximum Y coordinate.
    pub y1: f32,
}

impl RectF {
    /// Create a new rectangle from min/max corners.
    #[inline]
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Width of the rectangle.
    #[inline]
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the rectangle.
    #[inline]
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Convert to kurbo's rectangle type.
    #[inline]
    pub fn to_kurbo(self) -> kurbo::Rect {
        kurbo::Rect::new(
            f64::from(self.x0),
            f64::from(self.y0),
            f64::from(self.x1),
            f64::from(self.y1),
        )
    }
}

/// Errors raised while binding a canvas to a surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanvasError {
    /// The row stride cannot hold a full row of pixels.
    #[error("surface stride {stride} is smaller than a row of {width} pixels")]
    StrideTooSmall {
        /// Requested stride in bytes.
        stride: u32,
        /// Width in pixels.
        width: u32,
    },
    /// The pixel memory is shorter than the surface geometry requires.
    #[error("surface needs {needed} bytes but the buffer holds {len}")]
    BufferTooSmall {
        /// Bytes required by width, height and stride.
        needed: usize,
        /// Bytes available.
        len: usize,
    },
    /// The engine cannot address a surface this large.
    #[error("surface of {width}x{height} pixels exceeds the engine's limits")]
    SurfaceTooLarge {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
}

/// Borrowed 32-bit premultiplied pixel memory a canvas draws onto.
///
/// Pixels are stored as B, G, R, A bytes (a little-endian `0xAARRGGBB`
/// word); rows are `stride` bytes apart.
pub struct Surface<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
    stride: u32,
}

impl fmt::Debug for Surface<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .finish_non_exhaustive()
    }
}

impl<'a> Surface<'a> {
    /// Wrap pixel memory, checking that the geometry fits inside `data`.
    pub fn new(data: &'a mut [u8], width: u32, height: u32, stride: u32) -> Result<Self, CanvasError> {
        let row = width as usize * SURFACE_BPP as usize;
        if (stride as usize) < row {
            return Err(CanvasError::StrideTooSmall { stride, width });
        }
        let needed = match height {
            0 => 0,
            h => stride as usize * (h as usize - 1) + row,
        };
        if data.len() < needed {
            return Err(CanvasError::BufferTooSmall {
                needed,
                len: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row stride in bytes.
    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// The pixels of row `y`, without the stride padding.
    ///
    /// Returns `None` if `y` is out of range.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride as usize;
        self.data
            .get(start..start + self.width as usize * SURFACE_BPP as usize)
    }

    /// Mutable pixels of row `y`, without the stride padding.
    ///
    /// Returns `None` if `y` is out of range.
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride as usize;
        self.data
            .get_mut(start..start + self.width as usize * SURFACE_BPP as usize)
    }
}

/// A stateful 2D canvas bound to a [`Surface`].
///
/// Coordinates passed to path and clip calls are interpreted through the
/// current transform. The current path is not part of the saved state.
///
/// Paint transforms given to [`Canvas::set_brush`] and the bounds returned
/// by [`Canvas::fill_extents`] live in user space, the coordinate system
/// the path points are expressed in; the canvas composes paint transforms
/// with the geometry transform when painting.
pub trait Canvas {
    /// Push the transform, clip, paint, stroke, fill rule and opacity.
    fn save(&mut self);
    /// Pop the state pushed by the matching [`Canvas::save`].
    fn restore(&mut self);

    /// Reset the geometry transform to identity.
    fn reset_transform(&mut self);
    /// Replace the geometry transform.
    fn set_transform(&mut self, transform: Affine);
    /// Intersect the clip with `rect`, mapped through the current transform.
    fn clip_rect(&mut self, rect: RectF);

    /// Discard the current path.
    fn new_path(&mut self);
    /// Begin a subpath.
    fn move_to(&mut self, p: FPoint);
    /// Line to `p`.
    fn line_to(&mut self, p: FPoint);
    /// Quadratic Bézier to `p` with control point `c`.
    fn quad_to(&mut self, c: FPoint, p: FPoint);
    /// Cubic Bézier to `p` with control points `c1` and `c2`.
    fn cubic_to(&mut self, c1: FPoint, c2: FPoint, p: FPoint);
    /// Close the current subpath.
    fn close_path(&mut self);

    /// Set the opacity (0–1) applied to subsequent fills and strokes.
    fn set_opacity(&mut self, opacity: f32);
    /// Set the fill rule used by [`Canvas::fill_preserve`].
    fn set_fill_rule(&mut self, rule: Fill);
    /// Set the current paint and its paint-space transform.
    fn set_brush(&mut self, brush: Brush, paint_transform: Affine);
    /// Set width, caps, join, miter limit and dashes for [`Canvas::stroke`].
    ///
    /// An empty dash pattern draws a solid line.
    fn set_stroke(&mut self, style: StrokeStyle);

    /// Bounds of the current path in user space.
    ///
    /// An empty path yields an empty rectangle at the origin.
    fn fill_extents(&self) -> RectF;
    /// Fill the current path and keep it for a following stroke.
    fn fill_preserve(&mut self);
    /// Stroke the current path and discard it.
    fn stroke(&mut self);
    /// Fill a rectangle with the current paint, ignoring the current path.
    fn fill_rect(&mut self, rect: RectF);

    /// Make all drawing so far visible in the bound surface.
    fn flush(&mut self);
}

/// Factory binding canvases to surfaces.
///
/// Dropping the returned canvas releases every engine resource tied to it;
/// call [`Canvas::flush`] first to keep the drawing.
pub trait RasterEngine {
    /// Canvas type produced by this engine.
    type Canvas<'s>: Canvas
    where
        Self: 's;

    /// Bind a new canvas to `surface`.
    fn create_canvas<'s>(&'s mut self, surface: Surface<'s>)
    -> Result<Self::Canvas<'s>, CanvasError>;
}

/// Saves canvas state on creation and restores it when dropped.
///
/// Dereferences to the canvas so drawing continues through the guard.
pub struct ScopedSave<'a, C: Canvas + ?Sized> {
    canvas: &'a mut C,
}

impl<'a, C: Canvas + ?Sized> ScopedSave<'a, C> {
    /// Save `canvas` state until the guard is dropped.
    #[inline]
    pub fn new(canvas: &'a mut C) -> Self {
        canvas.save();
        Self { canvas }
    }
}

impl<C: Canvas + ?Sized> Deref for ScopedSave<'_, C> {
    type Target = C;

    #[inline]
    fn deref(&self) -> &C {
        self.canvas
    }
}

impl<C: Canvas + ?Sized> DerefMut for ScopedSave<'_, C> {
    #[inline]
    fn deref_mut(&mut self) -> &mut C {
        self.canvas
    }
}

impl<C: Canvas + ?Sized> Drop for ScopedSave<'_, C> {
    fn drop(&mut self) {
        self.canvas.restore();
    }
}

impl<C: Canvas + ?Sized> fmt::Debug for ScopedSave<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ScopedSave { .. }")
    }
}
