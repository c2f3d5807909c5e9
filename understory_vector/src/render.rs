// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding a canvas to a destination layer.
//!
//! Native 32-bit layers are drawn into directly. RGB565, RGB565A8 and
//! RGB888 layers are drawn into a zeroed premultiplied scratch surface first,
//! which is then composited source-over into the layer. Other formats are
//! left untouched.

use crate::blend::{blend_row_to_rgb565, blend_row_to_rgb888};
use crate::canvas::{Canvas, RasterEngine, Surface};
use crate::decoder::ImageDecoder;
use crate::draw_buf::{ColorFormat, DrawBuf, RectI};
use crate::paint::Opa;
use crate::task::{TaskQueue, draw_tasks};

/// A destination for one render pass.
#[derive(Debug)]
pub struct Layer<'a> {
    /// Pixel buffer. With no buffer a render pass does nothing.
    pub buf: Option<&'a mut DrawBuf>,
    /// Region of layer coordinates the buffer covers. Pixel `(0, 0)` of the
    /// buffer is `(area.x0, area.y0)`.
    pub area: RectI,
}

impl<'a> Layer<'a> {
    /// A layer whose buffer covers `area`.
    #[inline]
    pub fn new(buf: &'a mut DrawBuf, area: RectI) -> Self {
        Self {
            buf: Some(buf),
            area,
        }
    }

    /// Offset that maps layer coordinates to buffer pixels.
    #[inline]
    pub fn device_origin(&self) -> (i32, i32) {
        (-self.area.x0, -self.area.y0)
    }
}

/// Draw every task in `tasks` onto `layer`, consuming the queue.
///
/// `opa` is applied to the whole pass. Failures never propagate: an
/// undersized buffer or a surface the engine refuses is logged and the
/// layer is left unchanged, and a failed pattern fill only skips that fill.
pub fn render_vector<E, D>(
    engine: &mut E,
    decoder: &mut D,
    layer: &mut Layer<'_>,
    tasks: TaskQueue,
    opa: Opa,
) where
    E: RasterEngine + ?Sized,
    D: ImageDecoder + ?Sized,
{
    if tasks.is_empty() {
        return;
    }
    let origin = layer.device_origin();
    let area = layer.area;
    let Some(buf) = layer.buf.as_deref_mut() else {
        return;
    };
    let (Ok(width @ 1..), Ok(height @ 1..)) =
        (u32::try_from(area.width()), u32::try_from(area.height()))
    else {
        log::debug!("empty layer area {area:?}; nothing to draw");
        return;
    };
    if width > buf.width() || height > buf.height() {
        log::error!(
            "layer buffer {}x{} is smaller than its area {width}x{height}",
            buf.width(),
            buf.height()
        );
        return;
    }

    let format = buf.format();
    if format.is_native() {
        let stride = buf.stride();
        let surface = match Surface::new(buf.data_mut(), width, height, stride) {
            Ok(surface) => surface,
            Err(err) => {
                log::error!("cannot bind layer buffer: {err}");
                return;
            }
        };
        run_pass(engine, decoder, surface, tasks, origin, opa);
        return;
    }

    let blend_row: fn(&mut [u8], &[u8]) = match format {
        ColorFormat::Rgb565 | ColorFormat::Rgb565A8 => blend_row_to_rgb565,
        ColorFormat::Rgb888 => blend_row_to_rgb888,
        _ => {
            log::trace!("no blend routine for {format:?}; layer left unchanged");
            return;
        }
    };
    log::debug!("drawing {format:?} layer through a {width}x{height} scratch surface");

    let mut scratch = DrawBuf::new(width, height, ColorFormat::Argb8888Premultiplied);
    let scratch_stride = scratch.stride();
    let surface = match Surface::new(scratch.data_mut(), width, height, scratch_stride) {
        Ok(surface) => surface,
        Err(err) => {
            log::error!("cannot bind scratch surface: {err}");
            return;
        }
    };
    if !run_pass(engine, decoder, surface, tasks, origin, opa) {
        return;
    }

    let row_len = width as usize * format.pixel_size() as usize;
    for y in 0..height {
        if let (Some(dst), Some(src)) = (buf.row_mut(y), scratch.row(y)) {
            blend_row(&mut dst[..row_len], src);
        }
    }
}

/// Bind a canvas to `surface`, draw, and flush. Returns `false` if the
/// engine refused the surface.
fn run_pass<E, D>(
    engine: &mut E,
    decoder: &mut D,
    surface: Surface<'_>,
    tasks: TaskQueue,
    origin: (i32, i32),
    opa: Opa,
) -> bool
where
    E: RasterEngine + ?Sized,
    D: ImageDecoder + ?Sized,
{
    let mut canvas = match engine.create_canvas(surface) {
        Ok(canvas) => canvas,
        Err(err) => {
            log::error!("raster engine refused surface: {err}");
            return false;
        }
    };
    draw_tasks(&mut canvas, decoder, tasks, origin, opa);
    canvas.flush();
    true
}
