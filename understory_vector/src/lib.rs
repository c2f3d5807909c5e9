// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Vector: backend-agnostic vector drawing tasks rendered onto a 2D raster canvas.
//!
//! A producer (scene graph, widget layer) builds a [`TaskQueue`] of
//! [`DrawTask`]s: paths with fill and stroke descriptors, clip rectangles,
//! local transforms, and "clear" tasks without a path. [`render_vector`]
//! consumes the queue and draws it onto a destination [`Layer`] through a
//! [`RasterEngine`], the seam to an external rasterizer.
//!
//! # Components
//!
//! - [`Matrix`]: single-precision 3×3 affine algebra. Operations compose in
//!   the local frame (`self = self * op`).
//! - [`VectorPath`] and [`add_path_to_canvas`]: op-code/point streams replayed
//!   as canvas path calls.
//! - [`FillDesc`], [`StrokeDesc`] and [`set_fill_paint`]/[`set_stroke_paint`]:
//!   solid, gradient, and image-pattern paint resolution with two-stage
//!   alpha ([`mix_opa`]).
//! - [`draw_tasks`]: the per-task state machine (save, clip, transform,
//!   fill, stroke, restore).
//! - [`render_vector`]: binds the canvas to the layer buffer directly for
//!   32-bit formats, or through a scratch surface and a source-over blend
//!   for RGB565 and RGB888.
//!
//! Image patterns are decoded through the [`ImageDecoder`] seam.
//!
//! # Example
//!
//! ```
//! use understory_vector::{
//!     DrawTask, FillDesc, FillPaint, Matrix, RectI, Rgba8, StrokeDesc, TaskQueue, VectorPath,
//! };
//!
//! let mut path = VectorPath::new();
//! path.append_rect(10.0, 10.0, 40.0, 40.0);
//!
//! let mut transform = Matrix::identity();
//! transform.rotate(15.0);
//!
//! let mut tasks = TaskQueue::new();
//! tasks.push(DrawTask::clear(RectI::new(0, 0, 64, 64), FillDesc::default()));
//! tasks.push(
//!     DrawTask::draw(path, RectI::new(0, 0, 64, 64))
//!         .with_fill(FillDesc {
//!             paint: FillPaint::Solid(Rgba8 { r: 0, g: 160, b: 0, a: 255 }),
//!             ..FillDesc::default()
//!         })
//!         .with_stroke(StrokeDesc { width: 2.0, ..StrokeDesc::default() })
//!         .with_transform(transform),
//! );
//! assert_eq!(tasks.len(), 2);
//! // `render_vector(&mut engine, &mut decoder, &mut layer, tasks, 255)` draws them.
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod blend;
mod canvas;
mod decoder;
mod draw_buf;
mod matrix;
mod paint;
mod path;
mod render;
mod task;

pub use blend::{blend_row_to_argb8888, blend_row_to_rgb565, blend_row_to_rgb888, src_over_pixel};
pub use canvas::{Canvas, CanvasError, RasterEngine, RectF, SURFACE_BPP, ScopedSave, Surface};
pub use decoder::{DecodeError, DecoderArgs, DecoderSession, ImageDecoder, ImageSrc};
pub use draw_buf::{BufError, ColorFormat, DrawBuf, ImageHeader, RectI};
pub use matrix::Matrix;
pub use paint::{
    FillDesc, FillPaint, FillRule, FillUnits, Gradient, GradientKind, GradientSpread,
    GradientStop, OPA_COVER, OPA_MIN, OPA_TRANSP, Opa, Pattern, StrokeCap, StrokeDesc,
    StrokeJoin, StrokePaint, StrokeStyle, gradient_brush, mix_opa, set_fill_paint,
    set_stroke_paint, solid_color,
};
pub use path::{FPoint, PathOp, VectorPath, add_path_to_canvas};
pub use render::{Layer, render_vector};
pub use task::{DrawTask, TaskQueue, draw_tasks};

pub use peniko::color::Rgba8;
