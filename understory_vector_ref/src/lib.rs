// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Vector Reference Engine.
//!
//! This crate provides a [`RasterEngine`] whose canvases record what they are
//! asked to do instead of rasterizing, and an [`ImageDecoder`] over images
//! held in memory.
//!
//! It is *not* a reference renderer:
//! - It does **not** touch the surface pixels.
//! - It is intended for tests and debugging that want to assert on the
//!   canvas calls a render pass makes and the canvas state at each draw.

#![no_std]

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use kurbo::{Affine, BezPath, Point, Shape};
use peniko::{Brush, Fill};
use understory_vector::{
    Canvas, CanvasError, ColorFormat, DecodeError, DecoderArgs, DrawBuf, FPoint, ImageDecoder,
    ImageSrc, RasterEngine, RectF, StrokeStyle, Surface, mix_opa,
};

/// Snapshot of the canvas state.
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    /// Geometry transform.
    pub transform: Affine,
    /// Device-space clip bounds, if any clip is active.
    pub clip: Option<RectF>,
    /// Number of open `save` scopes.
    pub save_depth: u32,
    /// Opacity in `0..=1`.
    pub opacity: f32,
    /// Fill rule.
    pub fill_rule: Fill,
    /// Current paint, if set.
    pub brush: Option<Brush>,
    /// Paint-space transform of `brush`.
    pub paint_transform: Affine,
    /// Current stroke style, if set.
    pub stroke: Option<StrokeStyle>,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            clip: None,
            save_depth: 0,
            opacity: 1.0,
            fill_rule: Fill::NonZero,
            brush: None,
            paint_transform: Affine::IDENTITY,
            stroke: None,
        }
    }
}

/// Canvas call that changes state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateOp {
    /// `save`.
    Save,
    /// `restore`.
    Restore,
    /// `reset_transform`.
    ResetTransform,
    /// `set_transform`.
    SetTransform(Affine),
    /// `clip_rect`, in user space.
    ClipRect(RectF),
    /// `set_opacity`.
    SetOpacity(f32),
    /// `set_fill_rule`.
    SetFillRule(Fill),
    /// `set_brush`.
    SetBrush(Brush, Affine),
    /// `set_stroke`.
    SetStroke(StrokeStyle),
    /// `new_path`.
    NewPath,
}

/// Canvas call that produces pixels.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    /// `fill_preserve` with the current path in user space.
    FillPath(BezPath),
    /// `stroke` with the current path in user space.
    StrokePath(BezPath),
    /// `fill_rect`, in user space.
    FillRect(RectF),
    /// `flush`.
    Flush,
}

/// Event recorded by a [`RefCanvas`].
#[derive(Clone, Debug)]
pub enum Event {
    /// State operation and the resulting state snapshot.
    State {
        /// State operation that was applied.
        op: StateOp,
        /// Snapshot after applying the state operation.
        state: StateSnapshot,
    },
    /// Draw operation and the state snapshot used for drawing.
    Draw {
        /// Draw operation that was applied.
        op: DrawOp,
        /// Snapshot at the time of drawing.
        state: StateSnapshot,
    },
}

/// Everything one canvas recorded between creation and drop.
#[derive(Clone, Debug, Default)]
pub struct Pass {
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Surface stride in bytes.
    pub stride: u32,
    /// Log of events in the order they were applied.
    pub events: Vec<Event>,
}

impl Pass {
    /// Draw operations in order.
    pub fn draws(&self) -> impl Iterator<Item = (&DrawOp, &StateSnapshot)> {
        self.events.iter().filter_map(|e| match e {
            Event::Draw { op, state } => Some((op, state)),
            Event::State { .. } => None,
        })
    }
}

/// Engine handing out recording canvases.
#[derive(Debug, Default)]
pub struct RefEngine {
    passes: Vec<Pass>,
    max_dimension: Option<u32>,
}

impl RefEngine {
    /// Create an engine accepting surfaces of any size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine refusing surfaces wider or taller than `max`.
    pub fn with_max_dimension(max: u32) -> Self {
        Self {
            passes: Vec::new(),
            max_dimension: Some(max),
        }
    }

    /// Passes recorded by canvases that have been dropped.
    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }
}

impl RasterEngine for RefEngine {
    type Canvas<'s>
        = RefCanvas<'s>
    where
        Self: 's;

    fn create_canvas<'s>(
        &'s mut self,
        surface: Surface<'s>,
    ) -> Result<Self::Canvas<'s>, CanvasError> {
        let (width, height) = (surface.width(), surface.height());
        if self
            .max_dimension
            .is_some_and(|max| width > max || height > max)
        {
            return Err(CanvasError::SurfaceTooLarge { width, height });
        }
        Ok(RefCanvas {
            passes: &mut self.passes,
            pass: Pass {
                width,
                height,
                stride: surface.stride(),
                events: Vec::new(),
            },
            state: StateSnapshot::default(),
            stack: Vec::new(),
            path: BezPath::new(),
        })
    }
}

/// Canvas recording [`Event`]s. The pass is handed to the engine on drop.
pub struct RefCanvas<'s> {
    passes: &'s mut Vec<Pass>,
    pass: Pass,
    state: StateSnapshot,
    stack: Vec<StateSnapshot>,
    path: BezPath,
}

impl core::fmt::Debug for RefCanvas<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RefCanvas")
            .field("pass", &self.pass)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl RefCanvas<'_> {
    /// Events recorded so far.
    pub fn events(&self) -> &[Event] {
        &self.pass.events
    }

    /// Current state.
    pub fn state(&self) -> &StateSnapshot {
        &self.state
    }

    fn push_state(&mut self, op: StateOp) {
        self.pass.events.push(Event::State {
            op,
            state: self.state.clone(),
        });
    }

    fn push_draw(&mut self, op: DrawOp) {
        self.pass.events.push(Event::Draw {
            op,
            state: self.state.clone(),
        });
    }
}

impl Drop for RefCanvas<'_> {
    fn drop(&mut self) {
        self.passes.push(core::mem::take(&mut self.pass));
    }
}

fn pt(p: FPoint) -> Point {
    p.to_kurbo()
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "canvas geometry is single precision"
)]
fn rect_from_kurbo(r: kurbo::Rect) -> RectF {
    RectF::new(r.x0 as f32, r.y0 as f32, r.x1 as f32, r.y1 as f32)
}

impl Canvas for RefCanvas<'_> {
    fn save(&mut self) {
        self.stack.push(self.state.clone());
        self.state.save_depth += 1;
        self.push_state(StateOp::Save);
    }

    fn restore(&mut self) {
        if let Some(saved) = self.stack.pop() {
            self.state = saved;
        }
        self.push_state(StateOp::Restore);
    }

    fn reset_transform(&mut self) {
        self.state.transform = Affine::IDENTITY;
        self.push_state(StateOp::ResetTransform);
    }

    fn set_transform(&mut self, transform: Affine) {
        self.state.transform = transform;
        self.push_state(StateOp::SetTransform(transform));
    }

    fn clip_rect(&mut self, rect: RectF) {
        let device = rect_from_kurbo(self.state.transform.transform_rect_bbox(rect.to_kurbo()));
        self.state.clip = Some(match self.state.clip {
            Some(c) => RectF::new(
                c.x0.max(device.x0),
                c.y0.max(device.y0),
                c.x1.min(device.x1),
                c.y1.min(device.y1),
            ),
            None => device,
        });
        self.push_state(StateOp::ClipRect(rect));
    }

    fn new_path(&mut self) {
        self.path.truncate(0);
        self.push_state(StateOp::NewPath);
    }

    fn move_to(&mut self, p: FPoint) {
        self.path.move_to(pt(p));
    }

    fn line_to(&mut self, p: FPoint) {
        self.path.line_to(pt(p));
    }

    fn quad_to(&mut self, c: FPoint, p: FPoint) {
        self.path.quad_to(pt(c), pt(p));
    }

    fn cubic_to(&mut self, c1: FPoint, c2: FPoint, p: FPoint) {
        self.path.curve_to(pt(c1), pt(c2), pt(p));
    }

    fn close_path(&mut self) {
        self.path.close_path();
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.state.opacity = opacity;
        self.push_state(StateOp::SetOpacity(opacity));
    }

    fn set_fill_rule(&mut self, rule: Fill) {
        self.state.fill_rule = rule;
        self.push_state(StateOp::SetFillRule(rule));
    }

    fn set_brush(&mut self, brush: Brush, paint_transform: Affine) {
        self.state.brush = Some(brush.clone());
        self.state.paint_transform = paint_transform;
        self.push_state(StateOp::SetBrush(brush, paint_transform));
    }

    fn set_stroke(&mut self, style: StrokeStyle) {
        self.state.stroke = Some(style.clone());
        self.push_state(StateOp::SetStroke(style));
    }

    fn fill_extents(&self) -> RectF {
        if self.path.elements().is_empty() {
            return RectF::default();
        }
        rect_from_kurbo(self.path.bounding_box())
    }

    fn fill_preserve(&mut self) {
        self.push_draw(DrawOp::FillPath(self.path.clone()));
    }

    fn stroke(&mut self) {
        let path = core::mem::take(&mut self.path);
        self.push_draw(DrawOp::StrokePath(path));
    }

    fn fill_rect(&mut self, rect: RectF) {
        self.push_draw(DrawOp::FillRect(rect));
    }

    fn flush(&mut self) {
        self.push_draw(DrawOp::Flush);
    }
}

/// Decoder over named images held in memory.
///
/// Straight-alpha [`ColorFormat::Argb8888`] images are premultiplied when
/// [`DecoderArgs::premultiply`] is set; other formats are returned as stored.
#[derive(Debug, Default)]
pub struct MemoryDecoder {
    images: BTreeMap<String, Option<Arc<DrawBuf>>>,
    opened: usize,
    closed: usize,
}

impl MemoryDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoded image under `name`.
    pub fn insert(&mut self, name: &str, image: DrawBuf) {
        self.images.insert(name.into(), Some(Arc::new(image)));
    }

    /// Register `name` as known but not decoded yet.
    pub fn insert_pending(&mut self, name: &str) {
        self.images.insert(name.into(), None);
    }

    /// Number of successful opens.
    pub fn opened(&self) -> usize {
        self.opened
    }

    /// Number of closes.
    pub fn closed(&self) -> usize {
        self.closed
    }

    fn prepare(image: &DrawBuf, args: &DecoderArgs) -> DrawBuf {
        let mut out = image.clone();
        if args.premultiply && out.format() == ColorFormat::Argb8888 {
            for y in 0..out.height() {
                if let Some(row) = out.row_mut(y) {
                    for px in row.chunks_exact_mut(4) {
                        let a = px[3];
                        for c in &mut px[..3] {
                            *c = mix_opa(*c, a);
                        }
                    }
                }
            }
            out.header.format = ColorFormat::Argb8888Premultiplied;
        }
        out
    }
}

impl ImageDecoder for MemoryDecoder {
    fn open(&mut self, src: &ImageSrc, args: &DecoderArgs) -> Result<Option<DrawBuf>, DecodeError> {
        let image = match src {
            ImageSrc::File(name) => self.images.get(&**name).cloned().ok_or(DecodeError::Open)?,
            ImageSrc::Buffer(buf) => Some(Arc::clone(buf)),
        };
        self.opened += 1;
        Ok(image.map(|image| Self::prepare(&image, args)))
    }

    fn close(&mut self, _src: &ImageSrc) {
        self.closed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use understory_vector::{DrawTask, FillDesc, RectI, TaskQueue, VectorPath, draw_tasks};

    fn bind<'a>(engine: &'a mut RefEngine, data: &'a mut [u8]) -> RefCanvas<'a> {
        let surface = Surface::new(data, 4, 4, 16).unwrap();
        engine.create_canvas(surface).unwrap()
    }

    #[test]
    fn pass_is_recorded_on_drop() {
        let mut engine = RefEngine::new();
        let mut data = vec![0_u8; 64];
        {
            let mut canvas = bind(&mut engine, &mut data);
            canvas.fill_rect(RectF::new(0.0, 0.0, 1.0, 1.0));
            canvas.flush();
            assert_eq!(canvas.events().len(), 2);
        }
        let [pass] = engine.passes() else {
            panic!("expected one pass");
        };
        assert_eq!((pass.width, pass.height, pass.stride), (4, 4, 16));
        assert_eq!(pass.draws().count(), 2);
    }

    #[test]
    fn restore_pops_state() {
        let mut engine = RefEngine::new();
        let mut data = vec![0_u8; 64];
        let mut canvas = bind(&mut engine, &mut data);
        canvas.save();
        canvas.set_transform(Affine::scale(2.0));
        canvas.clip_rect(RectF::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(canvas.state().clip, Some(RectF::new(0.0, 0.0, 2.0, 2.0)));
        assert_eq!(canvas.state().save_depth, 1);
        canvas.restore();
        assert_eq!(canvas.state().transform, Affine::IDENTITY);
        assert_eq!(canvas.state().clip, None);
        assert_eq!(canvas.state().save_depth, 0);
    }

    #[test]
    fn fill_extents_are_in_user_space() {
        let mut engine = RefEngine::new();
        let mut data = vec![0_u8; 64];
        let mut canvas = bind(&mut engine, &mut data);
        assert_eq!(canvas.fill_extents(), RectF::default());
        canvas.set_transform(Affine::translate((100.0, 100.0)));
        canvas.move_to(FPoint::new(2.0, 3.0));
        canvas.line_to(FPoint::new(6.0, 1.0));
        assert_eq!(canvas.fill_extents(), RectF::new(2.0, 1.0, 6.0, 3.0));
    }

    #[test]
    fn fill_keeps_path_and_stroke_consumes_it() {
        let mut engine = RefEngine::new();
        let mut data = vec![0_u8; 64];
        {
            let mut canvas = bind(&mut engine, &mut data);
            let mut path = VectorPath::new();
            path.append_rect(0.0, 0.0, 2.0, 2.0);
            understory_vector::add_path_to_canvas(&mut canvas, &path);
            canvas.fill_preserve();
            canvas.stroke();
            canvas.fill_preserve();
        }
        let draws: Vec<_> = engine.passes()[0].draws().map(|(op, _)| op.clone()).collect();
        let [DrawOp::FillPath(a), DrawOp::StrokePath(b), DrawOp::FillPath(c)] = draws.as_slice()
        else {
            panic!("unexpected draws {draws:?}");
        };
        assert_eq!(a, b);
        assert!(!a.elements().is_empty());
        assert!(c.elements().is_empty());
    }

    #[test]
    fn oversized_surface_is_refused() {
        let mut engine = RefEngine::with_max_dimension(2);
        let mut data = vec![0_u8; 64];
        let surface = Surface::new(&mut data, 4, 4, 16).unwrap();
        assert!(matches!(
            engine.create_canvas(surface),
            Err(CanvasError::SurfaceTooLarge {
                width: 4,
                height: 4
            })
        ));
    }

    #[test]
    fn draw_tasks_leaves_no_open_scope() {
        let mut engine = RefEngine::new();
        let mut data = vec![0_u8; 64];
        let mut decoder = MemoryDecoder::new();
        {
            let mut canvas = bind(&mut engine, &mut data);
            let mut path = VectorPath::new();
            path.append_rect(0.0, 0.0, 2.0, 2.0);
            let tasks: TaskQueue = [
                DrawTask::draw(path, RectI::new(0, 0, 4, 4)),
                DrawTask::clear(RectI::new(0, 0, 4, 4), FillDesc::default()),
            ]
            .into_iter()
            .collect();
            draw_tasks(&mut canvas, &mut decoder, tasks, (0, 0), 255);
            assert_eq!(canvas.state().save_depth, 0);
        }
        let pass = &engine.passes()[0];
        assert!(pass.draws().all(|(_, state)| state.save_depth == 1));
    }

    #[test]
    fn decoder_premultiplies_straight_alpha() {
        let mut image = DrawBuf::new(1, 1, ColorFormat::Argb8888);
        image.data_mut().copy_from_slice(&[200_u8, 100, 50, 128]);
        let mut decoder = MemoryDecoder::new();
        decoder.insert("a", image);

        let src = ImageSrc::File(Arc::from("a"));
        let out = decoder
            .open(&src, &DecoderArgs::PREMULTIPLIED)
            .unwrap()
            .unwrap();
        decoder.close(&src);
        assert_eq!(out.format(), ColorFormat::Argb8888Premultiplied);
        assert_eq!(out.data(), &[100_u8, 50, 25, 128]);
        assert_eq!((decoder.opened(), decoder.closed()), (1, 1));

        let missing = ImageSrc::File(Arc::from("b"));
        assert_eq!(
            decoder.open(&missing, &DecoderArgs::PREMULTIPLIED),
            Err(DecodeError::Open)
        );
        assert_eq!(decoder.opened(), 1);
    }
}
