// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw tasks and the per-task canvas state machine.
//!
//! Each task is drawn inside its own saved canvas state:
//!
//! - A task without a path is a *clear*: the fill color is painted over the
//!   task's clip rectangle in device space, ignoring the task transform.
//! - A task with a path is clipped, transformed, and then filled and/or
//!   stroked. The fill keeps the path so the stroke reuses the same
//!   geometry.

use alloc::collections::VecDeque;
use alloc::collections::vec_deque;

use kurbo::Affine;
use peniko::Brush;

use crate::canvas::{Canvas, ScopedSave};
use crate::decoder::ImageDecoder;
use crate::draw_buf::RectI;
use crate::matrix::Matrix;
use crate::paint::{
    FillDesc, FillPaint, OPA_MIN, Opa, StrokeDesc, mix_opa, set_fill_paint, set_stroke_paint,
    solid_color,
};
use crate::path::{VectorPath, add_path_to_canvas};

/// One unit of vector drawing work.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrawTask {
    /// Geometry to draw. `None` makes this a clear of `clip`.
    pub path: Option<VectorPath>,
    /// Fill descriptor. For clears only the solid color and alpha are used.
    pub fill: FillDesc,
    /// Stroke descriptor.
    pub stroke: StrokeDesc,
    /// Transform from path coordinates to layer coordinates.
    pub transform: Matrix,
    /// Clip rectangle in layer coordinates.
    pub clip: RectI,
}

impl DrawTask {
    /// A task drawing `path` clipped to `clip`, with default fill and stroke.
    pub fn draw(path: VectorPath, clip: RectI) -> Self {
        Self {
            path: Some(path),
            clip,
            ..Self::default()
        }
    }

    /// A task clearing `clip` with `fill`.
    pub fn clear(clip: RectI, fill: FillDesc) -> Self {
        Self {
            path: None,
            fill,
            clip,
            ..Self::default()
        }
    }

    /// Replace the fill descriptor.
    #[must_use]
    pub fn with_fill(mut self, fill: FillDesc) -> Self {
        self.fill = fill;
        self
    }

    /// Replace the stroke descriptor.
    #[must_use]
    pub fn with_stroke(mut self, stroke: StrokeDesc) -> Self {
        self.stroke = stroke;
        self
    }

    /// Replace the transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Matrix) -> Self {
        self.transform = transform;
        self
    }
}

/// First-in first-out queue of [`DrawTask`]s.
///
/// The renderer takes the queue by value and drains it, so a queue cannot be
/// replayed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskQueue {
    tasks: VecDeque<DrawTask>,
}

impl TaskQueue {
    /// Create an empty queue.
    #[inline]
    pub const fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    /// Append a task.
    #[inline]
    pub fn push(&mut self, task: DrawTask) {
        self.tasks.push_back(task);
    }

    /// Number of queued tasks.
    #[inline]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl IntoIterator for TaskQueue {
    type Item = DrawTask;
    type IntoIter = vec_deque::IntoIter<DrawTask>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.into_iter()
    }
}

impl FromIterator<DrawTask> for TaskQueue {
    fn from_iter<I: IntoIterator<Item = DrawTask>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

impl Extend<DrawTask> for TaskQueue {
    fn extend<I: IntoIterator<Item = DrawTask>>(&mut self, iter: I) {
        self.tasks.extend(iter);
    }
}

/// Drain `tasks` onto `canvas` in queue order.
///
/// `origin` is the device origin: added to layer coordinates it yields
/// pixel coordinates on the canvas surface. `opa` is the pass-wide opacity.
/// Canvas state is the same after the call as before it. The canvas is not
/// flushed.
pub fn draw_tasks<C, D>(
    canvas: &mut C,
    decoder: &mut D,
    tasks: TaskQueue,
    origin: (i32, i32),
    opa: Opa,
) where
    C: Canvas + ?Sized,
    D: ImageDecoder + ?Sized,
{
    log::debug!("drawing {} vector task(s), opacity {opa}", tasks.len());
    for task in tasks {
        draw_task(canvas, decoder, &task, origin, opa);
    }
}

fn draw_task<C, D>(
    canvas: &mut C,
    decoder: &mut D,
    task: &DrawTask,
    origin: (i32, i32),
    opa: Opa,
) where
    C: Canvas + ?Sized,
    D: ImageDecoder + ?Sized,
{
    let mut canvas = ScopedSave::new(canvas);
    let clip = task.clip.translate(origin.0, origin.1).to_f32();
    let opacity = f32::from(opa) / 255.0;

    let Some(path) = &task.path else {
        canvas.reset_transform();
        let color = match &task.fill.paint {
            FillPaint::Solid(color) => solid_color(*color, mix_opa(task.fill.opa, opa)),
            _ => {
                log::debug!("clear task with a non-solid fill; painting transparent");
                peniko::Color::TRANSPARENT
            }
        };
        canvas.set_brush(Brush::Solid(color), Affine::IDENTITY);
        canvas.set_opacity(opacity);
        canvas.fill_rect(clip);
        return;
    };

    canvas.reset_transform();
    canvas.clip_rect(clip);

    let mut transform = Matrix::identity();
    transform.translate(origin.0 as f32, origin.1 as f32);
    transform.multiply(&task.transform);
    canvas.set_transform(transform.to_kurbo());

    add_path_to_canvas(&mut *canvas, path);
    canvas.set_opacity(opacity);

    if task.fill.opa > OPA_MIN {
        match set_fill_paint(&mut *canvas, decoder, &task.fill, opa) {
            Ok(()) => canvas.fill_preserve(),
            Err(err) => log::error!("skipping pattern fill: {err}"),
        }
    }

    if task.stroke.opa > OPA_MIN && task.stroke.width > 0.0 {
        set_stroke_paint(&mut *canvas, &task.stroke, opa);
        canvas.stroke();
    } else {
        canvas.new_path();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RectF;
    use crate::canvas::tests::{BrushKind, Call, TraceCanvas};
    use crate::decoder::ImageSrc;
    use crate::decoder::tests::MapDecoder;
    use crate::paint::{FillUnits, OPA_COVER, Pattern, StrokePaint};
    use alloc::sync::Arc;
    use alloc::vec;
    use alloc::vec::Vec;
    use peniko::Color;
    use peniko::color::Rgba8;

    const RED: Rgba8 = Rgba8 {
        r: 255,
        g: 0,
        b: 0,
        a: 255,
    };

    fn square() -> VectorPath {
        let mut p = VectorPath::new();
        p.append_rect(10.0, 10.0, 20.0, 20.0);
        p
    }

    fn solid_fill(opa: Opa) -> FillDesc {
        FillDesc {
            paint: FillPaint::Solid(RED),
            opa,
            ..FillDesc::default()
        }
    }

    fn stroke(opa: Opa, width: f32) -> StrokeDesc {
        StrokeDesc {
            paint: StrokePaint::Solid(RED),
            opa,
            width,
            ..StrokeDesc::default()
        }
    }

    fn run(tasks: TaskQueue, origin: (i32, i32), opa: Opa) -> TraceCanvas {
        let mut canvas = TraceCanvas::default();
        draw_tasks(&mut canvas, &mut MapDecoder::default(), tasks, origin, opa);
        canvas
    }

    fn kinds(calls: &[Call]) -> Vec<&'static str> {
        calls
            .iter()
            .map(|c| match c {
                Call::Save => "save",
                Call::Restore => "restore",
                Call::ResetTransform => "reset",
                Call::SetTransform(_) => "transform",
                Call::ClipRect(_) => "clip",
                Call::NewPath => "new_path",
                Call::MoveTo(_)
                | Call::LineTo(_)
                | Call::QuadTo(..)
                | Call::CubicTo(..)
                | Call::ClosePath => "seg",
                Call::SetOpacity(_) => "opacity",
                Call::SetFillRule(_) => "rule",
                Call::SetBrush(..) => "brush",
                Call::SetStroke(_) => "stroke_style",
                Call::FillPreserve => "fill",
                Call::Stroke => "stroke",
                Call::FillRect(_) => "fill_rect",
                Call::Flush => "flush",
            })
            .collect()
    }

    #[test]
    fn clear_fills_device_clip_only() {
        let tasks = [DrawTask::clear(RectI::new(10, 10, 50, 50), solid_fill(OPA_COVER))]
            .into_iter()
            .collect();
        let canvas = run(tasks, (-5, -2), 128);
        assert_eq!(
            canvas.calls,
            vec![
                Call::Save,
                Call::ResetTransform,
                Call::SetBrush(
                    BrushKind::Solid(Color::from_rgba8(255, 0, 0, 128)),
                    Affine::IDENTITY
                ),
                Call::SetOpacity(128.0 / 255.0),
                Call::FillRect(RectF::new(5.0, 8.0, 45.0, 48.0)),
                Call::Restore,
            ]
        );
    }

    #[test]
    fn fill_then_stroke_reuses_path() {
        let task = DrawTask::draw(square(), RectI::new(0, 0, 100, 100))
            .with_fill(solid_fill(OPA_COVER))
            .with_stroke(stroke(OPA_COVER, 2.0));
        let canvas = run([task].into_iter().collect(), (0, 0), OPA_COVER);
        assert_eq!(
            kinds(&canvas.calls),
            vec![
                "save", "reset", "clip", "transform", "new_path", "seg", "seg", "seg", "seg",
                "seg", "opacity", "rule", "brush", "fill", "brush", "stroke_style", "stroke",
                "restore",
            ]
        );
    }

    #[test]
    fn invisible_fill_and_stroke_discard_path() {
        let task = DrawTask::draw(square(), RectI::new(0, 0, 100, 100))
            .with_fill(solid_fill(OPA_MIN))
            .with_stroke(stroke(OPA_COVER, 0.0));
        let canvas = run([task].into_iter().collect(), (0, 0), OPA_COVER);
        assert_eq!(canvas.count(|c| matches!(c, Call::FillPreserve)), 0);
        assert_eq!(canvas.count(|c| matches!(c, Call::Stroke)), 0);
        assert_eq!(canvas.calls[canvas.calls.len() - 2], Call::NewPath);
        assert_eq!(canvas.calls.last(), Some(&Call::Restore));
    }

    #[test]
    fn stroke_only_when_fill_is_transparent() {
        let task = DrawTask::draw(square(), RectI::new(0, 0, 100, 100))
            .with_fill(solid_fill(0))
            .with_stroke(stroke(OPA_MIN + 1, 1.0));
        let canvas = run([task].into_iter().collect(), (0, 0), OPA_COVER);
        assert_eq!(canvas.count(|c| matches!(c, Call::FillPreserve)), 0);
        assert_eq!(canvas.count(|c| matches!(c, Call::Stroke)), 1);
    }

    #[test]
    fn geometry_transform_is_origin_then_local() {
        let mut local = Matrix::identity();
        local.scale(2.0, 2.0);
        let task = DrawTask::draw(square(), RectI::new(20, 30, 60, 70)).with_transform(local);
        let canvas = run([task].into_iter().collect(), (-20, -30), OPA_COVER);
        assert!(canvas.calls.contains(&Call::ClipRect(RectF::new(0.0, 0.0, 40.0, 40.0))));
        assert!(canvas.calls.contains(&Call::SetTransform(Affine::new([
            2.0, 0.0, 0.0, 2.0, -20.0, -30.0
        ]))));
    }

    #[test]
    fn failed_pattern_skips_fill_but_not_stroke() {
        let fill = FillDesc {
            paint: FillPaint::Pattern(Pattern {
                src: ImageSrc::File(Arc::from("missing")),
                opa: OPA_COVER,
                transform: Matrix::identity(),
                units: FillUnits::Absolute,
            }),
            ..FillDesc::default()
        };
        let tasks: TaskQueue = [
            DrawTask::draw(square(), RectI::new(0, 0, 100, 100))
                .with_fill(fill)
                .with_stroke(stroke(OPA_COVER, 1.0)),
            DrawTask::draw(square(), RectI::new(0, 0, 100, 100)),
        ]
        .into_iter()
        .collect();
        let canvas = run(tasks, (0, 0), OPA_COVER);
        // Only the second task fills; both stroke.
        assert_eq!(canvas.count(|c| matches!(c, Call::FillPreserve)), 1);
        assert_eq!(canvas.count(|c| matches!(c, Call::Stroke)), 2);
    }

    #[test]
    fn every_task_is_bracketed_in_order() {
        let tasks: TaskQueue = [
            DrawTask::clear(RectI::new(0, 0, 1, 1), solid_fill(OPA_COVER)),
            DrawTask::draw(square(), RectI::new(0, 0, 100, 100)),
            DrawTask::clear(RectI::new(0, 0, 2, 2), solid_fill(OPA_COVER)),
        ]
        .into_iter()
        .collect();
        let canvas = run(tasks, (0, 0), OPA_COVER);
        let brackets: Vec<_> = canvas
            .calls
            .iter()
            .filter(|c| matches!(c, Call::Save | Call::Restore | Call::FillRect(_)))
            .cloned()
            .collect();
        assert_eq!(
            brackets,
            vec![
                Call::Save,
                Call::FillRect(RectF::new(0.0, 0.0, 1.0, 1.0)),
                Call::Restore,
                Call::Save,
                Call::Restore,
                Call::Save,
                Call::FillRect(RectF::new(0.0, 0.0, 2.0, 2.0)),
                Call::Restore,
            ]
        );
    }

    #[test]
    fn queue_is_fifo() {
        let mut queue = TaskQueue::new();
        assert!(queue.is_empty());
        queue.push(DrawTask::clear(RectI::new(0, 0, 1, 1), FillDesc::default()));
        queue.extend([DrawTask::draw(square(), RectI::default())]);
        assert_eq!(queue.len(), 2);
        let order: Vec<bool> = queue.into_iter().map(|t| t.path.is_some()).collect();
        assert_eq!(order, vec![false, true]);
    }
}
