// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vector paths as op-code streams and their replay onto a [`Canvas`].

use alloc::vec::Vec;

use crate::canvas::Canvas;

/// A 2D point in f32 coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FPoint {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
}

impl FPoint {
    /// Create a new point.
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Convert to kurbo's point type.
    #[inline]
    pub fn to_kurbo(self) -> kurbo::Point {
        kurbo::Point::new(f64::from(self.x), f64::from(self.y))
    }
}

impl From<(f32, f32)> for FPoint {
    #[inline]
    fn from((x, y): (f32, f32)) -> Self {
        Self::new(x, y)
    }
}

/// Path construction op-code.
///
/// Each op consumes a fixed number of points from the path's point
/// sequence; see [`PathOp::point_count`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathOp {
    /// Start a new subpath at one point.
    MoveTo,
    /// Line to one point.
    LineTo,
    /// Quadratic Bézier: control point, end point.
    QuadTo,
    /// Cubic Bézier: two control points, end point.
    CubicTo,
    /// Close the current subpath. Consumes no points.
    Close,
}

impl PathOp {
    /// Number of points this op consumes.
    #[inline]
    pub const fn point_count(self) -> usize {
        match self {
            Self::MoveTo | Self::LineTo => 1,
            Self::QuadTo => 2,
            Self::CubicTo => 3,
            Self::Close => 0,
        }
    }
}

/// An op-code stream paired with a flat point sequence.
///
/// A well-formed path has exactly as many points as the sum of
/// [`PathOp::point_count`] over its ops. Paths are read-only once handed to
/// the renderer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VectorPath {
    ops: Vec<PathOp>,
    points: Vec<FPoint>,
}

impl VectorPath {
    /// Create an empty path.
    #[inline]
    pub const fn new() -> Self {
        Self {
            ops: Vec::new(),
            points: Vec::new(),
        }
    }

    /// Build a path from raw parts without validating them.
    ///
    /// Malformed input does not cause out-of-bounds reads; replay stops at
    /// the first op whose points are missing.
    #[inline]
    pub fn from_parts(ops: Vec<PathOp>, points: Vec<FPoint>) -> Self {
        Self { ops, points }
    }

    /// Op-code sequence.
    #[inline]
    pub fn ops(&self) -> &[PathOp] {
        &self.ops
    }

    /// Flat point sequence.
    #[inline]
    pub fn points(&self) -> &[FPoint] {
        &self.points
    }

    /// Returns `true` if the path has no ops.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of points the op sequence requires.
    pub fn required_points(&self) -> usize {
        self.ops.iter().map(|op| op.point_count()).sum()
    }

    /// Returns `true` if the point sequence matches the op sequence exactly.
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.required_points() == self.points.len()
    }

    /// Begin a new subpath.
    pub fn move_to(&mut self, p: impl Into<FPoint>) {
        self.ops.push(PathOp::MoveTo);
        self.points.push(p.into());
    }

    /// Add a line segment.
    pub fn line_to(&mut self, p: impl Into<FPoint>) {
        self.ops.push(PathOp::LineTo);
        self.points.push(p.into());
    }

    /// Add a quadratic Bézier segment.
    pub fn quad_to(&mut self, ctrl: impl Into<FPoint>, end: impl Into<FPoint>) {
        self.ops.push(PathOp::QuadTo);
        self.points.extend([ctrl.into(), end.into()]);
    }

    /// Add a cubic Bézier segment.
    pub fn cubic_to(
        &mut self,
        ctrl1: impl Into<FPoint>,
        ctrl2: impl Into<FPoint>,
        end: impl Into<FPoint>,
    ) {
        self.ops.push(PathOp::CubicTo);
        self.points.extend([ctrl1.into(), ctrl2.into(), end.into()]);
    }

    /// Close the current subpath.
    pub fn close(&mut self) {
        self.ops.push(PathOp::Close);
    }

    /// Append a closed axis-aligned rectangle.
    pub fn append_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.move_to((x, y));
        self.line_to((x + w, y));
        self.line_to((x + w, y + h));
        self.line_to((x, y + h));
        self.close();
    }
}

/// Replay `path` onto the canvas as a fresh path.
///
/// Emits `new_path` followed by one canvas primitive per op. Point values
/// are threaded through untouched. If the point sequence runs short, replay
/// stops at the op that would read past it; this is a producer bug, logged
/// at `error` level.
pub fn add_path_to_canvas<C: Canvas + ?Sized>(canvas: &mut C, path: &VectorPath) {
    canvas.new_path();

    let points = path.points();
    let mut cursor = 0_usize;
    for op in path.ops() {
        let count = op.point_count();
        let Some(pts) = points.get(cursor..cursor + count) else {
            log::error!(
                "path op {op:?} needs {count} point(s) at index {cursor}, but only {} are present",
                points.len()
            );
            return;
        };
        match (op, pts) {
            (PathOp::MoveTo, [p]) => canvas.move_to(*p),
            (PathOp::LineTo, [p]) => canvas.line_to(*p),
            (PathOp::QuadTo, [c, p]) => canvas.quad_to(*c, *p),
            (PathOp::CubicTo, [c1, c2, p]) => canvas.cubic_to(*c1, *c2, *p),
            (PathOp::Close, []) => canvas.close_path(),
            (op, pts) => {
                log::error!("path op {op:?} paired with {} point(s)", pts.len());
                return;
            }
        }
        cursor += count;
    }
}
