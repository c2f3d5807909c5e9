// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fill and stroke descriptors, and their resolution into canvas paint state.
//!
//! Every alpha in a descriptor is combined with the pass-wide opacity using
//! [`mix_opa`], i.e. `round(a * g / 255)`.

use alloc::vec::Vec;

use kurbo::Affine;
use peniko::color::Rgba8;
use peniko::{
    Blob, Brush, Color, ColorStop, Extend, Fill, ImageAlphaType, ImageBrush, ImageData,
    ImageFormat, ImageSampler, LinearGradientPosition, RadialGradientPosition,
};

use crate::canvas::{Canvas, SURFACE_BPP};
use crate::decoder::{DecodeError, DecoderArgs, DecoderSession, ImageDecoder, ImageSrc};
use crate::draw_buf::ColorFormat;
use crate::matrix::Matrix;
use crate::path::FPoint;

/// Stroke style handed to the canvas.
///
/// This is a re-export of [`kurbo::Stroke`], which captures width, joins,
/// caps, dashes, and related stroke parameters.
pub type StrokeStyle = kurbo::Stroke;

/// Opacity in `0..=255`.
pub type Opa = u8;

/// Fully transparent.
pub const OPA_TRANSP: Opa = 0;
/// Alphas at or below this are treated as invisible when deciding whether
/// to fill or stroke at all.
pub const OPA_MIN: Opa = 2;
/// Fully opaque.
pub const OPA_COVER: Opa = 255;

/// Combine two alphas: `round(a * b / 255)`.
#[inline]
#[expect(
    clippy::cast_possible_truncation,
    reason = "the quotient is at most 255"
)]
pub const fn mix_opa(a: Opa, b: Opa) -> Opa {
    ((a as u32 * b as u32 + 127) / 255) as u8
}

/// How the ends of open subpaths are drawn.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StrokeCap {
    /// Flat end at the endpoint.
    #[default]
    Butt = 0,
    /// Square end extending half the width past the endpoint.
    Square = 1,
    /// Round end.
    Round = 2,
}

impl From<u8> for StrokeCap {
    /// Unrecognised raw values fall back to [`StrokeCap::Square`].
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Butt,
            1 => Self::Square,
            2 => Self::Round,
            _ => Self::Square,
        }
    }
}

impl StrokeCap {
    /// Map to kurbo's cap type.
    #[inline]
    pub fn to_kurbo(self) -> kurbo::Cap {
        match self {
            Self::Butt => kurbo::Cap::Butt,
            Self::Square => kurbo::Cap::Square,
            Self::Round => kurbo::Cap::Round,
        }
    }
}

/// How segments of a stroke are joined.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StrokeJoin {
    /// Sharp corner, limited by the miter limit.
    #[default]
    Miter = 0,
    /// Corner cut off flat.
    Bevel = 1,
    /// Rounded corner.
    Round = 2,
}

impl From<u8> for StrokeJoin {
    /// Unrecognised raw values fall back to [`StrokeJoin::Bevel`].
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Miter,
            1 => Self::Bevel,
            2 => Self::Round,
            _ => Self::Bevel,
        }
    }
}

impl StrokeJoin {
    /// Map to kurbo's join type.
    #[inline]
    pub fn to_kurbo(self) -> kurbo::Join {
        match self {
            Self::Miter => kurbo::Join::Miter,
            Self::Bevel => kurbo::Join::Bevel,
            Self::Round => kurbo::Join::Round,
        }
    }
}

/// Gradient extension beyond the stop range.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GradientSpread {
    /// Extend the edge colors.
    #[default]
    Pad = 0,
    /// Tile the gradient.
    Repeat = 1,
    /// Tile the gradient, mirroring every other repetition.
    Reflect = 2,
}

impl From<u8> for GradientSpread {
    /// Unrecognised raw values fall back to [`GradientSpread::Pad`].
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Pad,
            1 => Self::Repeat,
            2 => Self::Reflect,
            _ => Self::Pad,
        }
    }
}

impl GradientSpread {
    /// Map to peniko's extend mode.
    #[inline]
    pub fn to_peniko(self) -> Extend {
        match self {
            Self::Pad => Extend::Pad,
            Self::Repeat => Extend::Repeat,
            Self::Reflect => Extend::Reflect,
        }
    }
}

/// Rule deciding which regions of a self-intersecting path are inside.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FillRule {
    /// Non-zero winding.
    #[default]
    NonZero = 0,
    /// Even-odd.
    EvenOdd = 1,
}

impl From<u8> for FillRule {
    /// Unrecognised raw values fall back to [`FillRule::NonZero`].
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::NonZero,
            1 => Self::EvenOdd,
            _ => Self::NonZero,
        }
    }
}

impl FillRule {
    /// Map to peniko's fill rule.
    #[inline]
    pub fn to_peniko(self) -> Fill {
        match self {
            Self::NonZero => Fill::NonZero,
            Self::EvenOdd => Fill::EvenOdd,
        }
    }
}

/// Gradient geometry.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GradientKind {
    /// Linear gradient between two points.
    Linear {
        /// Position of offset 0.
        start: FPoint,
        /// Position of offset 1.
        end: FPoint,
    },
    /// Radial gradient from the center (offset 0) to the outer radius
    /// (offset 1). The focal point is always the center.
    Radial {
        /// Center of the gradient.
        center: FPoint,
        /// Outer radius.
        radius: f32,
    },
}

/// A gradient color stop.
///
/// Stops are passed to the canvas in the order given; duplicate or
/// decreasing offsets are not corrected.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GradientStop {
    /// Offset as a fraction of 255 (`0` is the start, `255` the end).
    pub frac: u8,
    /// Stop color; its alpha channel is the stop's own alpha.
    pub color: Rgba8,
}

/// A linear or radial gradient paint.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    /// Gradient geometry.
    pub kind: GradientKind,
    /// Ordered color stops.
    pub stops: Vec<GradientStop>,
    /// Extension beyond the stop range.
    pub spread: GradientSpread,
    /// Paint-space transform applied by the canvas, independent of the
    /// path transform.
    pub transform: Matrix,
}

/// Coordinate system of an image pattern.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FillUnits {
    /// Pattern coordinates are user-space coordinates.
    #[default]
    Absolute,
    /// Pattern coordinates are relative to the origin of the filled
    /// shape's bounds.
    ObjectBoundingBox,
}

/// An image pattern paint.
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    /// Image to sample.
    pub src: ImageSrc,
    /// Pattern alpha.
    pub opa: Opa,
    /// Pattern transform, composed after the bounding-box offset.
    pub transform: Matrix,
    /// Coordinate system of `transform`.
    pub units: FillUnits,
}

/// Paint of a fill.
#[derive(Clone, Debug, PartialEq)]
pub enum FillPaint {
    /// Solid color.
    Solid(Rgba8),
    /// Linear or radial gradient.
    Gradient(Gradient),
    /// Image pattern.
    Pattern(Pattern),
}

/// Paint of a stroke. Strokes cannot use image patterns.
#[derive(Clone, Debug, PartialEq)]
pub enum StrokePaint {
    /// Solid color.
    Solid(Rgba8),
    /// Linear or radial gradient.
    Gradient(Gradient),
}

/// How a path is filled.
#[derive(Clone, Debug, PartialEq)]
pub struct FillDesc {
    /// Fill paint.
    pub paint: FillPaint,
    /// Fill alpha. At or below [`OPA_MIN`] the fill is skipped.
    pub opa: Opa,
    /// Fill rule.
    pub rule: FillRule,
}

impl Default for FillDesc {
    fn default() -> Self {
        Self {
            paint: FillPaint::Solid(BLACK),
            opa: OPA_COVER,
            rule: FillRule::NonZero,
        }
    }
}

/// How a path is stroked.
#[derive(Clone, Debug, PartialEq)]
pub struct StrokeDesc {
    /// Stroke paint.
    pub paint: StrokePaint,
    /// Stroke alpha. At or below [`OPA_MIN`] the stroke is skipped.
    pub opa: Opa,
    /// Line width. Zero or less skips the stroke.
    pub width: f32,
    /// End cap style.
    pub cap: StrokeCap,
    /// Join style.
    pub join: StrokeJoin,
    /// Miter limit for [`StrokeJoin::Miter`].
    pub miter_limit: f32,
    /// Alternating dash and gap lengths. Empty draws a solid line.
    pub dash: Vec<f32>,
}

impl Default for StrokeDesc {
    fn default() -> Self {
        Self {
            paint: StrokePaint::Solid(BLACK),
            opa: OPA_COVER,
            width: 1.0,
            cap: StrokeCap::Butt,
            join: StrokeJoin::Miter,
            miter_limit: 4.0,
            dash: Vec::new(),
        }
    }
}

impl StrokeDesc {
    /// Build the canvas stroke style.
    ///
    /// The dash pattern is always set, so an empty one clears whatever a
    /// previous stroke used.
    pub fn to_style(&self) -> StrokeStyle {
        StrokeStyle::new(f64::from(self.width))
            .with_caps(self.cap.to_kurbo())
            .with_join(self.join.to_kurbo())
            .with_miter_limit(f64::from(self.miter_limit))
            .with_dashes(0.0, self.dash.iter().copied().map(f64::from))
    }
}

const BLACK: Rgba8 = Rgba8 {
    r: 0,
    g: 0,
    b: 0,
    a: 255,
};

/// Solid color with its alpha combined with `opa`.
#[inline]
pub fn solid_color(color: Rgba8, opa: Opa) -> Color {
    Color::from_rgba8(color.r, color.g, color.b, mix_opa(color.a, opa))
}

/// Build a gradient brush whose stop alphas are combined with `opa`.
pub fn gradient_brush(gradient: &Gradient, opa: Opa) -> Brush {
    let stops: Vec<ColorStop> = gradient
        .stops
        .iter()
        .map(|s| ColorStop::from((f32::from(s.frac) / 255.0, solid_color(s.color, opa))))
        .collect();
    let kind = match gradient.kind {
        GradientKind::Linear { start, end } => peniko::GradientKind::Linear(
            LinearGradientPosition::new(start.to_kurbo(), end.to_kurbo()),
        ),
        GradientKind::Radial { center, radius } => {
            peniko::GradientKind::Radial(RadialGradientPosition::new(center.to_kurbo(), radius))
        }
    };
    Brush::Gradient(peniko::Gradient {
        kind,
        extend: gradient.spread.to_peniko(),
        stops: stops.as_slice().into(),
        ..peniko::Gradient::default()
    })
}

/// Apply a fill descriptor's paint and fill rule to the canvas.
///
/// `opa` is the pass-wide opacity. Pattern paints are decoded through
/// `decoder`; if that fails the canvas paint is left unchanged and the
/// error is returned so the caller can skip the fill.
pub fn set_fill_paint<C, D>(
    canvas: &mut C,
    decoder: &mut D,
    fill: &FillDesc,
    opa: Opa,
) -> Result<(), DecodeError>
where
    C: Canvas + ?Sized,
    D: ImageDecoder + ?Sized,
{
    canvas.set_fill_rule(fill.rule.to_peniko());

    match &fill.paint {
        FillPaint::Solid(color) => {
            let color = solid_color(*color, mix_opa(fill.opa, opa));
            canvas.set_brush(Brush::Solid(color), Affine::IDENTITY);
        }
        FillPaint::Gradient(gradient) => {
            canvas.set_brush(gradient_brush(gradient, opa), gradient.transform.to_kurbo());
        }
        FillPaint::Pattern(pattern) => {
            let mut transform = Matrix::identity();
            if pattern.units == FillUnits::ObjectBoundingBox {
                let bounds = canvas.fill_extents();
                transform.translate(bounds.x0, bounds.y0);
            }
            transform.multiply(&pattern.transform);

            let brush = pattern_brush(decoder, pattern, opa)?;
            canvas.set_brush(brush, transform.to_kurbo());
        }
    }
    Ok(())
}

/// Apply a stroke descriptor's paint and style to the canvas.
///
/// `opa` is the pass-wide opacity.
pub fn set_stroke_paint<C: Canvas + ?Sized>(canvas: &mut C, stroke: &StrokeDesc, opa: Opa) {
    match &stroke.paint {
        StrokePaint::Solid(color) => {
            let color = solid_color(*color, mix_opa(stroke.opa, opa));
            canvas.set_brush(Brush::Solid(color), Affine::IDENTITY);
        }
        StrokePaint::Gradient(gradient) => {
            canvas.set_brush(gradient_brush(gradient, opa), gradient.transform.to_kurbo());
        }
    }
    canvas.set_stroke(stroke.to_style());
}

/// Decode a pattern image into an image brush.
///
/// The decoded image must be premultiplied 32-bit with rows exactly
/// `width * 4` bytes apart; other strides are repacked through the
/// decoder first.
fn pattern_brush<D: ImageDecoder + ?Sized>(
    decoder: &mut D,
    pattern: &Pattern,
    opa: Opa,
) -> Result<Brush, DecodeError> {
    let mut session = DecoderSession::open(decoder, &pattern.src, &DecoderArgs::PREMULTIPLIED)?;
    let header = session.decoded().ok_or(DecodeError::NotReady)?.header;

    if header.format != ColorFormat::Argb8888Premultiplied {
        return Err(DecodeError::UnsupportedFormat(header.format));
    }

    let tight_stride = header.width * SURFACE_BPP;
    if header.stride != tight_stride {
        log::warn!(
            "pattern stride {} != {tight_stride} for width {}, repacking",
            header.stride,
            header.width
        );
        session.adjust_stride(tight_stride)?;
    }

    let buf = session.decoded().ok_or(DecodeError::NotReady)?;
    let len = tight_stride as usize * header.height as usize;
    let pixels = buf.data().get(..len).ok_or(DecodeError::Truncated {
        needed: len,
        len: buf.data().len(),
    })?;

    let image = ImageData {
        data: Blob::from(pixels.to_vec()),
        format: ImageFormat::Bgra8,
        alpha_type: ImageAlphaType::AlphaPremultiplied,
        width: header.width,
        height: header.height,
    };
    let sampler = ImageSampler {
        alpha: f32::from(mix_opa(pattern.opa, opa)) / 255.0,
        ..ImageSampler::default()
    };
    Ok(Brush::Image(ImageBrush { image, sampler }))
}
