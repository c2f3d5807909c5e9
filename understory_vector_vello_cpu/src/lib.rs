// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vello CPU–backed raster engine for Understory Vector.
//!
//! [`VelloCpuEngine`] binds [`VelloCpuCanvas`]es over understory surfaces.
//! Drawing is recorded into a sparse-strips [`vello_cpu::RenderContext`]
//! sized to the surface; [`Canvas::flush`] renders it and composites the
//! result source-over onto the surface pixels, so pixels the pass never
//! covered keep their value.
//!
//! Canvas state (transform, paint, stroke, fill rule, opacity and clip) is
//! kept on a save stack. Clips are clip layers; opacity below 1 wraps each
//! draw in an opacity layer.

#![no_std]

extern crate alloc;

use alloc::vec::Vec;
use core::fmt;

use kurbo::{Affine, Cap, Join};
use peniko::color::Srgb;
use peniko::{Blob, Brush, Color, Fill, ImageData, ImageFormat};
use understory_vector::{
    Canvas, CanvasError, FPoint, RasterEngine, RectF, StrokeStyle, Surface, src_over_pixel,
};
use vello_cpu::kurbo::{
    Affine as CpuAffine, BezPath, Cap as CpuCap, Join as CpuJoin, Point as CpuPoint, Rect, Shape,
    Stroke,
};
use vello_cpu::{Image as CpuImage, ImageSource, Pixmap, RenderContext, RenderMode, RenderSettings};

/// Raster engine creating [`VelloCpuCanvas`]es.
#[derive(Debug)]
pub struct VelloCpuEngine {
    settings: RenderSettings,
}

impl Default for VelloCpuEngine {
    fn default() -> Self {
        Self::with_settings(RenderSettings {
            render_mode: RenderMode::OptimizeSpeed,
            ..RenderSettings::default()
        })
    }
}

impl VelloCpuEngine {
    /// Create an engine using the u8 pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with explicit render settings.
    pub fn with_settings(settings: RenderSettings) -> Self {
        Self { settings }
    }
}

impl RasterEngine for VelloCpuEngine {
    type Canvas<'s>
        = VelloCpuCanvas<'s>
    where
        Self: 's;

    fn create_canvas<'s>(
        &'s mut self,
        surface: Surface<'s>,
    ) -> Result<Self::Canvas<'s>, CanvasError> {
        let (width, height) = (surface.width(), surface.height());
        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(CanvasError::SurfaceTooLarge { width, height });
        };
        Ok(VelloCpuCanvas {
            surface,
            // The context needs at least one pixel; empty canvases never render.
            ctx: RenderContext::new_with(w.max(1), h.max(1), self.settings),
            width: w,
            height: h,
            state: CanvasState::default(),
            stack: Vec::new(),
            path: BezPath::new(),
        })
    }
}

#[derive(Clone, Debug)]
struct CanvasState {
    transform: Affine,
    brush: Brush,
    paint_transform: Affine,
    stroke: StrokeStyle,
    fill_rule: Fill,
    opacity: f32,
    /// Clip layers pushed on the render context while this state was current.
    clip_depth: usize,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            brush: Brush::Solid(Color::BLACK),
            paint_transform: Affine::IDENTITY,
            stroke: StrokeStyle::default(),
            fill_rule: Fill::NonZero,
            opacity: 1.0,
            clip_depth: 0,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum Draw {
    Fill,
    Stroke,
    Rect(RectF),
}

/// Canvas drawing through a `vello_cpu` render context.
pub struct VelloCpuCanvas<'s> {
    surface: Surface<'s>,
    ctx: RenderContext,
    width: u16,
    height: u16,
    state: CanvasState,
    stack: Vec<CanvasState>,
    path: BezPath,
}

impl fmt::Debug for VelloCpuCanvas<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VelloCpuCanvas")
            .field("surface", &self.surface)
            .field("state", &self.state)
            .field("saved", &self.stack.len())
            .finish_non_exhaustive()
    }
}

fn affine_to_cpu(xf: Affine) -> CpuAffine {
    CpuAffine::new(xf.as_coeffs())
}

fn point_to_cpu(p: FPoint) -> CpuPoint {
    CpuPoint::new(f64::from(p.x), f64::from(p.y))
}

fn rect_to_cpu(r: RectF) -> Rect {
    Rect::new(
        f64::from(r.x0),
        f64::from(r.y0),
        f64::from(r.x1),
        f64::from(r.y1),
    )
}

fn stroke_to_cpu(style: &StrokeStyle) -> Stroke {
    let mut stroke = Stroke::new(style.width);
    stroke.miter_limit = style.miter_limit;
    stroke.join = match style.join {
        Join::Bevel => CpuJoin::Bevel,
        Join::Miter => CpuJoin::Miter,
        Join::Round => CpuJoin::Round,
    };
    stroke.start_cap = match style.start_cap {
        Cap::Butt => CpuCap::Butt,
        Cap::Round => CpuCap::Round,
        Cap::Square => CpuCap::Square,
    };
    stroke.end_cap = match style.end_cap {
        Cap::Butt => CpuCap::Butt,
        Cap::Round => CpuCap::Round,
        Cap::Square => CpuCap::Square,
    };
    if style.dash_pattern.is_empty() {
        stroke
    } else {
        stroke.with_dashes(style.dash_offset, style.dash_pattern.iter().copied())
    }
}

/// `vello_cpu` samples RGBA images; swizzle BGRA ones.
fn image_to_rgba(image: &ImageData) -> ImageData {
    match image.format {
        ImageFormat::Bgra8 => {
            let mut pixels = image.data.data().to_vec();
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
            ImageData {
                data: Blob::from(pixels),
                format: ImageFormat::Rgba8,
                ..image.clone()
            }
        }
        _ => image.clone(),
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "canvas geometry is single precision"
)]
fn rect_from_cpu(r: Rect) -> RectF {
    RectF::new(r.x0 as f32, r.y0 as f32, r.x1 as f32, r.y1 as f32)
}

impl VelloCpuCanvas<'_> {
    /// Set the context paint from the current brush.
    ///
    /// Returns the extra alpha the paint carries, or `None` if the brush
    /// paints nothing.
    fn apply_paint(&mut self) -> Option<f32> {
        let mut alpha = 1.0;
        match &self.state.brush {
            Brush::Solid(color) => self.ctx.set_paint(*color),
            Brush::Gradient(gradient) => match gradient.stops.len() {
                0 => return None,
                1 => self
                    .ctx
                    .set_paint(gradient.stops[0].color.to_alpha_color::<Srgb>()),
                _ => self.ctx.set_paint(gradient.clone()),
            },
            Brush::Image(image_brush) => {
                alpha = image_brush.sampler.alpha;
                let mut sampler = image_brush.sampler;
                sampler.alpha = 1.0;
                let source = ImageSource::from_peniko_image_data(&image_to_rgba(&image_brush.image));
                self.ctx.set_paint(CpuImage {
                    image: source,
                    sampler,
                });
            }
        }
        self.ctx
            .set_paint_transform(affine_to_cpu(self.state.paint_transform));
        Some(alpha)
    }

    fn draw(&mut self, draw: Draw) {
        let Some(paint_alpha) = self.apply_paint() else {
            return;
        };
        let alpha = self.state.opacity * paint_alpha;
        if alpha <= 0.0 {
            return;
        }

        self.ctx.set_transform(affine_to_cpu(self.state.transform));
        self.ctx.set_fill_rule(self.state.fill_rule);
        // Images are plain textures: nothing is painted outside their rect.
        let image_clip = match &self.state.brush {
            Brush::Image(image_brush) => {
                let rect = Rect::new(
                    0.0,
                    0.0,
                    f64::from(image_brush.image.width),
                    f64::from(image_brush.image.height),
                );
                Some(affine_to_cpu(self.state.paint_transform) * rect.to_path(0.1))
            }
            _ => None,
        };
        if let Some(clip) = &image_clip {
            self.ctx.push_clip_layer(clip);
        }
        let layered = alpha < 1.0;
        if layered {
            self.ctx.push_layer(None, None, Some(alpha), None, None);
        }
        match draw {
            Draw::Fill => self.ctx.fill_path(&self.path),
            Draw::Stroke => {
                self.ctx.set_stroke(stroke_to_cpu(&self.state.stroke));
                self.ctx.stroke_path(&self.path);
            }
            Draw::Rect(rect) => self.ctx.fill_rect(&rect_to_cpu(rect)),
        }
        if layered {
            self.ctx.pop_layer();
        }
        if image_clip.is_some() {
            self.ctx.pop_layer();
        }
    }

    fn pop_clips_to(&mut self, depth: usize) {
        for _ in depth..self.state.clip_depth {
            self.ctx.pop_layer();
        }
        self.state.clip_depth = depth.min(self.state.clip_depth);
    }

    /// Composite the rendered pixmap source-over onto the surface.
    fn composite(&mut self, pixmap: &Pixmap) {
        let width = usize::from(self.width);
        if width == 0 {
            return;
        }
        for (y, src_row) in (0..u32::from(self.height)).zip(pixmap.data().chunks_exact(width)) {
            let Some(dst_row) = self.surface.row_mut(y) else {
                break;
            };
            for (dst, src) in dst_row.chunks_exact_mut(4).zip(src_row) {
                let mut px = [dst[0], dst[1], dst[2], dst[3]];
                src_over_pixel(&mut px, [src.b, src.g, src.r, src.a]);
                dst.copy_from_slice(&px);
            }
        }
    }
}

impl Canvas for VelloCpuCanvas<'_> {
    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        let Some(saved) = self.stack.pop() else {
            log::warn!("restore without a matching save");
            return;
        };
        self.pop_clips_to(saved.clip_depth);
        self.state = saved;
    }

    fn reset_transform(&mut self) {
        self.state.transform = Affine::IDENTITY;
    }

    fn set_transform(&mut self, transform: Affine) {
        self.state.transform = transform;
    }

    fn clip_rect(&mut self, rect: RectF) {
        self.ctx.set_transform(affine_to_cpu(self.state.transform));
        self.ctx.push_clip_layer(&rect_to_cpu(rect).to_path(0.1));
        self.state.clip_depth += 1;
    }

    fn new_path(&mut self) {
        self.path.truncate(0);
    }

    fn move_to(&mut self, p: FPoint) {
        self.path.move_to(point_to_cpu(p));
    }

    fn line_to(&mut self, p: FPoint) {
        self.path.line_to(point_to_cpu(p));
    }

    fn quad_to(&mut self, c: FPoint, p: FPoint) {
        self.path.quad_to(point_to_cpu(c), point_to_cpu(p));
    }

    fn cubic_to(&mut self, c1: FPoint, c2: FPoint, p: FPoint) {
        self.path
            .curve_to(point_to_cpu(c1), point_to_cpu(c2), point_to_cpu(p));
    }

    fn close_path(&mut self) {
        self.path.close_path();
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.state.opacity = opacity.clamp(0.0, 1.0);
    }

    fn set_fill_rule(&mut self, rule: Fill) {
        self.state.fill_rule = rule;
    }

    fn set_brush(&mut self, brush: Brush, paint_transform: Affine) {
        self.state.brush = brush;
        self.state.paint_transform = paint_transform;
    }

    fn set_stroke(&mut self, style: StrokeStyle) {
        self.state.stroke = style;
    }

    fn fill_extents(&self) -> RectF {
        if self.path.elements().is_empty() {
            return RectF::default();
        }
        rect_from_cpu(self.path.bounding_box())
    }

    fn fill_preserve(&mut self) {
        self.draw(Draw::Fill);
    }

    fn stroke(&mut self) {
        self.draw(Draw::Stroke);
        self.path.truncate(0);
    }

    fn fill_rect(&mut self, rect: RectF) {
        self.draw(Draw::Rect(rect));
    }

    fn flush(&mut self) {
        if self.state.clip_depth > 0 {
            log::warn!(
                "flushing with {} clip layer(s) open; closing them",
                self.state.clip_depth
            );
            self.pop_clips_to(0);
            for saved in &mut self.stack {
                saved.clip_depth = 0;
            }
        }
        if self.width == 0 || self.height == 0 {
            self.ctx.reset();
            return;
        }
        self.ctx.flush();
        let mut pixmap = Pixmap::new(self.width, self.height);
        self.ctx.render_to_pixmap(&mut pixmap);
        self.composite(&pixmap);
        self.ctx.reset();
        log::trace!("flushed {}x{} canvas", self.width, self.height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use peniko::{ColorStop, ImageAlphaType, ImageBrush, ImageSampler};

    fn red() -> Color {
        Color::from_rgba8(255, 0, 0, 255)
    }

    fn pixel(data: &[u8], width: usize, x: usize, y: usize) -> [u8; 4] {
        let i = (y * width + x) * 4;
        [data[i], data[i + 1], data[i + 2], data[i + 3]]
    }

    #[test]
    fn oversized_surface_is_refused() {
        let mut engine = VelloCpuEngine::new();
        let mut data = vec![0_u8; 4 * 70_000];
        let surface = Surface::new(&mut data, 70_000, 1, 4 * 70_000).unwrap();
        assert!(matches!(
            engine.create_canvas(surface),
            Err(CanvasError::SurfaceTooLarge {
                width: 70_000,
                height: 1
            })
        ));
    }

    #[test]
    fn fill_rect_writes_bgra_and_leaves_the_rest() {
        let mut engine = VelloCpuEngine::new();
        let mut data = vec![7_u8; 8 * 8 * 4];
        {
            let surface = Surface::new(&mut data, 8, 8, 32).unwrap();
            let mut canvas = engine.create_canvas(surface).unwrap();
            canvas.set_brush(Brush::Solid(red()), Affine::IDENTITY);
            canvas.fill_rect(RectF::new(2.0, 2.0, 6.0, 6.0));
            canvas.flush();
        }
        assert_eq!(pixel(&data, 8, 3, 3), [0, 0, 255, 255]);
        assert_eq!(pixel(&data, 8, 0, 0), [7, 7, 7, 7]);
        assert_eq!(pixel(&data, 8, 6, 6), [7, 7, 7, 7]);
    }

    #[test]
    fn empty_surface_flushes_nothing() {
        let mut engine = VelloCpuEngine::new();
        let mut data = vec![5_u8; 16];
        for (width, height, stride) in [(0, 4, 0), (4, 0, 16)] {
            let surface = Surface::new(&mut data, width, height, stride).unwrap();
            let mut canvas = engine.create_canvas(surface).unwrap();
            canvas.set_brush(Brush::Solid(red()), Affine::IDENTITY);
            canvas.fill_rect(RectF::new(0.0, 0.0, 4.0, 4.0));
            canvas.flush();
        }
        assert!(data.iter().all(|&b| b == 5));
    }

    #[test]
    fn image_paints_only_inside_its_rect() {
        let image = ImageData {
            data: Blob::from(vec![255_u8, 0, 0, 255].repeat(4)),
            format: ImageFormat::Bgra8,
            alpha_type: ImageAlphaType::AlphaPremultiplied,
            width: 2,
            height: 2,
        };
        let brush = Brush::Image(ImageBrush {
            image,
            sampler: ImageSampler::default(),
        });
        let mut engine = VelloCpuEngine::new();
        let mut data = vec![0_u8; 8 * 8 * 4];
        {
            let surface = Surface::new(&mut data, 8, 8, 32).unwrap();
            let mut canvas = engine.create_canvas(surface).unwrap();
            canvas.set_brush(brush, Affine::translate((2.0, 2.0)));
            canvas.fill_rect(RectF::new(0.0, 0.0, 8.0, 8.0));
            canvas.flush();
        }
        assert_eq!(pixel(&data, 8, 2, 2), [255, 0, 0, 255]);
        assert_eq!(pixel(&data, 8, 3, 3), [255, 0, 0, 255]);
        assert_eq!(pixel(&data, 8, 1, 1), [0, 0, 0, 0]);
        assert_eq!(pixel(&data, 8, 4, 2), [0, 0, 0, 0]);
        assert_eq!(pixel(&data, 8, 6, 6), [0, 0, 0, 0]);
    }

    #[test]
    fn restore_drops_clip() {
        let mut engine = VelloCpuEngine::new();
        let mut data = vec![0_u8; 8 * 8 * 4];
        {
            let surface = Surface::new(&mut data, 8, 8, 32).unwrap();
            let mut canvas = engine.create_canvas(surface).unwrap();
            canvas.set_brush(Brush::Solid(red()), Affine::IDENTITY);
            canvas.save();
            canvas.clip_rect(RectF::new(0.0, 0.0, 4.0, 8.0));
            canvas.fill_rect(RectF::new(0.0, 0.0, 8.0, 4.0));
            canvas.restore();
            canvas.fill_rect(RectF::new(0.0, 4.0, 8.0, 8.0));
            canvas.flush();
        }
        assert_eq!(pixel(&data, 8, 1, 1)[3], 255);
        assert_eq!(pixel(&data, 8, 6, 1)[3], 0);
        assert_eq!(pixel(&data, 8, 6, 6)[3], 255);
    }

    #[test]
    fn empty_gradient_paints_nothing() {
        let mut engine = VelloCpuEngine::new();
        let mut data = vec![0_u8; 4 * 4 * 4];
        {
            let surface = Surface::new(&mut data, 4, 4, 16).unwrap();
            let mut canvas = engine.create_canvas(surface).unwrap();
            let empty = peniko::Gradient::new_linear((0.0, 0.0), (4.0, 0.0));
            canvas.set_brush(Brush::Gradient(empty), Affine::IDENTITY);
            canvas.fill_rect(RectF::new(0.0, 0.0, 4.0, 4.0));
            canvas.flush();
        }
        assert!(data.iter().all(|&b| b == 0));

        {
            let surface = Surface::new(&mut data, 4, 4, 16).unwrap();
            let mut canvas = engine.create_canvas(surface).unwrap();
            let stops = [ColorStop::from((0.5, red()))];
            let single = peniko::Gradient {
                stops: stops.as_slice().into(),
                ..peniko::Gradient::new_linear((0.0, 0.0), (4.0, 0.0))
            };
            canvas.set_brush(Brush::Gradient(single), Affine::IDENTITY);
            canvas.fill_rect(RectF::new(0.0, 0.0, 4.0, 4.0));
            canvas.flush();
        }
        assert_eq!(pixel(&data, 4, 1, 1), [0, 0, 255, 255]);
    }

    #[test]
    fn bgra_image_is_swizzled() {
        let image = ImageData {
            data: Blob::from(vec![1_u8, 2, 3, 4]),
            format: ImageFormat::Bgra8,
            alpha_type: ImageAlphaType::AlphaPremultiplied,
            width: 1,
            height: 1,
        };
        let rgba = image_to_rgba(&image);
        assert_eq!(rgba.format, ImageFormat::Rgba8);
        assert_eq!(rgba.data.data(), &[3_u8, 2, 1, 4]);

        let brush = Brush::Image(ImageBrush {
            image,
            sampler: ImageSampler {
                alpha: 0.0,
                ..ImageSampler::default()
            },
        });
        let mut engine = VelloCpuEngine::new();
        let mut data = vec![9_u8; 2 * 2 * 4];
        {
            let surface = Surface::new(&mut data, 2, 2, 8).unwrap();
            let mut canvas = engine.create_canvas(surface).unwrap();
            canvas.set_brush(brush, Affine::IDENTITY);
            canvas.fill_rect(RectF::new(0.0, 0.0, 2.0, 2.0));
            canvas.flush();
        }
        // A fully transparent pattern leaves the surface alone.
        assert!(data.iter().all(|&b| b == 9));
    }

    #[test]
    fn extents_follow_path_in_user_space() {
        let mut engine = VelloCpuEngine::new();
        let mut data = vec![0_u8; 4 * 4 * 4];
        let surface = Surface::new(&mut data, 4, 4, 16).unwrap();
        let mut canvas = engine.create_canvas(surface).unwrap();
        assert_eq!(canvas.fill_extents(), RectF::default());
        canvas.set_transform(Affine::scale(10.0));
        canvas.move_to(FPoint::new(1.0, 2.0));
        canvas.line_to(FPoint::new(3.0, -1.0));
        assert_eq!(canvas.fill_extents(), RectF::new(1.0, -1.0, 3.0, 2.0));
        canvas.new_path();
        assert_eq!(canvas.fill_extents(), RectF::default());
    }
}
