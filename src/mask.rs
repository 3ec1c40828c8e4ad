//! Freehand marker canvas for masked editing.
//!
//! The source image is painted once as the base layer and marker strokes are
//! composited straight onto it. Export produces one flattened PNG; there is no
//! separate mask channel.

use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

use crate::upload::encode_base64;

pub const BRUSH_WIDTH: f32 = 20.0;
pub const MARKER_COLOR: Rgba<u8> = Rgba([255, 0, 0, 128]); // rgba(255, 0, 0, 0.5)

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("could not decode image: {0}")] Decode(String),
    #[error("could not encode canvas: {0}")] Encode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self { Self { x, y } }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerState {
    Idle,
    Drawing { last: Point },
}

pub struct MaskCanvas {
    surface: RgbaImage,
    state: PointerState,
    strokes: usize,
    stroke_has_segment: bool,
}

impl MaskCanvas {
    /// Decodes an uploaded image and sizes the surface to its pixel dimensions.
    pub fn load(bytes: &[u8]) -> Result<Self, CanvasError> {
        let img = image::load_from_memory(bytes).map_err(|e| CanvasError::Decode(e.to_string()))?;
        Ok(Self::from_rgba(img.to_rgba8()))
    }

    pub fn from_rgba(base: RgbaImage) -> Self {
        Self { surface: base, state: PointerState::Idle, strokes: 0, stroke_has_segment: false }
    }

    pub fn width(&self) -> u32 { self.surface.width() }
    pub fn height(&self) -> u32 { self.surface.height() }
    pub fn state(&self) -> PointerState { self.state }
    pub fn surface(&self) -> &RgbaImage { &self.surface }

    /// Strokes that have drawn at least one segment.
    pub fn stroke_count(&self) -> usize { self.strokes }

    /// Maps on-screen (CSS) coordinates to surface pixels. `displayed_*` is the
    /// size the canvas is shown at; a non-positive size maps 1:1.
    pub fn map_pointer(&self, css_x: f32, css_y: f32, displayed_width: f32, displayed_height: f32) -> Point {
        let sx = if displayed_width > 0.0 { self.width() as f32 / displayed_width } else { 1.0 };
        let sy = if displayed_height > 0.0 { self.height() as f32 / displayed_height } else { 1.0 };
        Point::new(css_x * sx, css_y * sy)
    }

    pub fn pointer_down(&mut self, p: Point) {
        self.end_stroke();
        self.state = PointerState::Drawing { last: p };
    }

    pub fn pointer_move(&mut self, p: Point) {
        if let PointerState::Drawing { last } = self.state {
            self.draw_segment(last, p);
            if !self.stroke_has_segment {
                self.stroke_has_segment = true;
                self.strokes += 1;
            }
            self.state = PointerState::Drawing { last: p };
        }
    }

    pub fn pointer_up(&mut self) { self.end_stroke(); }

    pub fn pointer_leave(&mut self) { self.end_stroke(); }

    fn end_stroke(&mut self) {
        self.state = PointerState::Idle;
        self.stroke_has_segment = false;
    }

    /// Round-capped segment. Each covered pixel is blended exactly once per
    /// segment; overlapping segments blend again, like successive canvas strokes.
    fn draw_segment(&mut self, a: Point, b: Point) {
        let radius = BRUSH_WIDTH / 2.0;
        let (w, h) = (self.width() as i64, self.height() as i64);
        if w == 0 || h == 0 {
            return;
        }
        let min_x = ((a.x.min(b.x) - radius).floor() as i64).clamp(0, w - 1);
        let max_x = ((a.x.max(b.x) + radius).ceil() as i64).clamp(0, w - 1);
        let min_y = ((a.y.min(b.y) - radius).floor() as i64).clamp(0, h - 1);
        let max_y = ((a.y.max(b.y) + radius).ceil() as i64).clamp(0, h - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                // sample at the pixel centre
                let c = Point::new(x as f32 + 0.5, y as f32 + 0.5);
                if distance_to_segment(c, a, b) <= radius {
                    let px = self.surface.get_pixel_mut(x as u32, y as u32);
                    *px = blend_over(*px, MARKER_COLOR);
                }
            }
        }
    }

    pub fn export_png(&self) -> Result<Vec<u8>, CanvasError> {
        let mut buf = Cursor::new(Vec::new());
        self.surface
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| CanvasError::Encode(e.to_string()))?;
        Ok(buf.into_inner())
    }

    pub fn export_base64(&self) -> Result<String, CanvasError> {
        Ok(encode_base64(&self.export_png()?))
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 { 0.0 } else { (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0) };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt()
}

/// Source-over compositing on straight (non-premultiplied) RGBA8.
fn blend_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |s: u8, d: u8| {
        let v = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}
