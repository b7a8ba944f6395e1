//! Rendering instructions and the frame painter.
//!
//! The aggregator describes what to draw as a `RenderPlan`; sinks decide how.
//! `draw_plan` paints outlines, spot numbers and the counter onto an
//! `RgbImage`. Text is rasterised with `imageproc` from a TrueType font; a
//! DejaVu Sans Mono copy is built in so annotation never depends on the host.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

use crate::detect::Detection;
use crate::geometry::Rect;

pub const OCCUPIED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const VACANT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const DETECTION_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

const SPOT_THICKNESS: u32 = 2;
const DETECTION_THICKNESS: u32 = 1;
pub const SUMMARY_ORIGIN: (i32, i32) = (10, 30);
const LABEL_OFFSET_Y: i32 = 10;
const SUMMARY_SCALE: f32 = 28.0;
const LABEL_SCALE: f32 = 16.0;

static EMBEDDED_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

/// Font used for spot numbers and the counter.
#[derive(Clone)]
pub struct LabelFont {
    font: FontArc,
}

impl LabelFont {
    /// The built-in DejaVu Sans Mono.
    pub fn embedded() -> Result<Self> {
        let font = FontArc::try_from_slice(EMBEDDED_FONT)
            .map_err(|e| anyhow!("built-in label font is unreadable: {}", e))?;
        Ok(Self { font })
    }

    /// Load a TrueType/OpenType font from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontArc::try_from_vec(data)
            .map_err(|e| anyhow!("invalid font file {}: {}", path.display(), e))?;
        Ok(Self { font })
    }
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelFont").finish_non_exhaustive()
    }
}

/// Knobs for building a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Draw the 1-based spot number above each spot.
    pub label_spots: bool,
    /// Overlay the raw detection boxes (debugging aid).
    pub show_detections: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            label_spots: true,
            show_detections: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoxItem {
    pub rect: Rect,
    pub color: Rgb<u8>,
    pub thickness: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextItem {
    pub text: String,
    /// Baseline-left anchor in frame pixels.
    pub origin: (i32, i32),
    pub color: Rgb<u8>,
    /// Glyph height in pixels.
    pub scale: f32,
}

/// Everything a renderer needs to annotate one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderPlan {
    pub boxes: Vec<BoxItem>,
    pub labels: Vec<TextItem>,
    pub summary: Option<TextItem>,
}

impl RenderPlan {
    pub fn push_spot(&mut self, rect: Rect, occupied: bool, label: Option<String>) {
        let color = if occupied { OCCUPIED_COLOR } else { VACANT_COLOR };
        self.boxes.push(BoxItem {
            rect,
            color,
            thickness: SPOT_THICKNESS,
        });
        if let Some(text) = label {
            self.labels.push(TextItem {
                text,
                origin: (rect.x1, rect.y1.saturating_sub(LABEL_OFFSET_Y)),
                color,
                scale: LABEL_SCALE,
            });
        }
    }

    pub fn push_detections(&mut self, detections: &[Detection]) {
        for det in detections {
            self.boxes.push(BoxItem {
                rect: det.rect,
                color: DETECTION_COLOR,
                thickness: DETECTION_THICKNESS,
            });
        }
    }

    pub fn set_summary(&mut self, occupied: usize, available: usize) {
        self.summary = Some(TextItem {
            text: summary_text(occupied, available),
            origin: SUMMARY_ORIGIN,
            color: TEXT_COLOR,
            scale: SUMMARY_SCALE,
        });
    }
}

pub fn summary_text(occupied: usize, available: usize) -> String {
    format!("Taken: {} / Available: {}", occupied, available)
}

/// Paint every box and text item in `plan` onto `img`, clipped to the image.
pub fn draw_plan(img: &mut RgbImage, plan: &RenderPlan, font: &LabelFont) {
    for item in &plan.boxes {
        draw_rect_outline(img, &item.rect, item.color, item.thickness);
    }
    for item in plan.labels.iter().chain(plan.summary.as_ref()) {
        draw_text_item(img, item, font);
    }
}

fn draw_text_item(img: &mut RgbImage, item: &TextItem, font: &LabelFont) {
    let scale = PxScale::from(item.scale);
    let (width, height) = text_size(scale, &font.font, &item.text);
    let width = i32::try_from(width).unwrap_or(i32::MAX);
    let height = i32::try_from(height).unwrap_or(i32::MAX);
    let img_w = i32::try_from(img.width()).unwrap_or(i32::MAX);
    let img_h = i32::try_from(img.height()).unwrap_or(i32::MAX);

    let (x, baseline) = item.origin;
    let top = baseline.saturating_sub(height);
    if baseline <= 0 || top >= img_h || x >= img_w || x.saturating_add(width) <= 0 {
        return;
    }
    draw_text_mut(img, item.color, x, top, scale, &font.font, &item.text);
}

/// Outline `rect` with bands `thickness` pixels wide, growing inward.
pub fn draw_rect_outline(img: &mut RgbImage, rect: &Rect, color: Rgb<u8>, thickness: u32) {
    let (w, h) = img.dimensions();
    let r = rect.clamp_to(w, h);
    if r.is_degenerate() {
        return;
    }
    let t = thickness.max(1) as i32;
    let (x1, y1, x2, y2) = (r.x1, r.y1, r.x2 - 1, r.y2 - 1);
    for y in y1..=y2 {
        for x in x1..=x2 {
            let on_edge = x - x1 < t || x2 - x < t || y - y1 < t || y2 - y < t;
            if on_edge {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
