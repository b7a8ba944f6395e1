//! Spot store: the annotated parking spots for a run.
//!
//! Spots are persisted as a JSON list of `[x1, y1, x2, y2]` arrays. List order
//! is the spot identity: index `i` in the file is spot `i` for the whole run.

use anyhow::{anyhow, Context, Result};
use std::path::Path;

use crate::geometry::Rect;

/// One annotated parking spot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Spot {
    /// Zero-based position in the spot file.
    pub index: usize,
    pub rect: Rect,
}

impl Spot {
    /// Human-facing label (1-based).
    pub fn label(&self) -> String {
        (self.index + 1).to_string()
    }

    pub fn is_degenerate(&self) -> bool {
        self.rect.is_degenerate()
    }
}

/// Ordered, immutable list of spots.
#[derive(Clone, Debug, Default)]
pub struct SpotStore {
    spots: Vec<Spot>,
}

impl SpotStore {
    /// Load spots from a JSON spot file.
    ///
    /// A missing file is a configuration error: nothing can run without spots.
    /// Degenerate rectangles are kept (so indices stay stable) and reported.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!(
                "parking spots file '{}' not found; create one with spot_editor first",
                path.display()
            ));
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read spots file {}", path.display()))?;
        let rects = parse_spot_list(&raw)
            .with_context(|| format!("invalid spots file {}", path.display()))?;
        let store = Self::from_rects(rects);
        log::info!(
            "loaded {} parking spots from {}",
            store.len(),
            path.display()
        );
        Ok(store)
    }

    /// Parse spots from the JSON text of a spot file.
    pub fn load_str(raw: &str) -> Result<Self> {
        Ok(Self::from_rects(parse_spot_list(raw)?))
    }

    pub fn from_rects<I: IntoIterator<Item = Rect>>(rects: I) -> Self {
        let spots: Vec<Spot> = rects
            .into_iter()
            .enumerate()
            .map(|(index, rect)| Spot { index, rect })
            .collect();
        for spot in spots.iter().filter(|s| s.is_degenerate()) {
            log::warn!(
                "spot {} has degenerate geometry {}; it will always read vacant",
                spot.label(),
                spot.rect
            );
        }
        Self { spots }
    }

    /// Clamp every spot into the frame. Spots pushed fully outside become degenerate.
    pub fn clamp_to_frame(&self, width: u32, height: u32) -> Self {
        let mut clamped = Vec::with_capacity(self.spots.len());
        for spot in &self.spots {
            let rect = spot.rect.clamp_to(width, height);
            if rect != spot.rect {
                log::warn!(
                    "spot {} {} exceeds frame {}x{}; clamped to {}",
                    spot.label(),
                    spot.rect,
                    width,
                    height,
                    rect
                );
                if rect.is_degenerate() && !spot.is_degenerate() {
                    log::warn!(
                        "spot {} lies outside the frame; it will always read vacant",
                        spot.label()
                    );
                }
            }
            clamped.push(Spot {
                index: spot.index,
                rect,
            });
        }
        Self { spots: clamped }
    }

    /// Write the spot list back out in the persisted format.
    pub fn save(&self, path: &Path) -> Result<()> {
        save_rects(path, self.spots.iter().map(|s| s.rect))
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Spot> {
        self.spots.iter()
    }

    pub fn as_slice(&self) -> &[Spot] {
        &self.spots
    }

    pub fn degenerate_count(&self) -> usize {
        self.spots.iter().filter(|s| s.is_degenerate()).count()
    }
}

pub(crate) fn parse_spot_list(raw: &str) -> Result<Vec<Rect>> {
    let arrays: Vec<[i32; 4]> = serde_json::from_str(raw)
        .map_err(|e| anyhow!("expected a JSON list of [x1, y1, x2, y2] integer arrays: {}", e))?;
    Ok(arrays.into_iter().map(Rect::from).collect())
}

pub(crate) fn save_rects<I: IntoIterator<Item = Rect>>(path: &Path, rects: I) -> Result<()> {
    let arrays: Vec<[i32; 4]> = rects.into_iter().map(|r| r.as_array()).collect();
    let json = serde_json::to_string(&arrays)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write spots file {}", path.display()))?;
    Ok(())
}
