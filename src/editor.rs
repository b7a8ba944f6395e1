//! Spot editor session.
//!
//! Holds the rectangles being annotated over a reference frame. A front end
//! (mouse handler, CLI, test) drives it with drag events or direct pushes;
//! the session owns the list and writes it out in the spot-file format.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::geometry::Rect;
use crate::spots::{parse_spot_list, save_rects, SpotStore};

/// Rectangles drawn so far, plus any drag in progress.
#[derive(Clone, Debug, Default)]
pub struct EditorSession {
    spots: Vec<Rect>,
    drag_origin: Option<(i32, i32)>,
    drag_current: Option<(i32, i32)>,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume editing an existing spot file. A missing file starts empty.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read spots file {}", path.display()))?;
        let spots = parse_spot_list(&raw)
            .with_context(|| format!("invalid spots file {}", path.display()))?;
        Ok(Self {
            spots,
            ..Self::default()
        })
    }

    /// Button down: remember where the drag started.
    pub fn begin_drag(&mut self, x: i32, y: i32) {
        self.drag_origin = Some((x, y));
        self.drag_current = Some((x, y));
    }

    /// Pointer moved while dragging. Ignored when no drag is active.
    pub fn update_drag(&mut self, x: i32, y: i32) {
        if self.drag_origin.is_some() {
            self.drag_current = Some((x, y));
        }
    }

    /// Rectangle under the pointer, for preview drawing.
    pub fn preview(&self) -> Option<Rect> {
        match (self.drag_origin, self.drag_current) {
            (Some(a), Some(b)) => Some(Rect::from_corners(a, b)),
            _ => None,
        }
    }

    /// Button up: commit the dragged rectangle, normalised to `x1 < x2`, `y1 < y2`.
    ///
    /// A click without movement produces no spot.
    pub fn end_drag(&mut self, x: i32, y: i32) -> Option<Rect> {
        let origin = self.drag_origin.take()?;
        self.drag_current = None;
        let rect = Rect::from_corners(origin, (x, y));
        if rect.is_degenerate() {
            log::debug!("ignoring zero-area drag at ({}, {})", x, y);
            return None;
        }
        self.spots.push(rect);
        log::info!("spot added: {}", rect);
        Some(rect)
    }

    pub fn cancel_drag(&mut self) {
        self.drag_origin = None;
        self.drag_current = None;
    }

    /// Append a rectangle directly. Rejects zero-area rectangles.
    pub fn push(&mut self, rect: Rect) -> Result<()> {
        if rect.is_degenerate() {
            return Err(anyhow!("spot {} has zero area", rect));
        }
        self.spots.push(rect);
        Ok(())
    }

    /// Drop the most recent spot.
    pub fn undo(&mut self) -> Option<Rect> {
        let removed = self.spots.pop();
        match removed {
            Some(rect) => log::info!("removed last spot: {}", rect),
            None => log::info!("no spots to undo"),
        }
        removed
    }

    pub fn clear(&mut self) {
        self.spots.clear();
        self.cancel_drag();
    }

    pub fn spots(&self) -> &[Rect] {
        &self.spots
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_rects(path, self.spots.iter().copied())?;
        log::info!("saved {} spots to {}", self.spots.len(), path.display());
        Ok(())
    }

    pub fn into_store(self) -> SpotStore {
        SpotStore::from_rects(self.spots)
    }
}
