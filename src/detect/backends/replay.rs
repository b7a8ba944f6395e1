//! Replay backend: per-frame detections read from a JSON-lines dump.
//!
//! Line `n` of the dump holds the detections for the `n`th frame the backend
//! is asked about, as an array of `[x1, y1, x2, y2, confidence]` rows. Blank
//! lines are frames with no detections. Once the dump runs out every further
//! frame gets an empty list.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

pub struct ReplayBackend {
    frames: Vec<Vec<Detection>>,
    cursor: usize,
    exhausted_logged: bool,
}

impl ReplayBackend {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detections dump {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid detections dump {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut frames = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                frames.push(Vec::new());
                continue;
            }
            let dets: Vec<Detection> = serde_json::from_str(line)
                .map_err(|e| anyhow!("line {}: {}", lineno + 1, e))?;
            frames.push(dets);
        }
        Ok(Self {
            frames,
            cursor: 0,
            exhausted_logged: false,
        })
    }

    /// Number of frames recorded in the dump.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl DetectorBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        let dets = match self.frames.get(self.cursor) {
            Some(dets) => dets.clone(),
            None => {
                if !self.exhausted_logged {
                    log::debug!(
                        "replay dump exhausted after {} frames; reporting no detections",
                        self.frames.len()
                    );
                    self.exhausted_logged = true;
                }
                Vec::new()
            }
        };
        self.cursor += 1;
        Ok(dets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    #[test]
    fn replays_lines_in_order_then_goes_quiet() {
        let dump = "[[0, 0, 5, 10, 0.9]]\n\n[[1, 1, 2, 2, 0.5], [3, 3, 4, 4, 0.2]]\n";
        let mut backend = ReplayBackend::parse(dump).unwrap();
        assert_eq!(backend.len(), 3);
        let frame = Frame::blank(10, 10, 0);

        let f0 = backend.detect(&frame).unwrap();
        assert_eq!(f0[0].rect, Rect::raw(0, 0, 5, 10));
        assert!(backend.detect(&frame).unwrap().is_empty());
        assert_eq!(backend.detect(&frame).unwrap().len(), 2);
        assert!(backend.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn bad_line_reports_its_number() {
        let err = ReplayBackend::parse("[]\n[[1, 2]]\n").err().unwrap();
        assert!(err.to_string().contains("line 2"));
    }
}
