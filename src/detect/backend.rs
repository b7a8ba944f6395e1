use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Detector backend trait.
///
/// A backend is the external vehicle detector: it maps one frame to a list of
/// axis-aligned boxes with confidence scores. How it gets there (learned model,
/// replayed dump, fixed list) is its own business.
///
/// Backends must not filter by the run's confidence threshold; the frame
/// aggregator does that so the threshold stays a single explicit parameter.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// Boxes are in the frame's pixel coordinates. An empty list is a normal
    /// outcome; an `Err` is a per-frame failure the caller may skip past.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
