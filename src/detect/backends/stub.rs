use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Stub backend for testing and dry runs. Reports the same boxes for every frame.
#[derive(Clone, Debug, Default)]
pub struct StubBackend {
    detections: Vec<Detection>,
}

impl StubBackend {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    /// A backend that never sees anything.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }
}
