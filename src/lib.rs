//! Parking occupancy from vehicle detections.
//!
//! A fixed camera watches a lot. Spots are annotated once as rectangles over a
//! reference frame; a vehicle detector reports boxes for each frame; a spot is
//! occupied when some box covers enough of the spot's own area.
//!
//! # Module Structure
//!
//! - `geometry`: `Rect` and its intersection arithmetic
//! - `frame`: decoded RGB frames
//! - `spots`: the spot store (loaded once, read-only for the run)
//! - `detect`: detector backends (stub, replay, tract) and `Detection`
//! - `occupancy`: the per-spot overlap test and run thresholds
//! - `aggregate`: per-frame evaluation, counters and the render plan
//! - `render`: render plan types and a rectangle painter
//! - `ingest`: frame sources (still images, video files, stub)
//! - `pipeline`: the frame loop and output sinks
//! - `editor`: spot annotation session
//! - `config`: file + environment configuration
//! - `ui`: stage spinners and the live counter for the CLIs

use anyhow::{anyhow, Result};

pub mod aggregate;
pub mod config;
pub mod detect;
pub mod editor;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod occupancy;
pub mod pipeline;
pub mod render;
pub mod spots;
pub mod ui;

pub use aggregate::{process_frame, FrameReport, SpotStatus};
pub use config::{DetectorKind, DetectorSettings, ParkingConfig};
pub use detect::{BackendRegistry, Detection, DetectorBackend, ReplayBackend, StubBackend};
pub use editor::EditorSession;
pub use frame::Frame;
pub use geometry::Rect;
pub use ingest::{FileConfig, FileSource, InputKind};
pub use occupancy::{is_occupied, overlap_ratio, Thresholds};
pub use pipeline::{
    FrameOutcome, FrameSink, FrameSource, ImageDirSink, LogSink, MultiSink, PeekedSource, Pipeline,
    RunStats,
};
pub use render::{LabelFont, RenderOptions, RenderPlan};
pub use spots::{Spot, SpotStore};

/// Build a registry holding the configured detector as its default backend.
pub fn build_detector(settings: &DetectorSettings) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    match settings.kind {
        DetectorKind::Stub => {
            log::warn!(
                "using stub detector: no vehicles will be reported and every spot will \
                 read vacant; pass --detector replay or tract for real counts"
            );
            registry.register(StubBackend::empty());
        }
        DetectorKind::Replay => {
            let path = settings
                .detections_path
                .as_ref()
                .ok_or_else(|| anyhow!("replay detector requires a detections path"))?;
            let backend = ReplayBackend::open(path)?;
            log::info!(
                "replaying {} frames of detections from {}",
                backend.len(),
                path.display()
            );
            registry.register(backend);
        }
        DetectorKind::Tract => {
            #[cfg(feature = "backend-tract")]
            {
                let path = settings
                    .model_path
                    .as_ref()
                    .ok_or_else(|| anyhow!("tract detector requires a model path"))?;
                let mut backend = detect::TractBackend::new(
                    path,
                    settings.input_width,
                    settings.input_height,
                )?;
                if let Some(classes) = &settings.vehicle_classes {
                    backend = backend.with_classes(classes.clone());
                }
                log::info!("loaded ONNX detector from {}", path.display());
                registry.register(backend);
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                return Err(anyhow!(
                    "tract detector requires the backend-tract feature"
                ));
            }
        }
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings(kind: DetectorKind) -> DetectorSettings {
        DetectorSettings {
            kind,
            model_path: None,
            detections_path: None,
            input_width: 640,
            input_height: 640,
            vehicle_classes: None,
        }
    }

    #[test]
    fn stub_detector_registry() {
        let registry = build_detector(&settings(DetectorKind::Stub)).unwrap();
        assert_eq!(registry.default_name(), Some("stub"));
    }

    #[test]
    fn replay_detector_needs_a_readable_dump() {
        assert!(build_detector(&settings(DetectorKind::Replay)).is_err());

        let mut s = settings(DetectorKind::Replay);
        s.detections_path = Some(PathBuf::from("/nonexistent/dets.jsonl"));
        assert!(build_detector(&s).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dets.jsonl");
        std::fs::write(&path, "[[0, 0, 5, 10, 0.9]]\n").unwrap();
        s.detections_path = Some(path);
        let registry = build_detector(&s).unwrap();
        assert_eq!(registry.default_name(), Some("replay"));
    }
}
