//! Frame ingestion sources.
//!
//! This module provides local sources for frames:
//! - Still images (the reference frame, or a single snapshot)
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Stub source (testing)
//!
//! All sources produce `Frame` instances that flow into the pipeline one at a
//! time. The ingestion layer is responsible for decoding and frame decimation;
//! it knows nothing about spots or detections.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

pub use file::{FileConfig, FileSource, FileStats, InputKind};
