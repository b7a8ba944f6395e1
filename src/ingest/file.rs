//! Local file frame source.
//!
//! This module provides `FileSource` for pulling frames from local inputs:
//! - `stub://...` synthetic frames (tests and dry runs)
//! - still images (`.jpg`, `.png`), yielding exactly one frame
//! - video files, decoded with FFmpeg (feature: ingest-file-ffmpeg)
//!
//! Sources hand out frames one at a time; `Ok(None)` marks the end of input.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::frame::Frame;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];
const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "lot/carPark.mp4") or `stub://name`.
    pub path: String,
    /// Target frame rate (frames per second). Video sources decimate to this rate;
    /// zero keeps every decoded frame.
    pub target_fps: u32,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            target_fps: 0,
            max_frames: None,
        }
    }
}

/// What kind of input a path names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    Synthetic,
    Image,
    Video,
}

impl InputKind {
    pub fn detect(path: &str) -> InputKind {
        if path.starts_with("stub://") {
            return InputKind::Synthetic;
        }
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            InputKind::Video
        } else {
            InputKind::Image
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
    max_frames: Option<u64>,
    frames_emitted: u64,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    Image(ImageFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        let max_frames = config.max_frames;
        let backend = match InputKind::detect(&config.path) {
            InputKind::Synthetic => FileBackend::Synthetic(SyntheticFileSource::new(config)),
            InputKind::Image => FileBackend::Image(ImageFileSource::new(config)),
            InputKind::Video => {
                #[cfg(feature = "ingest-file-ffmpeg")]
                {
                    FileBackend::Ffmpeg(FfmpegFileSource::new(config)?)
                }
                #[cfg(not(feature = "ingest-file-ffmpeg"))]
                {
                    return Err(anyhow!(
                        "video input '{}' requires the ingest-file-ffmpeg feature",
                        config.path
                    ));
                }
            }
        };
        Ok(Self {
            backend,
            max_frames,
            frames_emitted: 0,
        })
    }

    /// Open the underlying input.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            FileBackend::Image(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    /// Next frame, or `None` once the input (or the frame cap) is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(max) = self.max_frames {
            if self.frames_emitted >= max {
                return Ok(None);
            }
        }
        let frame = match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            FileBackend::Image(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }?;
        if frame.is_some() {
            self.frames_emitted += 1;
        }
        Ok(frame)
    }

    pub fn kind(&self) -> InputKind {
        match &self.backend {
            FileBackend::Synthetic(_) => InputKind::Synthetic,
            FileBackend::Image(_) => InputKind::Image,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(_) => InputKind::Video,
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            FileBackend::Synthetic(_) => true,
            FileBackend::Image(source) => source.is_healthy(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            FileBackend::Image(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_captured: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    config: FileConfig,
    frame_count: u64,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("FileSource: connected to {} (synthetic)", self.config.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let index = self.frame_count;
        self.frame_count += 1;
        let pixel_count = (SYNTHETIC_WIDTH * SYNTHETIC_HEIGHT * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + index) % 256) as u8;
        }
        Frame::new(pixels, SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, index).map(Some)
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Still image: one frame, then end of input
// ----------------------------------------------------------------------------

struct ImageFileSource {
    config: FileConfig,
    image: Option<image::RgbImage>,
    frame_count: u64,
    last_error: Option<String>,
}

impl ImageFileSource {
    fn new(config: FileConfig) -> Self {
        Self {
            config,
            image: None,
            frame_count: 0,
            last_error: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        let decoded = image::open(&self.config.path)
            .with_context(|| format!("could not read image from {}", self.config.path));
        match decoded {
            Ok(img) => {
                self.image = Some(img.to_rgb8());
                log::info!("FileSource: loaded still image {}", self.config.path);
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.frame_count == 0 && self.image.is_none() && self.last_error.is_none() {
            self.connect()?;
        }
        match self.image.take() {
            Some(img) => {
                let frame = Frame::from_image(img, self.frame_count);
                self.frame_count += 1;
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }

    fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_kind_from_extension() {
        assert_eq!(InputKind::detect("stub://lot"), InputKind::Synthetic);
        assert_eq!(InputKind::detect("carPark.MP4"), InputKind::Video);
        assert_eq!(InputKind::detect("lot/clip.mov"), InputKind::Video);
        assert_eq!(InputKind::detect("video_frame.jpg"), InputKind::Image);
    }

    #[test]
    fn default_config_keeps_every_frame() {
        assert_eq!(FileConfig::default().target_fps, 0);
    }

    #[test]
    fn rejects_remote_urls() {
        let cfg = FileConfig {
            path: "rtsp://camera/stream".to_string(),
            ..FileConfig::default()
        };
        assert!(FileSource::new(cfg).is_err());
    }

    #[test]
    fn synthetic_source_honours_frame_cap() {
        let mut source = FileSource::new(FileConfig {
            path: "stub://lot".to_string(),
            target_fps: 10,
            max_frames: Some(3),
        })
        .unwrap();
        source.connect().unwrap();

        let mut indices = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!((frame.width, frame.height), (640, 480));
            indices.push(frame.index);
        }
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(source.stats().frames_captured, 3);
    }

    #[test]
    fn still_image_yields_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lot.png");
        image::RgbImage::new(32, 24).save(&path).unwrap();

        let mut source = FileSource::new(FileConfig {
            path: path.to_string_lossy().into_owned(),
            ..FileConfig::default()
        })
        .unwrap();
        assert_eq!(source.kind(), InputKind::Image);
        source.connect().unwrap();

        let frame = source.next_frame().unwrap().expect("one frame");
        assert_eq!((frame.width, frame.height), (32, 24));
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.is_healthy());
    }

    #[test]
    fn unreadable_image_is_an_error() {
        let mut source = FileSource::new(FileConfig {
            path: "/nonexistent/lot.jpg".to_string(),
            ..FileConfig::default()
        })
        .unwrap();
        assert!(source.connect().is_err());
        assert!(!source.is_healthy());
    }
}
