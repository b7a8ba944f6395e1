//! Frame-processing loop.
//!
//! Pulls frames from a source, asks the detector for boxes, aggregates spot
//! occupancy, and hands each report to a sink. Frames are processed strictly
//! one after another; the only state that survives a frame is the immutable
//! spot list and the last good report (reused when the detector fails).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::aggregate::{process_frame, FrameReport};
use crate::detect::DetectorBackend;
use crate::frame::Frame;
use crate::ingest::FileSource;
use crate::occupancy::Thresholds;
use crate::render::{draw_plan, LabelFont, RenderOptions};
use crate::spots::SpotStore;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Anything that can hand out frames until the input ends.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        FileSource::next_frame(self)
    }
}

/// Replays an already-read frame before handing over to the wrapped source.
///
/// Lets a caller inspect the first frame (to learn the frame size) without
/// losing it from the run.
pub struct PeekedSource<S> {
    first: Option<Frame>,
    rest: S,
}

impl<S: FrameSource> PeekedSource<S> {
    pub fn new(first: Frame, rest: S) -> Self {
        Self {
            first: Some(first),
            rest,
        }
    }

    pub fn inner(&self) -> &S {
        &self.rest
    }
}

impl<S: FrameSource> FrameSource for PeekedSource<S> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.first.take() {
            Some(frame) => Ok(Some(frame)),
            None => self.rest.next_frame(),
        }
    }
}

/// Receives each processed frame with its report.
pub trait FrameSink {
    fn consume(&mut self, frame: &Frame, report: &FrameReport) -> Result<()>;

    /// Called once after the last frame.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Outcome of evaluating one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    Processed(FrameReport),
    /// The detector failed; `previous` is the last good report, if any.
    Skipped { previous: Option<FrameReport> },
}

/// Totals for a finished run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    /// True when the run ended because the stop flag was raised.
    pub interrupted: bool,
    pub last_occupied: usize,
    pub last_available: usize,
}

/// Detector + spots + thresholds, driven frame by frame.
pub struct Pipeline<D: DetectorBackend> {
    spots: SpotStore,
    thresholds: Thresholds,
    options: RenderOptions,
    detector: D,
    last_report: Option<FrameReport>,
}

impl<D: DetectorBackend> Pipeline<D> {
    pub fn new(spots: SpotStore, thresholds: Thresholds, detector: D) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self {
            spots,
            thresholds,
            options: RenderOptions::default(),
            detector,
            last_report: None,
        })
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn spots(&self) -> &SpotStore {
        &self.spots
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Evaluate one frame. Detector errors are returned to the caller as-is.
    pub fn evaluate(&mut self, frame: &Frame) -> Result<FrameReport> {
        let detections = self
            .detector
            .detect(frame)
            .with_context(|| {
                format!(
                    "detector '{}' failed on frame {}",
                    self.detector.name(),
                    frame.index
                )
            })?;
        Ok(process_frame(
            &detections,
            self.spots.as_slice(),
            self.thresholds,
            self.options,
        ))
    }

    /// Evaluate one frame, skipping it if the detector fails.
    pub fn process(&mut self, frame: &Frame) -> FrameOutcome {
        match self.evaluate(frame) {
            Ok(report) => {
                log::debug!(
                    "frame {}: {} detections, taken {} / available {}",
                    frame.index,
                    report.detections.len(),
                    report.occupied,
                    report.available
                );
                self.last_report = Some(report.clone());
                FrameOutcome::Processed(report)
            }
            Err(e) => {
                log::warn!("skipping frame {}: {:#}", frame.index, e);
                FrameOutcome::Skipped {
                    previous: self.last_report.clone(),
                }
            }
        }
    }

    /// Drive the loop until the source ends or `stop` is raised.
    ///
    /// Skipped frames re-send the previous report to the sink so the output
    /// stream keeps one entry per input frame. Source and sink errors end the run.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K, stop: &AtomicBool) -> Result<RunStats>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        self.detector.warm_up().context("detector warm-up failed")?;

        let mut stats = RunStats::default();
        let mut last_health_log = Instant::now();

        loop {
            if stop.load(Ordering::SeqCst) {
                log::info!("stop requested; ending run");
                stats.interrupted = true;
                break;
            }
            let Some(frame) = source.next_frame()? else {
                break;
            };

            match self.process(&frame) {
                FrameOutcome::Processed(report) => {
                    stats.frames_processed += 1;
                    stats.last_occupied = report.occupied;
                    stats.last_available = report.available;
                    sink.consume(&frame, &report)?;
                }
                FrameOutcome::Skipped { previous } => {
                    stats.frames_skipped += 1;
                    if let Some(report) = previous {
                        sink.consume(&frame, &report)?;
                    }
                }
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                log::info!(
                    "processed={} skipped={} taken={} available={}",
                    stats.frames_processed,
                    stats.frames_skipped,
                    stats.last_occupied,
                    stats.last_available
                );
                last_health_log = Instant::now();
            }
        }

        sink.finish()?;
        Ok(stats)
    }
}

// ----------------------------------------------------------------------------
// Sinks
// ----------------------------------------------------------------------------

/// Logs each report's counters.
#[derive(Default)]
pub struct LogSink;

impl FrameSink for LogSink {
    fn consume(&mut self, frame: &Frame, report: &FrameReport) -> Result<()> {
        if let Some(summary) = &report.plan.summary {
            log::info!("frame {}: {}", frame.index, summary.text);
        }
        Ok(())
    }
}

/// Writes each annotated frame as `<stem>_processed[_NNNNNN].jpg`.
///
/// Single-image runs get one file without a sequence suffix, matching the
/// `_processed.jpg` naming of the still-image mode.
pub struct ImageDirSink {
    dir: PathBuf,
    stem: String,
    sequence: bool,
    font: LabelFont,
    written: u64,
}

impl ImageDirSink {
    pub fn new(dir: PathBuf, stem: &str, sequence: bool) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            stem: stem.to_string(),
            sequence,
            font: LabelFont::embedded()?,
            written: 0,
        })
    }

    /// Draw labels and the counter with `font` instead of the built-in one.
    pub fn with_font(mut self, font: LabelFont) -> Self {
        self.font = font;
        self
    }

    pub fn path_for(&self, frame_index: u64) -> PathBuf {
        if self.sequence {
            self.dir
                .join(format!("{}_processed_{:06}.jpg", self.stem, frame_index))
        } else {
            self.dir.join(format!("{}_processed.jpg", self.stem))
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for ImageDirSink {
    fn consume(&mut self, frame: &Frame, report: &FrameReport) -> Result<()> {
        let mut img = frame.to_image()?;
        draw_plan(&mut img, &report.plan, &self.font);
        let path = self.path_for(frame.index);
        img.save(&path)
            .with_context(|| format!("failed to write annotated frame {}", path.display()))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        log::info!(
            "wrote {} annotated frame(s) to {}",
            self.written,
            self.dir.display()
        );
        Ok(())
    }
}

/// Fans a report out to several sinks in order.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn FrameSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<K: FrameSink + 'static>(mut self, sink: K) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl FrameSink for MultiSink {
    fn consume(&mut self, frame: &Frame, report: &FrameReport) -> Result<()> {
        for sink in &mut self.sinks {
            sink.consume(frame, report)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            sink.finish()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, StubBackend};
    use crate::geometry::Rect;
    use anyhow::anyhow;

    struct VecSource {
        frames: std::vec::IntoIter<Frame>,
    }

    impl VecSource {
        fn blank(count: u64) -> Self {
            let frames: Vec<Frame> = (0..count).map(|i| Frame::blank(20, 20, i)).collect();
            Self {
                frames: frames.into_iter(),
            }
        }
    }

    impl FrameSource for VecSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            Ok(self.frames.next())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        seen: Vec<(u64, usize, usize)>,
        finished: bool,
    }

    impl FrameSink for RecordingSink {
        fn consume(&mut self, frame: &Frame, report: &FrameReport) -> Result<()> {
            self.seen.push((frame.index, report.occupied, report.available));
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    /// Fails on the listed frame indices, otherwise covers the first spot.
    struct FlakyBackend {
        fail_on: Vec<u64>,
    }

    impl DetectorBackend for FlakyBackend {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
            if self.fail_on.contains(&frame.index) {
                return Err(anyhow!("inference timed out"));
            }
            Ok(vec![Detection::new(Rect::raw(0, 0, 10, 10), 0.9)])
        }
    }

    fn spots() -> SpotStore {
        SpotStore::from_rects(vec![Rect::raw(0, 0, 10, 10), Rect::raw(10, 10, 20, 20)])
    }

    #[test]
    fn runs_every_frame_through_the_sink() {
        let detector = StubBackend::new(vec![Detection::new(Rect::raw(0, 0, 10, 10), 0.9)]);
        let mut pipeline = Pipeline::new(spots(), Thresholds::default(), detector).unwrap();
        let mut sink = RecordingSink::default();
        let stop = AtomicBool::new(false);

        let stats = pipeline
            .run(&mut VecSource::blank(3), &mut sink, &stop)
            .unwrap();

        assert_eq!(stats.frames_processed, 3);
        assert_eq!(stats.frames_skipped, 0);
        assert!(!stats.interrupted);
        assert_eq!(sink.seen, vec![(0, 1, 1), (1, 1, 1), (2, 1, 1)]);
        assert!(sink.finished);
    }

    #[test]
    fn detector_failure_reuses_previous_report() {
        let detector = FlakyBackend { fail_on: vec![0, 2] };
        let mut pipeline = Pipeline::new(spots(), Thresholds::default(), detector).unwrap();
        let mut sink = RecordingSink::default();
        let stop = AtomicBool::new(false);

        let stats = pipeline
            .run(&mut VecSource::blank(4), &mut sink, &stop)
            .unwrap();

        assert_eq!(stats.frames_processed, 2);
        assert_eq!(stats.frames_skipped, 2);
        // Frame 0 has nothing to fall back on; frame 2 repeats frame 1's report.
        assert_eq!(sink.seen, vec![(1, 1, 1), (2, 1, 1), (3, 1, 1)]);
    }

    #[test]
    fn stop_flag_ends_run_before_next_frame() {
        let mut pipeline =
            Pipeline::new(spots(), Thresholds::default(), StubBackend::empty()).unwrap();
        let mut sink = RecordingSink::default();
        let stop = AtomicBool::new(true);

        let stats = pipeline
            .run(&mut VecSource::blank(5), &mut sink, &stop)
            .unwrap();

        assert!(stats.interrupted);
        assert_eq!(stats.frames_processed, 0);
        assert!(sink.seen.is_empty());
    }

    #[test]
    fn peeked_frame_comes_first() {
        let mut source = VecSource::blank(3);
        let first = source.next_frame().unwrap().unwrap();
        let mut peeked = PeekedSource::new(first, source);

        let mut indices = Vec::new();
        while let Some(frame) = peeked.next_frame().unwrap() {
            indices.push(frame.index);
        }
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let bad = Thresholds {
            overlap: 1.5,
            confidence: 0.1,
        };
        assert!(Pipeline::new(spots(), bad, StubBackend::empty()).is_err());
    }

    #[test]
    fn image_sink_names_files_by_mode() {
        let dir = tempfile::tempdir().unwrap();
        let single = ImageDirSink::new(dir.path().to_path_buf(), "lot", false).unwrap();
        assert_eq!(single.path_for(0), dir.path().join("lot_processed.jpg"));

        let seq = ImageDirSink::new(dir.path().join("frames"), "clip", true).unwrap();
        assert_eq!(
            seq.path_for(12),
            dir.path().join("frames").join("clip_processed_000012.jpg")
        );
        assert!(dir.path().join("frames").is_dir());
    }

    #[test]
    fn image_sink_writes_annotated_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageDirSink::new(dir.path().to_path_buf(), "lot", false).unwrap();
        let frame = Frame::blank(20, 20, 0);
        let report = process_frame(
            &[Detection::new(Rect::raw(0, 0, 10, 10), 0.9)],
            spots().as_slice(),
            Thresholds::default(),
            RenderOptions::default(),
        );

        sink.consume(&frame, &report).unwrap();
        sink.finish().unwrap();

        assert_eq!(sink.written(), 1);
        let written = image::open(dir.path().join("lot_processed.jpg")).unwrap();
        assert_eq!((written.width(), written.height()), (20, 20));
    }

    #[test]
    fn written_frames_carry_the_counter() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageDirSink::new(dir.path().to_path_buf(), "lot", false).unwrap();
        let frame = Frame::blank(320, 60, 0);
        let report = process_frame(&[], &[], Thresholds::default(), RenderOptions::default());

        sink.consume(&frame, &report).unwrap();

        let written = image::open(dir.path().join("lot_processed.jpg"))
            .unwrap()
            .to_rgb8();
        let bright = written
            .enumerate_pixels()
            .filter(|(x, y, p)| *x >= 10 && *y < 34 && p.0.iter().all(|&c| c > 128))
            .count();
        assert!(bright > 20, "expected counter text, found {bright} bright pixels");
    }
}
