use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::aggregate::FrameReport;
use crate::frame::Frame;
use crate::pipeline::{FrameSink, LogSink};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Terminal feedback for the CLIs: spinners on a TTY, plain stderr lines otherwise.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    fn spinner(message: String) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message);
        spinner
    }

    /// Announce a stage; completion (with elapsed time) is reported on drop.
    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty() {
            StageGuard::new(name.to_string(), Some(Self::spinner(format!("{name}…"))))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// A sink that shows the live occupancy counter while frames stream through.
    pub fn frame_progress(&self) -> ProgressSink {
        let spinner = self
            .pretty()
            .then(|| Self::spinner("waiting for first frame".to_string()));
        ProgressSink { spinner }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Updates a spinner with each frame's summary. Off a TTY the counter goes to
/// the log instead, one line per frame.
pub struct ProgressSink {
    spinner: Option<ProgressBar>,
}

impl ProgressSink {
    /// True when frames update a live spinner rather than the log.
    pub fn is_live(&self) -> bool {
        self.spinner.is_some()
    }
}

impl FrameSink for ProgressSink {
    fn consume(&mut self, frame: &Frame, report: &FrameReport) -> anyhow::Result<()> {
        match (&self.spinner, &report.plan.summary) {
            (Some(spinner), Some(summary)) => {
                spinner.set_message(format!("frame {} | {}", frame.index, summary.text));
                Ok(())
            }
            (Some(_), None) => Ok(()),
            (None, _) => LogSink.consume(frame, report),
        }
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        Ok(())
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_flag_parsing() {
        assert!(!Ui::from_args(Some("plain"), true).pretty());
        assert!(Ui::from_args(Some("pretty"), true).pretty());
        assert!(Ui::from_args(None, true).pretty());
        assert!(!Ui::from_args(Some("pretty"), false).pretty());
    }

    #[test]
    fn progress_falls_back_to_log_lines_off_a_tty() {
        let mut sink = Ui::from_args(None, false).frame_progress();
        assert!(!sink.is_live());

        let report = crate::aggregate::process_frame(
            &[],
            &[],
            crate::occupancy::Thresholds::default(),
            crate::render::RenderOptions::default(),
        );
        sink.consume(&Frame::blank(4, 4, 0), &report).unwrap();
        sink.finish().unwrap();

        assert!(!Ui::from_args(Some("plain"), true).frame_progress().is_live());
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
