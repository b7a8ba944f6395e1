//! Local video file source using FFmpeg.
//!
//! Decodes the best video stream to RGB24 in memory, decimating to the
//! configured target frame rate. End of file flushes the decoder and then
//! reports end of input.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::{FileConfig, FileStats};
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    /// Keep one decoded frame in every `stride`.
    stride: u64,
    decoded_count: u64,
    frame_count: u64,
    eof_sent: bool,
    connected: bool,
    last_error: Option<String>,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("failed to initialise ffmpeg")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open video '{}' with ffmpeg", config.path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("{} has no video stream", config.path))?;
        let stream_index = input_stream.index();
        let rate = input_stream.avg_frame_rate();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("unsupported video codec parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("failed to open video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("failed to set up RGB conversion")?;

        let source_fps = if rate.denominator() > 0 {
            f64::from(rate.numerator()) / f64::from(rate.denominator())
        } else {
            0.0
        };
        let stride = decimation_stride(source_fps, config.target_fps);

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            stride,
            decoded_count: 0,
            frame_count: 0,
            eof_sent: false,
            connected: false,
            last_error: None,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "FileSource: connected to {} (ffmpeg, keeping 1 of every {} frames)",
            self.config.path,
            self.stride
        );
        Ok(())
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.receive_decoded()? {
                return Ok(Some(frame));
            }
            if self.eof_sent {
                return Ok(None);
            }

            let mut fed = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")
                    .inspect_err(|e| self.last_error = Some(e.to_string()))?;
                fed = true;
                break;
            }
            if !fed {
                self.decoder.send_eof().context("flush ffmpeg decoder")?;
                self.eof_sent = true;
            }
        }
    }

    /// Pull decoded frames until one survives decimation.
    fn receive_decoded(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let keep = self.decoded_count % self.stride == 0;
            self.decoded_count += 1;
            if !keep {
                continue;
            }
            let mut rgb_frame = ffmpeg::frame::Video::empty();
            self.scaler
                .run(&decoded, &mut rgb_frame)
                .context("RGB conversion failed")?;
            let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
            let frame = Frame::new(pixels, width, height, self.frame_count)?;
            self.frame_count += 1;
            return Ok(Some(frame));
        }
        Ok(None)
    }

    pub(crate) fn is_healthy(&self) -> bool {
        self.connected && self.last_error.is_none()
    }

    pub(crate) fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.frame_count,
            path: self.config.path.clone(),
        }
    }
}

fn decimation_stride(source_fps: f64, target_fps: u32) -> u64 {
    if target_fps == 0 || source_fps <= 0.0 {
        return 1;
    }
    ((source_fps / f64::from(target_fps)).round() as u64).max(1)
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok((data[..row_bytes * height as usize].to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("decoded row exceeds frame buffer")?,
        );
    }

    Ok((pixels, width, height))
}
