#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{non_max_suppression, Detection};
use crate::frame::Frame;
use crate::geometry::Rect;

/// COCO class ids for car, motorcycle, bus and truck. Useful with stock COCO
/// exports; fine-tuned parking models usually score every class.
pub const COCO_VEHICLE_CLASSES: &[usize] = &[2, 3, 5, 7];

const NMS_IOU_THRESHOLD: f32 = 0.45;
const MIN_CANDIDATE_SCORE: f32 = 0.001;

/// Tract-based backend for YOLOv8-style ONNX exports.
///
/// The model is expected to take `[1, 3, H, W]` RGB input in `0..1` and emit
/// `[1, 4 + classes, candidates]` with boxes as centre/size in input pixels.
/// Frames are resized to the model input and boxes scaled back to frame pixels.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    /// Class ids that count as vehicles. Empty scores every class.
    classes: Vec<usize>,
    fallback_logged: bool,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            classes: Vec::new(),
            fallback_logged: false,
        })
    }

    /// Restrict scoring to these class ids. Empty means every class counts.
    pub fn with_classes(mut self, classes: Vec<usize>) -> Self {
        self.classes = classes;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let img = frame.to_image()?;
        let resized = if img.dimensions() == (self.width, self.height) {
            img
        } else {
            imageops::resize(&img, self.width, self.height, FilterType::Triangle)
        };

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }

    fn decode(&mut self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("expected [1, 4 + classes, candidates] model output")?;
        if view.shape()[1] < 5 {
            return Err(anyhow!(
                "model output has {} rows, expected at least 5",
                view.shape()[1]
            ));
        }

        let num_classes = view.shape()[1] - 4;
        let classes = scored_classes(&self.classes, num_classes);
        if !self.fallback_logged
            && !self.classes.is_empty()
            && self.classes.iter().all(|&c| c >= num_classes)
        {
            log::warn!(
                "none of vehicle classes {:?} exist in a {}-class model; scoring every class",
                self.classes,
                num_classes
            );
            self.fallback_logged = true;
        }

        let sx = frame.width as f32 / self.width as f32;
        let sy = frame.height as f32 / self.height as f32;
        let mut candidates = Vec::new();
        for n in 0..view.shape()[2] {
            let score = class_score(&view, &classes, n);
            if score < MIN_CANDIDATE_SCORE {
                continue;
            }
            let (cx, cy) = (view[[0, 0, n]], view[[0, 1, n]]);
            let (w, h) = (view[[0, 2, n]], view[[0, 3, n]]);
            let rect = Rect::from_f32(
                (cx - w / 2.0) * sx,
                (cy - h / 2.0) * sy,
                (cx + w / 2.0) * sx,
                (cy + h / 2.0) * sy,
            );
            candidates.push(Detection::new(rect, score.clamp(0.0, 1.0)));
        }
        Ok(non_max_suppression(candidates, NMS_IOU_THRESHOLD))
    }
}

/// Configured class ids the model actually has, or every class when it has
/// none of them (or none were configured).
fn scored_classes(configured: &[usize], num_classes: usize) -> Vec<usize> {
    let present: Vec<usize> = configured
        .iter()
        .copied()
        .filter(|&c| c < num_classes)
        .collect();
    if present.is_empty() {
        (0..num_classes).collect()
    } else {
        present
    }
}

/// Best score among `classes` for candidate `n` of a `[1, 4 + C, N]` output.
fn class_score(output: &tract_ndarray::ArrayView3<f32>, classes: &[usize], n: usize) -> f32 {
    classes
        .iter()
        .map(|&c| output[[0, 4 + c, n]])
        .fold(0.0, f32::max)
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::blank(self.width, self.height, 0);
        self.detect(&blank).map(|_| ())
    }
}
