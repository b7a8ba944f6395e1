use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// A candidate vehicle box from one frame.
///
/// Detections carry no identity across frames; each frame's list is built
/// fresh by the detector and dropped after evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 5]", into = "[f32; 5]")]
pub struct Detection {
    pub rect: Rect,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Detection {
    pub fn new(rect: Rect, confidence: f32) -> Self {
        Self { rect, confidence }
    }
}

/// `[x1, y1, x2, y2, confidence]`, as written by detector dumps.
impl From<[f32; 5]> for Detection {
    fn from(v: [f32; 5]) -> Self {
        Self {
            rect: Rect::from_f32(v[0], v[1], v[2], v[3]),
            confidence: v[4],
        }
    }
}

impl From<Detection> for [f32; 5] {
    fn from(d: Detection) -> Self {
        [
            d.rect.x1 as f32,
            d.rect.y1 as f32,
            d.rect.x2 as f32,
            d.rect.y2 as f32,
            d.confidence,
        ]
    }
}

/// Keep detections scoring strictly above `min_confidence`.
pub fn filter_by_confidence(detections: &[Detection], min_confidence: f32) -> Vec<Detection> {
    detections
        .iter()
        .filter(|d| d.confidence > min_confidence)
        .copied()
        .collect()
}

/// Intersection over union of two boxes.
pub fn iou(a: &Rect, b: &Rect) -> f32 {
    let inter = a.intersection(b).map(|r| r.area()).unwrap_or(0);
    let union = a.area() + b.area() - inter;
    if union <= 0 {
        return 0.0;
    }
    inter as f32 / union as f32
}

/// Greedy non-maximum suppression, highest confidence first.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        if kept.iter().all(|k| iou(&k.rect, &det.rect) <= iou_threshold) {
            kept.push(det);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_detector_dump_rows() {
        let dets: Vec<Detection> =
            serde_json::from_str("[[0, 0, 5.9, 10, 0.9], [1.5, 2, 3, 4, 0.1]]").unwrap();
        assert_eq!(dets[0].rect, Rect::raw(0, 0, 5, 10));
        assert_eq!(dets[1].rect, Rect::raw(1, 2, 3, 4));
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn confidence_filter_is_strict() {
        let dets = vec![
            Detection::new(Rect::raw(0, 0, 1, 1), 0.05),
            Detection::new(Rect::raw(0, 0, 1, 1), 0.06),
        ];
        let kept = filter_by_confidence(&dets, 0.05);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].confidence - 0.06).abs() < 1e-6);
    }

    #[test]
    fn nms_drops_overlapping_lower_scores() {
        let dets = vec![
            Detection::new(Rect::raw(0, 0, 10, 10), 0.6),
            Detection::new(Rect::raw(1, 1, 10, 10), 0.9),
            Detection::new(Rect::raw(50, 50, 60, 60), 0.3),
        ];
        let kept = non_max_suppression(dets, 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].rect, Rect::raw(1, 1, 10, 10));
        assert_eq!(kept[1].rect, Rect::raw(50, 50, 60, 60));
    }
}
