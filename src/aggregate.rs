//! Frame aggregator: one frame's detections against every spot.
//!
//! Each call is evaluated from scratch. Nothing carries over between frames
//! except the spot list the caller passes in.

use crate::detect::{filter_by_confidence, Detection};
use crate::geometry::Rect;
use crate::occupancy::{is_occupied, Thresholds};
use crate::render::{RenderOptions, RenderPlan};
use crate::spots::Spot;

/// Occupancy of a single spot in one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpotStatus {
    pub index: usize,
    pub rect: Rect,
    pub occupied: bool,
}

/// Result of evaluating one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub total: usize,
    pub occupied: usize,
    pub available: usize,
    /// Per-spot results in spot order.
    pub spots: Vec<SpotStatus>,
    /// Detections that passed the confidence cut.
    pub detections: Vec<Detection>,
    pub plan: RenderPlan,
}

impl FrameReport {
    pub fn occupied_indices(&self) -> Vec<usize> {
        self.spots
            .iter()
            .filter(|s| s.occupied)
            .map(|s| s.index)
            .collect()
    }
}

/// Evaluate every spot against one frame's detections.
///
/// Detections scoring at or below `thresholds.confidence` are dropped first.
/// `available` is `total - occupied` and so never negative. An empty spot list
/// yields an all-zero report; an empty detection list leaves every spot vacant.
pub fn process_frame(
    frame_detections: &[Detection],
    spots: &[Spot],
    thresholds: Thresholds,
    options: RenderOptions,
) -> FrameReport {
    let detections = filter_by_confidence(frame_detections, thresholds.confidence);

    let mut plan = RenderPlan::default();
    if options.show_detections {
        plan.push_detections(&detections);
    }

    let mut statuses = Vec::with_capacity(spots.len());
    let mut occupied = 0usize;
    for spot in spots {
        let taken = is_occupied(&detections, &spot.rect, thresholds.overlap);
        if taken {
            occupied += 1;
        }
        let label = options.label_spots.then(|| spot.label());
        plan.push_spot(spot.rect, taken, label);
        statuses.push(SpotStatus {
            index: spot.index,
            rect: spot.rect,
            occupied: taken,
        });
    }

    let total = spots.len();
    let available = total - occupied;
    plan.set_summary(occupied, available);

    FrameReport {
        total,
        occupied,
        available,
        spots: statuses,
        detections,
        plan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{OCCUPIED_COLOR, VACANT_COLOR};
    use crate::spots::SpotStore;

    fn lot() -> SpotStore {
        SpotStore::from_rects(vec![
            Rect::raw(0, 0, 10, 10),
            Rect::raw(20, 0, 30, 10),
            Rect::raw(40, 0, 50, 10),
        ])
    }

    fn thresholds(overlap: f64, confidence: f32) -> Thresholds {
        Thresholds::new(overlap, confidence).unwrap()
    }

    fn evaluate(dets: &[Detection], spots: &[Spot], t: Thresholds) -> FrameReport {
        process_frame(dets, spots, t, RenderOptions::default())
    }

    #[test]
    fn counts_and_plan_follow_spot_order() {
        let spots = lot();
        let dets = vec![
            Detection::new(Rect::raw(0, 0, 10, 10), 0.9),
            Detection::new(Rect::raw(38, 0, 52, 12), 0.8),
        ];
        let report = evaluate(&dets, spots.as_slice(), thresholds(0.3, 0.5));

        assert_eq!(report.total, 3);
        assert_eq!(report.occupied, 2);
        assert_eq!(report.available, 1);
        assert_eq!(report.occupied_indices(), vec![0, 2]);

        let colors: Vec<_> = report.plan.boxes.iter().map(|b| b.color).collect();
        assert_eq!(colors, vec![OCCUPIED_COLOR, VACANT_COLOR, OCCUPIED_COLOR]);
        let labels: Vec<&str> = report.plan.labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(labels, vec!["1", "2", "3"]);
        assert_eq!(
            report.plan.summary.as_ref().map(|s| s.text.as_str()),
            Some("Taken: 2 / Available: 1")
        );
    }

    #[test]
    fn low_confidence_detections_are_ignored() {
        let spots = lot();
        let dets = vec![Detection::new(Rect::raw(0, 0, 10, 10), 0.04)];
        let report = evaluate(&dets, spots.as_slice(), thresholds(0.1, 0.05));
        assert_eq!(report.occupied, 0);
        assert!(report.detections.is_empty());
    }

    #[test]
    fn empty_detections_leave_everything_vacant() {
        let spots = lot();
        let report = evaluate(&[], spots.as_slice(), thresholds(0.1, 0.05));
        assert_eq!((report.occupied, report.available), (0, 3));
    }

    #[test]
    fn no_spots_is_not_an_error() {
        let dets = vec![Detection::new(Rect::raw(0, 0, 10, 10), 0.9)];
        let report = evaluate(&dets, &[], thresholds(0.1, 0.05));
        assert_eq!((report.occupied, report.available), (0, 0));
        assert!(report.spots.is_empty());
        assert_eq!(
            report.plan.summary.map(|s| s.text),
            Some("Taken: 0 / Available: 0".to_string())
        );
    }

    #[test]
    fn counts_always_sum_to_total() {
        let spots = lot();
        let det_sets = vec![
            vec![],
            vec![Detection::new(Rect::raw(0, 0, 100, 100), 1.0)],
            vec![Detection::new(Rect::raw(5, 5, 25, 10), 0.7)],
        ];
        for dets in det_sets {
            let report = evaluate(&dets, spots.as_slice(), thresholds(0.2, 0.0));
            assert_eq!(report.occupied + report.available, report.total);
        }
    }

    #[test]
    fn reprocessing_is_deterministic() {
        let spots = lot();
        let dets = vec![
            Detection::new(Rect::raw(3, 0, 25, 10), 0.6),
            Detection::new(Rect::raw(41, 1, 49, 9), 0.2),
        ];
        let opts = RenderOptions {
            label_spots: true,
            show_detections: true,
        };
        let a = process_frame(&dets, spots.as_slice(), thresholds(0.25, 0.1), opts);
        let b = process_frame(&dets, spots.as_slice(), thresholds(0.25, 0.1), opts);
        assert_eq!(a, b);
        // Two detection overlays plus three spots.
        assert_eq!(a.plan.boxes.len(), 5);
    }

    #[test]
    fn degenerate_spot_counts_as_available() {
        let spots = SpotStore::from_rects(vec![Rect::raw(0, 0, 0, 10), Rect::raw(0, 0, 10, 10)]);
        let dets = vec![Detection::new(Rect::raw(0, 0, 10, 10), 0.9)];
        let report = evaluate(&dets, spots.as_slice(), thresholds(0.1, 0.05));
        assert_eq!(report.occupied_indices(), vec![1]);
        assert_eq!(report.available, 1);
    }

    #[test]
    fn extreme_coordinates_do_not_overflow() {
        let raw = "[[0, -2147483648, 10, 10], [-2147483648, 0, 2147483647, 5]]";
        let spots = SpotStore::load_str(raw).unwrap();
        let dets = vec![Detection::new(Rect::raw(0, 0, 10, 10), 0.9)];
        let report = evaluate(&dets, spots.as_slice(), thresholds(0.1, 0.05));

        assert_eq!(report.total, 2);
        // Both spots dwarf the detection.
        assert_eq!((report.occupied, report.available), (0, 2));
        assert_eq!(report.plan.labels[0].origin, (0, i32::MIN));
    }
}
