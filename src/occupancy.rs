//! Occupancy evaluator.
//!
//! A spot is occupied when some detection covers more than `overlap_threshold`
//! of the spot's own area. The denominator is the spot area, not the union:
//! a car box swallowing the whole spot scores 1.0, and so does a small box
//! fully inside the spot, as long as it covers enough of it.

use anyhow::{anyhow, Result};

use crate::detect::Detection;
use crate::geometry::Rect;

/// Fraction of `spot` covered by `det`. Zero for disjoint boxes and for
/// degenerate spots.
pub fn overlap_ratio(spot: &Rect, det: &Rect) -> f64 {
    let spot_area = spot.area();
    if spot_area == 0 {
        return 0.0;
    }
    match spot.intersection(det) {
        Some(inter) => inter.area() as f64 / spot_area as f64,
        None => 0.0,
    }
}

/// True when any detection covers strictly more than `overlap_threshold` of
/// the spot. Stops at the first match.
///
/// Detections are used as given; confidence filtering is the caller's job.
/// A zero-area spot is never occupied.
pub fn is_occupied(detections: &[Detection], spot: &Rect, overlap_threshold: f64) -> bool {
    if spot.is_degenerate() {
        return false;
    }
    detections.iter().any(|det| {
        let ratio = overlap_ratio(spot, &det.rect);
        log::trace!(
            "spot {} vs detection {} (conf {:.2}): overlap {:.2}",
            spot,
            det.rect,
            det.confidence,
            ratio
        );
        ratio > overlap_threshold
    })
}

/// Overlap and confidence cut-offs for a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    /// Minimum covered fraction of a spot, exclusive. Must lie in `(0, 1)`.
    pub overlap: f64,
    /// Detections at or below this confidence are ignored. Must lie in `[0, 1]`.
    pub confidence: f32,
}

impl Thresholds {
    pub fn new(overlap: f64, confidence: f32) -> Result<Self> {
        let thresholds = Self {
            overlap,
            confidence,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.overlap > 0.0 && self.overlap < 1.0) {
            return Err(anyhow!(
                "overlap threshold must be strictly between 0 and 1 (got {})",
                self.overlap
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(anyhow!(
                "confidence threshold must be between 0 and 1 (got {})",
                self.confidence
            ));
        }
        Ok(())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            overlap: 0.1,
            confidence: 0.05,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn det(x1: i32, y1: i32, x2: i32, y2: i32) -> Detection {
        Detection::new(Rect::raw(x1, y1, x2, y2), 0.9)
    }

    #[test]
    fn half_covered_spot() {
        let spot = Rect::raw(0, 0, 10, 10);
        let dets = [det(0, 0, 5, 10)];
        assert!((overlap_ratio(&spot, &dets[0].rect) - 0.5).abs() < 1e-12);
        assert!(is_occupied(&dets, &spot, 0.3));
        assert!(!is_occupied(&dets, &spot, 0.6));
    }

    #[test]
    fn threshold_is_exclusive() {
        let spot = Rect::raw(0, 0, 10, 10);
        assert!(!is_occupied(&[det(0, 0, 5, 10)], &spot, 0.5));
    }

    #[test]
    fn identical_box_is_full_overlap() {
        let spot = Rect::raw(12, 40, 60, 95);
        assert_eq!(overlap_ratio(&spot, &spot), 1.0);
        assert!(is_occupied(&[det(12, 40, 60, 95)], &spot, 0.99));
    }

    #[test]
    fn spot_inside_large_detection_is_full_overlap() {
        let spot = Rect::raw(10, 10, 20, 20);
        assert_eq!(overlap_ratio(&spot, &Rect::raw(0, 0, 100, 100)), 1.0);
    }

    #[test]
    fn small_detection_inside_spot_needs_enough_area() {
        let spot = Rect::raw(0, 0, 100, 100);
        // 10x10 box inside a 100x100 spot covers 1%.
        let dets = [det(40, 40, 50, 50)];
        assert!(!is_occupied(&dets, &spot, 0.1));
        assert!(is_occupied(&dets, &spot, 0.005));
    }

    #[test]
    fn disjoint_boxes_never_occupy() {
        let spot = Rect::raw(0, 0, 10, 10);
        let dets = [det(10, 0, 20, 10), det(0, 20, 10, 30)];
        for threshold in [1e-9, 0.01, 0.5, 0.99] {
            assert!(!is_occupied(&dets, &spot, threshold));
        }
    }

    #[test]
    fn degenerate_spot_is_always_vacant() {
        let spot = Rect::raw(5, 5, 5, 50);
        assert_eq!(overlap_ratio(&spot, &Rect::raw(0, 0, 100, 100)), 0.0);
        assert!(!is_occupied(&[det(0, 0, 100, 100)], &spot, 1e-9));
    }

    #[test]
    fn empty_detections_are_vacant() {
        assert!(!is_occupied(&[], &Rect::raw(0, 0, 10, 10), 0.1));
    }

    #[test]
    fn any_match_suffices() {
        let spot = Rect::raw(0, 0, 10, 10);
        let dets = [det(50, 50, 60, 60), det(0, 0, 10, 8)];
        assert!(is_occupied(&dets, &spot, 0.7));
    }

    #[test]
    fn lowering_threshold_never_frees_a_spot() {
        fn random_rect(rng: &mut StdRng) -> Rect {
            let x1 = rng.gen_range(0..200);
            let y1 = rng.gen_range(0..200);
            Rect::raw(x1, y1, x1 + rng.gen_range(1..80), y1 + rng.gen_range(1..80))
        }

        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..500 {
            let spot = random_rect(&mut rng);
            let dets: Vec<Detection> = (0..rng.gen_range(0..4))
                .map(|_| Detection::new(random_rect(&mut rng), 0.9))
                .collect();
            let high: f64 = rng.gen_range(0.01..0.99);
            let low: f64 = rng.gen_range(0.001..high);
            if is_occupied(&dets, &spot, high) {
                assert!(is_occupied(&dets, &spot, low));
            }
        }
    }

    #[test]
    fn thresholds_validate_ranges() {
        assert!(Thresholds::new(0.3, 0.5).is_ok());
        assert!(Thresholds::new(0.0, 0.5).is_err());
        assert!(Thresholds::new(1.0, 0.5).is_err());
        assert!(Thresholds::new(0.3, -0.1).is_err());
        assert!(Thresholds::new(0.3, 1.0).is_ok());
        assert!(Thresholds::new(f64::NAN, 0.5).is_err());
        assert!(Thresholds::default().validate().is_ok());
    }
}
