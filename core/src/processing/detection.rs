use crate::frame::{BoundingBox, HotObjectCandidate};
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use imageproc::region_labelling::{connected_components, Connectivity};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Hot-object segmentation parameters, in raw sensor units and pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum delta over background for a pixel to count as hot (64 raw = 1 °C).
    pub threshold: f32,
    pub min_area: usize,
    /// Regions whose centroids are closer than this are merged into one candidate.
    pub merge_distance: f32,
    pub open_radius: u8,
    pub dilate_radius: u8,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 96.0,
            min_area: 30,
            merge_distance: 20.0,
            open_radius: 1,
            dilate_radius: 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RegionAccumulator {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    sum_x: f64,
    sum_y: f64,
    area: usize,
    peak: f32,
}

impl RegionAccumulator {
    fn new(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            sum_x: 0.0,
            sum_y: 0.0,
            area: 0,
            peak: 0.0,
        }
    }

    fn add(&mut self, x: u32, y: u32, value: f32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.sum_x += f64::from(x);
        self.sum_y += f64::from(y);
        self.area += 1;
        self.peak = self.peak.max(value);
    }

    fn into_candidate(self) -> HotObjectCandidate {
        let area = self.area.max(1) as f64;
        HotObjectCandidate::new(
            BoundingBox::new(
                self.min_x,
                self.min_y,
                self.max_x - self.min_x + 1,
                self.max_y - self.min_y + 1,
            ),
            (
                (self.sum_x / area + 0.5) as f32,
                (self.sum_y / area + 0.5) as f32,
            ),
            self.area,
            self.peak,
        )
    }
}

/// Stateless thresholding and blob extraction over a delta map.
pub struct Detector {
    config: DetectorConfig,
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Returns candidates sorted by descending area, ties by top-left corner.
    pub fn detect(&self, delta: &Array2<f32>) -> Vec<HotObjectCandidate> {
        let (rows, cols) = delta.dim();
        if rows == 0 || cols == 0 {
            return Vec::new();
        }

        let threshold = self.config.threshold;
        let mut mask = GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
            if delta[[y as usize, x as usize]] > threshold {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        if self.config.open_radius > 0 {
            mask = morphology::open(&mask, Norm::LInf, self.config.open_radius);
        }
        if self.config.dilate_radius > 0 {
            mask = morphology::dilate(&mask, Norm::LInf, self.config.dilate_radius);
        }

        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
        let mut regions: Vec<Option<RegionAccumulator>> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let id = label.0[0] as usize;
            if id == 0 {
                continue;
            }
            if regions.len() < id {
                regions.resize(id, None);
            }
            regions[id - 1]
                .get_or_insert_with(|| RegionAccumulator::new(x, y))
                .add(x, y, delta[[y as usize, x as usize]]);
        }

        let candidates = regions
            .into_iter()
            .flatten()
            .filter(|region| region.area >= self.config.min_area)
            .map(RegionAccumulator::into_candidate)
            .collect();

        let mut merged = merge_candidates(candidates, self.config.merge_distance);
        merged.sort_by(|a, b| {
            b.area
                .cmp(&a.area)
                .then(a.bbox.y.cmp(&b.bbox.y))
                .then(a.bbox.x.cmp(&b.bbox.x))
        });
        merged
    }
}

/// Repeatedly folds overlapping or nearby candidates together until none change.
fn merge_candidates(
    mut candidates: Vec<HotObjectCandidate>,
    merge_distance: f32,
) -> Vec<HotObjectCandidate> {
    loop {
        let mut changed = false;
        let mut used = vec![false; candidates.len()];
        let mut out = Vec::with_capacity(candidates.len());

        for i in 0..candidates.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            let mut current = candidates[i].clone();
            for j in (i + 1)..candidates.len() {
                if used[j] {
                    continue;
                }
                let other = &candidates[j];
                let close = current.distance_to(other.centroid) < merge_distance;
                if close || current.bbox.intersects(&other.bbox) {
                    current.absorb(other);
                    used[j] = true;
                    changed = true;
                }
            }
            out.push(current);
        }

        candidates = out;
        if !changed {
            return candidates;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_with_squares(
        rows: usize,
        cols: usize,
        squares: &[(usize, usize, usize)],
    ) -> Array2<f32> {
        let mut delta = Array2::zeros((rows, cols));
        for &(x, y, size) in squares {
            for row in y..y + size {
                for col in x..x + size {
                    delta[[row, col]] = 200.0;
                }
            }
        }
        delta
    }

    #[test]
    fn quiet_delta_yields_no_candidates() {
        let detector = Detector::new(DetectorConfig::default());
        let delta = Array2::from_elem((30, 40), 50.0);
        assert!(detector.detect(&delta).is_empty());
    }

    #[test]
    fn square_blob_is_dilated_and_centered() {
        let detector = Detector::new(DetectorConfig::default());
        let delta = delta_with_squares(30, 40, &[(10, 5, 8)]);
        let found = detector.detect(&delta);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bbox, BoundingBox::new(8, 3, 12, 12));
        assert_eq!(found[0].area, 144);
        assert_eq!(found[0].centroid, (14.0, 9.0));
        assert_eq!(found[0].peak, 200.0);
    }

    #[test]
    fn isolated_pixels_are_rejected_as_noise() {
        let detector = Detector::new(DetectorConfig::default());
        let mut delta = Array2::zeros((30, 40));
        delta[[10, 10]] = 500.0;
        delta[[20, 30]] = 500.0;
        assert!(detector.detect(&delta).is_empty());
    }

    #[test]
    fn regions_below_min_area_are_discarded() {
        let detector = Detector::new(DetectorConfig {
            min_area: 100,
            ..Default::default()
        });
        let delta = delta_with_squares(30, 40, &[(10, 10, 4)]);
        assert!(detector.detect(&delta).is_empty());
    }

    #[test]
    fn distant_blobs_are_sorted_by_area() {
        let detector = Detector::new(DetectorConfig::default());
        let delta = delta_with_squares(40, 80, &[(5, 5, 5), (60, 20, 9)]);
        let found = detector.detect(&delta);

        assert_eq!(found.len(), 2);
        assert!(found[0].area > found[1].area);
        assert_eq!(found[0].bbox.x, 58);
    }

    #[test]
    fn nearby_fragments_merge_into_one_candidate() {
        let detector = Detector::new(DetectorConfig::default());
        let delta = delta_with_squares(30, 50, &[(10, 10, 6), (24, 10, 6)]);
        let found = detector.detect(&delta);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].area, 200);
        assert_eq!(found[0].bbox, BoundingBox::new(8, 8, 24, 10));
    }
}
