/// Axis-aligned pixel rectangle, `x`/`y` at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// Touching edges count as intersecting.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.right() < other.x
            || other.right() < self.x
            || self.bottom() < other.y
            || other.bottom() < self.y)
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BoundingBox::new(x, y, right - x, bottom - y)
    }
}

/// Warm region found in a single background-subtracted frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HotObjectCandidate {
    pub bbox: BoundingBox,
    pub centroid: (f32, f32),
    pub area: usize,
    pub peak: f32,
}

impl HotObjectCandidate {
    pub fn new(bbox: BoundingBox, centroid: (f32, f32), area: usize, peak: f32) -> Self {
        Self {
            bbox,
            centroid,
            area,
            peak,
        }
    }

    pub fn distance_to(&self, point: (f32, f32)) -> f32 {
        let dx = self.centroid.0 - point.0;
        let dy = self.centroid.1 - point.1;
        (dx * dx + dy * dy).sqrt()
    }

    /// Folds `other` into this candidate; the centroid is area-weighted.
    pub fn absorb(&mut self, other: &HotObjectCandidate) {
        let total = (self.area + other.area).max(1) as f32;
        let wa = self.area as f32 / total;
        let wb = other.area as f32 / total;
        self.centroid = (
            self.centroid.0 * wa + other.centroid.0 * wb,
            self.centroid.1 * wa + other.centroid.1 * wb,
        );
        self.bbox = self.bbox.union(&other.bbox);
        self.area += other.area;
        self.peak = self.peak.max(other.peak);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxes_sharing_an_edge_intersect() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(10, 0, 5, 5);
        let c = BoundingBox::new(11, 0, 5, 5);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn absorb_weights_centroid_by_area() {
        let mut big = HotObjectCandidate::new(BoundingBox::new(0, 0, 4, 4), (2.0, 2.0), 30, 100.0);
        let small = HotObjectCandidate::new(BoundingBox::new(8, 0, 2, 2), (9.0, 1.0), 10, 150.0);
        big.absorb(&small);

        assert_eq!(big.area, 40);
        assert_eq!(big.bbox, BoundingBox::new(0, 0, 10, 4));
        assert_eq!(big.peak, 150.0);
        assert!((big.centroid.0 - 3.75).abs() < 1e-5);
    }
}
