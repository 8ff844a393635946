//! Axis-aligned bounding boxes in PDF user space (origin at bottom-left).

use std::fmt;

/// Bounding box defined by its lower-left and upper-right corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl BBox {
    pub fn new(llx: f32, lly: f32, urx: f32, ury: f32) -> Self {
        Self { llx, lly, urx, ury }
    }

    /// Build a box from two arbitrary corners, ordering the coordinates.
    pub fn normalized(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            llx: x0.min(x1),
            lly: y0.min(y1),
            urx: x0.max(x1),
            ury: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// True when the box has no interior.
    pub fn is_empty(&self) -> bool {
        self.llx >= self.urx || self.lly >= self.ury
    }

    /// Smallest box covering both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            llx: self.llx.min(other.llx),
            lly: self.lly.min(other.lly),
            urx: self.urx.max(other.urx),
            ury: self.ury.max(other.ury),
        }
    }

    /// Intersection of the two boxes, or `None` if they share no interior.
    pub fn intersection(&self, other: &BBox) -> Option<BBox> {
        let isect = BBox {
            llx: self.llx.max(other.llx),
            lly: self.lly.max(other.lly),
            urx: self.urx.min(other.urx),
            ury: self.ury.min(other.ury),
        };
        if isect.is_empty() {
            None
        } else {
            Some(isect)
        }
    }

    pub fn overlaps(&self, other: &BBox) -> bool {
        self.intersection(other).is_some()
    }

    /// True when `other` lies entirely within this box.
    pub fn contains(&self, other: &BBox) -> bool {
        self.llx <= other.llx
            && self.lly <= other.lly
            && other.urx <= self.urx
            && other.ury <= self.ury
    }

    /// Intersection over union; 0.0 for disjoint or degenerate boxes.
    pub fn jaccard(&self, other: &BBox) -> f32 {
        let isect_area = self.intersection(other).map_or(0.0, |b| b.area());
        let union_area = self.area() + other.area() - isect_area;
        if union_area <= 0.0 {
            0.0
        } else {
            isect_area / union_area
        }
    }

    /// Fraction of this box's area covered by `other`.
    pub fn relative_overlap(&self, other: &BBox) -> f32 {
        match self.intersection(other) {
            Some(isect) if self.area() > 0.0 => isect.area() / self.area(),
            _ => 0.0,
        }
    }

    pub fn padded(&self, units: f32) -> BBox {
        BBox {
            llx: self.llx - units,
            lly: self.lly - units,
            urx: self.urx + units,
            ury: self.ury + units,
        }
    }

    pub fn horizontally_overlaps(&self, other: &BBox) -> bool {
        self.llx < other.urx && other.llx < self.urx
    }

    pub fn vertically_overlaps(&self, other: &BBox) -> bool {
        self.lly < other.ury && other.lly < self.ury
    }

    /// True when this box lies entirely above `other` (touching edges allowed).
    pub fn is_above(&self, other: &BBox) -> bool {
        self.lly >= other.ury
    }

    pub fn is_below(&self, other: &BBox) -> bool {
        other.is_above(self)
    }

    /// Gap between vertically separated boxes, `None` if they overlap vertically.
    pub fn vertical_distance(&self, other: &BBox) -> Option<f32> {
        if self.is_above(other) {
            Some(self.lly - other.ury)
        } else if other.is_above(self) {
            Some(other.lly - self.ury)
        } else {
            None
        }
    }

    /// Union of all boxes, `None` for an empty input.
    pub fn union_all<'a, I>(boxes: I) -> Option<BBox>
    where
        I: IntoIterator<Item = &'a BBox>,
    {
        boxes
            .into_iter()
            .fold(None, |acc: Option<BBox>, b| match acc {
                Some(u) => Some(u.union(b)),
                None => Some(*b),
            })
    }

    pub fn coord_str(&self) -> String {
        format!(
            "{:.2},{:.2},{:.2},{:.2}",
            self.llx, self.lly, self.urx, self.ury
        )
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BBox({:.1}, {:.1}, {:.1}, {:.1})",
            self.llx, self.lly, self.urx, self.ury
        )
    }
}
