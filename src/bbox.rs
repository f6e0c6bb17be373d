use serde_derive::{Deserialize, Serialize};

const EPSILON: f32 = 1e-5;

/// Axis-aligned rectangle in pixel coordinates, left-top-width-height.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rectangle from its center point and size.
    #[inline]
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
        }
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Overlapping region of two rectangles. Degenerate (non-overlapping)
    /// results have zero width or height.
    pub fn intersection(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        Rect {
            x,
            y,
            width: (right - x).max(0.0),
            height: (bottom - y).max(0.0),
        }
    }

    /// Intersection over union; 0.0 when the union is empty.
    pub fn iou(&self, other: &Rect) -> f32 {
        let inter = self.intersection(other).area();
        let union = self.area() + other.area() - inter;

        if union <= EPSILON {
            return 0.0;
        }

        inter / union
    }

    /// Clips the rectangle to `bounds`, keeping only the overlapping part.
    #[inline]
    pub fn clip_to(&self, bounds: &Rect) -> Rect {
        self.intersection(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::Rect;

    #[test]
    fn iou_identical_boxes() {
        let a = Rect::new(10.0, 10.0, 50.0, 50.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn iou_disjoint_boxes() {
        let a = Rect::new(0.0, 0.0, 20.0, 20.0);
        let b = Rect::new(50.0, 50.0, 20.0, 20.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_partial_overlap() {
        let a = Rect::new(0.0, 0.0, 50.0, 50.0);
        let b = Rect::new(25.0, 25.0, 50.0, 50.0);
        // intersection 625, union 4375
        let iou = a.iou(&b);
        assert!(iou > 0.14 && iou < 0.15, "iou = {iou}");
    }

    #[test]
    fn center_roundtrip() {
        let a = Rect::from_center(110.0, 70.0, 40.0, 20.0);
        assert_eq!(a.x, 90.0);
        assert_eq!(a.y, 60.0);
        assert_eq!(a.center(), (110.0, 70.0));
    }

    #[test]
    fn clip_keeps_overlap() {
        let frame = Rect::new(0.0, 0.0, 640.0, 480.0);
        let partly_out = Rect::new(-10.0, 470.0, 30.0, 30.0);
        let clipped = partly_out.clip_to(&frame);
        assert_eq!(clipped, Rect::new(0.0, 470.0, 20.0, 10.0));
    }
}
