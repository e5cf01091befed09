use serde::{Deserialize, Serialize};

/// Axis-aligned box in percent (0-100) of the source image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn is_within_image(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width >= 0.0
            && self.height >= 0.0
            && self.right() <= 100.0
            && self.bottom() <= 100.0
    }

    /// Clips the box to the image, keeping the visible part.
    pub fn clamped(&self) -> BoundingBox {
        let x0 = self.x.clamp(0.0, 100.0);
        let y0 = self.y.clamp(0.0, 100.0);
        let x1 = self.right().clamp(0.0, 100.0);
        let y1 = self.bottom().clamp(0.0, 100.0);
        BoundingBox {
            x: x0,
            y: y0,
            width: (x1 - x0).max(0.0),
            height: (y1 - y0).max(0.0),
        }
    }

    pub fn to_pixels(&self, ref_width: f32, ref_height: f32) -> PixelRect {
        PixelRect {
            x: (self.x / 100.0) * ref_width,
            y: (self.y / 100.0) * ref_height,
            width: (self.width / 100.0) * ref_width,
            height: (self.height / 100.0) * ref_height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when either side is below `cutoff` (or not a number).
    pub fn is_degenerate(&self, cutoff: f32) -> bool {
        !(self.width >= cutoff && self.height >= cutoff)
    }

    pub fn clip_to(&self, bounds_w: f32, bounds_h: f32) -> PixelRect {
        let x0 = self.x.clamp(0.0, bounds_w);
        let y0 = self.y.clamp(0.0, bounds_h);
        let x1 = (self.x + self.width).clamp(0.0, bounds_w);
        let y1 = (self.y + self.height).clamp(0.0, bounds_h);
        PixelRect {
            x: x0,
            y: y0,
            width: (x1 - x0).max(0.0),
            height: (y1 - y0).max(0.0),
        }
    }
}

/// Where an image shown with "contain" scaling lands inside its container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayGeometry {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayGeometry {
    pub fn contain(
        container_width: f32,
        container_height: f32,
        natural_width: f32,
        natural_height: f32,
    ) -> Option<Self> {
        if !(container_width > 0.0
            && container_height > 0.0
            && natural_width > 0.0
            && natural_height > 0.0)
        {
            return None;
        }
        let scale = (container_width / natural_width).min(container_height / natural_height);
        let width = natural_width * scale;
        let height = natural_height * scale;
        Some(Self {
            top: (container_height - height) / 2.0,
            left: (container_width - width) / 2.0,
            width,
            height,
        })
    }

    /// Container-relative pixel rect of a block, clipped to the image. The
    /// overlay page script positions its regions the same way.
    pub fn place(&self, bbox: &BoundingBox) -> PixelRect {
        let local = bbox.clamped().to_pixels(self.width, self.height);
        PixelRect {
            x: self.left + local.x,
            y: self.top + local.y,
            width: local.width,
            height: local.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn converts_percent_box_against_reference_size() {
        let rect = BoundingBox::new(10.0, 10.0, 30.0, 10.0).to_pixels(1000.0, 500.0);
        assert!(approx(rect.x, 100.0));
        assert!(approx(rect.y, 50.0));
        assert!(approx(rect.width, 300.0));
        assert!(approx(rect.height, 50.0));
    }

    #[test]
    fn in_range_boxes_stay_inside_reference() {
        let refs = [(1.0, 1.0), (640.0, 480.0), (4032.0, 3024.0), (17.0, 9999.0)];
        let mut boxes = Vec::new();
        for x in [0.0, 12.5, 50.0, 99.0] {
            for w in [0.0, 1.0, 0.5] {
                let width = (100.0 - x) * w;
                boxes.push(BoundingBox::new(x, 100.0 - x - width, width, width));
            }
        }
        for (ref_w, ref_h) in refs {
            for bbox in &boxes {
                assert!(bbox.is_within_image());
                let rect = bbox.to_pixels(ref_w, ref_h);
                assert!(rect.x >= 0.0 && rect.x + rect.width <= ref_w + 1e-3);
                assert!(rect.y >= 0.0 && rect.y + rect.height <= ref_h + 1e-3);
            }
        }
    }

    #[test]
    fn clamps_out_of_range_boxes() {
        let bbox = BoundingBox::new(-5.0, 90.0, 20.0, 20.0);
        assert!(!bbox.is_within_image());
        let clamped = bbox.clamped();
        assert_eq!(clamped, BoundingBox::new(0.0, 90.0, 15.0, 10.0));
    }

    #[test]
    fn degenerate_rects() {
        assert!(PixelRect::new(0.0, 0.0, 0.5, 20.0).is_degenerate(1.0));
        assert!(PixelRect::new(0.0, 0.0, 20.0, 0.0).is_degenerate(1.0));
        assert!(PixelRect::new(0.0, 0.0, f32::NAN, 20.0).is_degenerate(1.0));
        assert!(!PixelRect::new(0.0, 0.0, 1.0, 1.0).is_degenerate(1.0));
    }

    #[test]
    fn clip_to_canvas() {
        let rect = PixelRect::new(-10.0, 450.0, 100.0, 100.0).clip_to(200.0, 500.0);
        assert_eq!(rect, PixelRect::new(0.0, 450.0, 90.0, 50.0));
    }

    #[test]
    fn letterboxes_wide_image_in_tall_container() {
        let geometry = DisplayGeometry::contain(400.0, 400.0, 1000.0, 500.0).unwrap();
        assert!(approx(geometry.width, 400.0));
        assert!(approx(geometry.height, 200.0));
        assert!(approx(geometry.top, 100.0));
        assert!(approx(geometry.left, 0.0));

        let placed = geometry.place(&BoundingBox::new(10.0, 10.0, 30.0, 10.0));
        assert!(approx(placed.x, 40.0));
        assert!(approx(placed.y, 120.0));
        assert!(approx(placed.width, 120.0));
        assert!(approx(placed.height, 20.0));
    }

    #[test]
    fn no_geometry_without_dimensions() {
        assert!(DisplayGeometry::contain(0.0, 400.0, 100.0, 100.0).is_none());
        assert!(DisplayGeometry::contain(400.0, 400.0, 0.0, 100.0).is_none());
    }
}
