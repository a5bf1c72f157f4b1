use serde::{Deserialize, Serialize};

/// Axis-aligned box in image pixel coordinates.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OmrBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub width: i32,
    pub height: i32,
}

impl OmrBox {
    pub fn with_x1y1_x2y2(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.round() as i32,
            y1: y1.round() as i32,
            x2: x2.round() as i32,
            y2: y2.round() as i32,
            width: (x2 - x1).round() as i32,
            height: (y2 - y1).round() as i32,
        }
    }

    pub fn area(&self) -> i32 {
        (self.x2 - self.x1) * (self.y2 - self.y1)
    }

    /// Computes the intersection area between this box and another.
    pub fn intersect(&self, other: &OmrBox) -> i32 {
        let w = self.x2.min(other.x2) - self.x1.max(other.x1);
        let h = self.y2.min(other.y2) - self.y1.max(other.y1);
        if w <= 0 || h <= 0 {
            return 0;
        }
        w * h
    }

    /// Computes the union area between this box and another.
    pub fn union(&self, other: &OmrBox) -> i32 {
        self.area() + other.area() - self.intersect(other)
    }

    pub fn iou(&self, other: &OmrBox) -> f32 {
        let union = self.union(other);
        if union <= 0 {
            return 0.0;
        }
        self.intersect(other) as f32 / union as f32
    }

    pub fn as_xy_wh_i32(&self) -> (i32, i32, i32, i32) {
        (self.x1, self.y1, self.width, self.height)
    }
}

/// A single detected box with its class and confidence. Ordered per
/// inference call; immutable per request.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmrDetection {
    pub class_id: usize,
    pub label: Option<String>,
    pub confidence: f32,
    pub bbox: OmrBox,
}

impl OmrDetection {
    pub fn new(class_id: usize, label: Option<String>, confidence: f32, bbox: OmrBox) -> Self {
        Self {
            class_id,
            label,
            confidence,
            bbox,
        }
    }

    pub fn get_label(&self) -> String {
        self.label.clone().unwrap_or("Unknown".to_string())
    }
}
