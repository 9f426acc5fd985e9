//! Detection geometry: bounding boxes and their centroids.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box for one detected object, in image pixel
/// coordinates. Field names match the inference response wire shape,
/// so a prediction object deserializes directly into this type.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Geometric center of the box. Well-defined for degenerate
    /// (zero width or height) boxes too.
    pub fn centroid(&self) -> Point {
        Point {
            x: (self.xmin + self.xmax) / 2.0,
            y: (self.ymin + self.ymax) / 2.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// A point in image pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}
