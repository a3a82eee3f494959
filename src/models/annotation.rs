//! Annotation types: strokes and per-slide collections.
//!
//! The cache treats stroke contents as an opaque payload: it copies, counts,
//! and persists them, but never interprets geometry. Rendering belongs to the
//! overlay surface, not to this crate.

use crate::current_timestamp;
use serde::{Deserialize, Serialize};

/// A single sampled point of an ink stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    /// Horizontal position in canvas coordinates.
    pub x: f32,
    /// Vertical position in canvas coordinates.
    pub y: f32,
    /// Pen pressure in `[0, 1]`; 1.0 for devices without pressure.
    #[serde(default = "default_pressure")]
    pub pressure: f32,
}

const fn default_pressure() -> f32 {
    1.0
}

/// Drawing attributes attached to a stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    /// Stroke color as `#RRGGBB` or `#AARRGGBB`.
    pub color: String,
    /// Stroke width in canvas units.
    pub width: f32,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: "#FF0000".to_string(),
            width: 3.0,
        }
    }
}

/// One drawn stroke: an ordered point sequence plus its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Ordered sample points.
    pub points: Vec<StrokePoint>,
    /// Visual attributes.
    #[serde(default)]
    pub style: StrokeStyle,
}

impl Stroke {
    /// Creates a stroke from points with the default style.
    #[must_use]
    pub fn new(points: Vec<StrokePoint>) -> Self {
        Self {
            points,
            style: StrokeStyle::default(),
        }
    }

    /// Number of sample points in the stroke.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the stroke carries no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// The annotation state of one slide.
///
/// Owned exclusively by the cache while a document is connected; written
/// through to the store on eviction or session end.
#[derive(Debug, Clone)]
pub struct SlideAnnotation {
    /// 1-based slide index.
    pub slide_index: i32,
    /// Ordered strokes on the slide.
    pub strokes: Vec<Stroke>,
    /// True when in-memory strokes differ from the last successful save.
    pub dirty: bool,
    /// Unix timestamp of the last load or mutation.
    pub last_touched: u64,
}

impl SlideAnnotation {
    /// Creates an empty annotation for a slide.
    #[must_use]
    pub fn empty(slide_index: i32) -> Self {
        Self {
            slide_index,
            strokes: Vec::new(),
            dirty: false,
            last_touched: current_timestamp(),
        }
    }

    /// Creates an annotation from previously persisted strokes.
    #[must_use]
    pub fn from_strokes(slide_index: i32, strokes: Vec<Stroke>) -> Self {
        Self {
            slide_index,
            strokes,
            dirty: false,
            last_touched: current_timestamp(),
        }
    }

    /// Replaces the stroke set and marks the annotation dirty.
    ///
    /// An empty replacement is meaningful: it records "explicitly cleared",
    /// which is distinct from "never touched".
    pub fn replace_strokes(&mut self, strokes: Vec<Stroke>) {
        self.strokes = strokes;
        self.dirty = true;
        self.last_touched = current_timestamp();
    }

    /// Total strokes on the slide.
    #[must_use]
    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }
}
