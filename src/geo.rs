//! Terrain reference frame types
//!
//! Only the bookkeeping needed to carry a coordinate frame through a
//! compilation run lives here. Projection math is out of scope.
//!
//! ## Table of Contents
//! 1. SpatialReference: Opaque CRS code
//! 2. GeoExtent: Bounded, empty, or infinite extent

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// 1. SpatialReference: Opaque CRS code
// ============================================================================

/// Coordinate reference system identifier (e.g. `EPSG:4326`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialReference(String);

impl SpatialReference {
    /// Create from a CRS code
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// WGS84 geographic
    pub fn wgs84() -> Self {
        Self::new("EPSG:4326")
    }

    /// The code as supplied
    pub fn code(&self) -> &str {
        &self.0
    }

    fn normalized(&self) -> String {
        self.0.trim().to_ascii_uppercase()
    }
}

impl PartialEq for SpatialReference {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for SpatialReference {}

impl fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SpatialReference {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// 2. GeoExtent: Bounded, empty, or infinite extent
// ============================================================================

/// Geographic extent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum GeoExtent {
    /// Unbounded; compilation is not clipped
    #[default]
    Infinite,
    /// Contains nothing
    Empty,
    /// Axis-aligned box in the given SRS
    Bounded {
        /// Minimum x (west)
        xmin: f64,
        /// Minimum y (south)
        ymin: f64,
        /// Maximum x (east)
        xmax: f64,
        /// Maximum y (north)
        ymax: f64,
        /// Frame the box is expressed in
        srs: Option<SpatialReference>,
    },
}

impl GeoExtent {
    /// The unbounded extent
    pub fn infinite() -> Self {
        Self::Infinite
    }

    /// The empty extent
    pub fn empty() -> Self {
        Self::Empty
    }

    /// A bounded box; corners are reordered so min <= max
    pub fn bounded(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::Bounded {
            xmin: x0.min(x1),
            ymin: y0.min(y1),
            xmax: x0.max(x1),
            ymax: y0.max(y1),
            srs: None,
        }
    }

    /// Attach a frame to a bounded extent (no-op otherwise)
    pub fn with_srs(self, frame: SpatialReference) -> Self {
        match self {
            Self::Bounded { xmin, ymin, xmax, ymax, .. } => Self::Bounded {
                xmin,
                ymin,
                xmax,
                ymax,
                srs: Some(frame),
            },
            other => other,
        }
    }

    /// True for the unbounded extent
    pub fn is_infinite(&self) -> bool {
        matches!(self, Self::Infinite)
    }

    /// True for the empty extent
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Point containment (inclusive bounds)
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Self::Infinite => true,
            Self::Empty => false,
            Self::Bounded { xmin, ymin, xmax, ymax, .. } => {
                x >= *xmin && x <= *xmax && y >= *ymin && y <= *ymax
            }
        }
    }

    /// Intersection of two extents; frames are not reconciled
    pub fn intersection(&self, other: &GeoExtent) -> GeoExtent {
        match (self, other) {
            (Self::Empty, _) | (_, Self::Empty) => Self::Empty,
            (Self::Infinite, e) | (e, Self::Infinite) => e.clone(),
            (
                Self::Bounded { xmin: ax0, ymin: ay0, xmax: ax1, ymax: ay1, srs },
                Self::Bounded { xmin: bx0, ymin: by0, xmax: bx1, ymax: by1, .. },
            ) => {
                let xmin = ax0.max(*bx0);
                let ymin = ay0.max(*by0);
                let xmax = ax1.min(*bx1);
                let ymax = ay1.min(*by1);
                if xmin > xmax || ymin > ymax {
                    Self::Empty
                } else {
                    Self::Bounded { xmin, ymin, xmax, ymax, srs: srs.clone() }
                }
            }
        }
    }
}
