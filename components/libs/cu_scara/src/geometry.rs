//! Fixed geometry of the arm: where the two motors sit and how long the links are.
//!
//! Both chains share one link length: upper arm and forearm are identical on
//! either side. Coordinates live in the drawing frame of the caller (pixels in
//! the reference rig, y pointing down); the solver does not care which.

use crate::error::{ScaraError, ScaraResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

/// A point (or vector) in the arm plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point at `length` from `self` in direction `angle` (radians).
    pub fn polar(self, length: f64, angle: f64) -> Self {
        Self {
            x: self.x + length * angle.cos(),
            y: self.y + length * angle.sin(),
        }
    }

    pub fn distance(self, other: Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn midpoint(self, other: Self) -> Self {
        Self {
            x: self.x + 0.5 * (other.x - self.x),
            y: self.y + 0.5 * (other.y - self.y),
        }
    }

    /// z component of the cross product `self × other`.
    pub fn cross(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Sub for Point2 {
    type Output = Point2;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl fmt::Display for Point2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// One of the two driven chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Motor {
    One,
    Two,
}

impl Motor {
    pub const ALL: [Motor; 2] = [Motor::One, Motor::Two];

    /// 1-based index, as printed on the rig.
    pub fn index(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

impl fmt::Display for Motor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "motor {}", self.index())
    }
}

/// Pivot positions and link length. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArmGeometry {
    pivot1: Point2,
    pivot2: Point2,
    link_length: f64,
}

impl ArmGeometry {
    pub fn new(pivot1: Point2, pivot2: Point2, link_length: f64) -> ScaraResult<Self> {
        if !(link_length.is_finite() && link_length > 0.0) {
            return Err(ScaraError::InvalidConfig(format!(
                "link length must be positive, got {link_length}"
            )));
        }
        if !(pivot1.is_finite() && pivot2.is_finite()) {
            return Err(ScaraError::InvalidConfig(
                "pivot coordinates must be finite".to_string(),
            ));
        }
        Ok(Self {
            pivot1,
            pivot2,
            link_length,
        })
    }

    pub fn pivot(&self, motor: Motor) -> Point2 {
        match motor {
            Motor::One => self.pivot1,
            Motor::Two => self.pivot2,
        }
    }

    pub fn link_length(&self) -> f64 {
        self.link_length
    }

    /// Longest pivot-to-tool distance a single chain can span.
    pub fn reach(&self) -> f64 {
        2.0 * self.link_length
    }

    /// Elbow position for `motor` driven to `theta` radians.
    pub fn joint(&self, motor: Motor, theta: f64) -> Point2 {
        self.pivot(motor).polar(self.link_length, theta)
    }
}

impl Default for ArmGeometry {
    /// The reference rig: motors 90 px apart, 154 px links.
    fn default() -> Self {
        Self {
            pivot1: Point2::new(287.0, 374.0),
            pivot2: Point2::new(377.0, 374.0),
            link_length: 154.0,
        }
    }
}
