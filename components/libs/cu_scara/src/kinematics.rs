//! Position kinematics for the closed two-chain linkage.
//!
//! Each chain is pivot -> upper arm -> joint -> forearm -> tool, with both
//! links `L` long, and the two forearms meet at the tool. Every step reduces
//! to intersecting two circles of radius `L`, which has two solutions; the
//! [`ElbowConfiguration`] picks one of them, identically for the forward and
//! the inverse direction.
//!
//! Both solvers are pure: they take the geometry and return a fresh
//! [`ArmPose`].

use crate::error::{ScaraError, ScaraResult};
use crate::geometry::{ArmGeometry, Motor, Point2};
use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Relative slack on reach limits, so a fully stretched chain computed in
/// floating point is still accepted.
const REACH_TOLERANCE: f64 = 1e-9;

/// Which of the two circle intersections the elbows use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ElbowConfiguration {
    /// Elbows splayed away from each other (motor 1 elbow on the clockwise
    /// side of its pivot->tool line, motor 2 on the counter-clockwise side).
    /// This is how the rig is assembled.
    #[default]
    Outward,
    /// Both elbows folded towards each other.
    Inward,
}

impl ElbowConfiguration {
    /// Sign of `cross(tool - pivot, joint - pivot)` for `motor` on this branch.
    fn side(self, motor: Motor) -> f64 {
        match (self, motor) {
            (Self::Outward, Motor::One) | (Self::Inward, Motor::Two) => -1.0,
            (Self::Outward, Motor::Two) | (Self::Inward, Motor::One) => 1.0,
        }
    }

    /// True when `joint` lies on this branch for `motor` reaching `tool`.
    fn holds(self, geometry: &ArmGeometry, motor: Motor, joint: Point2, tool: Point2) -> bool {
        let pivot = geometry.pivot(motor);
        let slack = REACH_TOLERANCE * geometry.link_length() * geometry.link_length();
        self.side(motor) * (tool - pivot).cross(joint - pivot) >= -slack
    }
}

/// Configuration of the arm after a solve.
///
/// `joint1`/`joint2` always sit one link from their pivot at `theta1`/`theta2`.
/// `tool` is only meaningful when `is_reachable` is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmPose {
    pub theta1: f64,
    pub theta2: f64,
    pub joint1: Point2,
    pub joint2: Point2,
    pub tool: Option<Point2>,
    pub is_reachable: bool,
}

impl ArmPose {
    /// Pose with both upper arms placed but no solved tool point.
    pub fn unsolved(geometry: &ArmGeometry, theta1: f64, theta2: f64) -> Self {
        Self {
            theta1,
            theta2,
            joint1: geometry.joint(Motor::One, theta1),
            joint2: geometry.joint(Motor::Two, theta2),
            tool: None,
            is_reachable: false,
        }
    }

    pub fn theta(&self, motor: Motor) -> f64 {
        match motor {
            Motor::One => self.theta1,
            Motor::Two => self.theta2,
        }
    }

    pub fn joint(&self, motor: Motor) -> Point2 {
        match motor {
            Motor::One => self.joint1,
            Motor::Two => self.joint2,
        }
    }

    /// Whether this is a reachable pose lying on the `elbow` branch for both chains.
    pub fn matches(&self, geometry: &ArmGeometry, elbow: ElbowConfiguration) -> bool {
        match self.tool {
            Some(tool) if self.is_reachable => Motor::ALL
                .iter()
                .all(|&m| elbow.holds(geometry, m, self.joint(m), tool)),
            _ => false,
        }
    }
}

/// True when `theta` is inside the joint range of the rig, `(-pi, 0]`.
pub fn is_valid_joint_angle(theta: f64) -> bool {
    theta > -PI && theta <= 0.0
}

/// Tool position from motor angles.
///
/// The tool is where the two forearm circles around the joints intersect. If
/// an angle is outside the joint range, or the joints are `2L` or more apart
/// (or on top of each other), the pose comes back with `is_reachable == false`
/// and no tool point.
pub fn forward_kinematics(
    geometry: &ArmGeometry,
    theta1: f64,
    theta2: f64,
    elbow: ElbowConfiguration,
) -> ArmPose {
    let mut pose = ArmPose::unsolved(geometry, theta1, theta2);
    if !is_valid_joint_angle(theta1) || !is_valid_joint_angle(theta2) {
        debug!("forward: angles ({theta1:.4}, {theta2:.4}) outside the joint range");
        return pose;
    }
    let l = geometry.link_length();

    let mid = pose.joint1.midpoint(pose.joint2);
    let d = 0.5 * pose.joint1.distance(pose.joint2);
    if d >= l || d <= REACH_TOLERANCE * l {
        debug!("forward: joints {} and {} give no tool point", pose.joint1, pose.joint2);
        return pose;
    }

    let h = (l * l - d * d).sqrt();
    let axis = pose.joint2 - pose.joint1;
    let (nx, ny) = (-axis.y / (2.0 * d), axis.x / (2.0 * d));
    let candidates = [
        Point2::new(mid.x + h * nx, mid.y + h * ny),
        Point2::new(mid.x - h * nx, mid.y - h * ny),
    ];

    // Prefer the candidate on the requested elbow branch. Both intersections
    // can sit on it; the forearms then close on the far side of the elbows,
    // away from the base.
    let base = geometry.pivot(Motor::One).midpoint(geometry.pivot(Motor::Two));
    let score = |tool: Point2| {
        let on_branch = Motor::ALL
            .iter()
            .filter(|&&m| elbow.holds(geometry, m, pose.joint(m), tool))
            .count();
        (on_branch, base.distance(tool))
    };
    let tool = if score(candidates[1]) > score(candidates[0]) {
        candidates[1]
    } else {
        candidates[0]
    };

    pose.tool = Some(tool);
    pose.is_reachable = true;
    pose
}

/// Elbow position and motor angle for one chain reaching `tool`.
fn solve_chain(
    geometry: &ArmGeometry,
    motor: Motor,
    tool: Point2,
    elbow: ElbowConfiguration,
) -> ScaraResult<(Point2, f64)> {
    let pivot = geometry.pivot(motor);
    let l = geometry.link_length();

    let d = pivot.distance(tool);
    if d <= REACH_TOLERANCE * l {
        return Err(ScaraError::DegenerateGeometry { motor });
    }
    if d > geometry.reach() * (1.0 + REACH_TOLERANCE) {
        return Err(ScaraError::UnreachableTarget { motor });
    }

    let half = 0.5 * d;
    let h = (l * l - half * half).max(0.0).sqrt();
    let mid = pivot.midpoint(tool);
    let (ux, uy) = ((tool.x - pivot.x) / d, (tool.y - pivot.y) / d);
    let offset = elbow.side(motor) * h;
    let joint = Point2::new(mid.x - offset * uy, mid.y + offset * ux);

    let theta = (joint.y - pivot.y).atan2(joint.x - pivot.x);
    if !is_valid_joint_angle(theta) {
        return Err(ScaraError::InvalidJointAngle { motor, theta });
    }
    Ok((geometry.joint(motor, theta), theta))
}

/// Motor angles that put the tool at `tool`.
///
/// Motor 1 is solved first, then motor 2, then the two elbows are checked to be
/// close enough for the forearms to meet. The first failing constraint is
/// returned; nothing is partially applied.
pub fn inverse_kinematics(
    geometry: &ArmGeometry,
    tool: Point2,
    elbow: ElbowConfiguration,
) -> ScaraResult<ArmPose> {
    let (joint1, theta1) = solve_chain(geometry, Motor::One, tool, elbow)?;
    let (joint2, theta2) = solve_chain(geometry, Motor::Two, tool, elbow)?;

    let distance = joint1.distance(joint2);
    let limit = geometry.reach();
    if distance > limit * (1.0 + REACH_TOLERANCE) {
        return Err(ScaraError::JointsUnreachable { distance, limit });
    }

    debug!(
        "inverse: tool {tool} -> theta1={:.1}deg theta2={:.1}deg",
        theta1.to_degrees(),
        theta2.to_degrees()
    );
    Ok(ArmPose {
        theta1,
        theta2,
        joint1,
        joint2,
        tool: Some(tool),
        is_reachable: true,
    })
}
