//! The arm controller: geometry, live pose and loaded calibration in one place.
//!
//! A renderer or a servo driver talks to [`ScaraArm`]: it requests a tool
//! position or a pair of angles, then reads back the pose and, once a
//! calibration has been loaded, the drive signals for both motors.

use crate::calibration::{ArmCalibration, deg_to_rad, rad_to_deg};
use crate::config::ArmConfig;
use crate::error::{ScaraError, ScaraResult};
use crate::geometry::{ArmGeometry, Motor, Point2};
use crate::kinematics::{self, ArmPose, ElbowConfiguration};
use log::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ScaraArm {
    geometry: ArmGeometry,
    elbow: ElbowConfiguration,
    pose: ArmPose,
    calibration: Option<ArmCalibration>,
}

impl ScaraArm {
    /// Arm at rest with both upper arms pointing at `theta` = -90°.
    pub fn new(geometry: ArmGeometry, elbow: ElbowConfiguration) -> Self {
        let rest = -std::f64::consts::FRAC_PI_2;
        Self {
            geometry,
            elbow,
            pose: ArmPose::unsolved(&geometry, rest, rest),
            calibration: None,
        }
    }

    /// Build the arm described by `config`, loading its calibration file if one is named.
    pub fn from_config(config: &ArmConfig) -> ScaraResult<Self> {
        let geometry = config.geometry()?;
        let mut arm = Self::new(geometry, config.elbow);
        arm.pose = ArmPose::unsolved(
            &geometry,
            deg_to_rad(config.initial_theta1_deg),
            deg_to_rad(config.initial_theta2_deg),
        );
        if let Some(path) = &config.calibration {
            info!("loading calibration from {}", path.display());
            arm.load_calibration(ArmCalibration::load(path)?);
        }
        Ok(arm)
    }

    pub fn geometry(&self) -> &ArmGeometry {
        &self.geometry
    }

    pub fn elbow(&self) -> ElbowConfiguration {
        self.elbow
    }

    pub fn pose(&self) -> &ArmPose {
        &self.pose
    }

    pub fn is_reachable(&self) -> bool {
        self.pose.is_reachable
    }

    /// Current angle of `motor`, in radians.
    pub fn theta(&self, motor: Motor) -> f64 {
        self.pose.theta(motor)
    }

    /// Drive both motors to the given angles and recompute the tool point.
    pub fn set_angles(&mut self, theta1: f64, theta2: f64) -> &ArmPose {
        self.pose = kinematics::forward_kinematics(&self.geometry, theta1, theta2, self.elbow);
        &self.pose
    }

    /// Recompute joints and tool from the stored angles.
    pub fn forward_kinematics(&mut self) -> &ArmPose {
        self.set_angles(self.pose.theta1, self.pose.theta2)
    }

    /// Solve for the angles that put the tool at `tool`.
    ///
    /// On failure the angles and joints stay at the last valid configuration,
    /// the pose is flagged unreachable and the failing constraint is returned.
    pub fn inverse_kinematics(&mut self, tool: Point2) -> ScaraResult<&ArmPose> {
        match kinematics::inverse_kinematics(&self.geometry, tool, self.elbow) {
            Ok(pose) => {
                self.pose = pose;
                Ok(&self.pose)
            }
            Err(e) => {
                warn!("cannot place tool at {tool}: {e}");
                self.pose.is_reachable = false;
                Err(e)
            }
        }
    }

    pub fn load_calibration(&mut self, calibration: ArmCalibration) {
        debug!("calibration loaded: {calibration:?}");
        self.calibration = Some(calibration);
    }

    pub fn calibration(&self) -> Option<&ArmCalibration> {
        self.calibration.as_ref()
    }

    /// Drive signal that puts `motor` at `theta` radians.
    pub fn angle_to_signal(&self, motor: Motor, theta: f64) -> ScaraResult<i32> {
        let calibration = self
            .calibration
            .as_ref()
            .ok_or(ScaraError::NotCalibrated { motor })?;
        calibration.fit(motor).angle_to_signal(rad_to_deg(theta))
    }

    /// Drive signals for the current angles of both motors.
    pub fn signals(&self) -> ScaraResult<(i32, i32)> {
        Ok((
            self.angle_to_signal(Motor::One, self.pose.theta1)?,
            self.angle_to_signal(Motor::Two, self.pose.theta2)?,
        ))
    }
}

impl Default for ScaraArm {
    fn default() -> Self {
        Self::new(ArmGeometry::default(), ElbowConfiguration::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationFit;
    use approx::assert_abs_diff_eq;

    fn calibrated() -> ScaraArm {
        let mut arm = ScaraArm::default();
        arm.load_calibration(ArmCalibration {
            motor1: CalibrationFit {
                slope: -0.1,
                intercept: 60.0,
            },
            motor2: CalibrationFit {
                slope: 0.1,
                intercept: -240.0,
            },
        });
        arm
    }

    #[test]
    fn starts_at_rest_and_unsolved() {
        let arm = ScaraArm::default();
        assert!(!arm.is_reachable());
        assert_abs_diff_eq!(arm.theta(Motor::One), -std::f64::consts::FRAC_PI_2);
        assert_abs_diff_eq!(arm.pose().joint1.x, 287.0, epsilon = 1e-9);
        assert_abs_diff_eq!(arm.pose().joint1.y, 374.0 - 154.0, epsilon = 1e-9);
    }

    #[test]
    fn solve_updates_pose() {
        let mut arm = ScaraArm::default();
        let pose = *arm.inverse_kinematics(Point2::new(332.0, 250.0)).unwrap();
        assert!(pose.is_reachable);
        assert_eq!(arm.theta(Motor::One), pose.theta1);
        assert_eq!(arm.theta(Motor::Two), pose.theta2);
        assert_eq!(arm.pose().tool, Some(Point2::new(332.0, 250.0)));
    }

    #[test]
    fn failed_solve_keeps_last_angles() {
        let mut arm = ScaraArm::default();
        let good = *arm.inverse_kinematics(Point2::new(332.0, 250.0)).unwrap();
        let err = arm.inverse_kinematics(Point2::new(1000.0, 1000.0)).unwrap_err();
        assert!(matches!(err, ScaraError::UnreachableTarget { .. }));
        assert!(!arm.is_reachable());
        assert_eq!(arm.theta(Motor::One), good.theta1);
        assert_eq!(arm.theta(Motor::Two), good.theta2);
        assert_eq!(arm.pose().joint1, good.joint1);
    }

    #[test]
    fn set_angles_then_forward_is_stable() {
        let mut arm = ScaraArm::default();
        let first = *arm.set_angles(-2.2, -0.9);
        let second = *arm.forward_kinematics();
        let third = *arm.forward_kinematics();
        assert!(first.is_reachable);
        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn set_angles_outside_joint_range_is_unreachable() {
        let mut arm = ScaraArm::default();
        assert!(!arm.set_angles(0.5, 0.5).is_reachable);
        assert!(arm.pose().tool.is_none());
        assert_eq!(arm.theta(Motor::One), 0.5);
        assert!(!arm.set_angles(1.0, 2.0).is_reachable);
        assert!(arm.set_angles(-2.2, -0.9).is_reachable);
    }

    #[test]
    fn signals_need_calibration() {
        let arm = ScaraArm::default();
        assert!(matches!(
            arm.signals(),
            Err(ScaraError::NotCalibrated { motor: Motor::One })
        ));
    }

    #[test]
    fn signals_follow_the_loaded_fit() {
        let mut arm = calibrated();
        // -90° on both motors: (-90 - 60) / -0.1 and (-90 + 240) / 0.1
        assert_eq!(arm.signals().unwrap(), (1500, 1500));
        arm.set_angles((-45.0f64).to_radians(), (-135.0f64).to_radians());
        assert_eq!(arm.signals().unwrap(), (1050, 1050));
        assert_eq!(
            arm.angle_to_signal(Motor::Two, (-100.0f64).to_radians()).unwrap(),
            1400
        );
    }

    #[test]
    fn config_sets_initial_angles() {
        let config = ArmConfig {
            initial_theta1_deg: -120.0,
            initial_theta2_deg: -60.0,
            ..ArmConfig::default()
        };
        let arm = ScaraArm::from_config(&config).unwrap();
        assert_abs_diff_eq!(arm.theta(Motor::One), (-120.0f64).to_radians(), epsilon = 1e-12);
        assert_abs_diff_eq!(arm.theta(Motor::Two), (-60.0f64).to_radians(), epsilon = 1e-12);
        assert!(arm.calibration().is_none());
    }
}
