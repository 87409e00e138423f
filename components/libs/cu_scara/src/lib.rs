//! Kinematics and servo calibration for a two-motor planar SCARA arm.
//!
//! Two motors on fixed pivots each swing an upper arm; a forearm hangs off
//! every elbow and both forearms meet at the tool. All four links share one
//! length.
//!
//! - [`kinematics`]: pure forward/inverse position solvers.
//! - [`calibration`]: least-squares pulse-width/angle fit and log ingestion.
//! - [`ScaraArm`]: controller holding the live pose and the loaded calibration.
//!
//! ```
//! use cu_scara::{Point2, ScaraArm};
//!
//! let mut arm = ScaraArm::default();
//! let pose = arm.inverse_kinematics(Point2::new(332.0, 250.0)).unwrap();
//! assert!(pose.is_reachable);
//! ```

pub mod arm;
pub mod calibration;
pub mod config;
pub mod error;
pub mod geometry;
pub mod kinematics;

pub use arm::ScaraArm;
pub use calibration::{
    ArmCalibration, CalibrationFit, CalibrationLog, CalibrationSample, Calibrator,
};
pub use config::ArmConfig;
pub use error::{ScaraError, ScaraResult};
pub use geometry::{ArmGeometry, Motor, Point2};
pub use kinematics::{ArmPose, ElbowConfiguration, forward_kinematics, inverse_kinematics};
