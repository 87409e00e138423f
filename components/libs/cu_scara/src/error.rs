//! Error type shared by the solver, the calibrator and the arm controller.

use crate::geometry::Motor;
use thiserror::Error;

/// Everything that can go wrong while solving a pose or fitting a calibration.
///
/// Geometry errors (`UnreachableTarget`, `InvalidJointAngle`,
/// `JointsUnreachable`) mean the caller should pick another target.
/// Calibration errors mean the input data has to be fixed and the fit rerun.
#[derive(Debug, Error)]
pub enum ScaraError {
    #[error("{motor} cannot reach the target")]
    UnreachableTarget { motor: Motor },

    #[error("{motor} angle {theta:.4} rad is outside (-pi, 0]")]
    InvalidJointAngle { motor: Motor, theta: f64 },

    #[error("joints are {distance:.3} apart, forearms only span {limit:.3}")]
    JointsUnreachable { distance: f64, limit: f64 },

    #[error("target coincides with the {motor} pivot")]
    DegenerateGeometry { motor: Motor },

    #[error("calibration log line {line}: {reason}")]
    CalibrationParse { line: usize, reason: String },

    #[error("{motor} needs at least two distinct pulse widths to fit")]
    InsufficientSamples { motor: Motor },

    #[error("calibration slope {slope} cannot be inverted")]
    DegenerateFit { slope: f64 },

    #[error("angle {angle_deg} deg maps to a pulse width outside the signal range")]
    SignalOutOfRange { angle_deg: f64 },

    #[error("no calibration loaded for {motor}")]
    NotCalibrated { motor: Motor },

    #[error("invalid arm configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("bad calibration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bad arm config: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

pub type ScaraResult<T> = Result<T, ScaraError>;
