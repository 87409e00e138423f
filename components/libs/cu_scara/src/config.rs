//! Arm configuration, read from a RON file such as `scaraconfig.ron`:
//!
//! ```ron
//! (
//!     pivot1: (x: 287.0, y: 374.0),
//!     pivot2: (x: 377.0, y: 374.0),
//!     link_length: 154.0,
//!     elbow: Outward,
//!     initial_theta1_deg: -90.0,
//!     initial_theta2_deg: -90.0,
//!     calibration: Some("calibration.json"),
//! )
//! ```
//!
//! Every field is optional and falls back to the reference rig.

use crate::error::ScaraResult;
use crate::geometry::{ArmGeometry, Motor, Point2};
use crate::kinematics::ElbowConfiguration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    pub pivot1: Point2,
    pub pivot2: Point2,
    pub link_length: f64,
    pub elbow: ElbowConfiguration,
    pub initial_theta1_deg: f64,
    pub initial_theta2_deg: f64,
    /// JSON file written by `scara-calibrate`. Relative paths resolve against
    /// the directory of the config file.
    pub calibration: Option<PathBuf>,
}

impl Default for ArmConfig {
    fn default() -> Self {
        let geometry = ArmGeometry::default();
        Self {
            pivot1: geometry.pivot(Motor::One),
            pivot2: geometry.pivot(Motor::Two),
            link_length: geometry.link_length(),
            elbow: ElbowConfiguration::default(),
            initial_theta1_deg: -90.0,
            initial_theta2_deg: -90.0,
            calibration: None,
        }
    }
}

impl ArmConfig {
    pub fn from_ron_str(text: &str) -> ScaraResult<Self> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: &Path) -> ScaraResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_ron_str(&contents)?;
        if let Some(cal) = config.calibration.as_mut()
            && cal.is_relative()
            && let Some(dir) = path.parent()
        {
            *cal = dir.join(&*cal);
        }
        Ok(config)
    }

    pub fn geometry(&self) -> ScaraResult<ArmGeometry> {
        ArmGeometry::new(self.pivot1, self.pivot2, self.link_length)
    }
}
