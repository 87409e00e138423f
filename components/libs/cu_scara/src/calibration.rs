//! Calibration of the two servos: pulse width <-> joint angle.
//!
//! Each motor follows a line `angle_deg = slope * pwm + intercept` within its
//! usable range. The line is fitted by ordinary least squares over samples
//! recorded on the rig (pulse width sent, angle measured) and then inverted to
//! turn a commanded angle into a drive signal.
//!
//! Run the `scara-calibrate` binary on a recorded log to generate a
//! `calibration.json`.

use crate::error::{ScaraError, ScaraResult};
use crate::geometry::Motor;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use uom::si::angle::{degree, radian};
use uom::si::f64::Angle;

// =========================================================================
// Unit helpers
// =========================================================================

/// Radians (solver side) to degrees (calibration side).
#[inline]
pub fn rad_to_deg(theta: f64) -> f64 {
    Angle::new::<radian>(theta).get::<degree>()
}

/// Degrees (calibration side) to radians (solver side).
#[inline]
pub fn deg_to_rad(angle: f64) -> f64 {
    Angle::new::<degree>(angle).get::<radian>()
}

// =========================================================================
// Samples
// =========================================================================

/// One measurement: the pulse width sent and the angle the arm settled at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub pwm: i32,
    pub angle_deg: i32,
}

/// Samples for one motor, in log order.
pub type MotorSamples = Vec<CalibrationSample>;

/// Marker token that separates the motor 1 block from the motor 2 block.
const SENTINEL: &str = "***";

/// Parsed calibration log: one sample sequence per motor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationLog {
    pub motor1: MotorSamples,
    pub motor2: MotorSamples,
}

impl CalibrationLog {
    /// Parse a log dumped from the rig's calibration display.
    ///
    /// The first line is a header. Records carry a `pwm=<int>` token and an
    /// `angle=<number>` token among other whitespace separated tokens; only the
    /// integer part of the angle is kept. A line with a `***` token starts the
    /// motor 2 block. Any bad line rejects the whole log.
    pub fn parse(text: &str) -> ScaraResult<Self> {
        let mut log = Self::default();
        let mut motor = Motor::One;

        for (idx, line) in text.lines().enumerate().skip(1) {
            let line_no = idx + 1;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.iter().any(|t| t.contains(SENTINEL)) {
                if motor == Motor::Two {
                    return Err(parse_error(line_no, "second motor block marker"));
                }
                motor = Motor::Two;
                continue;
            }

            let pwm = keyed_value(&tokens, "pwm")
                .ok_or_else(|| parse_error(line_no, "missing pwm= token"))?;
            let pwm: i32 = pwm
                .parse()
                .map_err(|e| parse_error(line_no, &format!("bad pulse width {pwm:?}: {e}")))?;

            let angle = keyed_value(&tokens, "angle")
                .ok_or_else(|| parse_error(line_no, "missing angle= token"))?;
            let whole = angle.split('.').next().unwrap_or_default();
            let angle_deg: i32 = whole
                .parse()
                .map_err(|e| parse_error(line_no, &format!("bad angle {angle:?}: {e}")))?;

            let sample = CalibrationSample { pwm, angle_deg };
            match motor {
                Motor::One => log.motor1.push(sample),
                Motor::Two => log.motor2.push(sample),
            }
        }

        debug!(
            "calibration log: {} samples for motor 1, {} for motor 2",
            log.motor1.len(),
            log.motor2.len()
        );
        Ok(log)
    }

    pub fn from_path(path: &Path) -> ScaraResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn samples(&self, motor: Motor) -> &[CalibrationSample] {
        match motor {
            Motor::One => &self.motor1,
            Motor::Two => &self.motor2,
        }
    }
}

fn keyed_value<'a>(tokens: &[&'a str], key: &str) -> Option<&'a str> {
    tokens.iter().find_map(|t| {
        let (k, v) = t.split_once('=')?;
        (k == key).then_some(v)
    })
}

fn parse_error(line: usize, reason: &str) -> ScaraError {
    ScaraError::CalibrationParse {
        line,
        reason: reason.to_string(),
    }
}

// =========================================================================
// Linear fit
// =========================================================================

/// `angle_deg = slope * pwm + intercept` for one motor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFit {
    pub slope: f64,
    pub intercept: f64,
}

impl CalibrationFit {
    /// Least-squares line through `samples`.
    ///
    /// `motor` only labels the error when fewer than two distinct pulse widths
    /// are present.
    pub fn fit(motor: Motor, samples: &[CalibrationSample]) -> ScaraResult<Self> {
        let distinct: BTreeSet<i32> = samples.iter().map(|s| s.pwm).collect();
        if distinct.len() < 2 {
            return Err(ScaraError::InsufficientSamples { motor });
        }

        let n = samples.len() as f64;
        let mean_pwm = samples.iter().map(|s| f64::from(s.pwm)).sum::<f64>() / n;
        let mean_angle = samples.iter().map(|s| f64::from(s.angle_deg)).sum::<f64>() / n;

        let (num, den) = samples.iter().fold((0.0, 0.0), |(num, den), s| {
            let dp = f64::from(s.pwm) - mean_pwm;
            let da = f64::from(s.angle_deg) - mean_angle;
            (num + dp * da, den + dp * dp)
        });

        let slope = num / den;
        let intercept = mean_angle - slope * mean_pwm;
        debug!("{motor}: mean pwm {mean_pwm:.2}, mean angle {mean_angle:.2}");
        info!("{motor}: angle = {slope:.6} * pwm + {intercept:.4}");
        Ok(Self { slope, intercept })
    }

    /// Line through two measured points `(pwm, angle_deg)`.
    pub fn through_points(motor: Motor, a: (i32, f64), b: (i32, f64)) -> ScaraResult<Self> {
        if a.0 == b.0 {
            return Err(ScaraError::InsufficientSamples { motor });
        }
        let slope = (b.1 - a.1) / (f64::from(b.0) - f64::from(a.0));
        let intercept = a.1 - slope * f64::from(a.0);
        Ok(Self { slope, intercept })
    }

    /// Angle in degrees the motor settles at for `pwm`.
    pub fn signal_to_angle(&self, pwm: i32) -> f64 {
        self.slope * f64::from(pwm) + self.intercept
    }

    /// Pulse width that drives the motor to `angle_deg`, rounded to the nearest step.
    pub fn angle_to_signal(&self, angle_deg: f64) -> ScaraResult<i32> {
        if self.slope == 0.0 || !self.slope.is_finite() {
            return Err(ScaraError::DegenerateFit { slope: self.slope });
        }
        let pwm = ((angle_deg - self.intercept) / self.slope).round();
        if !pwm.is_finite() || pwm < f64::from(i32::MIN) || pwm > f64::from(i32::MAX) {
            return Err(ScaraError::SignalOutOfRange { angle_deg });
        }
        Ok(pwm as i32)
    }
}

// =========================================================================
// Whole-arm calibration
// =========================================================================

/// Fits for both motors, as stored in `calibration.json`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmCalibration {
    pub motor1: CalibrationFit,
    pub motor2: CalibrationFit,
}

impl ArmCalibration {
    pub fn load(path: &Path) -> ScaraResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> ScaraResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn fit(&self, motor: Motor) -> &CalibrationFit {
        match motor {
            Motor::One => &self.motor1,
            Motor::Two => &self.motor2,
        }
    }
}

/// Holds the ingested samples and the most recent fit of each motor.
#[derive(Debug, Default)]
pub struct Calibrator {
    log: CalibrationLog,
    fits: [Option<CalibrationFit>; 2],
}

impl Calibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the samples with those parsed from `text`.
    ///
    /// On a parse error the previous samples are kept.
    pub fn ingest(&mut self, text: &str) -> ScaraResult<()> {
        self.log = CalibrationLog::parse(text)?;
        Ok(())
    }

    pub fn log(&self) -> &CalibrationLog {
        &self.log
    }

    /// Fit `motor` from the current samples, replacing its previous fit.
    pub fn fit(&mut self, motor: Motor) -> ScaraResult<CalibrationFit> {
        let fit = CalibrationFit::fit(motor, self.log.samples(motor))?;
        self.fits[motor.index() - 1] = Some(fit);
        Ok(fit)
    }

    pub fn fit_all(&mut self) -> ScaraResult<ArmCalibration> {
        Ok(ArmCalibration {
            motor1: self.fit(Motor::One)?,
            motor2: self.fit(Motor::Two)?,
        })
    }

    /// Last fit computed for `motor`, if any.
    pub fn current(&self, motor: Motor) -> Option<&CalibrationFit> {
        self.fits[motor.index() - 1].as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const LOG: &str = "\
Calibration results
pwm=1000 t=0 x=12 angle=-10.0 ok
pwm=1200 t=1 x=40 angle=-50.7 ok
pwm=1400 t=2 x=77 angle=-90.2 ok
***Motor2***
m2 pwm=1100 t=0 x=5 angle=-170.0
m2 pwm=1500 t=1 x=9 angle=-90.9
";

    fn samples(line: impl Fn(i32) -> i32, pwms: &[i32]) -> MotorSamples {
        pwms.iter()
            .map(|&pwm| CalibrationSample {
                pwm,
                angle_deg: line(pwm),
            })
            .collect()
    }

    #[test]
    fn parses_both_blocks() {
        let log = CalibrationLog::parse(LOG).unwrap();
        assert_eq!(
            log.motor1,
            vec![
                CalibrationSample { pwm: 1000, angle_deg: -10 },
                CalibrationSample { pwm: 1200, angle_deg: -50 },
                CalibrationSample { pwm: 1400, angle_deg: -90 },
            ]
        );
        assert_eq!(log.motor2.len(), 2);
        assert_eq!(log.motor2[1], CalibrationSample { pwm: 1500, angle_deg: -90 });
    }

    #[test]
    fn header_and_blank_lines_are_skipped() {
        let log = CalibrationLog::parse("pwm=oops header\n\npwm=5 a b angle=7.5\n").unwrap();
        assert_eq!(log.motor1, vec![CalibrationSample { pwm: 5, angle_deg: 7 }]);
        assert!(log.motor2.is_empty());
    }

    #[test]
    fn malformed_line_rejects_everything() {
        let text = "header\npwm=1000 a b angle=1.0\npwm=12x a b angle=3.0\n";
        let err = CalibrationLog::parse(text).unwrap_err();
        assert!(matches!(err, ScaraError::CalibrationParse { line: 3, .. }));

        let err = CalibrationLog::parse("header\npwm=1000 a b\n").unwrap_err();
        assert!(matches!(err, ScaraError::CalibrationParse { line: 2, .. }));

        let err = CalibrationLog::parse("header\n***\npwm=1 angle=1.0\n*** again\n").unwrap_err();
        assert!(matches!(err, ScaraError::CalibrationParse { line: 4, .. }));
    }

    #[test]
    fn reads_log_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration_log.txt");
        std::fs::write(&path, LOG).unwrap();
        assert_eq!(CalibrationLog::from_path(&path).unwrap(), CalibrationLog::parse(LOG).unwrap());
        assert!(matches!(
            CalibrationLog::from_path(&dir.path().join("missing.txt")),
            Err(ScaraError::Io(_))
        ));
    }

    #[test]
    fn failed_ingest_keeps_previous_samples() {
        let mut cal = Calibrator::new();
        cal.ingest(LOG).unwrap();
        assert!(cal.ingest("header\nnonsense\n").is_err());
        assert_eq!(cal.log().motor1.len(), 3);
    }

    #[test]
    fn recovers_exact_line() {
        let s = samples(|p| 2 * p + 10, &[-5, 0, 3, 8, 20]);
        let fit = CalibrationFit::fit(Motor::One, &s).unwrap();
        assert_relative_eq!(fit.slope, 2.0, max_relative = 1e-12);
        assert_relative_eq!(fit.intercept, 10.0, max_relative = 1e-12);
    }

    #[test]
    fn least_squares_on_noisy_samples() {
        // (0,1) (1,2) (2,2) (3,4): slope 0.9, intercept 0.9
        let s: MotorSamples = [(0, 1), (1, 2), (2, 2), (3, 4)]
            .into_iter()
            .map(|(pwm, angle_deg)| CalibrationSample { pwm, angle_deg })
            .collect();
        let fit = CalibrationFit::fit(Motor::Two, &s).unwrap();
        assert_relative_eq!(fit.slope, 0.9, max_relative = 1e-12);
        assert_relative_eq!(fit.intercept, 0.9, max_relative = 1e-12);
    }

    #[test]
    fn needs_two_distinct_pulse_widths() {
        assert!(matches!(
            CalibrationFit::fit(Motor::One, &[]),
            Err(ScaraError::InsufficientSamples { motor: Motor::One })
        ));
        let s = samples(|_| 45, &[1500, 1500, 1500]);
        assert!(matches!(
            CalibrationFit::fit(Motor::Two, &s),
            Err(ScaraError::InsufficientSamples { motor: Motor::Two })
        ));
    }

    #[test]
    fn signal_conversion_inverts_the_line() {
        let fit =
            CalibrationFit::through_points(Motor::One, (1000, -10.0), (2000, -190.0)).unwrap();
        assert_relative_eq!(fit.slope, -0.18, max_relative = 1e-12);
        assert_eq!(fit.angle_to_signal(-100.0).unwrap(), 1500);
        assert_eq!(fit.angle_to_signal(fit.signal_to_angle(1733)).unwrap(), 1733);
        // rounds to the nearest step
        assert_eq!(fit.angle_to_signal(-10.1).unwrap(), 1001);
    }

    #[test]
    fn flat_fit_cannot_be_inverted() {
        let fit = CalibrationFit {
            slope: 0.0,
            intercept: 3.0,
        };
        assert!(matches!(
            fit.angle_to_signal(10.0),
            Err(ScaraError::DegenerateFit { .. })
        ));
    }

    #[test]
    fn two_point_fit_spans_the_full_signal_range() {
        let fit = CalibrationFit::through_points(Motor::One, (i32::MIN, 0.0), (i32::MAX, 1.0))
            .unwrap();
        assert!(fit.slope > 0.0);
        assert_relative_eq!(fit.signal_to_angle(i32::MIN), 0.0, epsilon = 1e-9);
        assert_relative_eq!(fit.signal_to_angle(i32::MAX), 1.0, max_relative = 1e-9);
    }

    #[test]
    fn angle_beyond_signal_range_is_reported() {
        let fit = CalibrationFit {
            slope: 1e-6,
            intercept: 0.0,
        };
        let err = fit.angle_to_signal(10_000.0).unwrap_err();
        assert!(matches!(err, ScaraError::SignalOutOfRange { angle_deg } if angle_deg == 10_000.0));
        assert!(err.to_string().contains("outside the signal range"));
    }

    #[test]
    fn refit_overwrites_previous_coefficients() {
        let mut cal = Calibrator::new();
        cal.ingest(LOG).unwrap();
        let first = cal.fit(Motor::One).unwrap();
        cal.ingest("header\npwm=0 angle=10.0\npwm=1 angle=12.0\n").unwrap();
        let second = cal.fit(Motor::One).unwrap();
        assert_ne!(first, second);
        assert_eq!(cal.current(Motor::One), Some(&second));
        assert!(cal.current(Motor::Two).is_none());
    }

    #[test]
    fn degree_radian_helpers() {
        assert_relative_eq!(rad_to_deg(-std::f64::consts::FRAC_PI_2), -90.0, max_relative = 1e-12);
        assert_relative_eq!(deg_to_rad(180.0), std::f64::consts::PI, max_relative = 1e-12);
    }
}
