//! Example application for the `cu_scara` library.
//!
//! Builds the arm from a RON config, then solves every requested tool target
//! (inverse kinematics) or angle pair (forward kinematics) and prints the
//! resulting pose as JSON, followed by the drive signals when a calibration is
//! loaded. A renderer can consume the JSON lines directly.
//!
//! ```sh
//! cargo run -p cu-scara-demo -- --target 332,250 --target 1000,1000
//! cargo run -p cu-scara-demo -- --config scaraconfig.ron --angles -135,-45
//! cargo run -p cu-scara-demo -- --calibration calibration.json --target 320,200
//! ```

use anyhow::Context;
use clap::Parser;
use cu_scara::{ArmCalibration, ArmConfig, ArmPose, Point2, ScaraArm};
use log::{LevelFilter, debug};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cu-scara-demo", about = "Solve SCARA arm poses from the command line")]
struct Args {
    /// Arm configuration; the reference rig is used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Calibration JSON, overrides the one named in the config.
    #[arg(long)]
    calibration: Option<PathBuf>,
    /// Tool position to reach, as `X,Y`.
    #[arg(short, long, value_parser = parse_pair, allow_hyphen_values = true)]
    target: Vec<(f64, f64)>,
    /// Motor angles in degrees, as `THETA1,THETA2`.
    #[arg(short, long, value_parser = parse_pair, allow_hyphen_values = true)]
    angles: Vec<(f64, f64)>,
    #[arg(short, long)]
    verbose: bool,
}

fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected two comma separated numbers, got {s:?}"))?;
    let a = a.trim().parse().map_err(|e| format!("{a:?}: {e}"))?;
    let b = b.trim().parse().map_err(|e| format!("{b:?}: {e}"))?;
    Ok((a, b))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        level,
        ConfigBuilder::new().set_time_level(LevelFilter::Off).build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    let config = match &args.config {
        Some(path) => {
            ArmConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => ArmConfig::default(),
    };
    let mut arm = ScaraArm::from_config(&config)?;
    if let Some(path) = &args.calibration {
        let calibration =
            ArmCalibration::load(path).with_context(|| format!("loading {}", path.display()))?;
        arm.load_calibration(calibration);
    }
    debug!("arm geometry: {:?}", arm.geometry());

    if args.target.is_empty() && args.angles.is_empty() {
        eprintln!("Nothing to solve: pass --target X,Y and/or --angles T1,T2.");
        std::process::exit(1);
    }

    for &(x, y) in &args.target {
        let tool = Point2::new(x, y);
        let solved = arm.inverse_kinematics(tool).map(|_| ());
        match solved {
            Ok(()) => report(&arm)?,
            Err(e) => println!(
                "{}",
                serde_json::json!({ "target": tool, "error": e.to_string() })
            ),
        }
    }

    for &(t1, t2) in &args.angles {
        arm.set_angles(t1.to_radians(), t2.to_radians());
        report(&arm)?;
    }
    Ok(())
}

fn report(arm: &ScaraArm) -> anyhow::Result<()> {
    let pose: &ArmPose = arm.pose();
    println!("{}", serde_json::to_string(pose)?);
    if arm.calibration().is_some() {
        let (pwm1, pwm2) = arm.signals()?;
        println!("  signals: motor 1 = {pwm1}, motor 2 = {pwm2}");
    }
    Ok(())
}
