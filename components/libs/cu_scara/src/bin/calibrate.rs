//! Offline calibration tool for the SCARA arm servos.
//!
//! ```sh
//! cargo run --bin scara-calibrate -- calibration_log.txt
//! cargo run --bin scara-calibrate -- calibration_log.txt -o calibration_rig2.json
//! ```
//!
//! Paste the output of the calibration display into a text file (header line,
//! motor 1 records, a `***` marker line, motor 2 records) and point the tool at
//! it. Both motors are fitted and the result is written as JSON, ready to be
//! referenced from `scaraconfig.ron`.

use anyhow::Context;
use clap::Parser;
use cu_scara::{Calibrator, Motor};
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scara-calibrate", about = "Fit pulse-width/angle lines from a calibration log")]
struct Args {
    /// Calibration log dumped from the rig.
    log: PathBuf,
    /// Where to write the fitted calibration.
    #[arg(short, long, default_value = "calibration.json")]
    output: PathBuf,
    /// Print intermediate values (means, sample counts).
    #[arg(short, long)]
    verbose: bool,
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
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let text = std::fs::read_to_string(&args.log)
        .with_context(|| format!("reading {}", args.log.display()))?;

    let mut calibrator = Calibrator::new();
    calibrator
        .ingest(&text)
        .with_context(|| format!("parsing {}", args.log.display()))?;
    let calibration = calibrator.fit_all()?;
    calibration
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!("Saved to {}:", args.output.display());
    for motor in Motor::ALL {
        let fit = calibration.fit(motor);
        println!(
            "  {motor}: {:>3} samples  angle = {:.6} * pwm + {:.4}",
            calibrator.log().samples(motor).len(),
            fit.slope,
            fit.intercept
        );
    }
    Ok(())
}
