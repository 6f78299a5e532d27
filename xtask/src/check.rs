use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step;

/// Bare-metal target the engine must build for without `std`.
const EMBEDDED_TARGET: &str = "thumbv7em-none-eabihf";

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking adc-engine builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    step::required(
        "Checking embedded target (no_std)",
        &["check", "-p", "adc-engine", "--target", EMBEDDED_TARGET, "--no-default-features"],
    )?;
    step::required(
        "Checking embedded target with defmt",
        &["check", "-p", "adc-engine", "--target", EMBEDDED_TARGET, "--features", "defmt"],
    )?;
    step::required(
        "Checking embedded target with mocks",
        &["check", "-p", "adc-engine", "--target", EMBEDDED_TARGET, "--features", "mocks"],
    )?;
    step::required("Checking host build", &["check", "--workspace", "--all-targets"])?;

    // Lints and formatting never fail the run.
    step::advisory(
        "Running clippy lints",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        None,
    )?;
    step::advisory(
        "Checking code formatting",
        &["fmt", "--all", "--check"],
        Some("Run 'cargo fmt --all' to fix"),
    )?;

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
