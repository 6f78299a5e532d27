use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{self, Soft};

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    println!();
    println!("{}", "🧪 Running tests...".cyan().bold());
    println!();

    let total_start = Instant::now();

    if !integration_only {
        let output = step::required("Unit tests", &["test", "-p", "adc-engine", "--lib"])?;
        println!("    {}", step::test_summary(&output).dimmed());
    }

    if !unit_only {
        // schedule_proptest, pipeline, calibration, newtypes
        let output = step::required("Integration tests", &["test", "-p", "adc-engine", "--tests"])?;
        println!("    {}", step::test_summary(&output).dimmed());
    }

    // Doc examples are `no_run`; a failure here is a broken example, not a bug.
    if let Soft::Failed = step::advisory("Doc tests", &["test", "-p", "adc-engine", "--doc"], None)? {
        eprintln!("{}", "  Doc examples need attention".yellow());
    }

    println!(
        "{}",
        format!(
            "✓ All tests completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}
