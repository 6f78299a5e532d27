use anyhow::{Context, Result};
use colored::Colorize;
use std::process::{Command, Output};
use std::time::Instant;

/// Outcome of a cargo step that is allowed to fail.
pub enum Soft {
    Passed,
    Failed,
}

/// Run `cargo <args>`; print progress and fail the task on error.
pub fn required(label: &str, args: &[&str]) -> Result<Output> {
    println!("{}", format!("  {label}...").cyan());
    let start = Instant::now();

    let output = cargo(args).with_context(|| format!("Failed to run {label}"))?;
    if !output.status.success() {
        eprintln!("{}", format!("  ✗ {label} failed").red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            eprintln!("  {line}");
        }
        anyhow::bail!("{label} failed");
    }

    println!(
        "{}",
        format!("  ✓ {label} passed in {:.2}s", start.elapsed().as_secs_f64()).green()
    );
    println!();
    Ok(output)
}

/// Run `cargo <args>`; report failure as a warning only.
pub fn advisory(label: &str, args: &[&str], hint: Option<&str>) -> Result<Soft> {
    println!("{}", format!("  {label}...").cyan());
    let start = Instant::now();

    let output = cargo(args).with_context(|| format!("Failed to run {label}"))?;
    let outcome = if output.status.success() {
        println!(
            "{}",
            format!("  ✓ {label} passed in {:.2}s", start.elapsed().as_secs_f64()).green()
        );
        Soft::Passed
    } else {
        eprintln!("{}", format!("  ⚠ {label} reported issues").yellow().bold());
        if let Some(hint) = hint {
            eprintln!("     {hint}");
        } else {
            eprintln!();
            eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        }
        Soft::Failed
    };
    println!();
    Ok(outcome)
}

/// "ok. 5 passed; 0 failed; ..." from the last `test result:` line.
pub fn test_summary(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.split("test result:").nth(1))
        .last()
        .map_or_else(|| "(summary not available)".to_string(), |s| s.trim().to_string())
}

fn cargo(args: &[&str]) -> std::io::Result<Output> {
    Command::new("cargo").args(args).output()
}
