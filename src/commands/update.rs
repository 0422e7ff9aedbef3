// src/commands/update.rs
//! Package update command

use super::print_warnings;
use anyhow::{Context, Result, bail};
use criage::manager::{PackageManager, UpdateOutcome};

pub fn cmd_update(pm: &PackageManager, package: Option<&str>, all: bool) -> Result<()> {
    if all {
        let results = pm.update_all();
        if results.is_empty() {
            println!("No packages installed");
            return Ok(());
        }

        let mut failed = 0;
        for (scope, name, result) in results {
            let label = format!("{name} ({scope})");
            match result {
                Ok(outcome) => report(&label, &outcome),
                Err(e) => {
                    failed += 1;
                    eprintln!("{}: update failed: {}", label, e);
                }
            }
        }
        if failed > 0 {
            println!("{} package(s) failed to update", failed);
        }
        return Ok(());
    }

    let Some(name) = package else {
        bail!("Specify a package or --all");
    };
    let outcome = pm
        .update(name)
        .with_context(|| format!("Failed to update {}", name))?;
    report(name, &outcome);
    Ok(())
}

fn report(name: &str, outcome: &UpdateOutcome) {
    match outcome {
        UpdateOutcome::UpToDate { version } => {
            println!("{} is up to date ({})", name, version);
        }
        UpdateOutcome::Updated { from, to, warnings } => {
            println!("Updated {} {} -> {}", name, from, to);
            print_warnings(warnings);
        }
    }
}
