use std::fmt::Write as _;

use colored::Colorize;

use crate::preview::{BuildError, BuildReport, BuildStatus};

/// Human-readable summary of a finished session.
pub fn render_status(status: &BuildStatus, rejected_commands: usize) -> String {
    let mut out = String::new();
    match status {
        BuildStatus::Idle | BuildStatus::Building => {
            let _ = writeln!(out, "{} No preview build ran", "•".yellow().bold());
        }
        BuildStatus::Ready(report) => {
            let _ = writeln!(out, "{} Preview ready", "✔".green().bold());
            render_report(&mut out, report);
        }
        BuildStatus::Failed { errors, partial } => {
            let _ = writeln!(
                out,
                "{} Preview failed with {} {}",
                "✘".red().bold(),
                errors.len(),
                if errors.len() == 1 { "error" } else { "errors" }
            );
            for error in errors {
                let line = match error {
                    BuildError::Module { source } => source.report().to_string(),
                    missing @ BuildError::MissingEntry { .. } => missing.to_string(),
                };
                let _ = writeln!(out, "  {}", line);
            }
            if let Some(report) = partial {
                let _ = writeln!(out, "{}", "Best-effort build:".dimmed());
                render_report(&mut out, report);
            }
        }
    }
    if rejected_commands > 0 {
        let _ = writeln!(
            out,
            "{} {} commands were rejected by the store",
            "WARN".yellow().bold(),
            rejected_commands
        );
    }
    out
}

fn render_report(out: &mut String, report: &BuildReport) {
    let _ = writeln!(out, "  entry:      {}", report.entry);
    let _ = writeln!(out, "  generation: {}", report.generation);
    let _ = writeln!(
        out,
        "  modules:    {} registered of {} reachable, {} stylesheets",
        report.registered, report.reachable, report.styles
    );
    let _ = writeln!(
        out,
        "  cache:      {} hits, {} misses",
        report.cache.hits, report.cache.misses
    );
}
