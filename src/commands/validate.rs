use anyhow::{Result, bail};
use colored::Colorize;
use converge::{Diagnostics, Severity};
use std::path::Path;

use crate::Context;
use crate::manifest::Manifest;
use crate::ui;

pub fn run(ctx: &Context, manifest_path: &Path) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let problems = manifest.validate();

    if !ctx.quiet {
        ui::header(&format!("Validating {}", manifest_path.display()));
        for (address, diagnostics) in &problems {
            print_diagnostics(address, diagnostics);
        }
        println!();
    }

    let failing = problems.iter().filter(|(_, d)| d.has_errors()).count();
    if failing > 0 {
        bail!("{failing} of {} objects have errors", manifest.objects.len());
    }

    ui::success(&format!("{} objects valid", manifest.objects.len()));
    Ok(())
}

/// Print an object's diagnostics under its address
pub fn print_diagnostics(address: &str, diagnostics: &Diagnostics) {
    println!("  {}", address.bold());
    for diagnostic in diagnostics {
        let label = match diagnostic.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
        };
        match &diagnostic.attribute {
            Some(attribute) => println!(
                "    {label} {}: {}",
                attribute.cyan(),
                diagnostic.message
            ),
            None => println!("    {label} {}", diagnostic.message),
        }
    }
}
