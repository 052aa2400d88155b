use anyhow::{Context as _, Result, bail};
use converge::{Action, AttributeChange, Plan, REDACTED};
use serde_json::Value;

use crate::Context;
use crate::cli::PlanArgs;
use crate::commands::validate::print_diagnostics;
use crate::engine::{build_plan, display_plan};
use crate::manifest::Manifest;
use crate::state::StateFile;
use crate::ui;

pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let settings = ctx.settings()?;
    let state_path = args.state.clone().unwrap_or_else(|| settings.state_file());

    let manifest = Manifest::load(&args.manifest)?;
    let problems = manifest.validate();
    if problems.iter().any(|(_, d)| d.has_errors()) {
        for (address, diagnostics) in &problems {
            print_diagnostics(address, diagnostics);
        }
        bail!("Manifest has errors; run `gatecfg validate` for details");
    }

    let state = StateFile::load(&state_path)?;
    let plan = build_plan(&manifest, &state)?.filter_by_target(args.target.as_deref());
    log::info!(
        "Planned {} objects against {}",
        plan.entries.len(),
        state_path.display()
    );

    if args.json {
        let json = serde_json::to_string_pretty(&redacted(plan))
            .context("Failed to serialize plan")?;
        println!("{json}");
        return Ok(());
    }

    if plan.is_empty() {
        if let Some(target) = &args.target {
            ui::warn(&format!("No objects match target '{target}'"));
        } else {
            ui::info("Manifest declares no objects and state records none");
        }
        return Ok(());
    }

    display_plan(&plan, ctx.verbose > 0);
    Ok(())
}

/// Replace sensitive values so the plan can be printed
fn redacted(mut plan: Plan) -> Plan {
    for entry in &mut plan.entries {
        match &mut entry.action {
            Action::Update { changes } => redact_changes(changes),
            Action::Replace { reasons, changes } => {
                redact_changes(reasons);
                redact_changes(changes);
            }
            _ => {}
        }
    }
    plan
}

fn redact_changes(changes: &mut [AttributeChange]) {
    for change in changes.iter_mut().filter(|c| c.sensitive) {
        for value in [&mut change.before, &mut change.after].into_iter().flatten() {
            *value = Value::String(REDACTED.to_string());
        }
    }
}
