use anyhow::{Result, bail};
use colored::Colorize;
use converge::{ManagedObject, registry};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::Context;
use crate::cli::StateCommand;
use crate::state::StateFile;
use crate::ui;

pub fn run(ctx: &Context, cmd: StateCommand) -> Result<()> {
    match cmd {
        StateCommand::List { state } => list(&state_path(ctx, state)?),
        StateCommand::Show { address, state } => show(&state_path(ctx, state)?, &address),
        StateCommand::Import {
            address,
            token,
            state,
        } => import(&state_path(ctx, state)?, &address, &token),
        StateCommand::Rm { address, state } => rm(&state_path(ctx, state)?, &address),
    }
}

fn state_path(ctx: &Context, explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(ctx.settings()?.state_file()),
    }
}

fn list(path: &Path) -> Result<()> {
    let state = StateFile::load(path)?;
    ui::header(&format!("Recorded Objects ({})", state.objects.len()));
    if state.objects.is_empty() {
        ui::dim("No objects recorded");
        return Ok(());
    }

    for (address, object) in &state.objects {
        let identity = token_of(object).unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<40} {:<40} {}",
            address.bold(),
            identity,
            object.status().to_string().dimmed()
        );
    }
    println!();
    ui::dim(&format!(
        "Last updated {}",
        state.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    Ok(())
}

fn show(path: &Path, address: &str) -> Result<()> {
    let state = StateFile::load(path)?;
    let Some(object) = state.get(address) else {
        bail!("No object recorded at '{address}'");
    };

    ui::header(address);
    ui::kv("kind", &object.kind);
    ui::kv("status", &object.status().to_string());
    if let Some(token) = token_of(object) {
        ui::kv("identity", &token);
    }

    ui::section("Recorded attributes");
    for (name, value) in displayed_attributes(object) {
        ui::kv(&name, &value);
    }
    Ok(())
}

/// Identity written the way `state import` accepts it
fn token_of(object: &ManagedObject) -> Option<String> {
    let identity = object.identity()?;
    Some(match registry().get(&object.kind) {
        Some(schema) => schema.token(identity),
        None => identity.to_string(),
    })
}

/// Recorded attributes ready for display, with sensitive values redacted
fn displayed_attributes(object: &ManagedObject) -> Vec<(String, String)> {
    let recorded = match registry().get(&object.kind) {
        Some(schema) => schema.redact(&object.recorded),
        None => object.recorded.clone(),
    };
    recorded
        .into_iter()
        .map(|(name, value)| {
            let shown = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (name, shown)
        })
        .collect()
}

fn import(path: &Path, address: &str, token: &str) -> Result<()> {
    let Some((kind, name)) = address.split_once('.') else {
        bail!("Invalid address '{address}': expected kind.name");
    };
    if name.is_empty() || name.contains('.') {
        bail!("Invalid address '{address}': expected kind.name");
    }
    let identity = converge::resolve(token, kind)?;
    if registry().require(kind)?.is_read_only() {
        bail!("{kind} is read-only and cannot be recorded");
    }

    let mut state = StateFile::load(path)?;
    if let Some(existing) = state.get(address) {
        bail!(
            "'{address}' is already recorded ({}); run `gatecfg state rm {address}` first",
            existing.status()
        );
    }
    state.record(address, ManagedObject::imported(kind, identity));
    state.save(path)?;

    log::info!("Imported {address} as {token}");
    ui::success(&format!("Recorded {address} ({token})"));
    ui::dim("The next apply reads the object and adopts its attributes");
    Ok(())
}

fn rm(path: &Path, address: &str) -> Result<()> {
    let mut state = StateFile::load(path)?;
    let Some(object) = state.remove(address) else {
        bail!("No object recorded at '{address}'");
    };
    state.save(path)?;

    log::info!("Removed {address} from {}", path.display());
    ui::success(&format!("Forgot {address}"));
    if object.status().exists_remotely() {
        ui::warn("The remote object was not deleted");
    }
    Ok(())
}
