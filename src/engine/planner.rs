//! Execution planner - pairs declarations with recorded state

use crate::manifest::Manifest;
use crate::state::StateFile;
use anyhow::{Context, Result};
use converge::{Plan, plan_instance, registry};

/// Plan every declared object, then every recorded object that is no
/// longer declared
pub fn build_plan(manifest: &Manifest, state: &StateFile) -> Result<Plan> {
    let mut plan = Plan::new();

    for object in &manifest.objects {
        let address = object.address();
        let schema = registry().require(&object.kind)?;
        let recorded = state.get(&address);
        if let Some(recorded) = recorded
            && recorded.kind != object.kind
        {
            anyhow::bail!(
                "{address} is recorded as kind '{}' but declared as '{}'",
                recorded.kind,
                object.kind
            );
        }
        let action = plan_instance(schema, Some(&object.declared()), recorded)
            .with_context(|| format!("Failed to plan {address}"))?;
        log::debug!("{address}: {}", action.label());
        plan.push(address, &object.kind, action);
    }

    for (address, recorded) in &state.objects {
        if manifest.find(address).is_some() {
            continue;
        }
        let schema = registry()
            .require(&recorded.kind)
            .with_context(|| format!("Recorded object {address}"))?;
        let action = plan_instance(schema, None, Some(recorded))?;
        plan.push(address.as_str(), recorded.kind.as_str(), action);
    }

    Ok(plan)
}
