use anyhow::Result;
use colored::Colorize;
use converge::{AttributeSpec, ImportFormat, KindSchema, registry};

use crate::Context;
use crate::ui;

pub fn run(_ctx: &Context, kind: Option<&str>) -> Result<()> {
    match kind {
        Some(name) => describe(registry().require(name)?),
        None => list(),
    }
    Ok(())
}

fn list() {
    ui::header("Object Kinds");
    for schema in registry().kinds() {
        println!(
            "  {:<22} {:<10} {}",
            schema.name.bold(),
            access(schema).yellow(),
            schema.description.dimmed()
        );
    }
    println!();
    ui::dim("Run `gatecfg kinds <kind>` for attributes");
}

fn describe(schema: &KindSchema) {
    ui::header(schema.name);
    if !schema.description.is_empty() {
        ui::dim(schema.description);
    }
    if schema.is_read_only() {
        ui::dim("Read-only: can be looked up, never declared or imported");
    }

    ui::section("Identity");
    ui::kv("id", schema.identity.id);
    if let Some(parent) = schema.identity.parent {
        ui::kv("parent", parent);
    }
    let token = schema.import.expected(&schema.identity);
    ui::kv("import token", &token);
    if let ImportFormat::Scoped { separator } = schema.import {
        ui::kv("separator", &separator.to_string());
    }

    ui::section("Attributes");
    for spec in schema.attributes() {
        println!(
            "  {:<20} {:<20} {:<7} {}",
            spec.name.bold(),
            spec.mutability.label(),
            spec.value_kind.to_string(),
            flags(spec).join(" ").dimmed()
        );
        if !spec.description.is_empty() {
            println!("  {:<20} {}", "", spec.description.dimmed());
        }
    }
}

/// Marker shown next to kinds that cannot be managed
fn access(schema: &KindSchema) -> &'static str {
    if schema.is_read_only() { "read-only" } else { "" }
}

fn flags(spec: &AttributeSpec) -> Vec<&'static str> {
    let mut flags = Vec::new();
    if spec.required {
        flags.push("required");
    }
    if spec.forces_replacement() {
        flags.push("replace");
    }
    if spec.write_only {
        flags.push("write-only");
    }
    if spec.retain_when_absent {
        flags.push("retained");
    }
    if spec.sensitive {
        flags.push("sensitive");
    }
    if !spec.elision.is_empty() {
        flags.push("elides-defaults");
    }
    flags
}
