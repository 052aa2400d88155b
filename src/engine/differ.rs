//! Plan display - gatecfg-specific UI

use colored::Colorize;
use converge::canonical::document_of;
use converge::{Action, AttributeChange, Plan, PlannedChange, REDACTED};
use serde_json::Value;

/// Display a plan in a user-friendly format
///
/// Unchanged entries are listed only when `show_unchanged` is set.
pub fn display_plan(plan: &Plan, show_unchanged: bool) {
    let summary = plan.summary();
    if !summary.has_changes() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for entry in &plan.entries {
        if entry.action.is_noop() && !show_unchanged {
            continue;
        }
        display_entry(entry);
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to create, {} to update, {} to replace, {} to delete, {} to finish",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.replace.to_string().magenta(),
        summary.delete.to_string().red(),
        summary.finish.to_string().cyan()
    );
    if summary.unchanged > 0 {
        println!("│ {}", format!("{} unchanged", summary.unchanged).dimmed());
    }
    println!("└─────────────────────────────────────────────────────┘");
}

fn display_entry(entry: &PlannedChange) {
    let symbol = match entry.action {
        Action::Create => "+".green(),
        Action::Delete => "-".red(),
        Action::Update { .. } => "~".yellow(),
        Action::Replace { .. } => "±".magenta(),
        Action::Finish => "…".cyan(),
        Action::NoOp => "=".dimmed(),
    };
    println!(
        "│ {} {:<40} {}",
        symbol,
        entry.address.bold(),
        entry.action.label().dimmed()
    );

    match &entry.action {
        Action::Update { changes } => {
            for change in changes {
                display_change(change);
            }
        }
        Action::Replace { reasons, changes } => {
            let forced: Vec<_> = reasons.iter().map(|r| r.attribute.as_str()).collect();
            println!(
                "│     {}",
                format!("forces replacement: {}", forced.join(", ")).magenta()
            );
            for change in changes {
                display_change(change);
            }
        }
        _ => {}
    }
}

fn display_change(change: &AttributeChange) {
    if change.document && !change.sensitive {
        println!("│     {} {}", "~".yellow(), change.attribute);
        show_document_diff(change);
        return;
    }

    let before = render_value(change, change.before.as_ref());
    let after = render_value(change, change.after.as_ref());
    println!(
        "│     {} {}: {} → {}",
        "~".yellow(),
        change.attribute,
        before.dimmed(),
        after
    );
}

/// Value as shown in the plan
fn render_value(change: &AttributeChange, value: Option<&Value>) -> String {
    match value {
        None => "(unset)".to_string(),
        Some(_) if change.sensitive => REDACTED.to_string(),
        Some(Value::String(s)) => format!("\"{s}\""),
        Some(other) => other.to_string(),
    }
}

/// Pretty-printed document; unparseable text is shown verbatim
fn pretty_document(attribute: &str, value: Option<&Value>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    let text = document_of(attribute, value)
        .ok()
        .and_then(|doc| serde_json::to_string_pretty(&doc).ok())
        .unwrap_or_else(|| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    format!("{text}\n")
}

/// Show a line diff between the recorded and declared documents
fn show_document_diff(change: &AttributeChange) {
    let before = pretty_document(&change.attribute, change.before.as_ref());
    let after = pretty_document(&change.attribute, change.after.as_ref());

    let diff = similar::TextDiff::from_lines(&before, &after);
    for line in diff.iter_all_changes() {
        match line.tag() {
            similar::ChangeTag::Delete => print!("│       {}", format!("- {line}").red()),
            similar::ChangeTag::Insert => print!("│       {}", format!("+ {line}").green()),
            similar::ChangeTag::Equal => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(sensitive: bool, document: bool) -> AttributeChange {
        AttributeChange {
            attribute: "config".into(),
            before: Some(json!("old")),
            after: None,
            forces_replacement: false,
            sensitive,
            document,
        }
    }

    #[test]
    fn test_render_value() {
        let plain = change(false, false);
        assert_eq!(render_value(&plain, Some(&json!("old"))), "\"old\"");
        assert_eq!(render_value(&plain, Some(&json!(3))), "3");
        assert_eq!(render_value(&plain, None), "(unset)");
    }

    #[test]
    fn test_sensitive_values_are_redacted() {
        let secret = change(true, false);
        assert_eq!(render_value(&secret, Some(&json!("pk-123"))), REDACTED);
        assert_eq!(render_value(&secret, None), "(unset)");
    }

    #[test]
    fn test_pretty_document() {
        let text = pretty_document("config", Some(&json!(r#"{"b":1,"a":[true]}"#)));
        assert_eq!(text, "{\n  \"a\": [\n    true\n  ],\n  \"b\": 1\n}\n");
        assert_eq!(pretty_document("config", None), "");
    }

    #[test]
    fn test_pretty_document_keeps_malformed_text() {
        assert_eq!(pretty_document("config", Some(&json!("{oops"))), "{oops\n");
    }
}
