//! Human-readable rendering of an action plan

use std::fmt::Write;

use serde_json::Value;
use similar::{ChangeTag, TextDiff};

use super::action::Action;
use super::plan::ActionPlan;
use crate::resolve::{ComponentInstance, PolicyResolution};

/// Render a plan as text, one block per step.
///
/// Updates show a line diff of the old and new code parameters.
pub fn render(plan: &ActionPlan, desired: &PolicyResolution, actual: &PolicyResolution) -> String {
    if plan.is_empty() {
        return "No changes. Actual state matches the policy.\n".to_string();
    }

    let mut out = String::new();
    for step in &plan.steps {
        let _ = write!(out, "{}", step.key);
        if !step.after.is_empty() {
            let after: Vec<String> = step.after.iter().map(|k| k.component.clone()).collect();
            let _ = write!(out, " (after {})", after.join(", "));
        }
        out.push('\n');

        for action in &step.actions {
            let _ = writeln!(out, "  {} {}", sign(action), describe(action));
            if let Action::Update { key } = action {
                let old = actual.instance(key).map(params_text).unwrap_or_default();
                let new = desired.instance(key).map(params_text).unwrap_or_default();
                push_text_diff(&mut out, &old, &new);
            }
        }
    }

    let _ = writeln!(
        out,
        "\nPlan: {} action(s) on {} instance(s)",
        plan.len(),
        plan.steps.len()
    );
    out
}

fn sign(action: &Action) -> char {
    match action {
        Action::Create { .. } | Action::AttachClaim { .. } => '+',
        Action::Delete { .. } | Action::DetachClaim { .. } => '-',
        Action::Update { .. } => '~',
        Action::RefreshEndpoints { .. } => '*',
    }
}

fn describe(action: &Action) -> String {
    match action {
        Action::AttachClaim { claim, .. } => format!("attach claim {}", claim),
        Action::DetachClaim { claim, .. } => format!("detach claim {}", claim),
        Action::RefreshEndpoints { .. } => "refresh endpoints".to_string(),
        _ => action.name().to_string(),
    }
}

fn params_text(instance: &ComponentInstance) -> String {
    let value = Value::Object(instance.code_params.clone());
    let mut text = serde_json::to_string_pretty(&value).unwrap_or_default();
    text.push('\n');
    text
}

fn push_text_diff(out: &mut String, old: &str, new: &str) {
    let diff = TextDiff::from_lines(old, new);
    for change in diff.iter_all_changes() {
        let prefix = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => continue,
        };
        let _ = write!(out, "      {} {}", prefix, change.value());
        if change.missing_newline() {
            out.push('\n');
        }
    }
}
