//! Plain-text change summary renderer.

use crate::classify::{ChangeClass, ChangeItem};
use crate::diff::model::{FieldChange, FieldChangeKind};

/// Render a human-readable summary of classified changes.
///
/// One section per location, listing the flattened field paths that differ.
/// Informational only; nothing downstream parses it.
pub fn render_change_summary(changes: &[ChangeItem]) -> String {
    let mut out = String::new();

    if changes.is_empty() {
        out.push_str("No changes detected.\n");
        return out;
    }

    for change in changes {
        out.push_str(&format!(
            "[{}] {}\n",
            change.class.as_str(),
            change.location
        ));
        if let Some(arn) = &change.arn {
            out.push_str(&format!("  arn: {arn}\n"));
        }

        match change.class {
            ChangeClass::Created | ChangeClass::Deleted => {}
            ChangeClass::Changed | ChangeClass::Ephemeral => match change.field_changes() {
                Ok(fields) => out.push_str(&render_field_changes(&fields)),
                Err(err) => {
                    out.push_str(&format!("  (structure changed: {})\n", err.message()));
                }
            },
        }
    }

    out
}

/// One indented line per field change: `+` added, `-` removed, `~` replaced.
pub fn render_field_changes(fields: &[FieldChange]) -> String {
    fields.iter().map(render_field).collect()
}

fn render_field(field: &FieldChange) -> String {
    let path = if field.path.is_empty() {
        "<root>"
    } else {
        field.path.as_str()
    };
    match field.kind {
        FieldChangeKind::Added => format!("  + {}: {}\n", path, short(field.new.as_ref())),
        FieldChangeKind::Removed => format!("  - {}: {}\n", path, short(field.old.as_ref())),
        FieldChangeKind::Replaced => format!(
            "  ~ {}: {} -> {}\n",
            path,
            short(field.old.as_ref()),
            short(field.new.as_ref())
        ),
    }
}

/// Truncate long values so one field stays on one line.
fn short(value: Option<&crate::model::ConfigValue>) -> String {
    const MAX: usize = 80;
    let Some(value) = value else {
        return "-".to_string();
    };
    let text = value.canonical_json();
    if text.chars().count() <= MAX {
        text
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{head}…")
    }
}
