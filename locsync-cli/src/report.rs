use locsync::{ApplyMode, ApplyReport, ChangeKind};
use serde_json::{Value, json};

fn mode_label(mode: ApplyMode) -> &'static str {
    match mode {
        ApplyMode::DryRun => "[DRY RUN] ",
        ApplyMode::Commit | ApplyMode::Backup => "",
    }
}

/// One-line summary of a pair, as printed by both `merge` and `sync`.
pub fn summary_line(report: &ApplyReport) -> String {
    let c = &report.counts;
    let verb = match (report.mode, report.written) {
        (ApplyMode::DryRun, _) => "Would merge",
        (_, true) => "Merged",
        (_, false) => "Up to date",
    };
    format!(
        "{}{} {}: {} added, {} updated, {} removed, {} unchanged",
        mode_label(report.mode),
        verb,
        report.target.display(),
        c.added,
        c.updated,
        c.removed,
        c.unchanged
    )
}

/// Prints a human-readable report to stdout.
pub fn print_report(report: &ApplyReport, show_diff: bool) {
    println!("{}", summary_line(report));
    for change in &report.changes {
        let marker = match change.change {
            ChangeKind::Added => "+",
            ChangeKind::Updated => "~",
            ChangeKind::Removed => "-",
            ChangeKind::Unchanged => "=",
        };
        println!("  {} {}", marker, change.key);
    }
    if !report.missing_keys.is_empty() {
        println!(
            "  Not found in source ({}): {}",
            report.missing_keys.len(),
            report.missing_keys.join(", ")
        );
    }
    if let Some(backup) = &report.backup {
        println!("  Backup: {}", backup.display());
    }
    if show_diff && !report.preview.is_empty() {
        print!("{}", report.preview);
    }
}

/// JSON form of a report; the preview is only included when asked for.
pub fn report_json(report: &ApplyReport, include_diff: bool) -> Result<Value, String> {
    let mut value = serde_json::to_value(report)
        .map_err(|e| format!("Failed to serialize report JSON: {}", e))?;
    if !include_diff && let Some(obj) = value.as_object_mut() {
        obj.remove("preview");
    }
    Ok(value)
}

pub fn print_json(value: &Value) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize report JSON: {}", e))?;
    println!("{}", text);
    Ok(())
}

/// JSON body for a failed pair in `sync --json` output.
pub fn failure_json(target: &std::path::Path, lang: &str, message: &str) -> Value {
    json!({
        "target": target.display().to_string(),
        "lang": lang,
        "error": message,
    })
}
