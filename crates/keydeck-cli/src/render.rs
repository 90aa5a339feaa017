//! Terminal output

use console::style;
use keydeck_core::settings::{secret_paths, ChangeKind, SettingsDiff};
use keydeck_core::{KeyRecord, ReconciliationResult, SecretValue};
use serde_json::Value;

/// One line per change, secrets masked
pub fn diff_lines(diff: &SettingsDiff) -> Vec<String> {
    let masked = diff.masked(&secret_paths());
    masked
        .changes
        .iter()
        .map(|change| match change.kind() {
            ChangeKind::Added => format!("+ {}: {}", change.path, show(&change.new)),
            ChangeKind::Removed => format!("- {}: {}", change.path, show(&change.old)),
            ChangeKind::Changed => format!(
                "~ {}: {} -> {}",
                change.path,
                show(&change.old),
                show(&change.new)
            ),
        })
        .collect()
}

fn show(value: &Option<Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

pub fn print_diff(diff: &SettingsDiff) {
    if diff.is_empty() {
        println!("No changes.");
        return;
    }
    for line in diff_lines(diff) {
        let styled = match line.chars().next() {
            Some('+') => style(line).green(),
            Some('-') => style(line).red(),
            _ => style(line).yellow(),
        };
        println!("{}", styled);
    }
    println!("\n{} change(s), nothing written.", diff.len());
}

pub fn print_result(result: &ReconciliationResult) {
    match result {
        ReconciliationResult::Applied { written, backup } => {
            println!("{} Wrote {}", style("*").green(), style(written.display()).bold());
            if let Some(backup) = backup {
                println!("  Backup: {}", style(backup.display()).dim());
            }
        }
        ReconciliationResult::PreviewOnly(diff) => print_diff(diff),
        ReconciliationResult::Unchanged => println!("Settings already up to date."),
    }
}

/// Row for `list` and `active`
pub fn key_row(record: &KeyRecord, secret: Option<&SecretValue>) -> String {
    let marker = if record.active { "*" } else { " " };
    let secret = secret.map(SecretValue::masked).unwrap_or_else(|| "<missing>".to_string());
    let tags = record.tags.iter().cloned().collect::<Vec<_>>().join(",");
    format!(
        "{} {:<20} {:<10} {:<24} {:<16} {}",
        marker,
        record.name,
        record.provider.as_str(),
        secret,
        tags,
        record.description.as_deref().unwrap_or("")
    )
}

pub fn key_header() -> String {
    format!(
        "  {:<20} {:<10} {:<24} {:<16} {}",
        "NAME", "PROVIDER", "SECRET", "TAGS", "DESCRIPTION"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use keydeck_core::settings::diff_documents;
    use keydeck_core::{Provider, SettingsDocument};
    use serde_json::json;

    #[test]
    fn test_diff_lines_mask_token() {
        let old = SettingsDocument::from_value(json!({
            "env": { "ANTHROPIC_AUTH_TOKEN": "old-token-1111", "GONE": "x" }
        }))
        .unwrap();
        let new = SettingsDocument::from_value(json!({
            "env": { "ANTHROPIC_AUTH_TOKEN": "new-token-2222", "API_TIMEOUT_MS": "3000000" }
        }))
        .unwrap();

        let lines = diff_lines(&diff_documents(&old, &new));
        assert_eq!(
            lines,
            vec![
                "~ env.ANTHROPIC_AUTH_TOKEN: \"**********1111\" -> \"**********2222\"",
                "+ env.API_TIMEOUT_MS: \"3000000\"",
                "- env.GONE: \"x\"",
            ]
        );
    }

    #[test]
    fn test_key_row_masks_secret() {
        let mut record = KeyRecord::new("WORK", Provider::Glm).unwrap();
        record.active = true;
        let row = key_row(&record, Some(&SecretValue::from("glm-secret-9999")));
        assert!(row.starts_with("* WORK"));
        assert!(row.contains("9999"));
        assert!(!row.contains("glm-secret"));
    }
}
