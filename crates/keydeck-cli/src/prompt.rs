//! Interactive prompts

use std::path::Path;

use console::{style, Term};
use keydeck_core::{PreviewTarget, ReconcileMode};

const MAX_ATTEMPTS: usize = 3;

/// Ask a yes/no question; anything but yes is no
pub fn confirm(question: &str) -> anyhow::Result<bool> {
    let term = Term::stderr();
    term.write_str(&format!("  {} {} ", question, style("[y/N]").dim()))?;
    let answer = term.read_line()?;
    Ok(parse_yes(&answer))
}

/// Ask how the settings file should be updated
pub fn choose_mode(target: &Path) -> anyhow::Result<ReconcileMode> {
    let term = Term::stderr();
    term.write_line(&format!(
        "How should {} be updated?",
        style(target.display()).bold()
    ))?;
    let options = [
        "merge (keep your other settings)",
        "overwrite (replace the whole file)",
        "preview merge",
        "preview overwrite",
    ];
    for (i, label) in options.iter().enumerate() {
        let default_marker = if i == 0 { " (default)" } else { "" };
        term.write_line(&format!(
            "  {} {}{}",
            style(format!("[{}]", i + 1)).cyan(),
            label,
            style(default_marker).dim()
        ))?;
    }

    for _ in 0..MAX_ATTEMPTS {
        term.write_str("  Choice: ")?;
        let answer = term.read_line()?;
        match parse_choice(&answer) {
            Some(mode) => return Ok(mode),
            None => term.write_line(&format!("  {} Enter 1-4", style("!").yellow()))?,
        }
    }
    anyhow::bail!("No valid choice given")
}

/// Map a menu answer to a mode; empty input picks Merge
pub fn parse_choice(input: &str) -> Option<ReconcileMode> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "m" | "merge" => Some(ReconcileMode::Merge),
        "2" | "o" | "overwrite" => Some(ReconcileMode::Overwrite),
        "3" | "p" | "preview" => Some(ReconcileMode::Preview(PreviewTarget::Merge)),
        "4" => Some(ReconcileMode::Preview(PreviewTarget::Overwrite)),
        _ => None,
    }
}

pub fn parse_yes(input: &str) -> bool {
    matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
