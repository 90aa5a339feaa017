//! `keydeck validate`

use console::style;
use keydeck_core::settings::Severity;
use keydeck_core::Keydeck;

pub fn run(keydeck: &Keydeck) -> anyhow::Result<()> {
    let report = keydeck.inspect_target()?;
    let path = report.path.display();

    if !report.exists {
        println!("{} {} does not exist yet.", style("!").yellow().bold(), path);
        println!("  Run {} to create it.", style("keydeck export").bold());
        return Ok(());
    }

    if let Some(reason) = &report.parse_error {
        anyhow::bail!("{} is not a valid settings document: {}", path, reason);
    }

    for issue in &report.issues {
        let marker = match issue.severity {
            Severity::Error => style("x").red().bold(),
            Severity::Warning => style("!").yellow().bold(),
        };
        println!("{} {}: {}", marker, issue.path, issue.message);
    }

    if !report.is_healthy() {
        anyhow::bail!("{} has errors", path);
    }
    println!("{} {} looks good.", style("*").green(), path);
    Ok(())
}
