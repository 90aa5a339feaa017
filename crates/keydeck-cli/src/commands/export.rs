//! `keydeck export`

use std::path::PathBuf;

use clap::Args;
use console::style;
use keydeck_core::{KeydeckError, Keydeck, ReconcileMode, SettingsDocument};
use tracing::{debug, info, warn};

use super::{load_overrides, ModeArgs};
use crate::{prompt, render};

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub mode: ModeArgs,

    /// JSON file deep-merged over the generated settings
    #[arg(long, value_name = "FILE")]
    pub overrides: Option<PathBuf>,
}

pub fn run(args: ExportArgs, keydeck: &Keydeck) -> anyhow::Result<()> {
    let overrides = load_overrides(args.overrides.as_deref())?;
    export_active(keydeck, &args.mode, overrides.as_ref())
}

/// Export the active key's settings in the mode the user asked for
///
/// With no mode flag an attended session is asked; otherwise Merge is used.
pub fn export_active(
    keydeck: &Keydeck,
    mode: &ModeArgs,
    overrides: Option<&SettingsDocument>,
) -> anyhow::Result<()> {
    let attended = console::user_attended();
    let mode = match mode.explicit() {
        Some(mode) => mode,
        None if attended => prompt::choose_mode(keydeck.reconciler().target())?,
        None => ReconcileMode::Merge,
    };
    debug!("Export mode {} (attended: {})", mode, attended);

    let result = match keydeck.export(mode, overrides) {
        Err(KeydeckError::MalformedExisting { path, reason }) if mode == ReconcileMode::Merge => {
            warn!("Cannot merge into malformed {:?}: {}", path, reason);
            eprintln!(
                "{} {} is not valid JSON ({}), so it cannot be merged.",
                style("!").yellow().bold(),
                style(path.display()).dim(),
                reason
            );
            if !attended {
                anyhow::bail!("Refusing to overwrite {} without confirmation; rerun with --overwrite", path.display());
            }
            if !prompt::confirm("Overwrite it? A backup is made first.")? {
                anyhow::bail!("Export cancelled");
            }
            info!("Falling back to Overwrite for {:?}", path);
            keydeck.export(ReconcileMode::Overwrite, overrides)?
        }
        other => other?,
    };

    render::print_result(&result);
    Ok(())
}
