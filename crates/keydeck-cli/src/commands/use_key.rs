//! `keydeck use`

use std::path::PathBuf;

use clap::Args;
use console::style;
use keydeck_core::{Keydeck, ReconcileMode};
use tracing::debug;

use super::export::export_active;
use super::{load_overrides, ModeArgs};
use crate::render;

#[derive(Args, Debug)]
pub struct UseArgs {
    /// Key to activate
    pub name: String,

    #[command(flatten)]
    pub mode: ModeArgs,

    /// Only switch the active key; leave the settings file alone
    #[arg(long, conflicts_with_all = ["merge", "overwrite", "preview", "overrides"])]
    pub no_export: bool,

    /// JSON file deep-merged over the generated settings
    #[arg(long, value_name = "FILE")]
    pub overrides: Option<PathBuf>,
}

pub fn run(args: UseArgs, keydeck: &mut Keydeck) -> anyhow::Result<()> {
    // Parse overrides before anything changes on disk
    let overrides = load_overrides(args.overrides.as_deref())?;

    if let Some(ReconcileMode::Preview(target)) = args.mode.explicit() {
        let record = keydeck.registry.get(&args.name)?;
        println!(
            "Preview for {} ({}); the active key is unchanged.",
            style(&record.name).bold(),
            record.provider
        );
        let result = keydeck.preview_key(&args.name, target, overrides.as_ref())?;
        render::print_result(&result);
        return Ok(());
    }

    let (previous, current) = keydeck.registry.activate(&args.name)?;
    match previous {
        Some(prev) if prev.name == current.name => {
            println!("{} is already active.", style(&current.name).bold());
        }
        Some(prev) => println!(
            "{} Switched from {} to {} ({})",
            style("*").green(),
            prev.name,
            style(&current.name).bold(),
            current.provider
        ),
        None => println!(
            "{} Activated {} ({})",
            style("*").green(),
            style(&current.name).bold(),
            current.provider
        ),
    }

    if args.no_export {
        debug!("Skipping export for {}", current.name);
        return Ok(());
    }
    export_active(keydeck, &args.mode, overrides.as_ref())
}
