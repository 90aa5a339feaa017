//! `keydeck delete`

use clap::Args;
use console::style;
use keydeck_core::Keydeck;

use crate::prompt;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Key name
    pub name: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

pub fn run(args: DeleteArgs, keydeck: &mut Keydeck) -> anyhow::Result<()> {
    if !args.yes {
        if !console::user_attended() {
            anyhow::bail!("Refusing to delete '{}' without confirmation; pass --yes", args.name);
        }
        if !prompt::confirm(&format!("Delete key '{}'?", args.name))? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let was_active = keydeck
        .registry
        .get(&args.name)
        .map(|r| r.active)
        .unwrap_or(false);

    keydeck.registry.delete(&args.name)?;

    println!("{} Deleted {}", style("*").green(), style(&args.name).bold());
    if was_active {
        println!(
            "  It was the active key; the settings file still holds its values until you run {}.",
            style("keydeck use <NAME>").bold()
        );
    }
    Ok(())
}
