//! `keydeck doctor`

use clap::Args;
use console::style;
use keydeck_core::Keydeck;

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Fix every problem found
    #[arg(long)]
    pub repair: bool,
}

pub fn run(args: DoctorArgs, keydeck: &mut Keydeck) -> anyhow::Result<()> {
    let issues = keydeck.registry.issues().to_vec();
    if issues.is_empty() {
        println!("{} Key store is consistent ({} key(s)).", style("*").green(), keydeck.registry.len());
        return Ok(());
    }

    for issue in &issues {
        println!("{} {}", style("!").yellow().bold(), issue);
    }

    if !args.repair {
        anyhow::bail!(
            "{} problem(s) found; run `keydeck doctor --repair` to fix them",
            issues.len()
        );
    }

    for action in keydeck.registry.repair()? {
        println!("{} {}", style("*").green(), action);
    }
    if !keydeck.registry.is_consistent() {
        anyhow::bail!("Key store still has problems after repair");
    }
    println!("Key store repaired.");
    Ok(())
}
