//! `keydeck list`

use clap::Args;
use console::style;
use keydeck_core::{KeyFilter, Keydeck, Provider};

use crate::render;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only keys for this provider
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Only keys carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Only keys whose name or description contains this text
    #[arg(short, long)]
    pub search: Option<String>,
}

pub fn run(args: ListArgs, keydeck: &Keydeck) -> anyhow::Result<()> {
    let mut filter = KeyFilter::all();
    if let Some(provider) = &args.provider {
        filter = filter.provider(provider.parse::<Provider>()?);
    }
    if let Some(tag) = args.tag {
        filter = filter.tag(tag);
    }
    if let Some(search) = args.search {
        filter = filter.search(search);
    }

    for issue in keydeck.registry.issues() {
        eprintln!("{} {}", style("!").yellow().bold(), issue);
    }

    let records: Vec<_> = keydeck.registry.list(&filter).collect();
    if records.is_empty() {
        println!("No keys found.");
        return Ok(());
    }

    println!("{}", style(render::key_header()).bold());
    for record in &records {
        let secret = keydeck.registry.get_secret(&record.name).ok();
        println!("{}", render::key_row(record, secret.as_ref()));
    }
    println!("\n{} key(s).", records.len());
    Ok(())
}
