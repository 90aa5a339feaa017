//! `keydeck active`

use console::style;
use keydeck_core::Keydeck;

use crate::render;

pub fn run(keydeck: &Keydeck) -> anyhow::Result<()> {
    let record = keydeck.registry.get_active()?;
    let secret = keydeck.registry.get_secret(&record.name).ok();
    let profile = keydeck.registry.catalog().profile(record.provider)?;

    println!("{}", style(render::key_header()).bold());
    println!("{}", render::key_row(record, secret.as_ref()));
    println!("\n  Endpoint: {}", style(profile.base_url).dim());
    Ok(())
}
