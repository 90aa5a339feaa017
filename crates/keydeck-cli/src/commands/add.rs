//! `keydeck add`

use clap::Args;
use console::style;
use keydeck_core::{Keydeck, SecretValue};
use tracing::debug;

use crate::validation::check_secret;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Key name (no whitespace or '=')
    pub name: String,

    /// Provider id (anthropic, glm)
    #[arg(short, long)]
    pub provider: String,

    /// Free-form description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Tag, may be repeated
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Secret value (if omitted, prompts for hidden input)
    #[arg(long)]
    pub value: Option<String>,
}

pub fn run(args: AddArgs, keydeck: &mut Keydeck) -> anyhow::Result<()> {
    let profile = keydeck.registry.catalog().resolve(&args.provider)?;

    let secret = match args.value {
        Some(v) => SecretValue::new(v),
        None => {
            debug!("No --value given, prompting for {}", args.name);
            let prompt = format!("Enter {} API key for '{}': ", profile.display_name, args.name);
            let entered = rpassword::prompt_password(prompt)
                .map_err(|e| anyhow::anyhow!("Failed to read secret: {}", e))?;
            SecretValue::new(entered)
        }
    };

    check_secret(profile, secret.expose()).map_err(|e| anyhow::anyhow!(e))?;

    let record = keydeck.registry.add(
        &args.name,
        profile.provider.as_str(),
        secret,
        args.description,
        args.tags,
    )?;

    println!(
        "{} Added {} ({})",
        style("*").green(),
        style(&record.name).bold(),
        record.provider
    );
    println!("  Run {} to activate it.", style(format!("keydeck use {}", record.name)).bold());
    Ok(())
}
