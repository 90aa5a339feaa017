//! keydeck CLI entry point.

use clap::Parser;
use keydeck_cli::{run, Cli};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "keydeck_core=info,keydeck_cli=info,warn",
        _ => "keydeck_core=debug,keydeck_cli=debug,warn",
    };

    // Logs go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    run(cli)
}
