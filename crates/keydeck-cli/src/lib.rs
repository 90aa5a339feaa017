//! keydeck command-line interface

pub mod commands;
pub mod prompt;
pub mod render;
pub mod validation;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use keydeck_core::config::{default_data_dir, HOME_ENV, SETTINGS_PATH_ENV};
use keydeck_core::{AppConfig, Keydeck};
use tracing::debug;

/// keydeck - switch between API keys and keep the tool's settings.json in sync
#[derive(Parser, Debug)]
#[command(name = "keydeck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Directory holding the key stores and config.json
    #[arg(long, global = true, env = HOME_ENV, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Settings file to export to
    #[arg(long, global = true, env = SETTINGS_PATH_ENV, value_name = "FILE")]
    pub settings_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a new API key
    Add(commands::add::AddArgs),

    /// List stored keys
    List(commands::list::ListArgs),

    /// Delete a key
    Delete(commands::delete::DeleteArgs),

    /// Make a key active and export its settings
    Use(commands::use_key::UseArgs),

    /// Export settings for the active key
    Export(commands::export::ExportArgs),

    /// Show the active key
    Active,

    /// Check the settings file
    Validate,

    /// Check the key stores for inconsistencies
    Doctor(commands::doctor::DoctorArgs),
}

impl Cli {
    /// Configuration with command-line locations applied
    pub fn config(&self) -> anyhow::Result<AppConfig> {
        let data_dir = match &self.home {
            Some(home) => home.clone(),
            None => default_data_dir()?,
        };
        let mut config = AppConfig::load_from(&data_dir)?;
        if let Some(path) = &self.settings_path {
            config.settings_path = Some(path.clone());
        }
        Ok(config)
    }
}

/// Run the CLI with the given arguments.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config()?;
    debug!("Using data dir {:?}", config.data_dir);
    let mut keydeck = Keydeck::open(config)?;

    match cli.command {
        Commands::Add(args) => commands::add::run(args, &mut keydeck),
        Commands::List(args) => commands::list::run(args, &keydeck),
        Commands::Delete(args) => commands::delete::run(args, &mut keydeck),
        Commands::Use(args) => commands::use_key::run(args, &mut keydeck),
        Commands::Export(args) => commands::export::run(args, &keydeck),
        Commands::Active => commands::active::run(&keydeck),
        Commands::Validate => commands::validate::run(&keydeck),
        Commands::Doctor(args) => commands::doctor::run(args, &mut keydeck),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use keydeck_core::{PreviewTarget, ReconcileMode};

    #[test]
    fn test_parse_add() {
        let cli = Cli::try_parse_from([
            "keydeck", "add", "WORK", "--provider", "glm", "--tag", "work", "--tag", "team",
            "--value", "abc",
        ])
        .unwrap();
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.name, "WORK");
                assert_eq!(args.provider, "glm");
                assert_eq!(args.tags, vec!["work", "team"]);
                assert_eq!(args.value.as_deref(), Some("abc"));
            }
            _ => panic!("Expected Add command"),
        }
    }

    #[test]
    fn test_parse_list_filters() {
        let cli = Cli::try_parse_from([
            "keydeck", "list", "--provider", "anthropic", "--tag", "home", "--search", "pers",
        ])
        .unwrap();
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.provider.as_deref(), Some("anthropic"));
                assert_eq!(args.tag.as_deref(), Some("home"));
                assert_eq!(args.search.as_deref(), Some("pers"));
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_parse_use_modes() {
        let cases = [
            (vec!["keydeck", "use", "WORK", "--merge"], Some(ReconcileMode::Merge)),
            (vec!["keydeck", "use", "WORK", "--overwrite"], Some(ReconcileMode::Overwrite)),
            (
                vec!["keydeck", "use", "--preview", "WORK"],
                Some(ReconcileMode::Preview(PreviewTarget::Merge)),
            ),
            (
                vec!["keydeck", "use", "WORK", "--preview=overwrite"],
                Some(ReconcileMode::Preview(PreviewTarget::Overwrite)),
            ),
            (vec!["keydeck", "use", "WORK"], None),
        ];

        for (argv, expected) in cases {
            let cli = Cli::try_parse_from(argv.iter().copied()).unwrap();
            match cli.command {
                Commands::Use(args) => {
                    assert_eq!(args.name, "WORK", "{:?}", argv);
                    assert_eq!(args.mode.explicit(), expected, "{:?}", argv);
                }
                _ => panic!("Expected Use command"),
            }
        }
    }

    #[test]
    fn test_modes_are_exclusive() {
        assert!(Cli::try_parse_from(["keydeck", "export", "--merge", "--overwrite"]).is_err());
        assert!(Cli::try_parse_from(["keydeck", "export", "--merge", "--preview"]).is_err());
        assert!(Cli::try_parse_from(["keydeck", "export", "--preview=both"]).is_err());
    }

    #[test]
    fn test_parse_global_locations() {
        let cli = Cli::try_parse_from([
            "keydeck",
            "active",
            "--home",
            "/tmp/kd",
            "--settings-path",
            "/tmp/settings.json",
        ])
        .unwrap();
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/kd")));
        assert_eq!(cli.settings_path, Some(PathBuf::from("/tmp/settings.json")));
        assert!(matches!(cli.command, Commands::Active));
    }

    #[test]
    fn test_config_uses_flags() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let home = temp_dir.path().to_string_lossy().into_owned();
        let cli = Cli::try_parse_from([
            "keydeck",
            "--home",
            home.as_str(),
            "--settings-path",
            "/tmp/other.json",
            "validate",
        ])
        .unwrap();

        let config = cli.config().unwrap();
        assert_eq!(config.data_dir, temp_dir.path());
        assert_eq!(config.settings_target().unwrap(), PathBuf::from("/tmp/other.json"));
    }

    #[test]
    fn test_parse_doctor_and_delete() {
        let cli = Cli::try_parse_from(["keydeck", "doctor", "--repair"]).unwrap();
        assert!(matches!(cli.command, Commands::Doctor(ref a) if a.repair));

        let cli = Cli::try_parse_from(["keydeck", "delete", "WORK", "-y"]).unwrap();
        assert!(matches!(cli.command, Commands::Delete(ref a) if a.yes && a.name == "WORK"));
    }

    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_commands_emit_log_events() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let home = temp_dir.path().join("data").to_string_lossy().into_owned();
        let settings = temp_dir.path().join("settings.json").to_string_lossy().into_owned();
        let argv = |rest: &[&str]| {
            let mut argv = vec!["keydeck", "--home", home.as_str(), "--settings-path", settings.as_str()];
            argv.extend_from_slice(rest);
            Cli::try_parse_from(argv).unwrap()
        };

        let logs = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || Captured(sink.clone()))
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            run(argv(&["add", "WORK", "--provider", "glm", "--value", "glm-secret-0001"])).unwrap();
            run(argv(&["use", "WORK", "--no-export"])).unwrap();
        });

        let logs = String::from_utf8(logs.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("Using data dir"), "{}", logs);
        assert!(logs.contains("Skipping export for WORK"), "{}", logs);
        assert!(!std::path::Path::new(&settings).exists());
    }
}
