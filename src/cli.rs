//! Command-line surface: one subcommand per admin operation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "inkvault", version, about = "Webtoon ingestion and archival service")]
pub struct Cli {
    /// Config file (TOML, YAML or JSON). Defaults to `inkvault.*` in the
    /// working directory.
    #[arg(short, long, global = true, env = "INKVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// More logging; repeat for even more. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resume the persisted queue and run the daily update until interrupted.
    Daemon,
    /// Queue series by name and download them.
    Enqueue {
        #[arg(required = true)]
        names: Vec<String>,
        #[arg(short, long, default_value = "en")]
        language: String,
    },
    /// Queue every archived series for new episodes and download them.
    UpdateAll,
    /// Resolve a name against the series index.
    Find {
        name: String,
        #[arg(short, long, default_value = "en")]
        language: String,
    },
    /// Inspect or edit the persisted download queue.
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Rebuild the series index from the remote source.
    RefreshCache,
    /// Download one archived episode again, replacing its pages.
    Redownload { episode_id: i64 },
    /// Copy every blob from the other backend onto `to`.
    Migrate {
        #[arg(value_enum)]
        to: Target,
        #[command(flatten)]
        dry_run: DryRun,
    },
    /// Delete every blob in the S3 bucket. Refused in production.
    ClearRemote {
        #[command(flatten)]
        dry_run: DryRun,
    },
    /// Image and chunk counts, as served to other instances.
    MigrationInfo,
    /// Write the zip archive of one blob chunk.
    ExportChunk {
        /// 1-based.
        chunk: u32,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Write a consistent copy of the catalog database.
    ExportDatabase {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Pull every blob and the catalog database from another instance.
    ImportFrom {
        url: String,
        #[arg(long, env = "INKVAULT_ADMIN_KEY", hide_env_values = true)]
        admin_key: String,
    },
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum QueueAction {
    /// Current download first, then everything pending.
    Show,
    /// Drop the current download.
    Skip,
    /// Drop everything.
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    Local,
    S3,
}

#[derive(Debug, Clone, Copy, Args)]
pub struct DryRun {
    /// Report what would change without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["inkvault", "enqueue", "Tower of God"], "en")]
    #[case(&["inkvault", "enqueue", "-l", "fr", "Tower of God", "Lore Olympus"], "fr")]
    fn test_enqueue_language(#[case] args: &[&str], #[case] expected: &str) {
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Enqueue { language, names } = cli.command else {
            panic!("expected enqueue");
        };
        assert_eq!(language, expected);
        assert!(!names.is_empty());
    }

    #[test]
    fn test_migrate_dry_run() {
        let cli = Cli::try_parse_from(["inkvault", "-vv", "migrate", "s3", "--dry-run"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Migrate { to: Target::S3, dry_run: DryRun { dry_run: true } }));
    }

    #[test]
    fn test_enqueue_requires_a_name() {
        assert!(Cli::try_parse_from(["inkvault", "enqueue"]).is_err());
    }
}
