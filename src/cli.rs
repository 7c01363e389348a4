use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(name = "spades-icp")]
#[command(about = "Builds an Ideal Customer Profile for a company website")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Create default configuration file at ./config/spades.toml
    #[arg(long, global = true)]
    pub init: bool,

    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH", default_value = CONFIG_PATH)]
    pub config: PathBuf,

    /// Verbose logging (use -v for INFO, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a company website and print its ICP
    Analyze {
        /// Company URL or bare domain
        url: String,

        /// Skip the result cache and force-refresh the persona dataset
        #[arg(long)]
        hard_reset: bool,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Manage the analysis result cache
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },

    /// Manage the persona reference dataset
    Dataset {
        #[command(subcommand)]
        action: DatasetCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// List all cached domains
    List,

    /// Show the cached result for a specific domain
    Show {
        /// Domain to show the cached result for
        domain: String,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Clear cache for a specific domain or all domains
    Clear {
        /// Domain to clear cache for (omit to use --all)
        domain: Option<String>,

        /// Clear cache for all domains
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum DatasetCommands {
    /// Re-download the dataset bypassing every cache and print the row count
    Refresh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_defaults() {
        let cli = Cli::try_parse_from(["spades-icp", "analyze", "acme.com"]).unwrap();
        match cli.command {
            Some(Commands::Analyze { url, hard_reset, format }) => {
                assert_eq!(url, "acme.com");
                assert!(!hard_reset);
                assert_eq!(format, OutputFormat::Text);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.config, PathBuf::from(CONFIG_PATH));
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_analyze_flags() {
        let cli = Cli::try_parse_from([
            "spades-icp", "-vv", "analyze", "https://acme.com", "--hard-reset", "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Some(Commands::Analyze { hard_reset: true, format: OutputFormat::Json, .. })
        ));
    }

    #[test]
    fn test_cache_clear_all() {
        let cli = Cli::try_parse_from(["spades-icp", "cache", "clear", "--all"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Cache { action: CacheCommands::Clear { domain: None, all: true } })
        ));
    }

    #[test]
    fn test_init_without_subcommand() {
        let cli = Cli::try_parse_from(["spades-icp", "--init", "--config", "alt.toml"]).unwrap();
        assert!(cli.init);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["spades-icp", "analyze", "a.com", "--format", "csv"]).is_err());
    }
}
