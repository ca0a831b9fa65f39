use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::budget::ResourceBudget;
use crate::domain::AutonomyLevel;

#[derive(Parser)]
#[command(name = "autonomy")]
#[command(author, version, about = "Autonomous orchestration engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format. `stream` is best effort: a consumer that falls more than
    /// `notification.channel_capacity` events behind loses the oldest ones
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Path to the config file (default: ./autonomy.toml)
    #[arg(long, global = true, env = "AUTONOMY_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Output format for CLI results.
/// - Text: Human-readable text output (default)
/// - Json: Single JSON object at completion
/// - Stream: NDJSON streaming (one JSON object per event, then the outcome).
///   Events are dropped, with a warning on stderr, if the writer lags behind
///   the bus capacity.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Stream,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an orchestration session until it completes or fails
    Run(RunArgs),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// What the session should accomplish
    pub request: String,

    /// Autonomy level: lunatic, insane, crazy, wild, bold or timid
    #[arg(short, long, value_parser = parse_autonomy)]
    pub autonomy: Option<AutonomyLevel>,

    /// Budget string, e.g. "tokens:50000,cost:2.5,time:600"
    #[arg(short, long)]
    pub budget: Option<String>,

    #[arg(long)]
    pub max_tokens: Option<u64>,

    /// Maximum cost in USD
    #[arg(long)]
    pub max_cost: Option<f64>,

    #[arg(long)]
    pub max_duration_secs: Option<u64>,

    #[arg(long)]
    pub max_files: Option<u64>,

    #[arg(long)]
    pub max_actions: Option<u64>,

    /// Never ask a human; apply the level's unattended default
    #[arg(short, long)]
    pub unattended: bool,

    /// Shell command executed once per unit of work
    #[arg(short, long, default_value = "true", env = "AUTONOMY_EXEC")]
    pub exec: String,

    /// Working directory for the command (default: current directory)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Per-unit command timeout in seconds
    #[arg(long)]
    pub unit_timeout_secs: Option<u64>,

    /// Snapshot and roll back the working tree with git
    #[arg(long)]
    pub git_checkpoints: bool,

    /// Use this session id instead of a generated one
    #[arg(long)]
    pub session_id: Option<String>,
}

impl RunArgs {
    /// Limits given as individual flags, the highest-precedence budget layer.
    pub fn flag_budget(&self) -> ResourceBudget {
        ResourceBudget {
            max_tokens: self.max_tokens,
            max_cost_usd: self.max_cost,
            max_duration_minutes: self.max_duration_secs.map(|s| s as f64 / 60.0),
            max_files_changed: self.max_files,
            max_actions: self.max_actions,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Check the configuration for errors
    Validate,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_autonomy(value: &str) -> Result<AutonomyLevel, String> {
    value.parse::<AutonomyLevel>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags_parse() {
        let cli = Cli::try_parse_from([
            "autonomy",
            "run",
            "fix the build",
            "--autonomy",
            "bold",
            "--max-tokens",
            "500",
            "--max-duration-secs",
            "90",
            "--unattended",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.request, "fix the build");
        assert_eq!(args.autonomy, Some(AutonomyLevel::Bold));
        assert!(args.unattended);

        let flags = args.flag_budget();
        assert_eq!(flags.max_tokens, Some(500));
        assert_eq!(flags.max_duration_minutes, Some(1.5));
        assert_eq!(flags.max_cost_usd, None);
    }

    #[test]
    fn test_autonomy_is_case_sensitive() {
        let result = Cli::try_parse_from(["autonomy", "run", "x", "--autonomy", "Bold"]);
        assert!(result.is_err());
    }
}
