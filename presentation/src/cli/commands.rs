//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use consensus_domain::DiscussionId;
use std::path::PathBuf;

/// Output format for discussion results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Every stage, every response, metrics and the resolution
    Full,
    /// Only the consensus answer, or why there is none
    Consensus,
    /// JSON output
    Json,
}

impl From<OutputFormat> for consensus_domain::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Full => Self::Full,
            OutputFormat::Consensus => Self::Consensus,
            OutputFormat::Json => Self::Json,
        }
    }
}

/// CLI arguments for consensus-engine
#[derive(Parser, Debug)]
#[command(name = "consensus-engine")]
#[command(author, version, about = "Multi-agent consensus - several agents deliberate in fixed stages until they agree")]
#[command(long_about = r#"
consensus-engine asks several AI agents the same question and walks them
through five stages: Initial Understanding, Analysis, Refinement, Consensus
Building and Final Resolution. Each stage shows every agent what the others
said. After the last stage the answers are scored for similarity and
confidence; if they agree, the agents grade each other's final answers and the
best-rated one becomes the consensus.

Configuration is loaded from (in priority order):
1. --config <path>                            Explicit config file
2. CONSENSUS_* environment variables          e.g. CONSENSUS_ENGINE__MAX_AGENTS=3
3. ./consensus.toml or ./.consensus.toml      Project-level config
4. ~/.config/consensus-engine/config.toml     Global config

Example:
  consensus-engine discuss "Which message queue fits a 10k msg/s workload?"
  consensus-engine discuss -o full "Write a function that merges two sorted lists"
  consensus-engine list
  consensus-engine show 7f1c2b9e-5b7e-4c49-9d0e-2f3a1f0c8d21
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files and environment overrides
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a discussion on a prompt
    Discuss {
        /// The question or task (use "-" to read it from stdin)
        prompt: String,

        /// Output format (overrides [output] format)
        #[arg(short, long, value_enum)]
        output: Option<OutputFormat>,

        /// Keep the discussion in memory only
        #[arg(long)]
        no_store: bool,
    },

    /// Print a stored discussion
    Show {
        /// Discussion id
        id: DiscussionId,

        /// Output format (full or json)
        #[arg(short, long, value_enum)]
        output: Option<OutputFormat>,
    },

    /// List stored discussions
    List,

    /// Show configuration file locations and the effective agent list
    Config,
}
