use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "converge")]
#[command(version)]
#[command(about = "Converge a host to the state declared in a manifest", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Engine config file
    #[arg(long, global = true, env = "CONVERGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile a manifest and converge this host to it
    Apply(ApplyArgs),

    /// Compile a manifest and print the catalog as JSON
    Compile(CompileArgs),

    /// Print the execution order and edges of a manifest's graph
    Graph(CompileArgs),

    /// Print the facts discovered on this host
    Facts(FactsArgs),

    /// Show recent runs
    History {
        /// Number of runs to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared arguments
// ============================================================================

/// Where a catalog comes from: the manifest plus parameter and fact overrides
#[derive(Args, Clone, Debug)]
pub struct CompileArgs {
    /// Manifest file (TOML)
    pub manifest: PathBuf,

    /// Parameter value, parsed as TOML (repeatable)
    #[arg(short, long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// TOML file of parameter values
    #[arg(long, value_name = "FILE")]
    pub params_file: Option<PathBuf>,

    /// Fact override, parsed as TOML (repeatable)
    #[arg(long = "fact", value_name = "NAME=VALUE")]
    pub facts: Vec<String>,

    /// TOML file of fact overrides
    #[arg(long, value_name = "FILE")]
    pub facts_file: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub source: CompileArgs,

    /// Observe and report only, change nothing
    #[arg(short = 'n', long)]
    pub noop: bool,

    /// Resources converged in parallel (defaults to the config file, then 1)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Write a JSON run record to this file
    #[arg(long, value_name = "FILE")]
    pub report_file: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct FactsArgs {
    /// Fact override, parsed as TOML (repeatable)
    #[arg(long = "fact", value_name = "NAME=VALUE")]
    pub facts: Vec<String>,

    /// TOML file of fact overrides
    #[arg(long, value_name = "FILE")]
    pub facts_file: Option<PathBuf>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}
