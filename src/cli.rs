use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nuage")]
#[command(version)]
#[command(about = "Declare, preview and apply a notes backend stack", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to nuage.toml (default: $NUAGE_CONFIG_DIR/nuage.toml, then ./nuage.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Stack to operate on (overrides the config file)
    #[arg(short, long, global = true, env = "NUAGE_STACK")]
    pub stack: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Preview the changes `up` would make
    Preview(PreviewArgs),

    /// Create or update the stack
    Up(UpArgs),

    /// Delete every resource of the stack
    Destroy {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Inspect or edit the recorded state
    #[command(subcommand)]
    State(StateCommand),

    /// Show the stack exports of the last apply
    Outputs {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List resolver templates found for a type
    Resolvers {
        /// GraphQL type name, e.g. Note
        type_name: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Preview / Up
// ============================================================================

#[derive(Parser)]
pub struct PreviewArgs {
    /// Only consider these resources (logical name or resource type)
    #[arg(short, long)]
    pub target: Vec<String>,
}

#[derive(Parser)]
pub struct UpArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Show what would change without applying
    #[arg(long)]
    pub dry_run: bool,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Only apply these resources and their dependencies (logical name or resource type)
    #[arg(short, long)]
    pub target: Vec<String>,

    /// Keep applying independent resources after a failure
    #[arg(long)]
    pub continue_on_error: bool,
}

// ============================================================================
// State
// ============================================================================

#[derive(Subcommand)]
pub enum StateCommand {
    /// List recorded resources
    List,

    /// Show one recorded resource
    Show {
        /// Logical resource name
        name: String,
    },

    /// Forget a resource without deleting it
    Rm {
        /// Logical resource name
        name: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
