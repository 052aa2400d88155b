use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gatecfg")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative configuration for AI gateway objects", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (default: ~/.config/gatecfg/config.toml)
    #[arg(long, global = true, env = "GATECFG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check a manifest against the kind registry
    Validate {
        /// Manifest file
        manifest: PathBuf,
    },

    /// Show what apply would change, against the recorded state
    Plan(PlanArgs),

    /// List object kinds, or show one kind's attributes
    Kinds {
        /// Kind to describe
        kind: Option<String>,
    },

    /// Parse an import token into the identity it addresses
    Resolve {
        /// Object kind
        kind: String,

        /// Import token, e.g. `ws-1/member-9`
        token: String,
    },

    /// Inspect or edit the recorded state
    #[command(subcommand)]
    State(StateCommand),

    /// Show the effective settings
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Manifest file
    pub manifest: PathBuf,

    /// State file (overrides the configured state_path)
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Only plan matching objects: "kind" or "kind.name"
    #[arg(short, long)]
    pub target: Option<String>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum StateCommand {
    /// List recorded objects
    List {
        /// State file (overrides the configured state_path)
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Show one recorded object
    Show {
        /// Address, e.g. `guardrail.pii`
        address: String,

        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Record an existing remote object by its import token
    ///
    /// Nothing is read yet; the next apply finishes the import.
    Import {
        /// Address, e.g. `workspace_member.alice`
        address: String,

        /// Import token, e.g. `ws-1/member-9`
        token: String,

        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Forget a recorded object without deleting it remotely
    Rm {
        /// Address, e.g. `guardrail.pii`
        address: String,

        #[arg(long)]
        state: Option<PathBuf>,
    },
}
