use apmkit::PackageState;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "apm-state")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declare the state of your Atom packages", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bring packages into the requested state
    Apply(ApplyArgs),

    /// Show whether packages are installed and up to date
    Status(StatusArgs),

    /// Run as an automation module: read a JSON args file, print a JSON result
    Module {
        /// Path to the JSON arguments file written by the automation runtime
        args_file: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Package names (repeatable or comma-separated)
    #[arg(
        short,
        long = "name",
        visible_aliases = ["pkg", "package"],
        value_delimiter = ','
    )]
    pub names: Vec<String>,

    /// Desired state: present|installed, latest|upgraded, absent|removed|uninstalled
    #[arg(short, long, default_value = "installed")]
    pub state: PackageState,

    /// Upgrade every installed package first
    #[arg(short = 'u', long, visible_alias = "upgrade")]
    pub upgrade_all: bool,

    /// Colon-separated directories to search for apm before $PATH
    #[arg(short, long, env = "APM_STATE_PATH")]
    pub path: Option<String>,

    /// Report what would change without changing anything
    #[arg(short = 'c', long, visible_alias = "dry-run")]
    pub check: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Package names to inspect
    #[arg(required = true, value_delimiter = ',')]
    pub names: Vec<String>,

    /// Colon-separated directories to search for apm before $PATH
    #[arg(short, long, env = "APM_STATE_PATH")]
    pub path: Option<String>,

    /// Also report whether `apm upgrade` has anything to do
    #[arg(long)]
    pub pending: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}
