//! CLI struct definitions for the teamkit command-line interface.
//!
//! Top-level clap types live here; plugin subcommands (`rule`, `learn`) are
//! defined next to their plugin. Dispatch lives in `lib.rs`.

use crate::core::output::OutputFormat;
use crate::plugins::{learner::LearnCli, rules::RuleCli};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "teamkit",
    version = env!("CARGO_PKG_VERSION"),
    about = "Keep a team's stack, style fingerprint, rules and lessons in one reusable profile, and carry it between projects."
)]
pub(crate) struct Cli {
    /// Root holding every profile (default: $TEAMKIT_HOME, then ~/.teamkit).
    #[clap(long, global = true)]
    pub root: Option<PathBuf>,
    /// Debug logging on stderr (RUST_LOG overrides).
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create a team profile and make it active
    Create {
        name: String,
        /// Project to scan for stack and style facts
        #[clap(long)]
        scan: Option<PathBuf>,
    },
    /// List team profiles
    List {
        #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show one profile (defaults to the active team)
    Show {
        name: Option<String>,
        #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Delete a profile and everything under it
    Delete { name: String },
    /// Copy a profile into a project's working area and make it active
    Inject {
        name: String,
        #[clap(long, default_value = ".")]
        project: PathBuf,
    },
    /// Merge a project's journal back into its profile
    SaveBack {
        /// Team to update (defaults to the active team)
        name: Option<String>,
        #[clap(long, default_value = ".")]
        project: PathBuf,
    },
    /// Manage rules
    Rule(RuleCli),
    /// Merge another profile's rules and journal into a team
    Sync {
        /// Profile to read from
        source: String,
        /// Profile to update (defaults to the active team)
        #[clap(long)]
        team: Option<String>,
    },
    /// Pack a profile into a zip archive
    Export {
        name: String,
        /// Archive path (default: ./<name>.zip)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Unpack a profile archive under the root
    Import { archive: PathBuf },
    /// Update a profile from a project: rescan, directives, notes
    Learn(LearnCli),
    /// Scan a project and print its facts without touching any profile
    Scan {
        #[clap(default_value = ".")]
        path: PathBuf,
        /// Print only the DNA string
        #[clap(long)]
        dna: bool,
        #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}
