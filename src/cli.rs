//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `encore` binary. Every command that
//! returns data prints it as JSON on stdout.
//!
//! ## Commands
//!
//! - `play`, `like`, `skip`: record an interaction with a track
//! - `search`: run a catalog search and record it
//! - `prefs`, `summary`, `discovery`: inspect what the history says
//! - `recommend`, `context`: build recommendation lists
//! - `clear`: forget all history
//!
//! ## Examples
//!
//! ```bash
//! encore play dQw4w9WgXcQ "Never Gonna Give You Up" "Rick Astley" --duration 212000
//! encore recommend --limit 20
//! encore context workout
//! ```

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "encore")]
#[command(about = "Encore: listening history and personalized recommendations")]
#[command(version)]
pub struct Args {
    /// History store file (defaults to the platform data directory)
    #[arg(long, global = true, env = "ENCORE_STORE")]
    pub store: Option<PathBuf>,

    /// Music API root
    #[arg(
        long,
        global = true,
        env = "ENCORE_API_URL",
        default_value = crate::config::DEFAULT_API_URL
    )]
    pub api_url: String,

    /// Bearer token used for remote history sync
    #[arg(long, global = true, env = "ENCORE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Track identity shared by the interaction commands.
#[derive(ClapArgs, Debug, Clone, PartialEq, Eq)]
pub struct TrackArgs {
    /// Provider track identifier
    pub id: String,
    /// Track title
    pub title: String,
    /// Artist name
    pub artist: String,
    /// Thumbnail URL
    #[arg(long)]
    pub thumbnail: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record that a track was played
    Play {
        #[command(flatten)]
        track: TrackArgs,

        /// Milliseconds listened
        #[arg(long, default_value_t = 0)]
        duration: u64,
    },

    /// Record that a track was liked
    Like {
        #[command(flatten)]
        track: TrackArgs,
    },

    /// Record that a track was skipped
    Skip {
        #[command(flatten)]
        track: TrackArgs,

        /// Milliseconds listened before skipping
        #[arg(long, default_value_t = 0)]
        played: u64,
    },

    /// Search the catalog and record the query
    Search {
        /// Free-text query
        query: String,

        /// Maximum results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Print the derived preference snapshot
    Prefs,

    /// Print totals and top artists
    Summary,

    /// Build a personalized recommendation list
    Recommend {
        /// Maximum tracks
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Attach affinity scores and sort by them
        #[arg(long)]
        scored: bool,
    },

    /// Build a list for a listening situation
    ///
    /// Known labels: workout, study, party, relax, sleep. Anything else is
    /// treated as relax.
    Context {
        /// Listening situation
        label: String,

        /// Maximum tracks
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Print exploration and diversity measures
    Discovery,

    /// Forget all history, local and pending
    Clear,

    /// Generate shell completions
    ///
    /// Usage: encore completion bash > ~/.local/share/bash-completion/completions/encore
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
