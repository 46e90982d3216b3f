//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for Gimme using Clap derive macros.
//! Global options select the user, the state directory and the catalog
//! credentials; every one of them can also come from the environment or the
//! config file.
//!
//! ## Commands
//!
//! - `init`: Scan all playlists and build the listening state from scratch
//! - `update`: Pick up tracks added since the last update
//! - `gimme`: Retire the current album and get the next one
//! - `status`: Show the current album and what is left
//! - `shell`: Interactive menu
//! - `completion`: Generate shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! gimme --user my-spotify-id init
//! gimme update
//! gimme album
//! ```

use clap::{Parser, Subcommand, ValueEnum};
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
///
/// Values given here override the config file, which overrides built-in
/// defaults.
#[derive(Parser, Debug)]
#[command(name = "gimme")]
#[command(about = "Gimme an Album: tracks which albums you have really heard and hands you the next one")]
#[command(version)]
pub struct Args {
    /// Catalog user whose playlists are scanned
    #[arg(long, short, global = true, env = "GIMME_USER")]
    pub user: Option<String>,

    /// Directory holding the state files
    ///
    /// Defaults to the platform data directory (~/.local/share/gimme on Linux).
    #[arg(long, global = true, env = "GIMME_STATE_DIR", value_hint = clap::ValueHint::DirPath)]
    pub state_dir: Option<PathBuf>,

    /// Configuration file to read
    ///
    /// Defaults to ~/.config/gimme/config.json on Linux. A missing file is not an error.
    #[arg(long, global = true, env = "GIMME_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Coverage above which an album counts as heard (between 0 and 1)
    #[arg(long, global = true, env = "GIMME_CUTOFF")]
    pub cutoff: Option<f64>,

    /// Spotify access token
    #[arg(long, global = true, env = "SPOTIFY_ACCESS_TOKEN", hide = true, hide_env_values = true)]
    pub access_token: Option<String>,

    /// Spotify refresh token
    #[arg(long, global = true, env = "SPOTIFY_REFRESH_TOKEN", hide = true, hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Spotify application client id
    #[arg(long, global = true, env = "SPOTIFY_CLIENT_ID", hide = true, hide_env_values = true)]
    pub client_id: Option<String>,

    /// Spotify application client secret
    #[arg(long, global = true, env = "SPOTIFY_CLIENT_SECRET", hide = true, hide_env_values = true)]
    pub client_secret: Option<String>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the listening state from scratch (full scan)
    ///
    /// Reads every track in every playlist, then checks each saved artist's
    /// discography. Albums mostly present in your playlists count as heard;
    /// the rest become recommendations.
    Init {
        /// Rebuild even if state already exists
        ///
        /// Discards the current album and every answer given during updates.
        #[arg(long)]
        force: bool,
    },

    /// Pick up tracks added since the last update (incremental)
    ///
    /// New artists have their discography added automatically. For new
    /// albums by known artists you will be asked whether you listened to
    /// them recently.
    Update,

    /// Get the next album to listen to
    ///
    /// If an album is in progress you are asked whether you finished it;
    /// only one album is in progress at a time.
    #[command(visible_alias = "album")]
    Gimme,

    /// Show the current album and how much is left
    Status,

    /// Abandon the album in progress without marking it heard
    ///
    /// The album stays recommended if it still is. Use this when the album
    /// in progress can no longer be retired.
    Drop,

    /// Interactive menu
    Shell,

    /// Generate shell completions
    ///
    /// Usage: gimme completion bash > ~/.local/share/bash-completion/completions/gimme
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
