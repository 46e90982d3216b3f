//! # Gimme - Album Recommendations From Your Own Playlists
//!
//! Gimme reads the playlists of a Spotify user, works out which albums of
//! each artist have effectively been heard, and hands out one unheard album
//! at a time.
//!
//! ## Usage
//!
//! ```bash
//! # Build the state once
//! gimme --user my-spotify-id init
//!
//! # After saving new music
//! gimme update
//!
//! # Get an album
//! gimme album
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use gimme::catalog::spotify::SpotifyClient;
use gimme::catalog::Catalog;
use gimme::cli::{Args, Command};
use gimme::config::{self, RuntimeConfig};
use gimme::prompt::TermPrompt;
use gimme::store::StateStore;
use gimme::{app, completion, reconcile};
use log::{debug, info};

/// Merge the config file with command-line and environment overrides.
fn resolve_config(args: &Args) -> Result<RuntimeConfig> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => config::get_config_path().ok(),
    };
    let mut config = match path {
        Some(path) => RuntimeConfig::load(&path)?,
        None => RuntimeConfig::default(),
    };

    if let Some(user) = &args.user {
        config.user = Some(user.clone());
    }
    if let Some(dir) = &args.state_dir {
        config.state_dir = Some(dir.clone());
    }
    if let Some(cutoff) = args.cutoff {
        config.cutoff = cutoff;
    }
    let catalog = &mut config.catalog;
    for (value, slot) in [
        (&args.access_token, &mut catalog.access_token),
        (&args.refresh_token, &mut catalog.refresh_token),
        (&args.client_id, &mut catalog.client_id),
        (&args.client_secret, &mut catalog.client_secret),
    ] {
        if value.is_some() {
            slot.clone_from(value);
        }
    }

    Ok(config)
}

fn connect(config: &RuntimeConfig) -> Result<SpotifyClient> {
    SpotifyClient::new(&config.catalog).context("Failed to set up the Spotify client")
}

/// Main entry point for the Gimme application.
///
/// Initializes logging, parses command-line arguments, resolves the
/// configuration, and routes commands to [`app`].
fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    if let Command::Completion { shell } = &args.command {
        let mut cmd = Args::command();
        completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        return Ok(());
    }

    let config = resolve_config(&args)?;
    debug!("Resolved configuration: user={:?} state_dir={:?}", config.user, config.state_dir);
    let user = config.user()?;
    let store = StateStore::new(config.state_dir()?, user);
    let today = reconcile::today();

    match args.command {
        Command::Init { force } => {
            let cutoff = config.cutoff()?;
            info!("Initializing state for {user}");
            let catalog = connect(&config)?;
            let summary = app::initialize(&catalog, &store, user, cutoff, today, force)?;
            println!("{summary}");
        }
        Command::Update => {
            let catalog = connect(&config)?;
            let summary = app::update(&catalog, &store, user, &mut TermPrompt::new(), today)?;
            println!("{summary}");
        }
        Command::Gimme => {
            let outcome = app::gimme(&store, &mut TermPrompt::new(), &mut rand::thread_rng())?;
            println!("{outcome}");
        }
        Command::Status => {
            println!("{}", app::status(&store)?);
        }
        Command::Drop => match app::drop_selection(&store)? {
            Some(label) => println!("Dropped {label}."),
            None => println!("No album in progress."),
        },
        Command::Shell => {
            let cutoff = config.cutoff()?;
            app::run_shell(
                || Ok(Box::new(connect(&config)?) as Box<dyn Catalog>),
                &store,
                user,
                cutoff,
                &mut rand::thread_rng(),
            )?;
        }
        Command::Completion { .. } => {}
    }

    Ok(())
}
