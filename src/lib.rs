//! Keeps track of which albums you have really heard and hands you the next one.
//!
//! Core modules:
//! - [`index`] - Saved-track index built from the user's playlists
//! - [`recommend`] - Coverage-based recommendation building
//! - [`reconcile`] - Incremental updates from newly added tracks
//! - [`selector`] - Inverse-frequency album selection and retirement
//! - [`store`] - Atomic JSON persistence of the state
//!
//! ### Supporting Modules
//!
//! - [`model`] - Identifiers and the state data structures
//! - [`catalog`] - Music catalog interface, Spotify client, in-memory catalog
//! - [`prompt`] - Yes/no confirmation prompts
//! - [`app`] - The commands, as used by the binary
//! - [`config`] - Configuration and data directory management
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//! - [`error`] - Typed errors
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use gimme::catalog::memory::MemoryCatalog;
//! use gimme::prompt::ScriptedPrompt;
//! use gimme::recommend::Cutoff;
//! use gimme::store::StateStore;
//! use gimme::app;
//!
//! let mut catalog = MemoryCatalog::new();
//! catalog
//!     .add_artist("ar1", "Broadcast")
//!     .add_album("ar1", "al1", "Tender Buttons", &["t1", "t2", "t3"])
//!     .add_album("ar1", "al2", "Haha Sound", &["t4", "t5"])
//!     .add_playlist("me", "p1")
//!     .add_saved_track("p1", "2024-01-02T10:00:00Z", "t1", "al1", &["ar1"]);
//!
//! let store = StateStore::new("/tmp/gimme-demo", "me");
//! let today = gimme::reconcile::today();
//! app::initialize(&catalog, &store, "me", Cutoff::default(), today, true)?;
//!
//! let mut prompt = ScriptedPrompt::default();
//! let outcome = app::gimme(&store, &mut prompt, &mut rand::thread_rng())?;
//! println!("{outcome}");
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Algorithm Details
//!
//! ### Coverage
//! An album counts as heard once the share of its tracks present in the
//! user's playlists is above the cutoff (0.75 by default). Anything at or
//! below it, including albums with no saved track at all, is recommended.
//!
//! ### Selection
//! Each artist with outstanding albums is weighted by the inverse of how many
//! are outstanding, so nearly finished artists come up first. The album is
//! then drawn uniformly from that artist's list. Only one album is in
//! progress at a time.
//!
//! ### Updates
//! Tracks added after the last update are classified: a new artist gets its
//! discography recommended (a one-track release is taken as heard), a new
//! album by a known artist is put to the user as a question, anything else
//! is already accounted for.

pub mod app;
pub mod catalog;
pub mod cli;
pub mod completion;
pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod prompt;
pub mod recommend;
pub mod reconcile;
pub mod selector;
pub mod store;
