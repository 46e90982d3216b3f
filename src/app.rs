//! # Commands
//!
//! The four things a listener does, each a complete load-modify-persist
//! cycle over the [`StateStore`]:
//!
//! - [`initialize`]: full scan, fresh state.
//! - [`update`]: incremental reconcile with confirmation questions.
//! - [`gimme`]: retire the current album if finished, then pick the next.
//! - [`status`]: read-only summary.
//! - [`drop_selection`]: abandon the album in progress without judging it.
//!
//! [`run_shell`] offers the same operations as a menu loop.

use crate::catalog::Catalog;
use crate::error::{StateError, StoreError};
use crate::index::build_saved_index;
use crate::model::{LibraryState, RecommendationRecord, Selection};
use crate::prompt::{Answer, Prompt, TermPrompt};
use crate::recommend::{build_recommendations, Cutoff};
use crate::reconcile::{self, apply_answers, Reconciler};
use crate::selector::{choose_next, retire_current, Retirement};
use crate::store::StateStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use console::style;
use log::{error, info};
use rand::Rng;
use std::fmt;

/// Display names of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumLabel {
    pub album: String,
    pub artist: String,
}

impl AlbumLabel {
    fn of(record: &RecommendationRecord, selection: &Selection) -> Self {
        Self {
            album: record.labels.album(&selection.album).to_string(),
            artist: record.labels.artist(&selection.artist).to_string(),
        }
    }
}

impl fmt::Display for AlbumLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", style(&self.album).green().bold(), style(&self.artist).green())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitSummary {
    pub artists: usize,
    pub tracks: usize,
    pub recommended: usize,
    /// Playlists, artists and albums that could not be fetched.
    pub failures: usize,
    pub watermark: NaiveDate,
}

impl fmt::Display for InitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Indexed {} saved tracks by {} artists.",
            style(self.tracks).bold(),
            style(self.artists).bold()
        )?;
        write!(f, "{} albums to listen to.", style(self.recommended).bold())?;
        if self.failures > 0 {
            write!(f, "\n{}", style(format!("{} lookups failed; run init --force later to retry.", self.failures)).yellow())?;
        }
        Ok(())
    }
}

/// Build the state from scratch: scan, judge every discography, persist.
///
/// # Errors
///
/// Fails if state exists and `force` is not set, if the playlists cannot be
/// listed, or if the state cannot be written.
pub fn initialize<C: Catalog + ?Sized>(
    catalog: &C,
    store: &StateStore,
    user: &str,
    cutoff: Cutoff,
    today: NaiveDate,
    force: bool,
) -> Result<InitSummary> {
    if !force && store.exists() {
        return Err(StoreError::AlreadyInitialized(store.record_path()).into());
    }

    info!("Initializing state for {user} with cutoff {}", cutoff.value());
    let scan = build_saved_index(catalog, user).context("Failed to scan playlists")?;

    let mut state = LibraryState::new(today);
    state.record.labels = scan.labels;
    let report = build_recommendations(catalog, &scan.saved, cutoff, &mut state.record);
    state.saved = scan.saved;

    store.create(&state, force).context("Failed to save initial state")?;

    Ok(InitSummary {
        artists: state.saved.artist_count(),
        tracks: state.saved.track_count(),
        recommended: state.record.recommendations.album_count(),
        failures: scan.failed_playlists + report.failed_artists + report.failed_albums,
        watermark: today,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    pub new_tracks: usize,
    pub seeded_artists: usize,
    pub singles: usize,
    pub confirmed: usize,
    pub declined: usize,
    /// "No" answers for albums that were on the list already.
    pub already_recommended: usize,
    /// Tracks left for the next update.
    pub deferred: usize,
    /// Tracks the catalog could not identify; they are not retried.
    pub unresolvable: usize,
    pub watermark: NaiveDate,
}

impl fmt::Display for UpdateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} new tracks since the last update.", style(self.new_tracks).bold())?;
        if self.seeded_artists + self.singles > 0 {
            writeln!(f, "{} new artists added.", self.seeded_artists + self.singles)?;
        }
        if self.confirmed + self.declined > 0 {
            writeln!(f, "{} albums marked heard, {} added to the list.", self.confirmed, self.declined)?;
        }
        if self.already_recommended > 0 {
            writeln!(f, "{} albums were already on the list.", self.already_recommended)?;
        }
        if self.unresolvable > 0 {
            writeln!(f, "{} tracks are unknown to the catalog and were skipped.", self.unresolvable)?;
        }
        if self.deferred > 0 {
            writeln!(
                f,
                "{}",
                style(format!("{} tracks could not be looked up and will be retried.", self.deferred)).yellow()
            )?;
        }
        write!(f, "Up to date as of {}.", self.watermark)
    }
}

/// Reconcile the state with tracks added since the last update.
///
/// Albums by known artists that were not saved before are put to `prompt`
/// one at a time, after the scan has finished.
///
/// # Errors
///
/// Fails if there is no state, if the playlists cannot be listed, if the
/// prompt fails, or if the state cannot be written. Nothing is persisted
/// unless every question was answered.
pub fn update<C: Catalog + ?Sized, P: Prompt + ?Sized>(
    catalog: &C,
    store: &StateStore,
    user: &str,
    prompt: &mut P,
    today: NaiveDate,
) -> Result<UpdateSummary> {
    let mut state = store.load().context("Failed to load state")?;
    let plan = Reconciler::new(catalog, today)
        .plan(user, &mut state)
        .context("Failed to scan playlists")?;

    let mut answers: Vec<(_, Answer)> = Vec::with_capacity(plan.confirmations.len());
    for confirmation in &plan.confirmations {
        let answer = prompt.ask_listened_recently(
            state.record.labels.album(&confirmation.album),
            state.record.labels.artist(&confirmation.artist),
        )?;
        answers.push((confirmation, answer));
    }

    let report = apply_answers(&mut state, &plan, answers);
    store.save(&state).context("Failed to save updated state")?;

    Ok(UpdateSummary {
        new_tracks: plan.new_tracks,
        seeded_artists: plan.seeded_artists,
        singles: plan.singles,
        confirmed: report.confirmed,
        declined: report.declined,
        already_recommended: report.inconsistent,
        deferred: plan.failed,
        unresolvable: plan.unresolvable,
        watermark: state.record.watermark,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GimmeOutcome {
    /// A new album is now in progress.
    Picked(AlbumLabel),
    /// Every recommended album has been heard.
    NothingLeft,
    /// The current album is not finished; it stays selected.
    StillListening(AlbumLabel),
}

impl fmt::Display for GimmeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Picked(label) => write!(f, "Your next album: {label}"),
            Self::NothingLeft => write!(f, "Nothing to recommend. Run an update after saving some new music."),
            Self::StillListening(label) => write!(
                f,
                "Still on {label}. Finish it before asking for another album."
            ),
        }
    }
}

/// Hand out the next album.
///
/// If an album is in progress the user is asked whether it is finished.
/// A finished album is retired and persisted before the next is drawn.
///
/// # Errors
///
/// Fails if there is no state, if the prompt fails, if the selected album is
/// missing from the recommendations, or if the state cannot be written.
pub fn gimme<P: Prompt + ?Sized, R: Rng + ?Sized>(store: &StateStore, prompt: &mut P, rng: &mut R) -> Result<GimmeOutcome> {
    let mut record = store.load_record().context("Failed to load state")?;

    if let Some(current) = record.selection.clone() {
        let label = AlbumLabel::of(&record, &current);
        let answer = prompt.ask_finished_current(&label.album)?;
        let retirement = match retire_current(&mut record, answer == Answer::Yes) {
            Err(e @ StateError::AlbumNotRecommended { .. }) => {
                return Err(anyhow::Error::new(e).context(format!("Cannot retire {label}; run `gimme drop` to abandon it")));
            }
            other => other?,
        };
        match retirement {
            Retirement::Kept(_) => return Ok(GimmeOutcome::StillListening(label)),
            Retirement::Retired(_) => store.save_record(&record).context("Failed to save state")?,
        }
    }

    match choose_next(&mut record, rng)? {
        Some(selection) => {
            store.save_record(&record).context("Failed to save state")?;
            Ok(GimmeOutcome::Picked(AlbumLabel::of(&record, &selection)))
        }
        None => Ok(GimmeOutcome::NothingLeft),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub current: Option<AlbumLabel>,
    /// The album in progress is no longer in the recommendations.
    pub stale: bool,
    pub watermark: NaiveDate,
    pub artists_outstanding: usize,
    pub albums_outstanding: usize,
    pub saved_artists: usize,
    pub saved_tracks: usize,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.current {
            Some(label) => {
                writeln!(f, "Listening to: {label}")?;
                if self.stale {
                    writeln!(
                        f,
                        "{}",
                        style("It is no longer on the list and cannot be retired; run `gimme drop` to abandon it.").yellow()
                    )?;
                }
            }
            None => writeln!(f, "No album in progress.")?,
        }
        writeln!(
            f,
            "{} albums by {} artists left to hear.",
            style(self.albums_outstanding).bold(),
            style(self.artists_outstanding).bold()
        )?;
        writeln!(f, "{} saved tracks by {} artists.", self.saved_tracks, self.saved_artists)?;
        write!(f, "Last update: {}", self.watermark)
    }
}

/// # Errors
///
/// Fails if there is no state or it cannot be read.
pub fn status(store: &StateStore) -> Result<StatusReport> {
    let state = store.load().context("Failed to load state")?;
    let record = &state.record;
    Ok(StatusReport {
        current: record.selection.as_ref().map(|s| AlbumLabel::of(record, s)),
        stale: record
            .selection
            .as_ref()
            .is_some_and(|s| !record.recommendations.contains(&s.artist, &s.album)),
        watermark: record.watermark,
        artists_outstanding: record.recommendations.artist_count(),
        albums_outstanding: record.recommendations.album_count(),
        saved_artists: state.saved.artist_count(),
        saved_tracks: state.saved.track_count(),
    })
}

/// Clear the album in progress without retiring it.
///
/// An album still recommended stays on the list and may be drawn again.
/// Returns the abandoned album, or `None` if nothing was in progress.
///
/// # Errors
///
/// Fails if there is no state or it cannot be written.
pub fn drop_selection(store: &StateStore) -> Result<Option<AlbumLabel>> {
    let mut record = store.load_record().context("Failed to load state")?;
    let Some(current) = record.selection.take() else {
        return Ok(None);
    };
    let label = AlbumLabel::of(&record, &current);
    info!("Abandoning {label}");
    store.save_record(&record).context("Failed to save state")?;
    Ok(Some(label))
}

const MENU: [&str; 6] = ["Initialize", "Update", "Gimme an album", "Status", "Drop current album", "Quit"];

/// Interactive menu over the four commands. Empty input or "Quit" leaves.
///
/// `connect` is only called for commands that need the catalog, so the menu
/// stays usable offline. Errors from a command are reported and the loop
/// continues.
///
/// # Errors
///
/// Fails only if the terminal itself cannot be read or written.
pub fn run_shell<F, R>(connect: F, store: &StateStore, user: &str, cutoff: Cutoff, rng: &mut R) -> Result<()>
where
    F: Fn() -> Result<Box<dyn Catalog>>,
    R: Rng + ?Sized,
{
    let mut prompt = TermPrompt::new();
    println!("{} {}", style("Gimme an Album").bold().magenta(), style(format!("({user})")).dim());

    loop {
        let Some(choice) = prompt.menu("What now?", &MENU)? else {
            return Ok(());
        };
        let today = reconcile::today();
        let outcome = match MENU[choice] {
            "Initialize" => connect()
                .and_then(|catalog| initialize(&*catalog, store, user, cutoff, today, false))
                .map(|summary| summary.to_string()),
            "Update" => connect()
                .and_then(|catalog| update(&*catalog, store, user, &mut prompt, today))
                .map(|summary| summary.to_string()),
            "Gimme an album" => gimme(store, &mut prompt, &mut *rng).map(|outcome| outcome.to_string()),
            "Status" => status(store).map(|report| report.to_string()),
            "Drop current album" => drop_selection(store).map(|dropped| match dropped {
                Some(label) => format!("Dropped {label}."),
                None => "No album in progress.".to_string(),
            }),
            _ => return Ok(()),
        };

        match outcome {
            Ok(text) => println!("{text}"),
            Err(e) => {
                error!("{} failed: {e:#}", MENU[choice]);
                println!("{} {e:#}", style("Error:").red().bold());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::prompt::ScriptedPrompt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog
            .add_artist("ar1", "Broadcast")
            .add_album("ar1", "heard", "Haha Sound", &["h1"])
            .add_album("ar1", "todo", "Work and Non Work", &["w1", "w2"])
            .add_playlist("me", "p1")
            .add_saved_track("p1", "2024-01-10T10:00:00Z", "h1", "heard", &["ar1"]);
        catalog
    }

    #[test]
    fn test_initialize_refuses_existing_state() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "me");
        let catalog = catalog();

        let summary = initialize(&catalog, &store, "me", Cutoff::default(), day(1), false).unwrap();
        assert_eq!(summary.recommended, 1);
        assert_eq!(summary.failures, 0);

        let again = initialize(&catalog, &store, "me", Cutoff::default(), day(2), false);
        assert!(again.is_err());
        assert!(initialize(&catalog, &store, "me", Cutoff::default(), day(2), true).is_ok());
    }

    #[test]
    fn test_gimme_keeps_unfinished_album() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "me");
        initialize(&catalog(), &store, "me", Cutoff::default(), day(1), false).unwrap();
        let mut rng = StdRng::seed_from_u64(9);

        let mut prompt = ScriptedPrompt::new([Answer::No, Answer::Yes]);
        let first = gimme(&store, &mut prompt, &mut rng).unwrap();
        let label = AlbumLabel {
            album: "Work and Non Work".into(),
            artist: "Broadcast".into(),
        };
        assert_eq!(first, GimmeOutcome::Picked(label.clone()));

        assert_eq!(gimme(&store, &mut prompt, &mut rng).unwrap(), GimmeOutcome::StillListening(label));
        assert_eq!(gimme(&store, &mut prompt, &mut rng).unwrap(), GimmeOutcome::NothingLeft);
        assert_eq!(prompt.asked, ["finished:Work and Non Work", "finished:Work and Non Work"]);
        assert_eq!(status(&store).unwrap().albums_outstanding, 0);
    }

    #[test]
    fn test_stale_selection_can_be_dropped() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "me");
        initialize(&catalog(), &store, "me", Cutoff::default(), day(1), false).unwrap();

        let mut record = store.load_record().unwrap();
        record.selection = Some(Selection {
            album: crate::model::AlbumRef::new("heard"),
            artist: crate::model::ArtistRef::new("ar1"),
        });
        store.save_record(&record).unwrap();

        let report = status(&store).unwrap();
        assert!(report.stale);
        assert!(report.to_string().contains("gimme drop"));

        let mut rng = StdRng::seed_from_u64(3);
        let mut prompt = ScriptedPrompt::new([Answer::Yes]);
        let err = gimme(&store, &mut prompt, &mut rng).unwrap_err();
        assert!(format!("{err:#}").contains("gimme drop"));

        let dropped = drop_selection(&store).unwrap().unwrap();
        assert_eq!(dropped.album, "Haha Sound");
        assert_eq!(drop_selection(&store).unwrap(), None);
        assert!(!status(&store).unwrap().stale);

        let outcome = gimme(&store, &mut prompt, &mut rng).unwrap();
        assert!(matches!(outcome, GimmeOutcome::Picked(label) if label.album == "Work and Non Work"));
    }

    #[test]
    fn test_update_reports_already_listed_albums_separately() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "me");
        let mut catalog = catalog();
        initialize(&catalog, &store, "me", Cutoff::default(), day(1), false).unwrap();
        catalog.add_saved_track("p1", "2024-02-03T10:00:00Z", "w1", "todo", &["ar1"]);

        let mut prompt = ScriptedPrompt::new([Answer::No]);
        let summary = update(&catalog, &store, "me", &mut prompt, day(4)).unwrap();
        assert_eq!(summary.declined, 0);
        assert_eq!(summary.already_recommended, 1);
        assert!(!summary.to_string().contains("added to the list"));
        assert!(summary.to_string().contains("already on the list"));
    }

    #[test]
    fn test_commands_need_initialized_state() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path(), "me");
        let mut rng = StdRng::seed_from_u64(1);
        let mut prompt = ScriptedPrompt::default();

        assert!(status(&store).is_err());
        assert!(gimme(&store, &mut prompt, &mut rng).is_err());
        assert!(update(&catalog(), &store, "me", &mut prompt, day(3)).is_err());
    }
}
