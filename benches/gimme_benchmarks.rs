//! # Gimme Performance Benchmarks
//!
//! Benchmarks for the parts that scale with the size of a library.
//!
//! ## Benchmark Categories
//!
//! - **Selection**: weight computation and weighted album draws
//! - **Indexing**: building the saved index from playlist rows
//! - **Recommendation**: judging every album of every saved artist
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark group
//! cargo bench selection
//! ```

use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use gimme::catalog::memory::MemoryCatalog;
use gimme::catalog::{PlaylistEntry, RawArtist, RawTrack};
use gimme::index::index_entries;
use gimme::model::{AlbumRef, ArtistRef, Labels, RecommendationRecord, RecommendationSet, SavedIndex, TrackRef};
use gimme::recommend::{build_recommendations, Cutoff};
use gimme::selector::{artist_weights, choose_next};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;

fn watermark() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
}

/// `artists` artists, artist `i` with `1 + i % 7` outstanding albums.
fn create_recommendations(artists: usize) -> RecommendationSet {
    let mut recs = RecommendationSet::new();
    for i in 0..artists {
        let artist = ArtistRef::new(format!("artist-{i:04}"));
        for j in 0..=(i % 7) {
            recs.add(&artist, &AlbumRef::new(format!("album-{i:04}-{j}")));
        }
    }
    recs
}

fn create_playlist_rows(count: usize) -> Vec<PlaylistEntry> {
    (0..count)
        .map(|i| PlaylistEntry {
            added_at: Some("2024-01-02T10:00:00Z".to_string()),
            track: Some(RawTrack {
                id: Some(format!("track-{i}")),
                album_id: Some(format!("album-{}", i / 10)),
                album_name: Some(format!("Album {}", i / 10)),
                artists: vec![RawArtist {
                    id: Some(format!("artist-{}", i / 100)),
                    name: Some(format!("Artist {}", i / 100)),
                }],
            }),
        })
        .collect()
}

fn benchmark_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection");

    for size in [10, 100, 1000] {
        let recs = create_recommendations(size);
        group.bench_with_input(BenchmarkId::new("artist_weights", size), &recs, |b, recs| {
            b.iter(|| black_box(artist_weights(black_box(recs))));
        });

        let mut record = RecommendationRecord::new(watermark());
        record.recommendations = recs;
        let mut rng = StdRng::seed_from_u64(42);
        group.bench_with_input(BenchmarkId::new("choose_next", size), &record, |b, record| {
            b.iter_batched(
                || record.clone(),
                |mut record| black_box(choose_next(&mut record, &mut rng).ok()),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_indexing(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexing");

    for size in [1_000, 10_000] {
        let rows = create_playlist_rows(size);
        group.bench_with_input(BenchmarkId::new("index_entries", size), &rows, |b, rows| {
            b.iter(|| {
                let mut saved = SavedIndex::new();
                let mut labels = Labels::default();
                black_box(index_entries(&mut saved, &mut labels, rows));
                saved
            });
        });
    }

    group.finish();
}

fn benchmark_recommendation(c: &mut Criterion) {
    let mut group = c.benchmark_group("recommendation");

    let mut catalog = MemoryCatalog::new();
    let mut saved = SavedIndex::new();
    for a in 0..50 {
        let artist = format!("artist-{a}");
        catalog.add_artist(&artist, &format!("Artist {a}"));
        for l in 0..8 {
            let album = format!("album-{a}-{l}");
            let tracks: Vec<String> = (0..10).map(|t| format!("track-{a}-{l}-{t}")).collect();
            let refs: Vec<&str> = tracks.iter().map(String::as_str).collect();
            catalog.add_album(&artist, &album, &format!("Album {l}"), &refs);
            for track in tracks.iter().take(l + 2) {
                saved.insert(&ArtistRef::new(artist.as_str()), &AlbumRef::new(album.as_str()), &TrackRef::new(track.as_str()));
            }
        }
    }

    group.bench_function("build_recommendations_50_artists", |b| {
        b.iter(|| {
            let mut record = RecommendationRecord::new(watermark());
            black_box(build_recommendations(&catalog, &saved, Cutoff::default(), &mut record))
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_selection, benchmark_indexing, benchmark_recommendation);
criterion_main!(benches);
