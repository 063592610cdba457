//! Primary catalog sync: fetch the three sources, reconcile every primary
//! song against the official and community records, then upsert songs and
//! charts in one transaction.

use rusqlite::Connection;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::charts::{build_standard_chart, build_we_chart};
use crate::config::Config;
use crate::error::Result;
use crate::models::{Chart, ChunirecSong, CommunitySong, Difficulty, Song, SyncStats};
use crate::progress::{create_progress_bar, create_spinner, format_duration, log_progress};
use crate::resolver::{fallback_jacket, find_community, resolve_official, ResolvedSong};
use crate::sources::{SourceClient, Sources};

/// Rows produced for one resolved primary song.
#[derive(Debug, Clone, PartialEq)]
pub struct SongRecords {
    pub song: Song,
    pub charts: Vec<Chart>,
}

/// Reconcile the fetched sources into catalog rows. Unresolved songs are
/// logged, counted and skipped.
pub fn build_catalog(sources: &Sources, stats: &mut SyncStats) -> (Vec<Song>, Vec<Chart>) {
    stats.primary_songs = sources.primary.len();

    let pb = create_progress_bar(sources.primary.len() as u64, "Reconciling");
    let mut songs = Vec::with_capacity(sources.primary.len());
    let mut charts = Vec::new();

    for (i, primary) in sources.primary.iter().enumerate() {
        if let Some(records) = reconcile_song(primary, sources, stats) {
            songs.push(records.song);
            charts.extend(records.charts);
        }
        pb.inc(1);
        log_progress("reconcile", (i + 1) as u64, sources.primary.len() as u64, 500);
    }
    pb.finish_and_clear();

    (songs, charts)
}

/// Reconcile a single primary song. Returns `None` when no official record
/// could be found for it.
pub fn reconcile_song(
    primary: &ChunirecSong,
    sources: &Sources,
    stats: &mut SyncStats,
) -> Option<SongRecords> {
    let resolved = match resolve_official(primary, &sources.official) {
        Ok(resolved) => resolved,
        Err(miss) => {
            warn!(
                primary_id = %primary.meta.id,
                title = %primary.meta.title,
                nearest = miss.nearest.as_deref().unwrap_or("-"),
                "No official record for song, skipping"
            );
            stats.unresolved += 1;
            return None;
        }
    };
    stats.record_match(resolved.kind);
    debug!(primary_id = %primary.meta.id, id = resolved.id, kind = ?resolved.kind, "Resolved");

    let mut jacket = resolved.jacket.clone();
    if jacket.is_none() {
        jacket = fallback_jacket(primary, &sources.official);
        if jacket.is_some() {
            stats.fallback_jackets += 1;
        }
    }

    let community = find_community(primary, &sources.community.songs);
    if community.is_some() {
        stats.community_matches += 1;
    }

    let song = build_song(primary, &resolved, jacket, community);
    let charts = build_charts(primary, &resolved, community, stats);
    Some(SongRecords { song, charts })
}

fn build_song(
    primary: &ChunirecSong,
    resolved: &ResolvedSong,
    jacket: Option<String>,
    community: Option<&CommunitySong>,
) -> Song {
    let bpm = primary
        .meta
        .bpm
        .filter(|&bpm| bpm != 0)
        .or_else(|| community.and_then(|c| c.bpm));

    Song {
        id: resolved.id,
        title: resolved.title.clone(),
        catcode: resolved.catcode,
        genre: primary.meta.genre.clone(),
        artist: primary.meta.artist.clone(),
        release: primary.meta.release.clone().unwrap_or_default(),
        bpm,
        jacket,
        zetaraku_jacket: community.and_then(|c| c.image_name.clone()),
        international_only: false,
    }
}

fn build_charts(
    primary: &ChunirecSong,
    resolved: &ResolvedSong,
    community: Option<&CommunitySong>,
    stats: &mut SyncStats,
) -> Vec<Chart> {
    let mut charts: Vec<Chart> = Difficulty::STANDARD
        .into_iter()
        .filter_map(|difficulty| {
            primary
                .data
                .get(difficulty)
                .map(|source| build_standard_chart(resolved.id, difficulty, source, community))
        })
        .collect();

    if let Some(source) = &primary.data.worlds_end {
        match (resolved.we_kanji.as_deref(), resolved.we_star) {
            (Some(tag), Some(stars)) => charts.push(build_we_chart(resolved.id, tag, stars, source)),
            _ => {
                warn!(
                    id = resolved.id,
                    title = %resolved.title,
                    "WORLD'S END chart without tag or star count, skipping chart"
                );
                stats.skipped_worlds_end_charts += 1;
            }
        }
    }
    charts
}

/// Write reconciled rows in a single transaction.
pub fn write_catalog(conn: &mut Connection, songs: &[Song], charts: &[Chart], stats: &mut SyncStats) -> Result<()> {
    let tx = conn.transaction()?;
    stats.songs_written = catalog::upsert_songs(&tx, songs)?;
    stats.charts_written = catalog::upsert_charts(&tx, charts)?;
    tx.commit()?;
    Ok(())
}

/// Run the primary sync end to end. The chunirec token is checked before any
/// request is made; a failed fetch aborts the job with nothing written.
pub fn run(conn: &mut Connection, client: &SourceClient, config: &Config) -> Result<SyncStats> {
    let start = Instant::now();
    let token = config.chunirec_token()?;

    info!("Fetching chunirec, official and community catalogs");
    let spinner = create_spinner("Fetching sources");
    let fetched = client.fetch_all(token);
    spinner.finish_and_clear();
    let sources = fetched?;

    let mut stats = SyncStats::default();
    let (songs, charts) = build_catalog(&sources, &mut stats);
    write_catalog(conn, &songs, &charts, &mut stats)?;

    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    info!(
        songs = stats.songs_written,
        charts = stats.charts_written,
        unresolved = stats.unresolved,
        match_rate = %format!("{:.1}%", stats.match_rate()),
        elapsed = %format_duration(start.elapsed()),
        "Primary sync complete"
    );
    Ok(stats)
}
