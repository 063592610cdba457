//! SQLite catalog: schema, conflict-resolving upserts and the read helpers
//! the jobs need.
//!
//! ## Conflict policy
//!
//! | table  | always overwritten                         | `COALESCE(new, old)`                          |
//! |--------|--------------------------------------------|-----------------------------------------------|
//! | songs  | title, catcode, genre, artist, release     | bpm, jacket, zetaraku_jacket                  |
//! | charts | level, const                               | maxcombo, tap, hold, slide, air, flick, charter |
//! | aliases| song_id                                    |                                               |
//! | sdvxin | nothing (insert or ignore)                 |                                               |
//!
//! Rows are never deleted by a sync.

use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::models::{Alias, Chart, ChartView, Difficulty, Song, WORLDS_END_ID_THRESHOLD};

/// How long a connection waits on a locked database before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(20);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS songs (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    chunithm_catcode INTEGER,
    genre TEXT NOT NULL,
    artist TEXT NOT NULL,
    release TEXT NOT NULL,
    bpm INTEGER,
    jacket TEXT,
    zetaraku_jacket TEXT,
    international_only INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS charts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    song_id INTEGER NOT NULL REFERENCES songs(id) ON UPDATE CASCADE ON DELETE CASCADE,
    difficulty TEXT NOT NULL,
    level TEXT NOT NULL,
    const REAL,
    maxcombo INTEGER,
    tap INTEGER,
    hold INTEGER,
    slide INTEGER,
    air INTEGER,
    flick INTEGER,
    charter TEXT,
    UNIQUE (song_id, difficulty)
);

CREATE TABLE IF NOT EXISTS aliases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alias TEXT NOT NULL,
    guild_id INTEGER NOT NULL,
    song_id INTEGER NOT NULL REFERENCES songs(id) ON UPDATE CASCADE ON DELETE CASCADE,
    owner_id INTEGER,
    UNIQUE (alias, guild_id)
);

CREATE TABLE IF NOT EXISTS sdvxin (
    id TEXT NOT NULL,
    song_id INTEGER NOT NULL REFERENCES songs(id) ON UPDATE CASCADE ON DELETE CASCADE,
    difficulty TEXT NOT NULL,
    end_index TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (id, difficulty, end_index)
);

CREATE INDEX IF NOT EXISTS idx_songs_title ON songs(title);
";

// ============================================================================
// Connection
// ============================================================================

/// Open (creating if needed) the catalog database and ensure the schema.
pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;
    prepare(&conn)?;
    Ok(conn)
}

/// Apply connection pragmas and the schema. Safe to run on every start.
pub fn prepare(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

// ============================================================================
// Upserts
// ============================================================================

pub fn upsert_songs(conn: &Connection, songs: &[Song]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO songs (id, title, chunithm_catcode, genre, artist, release, bpm, jacket, zetaraku_jacket, international_only)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT (id) DO UPDATE SET
             title = excluded.title,
             chunithm_catcode = excluded.chunithm_catcode,
             genre = excluded.genre,
             artist = excluded.artist,
             release = excluded.release,
             bpm = COALESCE(excluded.bpm, songs.bpm),
             jacket = COALESCE(excluded.jacket, songs.jacket),
             zetaraku_jacket = COALESCE(excluded.zetaraku_jacket, songs.zetaraku_jacket)",
    )?;
    for song in songs {
        stmt.execute(params![
            song.id,
            song.title,
            song.catcode,
            song.genre,
            song.artist,
            song.release,
            song.bpm,
            song.jacket,
            song.zetaraku_jacket,
            song.international_only,
        ])?;
    }
    Ok(songs.len())
}

pub fn upsert_charts(conn: &Connection, charts: &[Chart]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO charts (song_id, difficulty, level, const, maxcombo, tap, hold, slide, air, flick, charter)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT (song_id, difficulty) DO UPDATE SET
             level = excluded.level,
             const = excluded.const,
             maxcombo = COALESCE(excluded.maxcombo, charts.maxcombo),
             tap = COALESCE(excluded.tap, charts.tap),
             hold = COALESCE(excluded.hold, charts.hold),
             slide = COALESCE(excluded.slide, charts.slide),
             air = COALESCE(excluded.air, charts.air),
             flick = COALESCE(excluded.flick, charts.flick),
             charter = COALESCE(excluded.charter, charts.charter)",
    )?;
    for chart in charts {
        stmt.execute(params![
            chart.song_id,
            chart.difficulty.tag(),
            chart.level,
            chart.constant,
            chart.maxcombo,
            chart.tap,
            chart.hold,
            chart.slide,
            chart.air,
            chart.flick,
            chart.charter,
        ])?;
    }
    Ok(charts.len())
}

/// Upsert aliases on (alias, guild_id); only the target song changes on conflict.
pub fn upsert_aliases(conn: &Connection, aliases: &[Alias]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO aliases (alias, guild_id, song_id, owner_id)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (alias, guild_id) DO UPDATE SET song_id = excluded.song_id",
    )?;
    for alias in aliases {
        stmt.execute(params![alias.alias, alias.guild_id, alias.song_id, alias.owner_id])?;
    }
    Ok(aliases.len())
}

/// Insert chart views, keeping any mapping already committed for the same key.
/// Returns the number of rows actually inserted.
pub fn insert_chart_views(conn: &Connection, views: &[ChartView]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO sdvxin (id, song_id, difficulty, end_index) VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut inserted = 0;
    for view in views {
        inserted += stmt.execute(params![view.id, view.song_id, view.difficulty.tag(), view.end_index])?;
    }
    Ok(inserted)
}

/// Overwrite a chart with values read from the game data dump. Fields the dump
/// did not provide keep their stored value.
pub fn update_chart_from_dump(conn: &Connection, chart: &Chart) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE charts SET
             level = ?3,
             const = ?4,
             maxcombo = COALESCE(?5, maxcombo),
             tap = COALESCE(?6, tap),
             hold = COALESCE(?7, hold),
             slide = COALESCE(?8, slide),
             air = COALESCE(?9, air),
             flick = COALESCE(?10, flick),
             charter = COALESCE(?11, charter)
         WHERE song_id = ?1 AND difficulty = ?2",
        params![
            chart.song_id,
            chart.difficulty.tag(),
            chart.level,
            chart.constant,
            chart.maxcombo,
            chart.tap,
            chart.hold,
            chart.slide,
            chart.air,
            chart.flick,
            chart.charter,
        ],
    )?;
    Ok(changed)
}

/// Set a song's BPM only if none is stored yet.
pub fn fill_song_bpm(conn: &Connection, song_id: i64, bpm: i64) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE songs SET bpm = ?2 WHERE id = ?1 AND bpm IS NULL",
        params![song_id, bpm],
    )?;
    Ok(changed)
}

// ============================================================================
// Reads
// ============================================================================

fn song_from_row(row: &Row<'_>) -> rusqlite::Result<Song> {
    Ok(Song {
        id: row.get(0)?,
        title: row.get(1)?,
        catcode: row.get(2)?,
        genre: row.get(3)?,
        artist: row.get(4)?,
        release: row.get(5)?,
        bpm: row.get(6)?,
        jacket: row.get(7)?,
        zetaraku_jacket: row.get(8)?,
        international_only: row.get(9)?,
    })
}

fn chart_from_row(row: &Row<'_>) -> rusqlite::Result<Chart> {
    let tag: String = row.get(1)?;
    let difficulty = Difficulty::from_tag(&tag).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown difficulty tag {tag}").into(),
        )
    })?;
    Ok(Chart {
        song_id: row.get(0)?,
        difficulty,
        level: row.get(2)?,
        constant: row.get(3)?,
        maxcombo: row.get(4)?,
        tap: row.get(5)?,
        hold: row.get(6)?,
        slide: row.get(7)?,
        air: row.get(8)?,
        flick: row.get(9)?,
        charter: row.get(10)?,
    })
}

const SONG_COLUMNS: &str =
    "id, title, chunithm_catcode, genre, artist, release, bpm, jacket, zetaraku_jacket, international_only";

pub fn get_song(conn: &Connection, id: i64) -> Result<Option<Song>> {
    let song = conn
        .query_row(
            &format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1"),
            [id],
            song_from_row,
        )
        .optional()?;
    Ok(song)
}

/// Charts of a song ordered by difficulty.
pub fn get_charts(conn: &Connection, song_id: i64) -> Result<Vec<Chart>> {
    let mut stmt = conn.prepare_cached(
        "SELECT song_id, difficulty, level, const, maxcombo, tap, hold, slide, air, flick, charter
         FROM charts WHERE song_id = ?1",
    )?;
    let mut charts = stmt
        .query_map([song_id], chart_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    charts.sort_by_key(|c| c.difficulty);
    Ok(charts)
}

/// Which side of the WORLD'S END id threshold a title lookup searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SongScope {
    Standard,
    WorldsEnd,
}

/// Song whose stored title equals `title` exactly within `scope`. For
/// WORLD'S END songs, `we_level` narrows to the song whose WE chart has that
/// level. Ambiguous matches resolve to none.
pub fn find_song_by_title(
    conn: &Connection,
    title: &str,
    scope: SongScope,
    we_level: Option<&str>,
) -> Result<Option<Song>> {
    let mut stmt = match (scope, we_level) {
        (SongScope::Standard, _) => conn.prepare_cached(&format!(
            "SELECT {SONG_COLUMNS} FROM songs WHERE title = ?1 AND id < ?2"
        ))?,
        (SongScope::WorldsEnd, None) => conn.prepare_cached(&format!(
            "SELECT {SONG_COLUMNS} FROM songs WHERE title = ?1 AND id >= ?2"
        ))?,
        (SongScope::WorldsEnd, Some(_)) => conn.prepare_cached(
            "SELECT DISTINCT s.id, s.title, s.chunithm_catcode, s.genre, s.artist, s.release, s.bpm, s.jacket, s.zetaraku_jacket, s.international_only
             FROM songs s JOIN charts c ON c.song_id = s.id
             WHERE s.title = ?1 AND s.id >= ?2 AND c.level = ?3",
        )?,
    };
    let songs = match we_level {
        Some(level) if scope == SongScope::WorldsEnd => stmt
            .query_map(params![title, WORLDS_END_ID_THRESHOLD, level], song_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        _ => stmt
            .query_map(params![title, WORLDS_END_ID_THRESHOLD], song_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };
    Ok(match <[Song; 1]>::try_from(songs) {
        Ok([song]) => Some(song),
        Err(_) => None,
    })
}

/// Ids and titles of all songs below the WORLD'S END threshold.
pub fn standard_song_titles(conn: &Connection) -> Result<Vec<(i64, String)>> {
    let mut stmt = conn.prepare_cached("SELECT id, title FROM songs WHERE id < ?1 ORDER BY id")?;
    let rows = stmt
        .query_map([WORLDS_END_ID_THRESHOLD], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn get_aliases(conn: &Connection, song_id: i64) -> Result<Vec<Alias>> {
    let mut stmt = conn.prepare_cached(
        "SELECT alias, guild_id, song_id, owner_id FROM aliases WHERE song_id = ?1 ORDER BY alias",
    )?;
    let rows = stmt
        .query_map([song_id], |row| {
            Ok(Alias {
                alias: row.get(0)?,
                guild_id: row.get(1)?,
                song_id: row.get(2)?,
                owner_id: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn get_chart_views(conn: &Connection, song_id: i64) -> Result<Vec<ChartView>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, song_id, difficulty, end_index FROM sdvxin WHERE song_id = ?1 ORDER BY id, difficulty, end_index",
    )?;
    let rows = stmt
        .query_map([song_id], |row| {
            let tag: String = row.get(2)?;
            Ok((row.get(0)?, row.get(1)?, tag, row.get(3)?))
        })?
        .collect::<rusqlite::Result<Vec<(String, i64, String, String)>>>()?;
    Ok(rows
        .into_iter()
        .filter_map(|(id, song_id, tag, end_index)| {
            Difficulty::from_tag(&tag).map(|difficulty| ChartView {
                id,
                song_id,
                difficulty,
                end_index,
            })
        })
        .collect())
}

/// Row count of one of the catalog tables.
pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let table = match table {
        "songs" | "charts" | "aliases" | "sdvxin" => table,
        other => {
            return Err(crate::error::Error::Config(format!("unknown table {other}")));
        }
    };
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
    Ok(count)
}
