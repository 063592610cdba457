//! Core data models for catalog reconciliation.
//!
//! Upstream payloads (chunirec, the official song list, zetaraku) are decoded
//! straight into the record types below; the catalog rows written to SQLite
//! are `Song`, `Chart`, `Alias` and `ChartView`.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Songs with an id at or above this value are WORLD'S END entries.
pub const WORLDS_END_ID_THRESHOLD: i64 = 8000;

/// Scope id for aliases that apply to every guild.
pub const GLOBAL_ALIAS_SCOPE: i64 = -1;

// ============================================================================
// Difficulty
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Difficulty {
    Basic,
    Advanced,
    Expert,
    Master,
    Ultima,
    WorldsEnd,
}

impl Difficulty {
    /// Difficulties that carry a numeric level.
    pub const STANDARD: [Difficulty; 5] = [
        Difficulty::Basic,
        Difficulty::Advanced,
        Difficulty::Expert,
        Difficulty::Master,
        Difficulty::Ultima,
    ];

    /// Tag stored in the `charts.difficulty` column.
    pub fn tag(self) -> &'static str {
        match self {
            Difficulty::Basic => "BAS",
            Difficulty::Advanced => "ADV",
            Difficulty::Expert => "EXP",
            Difficulty::Master => "MAS",
            Difficulty::Ultima => "ULT",
            Difficulty::WorldsEnd => "WE",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "BAS" => Some(Difficulty::Basic),
            "ADV" => Some(Difficulty::Advanced),
            "EXP" => Some(Difficulty::Expert),
            "MAS" => Some(Difficulty::Master),
            "ULT" => Some(Difficulty::Ultima),
            "WE" => Some(Difficulty::WorldsEnd),
            _ => None,
        }
    }

    /// Difficulty letter used in sdvx.in script variable names.
    pub fn from_sdvxin_letter(letter: char) -> Option<Self> {
        match letter {
            'B' => Some(Difficulty::Basic),
            'A' => Some(Difficulty::Advanced),
            'E' => Some(Difficulty::Expert),
            'M' => Some(Difficulty::Master),
            'U' => Some(Difficulty::Ultima),
            'W' => Some(Difficulty::WorldsEnd),
            _ => None,
        }
    }

    /// Difficulty name used by the game data dump (`BASIC`, ..., `WORLD'S END`).
    pub fn from_dump_name(name: &str) -> Option<Self> {
        if name == "WORLD'S END" {
            return Some(Difficulty::WorldsEnd);
        }
        let prefix: String = name.chars().take(3).collect();
        Self::STANDARD.into_iter().find(|d| d.tag() == prefix)
    }

    /// Whether a community sheet label (`basic`, `master`, ...) names this difficulty.
    pub fn matches_label(self, label: &str) -> bool {
        let prefix: String = label.chars().take(3).collect();
        prefix.eq_ignore_ascii_case(self.tag())
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ============================================================================
// Primary source (chunirec)
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
pub struct ChunirecSong {
    pub meta: ChunirecMeta,
    pub data: ChunirecData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChunirecMeta {
    /// Internal hash id, the key of the manual override table
    pub id: String,
    pub title: String,
    pub genre: String,
    pub artist: String,
    #[serde(default)]
    pub release: Option<String>,
    /// 0 or null when unknown
    #[serde(default)]
    pub bpm: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChunirecData {
    #[serde(rename = "BAS")]
    pub basic: Option<ChunirecDifficulty>,
    #[serde(rename = "ADV")]
    pub advanced: Option<ChunirecDifficulty>,
    #[serde(rename = "EXP")]
    pub expert: Option<ChunirecDifficulty>,
    #[serde(rename = "MAS")]
    pub master: Option<ChunirecDifficulty>,
    #[serde(rename = "ULT")]
    pub ultima: Option<ChunirecDifficulty>,
    #[serde(rename = "WE")]
    pub worlds_end: Option<ChunirecDifficulty>,
}

impl ChunirecData {
    pub fn get(&self, difficulty: Difficulty) -> Option<&ChunirecDifficulty> {
        match difficulty {
            Difficulty::Basic => self.basic.as_ref(),
            Difficulty::Advanced => self.advanced.as_ref(),
            Difficulty::Expert => self.expert.as_ref(),
            Difficulty::Master => self.master.as_ref(),
            Difficulty::Ultima => self.ultima.as_ref(),
            Difficulty::WorldsEnd => self.worlds_end.as_ref(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChunirecDifficulty {
    pub level: f64,
    #[serde(rename = "const")]
    pub constant: f64,
    /// 0 or null when not available
    #[serde(default)]
    pub maxcombo: Option<i64>,
    #[serde(default)]
    pub is_const_unknown: i64,
}

// ============================================================================
// Official source (music.json)
// ============================================================================

/// One entry of the official song list. Every field is a string upstream.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct OfficialSong {
    pub id: String,
    pub title: String,
    pub catname: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub image: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub we_kanji: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub we_star: Option<String>,
}

impl OfficialSong {
    /// Star count of the WORLD'S END chart, if the entry has one.
    pub fn we_star_count(&self) -> Option<i64> {
        self.we_star.as_deref().and_then(|s| s.trim().parse().ok())
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

// ============================================================================
// Community source (zetaraku)
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
pub struct CommunityCatalog {
    pub songs: Vec<CommunitySong>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunitySong {
    pub title: String,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub bpm: Option<i64>,
    #[serde(default)]
    pub sheets: Vec<CommunitySheet>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunitySheet {
    pub difficulty: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub level_value: Option<f64>,
    #[serde(default)]
    pub internal_level: Option<String>,
    #[serde(default)]
    pub internal_level_value: Option<f64>,
    #[serde(default)]
    pub note_designer: Option<String>,
    #[serde(default)]
    pub note_counts: NoteCounts,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct NoteCounts {
    pub tap: Option<i64>,
    pub hold: Option<i64>,
    pub slide: Option<i64>,
    pub air: Option<i64>,
    pub flick: Option<i64>,
    pub total: Option<i64>,
}

// ============================================================================
// Catalog rows
// ============================================================================

/// Song row. `bpm`, `jacket` and `zetaraku_jacket` never erase stored values
/// when `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub catcode: Option<i64>,
    pub genre: String,
    pub artist: String,
    pub release: String,
    pub bpm: Option<i64>,
    pub jacket: Option<String>,
    pub zetaraku_jacket: Option<String>,
    pub international_only: bool,
}

/// Chart row keyed by (song_id, difficulty).
#[derive(Clone, Debug, PartialEq)]
pub struct Chart {
    pub song_id: i64,
    pub difficulty: Difficulty,
    pub level: String,
    pub constant: Option<f64>,
    pub maxcombo: Option<i64>,
    pub tap: Option<i64>,
    pub hold: Option<i64>,
    pub slide: Option<i64>,
    pub air: Option<i64>,
    pub flick: Option<i64>,
    pub charter: Option<String>,
}

impl Chart {
    pub fn new(song_id: i64, difficulty: Difficulty, level: String) -> Self {
        Self {
            song_id,
            difficulty,
            level,
            constant: None,
            maxcombo: None,
            tap: None,
            hold: None,
            slide: None,
            air: None,
            flick: None,
            charter: None,
        }
    }
}

/// Community nickname bound to a song.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alias {
    pub alias: String,
    pub guild_id: i64,
    pub song_id: i64,
    pub owner_id: Option<i64>,
}

/// Link from a chart to its sdvx.in chart view page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartView {
    /// Five-digit sdvx.in song id
    pub id: String,
    pub song_id: i64,
    pub difficulty: Difficulty,
    /// Variant index for songs with several WORLD'S END charts ("" for the first)
    pub end_index: String,
}

// ============================================================================
// Statistics
// ============================================================================

/// How the official record of a song was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Manual,
    ExactTitle,
    WorldsEndTitle,
}

/// Counters for the primary sync.
#[derive(Default, Debug, Clone, Serialize)]
pub struct SyncStats {
    pub primary_songs: usize,
    pub manual_matches: usize,
    pub exact_matches: usize,
    pub worlds_end_matches: usize,
    pub fallback_jackets: usize,
    pub community_matches: usize,
    pub unresolved: usize,
    pub skipped_worlds_end_charts: usize,
    pub songs_written: usize,
    pub charts_written: usize,
    pub elapsed_seconds: f64,
}

impl SyncStats {
    pub fn record_match(&mut self, kind: MatchKind) {
        match kind {
            MatchKind::Manual => self.manual_matches += 1,
            MatchKind::ExactTitle => self.exact_matches += 1,
            MatchKind::WorldsEndTitle => self.worlds_end_matches += 1,
        }
    }

    /// Percentage of primary songs that resolved to an official record.
    pub fn match_rate(&self) -> f64 {
        if self.primary_songs == 0 {
            0.0
        } else {
            let matched = self.manual_matches + self.exact_matches + self.worlds_end_matches;
            100.0 * matched as f64 / self.primary_songs as f64
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[derive(Default, Debug, Clone, Serialize)]
pub struct AliasStats {
    pub lines: usize,
    pub unmatched_titles: usize,
    pub aliases_written: usize,
}

#[derive(Default, Debug, Clone, Serialize)]
pub struct SdvxinStats {
    pub categories: usize,
    pub missing_tables: usize,
    pub scripts: usize,
    pub unmatched_titles: usize,
    pub views_found: usize,
    pub views_inserted: usize,
}

#[derive(Default, Debug, Clone, Serialize)]
pub struct DumpStats {
    pub directories: usize,
    pub unknown_songs: usize,
    pub charts_updated: usize,
    pub failed: usize,
}
