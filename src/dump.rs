//! Import chart data from an offline game data dump.
//!
//! A `music` directory holds one subdirectory per song. Each contains a
//! `Music.xml` describing the song and its charts, plus one tab-separated
//! chart file per chart with note counts, BPM and charter.
//!
//! Directories are imported on a fixed-width worker pool. Each directory gets
//! its own connection and transaction so a failure only loses that song.

use rayon::prelude::*;
use rusqlite::{Connection, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::catalog;
use crate::charts::we_level;
use crate::error::{Error, Result};
use crate::models::{Chart, Difficulty, DumpStats};
use crate::progress::{create_progress_bar, format_duration, log_progress};

/// Number of directories imported concurrently.
pub const DUMP_WORKERS: usize = 10;

/// `levelDecimal` at or above this displays as `+`.
const PLUS_THRESHOLD: u32 = 50;

// ============================================================================
// Music.xml
// ============================================================================

/// Song description from `Music.xml`.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicEntry {
    pub id: i64,
    pub we_tag: Option<String>,
    pub we_stars: Option<i64>,
    pub fumens: Vec<FumenEntry>,
}

/// An enabled chart of a `Music.xml` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FumenEntry {
    pub difficulty: Difficulty,
    pub level: Option<String>,
    pub level_decimal: Option<String>,
    /// Chart file, relative to the song directory
    pub file: Option<String>,
}

fn child<'a, 'input>(node: roxmltree::Node<'a, 'input>, path: &[&str]) -> Option<roxmltree::Node<'a, 'input>> {
    path.iter()
        .try_fold(node, |node, name| node.children().find(|c| c.has_tag_name(*name)))
}

fn child_text(node: roxmltree::Node<'_, '_>, path: &[&str]) -> Option<String> {
    child(node, path)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse a `Music.xml` document. Disabled charts and charts of unknown type
/// are left out.
pub fn parse_music_xml(text: &str, origin: &Path) -> Result<MusicEntry> {
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();

    let id = child_text(root, &["name", "id"])
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| Error::Dump {
            path: origin.display().to_string(),
            reason: "missing or non-numeric name/id".to_string(),
        })?;

    let fumens = child(root, &["fumens"])
        .map(|fumens| {
            fumens
                .children()
                .filter(|n| n.has_tag_name("MusicFumenData"))
                .filter(|n| child_text(*n, &["enable"]).as_deref() == Some("true"))
                .filter_map(|n| {
                    let name = child_text(n, &["type", "data"])?;
                    let Some(difficulty) = Difficulty::from_dump_name(&name) else {
                        debug!(id, name = %name, "Skipping chart of unknown type");
                        return None;
                    };
                    Some(FumenEntry {
                        difficulty,
                        level: child_text(n, &["level"]),
                        level_decimal: child_text(n, &["levelDecimal"]),
                        file: child_text(n, &["file", "path"]),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(MusicEntry {
        id,
        we_tag: child_text(root, &["worldsEndTagName", "str"]),
        we_stars: child_text(root, &["starDifType"]).and_then(|s| s.parse().ok()),
        fumens,
    })
}

/// Display level and constant for a standard chart: `13` + `50` → (`13+`, 13.5).
pub fn standard_level(level: &str, decimal: &str) -> Option<(String, f64)> {
    let whole: u32 = level.parse().ok()?;
    let fraction: u32 = decimal.parse().ok()?;
    let display = if fraction >= PLUS_THRESHOLD {
        format!("{whole}+")
    } else {
        whole.to_string()
    };
    let constant = format!("{level}.{decimal}").parse().ok()?;
    Some((display, constant))
}

// ============================================================================
// Chart files
// ============================================================================

/// Values read from a tab-separated chart file. Absent rows stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartFile {
    pub bpm: Option<i64>,
    pub maxcombo: Option<i64>,
    pub tap: Option<i64>,
    pub hold: Option<i64>,
    pub slide: Option<i64>,
    pub air: Option<i64>,
    pub flick: Option<i64>,
    pub charter: Option<String>,
}

pub fn parse_chart_file(text: &str) -> ChartFile {
    let mut file = ChartFile::default();
    for line in text.lines() {
        let mut columns = line.split('\t');
        let (Some(command), Some(value)) = (columns.next(), columns.next()) else {
            continue;
        };
        let value = value.trim();
        let count = || value.parse::<i64>().ok();
        match command {
            // Fractional BPMs are truncated
            "BPM_DEF" => file.bpm = value.parse::<f64>().ok().map(|bpm| bpm as i64),
            "T_JUDGE_ALL" => file.maxcombo = count(),
            "T_JUDGE_TAP" => file.tap = count(),
            "T_JUDGE_HLD" => file.hold = count(),
            "T_JUDGE_SLD" => file.slide = count(),
            "T_JUDGE_AIR" => file.air = count(),
            "T_JUDGE_FLK" => file.flick = count(),
            "CREATOR" => file.charter = Some(value.to_string()).filter(|s| !s.is_empty()),
            _ => {}
        }
    }
    file
}

// ============================================================================
// Import
// ============================================================================

/// Result of importing one song directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryOutcome {
    Updated { song_id: i64, charts: usize },
    UnknownSong(i64),
}

/// Build the updated chart for an enabled fumen, or `None` when the entry
/// lacks the fields its difficulty needs.
fn dump_chart(song_id: i64, music: &MusicEntry, fumen: &FumenEntry) -> Option<Chart> {
    if fumen.difficulty == Difficulty::WorldsEnd {
        let (Some(tag), Some(stars)) = (music.we_tag.as_deref(), music.we_stars) else {
            warn!(song_id, "WORLD'S END chart without tag or star count");
            return None;
        };
        return Some(Chart::new(song_id, Difficulty::WorldsEnd, we_level(tag, stars)));
    }

    let parsed = fumen
        .level
        .as_deref()
        .zip(fumen.level_decimal.as_deref())
        .and_then(|(level, decimal)| standard_level(level, decimal));
    let Some((level, constant)) = parsed else {
        warn!(song_id, difficulty = %fumen.difficulty, "Chart without a usable level");
        return None;
    };
    let mut chart = Chart::new(song_id, fumen.difficulty, level);
    chart.constant = Some(constant);
    Some(chart)
}

/// Import one song directory in its own transaction.
///
/// The transaction takes the write lock up front: it reads before writing, and
/// a deferred read-to-write upgrade fails without waiting on the busy timeout
/// once another worker has committed.
pub fn import_directory(conn: &mut Connection, dir: &Path) -> Result<DirectoryOutcome> {
    let xml_path = dir.join("Music.xml");
    let text = std::fs::read_to_string(&xml_path)?;
    let music = parse_music_xml(&text, &xml_path)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let Some(song) = catalog::get_song(&tx, music.id)? else {
        return Ok(DirectoryOutcome::UnknownSong(music.id));
    };
    let stored = catalog::get_charts(&tx, song.id)?;

    let mut bpm_filled = song.bpm.is_some();
    let mut updated = 0;
    for fumen in &music.fumens {
        if !stored.iter().any(|c| c.difficulty == fumen.difficulty) {
            continue;
        }
        let Some(mut chart) = dump_chart(song.id, &music, fumen) else {
            continue;
        };

        if let Some(file) = &fumen.file {
            let values = parse_chart_file(&std::fs::read_to_string(dir.join(file))?);
            if let (false, Some(bpm)) = (bpm_filled, values.bpm) {
                catalog::fill_song_bpm(&tx, song.id, bpm)?;
                bpm_filled = true;
            }
            chart.maxcombo = values.maxcombo;
            chart.tap = values.tap;
            chart.hold = values.hold;
            chart.slide = values.slide;
            chart.air = values.air;
            chart.flick = values.flick;
            chart.charter = values.charter;
        }

        updated += catalog::update_chart_from_dump(&tx, &chart)?;
    }
    tx.commit()?;

    Ok(DirectoryOutcome::Updated {
        song_id: song.id,
        charts: updated,
    })
}

/// Song directories under each given `music` directory, sorted.
pub fn song_directories(music_paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for music in music_paths {
        for entry in std::fs::read_dir(music)? {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Import every song directory under `music_paths` into the catalog at
/// `db_path`. All directories are attempted; the job fails afterwards if any
/// of them did.
pub fn run(db_path: &Path, music_paths: &[PathBuf]) -> Result<DumpStats> {
    let start = Instant::now();
    let dirs = song_directories(music_paths)?;
    info!(directories = dirs.len(), workers = DUMP_WORKERS, "Importing game data dump");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(DUMP_WORKERS)
        .build()?;

    let pb = create_progress_bar(dirs.len() as u64, "Importing");
    let done = AtomicUsize::new(0);
    let total = dirs.len() as u64;

    let outcomes: Vec<(PathBuf, Result<DirectoryOutcome>)> = pool.install(|| {
        dirs.par_iter()
            .map(|dir| {
                let outcome = catalog::open(db_path).and_then(|mut conn| import_directory(&mut conn, dir));
                pb.inc(1);
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                log_progress("dump", n as u64, total, 100);
                (dir.clone(), outcome)
            })
            .collect()
    });
    pb.finish_and_clear();

    let mut stats = DumpStats {
        directories: dirs.len(),
        ..Default::default()
    };
    for (dir, outcome) in outcomes {
        match outcome {
            Ok(DirectoryOutcome::Updated { song_id, charts }) => {
                debug!(song_id, charts, "Imported");
                stats.charts_updated += charts;
            }
            Ok(DirectoryOutcome::UnknownSong(id)) => {
                warn!(id, dir = %dir.display(), "Could not find song");
                stats.unknown_songs += 1;
            }
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "Dump directory failed");
                stats.failed += 1;
            }
        }
    }

    info!(
        directories = stats.directories,
        charts = stats.charts_updated,
        unknown = stats.unknown_songs,
        failed = stats.failed,
        elapsed = %format_duration(start.elapsed()),
        "Dump import complete"
    );

    if stats.failed > 0 {
        return Err(Error::DumpFailed {
            failed: stats.failed,
            total: stats.directories,
        });
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::song;
    use std::fs;

    const MUSIC_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<MusicData>
  <name><id>1234</id><str>Foo</str></name>
  <worldsEndTagName><id>-1</id><str>Invalid</str></worldsEndTagName>
  <starDifType>0</starDifType>
  <fumens>
    <MusicFumenData>
      <enable>true</enable>
      <type><id>3</id><str>Master</str><data>MASTER</data></type>
      <file><path>1234_03.c2s</path></file>
      <level>13</level>
      <levelDecimal>70</levelDecimal>
    </MusicFumenData>
    <MusicFumenData>
      <enable>true</enable>
      <type><id>2</id><str>Expert</str><data>EXPERT</data></type>
      <file><path>1234_02.c2s</path></file>
      <level>11</level>
      <levelDecimal>50</levelDecimal>
    </MusicFumenData>
    <MusicFumenData>
      <enable>false</enable>
      <type><id>4</id><str>Ultima</str><data>ULTIMA</data></type>
      <file><path>1234_04.c2s</path></file>
      <level>14</level>
      <levelDecimal>80</levelDecimal>
    </MusicFumenData>
  </fumens>
</MusicData>"#;

    const MASTER_C2S: &str = "VERSION\t1.13.00\t1.13.00\nBPM_DEF\t182.000\t182.000\t182.000\t182.000\nCREATOR\tsomeone\nT_JUDGE_TAP\t1200\nT_JUDGE_ALL\t2345\nT_JUDGE_FLK\t3\n\nTAP\t0\t0\t4\t4\n";

    #[test]
    fn test_parse_music_xml() {
        let music = parse_music_xml(MUSIC_XML, Path::new("Music.xml")).unwrap();
        assert_eq!(music.id, 1234);
        assert_eq!(music.we_tag.as_deref(), Some("Invalid"));
        assert_eq!(music.we_stars, Some(0));
        assert_eq!(music.fumens.len(), 2);
        assert_eq!(music.fumens[0].difficulty, Difficulty::Master);
        assert_eq!(music.fumens[0].file.as_deref(), Some("1234_03.c2s"));
    }

    #[test]
    fn test_music_xml_without_id() {
        let err = parse_music_xml("<MusicData><name/></MusicData>", Path::new("x/Music.xml")).unwrap_err();
        assert!(matches!(err, Error::Dump { .. }));
        assert!(matches!(parse_music_xml("<MusicData>", Path::new("x")), Err(Error::Xml(_))));
    }

    #[test]
    fn test_standard_level() {
        assert_eq!(standard_level("13", "70"), Some(("13+".to_string(), 13.7)));
        assert_eq!(standard_level("13", "50"), Some(("13+".to_string(), 13.5)));
        assert_eq!(standard_level("12", "00"), Some(("12".to_string(), 12.0)));
        assert_eq!(standard_level("12", "40"), Some(("12".to_string(), 12.4)));
        assert_eq!(standard_level("x", "40"), None);
    }

    #[test]
    fn test_parse_chart_file() {
        let file = parse_chart_file(MASTER_C2S);
        assert_eq!(file.bpm, Some(182));
        assert_eq!(file.maxcombo, Some(2345));
        assert_eq!(file.tap, Some(1200));
        assert_eq!(file.flick, Some(3));
        assert_eq!(file.hold, None);
        assert_eq!(file.charter.as_deref(), Some("someone"));
    }

    fn write_song_dir(music: &Path) {
        let dir = music.join("music1234");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Music.xml"), MUSIC_XML).unwrap();
        fs::write(dir.join("1234_03.c2s"), MASTER_C2S).unwrap();
        fs::write(dir.join("1234_02.c2s"), "BPM_DEF\t90.5\nT_JUDGE_ALL\t800\n").unwrap();
    }

    #[test]
    fn test_import_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("catalog.sqlite3");
        let music = tmp.path().join("music");
        write_song_dir(&music);

        {
            let conn = catalog::open(&db_path).unwrap();
            let mut foo = song(1234, "Foo");
            foo.bpm = None;
            catalog::upsert_songs(&conn, &[foo]).unwrap();
            let mut master = Chart::new(1234, Difficulty::Master, "13+".to_string());
            master.hold = Some(77);
            catalog::upsert_charts(
                &conn,
                &[
                    master,
                    Chart::new(1234, Difficulty::Expert, "11".to_string()),
                    Chart::new(1234, Difficulty::Ultima, "14+".to_string()),
                ],
            )
            .unwrap();
        }

        let stats = run(&db_path, &[music]).unwrap();
        assert_eq!(stats.directories, 1);
        assert_eq!(stats.charts_updated, 2);

        let conn = catalog::open(&db_path).unwrap();
        let charts = catalog::get_charts(&conn, 1234).unwrap();
        let expert = &charts[0];
        assert_eq!((expert.level.as_str(), expert.constant), ("11+", Some(11.5)));
        assert_eq!(expert.maxcombo, Some(800));

        let master = &charts[1];
        assert_eq!((master.level.as_str(), master.constant), ("13+", Some(13.7)));
        assert_eq!(master.maxcombo, Some(2345));
        assert_eq!(master.hold, Some(77));
        assert_eq!(master.charter.as_deref(), Some("someone"));

        // Disabled in the dump, untouched
        assert_eq!(charts[2].level, "14+");

        // First chart file with a BPM wins
        assert_eq!(catalog::get_song(&conn, 1234).unwrap().unwrap().bpm, Some(182));
    }

    #[test]
    fn test_unknown_song_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("catalog.sqlite3");
        let music = tmp.path().join("music");
        write_song_dir(&music);
        catalog::open(&db_path).unwrap();

        let stats = run(&db_path, &[music]).unwrap();
        assert_eq!(stats.unknown_songs, 1);
        assert_eq!(stats.charts_updated, 0);
    }

    fn write_numbered_song_dir(music: &Path, id: i64) {
        let xml = MUSIC_XML
            .replace("<id>1234</id>", &format!("<id>{id}</id>"))
            .replace("1234_", &format!("{id}_"));
        let dir = music.join(format!("music{id:04}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Music.xml"), xml).unwrap();
        fs::write(dir.join(format!("{id}_03.c2s")), MASTER_C2S).unwrap();
        fs::write(dir.join(format!("{id}_02.c2s")), "BPM_DEF\t150\nT_JUDGE_ALL\t800\n").unwrap();
    }

    #[test]
    fn test_many_directories_import_in_parallel() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("catalog.sqlite3");
        let music = tmp.path().join("music");
        let ids: Vec<i64> = (1..=200).collect();

        {
            let conn = catalog::open(&db_path).unwrap();
            let songs: Vec<_> = ids
                .iter()
                .map(|&id| {
                    let mut s = song(id, &format!("Song {id}"));
                    s.bpm = None;
                    s
                })
                .collect();
            catalog::upsert_songs(&conn, &songs).unwrap();
            let charts: Vec<_> = ids
                .iter()
                .flat_map(|&id| {
                    [
                        Chart::new(id, Difficulty::Expert, "11".to_string()),
                        Chart::new(id, Difficulty::Master, "13".to_string()),
                    ]
                })
                .collect();
            catalog::upsert_charts(&conn, &charts).unwrap();
        }
        for &id in &ids {
            write_numbered_song_dir(&music, id);
        }

        let stats = run(&db_path, &[music]).unwrap();
        assert_eq!(stats.directories, ids.len());
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.charts_updated, ids.len() * 2);

        let conn = catalog::open(&db_path).unwrap();
        for &id in &ids {
            let charts = catalog::get_charts(&conn, id).unwrap();
            assert_eq!(charts[0].level, "11+");
            assert_eq!(charts[1].maxcombo, Some(2345));
            assert_eq!(catalog::get_song(&conn, id).unwrap().unwrap().bpm, Some(182));
        }
    }

    #[test]
    fn test_broken_directory_fails_job_after_others_finish() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("catalog.sqlite3");
        let music = tmp.path().join("music");
        write_song_dir(&music);
        fs::create_dir_all(music.join("broken")).unwrap();
        fs::write(music.join("broken").join("Music.xml"), "<MusicData>").unwrap();

        {
            let conn = catalog::open(&db_path).unwrap();
            catalog::upsert_songs(&conn, &[song(1234, "Foo")]).unwrap();
            catalog::upsert_charts(&conn, &[Chart::new(1234, Difficulty::Master, "13".to_string())]).unwrap();
        }

        let err = run(&db_path, &[music]).unwrap_err();
        assert!(matches!(err, Error::DumpFailed { failed: 1, total: 2 }));

        // The healthy directory was still committed
        let conn = catalog::open(&db_path).unwrap();
        assert_eq!(catalog::get_charts(&conn, 1234).unwrap()[0].level, "13+");
    }
}
