//! Community alias sync.
//!
//! The alias list is a TSV: the first column is a song title, every further
//! column is a nickname for it. Titles are matched against non-WORLD'S END
//! songs only; WORLD'S END entries redirect to their base song at search time.

use rusqlite::Connection;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::catalog;
use crate::error::Result;
use crate::models::{Alias, AliasStats, GLOBAL_ALIAS_SCOPE};
use crate::normalize::loose_key;
use crate::sources::SourceClient;

/// One usable line of the alias list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasLine {
    pub title: String,
    pub aliases: Vec<String>,
}

/// Parse the alias TSV. Lines with fewer than two columns are dropped, as are
/// empty alias cells.
pub fn parse_alias_tsv(text: &str) -> Vec<AliasLine> {
    text.lines()
        .filter_map(|line| {
            let mut columns = line.split('\t');
            let title = columns.next()?.trim();
            let aliases: Vec<String> = columns
                .map(str::trim)
                .filter(|alias| !alias.is_empty())
                .map(str::to_string)
                .collect();
            (!title.is_empty() && !aliases.is_empty()).then(|| AliasLine {
                title: title.to_string(),
                aliases,
            })
        })
        .collect()
}

/// Title lookup over the stored standard songs, keyed by `loose_key`.
/// Titles shared by several songs map to `None`.
pub struct TitleIndex {
    by_key: FxHashMap<String, Option<i64>>,
}

impl TitleIndex {
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut by_key: FxHashMap<String, Option<i64>> = FxHashMap::default();
        for (id, title) in catalog::standard_song_titles(conn)? {
            by_key
                .entry(loose_key(&title))
                .and_modify(|existing| *existing = None)
                .or_insert(Some(id));
        }
        Ok(Self { by_key })
    }

    pub fn lookup(&self, title: &str) -> Option<i64> {
        self.by_key.get(&loose_key(title)).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Resolve parsed alias lines to global alias rows.
pub fn resolve_aliases(lines: &[AliasLine], index: &TitleIndex, stats: &mut AliasStats) -> Vec<Alias> {
    let mut rows = Vec::new();
    for line in lines {
        let Some(song_id) = index.lookup(&line.title) else {
            debug!(title = %line.title, "No song for alias line");
            stats.unmatched_titles += 1;
            continue;
        };
        rows.extend(line.aliases.iter().map(|alias| Alias {
            alias: alias.clone(),
            guild_id: GLOBAL_ALIAS_SCOPE,
            song_id,
            owner_id: None,
        }));
    }
    rows
}

/// Sync aliases from already-fetched TSV text in one transaction.
pub fn sync_aliases(conn: &mut Connection, text: &str) -> Result<AliasStats> {
    let lines = parse_alias_tsv(text);
    let mut stats = AliasStats {
        lines: lines.len(),
        ..Default::default()
    };

    let tx = conn.transaction()?;
    let index = TitleIndex::load(&tx)?;
    let rows = resolve_aliases(&lines, &index, &mut stats);
    stats.aliases_written = catalog::upsert_aliases(&tx, &rows)?;
    tx.commit()?;
    Ok(stats)
}

/// Fetch the community alias list and sync it.
pub fn run(conn: &mut Connection, client: &SourceClient) -> Result<AliasStats> {
    info!("Fetching alias list");
    let text = client.fetch_aliases()?;
    let stats = sync_aliases(conn, &text)?;
    info!(
        lines = stats.lines,
        unmatched = stats.unmatched_titles,
        aliases = stats.aliases_written,
        "Alias sync complete"
    );
    Ok(stats)
}
