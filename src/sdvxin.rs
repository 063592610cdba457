//! sdvx.in chart-view cross-reference sync.
//!
//! Each category page lists songs as `<script src=...>` tags inside a table
//! with `td.tbgl` cells, each followed by an HTML comment holding the display
//! title. The per-song script defines one `var LV{id}{letter}{index}` line
//! per chart; a line whose value contains a link means the chart view exists.

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use crate::catalog::{self, SongScope};
use crate::error::Result;
use crate::mappings::{SDVXIN_CATEGORIES, SDVXIN_TITLE_MAPPING};
use crate::models::{ChartView, Difficulty, SdvxinStats};
use crate::sources::SourceClient;

/// Category listing WORLD'S END charts; it lives outside `/chunithm/sort/`.
pub const END_CATEGORY: &str = "end";

/// Length of an sdvx.in song id.
const SITE_ID_LEN: usize = 5;

static TABLE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<(/?)table\b").unwrap());

static TBGL_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<td\b[^>]*\bclass\s*=\s*["']?[^"'>]*\btbgl\b"#).unwrap());

static SCRIPT_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<script\b[^>]*?\bsrc\s*=\s*["']?([^"'\s>]+)"#).unwrap());

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--(.*?)-->").unwrap());

static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<a[\s>]").unwrap());

static NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").unwrap());

/// `document.title = '<title> [WORLD'S END] <difficulty>'` in WORLD'S END scripts.
static WORLDS_END_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"document\.title\s*=\s*['"](?P<title>.+?) \[WORLD'S END(?:\])?\s*(?P<difficulty>.+?)(?:\]\s*)?['"]"#,
    )
    .unwrap()
});

// ============================================================================
// PAGE PARSING
// ============================================================================

/// A song entry on a category page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    /// Script path as written in the page
    pub src: String,
    /// Display title as written in the page comment
    pub raw_title: String,
}

impl PageEntry {
    pub fn site_id(&self) -> String {
        site_id(&self.src)
    }

    /// Catalog title for this entry: the substitution table wins, otherwise
    /// the HTML-unescaped display title.
    pub fn title(&self) -> String {
        match SDVXIN_TITLE_MAPPING.get(self.raw_title.as_str()) {
            Some(mapped) => mapped.to_string(),
            None => html_unescape(&self.raw_title),
        }
    }
}

/// Site path of a category page.
pub fn category_path(category: &str) -> String {
    if category == END_CATEGORY {
        "/chunithm/end.htm".to_string()
    } else {
        format!("/chunithm/sort/{category}.htm")
    }
}

/// Byte ranges of the outermost tables in a page. Nested tables stay inside
/// their parent's range; an unclosed table runs to the end of the page.
fn outer_tables(html: &str) -> Vec<std::ops::Range<usize>> {
    let mut tables = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for tag in TABLE_TAG.captures_iter(html) {
        let (Some(whole), Some(slash)) = (tag.get(0), tag.get(1)) else {
            continue;
        };
        if slash.as_str().is_empty() {
            if depth == 0 {
                start = whole.start();
            }
            depth += 1;
        } else if depth > 0 {
            depth -= 1;
            if depth == 0 {
                let end = html[whole.end()..].find('>').map_or(html.len(), |i| whole.end() + i + 1);
                tables.push(start..end);
            }
        }
    }
    if depth > 0 {
        tables.push(start..html.len());
    }
    tables
}

/// Song entries of a category page, or `None` when the page has no song table.
/// Scripts with no title comment after them are dropped.
pub fn parse_category_page(html: &str) -> Option<Vec<PageEntry>> {
    let tables: Vec<_> = outer_tables(html)
        .into_iter()
        .filter(|table| TBGL_CELL.is_match(&html[table.clone()]))
        .collect();
    if tables.is_empty() {
        return None;
    }

    let mut entries = Vec::new();
    for table in tables {
        for script in SCRIPT_SRC.captures_iter(&html[table.clone()]) {
            let (Some(whole), Some(src)) = (script.get(0), script.get(1)) else {
                continue;
            };
            let after = table.start + whole.end();
            let Some(comment) = COMMENT.captures(&html[after..]).and_then(|c| c.get(1)) else {
                continue;
            };
            entries.push(PageEntry {
                src: src.as_str().to_string(),
                raw_title: comment.as_str().to_string(),
            });
        }
    }
    Some(entries)
}

/// First five characters of the script file name.
pub fn site_id(src: &str) -> String {
    let file = src.rsplit('/').next().unwrap_or(src);
    file.chars().take(SITE_ID_LEN).collect()
}

/// Decode the HTML character references that occur in sdvx.in titles.
pub fn html_unescape(text: &str) -> String {
    let named = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}");
    let numeric = NUMERIC_ENTITY.replace_all(&named, |caps: &regex::Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), |c| c.to_string())
    });
    // Last, so "&amp;lt;" decodes to "&lt;" rather than "<"
    numeric.replace("&amp;", "&")
}

// ============================================================================
// SCRIPT PARSING
// ============================================================================

/// Level of the WORLD'S END chart a script belongs to (`狂☆☆☆☆`).
pub fn parse_we_difficulty(script: &str) -> Option<String> {
    WORLDS_END_TITLE
        .captures(script)
        .and_then(|caps| caps.name("difficulty"))
        .map(|m| m.as_str().to_string())
}

/// Chart views defined by a song script.
///
/// `var LV04058M="<a href=...>"` declares the MASTER view of site id 04058;
/// `var LV04058W2=...` the second WORLD'S END variant. Lines whose value has
/// no link are placeholders for charts without a view.
pub fn parse_chart_views(script: &str, site_id: &str, song_id: i64) -> Vec<ChartView> {
    let prefix = format!("var LV{site_id}");
    let mut views = Vec::new();

    for line in script.lines().filter(|line| line.starts_with(&prefix)) {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let Some(rest) = key.trim_end().get(prefix.len()..) else {
            continue;
        };
        let mut suffix = rest.chars();
        let Some(letter) = suffix.next() else {
            continue;
        };
        let Some(difficulty) = Difficulty::from_sdvxin_letter(letter) else {
            warn!(site_id, letter = %letter, "Unknown sdvx.in difficulty letter");
            continue;
        };
        let end_index = suffix.next().map(String::from).unwrap_or_default();

        let value = value.trim();
        let value = value.strip_prefix('"').unwrap_or(value);
        let value = value.strip_suffix("\";").unwrap_or(value);
        if !LINK.is_match(value) {
            continue;
        }

        views.push(ChartView {
            id: site_id.to_string(),
            song_id,
            difficulty,
            end_index,
        });
    }
    views
}

// ============================================================================
// SYNC
// ============================================================================

/// Resolve every category against the catalog and insert the discovered chart
/// views in one transaction. `fetch` maps a site path to its body.
pub fn sync_chart_views<F>(conn: &mut Connection, fetch: F) -> Result<SdvxinStats>
where
    F: Fn(&str) -> Result<String>,
{
    let mut stats = SdvxinStats::default();
    let mut views = Vec::new();

    for category in SDVXIN_CATEGORIES {
        info!(category, "Processing sdvx.in category");
        stats.categories += 1;
        let page = fetch(&category_path(category))?;
        let Some(entries) = parse_category_page(&page) else {
            error!(category, "Could not find song table");
            stats.missing_tables += 1;
            continue;
        };

        for entry in entries {
            let title = entry.title();
            let site_id = entry.site_id();
            let script = script_path(&entry.src);

            let mut body = None;
            let song = if category == END_CATEGORY {
                let fetched = fetch(&script)?;
                stats.scripts += 1;
                let Some(level) = parse_we_difficulty(&fetched) else {
                    warn!(title = %title, site_id = %site_id, "Could not extract WORLD'S END difficulty");
                    continue;
                };
                let song = catalog::find_song_by_title(conn, &title, SongScope::WorldsEnd, Some(&level))?;
                body = Some(fetched);
                song
            } else {
                catalog::find_song_by_title(conn, &title, SongScope::Standard, None)?
            };

            let Some(song) = song else {
                warn!(title = %title, site_id = %site_id, category, "Could not find song");
                stats.unmatched_titles += 1;
                continue;
            };

            let body = match body {
                Some(body) => body,
                None => {
                    stats.scripts += 1;
                    fetch(&script)?
                }
            };
            let found = parse_chart_views(&body, &site_id, song.id);
            debug!(song_id = song.id, site_id = %site_id, views = found.len(), "Parsed chart views");
            views.extend(found);
        }
    }

    stats.views_found = views.len();
    let tx = conn.transaction()?;
    stats.views_inserted = catalog::insert_chart_views(&tx, &views)?;
    tx.commit()?;
    Ok(stats)
}

/// Site path for a script `src`, which is normally already absolute.
fn script_path(src: &str) -> String {
    if src.starts_with('/') {
        src.to_string()
    } else {
        format!("/chunithm/{src}")
    }
}

/// Fetch sdvx.in and sync chart views.
pub fn run(conn: &mut Connection, client: &SourceClient) -> Result<SdvxinStats> {
    let stats = sync_chart_views(conn, |path| client.fetch_text(&client.sdvxin_url(path)))?;
    info!(
        categories = stats.categories,
        missing_tables = stats.missing_tables,
        unmatched = stats.unmatched_titles,
        found = stats.views_found,
        inserted = stats.views_inserted,
        "sdvx.in sync complete"
    );
    Ok(stats)
}
