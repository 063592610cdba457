//! Identity resolution between the primary source and the two secondary
//! sources.
//!
//! Resolution order for the official record of a primary song:
//!
//! 1. Manual override keyed by the primary hash id
//! 2. No WORLD'S END chart: normalized title + catalog-code bucket
//! 3. WORLD'S END chart: normalized `title【tag】` against the primary title
//!
//! If the resolved record has no jacket, a looser title + artist match is
//! tried for the jacket only. The community record is matched on normalized
//! title alone.

use strsim::normalized_levenshtein;

use crate::mappings::{catalog_code, ManualMapping, MANUAL_MAPPINGS};
use crate::models::{ChunirecSong, CommunitySong, MatchKind, OfficialSong};
use crate::normalize::{normalize_title, with_we_tag};

/// Official record chosen for a primary song.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSong {
    pub id: i64,
    /// Canonical title stored in the catalog
    pub title: String,
    pub catcode: Option<i64>,
    pub jacket: Option<String>,
    pub we_kanji: Option<String>,
    pub we_star: Option<i64>,
    pub kind: MatchKind,
}

impl ResolvedSong {
    fn from_manual(mapping: &ManualMapping) -> Self {
        Self {
            id: mapping.id,
            title: mapping.title.to_string(),
            catcode: catalog_code(mapping.catname),
            jacket: Some(mapping.image.clone()).filter(|s| !s.is_empty()),
            we_kanji: Some(mapping.we_kanji.to_string()),
            we_star: Some(mapping.we_star),
            kind: MatchKind::Manual,
        }
    }

    fn from_official(official: &OfficialSong, kind: MatchKind) -> Option<Self> {
        let id = official.id.trim().parse().ok()?;
        Some(Self {
            id,
            title: official.title.clone(),
            catcode: catalog_code(&official.catname),
            jacket: Some(official.image.clone()).filter(|s| !s.is_empty()),
            we_kanji: official.we_kanji.clone(),
            we_star: official.we_star_count(),
            kind,
        })
    }
}

/// Why a primary song could not be resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Unresolved {
    /// Closest official title, for the log line
    pub nearest: Option<String>,
}

/// Find the official record for a primary-source song.
pub fn resolve_official(
    song: &ChunirecSong,
    official: &[OfficialSong],
) -> Result<ResolvedSong, Unresolved> {
    if let Some(mapping) = MANUAL_MAPPINGS.get(song.meta.id.as_str()) {
        return Ok(ResolvedSong::from_manual(mapping));
    }

    let primary_title = normalize_title(&song.meta.title, false);
    let found = if song.data.worlds_end.is_none() {
        let genre_code = catalog_code(&song.meta.genre);
        official
            .iter()
            .find(|x| {
                genre_code.is_some()
                    && catalog_code(&x.catname) == genre_code
                    && normalize_title(&x.title, false) == primary_title
            })
            .map(|x| (x, MatchKind::ExactTitle))
    } else {
        official
            .iter()
            .find(|x| {
                x.we_kanji.as_deref().is_some_and(|tag| {
                    normalize_title(&with_we_tag(&x.title, tag), false) == primary_title
                })
            })
            .map(|x| (x, MatchKind::WorldsEndTitle))
    };

    found
        .and_then(|(x, kind)| ResolvedSong::from_official(x, kind))
        .ok_or_else(|| Unresolved {
            nearest: nearest_title(&song.meta.title, official),
        })
}

/// Jacket of the first official record whose title matches the primary title
/// with its WORLD'S END tag removed and whose artist matches, ignoring the
/// catalog code.
pub fn fallback_jacket(song: &ChunirecSong, official: &[OfficialSong]) -> Option<String> {
    let title = normalize_title(&song.meta.title, true);
    let artist = normalize_title(&song.meta.artist, false);
    official
        .iter()
        .find(|x| {
            normalize_title(&x.title, false) == title && normalize_title(&x.artist, false) == artist
        })
        .map(|x| x.image.clone())
        .filter(|s| !s.is_empty())
}

/// First community record whose normalized title equals the primary title.
pub fn find_community<'a>(song: &ChunirecSong, community: &'a [CommunitySong]) -> Option<&'a CommunitySong> {
    let title = normalize_title(&song.meta.title, false);
    community
        .iter()
        .find(|x| normalize_title(&x.title, false) == title)
}

fn nearest_title(title: &str, official: &[OfficialSong]) -> Option<String> {
    let title = normalize_title(title, true);
    official
        .iter()
        .map(|x| (normalized_levenshtein(&title, &normalize_title(&x.title, false)), x))
        .filter(|(score, _)| *score >= 0.5)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, x)| x.title.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunirecData, ChunirecDifficulty, ChunirecMeta};

    fn primary(id: &str, title: &str, genre: &str, artist: &str, we: bool) -> ChunirecSong {
        ChunirecSong {
            meta: ChunirecMeta {
                id: id.to_string(),
                title: title.to_string(),
                genre: genre.to_string(),
                artist: artist.to_string(),
                release: Some("2020-01-01".to_string()),
                bpm: Some(150),
            },
            data: ChunirecData {
                worlds_end: we.then(|| ChunirecDifficulty {
                    level: 0.0,
                    constant: 0.0,
                    maxcombo: Some(0),
                    is_const_unknown: 1,
                }),
                ..Default::default()
            },
        }
    }

    fn official(id: &str, title: &str, catname: &str, artist: &str, image: &str) -> OfficialSong {
        OfficialSong {
            id: id.to_string(),
            title: title.to_string(),
            catname: catname.to_string(),
            artist: artist.to_string(),
            image: image.to_string(),
            we_kanji: None,
            we_star: None,
        }
    }

    #[test]
    fn test_exact_title_and_catalog_code() {
        let list = vec![
            official("1000", "Foo", "ORIGINAL", "A", "a.jpg"),
            official("1234", "Foo", "VARIETY", "B", "b.jpg"),
        ];
        let resolved = resolve_official(&primary("h1", "Foo", "VARIETY", "B", false), &list).unwrap();
        assert_eq!(resolved.id, 1234);
        assert_eq!(resolved.title, "Foo");
        assert_eq!(resolved.catcode, Some(6));
        assert_eq!(resolved.jacket.as_deref(), Some("b.jpg"));
        assert_eq!(resolved.kind, MatchKind::ExactTitle);
    }

    #[test]
    fn test_title_variants_fold_before_comparison() {
        let list = vec![official("55", "Help me, あーりん！", "POPS&ANIME", "x", "h.jpg")];
        let resolved =
            resolve_official(&primary("h2", "Help me, あーりん!", "POPS & ANIME", "x", false), &list).unwrap();
        assert_eq!(resolved.id, 55);
        // Canonical title comes from the official record
        assert_eq!(resolved.title, "Help me, あーりん！");
    }

    #[test]
    fn test_unknown_genre_never_matches() {
        let list = vec![official("1", "Foo", "NEW CATEGORY", "x", "")];
        let err = resolve_official(&primary("h3", "Foo", "NEW CATEGORY", "x", false), &list).unwrap_err();
        assert_eq!(err.nearest.as_deref(), Some("Foo"));
    }

    #[test]
    fn test_worlds_end_title_match() {
        let mut we = official("8100", "Foo", "VARIETY", "x", "we.jpg");
        we.we_kanji = Some("狂".to_string());
        we.we_star = Some("7".to_string());
        let list = vec![official("100", "Foo", "VARIETY", "x", "base.jpg"), we];

        let resolved = resolve_official(&primary("h4", "Foo【狂】", "VARIETY", "x", true), &list).unwrap();
        assert_eq!(resolved.id, 8100);
        assert_eq!(resolved.title, "Foo");
        assert_eq!(resolved.we_kanji.as_deref(), Some("狂"));
        assert_eq!(resolved.we_star, Some(7));
        assert_eq!(resolved.kind, MatchKind::WorldsEndTitle);
    }

    #[test]
    fn test_manual_mapping_bypasses_title_matching() {
        // A title match exists, but the override wins
        let list = vec![official("1", "Trackless wilderness", "ORIGINAL", "x", "other.jpg")];
        let song = primary("7a561ab609a0629d", "Trackless wilderness", "ORIGINAL", "x", false);
        let resolved = resolve_official(&song, &list).unwrap();
        assert_eq!(resolved.id, 8227);
        assert_eq!(resolved.jacket.as_deref(), Some("629be924b3383e08.jpg"));
        assert_eq!(resolved.we_kanji.as_deref(), Some("狂"));
        assert_eq!(resolved.we_star, Some(7));
        assert_eq!(resolved.kind, MatchKind::Manual);
    }

    #[test]
    fn test_manual_mapping_for_every_key() {
        for (hash_id, mapping) in MANUAL_MAPPINGS.iter() {
            let song = primary(hash_id, "unrelated", "VARIETY", "x", true);
            let resolved = resolve_official(&song, &[]).unwrap();
            assert_eq!(resolved.id, mapping.id);
            assert_eq!(resolved.title, mapping.title);
        }
    }

    #[test]
    fn test_non_numeric_official_id_is_unresolved() {
        let list = vec![official("abc", "Foo", "VARIETY", "x", "")];
        assert!(resolve_official(&primary("h5", "Foo", "VARIETY", "x", false), &list).is_err());
    }

    #[test]
    fn test_fallback_jacket_ignores_catalog_code() {
        let list = vec![official("9", "Foo", "ORIGINAL", "Someone", "foo.jpg")];
        let song = primary("h6", "Foo【狂】", "VARIETY", "Someone", true);
        assert_eq!(fallback_jacket(&song, &list).as_deref(), Some("foo.jpg"));

        let other_artist = primary("h7", "Foo【狂】", "VARIETY", "Nobody", true);
        assert_eq!(fallback_jacket(&other_artist, &list), None);
    }

    #[test]
    fn test_find_community_first_match_wins() {
        let community = vec![
            CommunitySong {
                title: "Foo！".to_string(),
                image_name: Some("first.png".to_string()),
                bpm: Some(120),
                sheets: vec![],
            },
            CommunitySong {
                title: "Foo!".to_string(),
                image_name: Some("second.png".to_string()),
                bpm: None,
                sheets: vec![],
            },
        ];
        let song = primary("h8", "Foo!", "VARIETY", "x", false);
        let found = find_community(&song, &community).unwrap();
        assert_eq!(found.image_name.as_deref(), Some("first.png"));
    }
}
