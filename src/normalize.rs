//! Title normalization shared by every matching step.
//!
//! The three upstream catalogs spell the same title with different
//! full-width/half-width punctuation. Folding those variants to a single
//! representative is enough for exact-equality matching; no case folding is
//! applied here.
//!
//! CRITICAL: the primary sync, alias sync and cross-reference sync all key on
//! this output. Run the tests after any change to the fold table.

use once_cell::sync::Lazy;
use regex::Regex;

// ============================================================================
// FOLD TABLE
// ============================================================================

/// Visually similar variants and the character they fold to.
/// No canonical character appears on the left-hand side, which keeps
/// folding idempotent.
const FOLD_TABLE: &[(char, char)] = &[
    ('\u{00A0}', ' '), // no-break space
    ('\u{3000}', ' '), // ideographic space
    ('\u{2002}', ' '), // en space
    ('\u{FF1A}', ':'),
    ('\u{FF08}', '('),
    ('\u{FF09}', ')'),
    ('\u{FF01}', '!'),
    ('\u{FF1F}', '?'),
    ('\u{FF40}', '\''), // full-width grave accent
    ('`', '\''),
    ('\u{201D}', '"'),
    ('\u{201C}', '"'),
    ('\u{FF5E}', '~'),
    ('\u{FF0D}', '-'),
    ('\u{FF20}', '@'),
];

/// Trailing run of WORLD'S END tags such as `【狂】` or `【分A】`.
pub static WORLDS_END_TAG_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:【.{1,2}】)+$").unwrap());

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

fn fold_char(c: char) -> char {
    FOLD_TABLE
        .iter()
        .find(|(variant, _)| *variant == c)
        .map_or(c, |&(_, canonical)| canonical)
}

/// Normalize a title for cross-source matching.
///
/// With `remove_we_tag`, a trailing `【X】`/`【XX】` tag (the WORLD'S END
/// marker the primary source embeds in titles) is stripped as well.
pub fn normalize_title(title: &str, remove_we_tag: bool) -> String {
    let folded: String = title.chars().map(fold_char).collect();
    if remove_we_tag {
        WORLDS_END_TAG_SUFFIX.replace(&folded, "").into_owned()
    } else {
        folded
    }
}

/// Title with a WORLD'S END tag appended, the way the primary source spells it.
pub fn with_we_tag(title: &str, tag: &str) -> String {
    format!("{title}【{tag}】")
}

/// Width-normalized, case-folded key for lookups against community lists
/// whose casing is not reliable.
pub fn loose_key(title: &str) -> String {
    normalize_title(title, false).to_lowercase()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fold_full_width_punctuation() {
        assert_eq!(normalize_title("Help me, あーりん！", false), "Help me, あーりん!");
        assert_eq!(normalize_title("ＧＯ！ＧＯ！（Ver.）", false), "ＧＯ!ＧＯ!(Ver.)");
        assert_eq!(normalize_title("A\u{3000}B\u{00A0}C", false), "A B C");
        assert_eq!(normalize_title("“STAR”T", false), "\"STAR\"T");
        assert_eq!(normalize_title("DON`T ～MIX～", false), "DON'T ~MIX~");
    }

    #[test]
    fn test_case_is_preserved() {
        assert_eq!(normalize_title("Reach For The Stars", false), "Reach For The Stars");
        assert_ne!(
            normalize_title("Reach for the Stars", false),
            normalize_title("Reach For The Stars", false)
        );
    }

    #[test]
    fn test_we_tag_removal() {
        assert_eq!(normalize_title("Trackless wilderness【狂】", true), "Trackless wilderness");
        assert_eq!(normalize_title("Random【分A】", true), "Random");
        // Kept unless asked for
        assert_eq!(normalize_title("Random【分A】", false), "Random【分A】");
        // Only at the end of the title
        assert_eq!(normalize_title("【狂】Intro", true), "【狂】Intro");
        // Three-character tags are not WORLD'S END markers
        assert_eq!(normalize_title("Song【ABC】", true), "Song【ABC】");
    }

    #[test]
    fn test_with_we_tag_matches_primary_spelling() {
        assert_eq!(
            normalize_title(&with_we_tag("Trrricksters!!", "狂"), false),
            normalize_title("Trrricksters！！【狂】", false)
        );
    }

    #[test]
    fn test_empty_and_punctuation_only() {
        assert_eq!(normalize_title("", false), "");
        assert_eq!(normalize_title("", true), "");
        assert_eq!(normalize_title("！？（）", false), "!?()");
        assert_eq!(normalize_title("【】", true), "【】");
    }

    #[test]
    fn test_loose_key() {
        assert_eq!(loose_key("Reach for the Stars"), loose_key("Reach For The Stars"));
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(s in ".*", remove in any::<bool>()) {
            let once = normalize_title(&s, remove);
            prop_assert_eq!(normalize_title(&once, remove), once);
        }

        #[test]
        fn prop_normalize_punctuation_variants_idempotent(
            s in "[\u{00A0}\u{3000}\u{2002}：（）！？｀`”“～－＠【】狂分A ]{0,16}",
            remove in any::<bool>(),
        ) {
            let once = normalize_title(&s, remove);
            prop_assert_eq!(normalize_title(&once, remove), once);
        }
    }
}
