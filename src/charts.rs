//! Chart records derived from a resolved song.

use crate::models::{Chart, ChunirecDifficulty, CommunitySheet, CommunitySong, Difficulty};

/// Levels at or below this carry no separate constant upstream.
const LOW_LEVEL_CEILING: f64 = 9.5;

/// Glyph appended to WORLD'S END levels.
pub const WE_STAR: char = '☆';

/// Display string for a numeric level: `13.5` → `13+`, `9.0` → `9`.
pub fn format_level(level: f64) -> String {
    let whole = level.trunc();
    let fraction = level - whole;
    if fraction == 0.0 {
        format!("{whole:.0}")
    } else if fraction == 0.5 {
        format!("{whole:.0}+")
    } else {
        level.to_string()
    }
}

/// Most star glyphs a WORLD'S END level carries. Larger upstream values are
/// clamped.
pub const MAX_WE_STARS: usize = 5;

/// Number of star glyphs for a WORLD'S END star count: one per two points,
/// counting from -1 (`-1` → 0, `1` → 1, `5` → 3, `7` → 4).
pub fn we_star_count(stars: i64) -> usize {
    if stars < -1 {
        return 0;
    }
    let count = stars.saturating_add(2) / 2;
    usize::try_from(count).map_or(MAX_WE_STARS, |count| count.min(MAX_WE_STARS))
}

/// WORLD'S END level string: the tag followed by its star glyphs.
pub fn we_level(tag: &str, stars: i64) -> String {
    let mut level = tag.to_string();
    level.extend(std::iter::repeat(WE_STAR).take(we_star_count(stars)));
    level
}

fn null_if_zero(value: Option<i64>) -> Option<i64> {
    value.filter(|&v| v != 0)
}

/// Chart for one standard difficulty of a primary-source song.
pub fn build_standard_chart(
    song_id: i64,
    difficulty: Difficulty,
    source: &ChunirecDifficulty,
    community: Option<&CommunitySong>,
) -> Chart {
    let (constant, unknown) = if source.level > 0.0 && source.level <= LOW_LEVEL_CEILING {
        (source.level, false)
    } else {
        (source.constant, source.is_const_unknown == 1)
    };

    let mut chart = Chart::new(song_id, difficulty, format_level(source.level));
    chart.constant = (!unknown).then_some(constant);
    chart.maxcombo = null_if_zero(source.maxcombo);

    if let Some(sheet) = community.and_then(|song| find_sheet(song, difficulty)) {
        apply_sheet(&mut chart, sheet);
    }
    chart
}

/// WORLD'S END chart. Never carries a constant.
pub fn build_we_chart(song_id: i64, tag: &str, stars: i64, source: &ChunirecDifficulty) -> Chart {
    let mut chart = Chart::new(song_id, Difficulty::WorldsEnd, we_level(tag, stars));
    chart.maxcombo = null_if_zero(source.maxcombo);
    chart
}

/// Community sheet for a difficulty, matched on the first three letters of
/// its label.
pub fn find_sheet(song: &CommunitySong, difficulty: Difficulty) -> Option<&CommunitySheet> {
    song.sheets
        .iter()
        .find(|sheet| difficulty.matches_label(&sheet.difficulty))
}

/// Copy the charter and note counts of a community sheet onto a chart.
///
/// Note counts are all-or-nothing: if tap, hold, slide or air is missing the
/// chart keeps no counts at all. A missing flick count is stored as 0.
pub fn apply_sheet(chart: &mut Chart, sheet: &CommunitySheet) {
    chart.charter = sheet
        .note_designer
        .clone()
        .filter(|designer| designer != "-");

    let counts = &sheet.note_counts;
    let (Some(tap), Some(hold), Some(slide), Some(air)) =
        (counts.tap, counts.hold, counts.slide, counts.air)
    else {
        return;
    };
    let flick = counts.flick.unwrap_or(0);

    chart.tap = Some(tap);
    chart.hold = Some(hold);
    chart.slide = Some(slide);
    chart.air = Some(air);
    chart.flick = Some(flick);
    if chart.maxcombo.is_none() {
        chart.maxcombo = Some(tap + hold + slide + air + flick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NoteCounts;

    fn difficulty(level: f64, constant: f64, maxcombo: i64, unknown: bool) -> ChunirecDifficulty {
        ChunirecDifficulty {
            level,
            constant,
            maxcombo: Some(maxcombo),
            is_const_unknown: i64::from(unknown),
        }
    }

    fn sheet(label: &str, designer: Option<&str>, counts: NoteCounts) -> CommunitySheet {
        CommunitySheet {
            difficulty: label.to_string(),
            level: None,
            level_value: None,
            internal_level: None,
            internal_level_value: None,
            note_designer: designer.map(str::to_string),
            note_counts: counts,
        }
    }

    fn counts(tap: Option<i64>, hold: Option<i64>, slide: Option<i64>, air: Option<i64>, flick: Option<i64>) -> NoteCounts {
        NoteCounts {
            tap,
            hold,
            slide,
            air,
            flick,
            total: None,
        }
    }

    fn community(sheets: Vec<CommunitySheet>) -> CommunitySong {
        CommunitySong {
            title: "Foo".to_string(),
            image_name: None,
            bpm: None,
            sheets,
        }
    }

    #[test]
    fn test_format_level() {
        assert_eq!(format_level(7.5), "7+");
        assert_eq!(format_level(9.0), "9");
        assert_eq!(format_level(3.0), "3");
        assert_eq!(format_level(13.5), "13+");
        assert_eq!(format_level(15.0), "15");
    }

    #[test]
    fn test_we_star_count() {
        assert_eq!(we_star_count(-1), 0);
        assert_eq!(we_star_count(0), 1);
        assert_eq!(we_star_count(1), 1);
        assert_eq!(we_star_count(5), 3);
        assert_eq!(we_star_count(7), 4);
        assert_eq!(we_star_count(9), 5);
        assert_eq!(we_level("狂", 7), "狂☆☆☆☆");
        assert_eq!(we_level("分A", 5), "分A☆☆☆");
    }

    #[test]
    fn test_we_star_count_out_of_range() {
        assert_eq!(we_star_count(-2), 0);
        assert_eq!(we_star_count(i64::MIN), 0);
        assert_eq!(we_star_count(9_999_999_999), MAX_WE_STARS);
        assert_eq!(we_star_count(i64::MAX), MAX_WE_STARS);
        assert_eq!(we_level("狂", i64::MAX).chars().count(), 1 + MAX_WE_STARS);
    }

    #[test]
    fn test_low_level_constant_is_level() {
        // Unknown flag and bogus constant are ignored at this tier
        let chart = build_standard_chart(1, Difficulty::Basic, &difficulty(7.5, 0.0, 500, true), None);
        assert_eq!(chart.level, "7+");
        assert_eq!(chart.constant, Some(7.5));
    }

    #[test]
    fn test_unknown_constant_is_null() {
        let chart = build_standard_chart(1, Difficulty::Master, &difficulty(14.0, 14.0, 2000, true), None);
        assert_eq!(chart.level, "14");
        assert_eq!(chart.constant, None);

        let known = build_standard_chart(1, Difficulty::Master, &difficulty(13.5, 13.7, 2000, false), None);
        assert_eq!(known.level, "13+");
        assert_eq!(known.constant, Some(13.7));
    }

    #[test]
    fn test_zero_maxcombo_is_null() {
        let chart = build_standard_chart(1, Difficulty::Expert, &difficulty(12.0, 12.2, 0, false), None);
        assert_eq!(chart.maxcombo, None);
    }

    #[test]
    fn test_sheet_applies_counts_and_derives_maxcombo() {
        let song = community(vec![
            sheet("expert", Some("someone"), counts(Some(1), Some(1), Some(1), Some(1), Some(1))),
            sheet("master", Some("ロシェ@ペンギン"), counts(Some(1000), Some(100), Some(50), Some(200), None)),
        ]);
        let chart = build_standard_chart(1, Difficulty::Master, &difficulty(13.5, 13.5, 0, false), Some(&song));
        assert_eq!(chart.charter.as_deref(), Some("ロシェ@ペンギン"));
        assert_eq!(chart.tap, Some(1000));
        assert_eq!(chart.flick, Some(0));
        assert_eq!(chart.maxcombo, Some(1350));
    }

    #[test]
    fn test_sheet_keeps_upstream_maxcombo() {
        let song = community(vec![sheet("master", None, counts(Some(1), Some(2), Some(3), Some(4), Some(5)))]);
        let chart = build_standard_chart(1, Difficulty::Master, &difficulty(13.0, 13.0, 2222, false), Some(&song));
        assert_eq!(chart.maxcombo, Some(2222));
        assert_eq!(chart.charter, None);
    }

    #[test]
    fn test_incomplete_counts_are_discarded() {
        let song = community(vec![sheet("master", Some("-"), counts(Some(1000), Some(100), None, Some(200), Some(3)))]);
        let chart = build_standard_chart(1, Difficulty::Master, &difficulty(13.0, 13.0, 0, false), Some(&song));
        assert_eq!(chart.charter, None);
        assert_eq!((chart.tap, chart.hold, chart.slide, chart.air, chart.flick), (None, None, None, None, None));
        assert_eq!(chart.maxcombo, None);
    }

    #[test]
    fn test_sheet_label_is_case_insensitive() {
        let song = community(vec![sheet("ULTIMA", Some("x"), counts(Some(1), Some(1), Some(1), Some(1), None))]);
        assert!(find_sheet(&song, Difficulty::Ultima).is_some());
        assert!(find_sheet(&song, Difficulty::Master).is_none());
    }

    #[test]
    fn test_we_chart() {
        let chart = build_we_chart(8227, "狂", 7, &difficulty(0.0, 0.0, 1800, false));
        assert_eq!(chart.difficulty, Difficulty::WorldsEnd);
        assert_eq!(chart.level, "狂☆☆☆☆");
        assert_eq!(chart.constant, None);
        assert_eq!(chart.maxcombo, Some(1800));
    }
}
