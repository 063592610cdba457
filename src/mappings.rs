//! Static lookup tables used by the matching steps.
//!
//! Everything here is built once per process and read-only afterwards.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

// ============================================================================
// CATALOG CODES
// ============================================================================

/// Genre label to catalog-code bucket. Both sources spell "POPS & ANIME"
/// with and without the spaces.
pub static CATALOG_CODES: Lazy<FxHashMap<&'static str, i64>> = Lazy::new(|| {
    let mut m = FxHashMap::default();
    m.insert("POPS & ANIME", 0);
    m.insert("POPS&ANIME", 0);
    m.insert("niconico", 2);
    m.insert("東方Project", 3);
    m.insert("ORIGINAL", 5);
    m.insert("VARIETY", 6);
    m.insert("イロドリミドリ", 7);
    m.insert("ゲキマイ", 9);
    m
});

/// Catalog code for a genre/category label. Unknown labels have none.
pub fn catalog_code(label: &str) -> Option<i64> {
    CATALOG_CODES.get(label).copied()
}

// ============================================================================
// MANUAL MAPPINGS
// ============================================================================

/// Override for a primary-source entry the automatic matcher cannot resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManualMapping {
    pub id: i64,
    pub catname: &'static str,
    pub title: &'static str,
    pub we_kanji: &'static str,
    pub we_star: i64,
    pub image: String,
}

/// First id of the six "Random" WORLD'S END charts (A through F).
pub const RANDOM_WE_BASE_ID: i64 = 8244;

/// chunirec hash ids and jackets of the "Random" WORLD'S END charts, A through F.
const RANDOM_WE_ENTRIES: [(&str, &str); 6] = [
    ("d8b8af2016eec2f0", "97af9ed62e768d73.jpg"),
    ("5a0bc7702113a633", "fd4a488ed2bc67d8.jpg"),
    ("948e0c4b67f4269d", "ce911dfdd8624a7c.jpg"),
    ("56e583c091b4295c", "6a3201f1b63ff9a3.jpg"),
    ("49794fec968b90ba", "d43ab766613ba19e.jpg"),
    ("b9df9d9d74b372d9", "4a359278c6108748.jpg"),
];

const RANDOM_WE_KANJI: [&str; 6] = ["分A", "分B", "分C", "分D", "分E", "分F"];

/// Overrides keyed by chunirec's internal hash id.
pub static MANUAL_MAPPINGS: Lazy<FxHashMap<&'static str, ManualMapping>> = Lazy::new(|| {
    let mut m = FxHashMap::default();

    // Titles whose WORLD'S END spelling differs between sources
    m.insert(
        "7a561ab609a0629d",
        ManualMapping {
            id: 8227,
            catname: "ORIGINAL",
            title: "Trackless wilderness",
            we_kanji: "狂",
            we_star: 7,
            image: "629be924b3383e08.jpg".to_string(),
        },
    );
    m.insert(
        "e6605126a95c4c8d",
        ManualMapping {
            id: 8228,
            catname: "ORIGINAL",
            title: "Trrricksters!!",
            we_kanji: "狂",
            we_star: 9,
            image: "7615de9e9eced518.jpg".to_string(),
        },
    );
    m.insert(
        "c2d66153dca3823f",
        ManualMapping {
            id: 8025,
            catname: "イロドリミドリ",
            title: "Help me, あーりん!",
            we_kanji: "嘘",
            we_star: 5,
            image: "c1ff8df1757fedf4.jpg".to_string(),
        },
    );
    m.insert(
        "2678230924ec08dd",
        ManualMapping {
            id: 8078,
            catname: "イロドリミドリ",
            title: "あねぺったん",
            we_kanji: "嘘",
            we_star: 7,
            image: "a6889b8a729210be.jpg".to_string(),
        },
    );
    m.insert(
        "7252bf5ea6ff6294",
        ManualMapping {
            id: 8116,
            catname: "イロドリミドリ",
            title: "イロドリミドリ杯花映塚全一決定戦公式テーマソング『ウソテイ』",
            we_kanji: "嘘",
            we_star: 7,
            image: "43bd6cbc31e4c02c.jpg".to_string(),
        },
    );

    // "Random" charts share one title and differ only by the letter suffix
    for (idx, (hash_id, image)) in RANDOM_WE_ENTRIES.iter().enumerate() {
        m.insert(
            *hash_id,
            ManualMapping {
                id: RANDOM_WE_BASE_ID + idx as i64,
                catname: "VARIETY",
                title: "Random",
                we_kanji: RANDOM_WE_KANJI[idx],
                we_star: 5,
                image: (*image).to_string(),
            },
        );
    }

    m
});

// ============================================================================
// SDVX.IN TABLES
// ============================================================================

/// sdvx.in category pages. `end` lists the WORLD'S END charts.
pub const SDVXIN_CATEGORIES: [&str; 9] = [
    "pops",
    "niconico",
    "toho",
    "variety",
    "irodorimidori",
    "gekimai",
    "original",
    "ultima",
    "end",
];

/// sdvx.in display titles (raw, before HTML unescaping) that differ from the
/// catalog title.
pub static SDVXIN_TITLE_MAPPING: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = FxHashMap::default();
    m.insert("AstroNotes.", "AstrøNotes.");
    m.insert("Athlete Killer ”Meteor”", "Athlete Killer \"Meteor\"");
    m.insert("Aventyr", "Äventyr");
    m.insert("DAZZLING SEASON", "DAZZLING♡SEASON");
    m.insert("DON`T STOP ROCKIN` ~[O_O] MIX~", "D✪N`T ST✪P R✪CKIN` ~[✪_✪] MIX~");
    m.insert("DON’T STOP ROCKIN’ ～[O_O] MIX～", "D✪N’T ST✪P R✪CKIN’ ～[✪_✪] MIX～");
    m.insert("Daydream cafe", "Daydream café");
    m.insert("ECHO-", "ECHO");
    m.insert("Excalibur", "Excalibur ～Revived resolution～");
    m.insert("Excalibur ~Revived resolution~", "Excalibur ～Revived resolution～");
    m.insert(
        "GO!GO!ラブリズム ~あーりん書類審査通過記念Ver.~",
        "GO!GO!ラブリズム♥ ~あーりん書類審査通過記念Ver.~",
    );
    m.insert("GRANDIR", "GRÄNDIR");
    m.insert("Give me Love?", "Give me Love♡");
    m.insert("GranFatalite", "GranFatalité");
    m.insert("Help,me あーりん!", "Help me, あーりん!");
    m.insert("Help,me あーりん！", "Help me, あーりん！");
    m.insert("In The Blue Sky `01", "In The Blue Sky '01");
    m.insert("In The Blue Sky ’01", "In The Blue Sky '01");
    m.insert("Jorqer", "Jörqer");
    m.insert("L'epilogue", "L'épilogue");
    m.insert("Little ”Sister” Bitch", "Little \"Sister\" Bitch");
    m.insert("Mass Destruction (''P3'' + ''P3F'' ver.)", "Mass Destruction (\"P3\" + \"P3F\" ver.)");
    m.insert("NYAN-NYA, More! ラブシャイン、Chu?", "NYAN-NYA, More! ラブシャイン、Chu♥");
    m.insert("Pump", "Pump!n");
    m.insert("Ray ?はじまりのセカイ?", "Ray ―はじまりのセカイ― (クロニクルアレンジver.)");
    m.insert("Reach for the Stars", "Reach For The Stars");
    m.insert("Session High", "Session High⤴");
    m.insert("Seyana", "Seyana. ～何でも言うことを聞いてくれるアカネチャン～");
    m.insert(
        "Seyana. ~何でも言うことを聞いてくれるアカネチャン~",
        "Seyana. ～何でも言うことを聞いてくれるアカネチャン～",
    );
    m.insert("Solstand", "Solstånd");
    m.insert("Super Lovely", "Super Lovely (Heavenly Remix)");
    m.insert("The Metaverse", "The Metaverse -First story of the SeelischTact-");
    m.insert("Walzer fur das Nichts", "Walzer für das Nichts");
    m.insert("Yet Another ''drizzly rain''", "Yet Another ”drizzly rain”");
    m.insert("ouroboros", "ouroboros -twin stroke of the end-");
    m.insert("”STAR”T", "\"STAR\"T");
    m.insert("まっすぐ→→→ストリーム!", "まっすぐ→→→ストリーム！");
    m.insert("めいど・うぃず・どらごんず", "めいど・うぃず・どらごんず♥");
    m.insert("ウソテイ", "イロドリミドリ杯花映塚全一決定戦公式テーマソング『ウソテイ』");
    m.insert("キュアリアス光吉古牌\u{3000}-祭-", "キュアリアス光吉古牌\u{3000}－祭－");
    m.insert("キュアリアス光吉古牌\u{3000}?祭?", "キュアリアス光吉古牌\u{3000}－祭－");
    m.insert("チルノおかん", "チルノおかんのさいきょう☆バイブスごはん");
    m.insert(
        "ナイト・オブ・ナイツ (かめりあ`s“",
        "ナイト・オブ・ナイツ (かめりあ`s“ワンス・アポン・ア・ナイト”Remix)",
    );
    m.insert(
        "ナイト・オブ・ナイツ (かめりあ’s“",
        "ナイト・オブ・ナイツ (かめりあ’s“ワンス・アポン・ア・ナイト”Remix)",
    );
    m.insert(
        "ラブって?ジュエリー♪えんじぇる☆ブレイク!!",
        "ラブって♡ジュエリー♪えんじぇる☆ブレイク!!",
    );
    m.insert(
        "ラブって?ジュエリー♪えんじぇる☆ブレイク！！",
        "ラブって♡ジュエリー♪えんじぇる☆ブレイク！！",
    );
    m.insert("一世嬉遊曲", "一世嬉遊曲‐ディヴェルティメント‐");
    m.insert("一世嬉遊曲-ディヴェルティメント-", "一世嬉遊曲‐ディヴェルティメント‐");
    m.insert(
        "今ぞ崇め奉れ☆オマエらよ!!~姫の秘メタル渇望~",
        "今ぞ♡崇め奉れ☆オマエらよ!!~姫の秘メタル渇望~",
    );
    m.insert(
        "今ぞ崇め奉れ☆オマエらよ！！～姫の秘メタル渇望～",
        "今ぞ♡崇め奉れ☆オマエらよ！！～姫の秘メタル渇望～",
    );
    m.insert("光線チューニング~なずな", "光線チューニング ~なずな妄想海フェスイメージトレーニングVer.~");
    m.insert("光線チューニング～なずな", "光線チューニング ～なずな妄想海フェスイメージトレーニングVer.～");
    m.insert("多重未来のカルテット", "多重未来のカルテット -Quartet Theme-");
    m.insert("失礼しますが、RIP", "失礼しますが、RIP♡");
    m.insert("崩壊歌姫", "崩壊歌姫 -disruptive diva-");
    m.insert("男装女形表裏一体発狂小娘", "男装女形表裏一体発狂小娘の詐称疑惑と苦悩と情熱。");
    m.insert("砂漠のハンティングガール", "砂漠のハンティングガール♡");
    m.insert(
        "私の中の幻想的世界観",
        "私の中の幻想的世界観及びその顕現を想起させたある現実での出来事に関する一考察",
    );
    m.insert("萌豚功夫大乱舞", "萌豚♥功夫♥大乱舞");
    m.insert(
        "ＧＯ！ＧＯ！ラブリズム ～あーりん書類審査通過記念Ver.～",
        "ＧＯ！ＧＯ！ラブリズム♥ ～あーりん書類審査通過記念Ver.～",
    );
    m
});
