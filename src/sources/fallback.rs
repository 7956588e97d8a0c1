//! Embedded literary passages (public domain, via Aozora Bunko).
//!
//! Used as an ordinary source when enabled, and by the CLI when every live
//! source has failed. Selection depends only on the date, so the same day
//! always reads the same group.
use chrono::NaiveDate;

use crate::model::{FallbackItem, Item, Section, SourceKind};

pub const ATTRIBUTION: &str = "青空文庫より";

/// One embedded passage.
#[derive(Debug, Clone, Copy)]
pub struct Passage {
    pub text: &'static str,
    pub author: &'static str,
    pub work: &'static str,
}

/// A themed set of passages read together.
#[derive(Debug, Clone, Copy)]
pub struct ReadingGroup {
    pub id: &'static str,
    pub title: &'static str,
    pub passages: &'static [Passage],
}

const fn passage(text: &'static str, author: &'static str, work: &'static str) -> Passage {
    Passage { text, author, work }
}

pub static GROUPS: [ReadingGroup; 5] = [
    ReadingGroup {
        id: "haiku_basho",
        title: "芭蕉の俳句 8選",
        passages: &[
            passage("古池や蛙飛び込む水の音", "松尾芭蕉", "俳句"),
            passage("閑さや岩にしみ入る蝉の声", "松尾芭蕉", "俳句"),
            passage("夏草や兵どもが夢の跡", "松尾芭蕉", "俳句"),
            passage("ものいへば唇寂し秋の風", "松尾芭蕉", "俳句"),
            passage("秋深き隣は何をする人ぞ", "松尾芭蕉", "俳句"),
            passage("この道や行く人なしに秋の暮", "松尾芭蕉", "俳句"),
            passage("旅に病んで夢は枯野をかけ廻る", "松尾芭蕉", "俳句"),
            passage("花の雲鐘は上野か浅草か", "松尾芭蕉", "俳句"),
        ],
    },
    ReadingGroup {
        id: "soseki",
        title: "夏目漱石 名文選",
        passages: &[
            passage(
                "智に働けば角が立つ。情に棹させば流される。意地を通せば窮屈だ。とかくに人の世は住みにくい。",
                "夏目漱石",
                "草枕",
            ),
            passage(
                "親譲りの無鉄砲で小供の時から損ばかりしている。小学校に居る時分学校の二階から飛び降りて一週間ほど腰を抜かした事がある。",
                "夏目漱石",
                "坊っちゃん",
            ),
            passage(
                "吾輩は猫である。名前はまだ無い。どこで生れたかとんと見当がつかぬ。何でも薄暗いじめじめした所でニャーニャー泣いていた事だけは記憶している。",
                "夏目漱石",
                "吾輩は猫である",
            ),
        ],
    },
    ReadingGroup {
        id: "akutagawa",
        title: "芥川龍之介 名文選",
        passages: &[
            passage(
                "ある日の暮方の事である。一人の下人が、羅生門の下で雨やみを待っていた。広い門の下には、この男のほかに誰もいない。",
                "芥川龍之介",
                "羅生門",
            ),
            passage(
                "人生は一箱のマッチに似ている。重大に扱うのは馬鹿馬鹿しい。重大に扱わねば危険である。",
                "芥川龍之介",
                "侏儒の言葉",
            ),
        ],
    },
    ReadingGroup {
        id: "miyazawa",
        title: "宮沢賢治 名文選",
        passages: &[
            passage(
                "雨ニモマケズ 風ニモマケズ 雪ニモ夏ノ暑サニモマケヌ 丈夫ナカラダヲモチ 慾ハナク 決シテ瞋ラズ イツモシヅカニワラッテヰル",
                "宮沢賢治",
                "雨ニモマケズ",
            ),
            passage(
                "なぜ、むしが光るか、おれは知らない。けれども、なんとなくわかるような気がするよ。",
                "宮沢賢治",
                "銀河鉄道の夜",
            ),
            passage(
                "風の又三郎が、ガラスのマントをひるがえして立っていました。",
                "宮沢賢治",
                "風の又三郎",
            ),
        ],
    },
    ReadingGroup {
        id: "modern",
        title: "近代文学 名場面",
        passages: &[
            passage(
                "木曾路はすべて山の中である。あるところは岨づたいに行く崖の道であり、あるところは数十間の深さに臨む木曾川の岸であり、",
                "島崎藤村",
                "夜明け前",
            ),
            passage(
                "国境の長いトンネルを抜けると雪国であった。夜の底が白くなった。信号所に汽車が止まった。",
                "川端康成",
                "雪国",
            ),
            passage(
                "恥の多い生涯を送って来ました。自分には、人間の生活というものが、見当つかないのです。",
                "太宰治",
                "人間失格",
            ),
            passage(
                "メロスは激怒した。必ず、かの邪智暴虐の王を除かなければならぬと決意した。",
                "太宰治",
                "走れメロス",
            ),
        ],
    },
];

/// The group for `date`: the sum of the `YYYY-MM-DD` string's character codes
/// modulo the number of groups.
pub fn group_for_date(date: NaiveDate) -> &'static ReadingGroup {
    let key = date.format("%Y-%m-%d").to_string();
    let hash: u32 = key.chars().map(u32::from).sum();
    &GROUPS[hash as usize % GROUPS.len()]
}

pub fn group_by_id(id: &str) -> Option<&'static ReadingGroup> {
    GROUPS.iter().find(|g| g.id == id)
}

impl ReadingGroup {
    pub fn to_section(&self) -> Section {
        let items = self
            .passages
            .iter()
            .map(|p| {
                Item::Fallback(FallbackItem {
                    text: p.text.to_string(),
                    author: p.author.to_string(),
                    work: Some(p.work.to_string()),
                })
            })
            .collect();
        Section::new(SourceKind::Fallback, self.title, items, ATTRIBUTION)
    }
}

/// The fallback section for `date`. Never fails.
pub fn reading(date: NaiveDate) -> Section {
    group_for_date(date).to_section()
}
