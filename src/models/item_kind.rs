//! 题型映射
//!
//! 按题号判断题型以及第三层校验使用的长度区间。

use serde::Serialize;

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// 听力（1-17）
    Listening,
    /// 图表（25）
    Chart,
    /// 语法（29）
    Grammar,
    /// 词汇（30）
    Vocabulary,
    /// 填空（31-34）
    Blank,
    /// 排序 / 插入（36-39）
    Ordering,
    /// 长文套题（41-45）
    LongPassage,
    /// 其他阅读题
    Reading,
}

impl ItemKind {
    /// 从题号判断题型
    pub fn from_item_no(item_no: u32) -> Self {
        match item_no {
            1..=17 => ItemKind::Listening,
            25 => ItemKind::Chart,
            29 => ItemKind::Grammar,
            30 => ItemKind::Vocabulary,
            31..=34 => ItemKind::Blank,
            36..=39 => ItemKind::Ordering,
            41..=45 => ItemKind::LongPassage,
            _ => ItemKind::Reading,
        }
    }

    /// 是否听力题
    pub fn is_listening(self) -> bool {
        matches!(self, ItemKind::Listening)
    }

    /// 地文词数区间（闭区间）
    pub fn word_bounds(self) -> (usize, usize) {
        match self {
            ItemKind::Listening => (40, 220),
            ItemKind::Chart => (60, 180),
            ItemKind::LongPassage => (220, 420),
            ItemKind::Grammar | ItemKind::Vocabulary => (100, 220),
            ItemKind::Blank | ItemKind::Ordering | ItemKind::Reading => (100, 250),
        }
    }

    /// 要求的下划线片段数量
    pub fn required_underlines(self) -> Option<usize> {
        match self {
            ItemKind::Grammar | ItemKind::Vocabulary => Some(5),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ItemKind::Listening => "listening",
            ItemKind::Chart => "chart",
            ItemKind::Grammar => "grammar",
            ItemKind::Vocabulary => "vocabulary",
            ItemKind::Blank => "blank",
            ItemKind::Ordering => "ordering",
            ItemKind::LongPassage => "long_passage",
            ItemKind::Reading => "reading",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
