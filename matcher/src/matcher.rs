use metadata::{EntryKind, Vocabulary, VocabularyEntry};
use tracing::debug;

use crate::sequence::get_close_matches;

/// 模糊匹配最低相似度
pub const FUZZY_CUTOFF: f64 = 0.6;

/// 归一化识别文字: 去除首尾空白并转为小写
///
/// # 参数
///
/// * `text` - 识别文字
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// 文字与词汇匹配器
pub struct Matcher<'a> {
    vocabulary: &'a Vocabulary,
    no_text: String,
    candidates: Vec<&'a str>,
}

impl<'a> Matcher<'a> {
    /// 创建匹配器
    ///
    /// # 参数
    ///
    /// * `vocabulary` - 词汇表
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        let candidates = vocabulary
            .entries()
            .iter()
            .map(|entry| entry.phrase.as_str())
            .collect();
        Self {
            vocabulary,
            no_text: normalize(&vocabulary.words.no_text),
            candidates,
        }
    }

    /// 文字是否为"未识别到文字"占位文本, 忽略大小写与首尾空白
    ///
    /// # 参数
    ///
    /// * `text` - 识别文字
    pub fn is_no_text(&self, text: &str) -> bool {
        normalize(text) == self.no_text
    }

    /// 在指定类别中查找被文字包含的第一个词汇
    fn find_contained(&self, normalized: &str, kind: EntryKind) -> Option<&'a VocabularyEntry> {
        self.vocabulary
            .entries_of(kind)
            .find(|entry| normalized.contains(entry.phrase.as_str()))
    }

    /// 匹配识别文字对应的指令或条件
    ///
    /// 优先级: 动作指令包含匹配 > 控制条件包含匹配 > 整体模糊匹配
    ///
    /// # 参数
    ///
    /// * `text` - 识别文字
    pub fn match_text(&self, text: &str) -> Option<&'a VocabularyEntry> {
        let normalized = normalize(text);
        if normalized == self.no_text {
            return None;
        }

        if let Some(entry) = self
            .find_contained(&normalized, EntryKind::Command)
            .or_else(|| self.find_contained(&normalized, EntryKind::Condition))
        {
            debug!("文字 {:?} 包含词汇: {}", normalized, entry.phrase);
            return Some(entry);
        }

        let closest = get_close_matches(&normalized, &self.candidates, 1, FUZZY_CUTOFF);
        let entry = closest
            .first()
            .and_then(|phrase| self.vocabulary.find(phrase));
        match entry {
            Some(entry) => debug!("文字 {:?} 模糊匹配词汇: {}", normalized, entry.phrase),
            None => debug!("文字 {:?} 未匹配到任何词汇", normalized),
        }
        entry
    }
}
