use std::collections::HashSet;

use anyhow::{Result, bail};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 词汇类别
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    #[schemars(title = "动作指令")]
    #[serde(rename = "command")]
    Command,
    #[schemars(title = "控制条件")]
    #[serde(rename = "condition")]
    Condition,
}

/// 词汇条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyEntry {
    pub phrase: String,
    pub kind: EntryKind,
}

/// 流程图相关词汇
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone)]
pub struct VocabularyWord {
    #[schemars(title = "未识别到文字时的占位文本")]
    pub no_text: String,
}

/// 流程图词汇表
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone)]
pub struct Vocabulary {
    #[schemars(title = "动作指令(按声明顺序匹配)")]
    commands: Vec<String>,
    #[schemars(title = "控制条件(按声明顺序匹配)")]
    conditions: Vec<String>,
    #[schemars(title = "流程图词汇")]
    pub words: VocabularyWord,
    #[serde(skip)]
    entries: Vec<VocabularyEntry>,
}

impl Vocabulary {
    /// 加载解析内置词汇表文件
    pub fn new() -> Result<Self> {
        Self::from_yaml(include_str!("../vocabulary.yaml"))
    }

    /// 从 YAML 文本解析词汇表
    ///
    /// # 参数
    ///
    /// * `yaml` - 词汇表内容
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut vocabulary: Vocabulary = serde_yaml::from_str(yaml)?;
        vocabulary.validate()?;

        let commands = vocabulary.commands.iter().map(|phrase| VocabularyEntry {
            phrase: phrase.clone(),
            kind: EntryKind::Command,
        });
        let conditions = vocabulary.conditions.iter().map(|phrase| VocabularyEntry {
            phrase: phrase.clone(),
            kind: EntryKind::Condition,
        });
        vocabulary.entries = commands.chain(conditions).collect();

        debug!(
            "词汇表加载成功, 动作指令 {} 个, 控制条件 {} 个",
            vocabulary.commands.len(),
            vocabulary.conditions.len()
        );
        Ok(vocabulary)
    }

    /// 校验词汇表内容
    fn validate(&self) -> Result<()> {
        if self.commands.is_empty() || self.conditions.is_empty() {
            bail!("词汇表的动作指令与控制条件均不能为空");
        }

        let mut seen = HashSet::new();
        for phrase in self.commands.iter().chain(self.conditions.iter()) {
            if phrase.is_empty() || phrase.trim() != phrase || phrase.to_lowercase() != *phrase {
                bail!("词汇 \"{}\" 必须为去除首尾空白的小写文本", phrase);
            }
            if !seen.insert(phrase.as_str()) {
                bail!("词汇 \"{}\" 重复声明", phrase);
            }
        }

        if self.words.no_text.trim().is_empty() {
            bail!("未识别到文字时的占位文本不能为空");
        }
        Ok(())
    }

    /// 所有动作指令, 按声明顺序
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// 所有控制条件, 按声明顺序
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    /// 所有词汇条目, 动作指令在前, 控制条件在后
    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    /// 指定类别的词汇条目, 按声明顺序
    ///
    /// # 参数
    ///
    /// * `kind` - 词汇类别
    pub fn entries_of(&self, kind: EntryKind) -> impl Iterator<Item = &VocabularyEntry> {
        self.entries.iter().filter(move |entry| entry.kind == kind)
    }

    /// 通过短语查找词汇条目
    ///
    /// # 参数
    ///
    /// * `phrase` - 词汇短语
    pub fn find(&self, phrase: &str) -> Option<&VocabularyEntry> {
        self.entries.iter().find(|entry| entry.phrase == phrase)
    }
}
