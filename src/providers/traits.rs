//! 能力提供方接口：搜索与正文阅读
//!
//! 两者都是外部 I/O，可能各自独立失败；实现方只需满足这里的契约，
//! 超时与审计由 ProviderExecutor 统一处理。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::ProviderError;

/// 提供方自己标注的「分歧 / 对立观点」，合成阶段原样透传
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub label: String,
    pub description: String,
}

/// 搜索得到的候选来源（尚未阅读正文）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// 提供方给出的相关度，越高越值得深读；只在同一会话内比较
    pub relevance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divergence: Option<Divergence>,
}

impl Reference {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        snippet: impl Into<String>,
        relevance: f64,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            relevance,
            divergence: None,
        }
    }

    pub fn with_divergence(mut self, label: impl Into<String>, description: impl Into<String>) -> Self {
        self.divergence = Some(Divergence {
            label: label.into(),
            description: description.into(),
        });
        self
    }
}

/// 深读某个 Reference 得到的正文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadContent {
    pub source_url: String,
    pub text: String,
    word_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divergence: Option<Divergence>,
}

impl ReadContent {
    pub fn new(source_url: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = count_words(&text);
        Self {
            source_url: source_url.into(),
            text,
            word_count,
            divergence: None,
        }
    }

    pub fn with_divergence(mut self, label: impl Into<String>, description: impl Into<String>) -> Self {
        self.divergence = Some(Divergence {
            label: label.into(),
            description: description.into(),
        });
        self
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }
}

/// 按空白切分计词
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// 搜索参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// 期望返回的候选数量（breadth 提示）
    pub breadth: usize,
    /// 翻页序号，重规划时递增，避免重复提交完全相同的请求
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_safe_search")]
    pub safe_search: bool,
}

fn default_safe_search() -> bool {
    true
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            breadth: 5,
            page: 0,
            safe_search: true,
        }
    }
}

/// 搜索提供方：返回按相关度降序排列的有限序列；空结果是合法结果而非错误
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<Reference>, ProviderError>;
}

/// 正文阅读提供方
#[async_trait]
pub trait ContentReader: Send + Sync {
    fn name(&self) -> &str;

    async fn read(&self, reference: &Reference) -> Result<ReadContent, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_is_derived() {
        let content = ReadContent::new("https://a", "one two\nthree   four");
        assert_eq!(content.word_count(), 4);
        assert_eq!(ReadContent::new("https://a", "   ").word_count(), 0);
    }

    #[test]
    fn test_reference_divergence_serializes_only_when_present() {
        let plain = serde_json::to_value(Reference::new("u", "t", "s", 1.0)).unwrap();
        assert!(plain.get("divergence").is_none());

        let tagged = Reference::new("u", "t", "s", 1.0).with_divergence("Skeptic", "disagrees");
        let v = serde_json::to_value(tagged).unwrap();
        assert_eq!(v["divergence"]["label"], "Skeptic");
    }
}
