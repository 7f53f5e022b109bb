//! 意图分类
//!
//! 将查询映射到封闭的类别集合。KeywordClassifier 是确定性的规则匹配：
//! 规则按固定优先级排列，取第一个命中；都不命中时落到 General（最低置信度）。
//! Classifier 是可替换的能力，日后可换成模型驱动实现而不改动循环控制流。

use serde::Serialize;

/// 意图类别（带关联数据）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum IntentKind {
    /// 需要多来源的开放式研究（比较、综述、利弊）
    BroadResearch,
    /// 针对单一事实的查找；查询中带 URL 时直接深读该页
    TargetedLookup { url: Option<String> },
    /// 不设安全过滤的内容请求
    Unrestricted,
    /// 兜底类别
    General,
}

/// 分类结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intent {
    #[serde(flatten)]
    pub kind: IntentKind,
    /// 仅用于可观测性的专家标签
    pub specialist: String,
    pub confidence: f64,
    /// 搜索步骤应请求的候选数量
    pub breadth: usize,
}

impl Intent {
    pub fn is_unrestricted(&self) -> bool {
        matches!(self.kind, IntentKind::Unrestricted)
    }
}

/// 兜底类别的置信度
pub const MIN_CONFIDENCE: f64 = 0.3;

/// 意图分类能力
pub trait Classifier: Send + Sync {
    fn classify(&self, query: &str) -> Intent;
}

const UNRESTRICTED_KEYWORDS: &[&str] = &["nsfw", "explicit", "uncensored", "unfiltered", "adult content"];

const BROAD_KEYWORDS: &[&str] = &[
    "compare",
    "comparison",
    " vs ",
    " vs. ",
    "versus",
    "research",
    "analyze",
    "analyse",
    "analysis",
    "overview",
    "pros and cons",
    "history of",
    "landscape",
    "survey",
    "trends",
    "比较",
    "对比",
    "研究",
    "分析",
];

const TARGETED_KEYWORDS: &[&str] = &[
    "what is",
    "who is",
    "who was",
    "when did",
    "when was",
    "where is",
    "define",
    "definition of",
    "price of",
    "how many",
    "how much",
    "是什么",
    "是谁",
];

/// 基于关键词集合的规则分类器
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    broad_breadth: usize,
    targeted_breadth: usize,
    default_breadth: usize,
}

impl KeywordClassifier {
    pub fn new(default_breadth: usize) -> Self {
        Self {
            broad_breadth: default_breadth.max(1) * 2,
            targeted_breadth: (default_breadth / 2).max(1),
            default_breadth: default_breadth.max(1),
        }
    }

    fn intent(&self, kind: IntentKind) -> Intent {
        let (specialist, confidence, breadth) = match &kind {
            IntentKind::Unrestricted => ("unrestricted_specialist", 0.9, self.default_breadth),
            IntentKind::TargetedLookup { url: Some(_) } => ("page_reader", 0.95, self.targeted_breadth),
            IntentKind::TargetedLookup { url: None } => ("fact_finder", 0.8, self.targeted_breadth),
            IntentKind::BroadResearch => ("research_analyst", 0.85, self.broad_breadth),
            IntentKind::General => ("generalist", MIN_CONFIDENCE, self.default_breadth),
        };
        Intent {
            kind,
            specialist: specialist.to_string(),
            confidence,
            breadth,
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(5)
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, query: &str) -> Intent {
        // 两端补空格，使 " vs " 之类的词界关键词在首尾也能命中
        let padded = format!(" {} ", query.trim().to_lowercase());
        let hit = |keywords: &[&str]| keywords.iter().any(|k| padded.contains(k));

        if hit(UNRESTRICTED_KEYWORDS) {
            return self.intent(IntentKind::Unrestricted);
        }
        if let Some(url) = extract_url(query) {
            return self.intent(IntentKind::TargetedLookup { url: Some(url) });
        }
        if hit(BROAD_KEYWORDS) {
            return self.intent(IntentKind::BroadResearch);
        }
        if hit(TARGETED_KEYWORDS) {
            return self.intent(IntentKind::TargetedLookup { url: None });
        }
        self.intent(IntentKind::General)
    }
}

/// 从文本中提取第一个 URL
pub fn extract_url(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|w| w.starts_with("http://") || w.starts_with("https://"))
        .map(|w| w.trim_end_matches(|c: char| matches!(c, ',' | '.' | ')' | ';')).to_string())
}
