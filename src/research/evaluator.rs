//! Evaluator：根据累计的 Context Store 给出满意度与缺失信息
//!
//! WordCountEvaluator 是占位型评判：只看累计词数（以及是否有任何来源），按阈值分档。
//! 循环只依赖 Evaluator trait 的契约，日后可替换为基于 LLM 的评判。

use async_trait::async_trait;
use serde::Serialize;

use crate::core::ResearchError;
use crate::research::ContextStore;

/// 满意度达到此值即停止迭代
pub const SATISFACTION_THRESHOLD: f64 = 0.85;
/// 低于此词数视为内容不足
pub const LOW_WORD_THRESHOLD: usize = 500;
/// 达到此词数视为充分
pub const HIGH_WORD_THRESHOLD: usize = 1000;

pub const EMPTY_SCORE: f64 = 0.0;
pub const LOW_SCORE: f64 = 0.3;
pub const MEDIUM_SCORE: f64 = 0.6;
pub const HIGH_SCORE: f64 = 0.9;

/// 单轮评估结论；被循环立即消费，不保留
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Audit {
    /// [0, 1]
    pub satisfaction: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_info: Option<String>,
}

impl Audit {
    pub fn is_satisfied(&self, threshold: f64) -> bool {
        self.satisfaction >= threshold
    }
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, store: &ContextStore) -> Result<Audit, ResearchError>;
}

/// 词数阈值与各档分数（对应配置 [evaluator]）
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorThresholds {
    pub low_words: usize,
    pub high_words: usize,
    pub empty_score: f64,
    pub low_score: f64,
    pub medium_score: f64,
    pub high_score: f64,
}

impl Default for EvaluatorThresholds {
    fn default() -> Self {
        Self {
            low_words: LOW_WORD_THRESHOLD,
            high_words: HIGH_WORD_THRESHOLD,
            empty_score: EMPTY_SCORE,
            low_score: LOW_SCORE,
            medium_score: MEDIUM_SCORE,
            high_score: HIGH_SCORE,
        }
    }
}

impl EvaluatorThresholds {
    /// 分数必须落在 [0, 1] 且随档位单调不减，词数阈值有序
    pub fn validate(&self) -> Result<(), ResearchError> {
        let scores = [self.empty_score, self.low_score, self.medium_score, self.high_score];
        if scores.iter().any(|s| !(0.0..=1.0).contains(s)) {
            return Err(ResearchError::Config("evaluator scores must be within [0, 1]".to_string()));
        }
        if scores.windows(2).any(|w| w[0] > w[1]) {
            return Err(ResearchError::Config("evaluator scores must be non-decreasing".to_string()));
        }
        if self.low_words > self.high_words {
            return Err(ResearchError::Config("evaluator low_words must not exceed high_words".to_string()));
        }
        Ok(())
    }
}

/// 纯函数式评估：无副作用、无 I/O
#[derive(Debug, Clone, Default)]
pub struct WordCountEvaluator {
    thresholds: EvaluatorThresholds,
}

impl WordCountEvaluator {
    pub fn new(thresholds: EvaluatorThresholds) -> Result<Self, ResearchError> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn audit(&self, store: &ContextStore) -> Audit {
        let t = &self.thresholds;
        let words = store.total_word_count();
        let sources = store.source_count();

        if words >= t.high_words {
            return Audit {
                satisfaction: t.high_score,
                missing_info: None,
            };
        }
        if words >= t.low_words {
            return Audit {
                satisfaction: t.medium_score,
                missing_info: Some(format!(
                    "Need more detail: {} words from {} sources, want at least {}",
                    words, sources, t.high_words
                )),
            };
        }
        let satisfaction = if sources == 0 { t.empty_score } else { t.low_score };
        Audit {
            satisfaction,
            missing_info: Some(format!(
                "Search yielded insufficient content: {} words from {} sources",
                words, sources
            )),
        }
    }
}

#[async_trait]
impl Evaluator for WordCountEvaluator {
    async fn evaluate(&self, store: &ContextStore) -> Result<Audit, ResearchError> {
        Ok(self.audit(store))
    }
}
