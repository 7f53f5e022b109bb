//! 研究会话错误类型
//!
//! 分两层：ProviderError 在单步内被吞掉（记录日志后继续），ResearchError 会终止整个会话。

use thiserror::Error;

/// 会话级错误：输入非法、引擎内部故障、配置错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResearchError {
    /// 查询为空等，在循环开始前拒绝
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 规划 / 评估 / 合成阶段的意外错误，会话直接放弃
    #[error("Engine failure: {0}")]
    EngineFailure(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// 能力提供方（搜索 / 阅读）错误；在 Executing 阶段按步恢复，不向外传播
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// 付费墙、二进制内容等无法抽取正文
    #[error("Content unreadable: {0}")]
    ContentUnreadable(String),

    #[error("Provider timeout: {0}")]
    Timeout(String),
}

impl ProviderError {
    /// 审计日志里的 outcome 字段
    pub fn outcome(&self) -> &'static str {
        match self {
            ProviderError::Unavailable(_) => "unavailable",
            ProviderError::ContentUnreadable(_) => "unreadable",
            ProviderError::Timeout(_) => "timeout",
        }
    }
}

/// Context Store 的引用完整性错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Orphaned content: no reference ingested for {source_url}")]
    OrphanedContent { source_url: String },
}

impl From<ContextError> for ResearchError {
    fn from(e: ContextError) -> Self {
        ResearchError::EngineFailure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_outcome() {
        assert_eq!(ProviderError::Timeout("search".into()).outcome(), "timeout");
        assert_eq!(
            ProviderError::ContentUnreadable("paywall".into()).outcome(),
            "unreadable"
        );
    }

    #[test]
    fn test_context_error_converts_to_engine_failure() {
        let err: ResearchError = ContextError::OrphanedContent {
            source_url: "https://a".into(),
        }
        .into();
        assert!(matches!(err, ResearchError::EngineFailure(msg) if msg.contains("https://a")));
    }
}
