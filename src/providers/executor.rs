//! 提供方执行器
//!
//! 持有搜索与阅读提供方以及单次调用超时；每次调用在超时内执行，
//! 超时转为 ProviderError::Timeout，并输出结构化审计日志（JSON）。

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::ProviderError;
use crate::providers::{ContentReader, ReadContent, Reference, SearchOptions, SearchProvider};

/// 对每次提供方调用施加独立超时
pub struct ProviderExecutor {
    search: Arc<dyn SearchProvider>,
    reader: Arc<dyn ContentReader>,
    timeout: Duration,
}

impl ProviderExecutor {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        reader: Arc<dyn ContentReader>,
        timeout: Duration,
    ) -> Self {
        Self {
            search,
            reader,
            timeout,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Reference>, ProviderError> {
        let name = self.search.name().to_string();
        self.audited(&name, query, self.search.search(query, options))
            .await
    }

    pub async fn read(&self, reference: &Reference) -> Result<ReadContent, ProviderError> {
        let name = self.reader.name().to_string();
        let mut content = self
            .audited(&name, &reference.url, self.reader.read(reference))
            .await?;
        // 阅读结果的出处始终以被读的 Reference 为准
        if content.source_url != reference.url {
            tracing::debug!(
                reported = %content.source_url,
                url = %reference.url,
                "reader reported a different source url, keeping reference url"
            );
            content.source_url = reference.url.clone();
        }
        Ok(content)
    }

    async fn audited<T>(
        &self,
        provider: &str,
        target: &str,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        let start = Instant::now();
        let result = match timeout(self.timeout, call).await {
            Ok(r) => r,
            Err(_) => Err(ProviderError::Timeout(format!(
                "{} exceeded {}ms",
                provider,
                self.timeout.as_millis()
            ))),
        };

        let (ok, outcome) = match &result {
            Ok(_) => (true, "ok"),
            Err(e) => (false, e.outcome()),
        };
        let audit = serde_json::json!({
            "event": "provider_audit",
            "provider": provider,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "target_preview": target_preview(target),
        });
        tracing::info!(audit = %audit.to_string(), "provider");

        result
    }
}

fn target_preview(target: &str) -> String {
    if target.chars().count() > 120 {
        format!("{}...", target.chars().take(120).collect::<String>())
    } else {
        target.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{StaticReader, StaticSearchProvider};
    use async_trait::async_trait;

    struct SlowSearch;

    #[async_trait]
    impl SearchProvider for SlowSearch {
        fn name(&self) -> &str {
            "slow"
        }

        async fn search(&self, _query: &str, _options: &SearchOptions) -> Result<Vec<Reference>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_timeout_maps_to_provider_timeout() {
        let exec = ProviderExecutor::new(
            Arc::new(SlowSearch),
            Arc::new(StaticReader::new()),
            Duration::from_millis(20),
        );
        let err = exec.search("q", &SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_read_pins_source_url_to_reference() {
        let reader = StaticReader::new().with_page("https://other", "some text here");
        let exec = ProviderExecutor::new(
            Arc::new(StaticSearchProvider::new(vec![])),
            Arc::new(reader.with_alias("https://a", "https://other")),
            Duration::from_secs(1),
        );
        let content = exec
            .read(&Reference::new("https://a", "A", "", 1.0))
            .await
            .unwrap();
        assert_eq!(content.source_url, "https://a");
        assert_eq!(content.word_count(), 3);
    }

    #[test]
    fn test_target_preview_truncates() {
        let long = "x".repeat(300);
        assert!(target_preview(&long).ends_with("..."));
        assert_eq!(target_preview("short"), "short");
    }
}
