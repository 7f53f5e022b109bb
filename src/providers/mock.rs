//! 内存提供方（用于测试与离线演示，无需网络）
//!
//! StaticSearchProvider 按相关度返回固定候选并记录每次请求；
//! StaticReader 按 URL 返回预置正文或预置错误。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::ProviderError;
use crate::providers::{ContentReader, Divergence, ReadContent, Reference, SearchOptions, SearchProvider};

/// 固定结果的搜索提供方
#[derive(Debug)]
pub struct StaticSearchProvider {
    results: Vec<Reference>,
    failure: Option<ProviderError>,
    requests: Mutex<Vec<(String, SearchOptions)>>,
}

impl StaticSearchProvider {
    pub fn new(results: Vec<Reference>) -> Self {
        Self {
            results,
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 每次调用都返回同一个错误
    pub fn failing(error: ProviderError) -> Self {
        Self {
            results: Vec::new(),
            failure: Some(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// 已收到的 (query, options)，按调用顺序
    pub fn requests(&self) -> Vec<(String, SearchOptions)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SearchProvider for StaticSearchProvider {
    fn name(&self) -> &str {
        "static_search"
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<Reference>, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((query.to_string(), options.clone()));
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let mut results = self.results.clone();
        results.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        results.truncate(options.breadth);
        Ok(results)
    }
}

enum Page {
    Text(String, Option<Divergence>),
    Alias(String),
    Failure(ProviderError),
}

/// 按 URL 返回预置正文的阅读提供方；未知 URL 视为不可用
#[derive(Default)]
pub struct StaticReader {
    pages: HashMap<String, Page>,
    reads: AtomicUsize,
}

impl StaticReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.pages.insert(url.into(), Page::Text(text.into(), None));
        self
    }

    pub fn with_divergent_page(
        mut self,
        url: impl Into<String>,
        text: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let divergence = Divergence {
            label: label.into(),
            description: description.into(),
        };
        self.pages
            .insert(url.into(), Page::Text(text.into(), Some(divergence)));
        self
    }

    pub fn with_failure(mut self, url: impl Into<String>, error: ProviderError) -> Self {
        self.pages.insert(url.into(), Page::Failure(error));
        self
    }

    /// 读取 url 时返回 target 的正文（模拟重定向）
    pub fn with_alias(mut self, url: impl Into<String>, target: impl Into<String>) -> Self {
        self.pages.insert(url.into(), Page::Alias(target.into()));
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn lookup(&self, url: &str) -> Result<ReadContent, ProviderError> {
        match self.pages.get(url) {
            Some(Page::Text(text, divergence)) => {
                let mut content = ReadContent::new(url, text.clone());
                content.divergence = divergence.clone();
                Ok(content)
            }
            Some(Page::Alias(target)) => match self.pages.get(target) {
                Some(Page::Alias(_)) | None => Err(ProviderError::Unavailable(format!("no page for {target}"))),
                Some(_) => self.lookup(target),
            },
            Some(Page::Failure(err)) => Err(err.clone()),
            None => Err(ProviderError::Unavailable(format!("no page for {url}"))),
        }
    }
}

#[async_trait]
impl ContentReader for StaticReader {
    fn name(&self) -> &str {
        "static_reader"
    }

    async fn read(&self, reference: &Reference) -> Result<ReadContent, ProviderError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.lookup(&reference.url)
    }
}
