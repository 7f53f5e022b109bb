//! Context Store：单次会话内只追加的情报累积结构
//!
//! 条目按摄入顺序保存（Reference / ReadContent 两类）；total_word_count 与 source_count 增量维护。
//! 引用完整性：ReadContent 的 source_url 必须对应本会话中已摄入的 Reference。

use std::collections::HashSet;

use serde::Serialize;

use crate::core::ContextError;
use crate::providers::{Divergence, ReadContent, Reference};

/// 已摄入条目（按类型打标签）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestedItem {
    Reference(Reference),
    Content(ReadContent),
}

impl IngestedItem {
    pub fn url(&self) -> &str {
        match self {
            IngestedItem::Reference(r) => &r.url,
            IngestedItem::Content(c) => &c.source_url,
        }
    }

    pub fn divergence(&self) -> Option<&Divergence> {
        match self {
            IngestedItem::Reference(r) => r.divergence.as_ref(),
            IngestedItem::Content(c) => c.divergence.as_ref(),
        }
    }
}

/// 一次批量摄入的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: usize,
    /// 被拒绝的孤儿正文的 source_url
    pub rejected: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ContextStore {
    items: Vec<IngestedItem>,
    reference_urls: HashSet<String>,
    read_urls: HashSet<String>,
    total_word_count: usize,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest_reference(&mut self, reference: Reference) {
        self.reference_urls.insert(reference.url.clone());
        self.items.push(IngestedItem::Reference(reference));
    }

    pub fn ingest_content(&mut self, content: ReadContent) -> Result<(), ContextError> {
        if !self.has_reference(&content.source_url) {
            return Err(ContextError::OrphanedContent {
                source_url: content.source_url,
            });
        }
        self.total_word_count += content.word_count();
        self.read_urls.insert(content.source_url.clone());
        self.items.push(IngestedItem::Content(content));
        Ok(())
    }

    /// 按顺序摄入一整轮的缓冲；孤儿正文被跳过并记入报告，不影响其余条目
    pub fn ingest_batch(&mut self, batch: Vec<IngestedItem>) -> IngestReport {
        let mut report = IngestReport::default();
        for item in batch {
            match item {
                IngestedItem::Reference(r) => {
                    self.ingest_reference(r);
                    report.accepted += 1;
                }
                IngestedItem::Content(c) => match self.ingest_content(c) {
                    Ok(()) => report.accepted += 1,
                    Err(ContextError::OrphanedContent { source_url }) => {
                        tracing::warn!(url = %source_url, "rejecting orphaned content");
                        report.rejected.push(source_url);
                    }
                },
            }
        }
        report
    }

    pub fn items(&self) -> &[IngestedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 已读正文的累计词数
    pub fn total_word_count(&self) -> usize {
        self.total_word_count
    }

    /// 不同来源（URL）的数量；已读 URL 必然已有 Reference
    pub fn source_count(&self) -> usize {
        self.reference_urls.len()
    }

    pub fn has_reference(&self, url: &str) -> bool {
        self.reference_urls.contains(url)
    }

    pub fn has_read(&self, url: &str) -> bool {
        self.read_urls.contains(url)
    }

    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.items.iter().filter_map(|i| match i {
            IngestedItem::Reference(r) => Some(r),
            IngestedItem::Content(_) => None,
        })
    }

    pub fn contents(&self) -> impl Iterator<Item = &ReadContent> {
        self.items.iter().filter_map(|i| match i {
            IngestedItem::Content(c) => Some(c),
            IngestedItem::Reference(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_orphaned_content_rejected() {
        let mut store = ContextStore::new();
        let err = store
            .ingest_content(ReadContent::new("https://x", "hello"))
            .unwrap_err();
        assert_eq!(
            err,
            ContextError::OrphanedContent {
                source_url: "https://x".to_string()
            }
        );
        assert!(store.is_empty());
        assert_eq!(store.total_word_count(), 0);

        store.ingest_reference(Reference::new("https://x", "X", "", 1.0));
        assert!(store.ingest_content(ReadContent::new("https://x", "hello")).is_ok());
        assert!(store.has_read("https://x"));
    }

    #[test]
    fn test_word_count_monotonic() {
        let mut store = ContextStore::new();
        let mut last = 0;
        for i in 0..5 {
            let url = format!("https://s{i}");
            store.ingest_reference(Reference::new(url.clone(), "", "", 1.0));
            store.ingest_content(ReadContent::new(url, words(i * 10))).unwrap();
            assert!(store.total_word_count() >= last);
            last = store.total_word_count();
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn test_batch_keeps_order_and_reports_orphans() {
        let mut store = ContextStore::new();
        let report = store.ingest_batch(vec![
            IngestedItem::Reference(Reference::new("https://a", "A", "", 2.0)),
            IngestedItem::Content(ReadContent::new("https://a", words(3))),
            IngestedItem::Content(ReadContent::new("https://ghost", words(50))),
        ]);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected, vec!["https://ghost".to_string()]);
        assert!(store.has_reference("https://a"));
        assert!(!store.has_reference("https://ghost"));
        assert_eq!(store.total_word_count(), 3);
        let urls: Vec<_> = store.items().iter().map(|i| i.url()).collect();
        assert_eq!(urls, vec!["https://a", "https://a"]);
    }

    #[test]
    fn test_source_count_is_distinct() {
        let mut store = ContextStore::new();
        store.ingest_reference(Reference::new("https://a", "", "", 1.0));
        store.ingest_reference(Reference::new("https://a", "", "", 1.0));
        store.ingest_reference(Reference::new("https://b", "", "", 0.5));
        store.ingest_content(ReadContent::new("https://a", "text")).unwrap();
        assert_eq!(store.source_count(), 2);
        assert_eq!(store.references().count(), 3);
        assert_eq!(store.contents().count(), 1);
    }
}
