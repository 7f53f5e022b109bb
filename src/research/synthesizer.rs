//! Synthesizer：把最终的 Context Store 转为答案结构
//!
//! 给定相同的 Store 内容结果完全确定。sources 取相关度最高的前 N 个不同 URL；
//! alternatives 只透传提供方自行标注为分歧的条目，不做矛盾检测。

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::providers::Reference;
use crate::research::ContextStore;

/// 每个来源在答案中摘录的最大词数
const EXCERPT_WORDS: usize = 40;

/// 分歧 / 对立观点
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alternative {
    pub label: String,
    pub description: String,
    pub source_url: String,
}

/// 会话的最终输出
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisResult {
    pub query: String,
    pub answer: String,
    pub sources: Vec<Reference>,
    pub alternatives: Vec<Alternative>,
    pub confidence: f64,
    pub source_count: usize,
    pub word_count: usize,
}

#[derive(Debug, Clone)]
pub struct Synthesizer {
    top_n: usize,
}

impl Synthesizer {
    pub fn new(top_n: usize) -> Self {
        Self { top_n: top_n.max(1) }
    }

    /// satisfaction 为最后一次评估的满意度，直接作为 confidence
    pub fn synthesize(&self, query: &str, store: &ContextStore, satisfaction: f64) -> SynthesisResult {
        let sources = self.top_sources(store);
        let alternatives = collect_alternatives(store);
        let confidence = satisfaction.clamp(0.0, 1.0);

        let answer = if store.source_count() == 0 {
            format!("No information found for \"{}\".", query.trim())
        } else {
            compose_answer(query, store, &sources)
        };

        SynthesisResult {
            query: query.trim().to_string(),
            answer,
            sources,
            alternatives,
            confidence,
            source_count: store.source_count(),
            word_count: store.total_word_count(),
        }
    }

    /// 按 URL 去重（保留最高相关度），相关度降序，同分按首次摄入顺序
    fn top_sources(&self, store: &ContextStore) -> Vec<Reference> {
        let mut best: Vec<&Reference> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for r in store.references() {
            match index.get(r.url.as_str()) {
                Some(&i) if best[i].relevance < r.relevance => best[i] = r,
                Some(_) => {}
                None => {
                    index.insert(r.url.as_str(), best.len());
                    best.push(r);
                }
            }
        }
        best.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        best.into_iter().take(self.top_n).cloned().collect()
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new(3)
    }
}

fn compose_answer(query: &str, store: &ContextStore, sources: &[Reference]) -> String {
    let mut answer = format!(
        "Findings for \"{}\" drawn from {} sources ({} words read):",
        query.trim(),
        store.source_count(),
        store.total_word_count()
    );
    for source in sources {
        let title = if source.title.trim().is_empty() {
            source.url.as_str()
        } else {
            source.title.trim()
        };
        let excerpt = store
            .contents()
            .find(|c| c.source_url == source.url)
            .map(|c| excerpt(&c.text))
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| excerpt(&source.snippet));
        if excerpt.is_empty() {
            answer.push_str(&format!("\n- {}", title));
        } else {
            answer.push_str(&format!("\n- {}: {}", title, excerpt));
        }
    }
    answer
}

fn excerpt(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > EXCERPT_WORDS {
        format!("{}...", words[..EXCERPT_WORDS].join(" "))
    } else {
        words.join(" ")
    }
}

fn collect_alternatives(store: &ContextStore) -> Vec<Alternative> {
    let mut seen = HashSet::new();
    store
        .items()
        .iter()
        .filter_map(|item| {
            let d = item.divergence()?;
            if !seen.insert((d.label.clone(), item.url().to_string())) {
                return None;
            }
            Some(Alternative {
                label: d.label.clone(),
                description: d.description.clone(),
                source_url: item.url().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ReadContent;

    #[test]
    fn test_zero_sources_graceful() {
        let result = Synthesizer::default().synthesize("  nothing here ", &ContextStore::new(), 0.0);
        assert_eq!(result.answer, "No information found for \"nothing here\".");
        assert!(result.sources.is_empty());
        assert!(result.alternatives.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_top_sources_dedup_and_order() {
        let mut store = ContextStore::new();
        store.ingest_reference(Reference::new("https://a", "A", "a", 0.5));
        store.ingest_reference(Reference::new("https://b", "B", "b", 0.9));
        store.ingest_reference(Reference::new("https://a", "A", "a", 0.95));
        store.ingest_reference(Reference::new("https://c", "C", "c", 0.1));
        let result = Synthesizer::new(2).synthesize("q", &store, 0.3);
        let urls: Vec<_> = result.sources.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://b"]);
        assert_eq!(result.source_count, 3);
    }

    #[test]
    fn test_top_sources_many_repeats_keep_first_seen_order_on_ties() {
        let mut store = ContextStore::new();
        for round in 0..200 {
            for host in ["x", "y", "z"] {
                let relevance = if round == 150 && host == "z" { 0.9 } else { 0.5 };
                store.ingest_reference(Reference::new(format!("https://{host}"), host, "s", relevance));
            }
        }
        let result = Synthesizer::new(5).synthesize("q", &store, 0.3);
        let urls: Vec<_> = result.sources.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://z", "https://x", "https://y"]);
        assert_eq!(result.sources[0].relevance, 0.9);
    }

    #[test]
    fn test_answer_prefers_read_text_over_snippet() {
        let mut store = ContextStore::new();
        store.ingest_reference(Reference::new("https://a", "Alpha", "snippet text", 1.0));
        store
            .ingest_content(ReadContent::new("https://a", "body text from the page"))
            .unwrap();
        let result = Synthesizer::default().synthesize("q", &store, 0.9);
        assert!(result.answer.contains("1 sources (5 words read)"));
        assert!(result.answer.contains("- Alpha: body text from the page"));
        assert!(!result.answer.contains("snippet text"));
    }

    #[test]
    fn test_divergent_items_passed_through() {
        let mut store = ContextStore::new();
        store.ingest_reference(
            Reference::new("https://a", "A", "", 1.0).with_divergence("Skeptic", "Disputes the claim"),
        );
        store.ingest_reference(
            Reference::new("https://a", "A", "", 1.0).with_divergence("Skeptic", "Disputes the claim"),
        );
        store
            .ingest_content(ReadContent::new("https://a", "text").with_divergence("Minority", "Other view"))
            .unwrap();
        let result = Synthesizer::default().synthesize("q", &store, 0.5);
        assert_eq!(
            result.alternatives,
            vec![
                Alternative {
                    label: "Skeptic".into(),
                    description: "Disputes the claim".into(),
                    source_url: "https://a".into(),
                },
                Alternative {
                    label: "Minority".into(),
                    description: "Other view".into(),
                    source_url: "https://a".into(),
                },
            ]
        );
    }

    #[test]
    fn test_deterministic() {
        let mut store = ContextStore::new();
        store.ingest_reference(Reference::new("https://a", "A", "x y z", 0.4));
        store.ingest_reference(Reference::new("https://b", "B", "x y", 0.4));
        let s = Synthesizer::default();
        let a = s.synthesize("q", &store, 0.3);
        let b = s.synthesize("q", &store, 0.3);
        assert_eq!(a.answer, b.answer);
        assert_eq!(a.sources, b.sources);
    }
}
