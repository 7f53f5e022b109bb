//! Planner：把分类后的意图展开成有序的步骤列表
//!
//! plan 用于第 0 轮；replan 在评估不满意时使用，带上 missing_info 作为上下文，
//! 并且总是请求一次新的搜索（翻页序号递增），避免原样重复提交同一步骤。

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::core::ResearchError;
use crate::providers::SearchOptions;
use crate::research::intent::{Classifier, Intent, IntentKind};

/// 循环分发表中已知的工具名
pub const TOOL_SEARCH: &str = "search";
pub const TOOL_READ: &str = "read";

/// 单个步骤：{"tool": "search", "params": {...}}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStep {
    pub tool: String,
    pub params: serde_json::Value,
}

impl PlanStep {
    pub fn search(query: &str, options: &SearchOptions) -> Self {
        Self {
            tool: TOOL_SEARCH.to_string(),
            params: json!({
                "query": query,
                "breadth": options.breadth,
                "page": options.page,
                "safe_search": options.safe_search,
            }),
        }
    }

    pub fn read(url: &str) -> Self {
        Self {
            tool: TOOL_READ.to_string(),
            params: json!({ "url": url }),
        }
    }

    fn with_param(mut self, key: &str, value: serde_json::Value) -> Self {
        if let Some(obj) = self.params.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
        self
    }

    pub fn query(&self) -> Option<&str> {
        self.params.get("query").and_then(|v| v.as_str())
    }

    pub fn url(&self) -> Option<&str> {
        self.params.get("url").and_then(|v| v.as_str())
    }

    /// 从 params 还原搜索参数，缺省值取 SearchOptions::default()
    pub fn search_options(&self) -> SearchOptions {
        let defaults = SearchOptions::default();
        let get_usize = |key: &str| self.params.get(key).and_then(|v| v.as_u64()).map(|v| v as usize);
        SearchOptions {
            breadth: get_usize("breadth").unwrap_or(defaults.breadth).max(1),
            page: get_usize("page").unwrap_or(defaults.page),
            safe_search: self
                .params
                .get("safe_search")
                .and_then(|v| v.as_bool())
                .unwrap_or(defaults.safe_search),
        }
    }
}

/// 单轮计划；每轮新建，重规划时替换而不是修改
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub id: Uuid,
    pub iteration: usize,
    pub intent: Intent,
    pub steps: Vec<PlanStep>,
}

pub struct Planner {
    classifier: Arc<dyn Classifier>,
}

impl Planner {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub fn plan(&self, query: &str) -> Result<Plan, ResearchError> {
        let query = validate_query(query)?;
        let intent = self.classifier.classify(query);
        let mut steps = Vec::with_capacity(2);
        if let IntentKind::TargetedLookup { url: Some(url) } = &intent.kind {
            steps.push(PlanStep::read(url));
        }
        steps.push(PlanStep::search(query, &base_options(&intent, 0)));
        Ok(Plan {
            id: Uuid::new_v4(),
            iteration: 0,
            intent,
            steps,
        })
    }

    /// 意图在各轮之间保持稳定；直接阅读步骤只在第 0 轮执行
    pub fn replan(&self, query: &str, missing_info: &str, iteration: usize) -> Result<Plan, ResearchError> {
        let query = validate_query(query)?;
        let intent = self.classifier.classify(query);
        let options = base_options(&intent, iteration);
        let mut steps = vec![PlanStep::search(query, &options).with_param("hint", json!(missing_info))];

        let focus = refinement_focus(missing_info);
        let refined = format!("{} {}", query, focus);
        // 细化查询从第 1 轮起独立翻页，与原查询的页序错开一位
        let refined_options = SearchOptions {
            page: iteration.saturating_sub(1),
            ..options
        };
        steps.push(PlanStep::search(&refined, &refined_options).with_param("hint", json!(missing_info)));

        Ok(Plan {
            id: Uuid::new_v4(),
            iteration,
            intent,
            steps,
        })
    }
}

fn validate_query(query: &str) -> Result<&str, ResearchError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ResearchError::InvalidInput("query must not be empty".to_string()));
    }
    Ok(trimmed)
}

fn base_options(intent: &Intent, page: usize) -> SearchOptions {
    SearchOptions {
        breadth: intent.breadth,
        page,
        safe_search: !intent.is_unrestricted(),
    }
}

/// 根据缺失信息的描述挑选细化检索的侧重词
fn refinement_focus(missing_info: &str) -> &'static str {
    let lower = missing_info.to_lowercase();
    if lower.contains("insufficient") || lower.contains("no content") {
        "overview"
    } else if lower.contains("detail") {
        "in-depth analysis"
    } else {
        "explained"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::intent::KeywordClassifier;

    fn planner() -> Planner {
        Planner::new(Arc::new(KeywordClassifier::default()))
    }

    #[test]
    fn test_empty_query_rejected() {
        for q in ["", "   ", "\n\t"] {
            assert!(matches!(planner().plan(q), Err(ResearchError::InvalidInput(_))));
            assert!(matches!(planner().replan(q, "x", 1), Err(ResearchError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_plan_steps_never_empty() {
        for q in ["compare X and Y", "what is rust", "hello", "explicit stuff", "read https://a.example"] {
            let plan = planner().plan(q).unwrap();
            assert!(!plan.steps.is_empty(), "{q}");
            assert!(plan.steps.iter().all(|s| s.tool == TOOL_SEARCH || s.tool == TOOL_READ));
        }
    }

    #[test]
    fn test_broad_plan_uses_breadth_hint() {
        let plan = planner().plan("compare X and Y").unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].query(), Some("compare X and Y"));
        assert_eq!(plan.steps[0].search_options().breadth, plan.intent.breadth);
    }

    #[test]
    fn test_url_query_reads_first() {
        let plan = planner().plan("summarize https://a.example/post").unwrap();
        assert_eq!(plan.steps[0].tool, TOOL_READ);
        assert_eq!(plan.steps[0].url(), Some("https://a.example/post"));
        assert_eq!(plan.steps[1].tool, TOOL_SEARCH);
    }

    #[test]
    fn test_unrestricted_disables_safe_search() {
        let plan = planner().plan("uncensored archive").unwrap();
        assert!(!plan.steps[0].search_options().safe_search);
    }

    #[test]
    fn test_replan_requests_new_search() {
        let p = planner();
        let first = p.plan("compare X and Y").unwrap();
        let second = p.replan("compare X and Y", "need more detail", 1).unwrap();
        assert_eq!(first.intent, second.intent);
        assert_ne!(first.steps[0], second.steps[0]);
        assert_eq!(second.steps[0].query(), Some("compare X and Y"));
        assert_eq!(second.steps[0].search_options().page, 1);
        assert_eq!(second.steps[1].query(), Some("compare X and Y in-depth analysis"));
        assert!(second.steps.iter().all(|s| s.tool == TOOL_SEARCH));
    }

    #[test]
    fn test_replans_across_iterations_are_distinct() {
        let p = planner();
        let mut seen: Vec<(String, SearchOptions)> = Vec::new();
        for step in p.plan("obscure topic").unwrap().steps {
            seen.push((step.query().unwrap_or_default().to_string(), step.search_options()));
        }
        for iteration in 1..=3 {
            let plan = p
                .replan("obscure topic", "Search yielded insufficient content: 0 words from 0 sources", iteration)
                .unwrap();
            for step in plan.steps {
                let key = (step.query().unwrap_or_default().to_string(), step.search_options());
                assert!(!seen.contains(&key), "repeated search at iteration {iteration}: {key:?}");
                seen.push(key);
            }
        }
        assert_eq!(seen.len(), 7);
    }

    struct LabelClassifier {
        label: String,
    }

    impl Classifier for LabelClassifier {
        fn classify(&self, _query: &str) -> Intent {
            Intent {
                kind: IntentKind::General,
                specialist: self.label.clone(),
                confidence: 0.5,
                breadth: 3,
            }
        }
    }

    #[test]
    fn test_classifier_label_built_at_runtime() {
        let label = format!("specialist-{}", 7);
        let p = Planner::new(Arc::new(LabelClassifier { label: label.clone() }));
        assert_eq!(p.plan("anything").unwrap().intent.specialist, label);
        assert_eq!(p.replan("anything", "x", 2).unwrap().intent.specialist, label);
    }

    #[test]
    fn test_search_options_defaults_from_missing_params() {
        let step = PlanStep {
            tool: TOOL_SEARCH.to_string(),
            params: json!({"query": "q", "breadth": 0}),
        };
        let options = step.search_options();
        assert_eq!(options.breadth, 1);
        assert_eq!(options.page, 0);
        assert!(options.safe_search);
    }
}
