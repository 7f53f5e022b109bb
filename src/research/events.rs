//! 研究过程事件：供外层传输（SSE / WebSocket）实时推送里程碑
//!
//! Display 输出面向人的里程碑文本（"Planning…"、"Searching…"）。

use std::fmt;

use serde::Serialize;

/// 单个进度事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    IterationStarted { iteration: usize, budget: usize },
    Planning,
    PlanReady { specialist: String, steps: usize },
    Searching { query: String },
    Reading { url: String },
    /// 单步失败（已恢复，不中止本轮）
    StepFailed { tool: String, reason: String },
    /// 未知工具被跳过
    StepSkipped { tool: String },
    Ingested { added: usize, total_words: usize, sources: usize },
    Evaluating,
    Audit { satisfaction: f64, missing_info: Option<String> },
    Replanning { missing_info: String },
    Synthesizing,
    Done { confidence: f64 },
    Cancelled,
    /// 引擎故障：与低置信度的合成结果区分开
    Failed { text: String },
}

impl ResearchEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResearchEvent::Done { .. } | ResearchEvent::Failed { .. })
    }
}

impl fmt::Display for ResearchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResearchEvent::IterationStarted { iteration, budget } => {
                write!(f, "Iteration {}/{}…", iteration + 1, budget)
            }
            ResearchEvent::Planning => write!(f, "Planning…"),
            ResearchEvent::PlanReady { specialist, steps } => {
                write!(f, "Plan ready: {} step(s) via {}", steps, specialist)
            }
            ResearchEvent::Searching { query } => write!(f, "Searching… {}", query),
            ResearchEvent::Reading { url } => write!(f, "Reading… {}", url),
            ResearchEvent::StepFailed { tool, reason } => write!(f, "Step {} failed: {}", tool, reason),
            ResearchEvent::StepSkipped { tool } => write!(f, "Skipping unknown step {}", tool),
            ResearchEvent::Ingested {
                added,
                total_words,
                sources,
            } => write!(
                f,
                "Ingested {} item(s); {} words from {} sources",
                added, total_words, sources
            ),
            ResearchEvent::Evaluating => write!(f, "Evaluating…"),
            ResearchEvent::Audit { satisfaction, .. } => write!(f, "Satisfaction {:.2}", satisfaction),
            ResearchEvent::Replanning { missing_info } => write!(f, "Replanning… {}", missing_info),
            ResearchEvent::Synthesizing => write!(f, "Synthesizing…"),
            ResearchEvent::Done { confidence } => write!(f, "Done (confidence {:.2})", confidence),
            ResearchEvent::Cancelled => write!(f, "Cancelled"),
            ResearchEvent::Failed { text } => write!(f, "Failed: {}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestone_text() {
        assert_eq!(ResearchEvent::Planning.to_string(), "Planning…");
        assert_eq!(ResearchEvent::Evaluating.to_string(), "Evaluating…");
        assert_eq!(
            ResearchEvent::Searching { query: "rust".into() }.to_string(),
            "Searching… rust"
        );
        assert_eq!(
            ResearchEvent::IterationStarted { iteration: 0, budget: 2 }.to_string(),
            "Iteration 1/2…"
        );
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let v = serde_json::to_value(ResearchEvent::Done { confidence: 0.9 }).unwrap();
        assert_eq!(v["type"], "done");
        assert!(ResearchEvent::Failed { text: "x".into() }.is_terminal());
        assert!(!ResearchEvent::Cancelled.is_terminal());
    }
}
