//! 研究循环状态机的阶段定义
//!
//! Planning → Executing → Ingesting → Evaluating → (Replanning → Executing | Synthesizing) → Done

use serde::Serialize;

/// 循环阶段（用于日志与进度投影）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Planning,
    Executing,
    Ingesting,
    Evaluating,
    Replanning,
    Synthesizing,
    Done,
}

impl LoopPhase {
    /// 合法的状态迁移
    pub fn can_transition_to(self, next: LoopPhase) -> bool {
        use LoopPhase::*;
        matches!(
            (self, next),
            (Planning, Executing)
                | (Executing, Ingesting)
                | (Ingesting, Evaluating)
                | (Evaluating, Replanning)
                | (Evaluating, Synthesizing)
                | (Replanning, Executing)
                | (Synthesizing, Done)
        ) || (next == Synthesizing && self != Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            LoopPhase::Planning,
            LoopPhase::Executing,
            LoopPhase::Ingesting,
            LoopPhase::Evaluating,
            LoopPhase::Replanning,
            LoopPhase::Executing,
            LoopPhase::Ingesting,
            LoopPhase::Evaluating,
            LoopPhase::Synthesizing,
            LoopPhase::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_cancel_jumps_to_synthesizing() {
        assert!(LoopPhase::Executing.can_transition_to(LoopPhase::Synthesizing));
        assert!(!LoopPhase::Done.can_transition_to(LoopPhase::Synthesizing));
        assert!(!LoopPhase::Evaluating.can_transition_to(LoopPhase::Executing));
    }
}
