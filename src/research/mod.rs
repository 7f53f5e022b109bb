//! 研究层：意图分类、Planner、Context Store、Evaluator、Synthesizer 与主循环

pub mod context;
pub mod evaluator;
pub mod events;
pub mod intent;
pub mod loop_;
pub mod planner;
pub mod synthesizer;

pub use context::{ContextStore, IngestReport, IngestedItem};
pub use evaluator::{Audit, Evaluator, EvaluatorThresholds, WordCountEvaluator, SATISFACTION_THRESHOLD};
pub use events::ResearchEvent;
pub use intent::{Classifier, Intent, IntentKind, KeywordClassifier};
pub use loop_::{Depth, LoopSettings, ResearchLoop, ResearchRequest};
pub use planner::{Plan, PlanStep, Planner};
pub use synthesizer::{Alternative, SynthesisResult, Synthesizer};
