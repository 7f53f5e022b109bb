//! 研究主循环
//!
//! Plan -> Execute (search / read) -> Ingest -> Evaluate -> (Replan -> Execute | Synthesize)。
//! 迭代预算由调用方显式给出的 depth 决定；预算耗尽时无论满意与否都输出答案，绝不无限循环。
//! 单步的提供方错误只记录、不中止；规划 / 评估故障以 EngineFailure 终止会话。
//! 可选 event_tx：向外层推送 Planning / Searching / Evaluating 等里程碑。

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::core::{LoopPhase, ResearchError, Session};
use crate::privacy::{Anonymizer, MaskingAnonymizer, PrivacyLevel};
use crate::providers::{ContentReader, ProviderExecutor, ReadContent, Reference, SearchProvider};
use crate::research::evaluator::{EvaluatorThresholds, SATISFACTION_THRESHOLD};
use crate::research::planner::{TOOL_READ, TOOL_SEARCH};
use crate::research::{
    Audit, Classifier, ContextStore, Evaluator, IngestedItem, KeywordClassifier, Plan, PlanStep, Planner,
    ResearchEvent, SynthesisResult, Synthesizer, WordCountEvaluator,
};

/// 研究深度：决定迭代预算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    #[default]
    Fast,
    Deep,
}

impl FromStr for Depth {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(Depth::Fast),
            "deep" => Ok(Depth::Deep),
            other => Err(ResearchError::InvalidInput(format!(
                "unknown depth '{other}', expected fast or deep"
            ))),
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Depth::Fast => write!(f, "fast"),
            Depth::Deep => write!(f, "deep"),
        }
    }
}

/// 外部调用入参：{query, depth}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default)]
    pub depth: Depth,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>, depth: Depth) -> Self {
        Self {
            query: query.into(),
            depth,
        }
    }
}

/// 循环参数（对应配置 [research] 与 [providers] timeout_secs）
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub fast_budget: usize,
    pub deep_budget: usize,
    /// 每个搜索步骤深读的最高相关度候选数
    pub read_top_n: usize,
    pub satisfaction_threshold: f64,
    /// 单次提供方调用超时
    pub provider_timeout: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            fast_budget: 2,
            deep_budget: 4,
            read_top_n: 2,
            satisfaction_threshold: SATISFACTION_THRESHOLD,
            provider_timeout: Duration::from_secs(15),
        }
    }
}

impl LoopSettings {
    pub fn budget(&self, depth: Depth) -> usize {
        let budget = match depth {
            Depth::Fast => self.fast_budget,
            Depth::Deep => self.deep_budget,
        };
        budget.max(1)
    }
}

fn send_event(tx: Option<&UnboundedSender<ResearchEvent>>, ev: ResearchEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

/// 规划 / 评估阶段的错误统一为 EngineFailure（InvalidInput 原样返回），并推送 Failed
fn engine_failure(tx: Option<&UnboundedSender<ResearchEvent>>, err: ResearchError) -> ResearchError {
    let err = match err {
        ResearchError::InvalidInput(_) | ResearchError::EngineFailure(_) => err,
        other => ResearchError::EngineFailure(other.to_string()),
    };
    if let ResearchError::EngineFailure(text) = &err {
        tracing::error!(error = %text, "research session aborted");
        send_event(tx, ResearchEvent::Failed { text: text.clone() });
    }
    err
}

/// 单步执行结果
enum StepOutput {
    Searched(Vec<Reference>),
    DirectRead(Reference, ReadContent),
    Nothing,
}

/// 研究循环编排器；不持有任何会话状态，可被多个会话并发复用
pub struct ResearchLoop {
    planner: Planner,
    search: Arc<dyn SearchProvider>,
    reader: Arc<dyn ContentReader>,
    evaluator: Arc<dyn Evaluator>,
    synthesizer: Synthesizer,
    anonymizer: Arc<dyn Anonymizer>,
    settings: LoopSettings,
}

impl ResearchLoop {
    /// 默认组件：关键词分类器、词数评估器、Top-3 合成、standard 隐私级别
    pub fn new(search: Arc<dyn SearchProvider>, reader: Arc<dyn ContentReader>) -> Self {
        Self {
            planner: Planner::new(Arc::new(KeywordClassifier::default())),
            search,
            reader,
            evaluator: Arc::new(WordCountEvaluator::default()),
            synthesizer: Synthesizer::default(),
            anonymizer: Arc::new(MaskingAnonymizer::new(PrivacyLevel::Standard)),
            settings: LoopSettings::default(),
        }
    }

    /// 按配置组装
    pub fn from_config(
        config: &AppConfig,
        search: Arc<dyn SearchProvider>,
        reader: Arc<dyn ContentReader>,
    ) -> Result<Self, ResearchError> {
        let research = &config.research;
        let e = &config.evaluator;
        let evaluator = WordCountEvaluator::new(EvaluatorThresholds {
            low_words: e.low_words,
            high_words: e.high_words,
            empty_score: e.empty_score,
            low_score: e.low_score,
            medium_score: e.medium_score,
            high_score: e.high_score,
        })?;
        if !(0.0..=1.0).contains(&research.satisfaction_threshold) {
            return Err(ResearchError::Config(
                "research.satisfaction_threshold must be within [0, 1]".to_string(),
            ));
        }
        let settings = LoopSettings {
            fast_budget: research.fast_budget,
            deep_budget: research.deep_budget,
            read_top_n: research.read_top_n,
            satisfaction_threshold: research.satisfaction_threshold,
            provider_timeout: Duration::from_secs(config.providers.timeout_secs.max(1)),
        };
        Ok(Self::new(search, reader)
            .with_classifier(Arc::new(KeywordClassifier::new(config.providers.search.default_breadth)))
            .with_evaluator(Arc::new(evaluator))
            .with_synthesizer(Synthesizer::new(research.sources_top_n))
            .with_anonymizer(Arc::new(MaskingAnonymizer::new(config.privacy.level)))
            .with_settings(settings))
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.planner = Planner::new(classifier);
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Synthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn with_anonymizer(mut self, anonymizer: Arc<dyn Anonymizer>) -> Self {
        self.anonymizer = anonymizer;
        self
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// 执行一次完整的研究会话；Session 被消费，返回时其 Context Store 随之释放
    pub async fn run(
        &self,
        session: Session,
        request: ResearchRequest,
        event_tx: Option<&UnboundedSender<ResearchEvent>>,
    ) -> Result<SynthesisResult, ResearchError> {
        let span = tracing::info_span!("research", session = %session.id(), depth = %request.depth);
        self.run_session(session, request, event_tx).instrument(span).await
    }

    async fn run_session(
        &self,
        mut session: Session,
        request: ResearchRequest,
        event_tx: Option<&UnboundedSender<ResearchEvent>>,
    ) -> Result<SynthesisResult, ResearchError> {
        let budget = self.settings.budget(request.depth);
        let cancel = session.cancel_token();
        let executor = ProviderExecutor::new(
            self.search.clone(),
            self.reader.clone(),
            self.settings.provider_timeout,
        );

        let mut phase = LoopPhase::Planning;
        send_event(event_tx, ResearchEvent::Planning);
        let mut plan = self.planner.plan(&request.query)?;
        let query = request.query.trim().to_string();
        tracing::info!(
            budget,
            specialist = %plan.intent.specialist,
            confidence = plan.intent.confidence,
            "research started"
        );

        let mut iteration = 0;
        let mut last_audit: Option<Audit> = None;
        let mut cancelled = false;

        loop {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            send_event(event_tx, ResearchEvent::IterationStarted { iteration, budget });
            send_event(
                event_tx,
                ResearchEvent::PlanReady {
                    specialist: plan.intent.specialist.clone(),
                    steps: plan.steps.len(),
                },
            );

            phase = advance(phase, LoopPhase::Executing);
            // 取消时丢弃整个缓冲，已在途的提供方调用随 future 一并放弃
            let buffer = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                buffer = self.execute(&executor, &plan, session.store(), event_tx) => Some(buffer),
            };
            let Some(buffer) = buffer else {
                cancelled = true;
                break;
            };

            phase = advance(phase, LoopPhase::Ingesting);
            let report = session.store_mut().ingest_batch(buffer);
            let store = session.store();
            tracing::info!(
                iteration,
                accepted = report.accepted,
                rejected = report.rejected.len(),
                total_words = store.total_word_count(),
                sources = store.source_count(),
                "iteration ingested"
            );
            send_event(
                event_tx,
                ResearchEvent::Ingested {
                    added: report.accepted,
                    total_words: store.total_word_count(),
                    sources: store.source_count(),
                },
            );

            phase = advance(phase, LoopPhase::Evaluating);
            send_event(event_tx, ResearchEvent::Evaluating);
            let audit = self
                .evaluate(store)
                .await
                .map_err(|e| engine_failure(event_tx, e))?;
            tracing::info!(iteration, satisfaction = audit.satisfaction, "audit");
            send_event(
                event_tx,
                ResearchEvent::Audit {
                    satisfaction: audit.satisfaction,
                    missing_info: audit.missing_info.clone(),
                },
            );

            let satisfied = audit.is_satisfied(self.settings.satisfaction_threshold);
            let missing_info = audit
                .missing_info
                .clone()
                .unwrap_or_else(|| "more sources".to_string());
            last_audit = Some(audit);
            if satisfied {
                break;
            }
            if iteration + 1 >= budget {
                tracing::info!(iteration, budget, "iteration budget exhausted");
                break;
            }

            phase = advance(phase, LoopPhase::Replanning);
            send_event(
                event_tx,
                ResearchEvent::Replanning {
                    missing_info: missing_info.clone(),
                },
            );
            iteration += 1;
            plan = self
                .planner
                .replan(&query, &missing_info, iteration)
                .map_err(|e| engine_failure(event_tx, e))?;
        }

        if cancelled {
            tracing::warn!(iteration, "research cancelled, synthesizing from current context");
            send_event(event_tx, ResearchEvent::Cancelled);
        }

        phase = advance(phase, LoopPhase::Synthesizing);
        send_event(event_tx, ResearchEvent::Synthesizing);
        let satisfaction = match last_audit {
            Some(audit) => audit.satisfaction,
            None => {
                self.evaluate(session.store())
                    .await
                    .map_err(|e| engine_failure(event_tx, e))?
                    .satisfaction
            }
        };
        let result = self.synthesizer.synthesize(&query, session.store(), satisfaction);

        advance(phase, LoopPhase::Done);
        tracing::info!(
            confidence = result.confidence,
            sources = result.source_count,
            "research done"
        );
        send_event(event_tx, ResearchEvent::Done {
            confidence: result.confidence,
        });
        Ok(result)
    }

    async fn evaluate(&self, store: &ContextStore) -> Result<Audit, ResearchError> {
        let audit = self.evaluator.evaluate(store).await?;
        if !(0.0..=1.0).contains(&audit.satisfaction) {
            return Err(ResearchError::EngineFailure(format!(
                "evaluator returned satisfaction {} outside [0, 1]",
                audit.satisfaction
            )));
        }
        Ok(audit)
    }

    /// 执行一轮计划：各步骤并发；每个搜索步骤再深读其最高相关度且未读过的前 N 个候选。
    /// 只写入本轮私有缓冲，全部调用结束后才由调用方摄入。
    async fn execute(
        &self,
        executor: &ProviderExecutor,
        plan: &Plan,
        store: &ContextStore,
        event_tx: Option<&UnboundedSender<ResearchEvent>>,
    ) -> Vec<IngestedItem> {
        let outputs = join_all(
            plan.steps
                .iter()
                .map(|step| self.run_step(executor, step, store, event_tx)),
        )
        .await;

        let mut buffer = Vec::new();
        let mut to_read: Vec<Reference> = Vec::new();
        let mut claimed: HashSet<String> = HashSet::new();

        for output in outputs {
            match output {
                StepOutput::Searched(refs) => {
                    let mut ranked: Vec<&Reference> = refs.iter().collect();
                    ranked.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
                    let picks: Vec<Reference> = ranked
                        .into_iter()
                        .filter(|r| !store.has_read(&r.url))
                        .filter(|r| claimed.insert(r.url.clone()))
                        .take(self.settings.read_top_n)
                        .cloned()
                        .collect();
                    to_read.extend(picks);
                    buffer.extend(refs.into_iter().map(IngestedItem::Reference));
                }
                StepOutput::DirectRead(reference, content) => {
                    claimed.insert(reference.url.clone());
                    buffer.push(IngestedItem::Reference(reference));
                    buffer.push(IngestedItem::Content(content));
                }
                StepOutput::Nothing => {}
            }
        }

        let reads = join_all(to_read.iter().map(|r| self.read_one(executor, r, event_tx))).await;
        buffer.extend(reads.into_iter().flatten().map(IngestedItem::Content));
        buffer
    }

    async fn run_step(
        &self,
        executor: &ProviderExecutor,
        step: &PlanStep,
        store: &ContextStore,
        event_tx: Option<&UnboundedSender<ResearchEvent>>,
    ) -> StepOutput {
        match step.tool.as_str() {
            TOOL_SEARCH => {
                let Some(query) = step.query() else {
                    step_failed(event_tx, &step.tool, "missing query parameter");
                    return StepOutput::Nothing;
                };
                let outbound = self.anonymizer.anonymize(query);
                if outbound != query {
                    tracing::debug!("query anonymized before search");
                }
                send_event(event_tx, ResearchEvent::Searching { query: outbound.clone() });
                match executor.search(&outbound, &step.search_options()).await {
                    Ok(refs) => {
                        tracing::info!(results = refs.len(), "search step done");
                        StepOutput::Searched(refs)
                    }
                    Err(e) => {
                        step_failed(event_tx, &step.tool, &e.to_string());
                        StepOutput::Nothing
                    }
                }
            }
            TOOL_READ => {
                let Some(url) = step.url() else {
                    step_failed(event_tx, &step.tool, "missing url parameter");
                    return StepOutput::Nothing;
                };
                if store.has_read(url) {
                    return StepOutput::Nothing;
                }
                let reference = Reference::new(url, url, "", 0.0);
                match self.read_one(executor, &reference, event_tx).await {
                    Some(content) => StepOutput::DirectRead(reference, content),
                    None => StepOutput::Nothing,
                }
            }
            other => {
                tracing::warn!(tool = %other, "skipping step with unknown tool");
                send_event(event_tx, ResearchEvent::StepSkipped { tool: other.to_string() });
                StepOutput::Nothing
            }
        }
    }

    async fn read_one(
        &self,
        executor: &ProviderExecutor,
        reference: &Reference,
        event_tx: Option<&UnboundedSender<ResearchEvent>>,
    ) -> Option<ReadContent> {
        send_event(event_tx, ResearchEvent::Reading { url: reference.url.clone() });
        match executor.read(reference).await {
            Ok(content) => Some(content),
            Err(e) => {
                step_failed(event_tx, TOOL_READ, &e.to_string());
                None
            }
        }
    }
}

fn step_failed(event_tx: Option<&UnboundedSender<ResearchEvent>>, tool: &str, reason: &str) {
    tracing::warn!(tool = %tool, reason = %reason, "step failed, continuing");
    send_event(
        event_tx,
        ResearchEvent::StepFailed {
            tool: tool.to_string(),
            reason: reason.to_string(),
        },
    );
}

fn advance(from: LoopPhase, to: LoopPhase) -> LoopPhase {
    debug_assert!(from.can_transition_to(to), "illegal transition {:?} -> {:?}", from, to);
    tracing::debug!(from = ?from, to = ?to, "phase");
    to
}
