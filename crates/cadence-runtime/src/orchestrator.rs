//! # Runtime Orchestrator
//!
//! Owns the engines and runs each `execute()` call as an isolated session:
//!
//! 1. open the conversation
//! 2. plan (enhanced mode, multi-step tasks) or run a single engine call
//! 3. for each planned step: resolve placeholders, execute, record, and on
//!    failure reflect (retrying, halting or aborting as recommended)
//! 4. summarize the conversation and assemble a [`RuntimeResult`]
//!
//! Only [`SystemError`]s escape `execute()`; every other failure ends up in
//! the returned result with `success == false`.

use cadence_core::identifiers::prefixed_id;
use cadence_core::{
    AgentConfig, CadenceResult, CapabilityRegistry, ChatRole, ContextIntelligence,
    ExecutionId, ExecutionMemory, ExecutionPlan, ExecutionState, ExecutionStatus, ExecutionStep,
    LlmHandler, PlannedStep, Reflection, RuntimeConfig, RuntimeError, SuggestedAction,
    SystemError, SystemPromptService, ToolError, ToolInvocation, ToolRegistry,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::context::ContextManager;
use crate::conversation::{
    Conversation, ConversationEngine, ConversationState, FALLBACK_RESPONSE,
};
use crate::execution::{ExecutionEngine, ExecutionMode, StepOutcome};
use crate::guard::CallGuard;
use crate::placeholder::resolve_placeholders;
use crate::planning::PlanningEngine;
use crate::reflection::ReflectionEngine;

// ============================================================================
// Results and health
// ============================================================================

/// Counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMetrics {
    pub duration_ms: u64,
    /// Step records, retries included
    pub steps_executed: usize,
    pub steps_succeeded: usize,
    pub steps_failed: usize,
    pub llm_calls: usize,
    pub tool_calls: usize,
    pub reflections: usize,
    pub retries: usize,
    pub working_memory_bytes: usize,
    pub insights: usize,
}

/// Outcome of one `execute()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeResult {
    pub execution_id: ExecutionId,
    pub success: bool,
    pub status: ExecutionStatus,
    /// Final response; never empty
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub conversation: Conversation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ExecutionPlan>,
    pub steps: Vec<ExecutionStep>,
    pub reflections: Vec<Reflection>,
    pub metrics: RuntimeMetrics,
    /// `None` when no tool ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_executed: Option<Vec<ToolInvocation>>,
}

/// Lifecycle state of the orchestrator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Uninitialized,
    Ready,
    Stopped,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Uninitialized => write!(f, "uninitialized"),
            HealthState::Ready => write!(f, "ready"),
            HealthState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Aggregate health. There is no "current execution": status is per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeHealth {
    pub state: HealthState,
    pub active_sessions: usize,
}

/// Live view of one running session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub execution_id: ExecutionId,
    pub agent_id: String,
    pub status: ExecutionStatus,
    pub current_step: usize,
    pub total_steps: usize,
    pub started_at: DateTime<Utc>,
}

struct ActiveSession {
    memory: Arc<Mutex<ExecutionMemory>>,
    token: CancellationToken,
}

type SessionMap = Arc<RwLock<HashMap<ExecutionId, ActiveSession>>>;

/// Keeps a session listed while its `execute()` future is alive.
///
/// Dropping the future early (a caller-side timeout, a losing `select!`
/// branch) still unlists the session.
struct SessionEntry {
    sessions: SessionMap,
    execution_id: ExecutionId,
    listed: bool,
}

impl SessionEntry {
    async fn open(
        sessions: &SessionMap,
        execution_id: ExecutionId,
        session: ActiveSession,
    ) -> Self {
        sessions.write().await.insert(execution_id.clone(), session);
        Self {
            sessions: Arc::clone(sessions),
            execution_id,
            listed: true,
        }
    }

    async fn close(mut self) {
        self.sessions.write().await.remove(&self.execution_id);
        self.listed = false;
    }
}

impl Drop for SessionEntry {
    fn drop(&mut self) {
        if !self.listed {
            return;
        }
        if let Ok(mut sessions) = self.sessions.try_write() {
            if let Some(session) = sessions.remove(&self.execution_id) {
                session.token.cancel();
            }
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                execution.id = %self.execution_id,
                "Session dropped outside a runtime; entry not removed"
            );
            return;
        };
        let sessions = Arc::clone(&self.sessions);
        let execution_id = self.execution_id.clone();
        debug!(execution.id = %execution_id, "Session dropped while locked; deferring removal");
        handle.spawn(async move {
            if let Some(session) = sessions.write().await.remove(&execution_id) {
                session.token.cancel();
            }
        });
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Wires collaborators into a [`RuntimeOrchestrator`].
#[derive(Default)]
pub struct RuntimeOrchestratorBuilder {
    llm: Option<Arc<dyn LlmHandler>>,
    tools: Option<Arc<dyn ToolRegistry>>,
    prompts: Option<Arc<dyn SystemPromptService>>,
    intelligence: Option<Arc<dyn ContextIntelligence>>,
    registry: Option<Arc<CapabilityRegistry>>,
    config: Option<RuntimeConfig>,
}

impl RuntimeOrchestratorBuilder {
    pub fn llm(mut self, llm: Arc<dyn LlmHandler>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn tools(mut self, tools: Arc<dyn ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn prompts(mut self, prompts: Arc<dyn SystemPromptService>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn intelligence(mut self, intelligence: Arc<dyn ContextIntelligence>) -> Self {
        self.intelligence = Some(intelligence);
        self
    }

    pub fn registry(mut self, registry: Arc<CapabilityRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// # Errors
    ///
    /// `MissingDependency` if the LLM, tool registry or prompt service is
    /// absent; `InitializationFailed` if the configuration is invalid.
    pub fn build(self) -> Result<RuntimeOrchestrator, SystemError> {
        let llm = self.llm.ok_or(SystemError::MissingDependency("llm"))?;
        let tools = self.tools.ok_or(SystemError::MissingDependency("tools"))?;
        let prompts = self
            .prompts
            .ok_or(SystemError::MissingDependency("prompts"))?;
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| SystemError::InitializationFailed(e.to_string()))?;

        Ok(RuntimeOrchestrator {
            planning: PlanningEngine::new(
                Arc::clone(&tools),
                config.planning_tool.clone(),
                config.max_plan_steps,
            ),
            execution: ExecutionEngine::new(Arc::clone(&llm), Arc::clone(&tools), prompts),
            reflection: ReflectionEngine::new(Arc::clone(&tools), config.reflection_tool.clone()),
            conversation: ConversationEngine::new(llm),
            tools,
            intelligence: self.intelligence,
            registry: self.registry,
            config,
            state: RwLock::new(HealthState::Uninitialized),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            root_token: CancellationToken::new(),
        })
    }
}

// ============================================================================
// RuntimeOrchestrator
// ============================================================================

pub struct RuntimeOrchestrator {
    planning: PlanningEngine,
    execution: ExecutionEngine,
    reflection: ReflectionEngine,
    conversation: ConversationEngine,
    tools: Arc<dyn ToolRegistry>,
    intelligence: Option<Arc<dyn ContextIntelligence>>,
    registry: Option<Arc<CapabilityRegistry>>,
    config: RuntimeConfig,
    state: RwLock<HealthState>,
    sessions: SessionMap,
    root_token: CancellationToken,
}

impl std::fmt::Debug for RuntimeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeOrchestrator")
            .field("config", &self.config)
            .field("has_intelligence", &self.intelligence.is_some())
            .field("has_registry", &self.registry.is_some())
            .finish_non_exhaustive()
    }
}

/// What a step runs.
#[derive(Clone, Copy)]
enum StepWork<'a> {
    Task(&'a str),
    Planned(&'a PlannedStep),
}

/// Mutable state of one session while it runs.
struct SessionRun<'a> {
    task: &'a str,
    agent: &'a AgentConfig,
    context: ContextManager,
    conversation: Conversation,
    guard: CallGuard,
    plan: Option<ExecutionPlan>,
    metrics: RuntimeMetrics,
    tools_executed: Vec<ToolInvocation>,
}

impl SessionRun<'_> {
    fn advance(&mut self, next: ConversationState) {
        if let Err(e) = self.conversation.transition(next) {
            debug!(error = %e, "Conversation transition skipped");
        }
    }
}

impl RuntimeOrchestrator {
    pub fn builder() -> RuntimeOrchestratorBuilder {
        RuntimeOrchestratorBuilder::default()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> Option<&Arc<CapabilityRegistry>> {
        self.registry.as_ref()
    }

    /// Probe collaborators and become ready. Calling it again is a no-op.
    pub async fn initialize(&self) -> CadenceResult<()> {
        match *self.state.read().await {
            HealthState::Ready => return Ok(()),
            HealthState::Stopped => return Err(SystemError::ShuttingDown.into()),
            HealthState::Uninitialized => {}
        }

        let guard = CallGuard::new(self.config.call_timeout, self.root_token.child_token());
        let available = guard
            .run("tool discovery", self.tools.get_available_tools())
            .await
            .map_err(|e| SystemError::InitializationFailed(e.to_string()))?;

        if self.config.mode.is_enhanced() && !available.contains(&self.config.planning_tool) {
            warn!(tool = %self.config.planning_tool, "Planning tool not registered; planned tasks will fail");
        }
        if self.config.enable_reflection && !available.contains(&self.config.reflection_tool) {
            warn!(tool = %self.config.reflection_tool, "Reflection tool not registered; reflections will fall back to abort");
        }

        *self.state.write().await = HealthState::Ready;
        info!(
            tools = available.len(),
            mode = ?self.config.mode,
            reflection = self.config.enable_reflection,
            "Runtime initialized"
        );
        Ok(())
    }

    pub async fn health(&self) -> RuntimeHealth {
        RuntimeHealth {
            state: *self.state.read().await,
            active_sessions: self.sessions.read().await.len(),
        }
    }

    /// Sessions currently executing.
    pub async fn active_sessions(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries = Vec::with_capacity(sessions.len());
        for (id, session) in sessions.iter() {
            let memory = session.memory.lock().await;
            summaries.push(SessionSummary {
                execution_id: id.clone(),
                agent_id: memory.agent().id.clone(),
                status: memory.status(),
                current_step: memory.current_step(),
                total_steps: memory.total_steps(),
                started_at: memory.started_at(),
            });
        }
        summaries.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        summaries
    }

    /// Snapshot of a running session.
    pub async fn session_state(&self, execution_id: &ExecutionId) -> Option<ExecutionState> {
        let memory = Arc::clone(&self.sessions.read().await.get(execution_id)?.memory);
        let state = memory.lock().await.to_execution_state();
        Some(state)
    }

    /// Cancel one running session. Returns `false` if it is not active.
    pub async fn cancel(&self, execution_id: &ExecutionId) -> bool {
        let sessions = self.sessions.read().await;
        let Some(session) = sessions.get(execution_id) else {
            return false;
        };
        session.token.cancel();
        session.memory.lock().await.mark_aborted();
        info!(execution.id = %execution_id, "Execution cancelled");
        true
    }

    /// Abort every active session and stop accepting work.
    pub async fn shutdown(&self) {
        *self.state.write().await = HealthState::Stopped;
        self.root_token.cancel();

        let mut sessions = self.sessions.write().await;
        let aborted = sessions.len();
        for session in sessions.values() {
            session.memory.lock().await.mark_aborted();
        }
        sessions.clear();
        info!(aborted_sessions = aborted, "Runtime shut down");
    }

    /// Run `task` as `agent`.
    ///
    /// # Errors
    ///
    /// Only `SystemError::NotReady` (before `initialize()` or after
    /// `shutdown()`); every other failure is reported in the result.
    pub async fn execute(&self, task: &str, agent: &AgentConfig) -> CadenceResult<RuntimeResult> {
        let state = *self.state.read().await;
        if state != HealthState::Ready {
            return Err(SystemError::NotReady {
                state: state.to_string(),
            }
            .into());
        }

        let execution_id = ExecutionId::generate();
        let token = self.root_token.child_token();
        let guard = CallGuard::new(self.config.call_timeout, token.clone());
        let memory = ExecutionMemory::from_config(execution_id.clone(), agent.clone(), &self.config);
        let context = ContextManager::new(
            memory,
            self.intelligence.clone(),
            self.config.prune_interval_steps,
        );

        let entry = SessionEntry::open(
            &self.sessions,
            execution_id.clone(),
            ActiveSession {
                memory: context.memory(),
                token,
            },
        )
        .await;

        let span = info_span!(
            "runtime_execution",
            execution.id = %execution_id,
            agent.id = %agent.id,
            mode = ?self.config.mode
        );
        let result = self
            .run_session(execution_id.clone(), task, agent, context, guard)
            .instrument(span)
            .await;

        entry.close().await;
        Ok(result)
    }

    async fn run_session(
        &self,
        execution_id: ExecutionId,
        task: &str,
        agent: &AgentConfig,
        context: ContextManager,
        guard: CallGuard,
    ) -> RuntimeResult {
        let started = Instant::now();
        let analysis = self.planning.analyze_task(task);
        let planned = self.config.mode.is_enhanced() && analysis.requires_planning;
        info!(
            complexity = ?analysis.complexity,
            planned,
            task_chars = analysis.length,
            "Execution started"
        );

        let mut run = SessionRun {
            task,
            agent,
            conversation: self
                .conversation
                .initiate(prefixed_id("conv"), task, agent),
            context,
            guard,
            plan: None,
            metrics: RuntimeMetrics::default(),
            tools_executed: Vec::new(),
        };
        run.advance(ConversationState::Working);

        let outcome = if planned {
            self.run_plan(&mut run).await
        } else {
            self.run_step(&mut run, 1, StepWork::Task(task)).await
        };

        let cancelled = run.guard.is_cancelled();
        if !cancelled {
            run.context.refresh_insights(&run.guard).await;
        }

        let aborted = cancelled || run.context.status().await == ExecutionStatus::Aborted;
        let run_succeeded = !aborted && outcome.is_ok();

        let summarized = self
            .conversation
            .conclude(&mut run.conversation, agent, run_succeeded, &run.guard)
            .await;
        if !cancelled {
            run.metrics.llm_calls += 1;
        }
        let summary_error = (!summarized && !aborted)
            .then(|| RuntimeError::Conversation("summary unavailable".to_string()));
        if let Some(e) = &summary_error {
            run.context.record_error(e, None).await;
        }

        let success = run_succeeded && summarized;
        let status = if aborted {
            ExecutionStatus::Aborted
        } else if success {
            ExecutionStatus::Succeeded
        } else {
            ExecutionStatus::Failed
        };
        run.context.set_status(status).await;

        let error = match (outcome, summary_error) {
            (Err(e), _) => Some(e.to_string()),
            (Ok(()), _) if aborted => {
                Some(RuntimeError::Cancelled("execution".to_string()).to_string())
            }
            (Ok(()), Some(e)) => Some(e.to_string()),
            (Ok(()), None) => None,
        };

        let snapshot = run.context.snapshot().await;
        let mut metrics = run.metrics;
        metrics.duration_ms = started.elapsed().as_millis() as u64;
        metrics.working_memory_bytes = snapshot.memory_stats.total_bytes;
        metrics.insights = snapshot.insights.len();

        info!(
            success,
            status = %status,
            duration_ms = metrics.duration_ms,
            steps = metrics.steps_executed,
            llm_calls = metrics.llm_calls,
            tool_calls = metrics.tool_calls,
            "Execution finished"
        );

        RuntimeResult {
            execution_id,
            success,
            status,
            response: run
                .conversation
                .final_response()
                .unwrap_or(FALLBACK_RESPONSE)
                .to_string(),
            error,
            conversation: run.conversation,
            plan: run.plan,
            steps: snapshot.history,
            reflections: snapshot.reflections,
            metrics,
            tools_executed: (!run.tools_executed.is_empty()).then_some(run.tools_executed),
        }
    }

    async fn run_plan(&self, run: &mut SessionRun<'_>) -> CadenceResult<()> {
        let insights = run.context.insights().await;
        let mut plan = match self
            .planning
            .create_execution_plan(run.task, run.agent, &insights, &run.guard)
            .await
        {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Planning failed");
                run.context.record_error(&e, None).await;
                run.conversation.record_turn(
                    ChatRole::Assistant,
                    format!("I could not plan this task: {}", e),
                    json!({"planning": false}),
                );
                return Err(e);
            }
        };

        if plan.len() > self.config.max_plan_steps {
            warn!(
                plan.id = %plan.id,
                steps = plan.len(),
                limit = self.config.max_plan_steps,
                "Plan truncated to the step limit"
            );
            plan.steps.truncate(self.config.max_plan_steps);
        }

        let outline = plan
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step.description))
            .collect::<Vec<_>>()
            .join("\n");
        run.conversation.record_turn(
            ChatRole::Assistant,
            format!("Plan:\n{}", outline),
            json!({"plan_id": plan.id, "steps": plan.len()}),
        );
        run.context.set_plan(plan.clone()).await;
        run.plan = Some(plan.clone());

        for (i, step) in plan.steps.iter().enumerate() {
            self.run_step(run, i + 1, StepWork::Planned(step)).await?;
        }
        Ok(())
    }

    /// Execute one step, reflecting and retrying on failure.
    async fn run_step(
        &self,
        run: &mut SessionRun<'_>,
        index: usize,
        work: StepWork<'_>,
    ) -> CadenceResult<()> {
        let step_id = match work {
            StepWork::Task(_) => format!("step_{}", index),
            StepWork::Planned(step) => step.id.clone(),
        };
        let mut attempts: u32 = 0;

        loop {
            if let Err(e) = run.guard.check(&step_id) {
                run.context.record_error(&e, Some(&step_id)).await;
                return Err(e);
            }
            attempts += 1;
            let started_at = Utc::now();

            let (outcome, parameters) = match work {
                StepWork::Task(task) => (
                    self.execution.execute(task, run.agent, &run.guard).await,
                    json!({"task": task}),
                ),
                StepWork::Planned(step) => self.run_planned_step(run, index, step).await,
            };

            run.metrics.llm_calls += outcome.llm_calls;
            run.metrics.tool_calls += outcome.tool_calls();
            if let Some(calls) = &outcome.tools_executed {
                run.tools_executed.extend(calls.iter().cloned());
            }

            let record = outcome.to_execution_step(step_id.clone(), started_at, parameters);
            run.metrics.steps_executed += 1;
            run.conversation.record_turn(
                ChatRole::Assistant,
                outcome.response.clone().unwrap_or_else(|| record.summary.clone()),
                json!({
                    "step_id": step_id,
                    "success": record.success,
                    "tool": record.tool_used,
                    "attempt": attempts,
                }),
            );
            run.context.record_step(index, record.clone(), &run.guard).await;

            let error = match outcome.error {
                None if outcome.success => {
                    run.metrics.steps_succeeded += 1;
                    debug!(step = %step_id, attempts, "Step succeeded");
                    return Ok(());
                }
                Some(error) => error,
                None => RuntimeError::Validation("step reported failure".to_string()),
            };
            run.metrics.steps_failed += 1;
            warn!(step = %step_id, attempts, error = %error, "Step failed");
            run.context.record_error(&error, Some(&step_id)).await;

            if !self.config.enable_reflection || run.guard.is_cancelled() {
                return Err(error);
            }

            run.advance(ConversationState::Reflecting);
            let reflection = self.reflection.reflect(&record, run.task, &run.guard).await;
            run.metrics.reflections += 1;
            run.conversation.record_turn(
                ChatRole::Assistant,
                format!(
                    "Reflection on {}: {} ({})",
                    step_id, reflection.suggested_action, reflection.reasoning
                ),
                json!({
                    "step_id": step_id,
                    "reflection": true,
                    "suggested_action": reflection.suggested_action,
                    "confidence": reflection.confidence,
                }),
            );
            let action = reflection.suggested_action;
            run.context.add_reflection(reflection).await;

            match action {
                SuggestedAction::Retry if attempts < 1 + self.config.retry_attempts => {
                    run.advance(ConversationState::Adapting);
                    run.advance(ConversationState::Working);
                    run.metrics.retries += 1;
                    info!(step = %step_id, attempt = attempts + 1, "Retrying step");
                }
                SuggestedAction::ModifyPlan => {
                    run.advance(ConversationState::Working);
                    let halt = RuntimeError::Planning(format!(
                        "plan modification requested after {}: {}",
                        step_id, error
                    ));
                    run.context.record_error(&halt, Some(&step_id)).await;
                    return Err(halt);
                }
                _ => {
                    run.advance(ConversationState::Working);
                    return Err(error);
                }
            }
        }
    }

    async fn run_planned_step(
        &self,
        run: &SessionRun<'_>,
        index: usize,
        step: &PlannedStep,
    ) -> (StepOutcome, Value) {
        let mut prior = Vec::with_capacity(index.saturating_sub(1));
        for n in 1..index {
            prior.push(run.context.step_output(n).await);
        }
        let parameters = resolve_placeholders(&step.parameters, |n| {
            prior.get(n.checked_sub(1)?).cloned().flatten()
        })
        .value;

        let Some(capability) = &step.capability else {
            let outcome = self
                .execution
                .execute_planned_step(step, parameters.clone(), run.agent, &run.guard)
                .await;
            return (outcome, parameters);
        };

        let Some(component_id) = self.route_capability(capability).await else {
            let error = RuntimeError::Tool(ToolError::NotFound {
                tool: format!("provider of capability '{}'", capability),
            });
            return (
                StepOutcome::rejected(ExecutionMode::DirectTool, error),
                parameters,
            );
        };

        let routed = step.clone().with_tool(component_id.clone());
        let outcome = self
            .execution
            .execute_planned_step(&routed, parameters.clone(), run.agent, &run.guard)
            .await;

        if let Some(registry) = &self.registry {
            if let Err(e) = registry
                .update_metrics(&component_id, outcome.duration_ms as f64, outcome.success)
                .await
            {
                warn!(component.id = %component_id, error = %e, "Component metrics not updated");
            }
        }
        (outcome, parameters)
    }

    async fn route_capability(&self, capability: &str) -> Option<String> {
        let registry = self.registry.as_ref()?;
        let component = registry.select_for_capability(capability).await?;
        debug!(
            capability,
            component.id = %component.metadata.id,
            "Capability routed"
        );
        Some(component.metadata.id)
    }
}
