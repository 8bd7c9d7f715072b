//! Orchestrator - runs one user message through Decision, Execution and
//! Synthesis and records the flow on the user's session.
//!
//! `process_message` never returns an error. Every failure inside a stage
//! becomes a fallback decision, a failed response or the apology text, and
//! the caller always receives a response string plus the actions taken.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::domain::capability::{AgentCapabilities, CapabilityRegistry};
use crate::domain::flow::{ActionRecord, AgentResponse, FlowStatus, OrchestrationFlow};
use crate::domain::foundation::{Timestamp, UserId, ValidationError};
use crate::domain::session::{ContextMessage, ContextRole, Session};
use crate::domain::workflow::{Workflow, WorkflowStatus};
use crate::ports::{GenerationOptions, LlmAdapter, ResultCache, SessionStore};

use super::decision_stage::DecisionStage;
use super::execution_stage::{ExecutionStage, InvocationContext};
use super::session_manager::SessionManager;
use super::synthesis_stage::SynthesisStage;
use super::workflow_engine::{PauseHandle, WorkflowEngine};

/// Returned when the user id is blank.
pub const UNIDENTIFIED_USER_RESPONSE: &str =
    "I couldn't tell who sent that message. Please sign in and try again.";

/// Returned when there is no paused workflow to resume.
pub const NOTHING_TO_RESUME_RESPONSE: &str = "There's no paused task to pick up right now.";

/// What the caller of `process_message` receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedMessage {
    pub response: String,
    pub actions: Vec<ActionRecord>,
}

impl ProcessedMessage {
    fn text(response: &str) -> Self {
        Self {
            response: response.to_string(),
            actions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub capabilities: usize,
    pub active_sessions: usize,
    pub llm_adapter: String,
    pub llm_model: String,
}

/// Summary of a user's session with its most recent messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionHistory {
    pub user_id: String,
    pub message_count: u64,
    pub flow_count: usize,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
    pub last_message: Option<String>,
    pub last_response: Option<String>,
    pub paused_workflow: Option<String>,
    pub messages: Vec<ContextMessage>,
}

impl SessionHistory {
    fn from_session(session: &Session, limit: usize) -> Self {
        Self {
            user_id: session.user_id().to_string(),
            message_count: session.message_count(),
            flow_count: session.flows().len(),
            created_at: *session.created_at(),
            last_activity: *session.last_activity(),
            last_message: session.last_message().map(str::to_string),
            last_response: session.last_response().map(str::to_string),
            paused_workflow: session
                .context()
                .active_workflow()
                .map(|w| w.name().to_string()),
            messages: session.context().recent(limit).to_vec(),
        }
    }
}

pub struct Orchestrator {
    registry: Arc<CapabilityRegistry>,
    llm: Arc<dyn LlmAdapter>,
    decision: DecisionStage,
    execution: ExecutionStage,
    synthesis: SynthesisStage,
    workflows: WorkflowEngine,
    sessions: Arc<SessionManager>,
    max_flows_retained: usize,
    running_workflows: Mutex<HashMap<UserId, PauseHandle>>,
}

impl Orchestrator {
    /// Builds an orchestrator with default settings and no result cache.
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        llm: Arc<dyn LlmAdapter>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let config = AppConfig::default();
        let sessions = Arc::new(SessionManager::from_config(&config.session, store));
        Self::from_config(&config, registry, llm, sessions, None)
    }

    pub fn from_config(
        config: &AppConfig,
        registry: Arc<CapabilityRegistry>,
        llm: Arc<dyn LlmAdapter>,
        sessions: Arc<SessionManager>,
        cache: Option<Arc<dyn ResultCache>>,
    ) -> Self {
        let llm_config = &config.llm;
        let orchestration = &config.orchestrator;

        let decision = DecisionStage::new(registry.clone(), llm.clone())
            .with_options(
                GenerationOptions::new()
                    .with_temperature(llm_config.decision_temperature)
                    .with_max_tokens(llm_config.max_tokens),
            )
            .with_timeout(llm_config.timeout())
            .with_history_flows(orchestration.decision_history_flows)
            .with_general_query(orchestration.general_query_capability.clone());

        let mut execution = ExecutionStage::new(registry.clone())
            .with_timeout(orchestration.capability_timeout());
        if let Some(cache) = cache {
            execution = execution.with_cache(cache);
        }

        let synthesis = SynthesisStage::new(llm.clone())
            .with_options(
                GenerationOptions::new()
                    .with_temperature(llm_config.synthesis_temperature)
                    .with_max_tokens(llm_config.max_tokens),
            )
            .with_timeout(llm_config.timeout());

        Self {
            registry,
            llm,
            decision,
            workflows: WorkflowEngine::new(execution.clone()),
            execution,
            synthesis,
            sessions,
            max_flows_retained: orchestration.max_flows_retained,
            running_workflows: Mutex::new(HashMap::new()),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Message processing
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs one message through the pipeline. Never fails.
    pub async fn process_message(
        &self,
        user_id: &str,
        text: &str,
        metadata: Option<Value>,
    ) -> ProcessedMessage {
        let Ok(user_id) = UserId::new(user_id) else {
            warn!("Rejecting message with blank user id");
            return ProcessedMessage::text(UNIDENTIFIED_USER_RESPONSE);
        };
        let started = Instant::now();
        let _guard = self.sessions.lock_user(&user_id).await;

        let mut session = self.sessions.load_or_create(&user_id).await;
        let mut message = ContextMessage::new(ContextRole::User, text);
        if let Some(metadata) = metadata {
            message = message.with_metadata(metadata);
        }
        self.sessions.append_message(&mut session, message).await;

        let mut flow = OrchestrationFlow::new(text);
        debug!(user_id = %user_id, flow_id = %flow.id(), "Processing message");

        let outcome = self.decision.decide(text, &session).await;
        let result = flow.complete_decision(
            outcome.decisions.clone(),
            outcome.reasoning,
            outcome.fallback_used,
        );
        audit(&flow, result);

        let context = InvocationContext::from_session(&session);
        let (responses, actions) = match outcome.workflow {
            Some(workflow) => {
                let result = flow.attach_workflow(workflow.id().clone());
                audit(&flow, result);
                self.run_workflow(&mut session, workflow, &context, false)
                    .await
            }
            None => {
                let responses = self.execution.execute(&outcome.decisions, &context).await;
                let actions =
                    ActionRecord::from_decisions(&outcome.decisions, &responses, Timestamp::now());
                (responses, actions)
            }
        };

        let response = self
            .finish_flow(&mut session, flow, text, responses, started)
            .await;
        ProcessedMessage { response, actions }
    }

    /// Continues the user's paused workflow, if there is one. Never fails.
    pub async fn resume_workflow(&self, user_id: &str) -> ProcessedMessage {
        let Ok(user_id) = UserId::new(user_id) else {
            return ProcessedMessage::text(UNIDENTIFIED_USER_RESPONSE);
        };
        let started = Instant::now();
        let _guard = self.sessions.lock_user(&user_id).await;

        let mut session = self.sessions.load_or_create(&user_id).await;
        let Some(workflow) = session.context_mut().take_active_workflow() else {
            return ProcessedMessage::text(NOTHING_TO_RESUME_RESPONSE);
        };
        info!(user_id = %user_id, workflow_id = %workflow.id(), "Resuming workflow");

        let request = session
            .last_message()
            .map(str::to_string)
            .unwrap_or_else(|| workflow.name().to_string());
        let mut flow = OrchestrationFlow::new(request.clone());
        let result = flow
            .complete_decision(Vec::new(), format!("resume workflow {}", workflow.name()), false)
            .and_then(|()| flow.attach_workflow(workflow.id().clone()));
        audit(&flow, result);

        let context = InvocationContext::from_session(&session);
        let (responses, actions) = self
            .run_workflow(&mut session, workflow, &context, true)
            .await;

        let response = self
            .finish_flow(&mut session, flow, &request, responses, started)
            .await;
        ProcessedMessage { response, actions }
    }

    /// Asks the user's running workflow to pause before its next step.
    /// Returns false if no workflow is running for the user.
    pub fn pause_workflow(&self, user_id: &str) -> bool {
        let Ok(user_id) = UserId::new(user_id) else {
            return false;
        };
        match self.pause_handles().get(&user_id) {
            Some(handle) => {
                handle.request();
                true
            }
            None => false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session history
    // ─────────────────────────────────────────────────────────────────────────

    /// The user's session summary with up to `limit` recent messages, or
    /// `None` if the user has no session.
    pub async fn session_history(&self, user_id: &str, limit: usize) -> Option<SessionHistory> {
        let user_id = UserId::new(user_id).ok()?;
        let session = self.sessions.find(&user_id).await?;
        Some(SessionHistory::from_session(&session, limit))
    }

    /// Forgets the user's session, including any paused workflow. Waits for
    /// an in-flight message from the same user to finish first. Returns
    /// false if there was nothing to clear.
    pub async fn clear_session(&self, user_id: &str) -> bool {
        let Ok(user_id) = UserId::new(user_id) else {
            return false;
        };
        let _guard = self.sessions.lock_user(&user_id).await;
        self.sessions.clear(&user_id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Discovery and health
    // ─────────────────────────────────────────────────────────────────────────

    pub fn list_capabilities(&self) -> Vec<AgentCapabilities> {
        self.registry.list_public()
    }

    pub async fn health(&self) -> HealthReport {
        let info = self.llm.adapter_info();
        HealthReport {
            status: "healthy".to_string(),
            capabilities: self.registry.public_count(),
            active_sessions: self.sessions.active_sessions().await,
            llm_adapter: info.name,
            llm_model: info.model,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn run_workflow(
        &self,
        session: &mut Session,
        mut workflow: Workflow,
        context: &InvocationContext,
        resume: bool,
    ) -> (Vec<AgentResponse>, Vec<ActionRecord>) {
        let user_id = session.user_id().clone();
        let pause = PauseHandle::new();
        self.pause_handles().insert(user_id.clone(), pause.clone());

        let result = if resume {
            match workflow.resume() {
                Ok(()) => {
                    self.workflows
                        .run_with_pause(&mut workflow, context, &pause)
                        .await
                }
                Err(e) => Err(e),
            }
        } else {
            self.workflows
                .run_with_pause(&mut workflow, context, &pause)
                .await
        };
        self.pause_handles().remove(&user_id);

        match result {
            Ok(WorkflowStatus::Paused) => {
                info!(user_id = %user_id, workflow_id = %workflow.id(), "Workflow paused, saving to session");
            }
            Ok(status) => {
                debug!(workflow_id = %workflow.id(), status = ?status, "Workflow finished");
            }
            Err(e) => {
                warn!(workflow_id = %workflow.id(), error = %e, "Workflow could not run");
            }
        }

        let now = Timestamp::now();
        let actions = workflow
            .steps()
            .iter()
            .filter_map(|step| {
                let response = step.to_response()?;
                let parameters = step
                    .resolved_parameters()
                    .unwrap_or_else(|| step.parameters())
                    .clone();
                Some(ActionRecord::from_outcome(parameters, &response, now))
            })
            .collect();
        let responses = workflow.responses();

        if workflow.status() == WorkflowStatus::Paused {
            session.context_mut().set_active_workflow(workflow);
        }
        (responses, actions)
    }

    /// Runs synthesis, seals the flow and saves the session.
    async fn finish_flow(
        &self,
        session: &mut Session,
        mut flow: OrchestrationFlow,
        request: &str,
        responses: Vec<AgentResponse>,
        started: Instant,
    ) -> String {
        let result = flow.complete_execution(responses.clone());
        audit(&flow, result);

        let synthesis = self.synthesis.synthesize(request, &responses).await;
        let result = match &synthesis.error {
            None => flow.complete_synthesis(synthesis.response.clone(), synthesis.reasoning.clone()),
            Some(error) => flow.fail_synthesis(synthesis.response.clone(), error.clone()),
        };
        audit(&flow, result);

        let status = flow.finish().unwrap_or_else(|e| {
            warn!(flow_id = %flow.id(), error = %e, "Flow could not be sealed");
            FlowStatus::Failed
        });
        info!(
            user_id = %session.user_id(),
            flow_id = %flow.id(),
            status = ?status,
            actions = responses.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Flow finished"
        );

        self.sessions
            .append_message(
                session,
                ContextMessage::new(ContextRole::Agent, synthesis.response.clone()),
            )
            .await;
        session.record_flow(flow, self.max_flows_retained);
        self.sessions.persist(session).await;

        synthesis.response
    }

    fn pause_handles(&self) -> MutexGuard<'_, HashMap<UserId, PauseHandle>> {
        self.running_workflows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Logs a flow bookkeeping error. These only occur on programming errors.
fn audit(flow: &OrchestrationFlow, result: Result<(), ValidationError>) {
    if let Err(e) = result {
        warn!(flow_id = %flow.id(), error = %e, "Flow transition rejected");
    }
}
