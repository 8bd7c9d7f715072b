//! Workflow engine - runs explicit, dependency-ordered capability chains.
//!
//! Steps run in the order given. Before a step runs, every dependency must
//! have a result and every `${...}` placeholder in its parameters is
//! resolved against earlier results. The first failure fails the workflow;
//! results of steps that already completed are kept for diagnostics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::foundation::ValidationError;
use crate::domain::workflow::{resolve_parameters, Workflow, WorkflowError, WorkflowStatus};

use super::execution_stage::{ExecutionStage, InvocationContext};

/// Requests a pause from another task. The engine honours it between steps.
#[derive(Debug, Clone, Default)]
pub struct PauseHandle {
    requested: Arc<AtomicBool>,
}

impl PauseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

pub struct WorkflowEngine {
    execution: ExecutionStage,
}

impl WorkflowEngine {
    pub fn new(execution: ExecutionStage) -> Self {
        Self { execution }
    }

    /// Runs an active workflow until it completes, fails or is paused.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the workflow is not active. Step failures are
    /// recorded on the workflow, not returned.
    pub async fn run(
        &self,
        workflow: &mut Workflow,
        context: &InvocationContext,
    ) -> Result<WorkflowStatus, WorkflowError> {
        self.run_with_pause(workflow, context, &PauseHandle::new())
            .await
    }

    /// Like [`Self::run`], pausing between steps once `pause` is requested.
    pub async fn run_with_pause(
        &self,
        workflow: &mut Workflow,
        context: &InvocationContext,
        pause: &PauseHandle,
    ) -> Result<WorkflowStatus, WorkflowError> {
        if !workflow.is_active() {
            return Err(WorkflowError::InvalidTransition(
                ValidationError::invalid_format(
                    "workflow",
                    format!("Workflow {} is {:?}", workflow.id(), workflow.status()),
                ),
            ));
        }
        info!(
            workflow_id = %workflow.id(),
            name = %workflow.name(),
            from_step = workflow.current_step_index(),
            "Running workflow"
        );

        loop {
            if pause.take() {
                workflow.pause()?;
                info!(
                    workflow_id = %workflow.id(),
                    at_step = workflow.current_step_index(),
                    "Workflow paused"
                );
                return Ok(WorkflowStatus::Paused);
            }

            let Some(step) = workflow.current_step() else {
                workflow.complete()?;
                info!(workflow_id = %workflow.id(), "Workflow completed");
                return Ok(WorkflowStatus::Completed);
            };
            let step_id = step.id().to_string();
            let capability = step.capability().to_string();

            if let Some(dependency) = workflow.unmet_dependency() {
                let cause = WorkflowError::DependencyUnmet {
                    step: step_id,
                    dependency: dependency.to_string(),
                };
                return self.fail(workflow, cause, None);
            }

            let resolved = match resolve_parameters(step.parameters(), workflow.results()) {
                Ok(resolved) => resolved,
                Err(source) => {
                    let cause = WorkflowError::Interpolation {
                        step: step_id,
                        source,
                    };
                    return self.fail(workflow, cause, None);
                }
            };

            if let Some(agent) = self.execution.agent_of(&capability) {
                let index = workflow.current_step_index();
                if let Some(step) = workflow.steps_mut().get_mut(index) {
                    step.set_agent(agent);
                }
            }
            workflow.begin_current_step(resolved.clone())?;
            debug!(workflow_id = %workflow.id(), step = %step_id, capability = %capability, "Running step");

            let invocation = self.execution.invoke(&capability, resolved, context).await;
            match invocation.result {
                Ok(value) => workflow.complete_current_step(value, invocation.elapsed_ms)?,
                Err(e) => {
                    let cause = WorkflowError::StepFailed {
                        step: step_id,
                        message: e.message(),
                    };
                    return self.fail(workflow, cause, Some(invocation.elapsed_ms));
                }
            }
        }
    }

    /// Pauses an active workflow, keeping its position.
    pub fn pause(&self, workflow: &mut Workflow) -> Result<(), WorkflowError> {
        workflow.pause()
    }

    /// Reactivates a paused workflow and continues from the step where it
    /// stopped. Completed steps are not re-run.
    pub async fn resume(
        &self,
        workflow: &mut Workflow,
        context: &InvocationContext,
    ) -> Result<WorkflowStatus, WorkflowError> {
        workflow.resume()?;
        self.run(workflow, context).await
    }

    fn fail(
        &self,
        workflow: &mut Workflow,
        cause: WorkflowError,
        elapsed_ms: Option<u64>,
    ) -> Result<WorkflowStatus, WorkflowError> {
        warn!(
            workflow_id = %workflow.id(),
            step = cause.step().unwrap_or_default(),
            error = %cause,
            "Workflow failed"
        );
        workflow.fail_current_step(&cause, elapsed_ms)?;
        Ok(WorkflowStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::{
        handler_fn, AgentGroup, Capability, CapabilityArgs, CapabilityRegistry, HandlerError,
    };
    use crate::domain::workflow::{StepStatus, WorkflowStep};
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;

    struct Fixture {
        engine: WorkflowEngine,
        calls: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let mut registry = CapabilityRegistry::new();
        registry
            .register_group(
                AgentGroup::new("tools", "Test tools")
                    .with_capability(Capability::new(
                        "produce",
                        "Produces X",
                        handler_fn(|_| async { Ok(json!({"X": 42, "label": "answer"})) }),
                    ))
                    .with_capability(Capability::new(
                        "echo",
                        "Echoes arguments",
                        handler_fn(move |args: CapabilityArgs| {
                            let counted = counted.clone();
                            async move {
                                counted.fetch_add(1, Ordering::SeqCst);
                                let mut map = args.into_inner();
                                map.remove("context");
                                map.remove("user_id");
                                Ok::<_, HandlerError>(Value::Object(map))
                            }
                        }),
                    ))
                    .with_capability(Capability::new(
                        "fail",
                        "Fails",
                        handler_fn(|_| async { Err(HandlerError::new("upstream down")) }),
                    )),
            )
            .unwrap();
        let execution = ExecutionStage::new(Arc::new(registry));
        Fixture {
            engine: WorkflowEngine::new(execution),
            calls,
        }
    }

    fn context() -> InvocationContext {
        InvocationContext::new("alice", json!([]))
    }

    fn three_steps() -> Workflow {
        Workflow::new(
            "chain",
            vec![
                WorkflowStep::new("step1", "produce"),
                WorkflowStep::new("step2", "echo")
                    .with_parameter("value", json!("${X}"))
                    .with_parameter("text", json!("got ${step1.label}"))
                    .depends_on("step1"),
                WorkflowStep::new("step3", "echo")
                    .with_parameter("previous", json!("${step2.value}"))
                    .depends_on("step2"),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn resolves_outputs_of_earlier_steps() {
        let f = fixture();
        let mut workflow = three_steps();

        let status = f.engine.run(&mut workflow, &context()).await.unwrap();

        assert_eq!(status, WorkflowStatus::Completed);
        let step2 = workflow.step("step2").unwrap();
        assert_eq!(step2.resolved_parameters().unwrap()["value"], json!(42));
        assert_eq!(step2.resolved_parameters().unwrap()["text"], json!("got answer"));
        assert_eq!(step2.agent(), "tools");
        assert_eq!(workflow.results().get("step3").unwrap()["previous"], json!(42));
        assert_eq!(workflow.responses().len(), 3);
    }

    #[tokio::test]
    async fn unmet_dependency_fails_without_invoking_step() {
        let f = fixture();
        let mut workflow = Workflow::new(
            "broken",
            vec![WorkflowStep::new("only", "echo").depends_on("missing")],
        )
        .unwrap();

        let status = f.engine.run(&mut workflow, &context()).await.unwrap();

        assert_eq!(status, WorkflowStatus::Failed);
        assert_eq!(workflow.status(), WorkflowStatus::Failed);
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
        assert_eq!(workflow.step("only").unwrap().status(), StepStatus::Failed);
    }

    #[tokio::test]
    async fn step_failure_halts_and_keeps_partial_results() {
        let f = fixture();
        let mut workflow = Workflow::new(
            "halts",
            vec![
                WorkflowStep::new("a", "produce"),
                WorkflowStep::new("b", "fail").depends_on("a"),
                WorkflowStep::new("c", "echo").depends_on("b"),
            ],
        )
        .unwrap();

        let status = f.engine.run(&mut workflow, &context()).await.unwrap();

        assert_eq!(status, WorkflowStatus::Failed);
        assert!(workflow.results().contains("a"));
        assert_eq!(workflow.step("b").unwrap().error(), Some("upstream down"));
        assert_eq!(workflow.step("c").unwrap().status(), StepStatus::Pending);
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unresolvable_placeholder_fails_step() {
        let f = fixture();
        let mut workflow = Workflow::new(
            "typo",
            vec![WorkflowStep::new("a", "echo").with_parameter("v", json!("${nope}"))],
        )
        .unwrap();

        let status = f.engine.run(&mut workflow, &context()).await.unwrap();

        assert_eq!(status, WorkflowStatus::Failed);
        assert!(workflow.error().unwrap().contains("${nope}"));
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pause_request_stops_before_next_step() {
        let f = fixture();
        let mut workflow = three_steps();
        let pause = PauseHandle::new();

        pause.request();
        let status = f
            .engine
            .run_with_pause(&mut workflow, &context(), &pause)
            .await
            .unwrap();
        assert_eq!(status, WorkflowStatus::Paused);
        assert_eq!(workflow.current_step_index(), 0);
        assert!(!pause.is_requested());

        let status = f.engine.resume(&mut workflow, &context()).await.unwrap();
        assert_eq!(status, WorkflowStatus::Completed);
        assert_eq!(f.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn resume_continues_from_saved_index() {
        let f = fixture();
        let mut workflow = three_steps();

        // complete step1 by hand, then pause
        workflow.begin_current_step(serde_json::Map::new()).unwrap();
        workflow
            .complete_current_step(json!({"X": 7, "label": "manual"}), 1)
            .unwrap();
        f.engine.pause(&mut workflow).unwrap();
        assert_eq!(workflow.status(), WorkflowStatus::Paused);

        let status = f.engine.resume(&mut workflow, &context()).await.unwrap();

        assert_eq!(status, WorkflowStatus::Completed);
        assert_eq!(workflow.results().get("step3").unwrap()["previous"], json!(7));
        assert_eq!(f.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn running_a_finished_workflow_is_rejected() {
        let f = fixture();
        let mut workflow = Workflow::new("one", vec![WorkflowStep::new("a", "produce")]).unwrap();
        f.engine.run(&mut workflow, &context()).await.unwrap();

        let err = f.engine.run(&mut workflow, &context()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition(_)));
    }
}
