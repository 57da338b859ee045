//! # Stage Sequencer
//!
//! Drives one run through the pipeline:
//!
//! ```text
//! Ready -> Parsing -> Preparing -> Analyzing -> Synthesizing -> AwaitingApproval -> Completed
//!   (any non-terminal stage) -> Failed
//! ```
//!
//! The sequencer is the only writer of its [`Run`]. Every mutation and the
//! event describing it happen under the run's write lock, so the order of
//! events on the bus matches the order of changes to the run. A collaborator
//! that panics fails its stage like one that returns an error.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::RunFailure;
use crate::state::{Decision, Output, Run, RunId, RunResult, StateError};
use crate::workflow::analysis::AnalysisTaskSet;
use crate::workflow::approval::{ApprovalGate, GateOutcome};
use crate::workflow::collaborators::{AnalysisContext, Collaborators, Document, FinalDocument};
use crate::workflow::events::{EventBus, WorkflowEvent};
use crate::workflow::pipeline::{analysis_progress, Stage};

/// Source name for engine-generated outputs
pub const SYSTEM_SOURCE: &str = "system";
/// Source name for the synthesized report
pub const REPORT_SOURCE: &str = "report_writer";
/// Source name for the recorded human decision
pub const REVIEWER_SOURCE: &str = "reviewer";

/// Shared handles to one run, held by the sequencer and the coordinator
#[derive(Clone)]
pub(crate) struct RunChannels {
    pub run: Arc<RwLock<Run>>,
    pub gate: Arc<ApprovalGate>,
    pub cancel: CancellationToken,
}

pub struct StageSequencer {
    run_id: RunId,
    document: Document,
    channels: RunChannels,
    bus: Arc<EventBus>,
    stage_tx: watch::Sender<Stage>,
    collaborators: Collaborators,
    config: Arc<EngineConfig>,
}

impl StageSequencer {
    pub(crate) fn new(
        run_id: RunId,
        document: Document,
        channels: RunChannels,
        bus: Arc<EventBus>,
        stage_tx: watch::Sender<Stage>,
        collaborators: Collaborators,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            run_id,
            document,
            channels,
            bus,
            stage_tx,
            collaborators,
            config,
        }
    }

    /// Run the pipeline to a terminal stage and return the result
    #[tracing::instrument(skip(self), fields(run_id = %self.run_id, document = %self.document.name))]
    pub async fn run(self) -> RunResult {
        self.publish_status().await;

        let result = match self.execute().await {
            Ok((result, final_document)) => {
                self.finish_completed(result.clone(), final_document).await;
                result
            }
            Err(failure) => {
                let result = RunResult::Failed(failure.clone());
                self.finish_failed(failure).await;
                result
            }
        };

        tracing::info!(?result, "Review run finished");
        result
    }

    async fn execute(&self) -> Result<(RunResult, FinalDocument), RunFailure> {
        let collaborators = &self.collaborators;

        // PARSE
        self.enter(Stage::Parsing).await?;
        let concept = self
            .cancellable(contained("parser", collaborators.parser.parse(&self.document)))
            .await?
            .map_err(|e| RunFailure::ParseFailure(RunFailure::describe(&e)))?;
        self.emit_output(Output::info(
            SYSTEM_SOURCE,
            format!(
                "Parsed {} slides with {} concept elements",
                concept.total_slides(),
                concept.concept_elements().count()
            ),
        ))
        .await;

        // PREPARE
        self.enter(Stage::Preparing).await?;
        let context = self
            .cancellable(contained("preparer", collaborators.preparer.prepare(&concept)))
            .await?
            .map_err(|e| RunFailure::PreparationFailure(RunFailure::describe(&e)))?;
        self.emit_output(Output::info(
            SYSTEM_SOURCE,
            format!("Analysis brief prepared ({} characters)", context.brief.len()),
        ))
        .await;

        // ANALYZE
        self.enter(Stage::Analyzing).await?;
        let outputs = self.analyze(Arc::new(context)).await?;

        // SYNTHESIZE
        self.enter(Stage::Synthesizing).await?;
        let report = self
            .cancellable(contained(
                "synthesizer",
                collaborators.synthesizer.synthesize(&outputs),
            ))
            .await?
            .map_err(|e| RunFailure::SynthesisFailure(RunFailure::describe(&e)))?;
        self.emit_output(Output::agent_result(REPORT_SOURCE, report.clone()))
            .await;

        // APPROVE
        self.enter(Stage::AwaitingApproval).await?;
        let (decision, feedback) = self.await_decision(&report).await?;

        // RENDER
        let final_document = contained(
            "renderer",
            collaborators
                .renderer
                .render(decision, &report, feedback.as_deref(), &concept),
        )
        .await
            .map_err(|e| RunFailure::RenderFailure(RunFailure::describe(&e)))?;

        Ok((decision.into(), final_document))
    }

    /// Run every analyst, surfacing each output as its task settles
    async fn analyze(
        &self,
        context: Arc<AnalysisContext>,
    ) -> Result<Vec<Output>, RunFailure> {
        let mut tasks = AnalysisTaskSet::start(&self.collaborators.analysts, context);
        let total = tasks.total();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.channels.cancel.cancelled() => None,
                settled = tasks.next_settled() => Some(settled),
            };
            let Some(settled) = next else {
                tasks.abort_all();
                tracing::info!("Analysis aborted by cancellation");
                return Err(RunFailure::Cancelled);
            };
            let Some(task) = settled else { break };

            let progress = analysis_progress(tasks.settled(), total);
            let mut run = self.channels.run.write().await;
            if let Some(output) = task.output {
                log_state(run.push_output(output.clone()));
                self.bus
                    .publish(self.run_id, WorkflowEvent::OutputAdded { output });
            }
            log_state(run.advance_progress(progress));
            self.bus.publish(
                self.run_id,
                WorkflowEvent::StatusUpdate {
                    run: run.snapshot(),
                },
            );
        }

        let summary = tasks.summary();
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            policy = %self.config.success_policy,
            "Analysis settled"
        );
        summary.evaluate(self.config.success_policy)?;

        Ok(tasks
            .tasks()
            .iter()
            .filter_map(|t| t.output.clone())
            .collect())
    }

    /// Park on the approval gate until a decision or a cancellation arrives
    async fn await_decision(
        &self,
        report: &str,
    ) -> Result<(Decision, Option<String>), RunFailure> {
        let question = self.config.approval_question.clone();
        let context = self.config.approval_context(report);

        let mut waiter = {
            let mut run = self.channels.run.write().await;
            log_state(run.open_approval(question.clone(), context.clone()));
            // Armed before the request is announced, so a fast reply is never refused
            let waiter = self
                .channels
                .gate
                .request()
                .map_err(|_| RunFailure::Cancelled)?;
            self.bus.publish(
                self.run_id,
                WorkflowEvent::ApprovalRequest { question, context },
            );
            let output = Output::info(SYSTEM_SOURCE, "Awaiting human approval");
            log_state(run.push_output(output.clone()));
            self.bus
                .publish(self.run_id, WorkflowEvent::OutputAdded { output });
            waiter
        };

        tracing::info!("Waiting for approval decision");
        let outcome = tokio::select! {
            biased;
            outcome = &mut waiter => outcome.unwrap_or(GateOutcome::Cancelled),
            _ = self.channels.cancel.cancelled() => GateOutcome::Cancelled,
        };

        match outcome {
            GateOutcome::Decided { decision, feedback } => {
                let mut run = self.channels.run.write().await;
                log_state(run.record_decision(decision, feedback.clone()));
                let feedback = run.approval().and_then(|a| a.feedback.clone());
                let content = match &feedback {
                    Some(text) => format!("Decision: {} - {}", decision, text),
                    None => format!("Decision: {}", decision),
                };
                let output = Output::info(REVIEWER_SOURCE, content);
                log_state(run.push_output(output.clone()));
                self.bus
                    .publish(self.run_id, WorkflowEvent::OutputAdded { output });
                Ok((decision, feedback))
            }
            GateOutcome::Cancelled => Err(RunFailure::Cancelled),
        }
    }

    /// Await a collaborator unless the run is cancelled first
    async fn cancellable<T>(&self, work: impl Future<Output = T>) -> Result<T, RunFailure> {
        tokio::select! {
            biased;
            _ = self.channels.cancel.cancelled() => Err(RunFailure::Cancelled),
            value = work => Ok(value),
        }
    }

    /// Enter the next stage and publish the new status
    async fn enter(&self, stage: Stage) -> Result<(), RunFailure> {
        if self.channels.cancel.is_cancelled() {
            return Err(RunFailure::Cancelled);
        }
        let mut run = self.channels.run.write().await;
        log_state(run.enter(stage));
        self.bus.publish(
            self.run_id,
            WorkflowEvent::StatusUpdate {
                run: run.snapshot(),
            },
        );
        let progress = run.progress();
        drop(run);

        self.stage_tx.send_replace(stage);
        tracing::info!(%stage, progress, "Stage entered");
        Ok(())
    }

    async fn emit_output(&self, output: Output) {
        let mut run = self.channels.run.write().await;
        log_state(run.push_output(output.clone()));
        self.bus
            .publish(self.run_id, WorkflowEvent::OutputAdded { output });
    }

    async fn publish_status(&self) {
        let run = self.channels.run.read().await;
        self.bus.publish(
            self.run_id,
            WorkflowEvent::StatusUpdate {
                run: run.snapshot(),
            },
        );
    }

    async fn finish_completed(&self, result: RunResult, final_document: FinalDocument) {
        {
            let mut run = self.channels.run.write().await;
            log_state(run.complete());
            // Terminal for the coordinator before anyone sees the terminal event
            self.stage_tx.send_replace(Stage::Completed);
            self.bus.publish(
                self.run_id,
                WorkflowEvent::StatusUpdate {
                    run: run.snapshot(),
                },
            );
            self.bus.publish(
                self.run_id,
                WorkflowEvent::Completion {
                    result,
                    final_document,
                },
            );
        }
    }

    async fn finish_failed(&self, failure: RunFailure) {
        {
            let mut run = self.channels.run.write().await;
            let output = Output::error(SYSTEM_SOURCE, failure.to_string());
            log_state(run.push_output(output.clone()));
            self.bus
                .publish(self.run_id, WorkflowEvent::OutputAdded { output });
            log_state(run.fail(failure.clone()));
            self.stage_tx.send_replace(Stage::Failed);
            self.bus.publish(
                self.run_id,
                WorkflowEvent::StatusUpdate {
                    run: run.snapshot(),
                },
            );
            self.bus.publish(self.run_id, WorkflowEvent::error(failure.clone()));
        }
        if failure.is_cancelled() {
            tracing::info!("Review run cancelled");
        } else {
            tracing::warn!(%failure, "Review run failed");
        }
    }
}

/// Await a collaborator, turning a panic into an error for its stage
async fn contained<T>(
    collaborator: &str,
    work: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(collaborator, panic = message, "Collaborator panicked");
            Err(anyhow::anyhow!("{} panicked: {}", collaborator, message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// The sequencer drives stages in order, so a refused mutation is a bug
fn log_state(result: Result<(), StateError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Run state rejected a mutation");
    }
}
