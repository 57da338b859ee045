//! # Review Coordinator
//!
//! The only way in from the outside: start a run, watch its events, answer
//! its approval request or cancel it. At most one run is active at a time.

use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::ControlError;
use crate::state::{Decision, Run, RunId, RunResult, RunSnapshot};
use crate::workflow::approval::ApprovalGate;
use crate::workflow::collaborators::{Collaborators, Document};
use crate::workflow::events::{EventBus, EventSubscription};
use crate::workflow::pipeline::Stage;
use crate::workflow::sequencer::{RunChannels, StageSequencer};

/// Handles kept for the most recent run
struct RunHandle {
    run_id: RunId,
    channels: RunChannels,
    stage_rx: watch::Receiver<Stage>,
    task: JoinHandle<RunResult>,
}

impl RunHandle {
    /// A sequencer task that ended without reaching a terminal stage died
    /// outside any collaborator; it must not hold the coordinator forever.
    fn is_terminal(&self) -> bool {
        self.stage_rx.borrow().is_terminal() || self.task.is_finished()
    }
}

#[derive(Clone)]
struct RunSetup {
    config: Arc<EngineConfig>,
    collaborators: Collaborators,
}

pub struct Coordinator {
    setup: RwLock<RunSetup>,
    bus: Arc<EventBus>,
    current: Mutex<Option<RunHandle>>,
}

impl Coordinator {
    /// Create a coordinator. Event delivery limits are fixed here; the rest
    /// of `config` may be replaced later with [`Coordinator::reconfigure`].
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        let bus = EventBus::new(config.event_queue_capacity, config.replay_window);
        Self {
            setup: RwLock::new(RunSetup {
                config: Arc::new(config),
                collaborators,
            }),
            bus,
            current: Mutex::new(None),
        }
    }

    /// Swap config and collaborators for subsequent runs
    pub async fn reconfigure(&self, config: EngineConfig, collaborators: Collaborators) {
        *self.setup.write().await = RunSetup {
            config: Arc::new(config),
            collaborators,
        };
        tracing::info!("Coordinator reconfigured");
    }

    pub async fn config(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.setup.read().await.config)
    }

    /// Start reviewing a document. Refused while another run is active.
    pub async fn start_run(&self, document: Document) -> Result<RunId, ControlError> {
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(|handle| !handle.is_terminal()) {
            return Err(ControlError::RunAlreadyActive);
        }

        let setup = self.setup.read().await.clone();
        let run = Run::new(document.name.clone());
        let run_id = run.id();
        let channels = RunChannels {
            run: Arc::new(RwLock::new(run)),
            gate: Arc::new(ApprovalGate::new()),
            cancel: CancellationToken::new(),
        };
        let (stage_tx, stage_rx) = watch::channel(Stage::Ready);

        tracing::info!(%run_id, document = %document.name, "Starting review run");
        let sequencer = StageSequencer::new(
            run_id,
            document,
            channels.clone(),
            Arc::clone(&self.bus),
            stage_tx,
            setup.collaborators,
            setup.config,
        );
        let task = tokio::spawn(sequencer.run());

        *current = Some(RunHandle {
            run_id,
            channels,
            stage_rx,
            task,
        });
        Ok(run_id)
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Deliver the human decision to the run parked on its approval gate
    pub async fn submit_approval(
        &self,
        decision: Decision,
        feedback: Option<String>,
    ) -> Result<(), ControlError> {
        let current = self.current.lock().await;
        let handle = current.as_ref().ok_or(ControlError::NoActiveRun)?;
        handle.channels.gate.resolve(decision, feedback)
    }

    /// Cancel the active run.
    ///
    /// Once a decision is recorded the run only has its final document left
    /// to render, and cancelling is refused with
    /// [`ControlError::DecisionRecorded`] until it finishes. A run that
    /// already has a cancellation pending reports [`ControlError::NoActiveRun`].
    pub async fn cancel_run(&self) -> Result<(), ControlError> {
        let current = self.current.lock().await;
        let handle = current
            .as_ref()
            .filter(|handle| !handle.is_terminal())
            .ok_or(ControlError::NoActiveRun)?;

        if !handle.channels.gate.cancel() {
            return Err(if handle.channels.gate.is_resolved() {
                ControlError::DecisionRecorded
            } else {
                ControlError::NoActiveRun
            });
        }
        handle.channels.cancel.cancel();
        tracing::info!(run_id = %handle.run_id, "Cancellation requested");
        Ok(())
    }

    pub async fn current_run_id(&self) -> Option<RunId> {
        self.current.lock().await.as_ref().map(|handle| handle.run_id)
    }

    /// Snapshot of the most recent run, if any
    pub async fn snapshot(&self) -> Option<RunSnapshot> {
        let run = {
            let current = self.current.lock().await;
            Arc::clone(&current.as_ref()?.channels.run)
        };
        let snapshot = run.read().await.snapshot();
        Some(snapshot)
    }

    /// Wait until the most recent run is terminal and return its final snapshot
    pub async fn wait_for_terminal(&self) -> Option<RunSnapshot> {
        let (mut stage_rx, run) = {
            let current = self.current.lock().await;
            let handle = current.as_ref()?;
            (handle.stage_rx.clone(), Arc::clone(&handle.channels.run))
        };
        // A closed channel means the sequencer is gone; report what it left
        let _ = stage_rx.wait_for(|stage| stage.is_terminal()).await;
        let snapshot = run.read().await.snapshot();
        Some(snapshot)
    }
}
