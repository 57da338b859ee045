//! # Analysis Task Set
//!
//! Runs every analyst concurrently and reports each one as it settles.
//!
//! Scatter-gather over a [`JoinSet`]: each analyst runs in its own task, a
//! failing or panicking analyst only fails itself, and the set never returns
//! early. Whether the stage as a whole succeeded is decided afterwards by a
//! [`SuccessPolicy`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinSet};

use crate::error::{RunFailure, TaskFailure};
use crate::state::Output;
use crate::workflow::collaborators::{AnalysisContext, Analyst};

/// How many analysts must succeed for the stage to pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessPolicy {
    #[default]
    AtLeastOne,
    Majority,
    All,
}

impl SuccessPolicy {
    pub fn is_met(self, succeeded: usize, total: usize) -> bool {
        match self {
            SuccessPolicy::AtLeastOne => succeeded >= 1,
            SuccessPolicy::Majority => succeeded * 2 > total,
            SuccessPolicy::All => total > 0 && succeeded == total,
        }
    }
}

impl std::fmt::Display for SuccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuccessPolicy::AtLeastOne => f.write_str("at_least_one"),
            SuccessPolicy::Majority => f.write_str("majority"),
            SuccessPolicy::All => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

/// One analyst's unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub name: String,
    pub status: TaskStatus,
    pub output: Option<Output>,
    pub failure_reason: Option<String>,
}

impl AnalysisTask {
    fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TaskStatus::Pending,
            output: None,
            failure_reason: None,
        }
    }

    fn settle(&mut self, result: anyhow::Result<String>) {
        match result {
            Ok(content) => {
                self.status = TaskStatus::Succeeded;
                self.output = Some(Output::agent_result(&self.name, content));
            }
            Err(e) => {
                let failure = TaskFailure {
                    task: self.name.clone(),
                    reason: format!("{:#}", e),
                };
                self.status = TaskStatus::Failed;
                self.output = Some(Output::error(&self.name, failure.to_string()));
                self.failure_reason = Some(failure.reason);
            }
        }
    }
}

/// Tally of settled tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl AnalysisSummary {
    pub fn from_tasks(tasks: &[AnalysisTask]) -> Self {
        let succeeded = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Succeeded)
            .count();
        let failed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .count();
        Self {
            succeeded,
            failed,
            total: tasks.len(),
        }
    }

    /// Apply the policy; a miss becomes `AnalysisThreshold`
    pub fn evaluate(&self, policy: SuccessPolicy) -> Result<(), RunFailure> {
        if policy.is_met(self.succeeded, self.total) {
            Ok(())
        } else {
            Err(RunFailure::AnalysisThreshold(format!(
                "{} of {} analysts succeeded, policy '{}' not met",
                self.succeeded, self.total, policy
            )))
        }
    }
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// The running set of analysts for one run
pub struct AnalysisTaskSet {
    tasks: Vec<AnalysisTask>,
    join_set: JoinSet<(usize, anyhow::Result<String>)>,
}

impl AnalysisTaskSet {
    /// Spawn every analyst at once
    pub fn start(analysts: &[Arc<dyn Analyst>], context: Arc<AnalysisContext>) -> Self {
        let mut tasks = Vec::with_capacity(analysts.len());
        let mut join_set = JoinSet::new();

        for (index, analyst) in analysts.iter().enumerate() {
            let mut task = AnalysisTask::pending(analyst.name());
            let analyst = Arc::clone(analyst);
            let context = Arc::clone(&context);

            join_set.spawn(async move {
                // Inner task so a panicking analyst is reported against its index
                let inner = tokio::spawn(async move { analyst.analyze(&context).await });
                let _guard = AbortOnDrop(inner.abort_handle());
                let result = match inner.await {
                    Ok(result) => result,
                    Err(e) if e.is_panic() => Err(anyhow::anyhow!("task panicked")),
                    Err(_) => Err(anyhow::anyhow!("task aborted")),
                };
                (index, result)
            });

            task.status = TaskStatus::Running;
            tasks.push(task);
        }

        tracing::debug!(total = tasks.len(), "Analysis tasks started");
        Self { tasks, join_set }
    }

    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks(&self) -> &[AnalysisTask] {
        &self.tasks
    }

    pub fn settled(&self) -> usize {
        self.tasks.iter().filter(|t| t.status.is_terminal()).count()
    }

    /// Wait for the next task to settle; `None` once all have
    pub async fn next_settled(&mut self) -> Option<AnalysisTask> {
        loop {
            match self.join_set.join_next().await? {
                Ok((index, result)) => {
                    let task = self.tasks.get_mut(index)?;
                    task.settle(result);
                    match task.status {
                        TaskStatus::Succeeded => tracing::info!(analyst = %task.name, "Analyst finished"),
                        _ => tracing::warn!(
                            analyst = %task.name,
                            reason = task.failure_reason.as_deref().unwrap_or_default(),
                            "Analyst failed"
                        ),
                    }
                    return Some(task.clone());
                }
                // Outer wrappers only end early when aborted
                Err(e) => tracing::debug!(error = %e, "Analysis wrapper task ended early"),
            }
        }
    }

    /// Abort everything still in flight
    pub fn abort_all(&mut self) {
        self.join_set.abort_all();
    }

    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary::from_tasks(&self.tasks)
    }

    /// Run every analyst to completion and return the settled tasks
    pub async fn run_all(
        analysts: &[Arc<dyn Analyst>],
        context: Arc<AnalysisContext>,
    ) -> Vec<AnalysisTask> {
        let mut set = Self::start(analysts, context);
        while set.next_settled().await.is_some() {}
        set.tasks
    }
}
