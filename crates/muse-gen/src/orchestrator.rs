//! Batch orchestration.
//!
//! At most one batch is in flight. Starting a batch cancels the previous one
//! before any new request goes out. Each item runs as its own task. Callers
//! take item results as they finish with [`BatchHandle::join_next`] and apply
//! one only while its batch is still [`Orchestrator::current_batch`]; the
//! batch-level outcome goes through [`Orchestrator::settle`].
//!
//! ```text
//!   Idle ──start──▶ Running ──settle──▶ Completed | Failed
//!                      │
//!                      └──cancel──▶ Aborted
//! ```

use crate::backend::CaptionBackend;
use crate::cancel::{CancellationSource, CancellationToken};
use crate::error::{GenerationError, Result};
use crate::generator::{CaptionGenerator, CaptionJob};
use muse_core::{GenerationResult, ItemId};
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchState {
    #[default]
    Idle,
    Running,
    Aborted,
    Failed,
    Completed,
}

/// How a joined batch ended.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Every item produced a result.
    Completed,
    /// The batch token was cancelled. Items that finished before the cancel
    /// still report their results.
    Cancelled,
    /// At least one item failed for a reason other than cancellation.
    /// Results of the items that did succeed are still reported.
    Failed(GenerationError),
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: u64,
    pub outcome: BatchOutcome,
    /// Successful items not already taken through `join_next`, in
    /// completion order.
    pub results: Vec<(ItemId, GenerationResult)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.outcome == BatchOutcome::Completed
    }
}

/// A running batch.
pub struct BatchHandle {
    batch_id: u64,
    token: CancellationToken,
    tasks: JoinSet<(ItemId, Result<GenerationResult>)>,
    failure: Option<GenerationError>,
}

impl BatchHandle {
    pub fn id(&self) -> u64 {
        self.batch_id
    }

    /// Items still pending.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the next item to finish. `None` once every item has.
    ///
    /// A successful result was checked against the batch token when its
    /// response arrived. Failures are also remembered for the report.
    pub async fn join_next(&mut self) -> Option<(ItemId, Result<GenerationResult>)> {
        loop {
            match self.tasks.join_next().await? {
                Ok((item, outcome)) => {
                    match &outcome {
                        Ok(_) => log::debug!("batch {}: {item} done", self.batch_id),
                        Err(GenerationError::Cancelled) => {
                            log::debug!("batch {}: {item} cancelled", self.batch_id);
                        }
                        Err(err) => {
                            log::warn!("batch {}: {item} failed: {err}", self.batch_id);
                            self.failure.get_or_insert_with(|| err.clone());
                        }
                    }
                    return Some((item, outcome));
                }
                Err(join_err) => {
                    log::error!("batch {}: task panicked: {join_err}", self.batch_id);
                    self.failure
                        .get_or_insert(GenerationError::Unknown(join_err.to_string()));
                }
            }
        }
    }

    /// Wait for the remaining items and fold them into one report.
    pub async fn join(mut self) -> BatchReport {
        let mut results = Vec::new();
        while let Some((item, outcome)) = self.join_next().await {
            if let Ok(result) = outcome {
                results.push((item, result));
            }
        }

        let outcome = if self.token.is_cancelled() {
            BatchOutcome::Cancelled
        } else if let Some(err) = self.failure {
            BatchOutcome::Failed(err)
        } else {
            BatchOutcome::Completed
        };

        BatchReport {
            batch_id: self.batch_id,
            outcome,
            results,
        }
    }
}

/// Tracks the single current batch and its lifecycle state.
#[derive(Debug, Default)]
pub struct Orchestrator {
    state: BatchState,
    current: Option<(u64, CancellationSource)>,
    next_batch: u64,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == BatchState::Running
    }

    pub fn current_batch(&self) -> Option<u64> {
        self.current.as_ref().map(|(id, _)| *id)
    }

    /// Cancel any running batch, then spawn one task per job.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<B: CaptionBackend>(
        &mut self,
        generator: Arc<CaptionGenerator<B>>,
        jobs: Vec<CaptionJob>,
    ) -> BatchHandle {
        if let Some((previous, source)) = self.current.take() {
            log::info!("batch {previous} superseded");
            source.cancel();
        }

        self.next_batch += 1;
        let batch_id = self.next_batch;
        let source = CancellationSource::new();
        let token = source.token();
        log::info!("batch {batch_id}: starting {} item(s)", jobs.len());

        let mut tasks = JoinSet::new();
        for job in jobs {
            let generator = Arc::clone(&generator);
            let token = token.clone();
            tasks.spawn(async move {
                let outcome = generator.generate(&job, &token).await;
                (job.item, outcome)
            });
        }

        self.current = Some((batch_id, source));
        self.state = BatchState::Running;
        BatchHandle {
            batch_id,
            token,
            tasks,
            failure: None,
        }
    }

    /// User cancel. Returns `true` if a batch was running.
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some((batch_id, source)) => {
                log::info!("batch {batch_id} cancelled by user");
                source.cancel();
                self.state = BatchState::Aborted;
                true
            }
            None => false,
        }
    }

    /// Record a finished batch. Returns `true` only if `report` belongs to
    /// the current batch, in which case the caller should apply it.
    pub fn settle(&mut self, report: &BatchReport) -> bool {
        if self.current_batch() != Some(report.batch_id) {
            log::debug!("batch {}: stale report ignored", report.batch_id);
            return false;
        }
        self.current = None;
        self.state = match report.outcome {
            BatchOutcome::Completed => BatchState::Completed,
            BatchOutcome::Cancelled => BatchState::Aborted,
            BatchOutcome::Failed(_) => BatchState::Failed,
        };
        log::info!(
            "batch {} settled: {:?}, {} result(s)",
            report.batch_id,
            self.state,
            report.results.len()
        );
        true
    }
}

impl std::fmt::Debug for BatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchHandle")
            .field("batch_id", &self.batch_id)
            .field("pending", &self.tasks.len())
            .finish()
    }
}
