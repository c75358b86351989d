//! Debounced, fire-and-forget saves.
//!
//! Each collection keeps only its newest pending snapshot. A snapshot is
//! written once no newer request has arrived for the debounce window.
//! Dropping the [`Debouncer`] or calling [`flush`](Debouncer::flush)
//! writes whatever is still pending.

use crate::database::Storage;
use crate::error::Result;
use muse_core::{CanvasItem, Persona};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub enum SaveRequest {
    Personas(Vec<Persona>),
    Items(Vec<CanvasItem>),
}

#[derive(Debug, Default)]
struct Pending {
    personas: Option<Vec<Persona>>,
    items: Option<Vec<CanvasItem>>,
}

impl Pending {
    fn push(&mut self, request: SaveRequest) {
        match request {
            SaveRequest::Personas(p) => self.personas = Some(p),
            SaveRequest::Items(i) => self.items = Some(i),
        }
    }

    fn is_empty(&self) -> bool {
        self.personas.is_none() && self.items.is_none()
    }
}

pub struct Debouncer {
    tx: mpsc::UnboundedSender<SaveRequest>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Start the save loop. Must be called from within a tokio runtime.
    pub fn spawn<S: Storage>(storage: Arc<S>, window: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(storage, window, rx));
        Self { tx, task }
    }

    /// Queue a snapshot. Never blocks; failures are logged by the loop.
    pub fn schedule(&self, request: SaveRequest) {
        if self.tx.send(request).is_err() {
            log::warn!("save loop has stopped; snapshot dropped");
        }
    }

    /// Write anything pending now and stop the loop.
    pub async fn flush(self) -> Result<()> {
        drop(self.tx);
        self.task.await?;
        Ok(())
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("running", &!self.task.is_finished())
            .finish()
    }
}

async fn run<S: Storage>(
    storage: Arc<S>,
    window: Duration,
    mut rx: mpsc::UnboundedReceiver<SaveRequest>,
) {
    let mut pending = Pending::default();
    loop {
        let next = if pending.is_empty() {
            rx.recv().await
        } else {
            match tokio::time::timeout(window, rx.recv()).await {
                Ok(next) => next,
                Err(_elapsed) => {
                    write(&storage, std::mem::take(&mut pending)).await;
                    continue;
                }
            }
        };
        match next {
            Some(request) => pending.push(request),
            None => break,
        }
    }
    if !pending.is_empty() {
        write(&storage, pending).await;
    }
}

async fn write<S: Storage>(storage: &Arc<S>, pending: Pending) {
    let storage = Arc::clone(storage);
    let outcome = tokio::task::spawn_blocking(move || -> Result<()> {
        if let Some(personas) = pending.personas {
            storage.save_personas(&personas)?;
        }
        if let Some(items) = pending.items {
            storage.save_items(&items)?;
        }
        Ok(())
    })
    .await;
    match outcome {
        Ok(Ok(())) => log::debug!("debounced save written"),
        Ok(Err(err)) => log::error!("save failed: {err}"),
        Err(err) => log::error!("save task failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStorage;

    #[tokio::test(start_paused = true)]
    async fn bursts_collapse_into_one_write() {
        let storage = Arc::new(MemoryStorage::default());
        let debouncer = Debouncer::spawn(Arc::clone(&storage), SAVE_DEBOUNCE);

        for _ in 0..5 {
            debouncer.schedule(SaveRequest::Items(Vec::new()));
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(storage.save_counts(), (0, 0));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(storage.save_counts(), (0, 1));
        debouncer.flush().await.unwrap();
        assert_eq!(storage.save_counts(), (0, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_pending_snapshots() {
        let storage = Arc::new(MemoryStorage::default());
        let debouncer = Debouncer::spawn(Arc::clone(&storage), SAVE_DEBOUNCE);
        debouncer.schedule(SaveRequest::Personas(vec![Persona::default()]));
        debouncer.schedule(SaveRequest::Items(Vec::new()));
        debouncer.flush().await.unwrap();
        assert_eq!(storage.save_counts(), (1, 1));
        assert_eq!(storage.snapshot().personas, vec![Persona::default()]);
    }
}
