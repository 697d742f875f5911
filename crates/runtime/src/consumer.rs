//! Keeps shard caches in step with store writes.
//!
//! Config events evict the pool and, for SAVE/UPDATE, build it again. Template events evict
//! the cached template and, for SAVE/UPDATE, reload it from the store.

use crate::templates::TemplateCache;
use std::sync::Arc;
use tessera_common::events::{ChangeBus, ChangeEvent, EntityKind};
use tessera_connectors::PoolCache;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Default)]
pub struct ChangeConsumer {
    pools: Option<Arc<PoolCache>>,
    templates: Option<Arc<TemplateCache>>,
}

/// Handle to a running consumer task.
#[derive(Debug)]
pub struct ConsumerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl ConsumerHandle {
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(target: "errors", error = %e, "Change consumer task failed during shutdown");
            }
        }
    }
}

impl ChangeConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pools(mut self, pools: Arc<PoolCache>) -> Self {
        self.pools = Some(pools);
        self
    }

    pub fn with_templates(mut self, templates: Arc<TemplateCache>) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Subscribes to `bus` and handles events until shutdown or until the bus closes.
    #[must_use = "dropping the handle stops the consumer"]
    pub fn spawn(self, bus: &ChangeBus) -> ConsumerHandle {
        let mut events = bus.subscribe();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    received = events.recv() => match received {
                        Ok(event) => self.handle(&event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(target: "cache", skipped, "Change consumer lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            info!(target: "cache", "Change consumer stopped");
        });
        ConsumerHandle {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Applies one event. Rewarm failures are logged; the entry stays evicted.
    pub async fn handle(&self, event: &ChangeEvent) {
        debug!(
            target: "cache",
            entity = ?event.entity,
            id = %event.entity_id,
            event_type = ?event.event_type,
            "Handling change event"
        );
        match event.entity {
            EntityKind::Config => {
                let Some(pools) = &self.pools else { return };
                pools.evict(&event.entity_id).await;
                if event.event_type.rewarms() {
                    if let Err(e) = pools.get(&event.entity_id).await {
                        error!(target: "errors", config_id = %event.entity_id, error = %e, "Failed to rewarm pool");
                    }
                }
            }
            EntityKind::Template => {
                let Some(templates) = &self.templates else { return };
                templates.evict(&event.entity_id).await;
                if event.event_type.rewarms() {
                    if let Err(e) = templates.get_by_id(&event.entity_id).await {
                        error!(target: "errors", template_id = %event.entity_id, error = %e, "Failed to reload template");
                    }
                }
            }
        }
    }
}
