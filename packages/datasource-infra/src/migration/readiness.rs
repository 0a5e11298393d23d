use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

/// Host-side signal that its managed units have started.
#[async_trait]
pub trait HostReadiness: Send + Sync {
    fn units_started(&self) -> bool;

    /// Resolves once the units have started. May return early; callers re-check.
    async fn wait_until_units_started(&self);
}

/// [`HostReadiness`] flipped once by the host when startup completes.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn mark_started(&self) {
        self.tx.send_replace(true);
    }
}

#[async_trait]
impl HostReadiness for ReadinessGate {
    fn units_started(&self) -> bool {
        *self.tx.borrow()
    }

    async fn wait_until_units_started(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|started| *started).await;
    }
}
