use crate::db::RealtimeDatabase;
use crate::events::ModeEvent;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Two-way binding between the mode selector and the mode key.
#[derive(Clone)]
pub struct ModeBinding {
    db: Arc<dyn RealtimeDatabase>,
    path: Arc<String>,
    current: Arc<RwLock<Option<String>>>,
}

impl ModeBinding {
    pub fn new(db: Arc<dyn RealtimeDatabase>, path: impl Into<String>) -> Self {
        Self {
            db,
            path: Arc::new(path.into()),
            current: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn current(&self) -> Option<String> {
        self.current.read().await.clone()
    }

    /// Takes a value delivered by the subscription. Returns `true` when the
    /// selector has to be updated.
    pub async fn apply_remote(&self, mode: &str) -> bool {
        let mut guard = self.current.write().await;
        if guard.as_deref() == Some(mode) {
            return false;
        }
        *guard = Some(mode.to_string());
        true
    }

    /// Records the user's choice locally and writes it out in the background.
    /// The outcome is only logged; a failed write is not retried.
    pub async fn select(&self, mode: String) -> JoinHandle<()> {
        *self.current.write().await = Some(mode.clone());
        let db = Arc::clone(&self.db);
        let path = Arc::clone(&self.path);
        tokio::spawn(async move {
            let event = ModeEvent { mode };
            match db.set(&path, event.to_value()).await {
                Ok(()) => tracing::info!("Mode updated to {} at {path}", event.mode),
                Err(err) => tracing::warn!("Unable to update mode to {}: {err:?}", event.mode),
            }
        })
    }
}
