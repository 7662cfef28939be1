use crate::binding::ModeBinding;
use crate::db::RealtimeDatabase;
use crate::events::{ModeEvent, StatusPayload};
use crate::reconcile::{VisualState, reconcile};
use crate::surface::{DomPatch, Surface};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;

/// Batch of patches pushed to every open page.
#[derive(Clone, Debug, Serialize)]
pub struct PatchBatch {
    pub patches: Vec<DomPatch>,
}

/// Owns the database handle, the page surface and the last rendered state.
/// Built once at startup and shared by the channel tasks and the web layer.
#[derive(Clone)]
pub struct Dashboard {
    db: Arc<dyn RealtimeDatabase>,
    surface: Arc<Surface>,
    visual: Arc<RwLock<Option<VisualState>>>,
    mode: ModeBinding,
    updates: broadcast::Sender<PatchBatch>,
    time_format: Arc<String>,
}

impl Dashboard {
    pub fn new(
        db: Arc<dyn RealtimeDatabase>,
        surface: Surface,
        mode_path: &str,
        time_format: &str,
    ) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            mode: ModeBinding::new(Arc::clone(&db), mode_path),
            db,
            surface: Arc::new(surface),
            visual: Arc::new(RwLock::new(None)),
            updates,
            time_format: Arc::new(time_format.to_string()),
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PatchBatch> {
        self.updates.subscribe()
    }

    pub async fn visual_state(&self) -> Option<VisualState> {
        self.visual.read().await.clone()
    }

    pub async fn mode(&self) -> Option<String> {
        self.mode.current().await
    }

    /// Reconciles one status value and pushes the result. Values that decode
    /// to nothing leave the current state alone.
    pub async fn handle_status(&self, value: &Value) -> Option<VisualState> {
        let payload = StatusPayload::decode(value);
        let now = chrono::Local::now();
        let state = reconcile(payload.as_ref(), &now, &self.time_format)?;
        *self.visual.write().await = Some(state.clone());
        self.publish(self.surface.apply(&state));
        Some(state)
    }

    pub async fn handle_mode(&self, value: &Value) -> bool {
        let Some(event) = ModeEvent::decode(value) else {
            tracing::debug!("Ignoring mode value {value}");
            return false;
        };
        if !self.mode.apply_remote(&event.mode).await {
            return false;
        }
        self.publish(vec![self.surface.mode_patch(&event.mode)]);
        true
    }

    /// User-originated selector change. Every open page follows the new value
    /// right away; the write itself runs in the background.
    pub async fn select_mode(&self, mode: String) -> JoinHandle<()> {
        self.publish(vec![self.surface.mode_patch(&mode)]);
        self.mode.select(mode).await
    }

    /// Full patch set for a page that just connected.
    pub async fn snapshot_patches(&self) -> Vec<DomPatch> {
        let mut patches = match self.visual.read().await.as_ref() {
            Some(state) => self.surface.apply(state),
            None => Vec::new(),
        };
        if let Some(mode) = self.mode.current().await {
            patches.push(self.surface.mode_patch(&mode));
        }
        patches
    }

    fn publish(&self, patches: Vec<DomPatch>) {
        // No receivers just means no page is open.
        let _ = self.updates.send(PatchBatch { patches });
    }

    /// Subscribes both channels and spawns one task per channel.
    pub async fn start(&self, status_path: &str, mode_path: &str) -> Result<Vec<JoinHandle<()>>> {
        let status_rx = self
            .db
            .subscribe(status_path)
            .await
            .with_context(|| format!("Failed to subscribe to {status_path}"))?;
        let mode_rx = self
            .db
            .subscribe(mode_path)
            .await
            .with_context(|| format!("Failed to subscribe to {mode_path}"))?;
        Ok(vec![
            tokio::spawn(run_status_channel(self.clone(), status_rx)),
            tokio::spawn(run_mode_channel(self.clone(), mode_rx)),
        ])
    }
}

pub async fn run_status_channel(dashboard: Dashboard, mut rx: UnboundedReceiver<Value>) {
    while let Some(value) = rx.recv().await {
        tracing::info!("Received status data: {value}");
        if let Some(state) = dashboard.handle_status(&value).await {
            tracing::debug!(mode = ?state.mode, "Status reconciled");
        }
    }
    tracing::warn!("Status channel closed");
}

pub async fn run_mode_channel(dashboard: Dashboard, mut rx: UnboundedReceiver<Value>) {
    while let Some(value) = rx.recv().await {
        tracing::info!("Received mode data: {value}");
        dashboard.handle_mode(&value).await;
    }
    tracing::warn!("Mode channel closed");
}
