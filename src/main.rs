mod binding;
mod config;
mod db;
mod demo;
mod events;
mod hub;
mod reconcile;
mod surface;
mod ui;
mod web;

use crate::config::AppConfig;
use crate::db::{FirebaseRtdb, MemoryDatabase, RealtimeDatabase};
use crate::hub::Dashboard;
use crate::surface::Surface;
use crate::web::AppState;
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Arc::new(AppConfig::from_env());

    let mut demo_task = None;
    let db: Arc<dyn RealtimeDatabase> = match (&config.database_url, config.demo_mode) {
        (Some(url), false) => {
            tracing::info!("Starting sentinel dashboard on {} (database: {url})", config.http_bind);
            Arc::new(FirebaseRtdb::new(url.clone(), config.reconnect_delay))
        }
        (url, _) => {
            if url.is_none() && !config.demo_mode {
                tracing::warn!("FIREBASE_DATABASE_URL not set, running the demo feed");
            }
            tracing::info!("Starting sentinel dashboard on {} (demo feed)", config.http_bind);
            let memory: Arc<dyn RealtimeDatabase> = Arc::new(MemoryDatabase::new());
            demo_task = Some(tokio::spawn(demo::run(
                Arc::clone(&memory),
                config.status_path.clone(),
            )));
            memory
        }
    };

    let surface = Surface::new(config.node_cards.clone(), config.mode_options.clone());
    let dashboard = Dashboard::new(db, surface, &config.mode_path, &config.time_format);

    // Default state until the first delivery arrives.
    dashboard.handle_status(&Value::from("Normal")).await;

    let channel_tasks = dashboard
        .start(&config.status_path, &config.mode_path)
        .await?;

    let state = AppState {
        config: config.clone(),
        dashboard,
    };

    web::serve(state).await?;

    for task in channel_tasks {
        task.abort();
    }
    if let Some(task) = demo_task {
        task.abort();
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    let _ = fmt().with_env_filter(env_filter).try_init();
}
