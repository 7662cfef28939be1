use crate::db::RealtimeDatabase;
use crate::events::NodeId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;

const TICK: Duration = Duration::from_secs(8);
const ALERT_HOLD: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DemoEvent {
    Emergency,
    Motion,
    Quiet,
}

fn roll(rng: &mut impl Rng) -> DemoEvent {
    let roll: f64 = rng.gen_range(0.0..1.0);
    if roll > 0.8 {
        DemoEvent::Emergency
    } else if roll > 0.65 {
        DemoEvent::Motion
    } else {
        DemoEvent::Quiet
    }
}

fn node_map(rng: &mut impl Rng) -> Value {
    let mut nodes = Map::new();
    for id in NodeId::ALL {
        let state = if rng.gen_bool(0.85) { "online" } else { "offline" };
        nodes.insert(id.key().to_string(), Value::from(state));
    }
    Value::Object(nodes)
}

fn status_value(status: &str, nodes: Value) -> Value {
    json!({
        "status": status,
        "timestamp": chrono::Utc::now().timestamp(),
        "nodes": nodes,
    })
}

/// Publishes made-up sensor readings so the dashboard can run without a
/// remote database. Alerts revert to normal after a short hold.
pub async fn run(db: Arc<dyn RealtimeDatabase>, path: String) {
    let mut rng = StdRng::from_entropy();
    tracing::info!("Demo feed publishing to {path}");
    loop {
        let nodes = node_map(&mut rng);
        let event = roll(&mut rng);
        let status = match event {
            DemoEvent::Emergency => "Emergency",
            DemoEvent::Motion => "Motion detected",
            DemoEvent::Quiet => "Normal",
        };
        if let Err(err) = db.set(&path, status_value(status, nodes.clone())).await {
            tracing::warn!("Demo feed write failed: {err:?}");
        }
        if event != DemoEvent::Quiet {
            tokio::time::sleep(ALERT_HOLD).await;
            if let Err(err) = db.set(&path, status_value("Normal", nodes)).await {
                tracing::warn!("Demo feed write failed: {err:?}");
            }
        }
        tokio::time::sleep(TICK).await;
    }
}
