use crate::events::NodeId;
use std::env;
use std::time::Duration;

pub struct AppConfig {
    pub http_bind: String,
    pub database_url: Option<String>,
    pub status_path: String,
    pub mode_path: String,
    pub demo_mode: bool,
    pub node_cards: Vec<NodeId>,
    pub mode_options: Vec<String>,
    pub time_format: String,
    pub reconnect_delay: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = env::var("FIREBASE_DATABASE_URL")
            .ok()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        Self {
            http_bind: env_var("HTTP_BIND", "0.0.0.0:8080"),
            database_url,
            status_path: env_var("STATUS_PATH", "status"),
            mode_path: env_var("MODE_PATH", "mode"),
            demo_mode: parse_flag(&env_var("DEMO_MODE", "0")),
            node_cards: parse_node_cards(&env_var("NODE_CARDS", "node-1,node-2,node-3,node-4")),
            mode_options: parse_list(&env_var("MODE_OPTIONS", "auto,home,away")),
            time_format: env_var("TIME_FORMAT", "%-I:%M:%S %p"),
            reconnect_delay: Duration::from_millis(
                env_var("RECONNECT_DELAY_MS", "3000").parse().unwrap_or(3000),
            ),
        }
    }
}

fn env_var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accepts either card ids (`node-2`) or wire keys (`ESP32_NODE_2`); unknown
/// entries are dropped with a warning.
fn parse_node_cards(raw: &str) -> Vec<NodeId> {
    let mut cards = Vec::new();
    for item in parse_list(raw) {
        match NodeId::ALL
            .iter()
            .find(|id| id.card_id() == item || id.key() == item)
        {
            Some(id) if !cards.contains(id) => cards.push(*id),
            Some(_) => {}
            None => tracing::warn!("Ignoring unknown node card {item}"),
        }
    }
    cards
}
