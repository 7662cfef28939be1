use crate::events::{NodeId, StatusPayload};
use chrono::{DateTime, TimeZone};
use serde::Serialize;
use std::fmt::{Display, Write};

pub const NORMAL_GLYPH: &str = "M22 12h-4l-3 9L9 3l-3 9H2";
pub const ALERT_GLYPH: &str = "M12 9v2m0 4h.01m-6.938 4h13.856c1.54 0 2.502-1.667 1.732-3L13.732 4c-.77-1.333-2.694-1.333-3.464 0L3.34 16c-.77 1.333.192 3 1.732 3z";

const FALLBACK_TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    Emergency,
    Motion,
    Normal,
}

impl Classification {
    /// Case-insensitive substring match; emergency wins over motion.
    pub fn classify(status: &str) -> Self {
        let lowered = status.to_lowercase();
        if lowered.contains("emergency") {
            Classification::Emergency
        } else if lowered.contains("motion") {
            Classification::Motion
        } else {
            Classification::Normal
        }
    }

    pub fn container_class(&self) -> &'static str {
        match self {
            Classification::Emergency => "emergency",
            Classification::Motion => "warning",
            Classification::Normal => "normal",
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            Classification::Emergency => "EMERGENCY DETECTED",
            Classification::Motion => "MOTION DETECTED",
            Classification::Normal => "Normal Activity",
        }
    }

    pub fn icon_path(&self) -> &'static str {
        match self {
            Classification::Emergency | Classification::Motion => ALERT_GLYPH,
            Classification::Normal => NORMAL_GLYPH,
        }
    }

    pub fn accent_color(&self) -> &'static str {
        match self {
            Classification::Emergency => "rgba(239, 68, 68, 0.3)",
            Classification::Motion => "rgba(245, 158, 11, 0.3)",
            Classification::Normal => "rgba(74, 222, 128, 0.3)",
        }
    }
}

pub const CONTAINER_CLASSES: [&str; 3] = ["normal", "warning", "emergency"];
pub const INDICATOR_CLASSES: [&str; 2] = ["healthy", "offline"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct NodeVisualState {
    pub id: NodeId,
    pub online: bool,
}

impl NodeVisualState {
    pub fn indicator_class(&self) -> &'static str {
        if self.online { "healthy" } else { "offline" }
    }

    pub fn status_line(&self) -> &'static str {
        if self.online {
            "Status: Online"
        } else {
            "Status: Offline"
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VisualState {
    pub mode: Classification,
    pub container_class: &'static str,
    pub headline: &'static str,
    pub icon_path: &'static str,
    pub accent_color: &'static str,
    pub last_updated_at: String,
    pub nodes: [NodeVisualState; 4],
}

impl VisualState {
    pub fn background(&self) -> String {
        format!(
            "radial-gradient(circle, {} 0%, transparent 70%)",
            self.accent_color
        )
    }

    pub fn timestamp_text(&self) -> String {
        format!("Last updated: {}", self.last_updated_at)
    }

    /// Everything except the timestamp, for comparing two reconciliations.
    pub fn same_presentation(&self, other: &VisualState) -> bool {
        self.mode == other.mode && self.nodes == other.nodes
    }
}

/// Recomputes the whole visual state from one status value. `None` means the
/// caller keeps whatever it showed before.
pub fn reconcile<Tz>(
    payload: Option<&StatusPayload>,
    now: &DateTime<Tz>,
    time_format: &str,
) -> Option<VisualState>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let payload = payload?;
    let mode = Classification::classify(payload.status_str());
    let nodes = NodeId::ALL.map(|id| NodeVisualState {
        id,
        online: payload.node_value(id) == Some("online"),
    });

    Some(VisualState {
        mode,
        container_class: mode.container_class(),
        headline: mode.headline(),
        icon_path: mode.icon_path(),
        accent_color: mode.accent_color(),
        last_updated_at: format_time(now, time_format),
        nodes,
    })
}

fn format_time<Tz>(now: &DateTime<Tz>, time_format: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    if write!(out, "{}", now.format(time_format)).is_ok() {
        return out;
    }
    tracing::debug!("Invalid time format {time_format:?}, using {FALLBACK_TIME_FORMAT}");
    now.format(FALLBACK_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, h, m, s).unwrap()
    }

    fn run(value: serde_json::Value) -> Option<VisualState> {
        let payload = StatusPayload::decode(&value);
        reconcile(payload.as_ref(), &at(14, 5, 9), "%-I:%M:%S %p")
    }

    #[test]
    fn absent_payload_is_a_no_op() {
        assert_eq!(reconcile::<Utc>(None, &at(0, 0, 0), "%H"), None);
        assert_eq!(run(serde_json::Value::Null), None);
    }

    #[test]
    fn emergency_wins_regardless_of_case_and_other_words() {
        for s in ["Emergency", "EMERGENCY fall", "motion then emergency", "xxemergencyxx"] {
            assert_eq!(Classification::classify(s), Classification::Emergency, "{s}");
        }
    }

    #[test]
    fn motion_only_without_emergency() {
        assert_eq!(
            Classification::classify("Motion detected near door"),
            Classification::Motion
        );
        assert_eq!(Classification::classify("MOTION"), Classification::Motion);
        assert_eq!(Classification::classify("Normal"), Classification::Normal);
        assert_eq!(Classification::classify("quiet"), Classification::Normal);
    }

    #[test]
    fn plain_normal_string_renders_normal_and_all_nodes_offline() {
        let state = run(json!("Normal")).unwrap();
        assert_eq!(state.container_class, "normal");
        assert_eq!(state.headline, "Normal Activity");
        assert_eq!(state.icon_path, NORMAL_GLYPH);
        assert!(state.nodes.iter().all(|n| !n.online));
        assert!(state.nodes.iter().all(|n| n.indicator_class() == "offline"));
    }

    #[test]
    fn emergency_object_renders_alert() {
        let state = run(json!({ "status": "Emergency" })).unwrap();
        assert_eq!(state.container_class, "emergency");
        assert_eq!(state.headline, "EMERGENCY DETECTED");
        assert_eq!(state.icon_path, ALERT_GLYPH);
        assert_eq!(
            state.background(),
            "radial-gradient(circle, rgba(239, 68, 68, 0.3) 0%, transparent 70%)"
        );
    }

    #[test]
    fn motion_object_renders_warning() {
        let state = run(json!({ "status": "Motion detected near door" })).unwrap();
        assert_eq!(state.container_class, "warning");
        assert_eq!(state.headline, "MOTION DETECTED");
        assert_eq!(state.icon_path, ALERT_GLYPH);
    }

    #[test]
    fn only_exact_online_marks_a_node_healthy() {
        let state = run(json!({
            "status": "Normal",
            "nodes": {
                "ESP32_NODE_1": "online",
                "ESP32_NODE_2": "offline",
                "ESP32_NODE_3": "Online"
            }
        }))
        .unwrap();
        let online: Vec<bool> = state.nodes.iter().map(|n| n.online).collect();
        assert_eq!(online, vec![true, false, false, false]);
        assert_eq!(state.nodes[0].status_line(), "Status: Online");
        assert_eq!(state.nodes[3].status_line(), "Status: Offline");
    }

    #[test]
    fn reconcile_is_idempotent_apart_from_the_clock() {
        let payload = StatusPayload::decode(&json!({
            "status": "Motion",
            "nodes": { "ESP32_NODE_4": "online" }
        }));
        let first = reconcile(payload.as_ref(), &at(1, 0, 0), "%H:%M:%S").unwrap();
        let second = reconcile(payload.as_ref(), &at(1, 0, 5), "%H:%M:%S").unwrap();
        assert!(first.same_presentation(&second));
        assert_ne!(first.last_updated_at, second.last_updated_at);
    }

    #[test]
    fn timestamp_uses_configured_format() {
        let state = run(json!("Normal")).unwrap();
        assert_eq!(state.timestamp_text(), "Last updated: 2:05:09 PM");
    }

    #[test]
    fn invalid_time_format_falls_back() {
        let payload = StatusPayload::decode(&json!("Normal"));
        let state = reconcile(payload.as_ref(), &at(9, 8, 7), "%Q").unwrap();
        assert_eq!(state.last_updated_at, "09:08:07");
    }
}
