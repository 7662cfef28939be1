use crate::events::NodeId;
use crate::reconcile::{CONTAINER_CLASSES, INDICATOR_CLASSES, VisualState};
use serde::Serialize;

pub const STATUS_CONTAINER: &str = "statusContainer";
pub const STATUS_TEXT: &str = "statusText";
pub const TIMESTAMP_TEXT: &str = "timestampText";
pub const STATUS_ICON: &str = "statusIcon";
pub const MODE_SELECT: &str = "modeSelect";
pub const ACCENT_ORB: &str = ".orb-1";

/// One DOM mutation, applied verbatim by the page script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum DomPatch {
    ReplaceClass {
        selector: String,
        remove: Vec<String>,
        add: String,
    },
    SetText {
        selector: String,
        text: String,
    },
    SetIcon {
        selector: String,
        path: String,
    },
    SetStyle {
        selector: String,
        property: String,
        value: String,
    },
    SetValue {
        selector: String,
        value: String,
    },
}

impl DomPatch {
    fn replace_class(selector: String, set: &[&str], add: &str) -> Self {
        DomPatch::ReplaceClass {
            selector,
            remove: set
                .iter()
                .filter(|c| **c != add)
                .map(|c| c.to_string())
                .collect(),
            add: add.to_string(),
        }
    }

    fn set_text(selector: String, text: impl Into<String>) -> Self {
        DomPatch::SetText {
            selector,
            text: text.into(),
        }
    }
}

/// The named elements the rendered page exposes. Node cards can be left out
/// of a deployment; patches for them are then skipped.
#[derive(Clone, Debug)]
pub struct Surface {
    node_cards: Vec<NodeId>,
    mode_options: Vec<String>,
}

impl Surface {
    pub fn new(node_cards: Vec<NodeId>, mode_options: Vec<String>) -> Self {
        Self {
            node_cards,
            mode_options,
        }
    }

    pub fn node_cards(&self) -> &[NodeId] {
        &self.node_cards
    }

    pub fn mode_options(&self) -> &[String] {
        &self.mode_options
    }

    pub fn has_card(&self, id: NodeId) -> bool {
        self.node_cards.contains(&id)
    }

    pub fn apply(&self, state: &VisualState) -> Vec<DomPatch> {
        let mut patches = vec![
            DomPatch::replace_class(
                id_selector(STATUS_CONTAINER),
                &CONTAINER_CLASSES,
                state.container_class,
            ),
            DomPatch::set_text(id_selector(STATUS_TEXT), state.headline),
            DomPatch::SetIcon {
                selector: id_selector(STATUS_ICON),
                path: state.icon_path.to_string(),
            },
            DomPatch::SetStyle {
                selector: ACCENT_ORB.to_string(),
                property: "background".to_string(),
                value: state.background(),
            },
            DomPatch::set_text(id_selector(TIMESTAMP_TEXT), state.timestamp_text()),
        ];

        for node in &state.nodes {
            if !self.has_card(node.id) {
                tracing::debug!("No card for {}, skipping", node.id.key());
                continue;
            }
            let card = id_selector(node.id.card_id());
            patches.push(DomPatch::replace_class(
                format!("{card} .status-dot"),
                &INDICATOR_CLASSES,
                node.indicator_class(),
            ));
            patches.push(DomPatch::set_text(
                format!("{card} .node-status-text"),
                node.status_line(),
            ));
        }
        patches
    }

    pub fn mode_patch(&self, mode: &str) -> DomPatch {
        DomPatch::SetValue {
            selector: id_selector(MODE_SELECT),
            value: mode.to_string(),
        }
    }
}

fn id_selector(id: &str) -> String {
    format!("#{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StatusPayload;
    use crate::reconcile::reconcile;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn state_for(value: serde_json::Value) -> VisualState {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let payload = StatusPayload::decode(&value);
        reconcile(payload.as_ref(), &now, "%H:%M:%S").unwrap()
    }

    fn full_surface() -> Surface {
        Surface::new(NodeId::ALL.to_vec(), vec!["auto".into()])
    }

    #[test]
    fn container_class_replaces_the_rest_of_its_set() {
        let patches = full_surface().apply(&state_for(json!({ "status": "Emergency" })));
        assert_eq!(
            patches[0],
            DomPatch::ReplaceClass {
                selector: "#statusContainer".into(),
                remove: vec!["normal".into(), "warning".into()],
                add: "emergency".into(),
            }
        );
        assert!(patches.contains(&DomPatch::SetText {
            selector: "#statusText".into(),
            text: "EMERGENCY DETECTED".into(),
        }));
        assert!(patches.contains(&DomPatch::SetText {
            selector: "#timestampText".into(),
            text: "Last updated: 08:00:00".into(),
        }));
    }

    #[test]
    fn every_present_card_gets_indicator_and_text() {
        let patches = full_surface().apply(&state_for(json!({
            "status": "Normal",
            "nodes": { "ESP32_NODE_1": "online", "ESP32_NODE_2": "offline" }
        })));
        assert_eq!(patches.len(), 5 + 2 * 4);
        assert!(patches.contains(&DomPatch::ReplaceClass {
            selector: "#node-1 .status-dot".into(),
            remove: vec!["offline".into()],
            add: "healthy".into(),
        }));
        assert!(patches.contains(&DomPatch::SetText {
            selector: "#node-2 .node-status-text".into(),
            text: "Status: Offline".into(),
        }));
    }

    #[test]
    fn missing_cards_are_skipped() {
        let surface = Surface::new(vec![NodeId::Node2], vec![]);
        let patches = surface.apply(&state_for(json!("Normal")));
        assert_eq!(patches.len(), 5 + 2);
        assert!(patches.iter().all(|p| match p {
            DomPatch::ReplaceClass { selector, .. } | DomPatch::SetText { selector, .. } =>
                !selector.starts_with("#node-") || selector.starts_with("#node-2"),
            _ => true,
        }));
    }

    #[test]
    fn patches_serialize_with_op_tag() {
        let value = serde_json::to_value(full_surface().mode_patch("away")).unwrap();
        assert_eq!(
            value,
            json!({ "op": "set-value", "selector": "#modeSelect", "value": "away" })
        );
    }
}
