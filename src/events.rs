use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Sensor units reporting liveness under the `nodes` map of the status key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeId {
    #[serde(rename = "ESP32_NODE_1")]
    Node1,
    #[serde(rename = "ESP32_NODE_2")]
    Node2,
    #[serde(rename = "ESP32_NODE_3")]
    Node3,
    #[serde(rename = "ESP32_NODE_4")]
    Node4,
}

impl NodeId {
    pub const ALL: [NodeId; 4] = [NodeId::Node1, NodeId::Node2, NodeId::Node3, NodeId::Node4];

    pub fn key(&self) -> &'static str {
        match self {
            NodeId::Node1 => "ESP32_NODE_1",
            NodeId::Node2 => "ESP32_NODE_2",
            NodeId::Node3 => "ESP32_NODE_3",
            NodeId::Node4 => "ESP32_NODE_4",
        }
    }

    pub fn card_id(&self) -> &'static str {
        match self {
            NodeId::Node1 => "node-1",
            NodeId::Node2 => "node-2",
            NodeId::Node3 => "node-3",
            NodeId::Node4 => "node-4",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeId::Node1 => "Node 1",
            NodeId::Node2 => "Node 2",
            NodeId::Node3 => "Node 3",
            NodeId::Node4 => "Node 4",
        }
    }
}

/// Value stored under the status key. Older writers publish a bare string,
/// the sensor backend publishes an object with per-node liveness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusPayload {
    Text(String),
    Object {
        status: Option<String>,
        nodes: BTreeMap<String, String>,
    },
}

impl StatusPayload {
    /// Returns `None` for values that must leave the dashboard untouched
    /// (null or an empty string). Unexpected shapes decode to an object with
    /// no status and no nodes, which renders as normal activity.
    pub fn decode(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(StatusPayload::Text(s.clone())),
            Value::Object(map) => {
                let status = map
                    .get("status")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                // Nodes only count when they ride along with a status.
                let nodes = match (&status, map.get("nodes")) {
                    (Some(_), Some(Value::Object(nodes))) => nodes
                        .iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect(),
                    _ => BTreeMap::new(),
                };
                Some(StatusPayload::Object { status, nodes })
            }
            _ => Some(StatusPayload::Object {
                status: None,
                nodes: BTreeMap::new(),
            }),
        }
    }

    pub fn status_str(&self) -> &str {
        match self {
            StatusPayload::Text(s) => s.as_str(),
            StatusPayload::Object {
                status: Some(s), ..
            } => s.as_str(),
            StatusPayload::Object { status: None, .. } => "Normal",
        }
    }

    pub fn node_value(&self, id: NodeId) -> Option<&str> {
        match self {
            StatusPayload::Text(_) => None,
            StatusPayload::Object { nodes, .. } => nodes.get(id.key()).map(String::as_str),
        }
    }
}

/// Value stored under the mode key: `{ "mode": "<selection>" }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeEvent {
    pub mode: String,
}

impl ModeEvent {
    pub fn decode(value: &Value) -> Option<Self> {
        value
            .get("mode")
            .and_then(Value::as_str)
            .map(|mode| ModeEvent {
                mode: mode.to_string(),
            })
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({ "mode": self.mode })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_and_empty_string_are_no_ops() {
        assert_eq!(StatusPayload::decode(&Value::Null), None);
        assert_eq!(StatusPayload::decode(&json!("")), None);
    }

    #[test]
    fn bare_string_is_legacy_form() {
        let payload = StatusPayload::decode(&json!("Emergency")).unwrap();
        assert_eq!(payload, StatusPayload::Text("Emergency".into()));
        assert_eq!(payload.status_str(), "Emergency");
        assert_eq!(payload.node_value(NodeId::Node1), None);
    }

    #[test]
    fn object_keeps_string_nodes_and_ignores_extra_fields() {
        let payload = StatusPayload::decode(&json!({
            "status": "Normal",
            "timestamp": 1712345678.5,
            "nodes": { "ESP32_NODE_1": "online", "ESP32_NODE_2": 7 }
        }))
        .unwrap();
        assert_eq!(payload.status_str(), "Normal");
        assert_eq!(payload.node_value(NodeId::Node1), Some("online"));
        assert_eq!(payload.node_value(NodeId::Node2), None);
    }

    #[test]
    fn nodes_without_status_are_dropped() {
        let payload = StatusPayload::decode(&json!({
            "nodes": { "ESP32_NODE_1": "online" }
        }))
        .unwrap();
        assert_eq!(payload.status_str(), "Normal");
        assert_eq!(payload.node_value(NodeId::Node1), None);
    }

    #[test]
    fn odd_shapes_fall_back_to_normal() {
        for value in [json!(42), json!(true), json!(["Emergency"]), json!({"status": 3})] {
            let payload = StatusPayload::decode(&value).unwrap();
            assert_eq!(payload.status_str(), "Normal", "value {value}");
        }
    }

    #[test]
    fn mode_event_requires_string_mode() {
        assert_eq!(
            ModeEvent::decode(&json!({ "mode": "auto" })),
            Some(ModeEvent { mode: "auto".into() })
        );
        assert_eq!(ModeEvent::decode(&json!({ "mode": 1 })), None);
        assert_eq!(ModeEvent::decode(&json!("auto")), None);
        assert_eq!(ModeEvent::decode(&Value::Null), None);
    }

    #[test]
    fn node_ids_map_to_wire_keys_and_cards() {
        assert_eq!(NodeId::Node4.key(), "ESP32_NODE_4");
        assert_eq!(NodeId::Node4.card_id(), "node-4");
        assert_eq!(serde_json::to_value(NodeId::Node2).unwrap(), json!("ESP32_NODE_2"));
    }
}
