use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Push-based key/value store the dashboard listens to and writes into.
///
/// A subscription delivers the current value once right away (when there is
/// one) and then the full value at `path` after every remote change.
#[async_trait]
pub trait RealtimeDatabase: Send + Sync {
    async fn subscribe(&self, path: &str) -> Result<UnboundedReceiver<Value>>;
    async fn set(&self, path: &str, value: Value) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    values: HashMap<String, Value>,
    subscribers: HashMap<String, Vec<UnboundedSender<Value>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn get(&self, path: &str) -> Option<Value> {
        let guard = self.inner.lock().expect("memory database poisoned");
        guard.values.get(&normalize_path(path)).cloned()
    }
}

#[async_trait]
impl RealtimeDatabase for MemoryDatabase {
    async fn subscribe(&self, path: &str) -> Result<UnboundedReceiver<Value>> {
        let path = normalize_path(path);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = self.inner.lock().expect("memory database poisoned");
        if let Some(current) = guard.values.get(&path) {
            let _ = tx.send(current.clone());
        }
        guard.subscribers.entry(path).or_default().push(tx);
        Ok(rx)
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        let path = normalize_path(path);
        let mut guard = self.inner.lock().expect("memory database poisoned");
        if value.is_null() {
            guard.values.remove(&path);
        } else {
            guard.values.insert(path.clone(), value.clone());
        }
        if let Some(subs) = guard.subscribers.get_mut(&path) {
            subs.retain(|tx| tx.send(value.clone()).is_ok());
        }
        Ok(())
    }
}

/// Firebase Realtime Database over its REST API. Listening uses the
/// server-sent-events stream; writes are plain `PUT`s.
#[derive(Clone)]
pub struct FirebaseRtdb {
    client: Client,
    base_url: Arc<String>,
    reconnect_delay: Duration,
}

impl FirebaseRtdb {
    pub fn new(base_url: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: Arc::new(base_url.into()),
            reconnect_delay,
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, normalize_path(path))
    }
}

#[async_trait]
impl RealtimeDatabase for FirebaseRtdb {
    async fn subscribe(&self, path: &str) -> Result<UnboundedReceiver<Value>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let url = self.url_for(path);
        let client = self.client.clone();
        let delay = self.reconnect_delay;
        tokio::spawn(async move {
            let mut tree = Value::Null;
            while !tx.is_closed() {
                match listen(&client, &url, &mut tree, &tx).await {
                    Ok(()) => tracing::info!("Stream for {url} ended"),
                    Err(err) => tracing::warn!("Stream for {url} failed: {err:?}"),
                }
                if tx.is_closed() {
                    break;
                }
                tokio::time::sleep(delay).await;
            }
            tracing::debug!("Subscriber for {url} dropped");
        });
        Ok(rx)
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        let url = self.url_for(path);
        self.client
            .put(&url)
            .json(&value)
            .send()
            .await
            .with_context(|| format!("Failed to write {url}"))?
            .error_for_status()
            .with_context(|| format!("Write to {url} rejected"))?;
        Ok(())
    }
}

async fn listen(
    client: &Client,
    url: &str,
    tree: &mut Value,
    tx: &UnboundedSender<Value>,
) -> Result<()> {
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .with_context(|| format!("Failed to open stream {url}"))?
        .error_for_status()
        .with_context(|| format!("Stream {url} rejected"))?;
    tracing::info!("Listening on {url}");

    let mut parser = SseParser::default();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.with_context(|| format!("Stream {url} interrupted"))?;
        for frame in parser.push(&chunk) {
            match apply_frame(tree, &frame)? {
                FrameOutcome::Changed => {
                    if tx.send(tree.clone()).is_err() {
                        return Ok(());
                    }
                }
                FrameOutcome::Ignored => {}
                FrameOutcome::Closed(reason) => {
                    tracing::warn!("Stream {url} closed by server: {reason}");
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

#[derive(Default)]
pub struct SseParser {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.pending.extend_from_slice(bytes);
        let mut frames = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if let Some(frame) = self.finish() {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        frames
    }

    fn finish(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data);
        if event.is_none() && data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event: event.unwrap_or_else(|| "message".to_string()),
            data: data.join("\n"),
        })
    }
}

#[derive(Debug, PartialEq)]
pub enum FrameOutcome {
    Changed,
    Ignored,
    Closed(String),
}

#[derive(Deserialize)]
struct StreamChange {
    path: String,
    data: Value,
}

/// Folds one streaming event into the locally mirrored value.
pub fn apply_frame(tree: &mut Value, frame: &SseFrame) -> Result<FrameOutcome> {
    match frame.event.as_str() {
        "put" | "patch" => {
            let change: StreamChange = serde_json::from_str(&frame.data)
                .with_context(|| format!("Malformed {} event: {}", frame.event, frame.data))?;
            if frame.event == "put" {
                put_at(tree, &change.path, change.data);
            } else if let Value::Object(children) = change.data {
                for (key, value) in children {
                    let child = format!("{}/{}", change.path.trim_end_matches('/'), key);
                    put_at(tree, &child, value);
                }
            }
            Ok(FrameOutcome::Changed)
        }
        "keep-alive" => Ok(FrameOutcome::Ignored),
        "cancel" | "auth_revoked" => Ok(FrameOutcome::Closed(frame.event.clone())),
        other => {
            tracing::debug!("Ignoring stream event {other}");
            Ok(FrameOutcome::Ignored)
        }
    }
}

fn put_at(tree: &mut Value, path: &str, data: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        *tree = data;
        return;
    };

    let mut node = tree;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }
    if data.is_null() {
        if let Value::Object(map) = node {
            map.remove(*last);
        }
        return;
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        map.insert(last.to_string(), data);
    }
}

fn normalize_path(path: &str) -> String {
    path.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_subscription_gets_current_then_changes() {
        let db = MemoryDatabase::new();
        db.set("status", json!("Normal")).await.unwrap();
        let mut rx = db.subscribe("/status").await.unwrap();
        assert_eq!(rx.recv().await, Some(json!("Normal")));

        db.set("status", json!({ "status": "Emergency" })).await.unwrap();
        assert_eq!(rx.recv().await, Some(json!({ "status": "Emergency" })));
        assert_eq!(db.get("status"), Some(json!({ "status": "Emergency" })));
    }

    #[tokio::test]
    async fn memory_paths_are_independent() {
        let db = MemoryDatabase::new();
        let mut mode = db.subscribe("mode").await.unwrap();
        db.set("status", json!("Emergency")).await.unwrap();
        db.set("mode", json!({ "mode": "auto" })).await.unwrap();
        assert_eq!(mode.recv().await, Some(json!({ "mode": "auto" })));
        assert!(mode.try_recv().is_err());
    }

    #[test]
    fn sse_frames_split_across_chunks() {
        let mut parser = SseParser::default();
        assert!(parser.push(b"event: put\nda").is_empty());
        let frames = parser.push(b"ta: {\"path\":\"/\",\"data\":\"Normal\"}\r\n\r\n: ping\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: "put".into(),
                data: "{\"path\":\"/\",\"data\":\"Normal\"}".into(),
            }]
        );
    }

    #[test]
    fn put_and_patch_rebuild_the_value() {
        let mut tree = Value::Null;
        let frame = |event: &str, data: Value| SseFrame {
            event: event.into(),
            data: data.to_string(),
        };

        let outcome = apply_frame(
            &mut tree,
            &frame("put", json!({ "path": "/", "data": { "status": "Normal" } })),
        )
        .unwrap();
        assert_eq!(outcome, FrameOutcome::Changed);

        apply_frame(
            &mut tree,
            &frame("put", json!({ "path": "/nodes/ESP32_NODE_1", "data": "online" })),
        )
        .unwrap();
        apply_frame(
            &mut tree,
            &frame("patch", json!({ "path": "/", "data": { "status": "Emergency" } })),
        )
        .unwrap();
        assert_eq!(
            tree,
            json!({ "status": "Emergency", "nodes": { "ESP32_NODE_1": "online" } })
        );

        apply_frame(
            &mut tree,
            &frame("put", json!({ "path": "/nodes", "data": null })),
        )
        .unwrap();
        assert_eq!(tree, json!({ "status": "Emergency" }));
    }

    #[test]
    fn control_events_do_not_touch_the_value() {
        let mut tree = json!("Normal");
        let keep_alive = SseFrame {
            event: "keep-alive".into(),
            data: "null".into(),
        };
        let cancel = SseFrame {
            event: "cancel".into(),
            data: "null".into(),
        };
        assert_eq!(apply_frame(&mut tree, &keep_alive).unwrap(), FrameOutcome::Ignored);
        assert_eq!(
            apply_frame(&mut tree, &cancel).unwrap(),
            FrameOutcome::Closed("cancel".into())
        );
        assert_eq!(tree, json!("Normal"));
    }

    #[test]
    fn malformed_put_is_an_error() {
        let mut tree = Value::Null;
        let frame = SseFrame {
            event: "put".into(),
            data: "not json".into(),
        };
        assert!(apply_frame(&mut tree, &frame).is_err());
    }

    #[test]
    fn firebase_urls_append_json_suffix() {
        let db = FirebaseRtdb::new("https://example.firebaseio.com", Duration::from_secs(1));
        assert_eq!(db.url_for("/status/"), "https://example.firebaseio.com/status.json");
    }
}
