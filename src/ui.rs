use crate::reconcile::VisualState;
use crate::surface::Surface;
use dioxus::core::NoOpMutations;
use dioxus::prelude::*;

#[derive(Clone, PartialEq)]
pub struct NodeCard {
    pub card_id: &'static str,
    pub label: &'static str,
    pub indicator_class: &'static str,
    pub status_line: &'static str,
}

#[derive(Props, Clone, PartialEq)]
pub struct AppProps {
    pub container_class: String,
    pub headline: String,
    pub icon_path: String,
    pub background: String,
    pub timestamp: String,
    pub nodes: Vec<NodeCard>,
    pub mode_options: Vec<String>,
    pub selected_mode: Option<String>,
}

impl AppProps {
    /// Server-rendered first paint. Without a state yet the page shows the
    /// offline placeholders until the socket delivers the snapshot.
    pub fn new(surface: &Surface, state: Option<&VisualState>, mode: Option<&str>) -> Self {
        let nodes = surface
            .node_cards()
            .iter()
            .map(|id| {
                let node = state.and_then(|s| s.nodes.iter().find(|n| n.id == *id));
                NodeCard {
                    card_id: id.card_id(),
                    label: id.label(),
                    indicator_class: node.map(|n| n.indicator_class()).unwrap_or("offline"),
                    status_line: node.map(|n| n.status_line()).unwrap_or("Status: Offline"),
                }
            })
            .collect();
        Self {
            container_class: state.map(|s| s.container_class).unwrap_or("normal").to_string(),
            headline: state.map(|s| s.headline).unwrap_or("Connecting...").to_string(),
            icon_path: state.map(|s| s.icon_path).unwrap_or_default().to_string(),
            background: state.map(|s| s.background()).unwrap_or_default(),
            timestamp: state.map(|s| s.timestamp_text()).unwrap_or_default(),
            nodes,
            mode_options: surface.mode_options().to_vec(),
            selected_mode: mode.map(str::to_string),
        }
    }
}

pub fn render_html(props: AppProps) -> String {
    let mut app = VirtualDom::new_with_props(App, props);
    // Build the tree before rendering to avoid SSR panics.
    let mut noop = NoOpMutations {};
    let _ = app.rebuild(&mut noop);
    format!("<!doctype html>{}", dioxus_ssr::render(&mut app))
}

#[component]
fn App(props: AppProps) -> Element {
    let styles = r#"
* { box-sizing: border-box; }
body, html { margin: 0; padding: 0; background: #0b0d13; overflow-x: hidden; }
.page { position: relative; min-height: 100vh; display: flex; justify-content: center; padding: 36px 18px; color: #e9ecf5; font-family: "Inter", system-ui, -apple-system, sans-serif; }
.orb { position: fixed; width: 520px; height: 520px; border-radius: 50%; pointer-events: none; filter: blur(30px); transition: background 400ms ease; }
.orb-1 { top: -140px; left: -120px; background: radial-gradient(circle, rgba(74, 222, 128, 0.3) 0%, transparent 70%); }
.orb-2 { bottom: -180px; right: -160px; background: radial-gradient(circle, rgba(99, 102, 241, 0.18) 0%, transparent 70%); }
.shell { position: relative; width: min(900px, 100%); display: flex; flex-direction: column; gap: 16px; }
.header { display: flex; justify-content: space-between; align-items: center; gap: 12px; flex-wrap: wrap; }
.title { font-size: 26px; margin: 0; letter-spacing: 0.4px; }
.subtitle { margin: 0; color: #9aa4bc; font-size: 15px; }
.mode-row { display: flex; gap: 10px; align-items: center; }
.mode-select { padding: 10px 12px; border-radius: 10px; border: 1px solid #262b38; background: #0f1118; color: #dfe4f3; font-weight: 700; }
.status-card { display: flex; align-items: center; gap: 20px; padding: 28px; border-radius: 18px; border: 1px solid #1f2230; background: linear-gradient(145deg, #161a23, #0f1219); box-shadow: 0 18px 44px rgba(0,0,0,0.35); transition: border 200ms ease, box-shadow 200ms ease; }
.status-card svg { width: 56px; height: 56px; flex-shrink: 0; }
.status-card.normal { border-color: rgba(74, 222, 128, 0.45); color: #4ade80; }
.status-card.warning { border-color: rgba(245, 158, 11, 0.6); color: #f59e0b; box-shadow: 0 18px 44px rgba(245, 158, 11, 0.18); }
.status-card.emergency { border-color: rgba(239, 68, 68, 0.7); color: #ef4444; box-shadow: 0 18px 48px rgba(239, 68, 68, 0.3); animation: pulse 1.2s ease-in-out infinite; }
.status-text { margin: 0; font-size: 28px; font-weight: 800; letter-spacing: 0.5px; }
.timestamp { margin: 6px 0 0 0; color: #8f98ac; font-size: 14px; }
.nodes { display: grid; grid-template-columns: repeat(auto-fit, minmax(190px, 1fr)); gap: 12px; }
.node-card { padding: 16px; border-radius: 14px; border: 1px solid #1f2230; background: #10141d; display: flex; flex-direction: column; gap: 8px; }
.node-head { display: flex; align-items: center; gap: 10px; font-weight: 700; }
.status-dot { width: 10px; height: 10px; border-radius: 50%; background: #4b5263; }
.status-dot.healthy { background: #4ade80; box-shadow: 0 0 10px rgba(74, 222, 128, 0.7); }
.status-dot.offline { background: #ef4444; box-shadow: 0 0 10px rgba(239, 68, 68, 0.5); }
.node-status-text { color: #9aa4bc; font-size: 13px; }
.link { color: #8f98ac; font-size: 12px; }
@keyframes pulse { 0%, 100% { transform: scale(1); } 50% { transform: scale(1.01); } }
@media (max-width: 640px) {
    .page { padding: 20px 14px; }
    .status-card { padding: 20px; }
    .status-text { font-size: 22px; }
}
"#;

    let script = r#"
(() => {
  const modeSelect = document.getElementById('modeSelect');
  const link = document.getElementById('link-status');
  let ws;

  function setIcon(el, path) {
    el.innerHTML = '';
    const p = document.createElementNS('http://www.w3.org/2000/svg', 'path');
    p.setAttribute('d', path);
    p.setAttribute('stroke-width', '2');
    p.setAttribute('stroke-linecap', 'round');
    p.setAttribute('stroke-linejoin', 'round');
    el.appendChild(p);
  }

  function apply(patch) {
    const el = document.querySelector(patch.selector);
    if (!el) return;
    switch (patch.op) {
      case 'replace-class':
        (patch.remove || []).forEach((c) => el.classList.remove(c));
        el.classList.add(patch.add);
        break;
      case 'set-text':
        el.textContent = patch.text;
        break;
      case 'set-icon':
        setIcon(el, patch.path);
        break;
      case 'set-style':
        el.style.setProperty(patch.property, patch.value);
        break;
      case 'set-value':
        if (el.value !== patch.value) el.value = patch.value;
        break;
    }
  }

  function connect() {
    const proto = location.protocol === 'https:' ? 'wss' : 'ws';
    ws = new WebSocket(`${proto}://${location.host}/ws/dashboard`);
    ws.onopen = () => { if (link) link.textContent = 'Live'; };
    ws.onmessage = (evt) => {
      try {
        const data = JSON.parse(evt.data);
        (data.patches || []).forEach(apply);
      } catch (err) {
        console.warn('Bad update', err);
      }
    };
    ws.onerror = () => ws && ws.close();
    ws.onclose = () => {
      if (link) link.textContent = 'Reconnecting...';
      setTimeout(connect, 1500);
    };
  }

  modeSelect?.addEventListener('change', () => {
    if (ws && ws.readyState === WebSocket.OPEN) {
      ws.send(JSON.stringify({ type: 'select-mode', mode: modeSelect.value }));
    }
  });

  connect();
})();
"#;

    let selected = props.selected_mode.clone().unwrap_or_default();

    rsx! {
        meta { name: "viewport", content: "width=device-width, initial-scale=1" }
        div { class: "page",
            div { class: "orb orb-1", style: "background: {props.background}" }
            div { class: "orb orb-2" }
            div { class: "shell",
                div { class: "header",
                    div {
                        h1 { class: "title", "Sentinel" }
                        p { class: "subtitle", "Wi-Fi sensing activity monitor" }
                    }
                    div { class: "mode-row",
                        label { r#for: "modeSelect", "Mode:" }
                        select { id: "modeSelect", class: "mode-select",
                            for opt in props.mode_options.iter() {
                                option { value: "{opt}", selected: *opt == selected, "{opt}" }
                            }
                        }
                    }
                }
                div { id: "statusContainer", class: "status-card {props.container_class}",
                    svg { id: "statusIcon", "viewBox": "0 0 24 24", "fill": "none", "stroke": "currentColor",
                        path { "d": "{props.icon_path}", "stroke-width": "2", "stroke-linecap": "round", "stroke-linejoin": "round" }
                    }
                    div {
                        p { id: "statusText", class: "status-text", "{props.headline}" }
                        p { id: "timestampText", class: "timestamp", "{props.timestamp}" }
                    }
                }
                div { class: "nodes",
                    for node in props.nodes.iter() {
                        div { key: "{node.card_id}", id: "{node.card_id}", class: "node-card",
                            div { class: "node-head",
                                span { class: "status-dot {node.indicator_class}" }
                                span { "{node.label}" }
                            }
                            span { class: "node-status-text", "{node.status_line}" }
                        }
                    }
                }
                span { id: "link-status", class: "link", "Connecting..." }
            }
        }
        style { "{styles}" }
        script { "{script}" }
    }
}
