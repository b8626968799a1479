//! Server-sent event subscriptions with auto-reconnect.
//!
//! The database streams changes below a path as `put`/`patch` events
//! carrying `{path, data}`. This module keeps a local copy of the
//! subscribed subtree, applies each change to it and emits the full
//! current value through an [`mpsc`] channel. Dropped connections are
//! retried with exponential backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let mut rx = client.subscribe("dashboard", &[], cancel.clone())?;
//!
//! while let Some(event) = rx.recv().await {
//!     if let StreamEvent::Value(tree) = event {
//!         println!("{tree}");
//!     }
//! }
//! ```

use std::pin::pin;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use futures_util::{Stream, StreamExt};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::realtime::client::{RealtimeClient, check_status};

const EVENT_CHANNEL_CAPACITY: usize = 64;

// ── StreamEvent ──────────────────────────────────────────────────────

/// What a subscription reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Full current value at the subscribed path (`null` when absent).
    Value(Value),
    /// The connection dropped; a reconnect is scheduled.
    Disconnected { attempt: u32, error: String },
    /// Security rules revoked read access. The stream has ended.
    PermissionDenied,
    /// The ID token expired or was revoked. The stream has ended.
    AuthRevoked,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for stream reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── Subscribe ────────────────────────────────────────────────────────

impl RealtimeClient {
    /// Subscribe to the value at `path` (optionally narrowed by `query`).
    ///
    /// Spawns the connection loop and returns immediately. The loop runs
    /// until `cancel` fires, the receiver is dropped, or the server ends
    /// the stream with `cancel`/`auth_revoked`.
    pub fn subscribe(
        &self,
        path: &str,
        query: &[(String, String)],
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamEvent>, Error> {
        self.open_stream(path, query, self.id_token(), cancel)
    }

    /// Like [`subscribe`](Self::subscribe), but never attaches the ID
    /// token. For publicly readable nodes that must outlive a session.
    pub fn subscribe_public(
        &self,
        path: &str,
        query: &[(String, String)],
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamEvent>, Error> {
        self.open_stream(path, query, None, cancel)
    }

    fn open_stream(
        &self,
        path: &str,
        query: &[(String, String)],
        token: Option<SecretString>,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamEvent>, Error> {
        let url = self.node_url(path, query, token.as_ref())?;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let target = StreamTarget {
            http: self.stream_http().clone(),
            url,
            path: path.to_owned(),
            authenticated: token.is_some(),
        };
        let reconnect = self.config().reconnect.clone();
        tokio::spawn(async move {
            stream_loop(target, tx, reconnect, cancel).await;
        });

        Ok(rx)
    }
}

struct StreamTarget {
    http: reqwest::Client,
    url: Url,
    path: String,
    authenticated: bool,
}

// ── Background reconnection loop ─────────────────────────────────────

/// How a single connection ended.
enum Ended {
    /// Server closed the stream cleanly. `delivered` is set when at least
    /// one event arrived before the close.
    Closed { delivered: bool },
    /// Nothing more to do (terminal event, consumer gone, cancelled).
    Stop,
}

/// Sleep for `delay` unless cancelled first. Returns `false` on cancel.
async fn pause(delay: Duration, attempt: u32, cancel: &CancellationToken) -> bool {
    tracing::debug!(
        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        attempt,
        "waiting before reconnect"
    );
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

fn retries_exhausted(attempt: u32, reconnect: &ReconnectConfig) -> bool {
    match reconnect.max_retries {
        Some(max) if attempt >= max => {
            tracing::warn!(max_retries = max, "event stream retry limit reached, giving up");
            true
        }
        _ => false,
    }
}

/// Main loop: connect → read → backoff → reconnect.
///
/// Servers and proxies routinely close long-lived event streams, so a
/// clean close waits out the backoff like an error does. The attempt
/// counter only resets once a connection has delivered an event.
async fn stream_loop(
    target: StreamTarget,
    tx: mpsc::Sender<StreamEvent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&target, &tx, &cancel) => result,
        };

        match result {
            Ok(Ended::Stop) => break,
            Ok(Ended::Closed { delivered }) => {
                if delivered {
                    attempt = 0;
                } else if retries_exhausted(attempt, &reconnect) {
                    break;
                }
                tracing::info!(path = %target.path, delivered, "event stream closed, reconnecting");
            }
            Err(Error::SessionExpired) => {
                let _ = tx.send(StreamEvent::AuthRevoked).await;
                break;
            }
            Err(Error::PermissionDenied { .. }) => {
                let _ = tx.send(StreamEvent::PermissionDenied).await;
                break;
            }
            Err(e) => {
                tracing::warn!(path = %target.path, error = %e, attempt, "event stream error");
                if retries_exhausted(attempt, &reconnect) {
                    break;
                }
                let notice = StreamEvent::Disconnected { attempt, error: e.to_string() };
                if tx.send(notice).await.is_err() {
                    break;
                }
            }
        }

        if !pause(calculate_backoff(attempt, &reconnect), attempt, &cancel).await {
            break;
        }
        attempt = attempt.saturating_add(1);
    }

    tracing::debug!(path = %target.path, "event stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open one event stream and apply events until it ends.
async fn connect_and_read(
    target: &StreamTarget,
    tx: &mpsc::Sender<StreamEvent>,
    cancel: &CancellationToken,
) -> Result<Ended, Error> {
    tracing::debug!(path = %target.path, "opening event stream");

    let resp = target
        .http
        .get(target.url.clone())
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| Error::StreamConnect(e.to_string()))?;
    let resp = check_status(resp, &target.path, target.authenticated).await?;

    let mut events = pin!(sse_events(resp.bytes_stream()));
    let mut tree = Value::Null;
    let mut delivered = false;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(Ended::Stop),
            next = events.next() => {
                let Some(event) = next else {
                    return Ok(Ended::Closed { delivered });
                };
                let event = event?;
                delivered = true;
                match apply_event(&mut tree, &event, &target.path)? {
                    Applied::Changed => {
                        if tx.send(StreamEvent::Value(tree.clone())).await.is_err() {
                            return Ok(Ended::Stop);
                        }
                    }
                    Applied::Ignored => {}
                }
            }
        }
    }
}

enum Applied {
    Changed,
    Ignored,
}

/// Apply one server-sent event to the local tree.
fn apply_event(tree: &mut Value, event: &SseEvent, path: &str) -> Result<Applied, Error> {
    match event.event.as_str() {
        "put" | "patch" => {
            let change: TreeChange = serde_json::from_str(&event.data).map_err(|e| {
                Error::Deserialization {
                    message: format!("malformed {} event: {e}", event.event),
                    body: event.data.clone(),
                }
            })?;
            if event.event == "put" {
                apply_put(tree, &change.path, change.data);
            } else {
                apply_patch(tree, &change.path, change.data);
            }
            Ok(Applied::Changed)
        }
        "keep-alive" => Ok(Applied::Ignored),
        "cancel" => Err(Error::PermissionDenied {
            path: path.to_owned(),
        }),
        "auth_revoked" => Err(Error::SessionExpired),
        other => {
            tracing::trace!(event = other, "ignoring unknown stream event");
            Ok(Applied::Ignored)
        }
    }
}

#[derive(Debug, Deserialize)]
struct TreeChange {
    path: String,
    #[serde(default)]
    data: Value,
}

// ── Local tree ───────────────────────────────────────────────────────

/// Replace the value at `path` (relative to the subscription root).
/// `null` removes it.
pub(crate) fn apply_put(root: &mut Value, path: &str, data: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        *root = data;
        return;
    };

    let mut node = root;
    for seg in parents {
        if !node.is_object() {
            if data.is_null() {
                return;
            }
            make_object(node);
        }
        let Value::Object(map) = node else {
            return;
        };
        node = map.entry((*seg).to_owned()).or_insert(Value::Null);
    }

    if data.is_null() {
        if let Value::Object(map) = node {
            map.remove(*last);
        }
        return;
    }

    make_object(node);
    if let Value::Object(map) = node {
        map.insert((*last).to_owned(), data);
    }
}

/// Merge the children of `data` into the value at `path`.
pub(crate) fn apply_patch(root: &mut Value, path: &str, data: Value) {
    let Value::Object(children) = data else {
        apply_put(root, path, data);
        return;
    };
    let base = path.trim_end_matches('/');
    for (key, value) in children {
        apply_put(root, &format!("{base}/{key}"), value);
    }
}

/// Turn `node` into an object, keeping array children under index keys.
fn make_object(node: &mut Value) {
    match node {
        Value::Object(_) => {}
        Value::Array(items) => {
            let map: Map<String, Value> = std::mem::take(items)
                .into_iter()
                .enumerate()
                .filter(|(_, v)| !v.is_null())
                .map(|(i, v)| (i.to_string(), v))
                .collect();
            *node = Value::Object(map);
        }
        _ => *node = Value::Object(Map::new()),
    }
}

// ── SSE decoding ─────────────────────────────────────────────────────

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: BytesMut,
    event: String,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed a chunk; returns every event completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos);
            self.buf.advance(1);
            let line = String::from_utf8_lossy(&line);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    out.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
                None => (line, ""),
            };
            match field {
                "event" => value.clone_into(&mut self.event),
                "data" => self.data.push(value.to_owned()),
                _ => {}
            }
        }

        out
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = std::mem::take(&mut self.event);
        if self.data.is_empty() && event.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: if event.is_empty() { "message".into() } else { event },
            data,
        })
    }
}

/// Decode a byte stream into server-sent events.
fn sse_events<S>(bytes: S) -> impl Stream<Item = Result<SseEvent, Error>>
where
    S: Stream<Item = reqwest::Result<bytes::Bytes>>,
{
    async_stream::try_stream! {
        let mut decoder = SseDecoder::default();
        let mut bytes = pin!(bytes);
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| Error::StreamClosed { reason: e.to_string() })?;
            for event in decoder.feed(&chunk) {
                yield event;
            }
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap, clippy::as_conversions)]
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exp = attempt.min(30) as i32;
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exp);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────
