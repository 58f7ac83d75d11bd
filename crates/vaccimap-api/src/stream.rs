//! Server-sent event stream with auto-reconnect.
//!
//! Opens a `text/event-stream` request on a database location and delivers
//! parsed [`StreamEvent`]s through a bounded [`tokio::sync::mpsc`] channel,
//! in the order the server sent them. Handles reconnection with exponential
//! backoff + jitter automatically. Every (re)connection starts with a `put`
//! at `/` carrying the full current value of the location.
//!
//! # Example
//!
//! ```rust,ignore
//! use vaccimap_api::stream::{EventStream, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let mut stream = EventStream::connect(
//!     client,
//!     vec!["Testing Sites".into()],
//!     ReconnectConfig::default(),
//!     cancel.clone(),
//! );
//!
//! while let Some(event) = stream.recv().await {
//!     println!("{}: {:?}", event.path(), event);
//! }
//! ```

use std::time::Duration;

use async_stream::try_stream;
use bytes::{Buf, BytesMut};
use futures_core::Stream;
use futures_util::{StreamExt, pin_mut};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::{RealtimeClient, check_status};
use crate::error::Error;
use crate::models::{StreamEvent, StreamPayload};

// ── Channel capacity ─────────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

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

// ── EventStream ──────────────────────────────────────────────────────

/// Handle to a running event stream.
///
/// Dropping the handle closes the channel, which stops the background task
/// at its next delivery; [`shutdown`](Self::shutdown) stops it immediately.
pub struct EventStream {
    event_rx: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
}

impl EventStream {
    /// Spawn the connect/read/reconnect loop for the location at `path`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. Must be called from within a Tokio runtime.
    pub fn connect(
        client: RealtimeClient,
        path: Vec<String>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            stream_loop(client, path, event_tx, reconnect, task_cancel).await;
        });

        Self { event_rx, cancel }
    }

    /// Receive the next event. Returns `None` once the stream has shut down
    /// (cancelled, or the reconnection limit was reached).
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.event_rx.recv().await
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn stream_loop(
    client: RealtimeClient,
    path: Vec<String>,
    event_tx: mpsc::Sender<StreamEvent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    let segments: Vec<&str> = path.iter().map(String::as_str).collect();

    loop {
        if event_tx.is_closed() {
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            (accepted, result) = connect_and_read(&client, &segments, &event_tx) => {
                if accepted {
                    attempt = 0;
                }
                match result {
                    // Server closed the body cleanly: reconnect immediately.
                    Ok(()) => {
                        tracing::info!(path = %path.join("/"), "event stream ended, reconnecting");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "event stream error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "event stream reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!(path = %path.join("/"), "event stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open one streaming request and forward events until it drops.
///
/// The flag reports whether the server accepted the request, so the
/// backoff only grows across consecutive failed connects.
async fn connect_and_read(
    client: &RealtimeClient,
    path: &[&str],
    event_tx: &mpsc::Sender<StreamEvent>,
) -> (bool, Result<(), Error>) {
    let resp = match open(client, path).await {
        Ok(resp) => resp,
        Err(e) => return (false, Err(e)),
    };
    (true, read_events(resp, event_tx).await)
}

async fn open(client: &RealtimeClient, path: &[&str]) -> Result<reqwest::Response, Error> {
    let url = client.url_for(path)?;
    tracing::info!(path = %path.join("/"), "opening event stream");

    let resp = client
        .stream_http()
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await?;
    check_status(resp).await
}

async fn read_events(
    resp: reqwest::Response,
    event_tx: &mpsc::Sender<StreamEvent>,
) -> Result<(), Error> {
    let frames = sse_frames(resp.bytes_stream());
    pin_mut!(frames);

    while let Some(frame) = frames.next().await {
        let Some(event) = interpret_frame(&frame?)? else {
            continue;
        };
        if event_tx.send(event).await.is_err() {
            // Receiver dropped: nobody is listening any more.
            return Ok(());
        }
    }

    Ok(())
}

// ── Frame parsing ────────────────────────────────────────────────────

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser.
///
/// Bytes may arrive split anywhere (including inside a UTF-8 sequence);
/// only complete lines are decoded.
#[derive(Debug, Default)]
pub(crate) struct SseParser {
    buf: BytesMut,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    /// Feed a chunk and return every frame it completed.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos);
            self.buf.advance(1);
            let line = String::from_utf8_lossy(&line);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => self.event = Some(value.to_owned()),
                "data" => self.data.push(value.to_owned()),
                _ => {}
            }
        }

        frames
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if self.event.is_none() && self.data.is_empty() {
            return None;
        }
        let event = self.event.take().unwrap_or_else(|| "message".into());
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}

/// Adapt a response body into a stream of parsed frames.
fn sse_frames<S>(body: S) -> impl Stream<Item = Result<SseFrame, Error>>
where
    S: Stream<Item = reqwest::Result<bytes::Bytes>>,
{
    try_stream! {
        pin_mut!(body);
        let mut parser = SseParser::default();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for frame in parser.feed(&chunk) {
                yield frame;
            }
        }
    }
}

/// Translate a frame into a data event. Control frames yield `Ok(None)`
/// (keep-alive) or an error that ends the connection (cancel, auth_revoked).
pub(crate) fn interpret_frame(frame: &SseFrame) -> Result<Option<StreamEvent>, Error> {
    match frame.event.as_str() {
        "put" | "patch" => {
            let payload: StreamPayload =
                serde_json::from_str(&frame.data).map_err(|e| Error::Deserialization {
                    message: e.to_string(),
                    body: frame.data.clone(),
                })?;
            let event = if frame.event == "put" {
                StreamEvent::Put {
                    path: payload.path,
                    data: payload.data,
                }
            } else {
                StreamEvent::Patch {
                    path: payload.path,
                    data: payload.data,
                }
            };
            Ok(Some(event))
        }
        "keep-alive" => {
            tracing::trace!("event stream keep-alive");
            Ok(None)
        }
        "cancel" => Err(Error::StreamCancelled {
            reason: frame.data.trim_matches('"').to_owned(),
        }),
        "auth_revoked" => Err(Error::AuthRevoked),
        other => {
            tracing::debug!(event = other, "ignoring unknown stream event");
            Ok(None)
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from many clients.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap, clippy::as_conversions)]
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = attempt.min(30) as i32;
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
