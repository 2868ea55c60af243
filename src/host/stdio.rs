//! Newline-delimited JSON bridge for the host command channel.
//!
//! Reads `CommandEnvelope` lines, dispatches them through the
//! `HostCommandServer` router, and writes `ResponseEnvelope` and
//! `EventEnvelope` lines. Engine [`RuntimeEvent`]s and a periodic
//! `runtime.status` snapshot are forwarded as events.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;

use crate::error::{EngineError, Result};
use crate::host::channel::{HostCommandClient, HostCommandHandler, command_channel_with_events};
use crate::host::contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
use crate::runtime::RuntimeEvent;

/// Default request channel capacity for the bridge.
const REQUEST_CAPACITY: usize = 64;

/// Default event broadcast channel capacity for the bridge.
const EVENT_CAPACITY: usize = 128;

type SharedWriter<W> = Arc<Mutex<BufWriter<W>>>;

/// Run the bridge on stdin/stdout until stdin closes or `runtime.stop`
/// is received.
pub async fn run_stdio_bridge<H>(
    handler: H,
    runtime_events: broadcast::Receiver<RuntimeEvent>,
    status_interval: Duration,
) -> Result<()>
where
    H: HostCommandHandler + Clone,
{
    let input = BufReader::new(tokio::io::stdin());
    run_bridge(
        input,
        tokio::io::stdout(),
        handler,
        runtime_events,
        status_interval,
    )
    .await
}

/// Run the bridge over arbitrary line streams.
///
/// Four tasks cooperate: the router server, an event forwarder writing
/// every broadcast envelope, a relay turning runtime events and status
/// ticks into envelopes, and the reader on the current task. The bridge
/// returns when the reader finishes.
pub async fn run_bridge<R, W, H>(
    input: R,
    output: W,
    handler: H,
    mut runtime_events: broadcast::Receiver<RuntimeEvent>,
    status_interval: Duration,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    H: HostCommandHandler + Clone,
{
    let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
    let (client, server) =
        command_channel_with_events(REQUEST_CAPACITY, event_tx.clone(), handler.clone());
    let writer: SharedWriter<W> = Arc::new(Mutex::new(BufWriter::new(output)));

    let server_handle = tokio::spawn(server.run());

    let event_writer = Arc::clone(&writer);
    let mut event_rx = client.subscribe_events();
    let event_handle = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(envelope) => match serde_json::to_string(&envelope) {
                    Ok(json) => {
                        let mut w = event_writer.lock().await;
                        if let Err(e) = write_line(&mut w, &json).await {
                            tracing::warn!(
                                error = %e,
                                "failed to write event envelope; stopping event forwarder"
                            );
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize event envelope; skipping");
                    }
                },
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event forwarder lagged; some events were dropped");
                }
                Err(RecvError::Closed) => {
                    tracing::info!("event broadcast channel closed; stopping event forwarder");
                    break;
                }
            }
        }
    });

    let relay_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(status_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            let event = tokio::select! {
                _ = ticker.tick() => RuntimeEvent::Status(handler.snapshot()),
                received = runtime_events.recv() => match received {
                    Ok(event) => event,
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "runtime event relay lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            if let Some(envelope) = runtime_event_envelope(&event) {
                let _ = event_tx.send(envelope);
            }
        }
    });

    let reader_result = run_reader(input, client, Arc::clone(&writer)).await;

    relay_handle.abort();
    event_handle.abort();
    let _ = relay_handle.await;
    let _ = event_handle.await;
    let _ = server_handle.await;

    reader_result
}

/// Wrap a runtime event for the wire.
#[must_use]
pub fn runtime_event_envelope(event: &RuntimeEvent) -> Option<EventEnvelope> {
    let payload = match serde_json::to_value(event) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, event = event.name(), "failed to encode runtime event");
            return None;
        }
    };
    Some(EventEnvelope::new(
        uuid::Uuid::new_v4().to_string(),
        event.name(),
        payload,
    ))
}

/// Read lines, dispatch each command, and write responses.
async fn run_reader<R, W>(
    mut reader: R,
    client: HostCommandClient,
    writer: SharedWriter<W>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| EngineError::Channel(format!("failed to read command line: {e}")))?;

        if bytes_read == 0 {
            tracing::info!("command input closed (EOF); shutting down bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope: CommandEnvelope = match serde_json::from_str(trimmed) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse command envelope");
                let response = ResponseEnvelope::error(
                    "parse-error",
                    format!("failed to parse command envelope: {e}"),
                );
                write_response(&writer, &response).await?;
                continue;
            }
        };

        let is_stop = envelope.command == CommandName::RuntimeStop;
        let request_id = envelope.request_id.clone();

        let response = match client.send(envelope).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!(error = %e, "host command dispatch failed");
                ResponseEnvelope::error(request_id, format!("dispatch failed: {e}"))
            }
        };
        write_response(&writer, &response).await?;

        if is_stop {
            tracing::info!("runtime.stop received; shutting down bridge");
            break;
        }
    }

    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &SharedWriter<W>,
    response: &ResponseEnvelope,
) -> Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| EngineError::Channel(format!("failed to serialize response envelope: {e}")))?;
    let mut w = writer.lock().await;
    write_line(&mut w, &json).await
}

/// Write a single JSON line and flush.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut BufWriter<W>, json: &str) -> Result<()> {
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::host::contract::EVENT_VERSION;
    use crate::session::SessionStatus;

    #[test]
    fn parse_error_response_is_well_formed() {
        let resp = ResponseEnvelope::error("parse-error", "bad json");
        assert!(!resp.ok);
        assert_eq!(resp.request_id, "parse-error");
        assert_eq!(resp.v, EVENT_VERSION);
        assert!(resp.error.is_some());
    }

    #[test]
    fn runtime_events_keep_their_wire_name() {
        let snapshot = SessionStatus::default().snapshot();
        let envelope = runtime_event_envelope(&RuntimeEvent::Status(snapshot)).unwrap();
        assert_eq!(envelope.event, "runtime.status");
        assert_eq!(envelope.payload["type"], "status");
        assert_eq!(envelope.payload["is_audio_enabled"], true);
    }
}
