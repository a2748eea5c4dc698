//! The persistent perception-channel worker: one WebSocket connection,
//! a fixed-rate capture-and-send loop, and inbound reply ingestion.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::time::{self, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::config::SessionTiming;
use crate::models::{ConnectionStatus, FocusSample};
use crate::nudge::NudgeTrigger;
use crate::session::state::Shared;

use super::frame::{encode_jpeg, FrameSource};
use super::protocol;

pub(crate) struct StreamContext {
    pub url: String,
    pub duration_minutes: u32,
    pub timing: SessionTiming,
    pub shared: Arc<Shared>,
    /// Camera handle, owned by the orchestrator facade. The loop only
    /// borrows it per tick; teardown takes it back and releases it.
    pub frames: Arc<Mutex<Option<Box<dyn FrameSource>>>>,
    pub trigger: NudgeTrigger,
}

/// Runs for the life of the connection. There is no reconnect: once the
/// channel drops, the session continues degraded until it ends.
pub(crate) async fn stream_loop(ctx: StreamContext, cancel: CancellationToken) {
    ctx.shared
        .update(|state| state.connection = ConnectionStatus::Connecting)
        .await;

    let connected = tokio::select! {
        result = connect_async(&ctx.url) => result,
        _ = cancel.cancelled() => return,
    };

    let (ws, _) = match connected {
        Ok(pair) => pair,
        Err(err) => {
            warn!("perception channel failed to open: {err}");
            mark_disconnected(&ctx.shared).await;
            return;
        }
    };
    info!("connected to perception backend at {}", ctx.url);

    let (mut ws_tx, mut ws_rx) = ws.split();

    let hello = protocol::hello_message(ctx.duration_minutes);
    if let Err(err) = ws_tx.send(Message::Text(hello.into())).await {
        warn!("failed to send channel config message: {err}");
        mark_disconnected(&ctx.shared).await;
        return;
    }

    ctx.shared
        .update(|state| {
            state.connection = ConnectionStatus::Connected;
            state.status_line = "Connected".into();
        })
        .await;

    // Drop-current backpressure: a slow send swallows the missed ticks,
    // stale frames are never queued.
    let mut ticker = time::interval(ctx.timing.frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut frames_sent: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = {
                    let mut guard = match ctx.frames.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    match guard.as_mut().map(|source| source.next_frame()) {
                        Some(Ok(frame)) => frame,
                        Some(Err(err)) => {
                            warn!("frame capture failed: {err:#}");
                            None
                        }
                        None => None,
                    }
                };
                let Some(frame) = frame else { continue };

                let encoded = tokio::task::spawn_blocking(move || encode_jpeg(&frame)).await;
                let bytes = match encoded {
                    Ok(Ok(bytes)) => bytes,
                    Ok(Err(err)) => {
                        warn!("frame encode failed: {err:#}");
                        continue;
                    }
                    Err(err) => {
                        warn!("frame encode worker join failed: {err}");
                        continue;
                    }
                };

                if let Err(err) = ws_tx.send(Message::Binary(bytes.into())).await {
                    warn!("perception channel send failed: {err}");
                    mark_disconnected(&ctx.shared).await;
                    break;
                }
                frames_sent += 1;
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => handle_reply(&ctx, &text).await,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("perception channel closed after {frames_sent} frames");
                        mark_disconnected(&ctx.shared).await;
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!("perception channel error: {err}");
                        mark_disconnected(&ctx.shared).await;
                        break;
                    }
                }
            }
            _ = cancel.cancelled() => {
                debug!("perception channel shutting down after {frames_sent} frames");
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

async fn handle_reply(ctx: &StreamContext, text: &str) {
    match protocol::parse_reply(text) {
        Ok(reply) => {
            let distracted = reply.distracted();
            let now = Utc::now();
            let triggered = ctx
                .shared
                .update(|state| {
                    state.focus = FocusSample {
                        timestamp: Some(now),
                        score: reply.score,
                    };
                    state.distracted = distracted;
                    state.status_line = match (reply.score, distracted) {
                        (Some(score), true) => {
                            format!("Focus Score: {score} (Distraction detected)")
                        }
                        (Some(score), false) => format!("Focus Score: {score}"),
                        (None, _) => "Focus Score: processing...".into(),
                    };
                    let elapsed = state.elapsed.as_secs();
                    state
                        .aggregator
                        .observe(distracted, now, ctx.timing.nudge_window)
                        .map(|request| (request, elapsed))
                })
                .await;

            if let Some((request, elapsed_secs)) = triggered {
                ctx.trigger.dispatch(request, elapsed_secs);
            }
        }
        Err(err) => {
            // Reported, but the channel stays up.
            warn!("{err:#}: {text}");
            ctx.shared
                .update(|state| state.status_line = "Parse error".into())
                .await;
        }
    }
}

async fn mark_disconnected(shared: &Shared) {
    shared
        .update(|state| {
            state.connection = ConnectionStatus::Disconnected;
            state.status_line = "Not connected".into();
        })
        .await;
}
