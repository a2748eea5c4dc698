//! Checkpoint scheduler for coaching messages.
//!
//! The session is divided into `SEGMENTS` equal intervals, giving
//! `SEGMENTS + 1` checkpoints: start, each quarter mark, and the completion
//! point. The final checkpoint coincides with session end and is scheduled
//! anyway; teardown cancels whatever has not fired.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::api::BackendClient;
use crate::config::{SessionConfig, SessionTiming};
use crate::models::CoachingMessage;
use crate::session::state::Shared;
use crate::speech::SpeechPipeline;

pub(crate) const SEGMENTS: u32 = 4;

pub(crate) fn checkpoint_offsets(duration_minutes: u32, timing: &SessionTiming) -> Vec<Duration> {
    let total = timing.session_length(duration_minutes);
    (0..=SEGMENTS).map(|i| total * i / SEGMENTS).collect()
}

pub(crate) struct CoachContext {
    pub client: BackendClient,
    pub shared: Arc<Shared>,
    pub timing: SessionTiming,
    pub config: SessionConfig,
    pub speech: SpeechPipeline,
}

pub(crate) async fn checkpoint_loop(ctx: CoachContext, cancel: CancellationToken) {
    let start = Instant::now();
    let offsets = checkpoint_offsets(ctx.config.duration_minutes, &ctx.timing);

    for (index, offset) in offsets.into_iter().enumerate() {
        tokio::select! {
            () = sleep_until(start + offset) => {}
            _ = cancel.cancelled() => return,
        }

        let (minute, cheat_count) = ctx
            .shared
            .update(|state| {
                state.sync_progress(&ctx.timing);
                (state.minutes_elapsed(&ctx.timing), state.aggregator.total())
            })
            .await;

        match ctx
            .client
            .coaching_message(ctx.config.duration_minutes, ctx.config.vibe, minute, cheat_count)
            .await
        {
            Ok(text) => {
                info!("checkpoint {index}: coaching message at minute {minute}");
                ctx.shared
                    .update(|state| {
                        state.message = Some(CoachingMessage::fresh(text, index as u32));
                    })
                    .await;
                ctx.speech.speak_current(&ctx.shared).await;
            }
            // No local fallback for coaching text; the checkpoint is skipped.
            Err(err) => warn!("checkpoint {index}: coaching message fetch failed: {err:#}"),
        }
    }
}
