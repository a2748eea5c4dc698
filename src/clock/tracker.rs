//! Session clock: converts wall-clock elapsed time into progress and fires
//! end-of-session exactly once.

use std::sync::Arc;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::SessionTiming;
use crate::models::SessionStatus;
use crate::session::state::Shared;

/// Ticks at `timing.clock_tick`, refreshing elapsed/progress in shared
/// state. When progress reaches 100% the completion signal is sent once and
/// the loop stops updating.
pub(crate) async fn progress_loop(
    shared: Arc<Shared>,
    timing: SessionTiming,
    cancel: CancellationToken,
    completed: mpsc::Sender<()>,
) {
    let mut ticker = time::interval(timing.clock_tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (status, progress) = shared
                    .update(|state| {
                        state.sync_progress(&timing);
                        (state.status, state.progress_pct)
                    })
                    .await;

                if status != SessionStatus::Running {
                    break;
                }
                if progress >= 100.0 {
                    info!("session clock reached 100%, signalling completion");
                    let _ = completed.send(()).await;
                    break;
                }
            }
            _ = cancel.cancelled() => {
                debug!("progress clock shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::models::Vibe;
    use chrono::Utc;
    use std::time::{Duration, Instant};

    fn fast_timing() -> SessionTiming {
        SessionTiming {
            clock_tick: Duration::from_millis(5),
            minute: Duration::from_millis(40),
            ..SessionTiming::default()
        }
    }

    #[tokio::test]
    async fn completion_fires_exactly_once() {
        let timing = fast_timing();
        let shared = Shared::new();
        let config = SessionConfig::new(1, "goal", Vibe::Calm).unwrap();
        shared
            .update(|state| {
                state.begin_session("s-1".into(), config, Utc::now(), Instant::now());
            })
            .await;

        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(4);
        let handle = tokio::spawn(progress_loop(shared.clone(), timing, cancel, tx));

        rx.recv().await.expect("completion signal");
        handle.await.unwrap();

        // The loop stopped; the channel is closed with nothing buffered.
        assert!(rx.recv().await.is_none());
        assert_eq!(shared.snapshot().await.progress_pct, 100.0);
    }

    #[tokio::test]
    async fn cancellation_stops_clock_before_completion() {
        let timing = SessionTiming {
            clock_tick: Duration::from_millis(5),
            minute: Duration::from_secs(60),
            ..SessionTiming::default()
        };
        let shared = Shared::new();
        let config = SessionConfig::new(30, "goal", Vibe::Calm).unwrap();
        shared
            .update(|state| {
                state.begin_session("s-1".into(), config, Utc::now(), Instant::now());
            })
            .await;

        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(4);
        let handle = tokio::spawn(progress_loop(shared.clone(), timing, cancel.clone(), tx));

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(rx.recv().await.is_none());
        assert!(shared.snapshot().await.progress_pct < 100.0);
    }
}
