//! Dispatches a triggered nudge request to the backend and manages the
//! active nudge's auto-dismiss timer.

use std::sync::Arc;

use log::warn;
use tokio_util::sync::CancellationToken;

use crate::api::{BackendClient, NudgePayload};
use crate::config::SessionTiming;
use crate::models::Vibe;
use crate::nudge::aggregator::{pick_fallback, NudgeRequest};
use crate::session::state::Shared;

#[derive(Clone)]
pub(crate) struct NudgeTrigger {
    pub client: BackendClient,
    pub shared: Arc<Shared>,
    pub timing: SessionTiming,
    pub vibe: Vibe,
    pub cancel: CancellationToken,
}

impl NudgeTrigger {
    /// Fire one nudge fetch. The aggregator already moved to `Pending`, so
    /// a second dispatch cannot happen until this nudge is dismissed. On
    /// backend failure the user still gets a nudge from the local fallback
    /// set.
    pub fn dispatch(&self, request: NudgeRequest, elapsed_secs: u64) {
        let this = self.clone();
        let _ = tokio::spawn(async move {
            let payload = NudgePayload {
                distraction_count: request.distraction_count,
                recent_events: request.recent_events,
                session_duration: elapsed_secs,
                vibe: this.vibe,
            };

            let nudge = tokio::select! {
                result = this.client.micro_nudge(&payload) => match result {
                    Ok(nudge) => nudge,
                    Err(err) => {
                        warn!("micro-nudge fetch failed, using local fallback: {err:#}");
                        pick_fallback()
                    }
                },
                _ = this.cancel.cancelled() => return,
            };

            let seq = this
                .shared
                .update(|state| state.aggregator.resolve(nudge))
                .await;

            // Auto-dismiss re-arms the trigger unless the user got there
            // first or a newer nudge replaced this one.
            let dismisser = this.clone();
            let _ = tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(dismisser.timing.nudge_dismiss) => {
                        dismisser
                            .shared
                            .update(|state| {
                                let _ = state.aggregator.dismiss(Some(seq));
                            })
                            .await;
                    }
                    _ = dismisser.cancel.cancelled() => {}
                }
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::nudge::aggregator::fallback_nudges;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn trigger_for(server_uri: String, timing: SessionTiming) -> NudgeTrigger {
        NudgeTrigger {
            client: BackendClient::new(&BackendConfig {
                perception_ws_url: "ws://unused".into(),
                coach_base_url: server_uri.clone(),
                nudge_base_url: server_uri,
            }),
            shared: Shared::new(),
            timing,
            vibe: Vibe::Calm,
            cancel: CancellationToken::new(),
        }
    }

    fn request() -> NudgeRequest {
        NudgeRequest {
            distraction_count: 2,
            recent_events: vec![],
        }
    }

    #[tokio::test]
    async fn backend_nudge_becomes_active() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/micro-nudge"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "nudge": {"type": "breathing", "message": "slow down"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let trigger = trigger_for(server.uri(), SessionTiming::default());
        let mut rx = trigger.shared.subscribe();
        trigger.dispatch(request(), 90);

        rx.changed().await.unwrap();
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.nudge.unwrap().message, "slow down");
    }

    #[tokio::test]
    async fn backend_failure_falls_back_to_canned_nudge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/micro-nudge"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let trigger = trigger_for(server.uri(), SessionTiming::default());
        let mut rx = trigger.shared.subscribe();
        trigger.dispatch(request(), 90);

        rx.changed().await.unwrap();
        let nudge = rx.borrow().clone().nudge.unwrap();
        assert!(fallback_nudges().contains(&nudge));
    }

    #[tokio::test]
    async fn active_nudge_auto_dismisses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/micro-nudge"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "nudge": {"type": "stretch", "message": "stand up"}
            })))
            .mount(&server)
            .await;

        let timing = SessionTiming {
            nudge_dismiss: Duration::from_millis(20),
            ..SessionTiming::default()
        };
        let trigger = trigger_for(server.uri(), timing);
        let mut rx = trigger.shared.subscribe();
        trigger.dispatch(request(), 10);

        rx.changed().await.unwrap();
        assert!(rx.borrow().clone().nudge.is_some());

        rx.changed().await.unwrap();
        assert!(rx.borrow().clone().nudge.is_none());
    }
}
