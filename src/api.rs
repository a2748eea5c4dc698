//! HTTP client for the coaching, TTS, nudge and feedback backends.
//!
//! Every call here is absorbed by the caller on failure; nothing in this
//! module is fatal to a running session.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::models::{DistractionEvent, Nudge, Vibe};

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    coach_base: String,
    nudge_base: String,
}

#[derive(Debug, Deserialize)]
struct CoachingReply {
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct TtsPayload<'a> {
    text: &'a str,
    vibe: &'a str,
}

#[derive(Debug, Serialize)]
pub struct NudgePayload {
    pub distraction_count: u32,
    pub recent_events: Vec<DistractionEvent>,
    pub session_duration: u64,
    pub vibe: Vibe,
}

#[derive(Debug, Deserialize)]
struct NudgeReply {
    nudge: Nudge,
}

#[derive(Debug, Serialize)]
pub struct FeedbackPayload {
    pub session_id: String,
    pub corrected_events: Vec<DistractionEvent>,
    pub false_positive_count: usize,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            coach_base: config.coach_base_url.trim_end_matches('/').to_string(),
            nudge_base: config.nudge_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch one coaching message for a checkpoint.
    pub async fn coaching_message(
        &self,
        duration_minutes: u32,
        vibe: Vibe,
        minute: u32,
        cheat_count: usize,
    ) -> Result<String> {
        let reply: CoachingReply = self
            .http
            .get(format!("{}/ai-messages", self.coach_base))
            .query(&[
                ("duration", duration_minutes.to_string()),
                ("vibe", vibe.as_str().to_string()),
                ("minute", minute.to_string()),
                ("cheat_count", cheat_count.to_string()),
            ])
            .send()
            .await
            .context("coaching message request failed")?
            .error_for_status()
            .context("coaching backend returned an error")?
            .json()
            .await
            .context("coaching reply was not valid JSON")?;

        Ok(reply.message.unwrap_or_default())
    }

    /// Synthesize a coaching message into raw audio bytes.
    pub async fn synthesize_speech(&self, text: &str, vibe: Vibe) -> Result<Vec<u8>> {
        let bytes = self
            .http
            .post(format!("{}/session/api/tts", self.coach_base))
            .json(&TtsPayload {
                text,
                vibe: vibe.as_str(),
            })
            .send()
            .await
            .context("tts request failed")?
            .error_for_status()
            .context("tts backend returned an error")?
            .bytes()
            .await
            .context("failed to read tts audio body")?;

        Ok(bytes.to_vec())
    }

    /// Request a micro-nudge for the current distraction run.
    pub async fn micro_nudge(&self, payload: &NudgePayload) -> Result<Nudge> {
        let reply: NudgeReply = self
            .http
            .post(format!("{}/api/micro-nudge", self.nudge_base))
            .json(payload)
            .send()
            .await
            .context("micro-nudge request failed")?
            .error_for_status()
            .context("nudge backend returned an error")?
            .json()
            .await
            .context("nudge reply was not valid JSON")?;

        Ok(reply.nudge)
    }

    /// Submit false-positive corrections. Fire-and-forget from the
    /// orchestrator's perspective; the caller only logs failures.
    pub async fn submit_feedback(&self, payload: &FeedbackPayload) -> Result<()> {
        let _ = self
            .http
            .post(format!("{}/api/feedback", self.nudge_base))
            .json(payload)
            .send()
            .await
            .context("feedback request failed")?
            .error_for_status()
            .context("feedback backend returned an error")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BackendClient {
        BackendClient::new(&BackendConfig {
            perception_ws_url: "ws://unused".into(),
            coach_base_url: server.uri(),
            nudge_base_url: server.uri(),
        })
    }

    #[tokio::test]
    async fn coaching_message_passes_checkpoint_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ai-messages"))
            .and(query_param("duration", "20"))
            .and(query_param("vibe", "beast"))
            .and(query_param("minute", "5"))
            .and(query_param("cheat_count", "3"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "push on"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let message = client_for(&server)
            .coaching_message(20, Vibe::Beast, 5, 3)
            .await
            .unwrap();
        assert_eq!(message, "push on");
    }

    #[tokio::test]
    async fn coaching_message_missing_field_becomes_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ai-messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let message = client_for(&server)
            .coaching_message(10, Vibe::Calm, 0, 0)
            .await
            .unwrap();
        assert!(message.is_empty());
    }

    #[tokio::test]
    async fn coaching_message_server_error_is_err() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ai-messages"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = client_for(&server).coaching_message(10, Vibe::Calm, 0, 0).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tts_returns_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session/api/tts"))
            .and(body_partial_json(serde_json::json!({"vibe": "calm"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let bytes = client_for(&server)
            .synthesize_speech("breathe", Vibe::Calm)
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn micro_nudge_parses_nested_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/micro-nudge"))
            .and(body_partial_json(serde_json::json!({"distraction_count": 4})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "nudge": {"type": "posture", "message": "sit up"}
            })))
            .mount(&server)
            .await;

        let nudge = client_for(&server)
            .micro_nudge(&NudgePayload {
                distraction_count: 4,
                recent_events: vec![DistractionEvent::new(Utc::now(), 1)],
                session_duration: 90,
                vibe: Vibe::Gamified,
            })
            .await
            .unwrap();
        assert_eq!(nudge.kind, crate::models::NudgeKind::Posture);
        assert_eq!(nudge.message, "sit up");
    }

    #[tokio::test]
    async fn feedback_posts_correction_counts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/feedback"))
            .and(body_partial_json(serde_json::json!({"false_positive_count": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .submit_feedback(&FeedbackPayload {
                session_id: "s-1".into(),
                corrected_events: vec![],
                false_positive_count: 2,
            })
            .await
            .unwrap();
    }
}
