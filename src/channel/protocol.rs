//! Wire format of the perception channel.
//!
//! Client to server: one JSON config message, then raw JPEG frames as
//! binary messages. Server to client: JSON replies with a score and the
//! distraction events detected in the frame.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub(crate) struct PerceptionReply {
    /// `None` when the backend has no reading yet. A non-numeric score is
    /// treated the same way, never coerced to 0.
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: Option<f64>,
    #[serde(default)]
    pub cheat_events: Vec<Value>,
}

impl PerceptionReply {
    pub fn distracted(&self) -> bool {
        !self.cheat_events.is_empty()
    }
}

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}

pub(crate) fn parse_reply(text: &str) -> Result<PerceptionReply> {
    serde_json::from_str(text).context("unparseable perception reply")
}

/// First client message after the channel opens.
pub(crate) fn hello_message(duration_minutes: u32) -> String {
    json!({ "duration": duration_minutes }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_score_is_kept() {
        let reply = parse_reply(r#"{"score": 87.5, "cheat_events": []}"#).unwrap();
        assert_eq!(reply.score, Some(87.5));
        assert!(!reply.distracted());
    }

    #[test]
    fn null_score_is_no_reading() {
        let reply = parse_reply(r#"{"score": null, "cheat_events": []}"#).unwrap();
        assert_eq!(reply.score, None);
    }

    #[test]
    fn missing_score_is_no_reading() {
        let reply = parse_reply(r#"{"cheat_events": []}"#).unwrap();
        assert_eq!(reply.score, None);
    }

    #[test]
    fn non_numeric_score_is_not_coerced_to_zero() {
        let reply = parse_reply(r#"{"score": "warming up", "cheat_events": []}"#).unwrap();
        assert_eq!(reply.score, None);
    }

    #[test]
    fn zero_score_is_a_real_reading() {
        let reply = parse_reply(r#"{"score": 0}"#).unwrap();
        assert_eq!(reply.score, Some(0.0));
    }

    #[test]
    fn cheat_events_drive_the_distraction_flag() {
        let reply =
            parse_reply(r#"{"score": 40, "cheat_events": [{"type": "looked_away"}]}"#).unwrap();
        assert!(reply.distracted());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(parse_reply("not json at all").is_err());
        assert!(parse_reply(r#"["wrong", "shape"]"#).is_err());
    }

    #[test]
    fn hello_message_carries_duration() {
        let value: Value = serde_json::from_str(&hello_message(25)).unwrap();
        assert_eq!(value, json!({"duration": 25}));
    }
}
