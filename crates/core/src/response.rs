//! Agent response schema and tolerant extraction.
//!
//! Every generation agent is expected to reply with one JSON object in the
//! speech/display shape below. Models routinely wrap that JSON in markdown
//! code fences or stray prose, so [`extract_json`] peels those layers before
//! parsing.

use crate::error::{Result, TutorError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

static JSON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)\n?```").unwrap());

/// Emotion tag attached to the spoken channel, consumed by the avatar/TTS
/// layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Encouraging,
    Celebratory,
    Supportive,
    Neutral,
    Warm,
    Excited,
}

/// The TTS-safe spoken channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speech {
    pub text: String,
    pub emotion: Emotion,
}

/// The visually rendered channel. `content` is `None` for speech-only turns
/// (the original tutor returns `display.content = null` for celebrations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Display {
    pub content: Option<String>,
    #[serde(default = "default_show_after_speech")]
    pub show_after_speech: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

fn default_show_after_speech() -> bool {
    true
}

/// An optional request to render a pre-built visual tool alongside the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MathTool {
    pub tool_name: String,
    pub parameters: Value,
    pub caption: String,
}

/// The one response shape all downstream UI/TTS consumers rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub speech: Speech,
    pub display: Display,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub math_tool: Option<MathTool>,
}

/// Extracts the JSON object from a model reply that may wrap it in markdown
/// fences or surround it with prose. The first fenced block wins; otherwise
/// the slice from the first `{` to the last `}` is taken.
pub fn extract_json(text: &str) -> Result<Value> {
    let mut candidate = text.trim().to_string();

    if let Some(caps) = JSON_FENCE_RE.captures(&candidate) {
        if let Some(inner) = caps.get(1) {
            candidate = inner.as_str().trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (candidate.find('{'), candidate.rfind('}')) {
        if start < end {
            candidate = candidate[start..=end].to_string();
        }
    }

    serde_json::from_str(&candidate)
        .map_err(|e| TutorError::MalformedResponse(format!("invalid JSON: {e}")))
}

/// Parses a model reply into an [`AgentResponse`], naming the missing or
/// malformed keys on failure.
pub fn parse_agent_response(text: &str) -> Result<AgentResponse> {
    let value = extract_json(text)?;

    for key in ["speech", "display"] {
        if value.get(key).is_none() {
            return Err(TutorError::MalformedResponse(format!(
                "missing required key '{key}'"
            )));
        }
    }

    let response: AgentResponse = serde_json::from_value(value)
        .map_err(|e| TutorError::MalformedResponse(e.to_string()))?;

    if response.speech.text.trim().is_empty() {
        return Err(TutorError::MalformedResponse(
            "speech.text is empty".to_string(),
        ));
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = r#"{
        "speech": {"text": "Nice work!", "emotion": "celebratory"},
        "display": {"content": null, "showAfterSpeech": false}
    }"#;

    #[test]
    fn test_parse_plain_json() {
        let response = parse_agent_response(PLAIN).unwrap();
        assert_eq!(response.speech.text, "Nice work!");
        assert_eq!(response.speech.emotion, Emotion::Celebratory);
        assert_eq!(response.display.content, None);
        assert!(!response.display.show_after_speech);
    }

    #[test]
    fn test_parse_fenced_json() {
        let wrapped = format!("Here you go:\n```json\n{PLAIN}\n```\nDone.");
        let response = parse_agent_response(&wrapped).unwrap();
        assert_eq!(response.speech.emotion, Emotion::Celebratory);
    }

    #[test]
    fn test_parse_json_with_surrounding_prose() {
        let wrapped = format!("Sure! {PLAIN} hope that helps");
        assert!(parse_agent_response(&wrapped).is_ok());
    }

    #[test]
    fn test_missing_display_is_named() {
        let err = parse_agent_response(r#"{"speech": {"text": "hi", "emotion": "warm"}}"#)
            .unwrap_err();
        assert!(format!("{err}").contains("display"));
    }

    #[test]
    fn test_empty_speech_rejected() {
        let err = parse_agent_response(
            r#"{"speech": {"text": "  ", "emotion": "neutral"}, "display": {"content": "x"}}"#,
        )
        .unwrap_err();
        assert!(format!("{err}").contains("speech.text"));
    }

    #[test]
    fn test_unknown_emotion_rejected() {
        let err = parse_agent_response(
            r#"{"speech": {"text": "hi", "emotion": "gleeful"}, "display": {"content": "x"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, TutorError::MalformedResponse(_)));
    }

    #[test]
    fn test_math_tool_round_trip() {
        let json = r#"{
            "speech": {"text": "Look at the bar model.", "emotion": "encouraging"},
            "display": {"content": "Split the bar into four parts.", "showAfterSpeech": true, "type": "hint"},
            "mathTool": {"toolName": "fractionBars", "parameters": {"parts": 4}, "caption": "Four equal parts"}
        }"#;
        let response = parse_agent_response(json).unwrap();
        let tool = response.math_tool.as_ref().unwrap();
        assert_eq!(tool.tool_name, "fractionBars");
        let back = serde_json::to_value(&response).unwrap();
        assert_eq!(back["mathTool"]["toolName"], "fractionBars");
        assert_eq!(back["display"]["type"], "hint");
    }
}
