//! Realtime wire protocol
//!
//! Every frame is a JSON text message with a `type` discriminator.
//! Outbound frames are [`ClientEvent`]s; inbound frames decode to
//! [`ServerEvent`]. Inbound types the orchestrator does not act on decode
//! to [`ServerEvent::Unknown`] and are ignored downstream.

use serde::{Deserialize, Serialize};

use voice_duet_config::{SessionSettings, TurnDetectionMode};
use voice_duet_core::{AgentIdentity, AudioFormat, Voice};

use crate::connection::TransportEvent;
use crate::TransportError;

/// Output modalities requested for every session and response
const MODALITIES: [&str; 2] = ["text", "audio"];

/// Messages sent to the realtime endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Configure persona, voice, formats and turn detection
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionParams },

    /// Ask the model to produce one spoken response
    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseParams },
}

impl ClientEvent {
    pub fn response(instructions: impl Into<String>) -> Self {
        ClientEvent::ResponseCreate {
            response: ResponseParams {
                modalities: modalities(),
                instructions: instructions.into(),
            },
        }
    }

    /// Wire `type` of the event
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::ResponseCreate { .. } => "response.create",
        }
    }

    pub fn to_json(&self) -> Result<String, TransportError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn modalities() -> Vec<String> {
    MODALITIES.iter().map(|m| m.to_string()).collect()
}

/// Session configuration payload of `session.update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: Voice,
    pub input_audio_format: AudioFormat,
    pub output_audio_format: AudioFormat,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub input_audio_transcription: Option<TranscriptionParams>,
    /// `null` disables endpoint-side turn detection
    pub turn_detection: Option<TurnDetectionParams>,
    pub temperature: f32,
    pub max_response_output_tokens: u32,
}

impl SessionParams {
    /// Session parameters for one agent
    pub fn for_agent(identity: &AgentIdentity, settings: &SessionSettings) -> Self {
        let turn_detection = match settings.turn_detection.mode {
            TurnDetectionMode::ServerVad => Some(TurnDetectionParams {
                kind: "server_vad".to_string(),
                threshold: settings.turn_detection.threshold,
                prefix_padding_ms: settings.turn_detection.prefix_padding_ms,
                silence_duration_ms: settings.turn_detection.silence_duration_ms,
            }),
            TurnDetectionMode::Disabled => None,
        };

        Self {
            modalities: modalities(),
            instructions: identity.instructions.clone(),
            voice: identity.voice,
            input_audio_format: settings.input_audio_format,
            output_audio_format: settings.output_audio_format,
            input_audio_transcription: settings
                .transcription_model
                .as_ref()
                .map(|model| TranscriptionParams { model: model.clone() }),
            turn_detection,
            temperature: settings.temperature,
            max_response_output_tokens: settings.max_response_output_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionParams {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDetectionParams {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

/// Payload of `response.create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseParams {
    pub modalities: Vec<String>,
    pub instructions: String,
}

/// Messages received from the realtime endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated,

    /// Acknowledges `session.update`; the session is ready for turns
    #[serde(rename = "session.updated")]
    SessionUpdated,

    /// A response started; later events carry its id as `response_id`
    #[serde(rename = "response.created")]
    ResponseCreated {
        #[serde(default)]
        response: Option<ResponseInfo>,
    },

    #[serde(rename = "response.audio_transcript.delta")]
    TranscriptDelta {
        #[serde(default)]
        response_id: Option<String>,
        delta: String,
    },

    #[serde(rename = "response.audio_transcript.done")]
    TranscriptDone {
        #[serde(default)]
        response_id: Option<String>,
        transcript: String,
    },

    /// Base64-encoded audio in the session's output format
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        #[serde(default)]
        response_id: Option<String>,
        delta: String,
    },

    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: Option<ResponseInfo>,
    },

    #[serde(rename = "error")]
    Error { error: ErrorDetail },

    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Id of the response this event belongs to, when it names one
    pub fn response_id(&self) -> Option<&str> {
        match self {
            ServerEvent::ResponseCreated { response } | ServerEvent::ResponseDone { response } => {
                response.as_ref().and_then(|r| r.id.as_deref())
            },
            ServerEvent::TranscriptDelta { response_id, .. }
            | ServerEvent::TranscriptDone { response_id, .. }
            | ServerEvent::AudioDelta { response_id, .. } => response_id.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Decode one inbound text frame
pub fn decode_frame(text: &str) -> TransportEvent {
    match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => TransportEvent::Message(event),
        Err(e) => TransportEvent::Malformed {
            raw: text.chars().take(256).collect(),
            error: e.to_string(),
        },
    }
}
