//! Typed session events
//!
//! Each [`Session`](crate::Session) translates its inbound protocol frames
//! into [`SessionEvent`]s tagged with the agent seat, so events from both
//! sessions can share one channel and one `match`.

use voice_duet_core::AgentId;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub agent: AgentId,
    pub kind: SessionEventKind,
}

impl SessionEvent {
    pub fn new(agent: AgentId, kind: SessionEventKind) -> Self {
        Self { agent, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEventKind {
    /// The endpoint created the session
    Created,
    /// The session configuration was applied; turns may be requested
    Ready,
    /// Incremental transcript of the response being spoken
    TranscriptDelta(String),
    /// Final transcript of the response
    TranscriptDone(String),
    /// Base64-encoded audio fragment
    AudioDelta(String),
    /// The response finished
    TurnDone,
    /// The endpoint reported an error; the session stays open
    Error(String),
    /// The connection ended without a local close
    Disconnected(Option<String>),
}

impl SessionEventKind {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            SessionEventKind::Created => "session-created",
            SessionEventKind::Ready => "session-ready",
            SessionEventKind::TranscriptDelta(_) => "transcript-delta",
            SessionEventKind::TranscriptDone(_) => "transcript-done",
            SessionEventKind::AudioDelta(_) => "audio-delta",
            SessionEventKind::TurnDone => "turn-done",
            SessionEventKind::Error(_) => "error",
            SessionEventKind::Disconnected(_) => "disconnected",
        }
    }
}
