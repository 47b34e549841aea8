//! Centralized defaults for the voice duet orchestrator
//!
//! Single source of truth for default values used by the settings structs.
//! Override any of them through `config/*.yaml` or `VOICE_DUET__*` variables.

/// Realtime endpoint defaults
pub mod endpoints {
    /// Realtime WebSocket endpoint
    pub const REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

    /// Realtime model
    pub const REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

    /// Environment variable consulted when no API key is configured
    pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
}

/// Connection timing
pub mod connection {
    /// Transport connect timeout
    pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

    /// Upper bound for a graceful close before the I/O tasks are aborted
    pub const CLOSE_TIMEOUT_MS: u64 = 5_000;
}

/// HTTP server defaults
pub mod server {
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 8080;
    /// Seconds the finished conversation stays served before exit
    pub const LINGER_SECS: u64 = 60;
}

/// Session configuration sent with `session.update`
pub mod session {
    pub const TRANSCRIPTION_MODEL: &str = "whisper-1";

    /// Server VAD activation threshold (0.0 - 1.0)
    pub const VAD_THRESHOLD: f32 = 0.5;

    /// Audio kept before detected speech
    pub const PREFIX_PADDING_MS: u32 = 300;

    /// Silence that ends a detected utterance
    pub const SILENCE_DURATION_MS: u32 = 500;

    pub const TEMPERATURE: f32 = 0.8;

    /// Accepted temperature range of the realtime endpoint
    pub const TEMPERATURE_MIN: f32 = 0.6;
    pub const TEMPERATURE_MAX: f32 = 1.2;

    /// Response length cap in tokens
    pub const MAX_RESPONSE_OUTPUT_TOKENS: u32 = 300;

    /// Instructions for the very first turn
    pub const OPENER_INSTRUCTIONS: &str = "Open the conversation. Start with a hook that makes \
        the listener want to hear more, then hand the floor to your partner with a question. \
        Keep it under three sentences.";

    /// Instructions for every later turn
    pub const CONTINUATION_INSTRUCTIONS: &str = "Respond naturally to what was just said. \
        Build on it, add one new idea, and keep it under three sentences.";
}

/// Conversation bounds
pub mod conversation {
    pub const MAX_TURNS: u32 = 6;

    /// Pause between one agent finishing and the other being asked to speak
    pub const INTER_TURN_DELAY_MS: u64 = 600;

    /// Readiness is awaited for at most `READY_POLL_ATTEMPTS * READY_POLL_INTERVAL_MS`
    pub const READY_POLL_ATTEMPTS: u32 = 50;
    pub const READY_POLL_INTERVAL_MS: u64 = 200;

    /// Wall-clock ceiling for the whole run
    pub const RUN_TIMEOUT_SECS: u64 = 300;

    /// Countdown shown on the presentation surface before the first turn
    pub const INTRO_DURATION_MS: u64 = 3_000;
}

/// Default personas
pub mod personas {
    pub const A_NAME: &str = "Alex";
    pub const A_ROLE: &str = "host";
    pub const A_INSTRUCTIONS: &str = "You are Alex, the upbeat host of a short technology \
        podcast. You guide the conversation, ask sharp follow-up questions, and keep things \
        moving. Speak casually and never monologue.";

    pub const B_NAME: &str = "Sam";
    pub const B_ROLE: &str = "guest";
    pub const B_INSTRUCTIONS: &str = "You are Sam, a thoughtful engineer appearing as a guest \
        on a technology podcast. You answer with concrete examples, push back when you \
        disagree, and keep your answers brief.";
}
