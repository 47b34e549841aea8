//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use voice_duet_core::{AgentId, AgentIdentity, AudioFormat};

use crate::constants::{connection, conversation, endpoints, server, session};
use crate::{AgentsConfig, ConfigError};

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// HTTP/WebSocket presentation server
    #[serde(default)]
    pub server: ServerConfig,

    /// Realtime endpoint connection
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Parameters sent to each session with `session.update`
    #[serde(default)]
    pub session: SessionSettings,

    /// Turn bounds and pacing
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// The two personas
    #[serde(default)]
    pub agents: AgentsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_realtime()?;
        self.validate_session()?;
        self.validate_conversation()?;
        self.agents.validate()?;

        if self.environment.is_production() && !self.realtime.simulate && self.realtime.api_key.is_none() {
            return Err(ConfigError::MissingField("realtime.api_key".to_string()));
        }

        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::invalid("server.host", "Host cannot be empty"));
        }
        Ok(())
    }

    fn validate_realtime(&self) -> Result<(), ConfigError> {
        let realtime = &self.realtime;
        if !(realtime.url.starts_with("ws://") || realtime.url.starts_with("wss://")) {
            return Err(ConfigError::invalid(
                "realtime.url",
                format!("Expected a ws:// or wss:// URL, got '{}'", realtime.url),
            ));
        }
        if realtime.model.trim().is_empty() {
            return Err(ConfigError::invalid("realtime.model", "Model cannot be empty"));
        }
        if realtime.connect_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "realtime.connect_timeout_ms",
                "Connect timeout must be greater than 0",
            ));
        }
        Ok(())
    }

    fn validate_session(&self) -> Result<(), ConfigError> {
        let s = &self.session;

        if !(session::TEMPERATURE_MIN..=session::TEMPERATURE_MAX).contains(&s.temperature) {
            return Err(ConfigError::invalid(
                "session.temperature",
                format!(
                    "Must be between {} and {}, got {}",
                    session::TEMPERATURE_MIN,
                    session::TEMPERATURE_MAX,
                    s.temperature
                ),
            ));
        }

        if !(0.0..=1.0).contains(&s.turn_detection.threshold) {
            return Err(ConfigError::invalid(
                "session.turn_detection.threshold",
                format!("Must be between 0.0 and 1.0, got {}", s.turn_detection.threshold),
            ));
        }

        if s.max_response_output_tokens == 0 {
            return Err(ConfigError::invalid(
                "session.max_response_output_tokens",
                "Must be greater than 0",
            ));
        }

        if s.opener_instructions.trim().is_empty() {
            return Err(ConfigError::invalid(
                "session.opener_instructions",
                "Opener instructions cannot be empty",
            ));
        }
        if s.continuation_instructions.trim().is_empty() {
            return Err(ConfigError::invalid(
                "session.continuation_instructions",
                "Continuation instructions cannot be empty",
            ));
        }

        Ok(())
    }

    fn validate_conversation(&self) -> Result<(), ConfigError> {
        let c = &self.conversation;

        if c.max_turns == 0 {
            return Err(ConfigError::invalid(
                "conversation.max_turns",
                "At least one turn is required",
            ));
        }
        if c.ready_poll_attempts == 0 {
            return Err(ConfigError::invalid(
                "conversation.ready_poll_attempts",
                "Must be greater than 0",
            ));
        }
        if c.ready_poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "conversation.ready_poll_interval_ms",
                "Must be greater than 0",
            ));
        }
        if c.run_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "conversation.run_timeout_secs",
                "Must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Serve the presentation surface over HTTP/WebSocket
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Allowed origins; empty means any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Keep serving this long after the conversation ends; 0 exits at once
    #[serde(default = "default_linger_secs")]
    pub linger_secs: u64,
}

impl ServerConfig {
    pub fn linger(&self) -> Duration {
        Duration::from_secs(self.linger_secs)
    }
}

fn default_linger_secs() -> u64 {
    server::LINGER_SECS
}

fn default_host() -> String {
    server::HOST.to_string()
}

fn default_port() -> u16 {
    server::PORT
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enabled: true,
            cors_enabled: true,
            cors_origins: Vec::new(),
            linger_secs: default_linger_secs(),
        }
    }
}

/// Realtime endpoint connection
#[derive(Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_realtime_url")]
    pub url: String,
    #[serde(default = "default_realtime_model")]
    pub model: String,
    /// Bearer credential; falls back to `OPENAI_API_KEY`
    #[serde(default = "default_api_key", skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_close_timeout")]
    pub close_timeout_ms: u64,
    /// Use the in-process simulated endpoint instead of the network
    #[serde(default)]
    pub simulate: bool,
}

fn default_realtime_url() -> String {
    endpoints::REALTIME_URL.to_string()
}

fn default_realtime_model() -> String {
    endpoints::REALTIME_MODEL.to_string()
}

fn default_api_key() -> Option<String> {
    std::env::var(endpoints::API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

fn default_connect_timeout() -> u64 {
    connection::CONNECT_TIMEOUT_MS
}

fn default_close_timeout() -> u64 {
    connection::CLOSE_TIMEOUT_MS
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: default_realtime_url(),
            model: default_realtime_model(),
            api_key: default_api_key(),
            connect_timeout_ms: default_connect_timeout(),
            close_timeout_ms: default_close_timeout(),
            simulate: false,
        }
    }
}

impl std::fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("close_timeout_ms", &self.close_timeout_ms)
            .field("simulate", &self.simulate)
            .finish()
    }
}

impl RealtimeConfig {
    /// Endpoint URL with the model query parameter
    pub fn endpoint(&self) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}model={}", self.url, separator, self.model)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

/// How the endpoint detects end of speech
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnDetectionMode {
    #[default]
    ServerVad,
    /// Turn detection disabled; turns are driven by `response.create` only
    #[serde(rename = "none")]
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnDetectionSettings {
    #[serde(default)]
    pub mode: TurnDetectionMode,
    #[serde(default = "default_vad_threshold")]
    pub threshold: f32,
    #[serde(default = "default_prefix_padding")]
    pub prefix_padding_ms: u32,
    #[serde(default = "default_silence_duration")]
    pub silence_duration_ms: u32,
}

fn default_vad_threshold() -> f32 {
    session::VAD_THRESHOLD
}

fn default_prefix_padding() -> u32 {
    session::PREFIX_PADDING_MS
}

fn default_silence_duration() -> u32 {
    session::SILENCE_DURATION_MS
}

impl Default for TurnDetectionSettings {
    fn default() -> Self {
        Self {
            mode: TurnDetectionMode::default(),
            threshold: default_vad_threshold(),
            prefix_padding_ms: default_prefix_padding(),
            silence_duration_ms: default_silence_duration(),
        }
    }
}

/// Per-session parameters shared by both agents
///
/// The instruction templates accept `{name}` (speaker) and `{partner}`
/// placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub input_audio_format: AudioFormat,
    #[serde(default)]
    pub output_audio_format: AudioFormat,
    /// Input transcription model; `None` disables input transcription
    #[serde(default = "default_transcription_model")]
    pub transcription_model: Option<String>,
    #[serde(default)]
    pub turn_detection: TurnDetectionSettings,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_response_output_tokens: u32,
    #[serde(default = "default_opener_instructions")]
    pub opener_instructions: String,
    #[serde(default = "default_continuation_instructions")]
    pub continuation_instructions: String,
}

fn default_transcription_model() -> Option<String> {
    Some(session::TRANSCRIPTION_MODEL.to_string())
}

fn default_temperature() -> f32 {
    session::TEMPERATURE
}

fn default_max_output_tokens() -> u32 {
    session::MAX_RESPONSE_OUTPUT_TOKENS
}

fn default_opener_instructions() -> String {
    session::OPENER_INSTRUCTIONS.to_string()
}

fn default_continuation_instructions() -> String {
    session::CONTINUATION_INSTRUCTIONS.to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            input_audio_format: AudioFormat::default(),
            output_audio_format: AudioFormat::default(),
            transcription_model: default_transcription_model(),
            turn_detection: TurnDetectionSettings::default(),
            temperature: default_temperature(),
            max_response_output_tokens: default_max_output_tokens(),
            opener_instructions: default_opener_instructions(),
            continuation_instructions: default_continuation_instructions(),
        }
    }
}

impl SessionSettings {
    /// Instructions for the first turn of the conversation
    pub fn opener_for(&self, speaker: &AgentIdentity, partner: &AgentIdentity) -> String {
        render(&self.opener_instructions, speaker, partner)
    }

    /// Instructions for every turn after the first
    pub fn continuation_for(&self, speaker: &AgentIdentity, partner: &AgentIdentity) -> String {
        render(&self.continuation_instructions, speaker, partner)
    }
}

fn render(template: &str, speaker: &AgentIdentity, partner: &AgentIdentity) -> String {
    template
        .replace("{name}", &speaker.name)
        .replace("{partner}", &partner.name)
}

/// Conversation bounds and pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    #[serde(default = "default_inter_turn_delay")]
    pub inter_turn_delay_ms: u64,
    #[serde(default = "default_ready_poll_attempts")]
    pub ready_poll_attempts: u32,
    #[serde(default = "default_ready_poll_interval")]
    pub ready_poll_interval_ms: u64,
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
    #[serde(default = "default_intro_duration")]
    pub intro_duration_ms: u64,
    /// Seat that speaks first
    #[serde(default)]
    pub opener: AgentId,
}

fn default_max_turns() -> u32 {
    conversation::MAX_TURNS
}

fn default_inter_turn_delay() -> u64 {
    conversation::INTER_TURN_DELAY_MS
}

fn default_ready_poll_attempts() -> u32 {
    conversation::READY_POLL_ATTEMPTS
}

fn default_ready_poll_interval() -> u64 {
    conversation::READY_POLL_INTERVAL_MS
}

fn default_run_timeout() -> u64 {
    conversation::RUN_TIMEOUT_SECS
}

fn default_intro_duration() -> u64 {
    conversation::INTRO_DURATION_MS
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            inter_turn_delay_ms: default_inter_turn_delay(),
            ready_poll_attempts: default_ready_poll_attempts(),
            ready_poll_interval_ms: default_ready_poll_interval(),
            run_timeout_secs: default_run_timeout(),
            intro_duration_ms: default_intro_duration(),
            opener: AgentId::default(),
        }
    }
}

impl ConversationConfig {
    pub fn inter_turn_delay(&self) -> Duration {
        Duration::from_millis(self.inter_turn_delay_ms)
    }

    /// Upper bound on waiting for both sessions to become ready
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms * u64::from(self.ready_poll_attempts))
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn intro_duration(&self) -> Duration {
        Duration::from_millis(self.intro_duration_ms)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from `config/` and the environment
///
/// Sources, later ones winning:
/// 1. `config/default.{yaml,toml,json}`
/// 2. `config/{env}.{yaml,toml,json}`
/// 3. `VOICE_DUET__SECTION__FIELD` environment variables
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from an explicit configuration directory
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder
        .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false));

    if let Some(env_name) = env {
        builder = builder
            .add_source(File::with_name(&dir.join(env_name).to_string_lossy()).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VOICE_DUET")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.linger(), Duration::from_secs(60));
        assert_eq!(settings.conversation.max_turns, 6);
        assert_eq!(settings.conversation.opener, AgentId::A);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_ready_timeout_is_attempts_times_interval() {
        let conversation = ConversationConfig {
            ready_poll_attempts: 10,
            ready_poll_interval_ms: 50,
            ..Default::default()
        };
        assert_eq!(conversation.ready_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_conversation_validation() {
        let mut settings = Settings::default();
        settings.conversation.max_turns = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "conversation.max_turns"
        ));

        settings.conversation.max_turns = 4;
        settings.conversation.ready_poll_attempts = 0;
        assert!(settings.validate().is_err());

        settings.conversation.ready_poll_attempts = 5;
        settings.conversation.run_timeout_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_session_validation() {
        let mut settings = Settings::default();

        settings.session.temperature = 0.3;
        assert!(settings.validate().is_err());
        settings.session.temperature = 1.5;
        assert!(settings.validate().is_err());
        settings.session.temperature = 0.9;

        settings.session.turn_detection.threshold = 1.2;
        assert!(settings.validate().is_err());
        settings.session.turn_detection.threshold = 0.4;

        settings.session.opener_instructions = "   ".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_realtime_validation_and_endpoint() {
        let mut settings = Settings::default();
        settings.realtime.url = "https://api.example.com".to_string();
        assert!(settings.validate().is_err());

        let realtime = RealtimeConfig {
            url: "wss://realtime.example.com/v1".to_string(),
            model: "voice-1".to_string(),
            ..Default::default()
        };
        assert_eq!(realtime.endpoint(), "wss://realtime.example.com/v1?model=voice-1");
    }

    #[test]
    fn test_api_key_is_redacted_in_debug() {
        let realtime = RealtimeConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", realtime);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_production_requires_api_key() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        settings.realtime.api_key = None;
        assert!(matches!(settings.validate(), Err(ConfigError::MissingField(_))));

        settings.realtime.simulate = true;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_instruction_templates() {
        let settings = SessionSettings {
            opener_instructions: "{name}, open the show and greet {partner}.".to_string(),
            ..Default::default()
        };
        let alex = AgentIdentity::new(AgentId::A, "Alex");
        let sam = AgentIdentity::new(AgentId::B, "Sam");
        assert_eq!(settings.opener_for(&alex, &sam), "Alex, open the show and greet Sam.");
        assert_eq!(
            settings.continuation_for(&sam, &alex),
            session::CONTINUATION_INSTRUCTIONS
        );
    }

    #[test]
    fn test_load_settings_from_layers_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.yaml"),
            r#"
conversation:
  max_turns: 4
  opener: b
session:
  output_audio_format: g711_ulaw
realtime:
  simulate: true
agents:
  a:
    name: Riley
    voice: coral
"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("staging.yaml"),
            "conversation:\n  max_turns: 8\n",
        )
        .unwrap();

        let settings = load_settings_from(dir.path(), Some("staging")).unwrap();
        assert_eq!(settings.conversation.max_turns, 8);
        assert_eq!(settings.conversation.opener, AgentId::B);
        assert_eq!(settings.session.output_audio_format, AudioFormat::G711Ulaw);
        assert!(settings.realtime.simulate);
        assert_eq!(settings.agents.a.name, "Riley");
        // untouched fields keep their defaults
        assert_eq!(settings.agents.b.name, "Sam");
        assert_eq!(settings.conversation.inter_turn_delay_ms, conversation::INTER_TURN_DELAY_MS);
    }

    #[test]
    fn test_load_settings_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("default.yaml"), "conversation:\n  max_turns: 0\n").unwrap();

        assert!(matches!(
            load_settings_from(dir.path(), None),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
