//! Conversation metrics
//!
//! Recorded through the `metrics` facade; the binary installs the
//! Prometheus exporter. Without an installed recorder every call is a no-op.

use voice_duet_core::AgentId;

pub const TURNS_COMPLETED: &str = "voice_duet_turns_completed_total";
pub const TURN_ERRORS: &str = "voice_duet_turn_errors_total";
pub const TURN_DURATION: &str = "voice_duet_turn_duration_seconds";
pub const AUDIO_FRAGMENTS: &str = "voice_duet_audio_fragments_relayed_total";
pub const AUDIO_BYTES: &str = "voice_duet_audio_bytes_relayed_total";
pub const SURFACE_FAILURES: &str = "voice_duet_surface_push_failures_total";
pub const MALFORMED_MESSAGES: &str = "voice_duet_malformed_messages_total";
pub const RUNS: &str = "voice_duet_runs_total";

pub fn record_turn_completed(agent: AgentId, partial: bool, duration_secs: f64) {
    let completion = if partial { "partial" } else { "final" };
    ::metrics::counter!(TURNS_COMPLETED, "agent" => agent.as_str(), "completion" => completion)
        .increment(1);
    ::metrics::histogram!(TURN_DURATION, "agent" => agent.as_str()).record(duration_secs);
}

pub fn record_turn_error(agent: AgentId) {
    ::metrics::counter!(TURN_ERRORS, "agent" => agent.as_str()).increment(1);
}

pub fn record_audio_relayed(agent: AgentId, bytes: usize) {
    ::metrics::counter!(AUDIO_FRAGMENTS, "agent" => agent.as_str()).increment(1);
    ::metrics::counter!(AUDIO_BYTES, "agent" => agent.as_str()).increment(bytes as u64);
}

pub fn record_surface_failure(operation: &'static str) {
    ::metrics::counter!(SURFACE_FAILURES, "operation" => operation).increment(1);
}

pub fn record_malformed(agent: AgentId) {
    ::metrics::counter!(MALFORMED_MESSAGES, "agent" => agent.as_str()).increment(1);
}

pub fn record_run(end_reason: &'static str) {
    ::metrics::counter!(RUNS, "end_reason" => end_reason).increment(1);
}
