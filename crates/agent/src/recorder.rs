//! Transcript recorder
//!
//! Owns the [`ConversationLog`]. At most one turn is open at a time; it is
//! sealed from the final transcript, or sealed as partial when the turn ends
//! without one.

use std::sync::Arc;

use voice_duet_core::{AgentId, AgentIdentity, ConversationLog, Turn};

use crate::presentation::{report, PresentationSurface};

pub struct TranscriptRecorder {
    surface: Arc<dyn PresentationSurface>,
    log: ConversationLog,
    open: Option<Turn>,
}

impl TranscriptRecorder {
    pub fn new(surface: Arc<dyn PresentationSurface>) -> Self {
        Self {
            surface,
            log: ConversationLog::new(),
            open: None,
        }
    }

    /// Open turn `index` for `speaker`
    pub fn begin_turn(&mut self, index: u32, speaker: &AgentIdentity) {
        if let Some(stale) = self.open.take() {
            tracing::warn!(turn = stale.index, agent = %stale.speaker, "Discarding unsealed turn");
        }
        self.open = Some(Turn::open(index, speaker));
    }

    fn open_for(&mut self, agent: AgentId) -> Option<&mut Turn> {
        self.open.as_mut().filter(|turn| turn.speaker == agent)
    }

    pub fn on_delta(&mut self, agent: AgentId, delta: &str) {
        match self.open_for(agent) {
            Some(turn) => {
                turn.append_text(delta);
            },
            None => tracing::trace!(agent = %agent, "Transcript delta outside an open turn"),
        }
    }

    /// Count relayed audio against the open turn
    pub fn on_audio(&mut self, agent: AgentId, bytes: usize) {
        if let Some(turn) = self.open_for(agent) {
            turn.record_audio(bytes);
        }
    }

    /// Seal the open turn with its final transcript
    ///
    /// Returns `false` (and changes nothing) when `agent` has no open turn,
    /// e.g. a repeated `transcript-done` for a sealed turn.
    pub fn on_transcript_done(&mut self, agent: AgentId, transcript: &str) -> bool {
        if self.open_for(agent).is_none() {
            tracing::debug!(agent = %agent, "Ignoring transcript-done without an open turn");
            return false;
        }
        match self.open.take() {
            Some(mut turn) => {
                turn.seal(Some(transcript.to_string()));
                self.commit(turn);
                true
            },
            None => false,
        }
    }

    /// The turn ended (turn-done or error). Seals it as partial if no final
    /// transcript arrived.
    pub fn on_turn_end(&mut self, agent: AgentId) {
        if self.open_for(agent).is_none() {
            return;
        }
        if let Some(mut turn) = self.open.take() {
            turn.seal(None);
            tracing::debug!(turn = turn.index, agent = %agent, "Sealing partial turn");
            self.commit(turn);
        }
    }

    fn commit(&mut self, turn: Turn) {
        let agent = turn.speaker;
        let text = turn.text.trim().to_string();
        let index = turn.index;

        if let Some(duration_ms) = turn.duration_ms() {
            crate::metrics::record_turn_completed(agent, turn.is_partial(), duration_ms as f64 / 1000.0);
        }

        match self.log.append(turn) {
            Ok(()) => {
                tracing::info!(turn = index, agent = %agent, text = %text, "Turn recorded");
                if !text.is_empty() {
                    report("set_message", self.surface.set_message(agent, &text));
                }
            },
            Err(e) => tracing::warn!(turn = index, error = %e, "Turn rejected by conversation log"),
        }
    }

    /// Drop the open turn without sealing it. Returns the discarded turn.
    pub fn discard_open(&mut self) -> Option<Turn> {
        let discarded = self.open.take();
        if let Some(turn) = &discarded {
            tracing::debug!(turn = turn.index, agent = %turn.speaker, "Discarded in-flight turn");
        }
        discarded
    }

    pub fn has_open_turn(&self) -> bool {
        self.open.is_some()
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn into_log(self) -> ConversationLog {
        self.log
    }
}
