//! Turn-taking state machine
//!
//! [`TurnCoordinator`] owns the [`ConversationState`] and is its only
//! writer. It performs no I/O: it turns completion signals into
//! [`TurnDirective`]s that the lifecycle loop carries out.

use serde::Serialize;
use std::time::Duration;

use voice_duet_core::AgentId;

/// Conversation progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConversationState {
    /// Index of the latest requested turn
    pub current_turn: u32,
    /// Agent whose turn is in flight, if any
    pub current_speaker: Option<AgentId>,
    /// Completed turns, errored ones included
    pub turns_taken: u32,
    pub running: bool,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            current_turn: 0,
            current_speaker: None,
            turns_taken: 0,
            running: false,
        }
    }
}

/// Which instruction template a turn uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    Opener,
    Continuation,
}

/// How the speaking agent's turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    /// An endpoint error, treated as an implicit completion
    Errored(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnDirective {
    /// Ask `speaker` for turn `turn` once `delay` has elapsed
    Request {
        speaker: AgentId,
        turn: u32,
        kind: TurnKind,
        delay: Duration,
    },
    /// The turn limit was reached
    Finished,
    /// A session dropped; the conversation cannot continue
    Abort { agent: AgentId },
}

/// Strict alternation with a turn limit
#[derive(Debug)]
pub struct TurnCoordinator {
    state: ConversationState,
    opener: AgentId,
    max_turns: u32,
    inter_turn_delay: Duration,
}

impl TurnCoordinator {
    pub fn new(opener: AgentId, max_turns: u32, inter_turn_delay: Duration) -> Self {
        Self {
            state: ConversationState::default(),
            opener,
            max_turns,
            inter_turn_delay,
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn opener(&self) -> AgentId {
        self.opener
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Start the conversation with the opener's first turn
    pub fn start(&mut self) -> TurnDirective {
        self.state = ConversationState {
            running: true,
            ..ConversationState::default()
        };
        if self.max_turns == 0 {
            self.state.running = false;
            return TurnDirective::Finished;
        }
        TurnDirective::Request {
            speaker: self.opener,
            turn: 0,
            kind: TurnKind::Opener,
            delay: Duration::ZERO,
        }
    }

    /// Record that turn `turn` was actually requested from `speaker`
    pub fn turn_requested(&mut self, speaker: AgentId, turn: u32) {
        self.state.current_speaker = Some(speaker);
        self.state.current_turn = turn;
    }

    /// Whether `agent` has a turn in flight
    pub fn is_speaking(&self, agent: AgentId) -> bool {
        self.state.running && self.state.current_speaker == Some(agent)
    }

    /// Handle a completion signal from `agent`
    ///
    /// Completions from an agent without a turn in flight are ignored and
    /// return `None`.
    pub fn on_turn_complete(&mut self, agent: AgentId, outcome: TurnOutcome) -> Option<TurnDirective> {
        if !self.is_speaking(agent) {
            tracing::debug!(
                agent = %agent,
                outcome = ?outcome,
                current = ?self.state.current_speaker,
                "Ignoring unexpected turn completion"
            );
            return None;
        }

        if let TurnOutcome::Errored(message) = &outcome {
            tracing::warn!(
                agent = %agent,
                turn = self.state.current_turn,
                error = %message,
                "Turn ended with an error, treating as complete"
            );
        }

        self.state.turns_taken += 1;
        self.state.current_speaker = None;

        if self.state.turns_taken >= self.max_turns {
            self.state.running = false;
            tracing::info!(turns = self.state.turns_taken, "Turn limit reached");
            return Some(TurnDirective::Finished);
        }

        Some(TurnDirective::Request {
            speaker: agent.other(),
            turn: self.state.current_turn + 1,
            kind: TurnKind::Continuation,
            delay: self.inter_turn_delay,
        })
    }

    /// A session dropped
    pub fn on_disconnect(&mut self, agent: AgentId) -> TurnDirective {
        self.state.running = false;
        self.state.current_speaker = None;
        TurnDirective::Abort { agent }
    }

    /// Stop without a further turn (timeout, cancellation, fatal error)
    pub fn stop(&mut self) {
        self.state.running = false;
    }
}
