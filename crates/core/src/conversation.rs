//! Conversation types: turns and the append-only conversation log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AgentId, AgentIdentity, Error, Result};

/// How a turn was sealed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnCompletion {
    /// The session delivered its final transcript
    Final,
    /// The turn ended (error or completion without final text) with only
    /// the deltas received so far
    Partial,
}

/// One complete spoken response by one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Turn index, monotonic from 0
    pub index: u32,
    /// Seat of the speaking agent
    pub speaker: AgentId,
    /// Display name of the speaking agent
    pub speaker_name: String,
    /// Accumulated transcript text
    pub text: String,
    /// When the turn was requested
    pub started_at: DateTime<Utc>,
    /// When the turn was sealed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sealed_at: Option<DateTime<Utc>>,
    /// Set once the turn is sealed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<TurnCompletion>,
    /// Number of audio fragments received for this turn
    #[serde(default)]
    pub audio_fragments: u32,
    /// Total audio bytes received for this turn
    #[serde(default)]
    pub audio_bytes: u64,
}

impl Turn {
    /// Open a new, unsealed turn for `speaker`
    pub fn open(index: u32, speaker: &AgentIdentity) -> Self {
        Self {
            index,
            speaker: speaker.id,
            speaker_name: speaker.name.clone(),
            text: String::new(),
            started_at: Utc::now(),
            sealed_at: None,
            completion: None,
            audio_fragments: 0,
            audio_bytes: 0,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.completion.is_some()
    }

    /// Append a transcript delta. Returns `false` if the turn is already sealed.
    pub fn append_text(&mut self, delta: &str) -> bool {
        if self.is_sealed() {
            return false;
        }
        self.text.push_str(delta);
        true
    }

    /// Count an audio fragment against this turn
    pub fn record_audio(&mut self, bytes: usize) {
        if self.is_sealed() {
            return;
        }
        self.audio_fragments += 1;
        self.audio_bytes += bytes as u64;
    }

    /// Seal the turn.
    ///
    /// With `Some(final_text)` the text is replaced by the final transcript and
    /// the turn is marked [`TurnCompletion::Final`]; with `None` the deltas
    /// received so far are kept and the turn is [`TurnCompletion::Partial`].
    /// Returns `false` if the turn was already sealed.
    pub fn seal(&mut self, final_text: Option<String>) -> bool {
        if self.is_sealed() {
            return false;
        }
        self.completion = Some(match final_text {
            Some(text) => {
                self.text = text;
                TurnCompletion::Final
            },
            None => TurnCompletion::Partial,
        });
        self.sealed_at = Some(Utc::now());
        true
    }

    pub fn is_partial(&self) -> bool {
        self.completion == Some(TurnCompletion::Partial)
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Wall time between request and seal, if sealed
    pub fn duration_ms(&self) -> Option<i64> {
        self.sealed_at
            .map(|sealed| (sealed - self.started_at).num_milliseconds())
    }
}

/// Ordered, append-only sequence of sealed turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sealed turn.
    ///
    /// Rejects unsealed turns and turns whose index does not follow the last
    /// logged one.
    pub fn append(&mut self, turn: Turn) -> Result<()> {
        if !turn.is_sealed() {
            return Err(Error::UnsealedTurn { index: turn.index });
        }
        if let Some(last) = self.turns.last() {
            if turn.index <= last.index {
                return Err(Error::OutOfOrder {
                    index: turn.index,
                    last: last.index,
                });
            }
        }
        self.turns.push(turn);
        Ok(())
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn get(&self, index: u32) -> Option<&Turn> {
        self.turns.iter().find(|t| t.index == index)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.get(index).is_some()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Speaking seats in log order
    pub fn speakers(&self) -> Vec<AgentId> {
        self.turns.iter().map(|t| t.speaker).collect()
    }

    /// Plain-text transcript, one line per turn
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|t| {
                let marker = if t.is_partial() { " [partial]" } else { "" };
                format!("{}: {}{}", t.speaker_name, t.text.trim(), marker)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alex() -> AgentIdentity {
        AgentIdentity::new(AgentId::A, "Alex").with_role("host")
    }

    fn sam() -> AgentIdentity {
        AgentIdentity::new(AgentId::B, "Sam").with_role("guest")
    }

    #[test]
    fn test_turn_seal_final_replaces_text() {
        let mut turn = Turn::open(0, &alex());
        assert!(turn.append_text("Welcome "));
        assert!(turn.append_text("back"));
        assert_eq!(turn.text, "Welcome back");

        assert!(turn.seal(Some("Welcome back, everyone.".to_string())));
        assert_eq!(turn.text, "Welcome back, everyone.");
        assert_eq!(turn.completion, Some(TurnCompletion::Final));
        assert!(turn.sealed_at.is_some());

        // sealed turns are immutable
        assert!(!turn.append_text(" more"));
        assert!(!turn.seal(Some("other".to_string())));
        assert_eq!(turn.text, "Welcome back, everyone.");
    }

    #[test]
    fn test_turn_seal_partial_keeps_deltas() {
        let mut turn = Turn::open(3, &sam());
        turn.append_text("I think the");
        turn.record_audio(960);
        turn.record_audio(480);
        assert!(turn.seal(None));

        assert!(turn.is_partial());
        assert_eq!(turn.text, "I think the");
        assert_eq!(turn.audio_fragments, 2);
        assert_eq!(turn.audio_bytes, 1440);
    }

    #[test]
    fn test_log_rejects_unsealed_and_out_of_order() {
        let mut log = ConversationLog::new();

        let unsealed = Turn::open(0, &alex());
        assert_eq!(log.append(unsealed), Err(Error::UnsealedTurn { index: 0 }));

        let mut first = Turn::open(0, &alex());
        first.seal(Some("Hi".into()));
        log.append(first.clone()).unwrap();

        assert_eq!(log.append(first), Err(Error::OutOfOrder { index: 0, last: 0 }));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_log_transcript_and_speakers() {
        let mut log = ConversationLog::new();
        for (index, who) in [(0, alex()), (1, sam())] {
            let mut turn = Turn::open(index, &who);
            turn.append_text("Hello");
            turn.seal(if index == 0 { Some("Hello there".into()) } else { None });
            log.append(turn).unwrap();
        }

        assert_eq!(log.speakers(), vec![AgentId::A, AgentId::B]);
        assert_eq!(log.transcript(), "Alex: Hello there\nSam: Hello [partial]");
        assert!(log.contains(1));
        assert!(!log.contains(2));
    }

    #[test]
    fn test_log_serializes() {
        let mut log = ConversationLog::new();
        let mut turn = Turn::open(0, &alex());
        turn.seal(Some("Hi".into()));
        log.append(turn).unwrap();

        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["turns"][0]["speaker"], "a");
        assert_eq!(json["turns"][0]["completion"], "final");
    }
}
