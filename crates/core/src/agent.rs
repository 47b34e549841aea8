//! Agent seats and identities

use serde::{Deserialize, Serialize};

use crate::Voice;

/// One of the two seats in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    #[default]
    A,
    B,
}

impl AgentId {
    pub const BOTH: [AgentId; 2] = [AgentId::A, AgentId::B];

    /// The seat across the table
    pub fn other(&self) -> AgentId {
        match self {
            AgentId::A => AgentId::B,
            AgentId::B => AgentId::A,
        }
    }

    /// Position of the seat, usable as an array index
    pub fn index(&self) -> usize {
        match self {
            AgentId::A => 0,
            AgentId::B => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::A => "a",
            AgentId::B => "b",
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentId::A => write!(f, "A"),
            AgentId::B => write!(f, "B"),
        }
    }
}

/// Immutable description of one conversational agent
///
/// Built once at startup from configuration and shared behind an `Arc`
/// for the rest of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Seat this agent occupies
    pub id: AgentId,
    /// Display name
    pub name: String,
    /// Role label (e.g. "host", "guest")
    pub role: String,
    /// Persona instructions sent with the session configuration
    pub instructions: String,
    /// Synthesized voice
    pub voice: Voice,
}

impl AgentIdentity {
    pub fn new(id: AgentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: String::new(),
            instructions: String::new(),
            voice: Voice::default(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = voice;
        self
    }

    /// Label used in logs and transcripts, e.g. `Alex (host)`
    pub fn label(&self) -> String {
        if self.role.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.role)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_seat() {
        assert_eq!(AgentId::A.other(), AgentId::B);
        assert_eq!(AgentId::B.other(), AgentId::A);
        assert_eq!(AgentId::A.other().other(), AgentId::A);
    }

    #[test]
    fn test_identity_builder() {
        let identity = AgentIdentity::new(AgentId::B, "Sam")
            .with_role("guest")
            .with_instructions("You are a curious guest.")
            .with_voice(Voice::Echo);

        assert_eq!(identity.id, AgentId::B);
        assert_eq!(identity.voice, Voice::Echo);
        assert_eq!(identity.label(), "Sam (guest)");
        assert_eq!(AgentIdentity::new(AgentId::A, "Alex").label(), "Alex");
    }
}
