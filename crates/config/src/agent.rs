//! Agent persona configuration
//!
//! Each seat of the conversation gets one [`AgentProfile`]. Profiles are
//! turned into [`AgentIdentity`] values once at startup and never change
//! during a run.

use serde::{Deserialize, Serialize};

use voice_duet_core::{AgentId, AgentIdentity, Voice};

use crate::constants::personas;
use crate::ConfigError;

/// Persona of one conversational agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    /// Display name, also used in the transcript
    pub name: String,

    /// Short role label (e.g. "host", "guest")
    #[serde(default)]
    pub role: String,

    /// Persona instructions sent with `session.update`
    pub instructions: String,

    #[serde(default)]
    pub voice: Voice,
}

impl AgentProfile {
    /// Build the runtime identity for `seat`
    pub fn identity(&self, seat: AgentId) -> AgentIdentity {
        AgentIdentity::new(seat, self.name.trim())
            .with_role(self.role.trim())
            .with_instructions(self.instructions.trim())
            .with_voice(self.voice)
    }

    fn validate(&self, seat: AgentId) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid(
                &format!("agents.{}.name", seat.as_str()),
                "Name cannot be empty",
            ));
        }
        if self.instructions.trim().is_empty() {
            return Err(ConfigError::invalid(
                &format!("agents.{}.instructions", seat.as_str()),
                "Instructions cannot be empty",
            ));
        }
        Ok(())
    }
}

fn default_agent_a() -> AgentProfile {
    AgentProfile {
        name: personas::A_NAME.to_string(),
        role: personas::A_ROLE.to_string(),
        instructions: personas::A_INSTRUCTIONS.to_string(),
        voice: Voice::Alloy,
    }
}

fn default_agent_b() -> AgentProfile {
    AgentProfile {
        name: personas::B_NAME.to_string(),
        role: personas::B_ROLE.to_string(),
        instructions: personas::B_INSTRUCTIONS.to_string(),
        voice: Voice::Echo,
    }
}

/// The two seats of the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentsConfig {
    #[serde(default = "default_agent_a", deserialize_with = "merge_a")]
    pub a: AgentProfile,
    #[serde(default = "default_agent_b", deserialize_with = "merge_b")]
    pub b: AgentProfile,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            a: default_agent_a(),
            b: default_agent_b(),
        }
    }
}

impl AgentsConfig {
    pub fn profile(&self, seat: AgentId) -> &AgentProfile {
        match seat {
            AgentId::A => &self.a,
            AgentId::B => &self.b,
        }
    }

    /// Identities for both seats, indexed by [`AgentId::index`]
    pub fn identities(&self) -> [AgentIdentity; 2] {
        [self.a.identity(AgentId::A), self.b.identity(AgentId::B)]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.a.validate(AgentId::A)?;
        self.b.validate(AgentId::B)?;

        if self.a.name.trim().eq_ignore_ascii_case(self.b.name.trim()) {
            return Err(ConfigError::invalid(
                "agents.b.name",
                format!("Both agents are named '{}'", self.a.name.trim()),
            ));
        }

        Ok(())
    }
}

/// Partial profile used when a config file only overrides some fields
#[derive(Deserialize, Default)]
struct ProfileOverride {
    name: Option<String>,
    role: Option<String>,
    instructions: Option<String>,
    voice: Option<Voice>,
}

impl ProfileOverride {
    fn apply(self, mut base: AgentProfile) -> AgentProfile {
        if let Some(name) = self.name {
            base.name = name;
        }
        if let Some(role) = self.role {
            base.role = role;
        }
        if let Some(instructions) = self.instructions {
            base.instructions = instructions;
        }
        if let Some(voice) = self.voice {
            base.voice = voice;
        }
        base
    }
}

fn merge_a<'de, D>(deserializer: D) -> Result<AgentProfile, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(ProfileOverride::deserialize(deserializer)?.apply(default_agent_a()))
}

fn merge_b<'de, D>(deserializer: D) -> Result<AgentProfile, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(ProfileOverride::deserialize(deserializer)?.apply(default_agent_b()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_personas() {
        let agents = AgentsConfig::default();
        assert!(agents.validate().is_ok());

        let [a, b] = agents.identities();
        assert_eq!(a.id, AgentId::A);
        assert_eq!(a.name, "Alex");
        assert_eq!(a.voice, Voice::Alloy);
        assert_eq!(b.id, AgentId::B);
        assert_eq!(b.label(), "Sam (guest)");
        assert_ne!(a.voice, b.voice);
    }

    #[test]
    fn test_validation_rejects_empty_and_duplicate_names() {
        let mut agents = AgentsConfig::default();
        agents.b.name = "  ".to_string();
        assert!(agents.validate().is_err());

        agents.b.name = "alex".to_string();
        assert!(matches!(
            agents.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "agents.b.name"
        ));

        agents.b.name = "Jordan".to_string();
        agents.a.instructions = String::new();
        assert!(agents.validate().is_err());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let agents: AgentsConfig =
            serde_json::from_str(r#"{"b": {"name": "Jordan", "voice": "shimmer"}}"#).unwrap();

        assert_eq!(agents.a, default_agent_a());
        assert_eq!(agents.b.name, "Jordan");
        assert_eq!(agents.b.voice, Voice::Shimmer);
        assert_eq!(agents.b.instructions, personas::B_INSTRUCTIONS);
    }

    #[test]
    fn test_identity_trims_whitespace() {
        let profile = AgentProfile {
            name: " Riley ".to_string(),
            role: "".to_string(),
            instructions: "Be brief. ".to_string(),
            voice: Voice::Sage,
        };
        let identity = profile.identity(AgentId::B);
        assert_eq!(identity.name, "Riley");
        assert_eq!(identity.instructions, "Be brief.");
        assert_eq!(identity.label(), "Riley");
    }
}
