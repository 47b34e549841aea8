//! Core types for the dual-agent voice conversation orchestrator
//!
//! This crate provides the foundational types shared by every other crate:
//! - Agent identities and seats (`AgentId::A` / `AgentId::B`)
//! - Voice selectors
//! - Audio formats and relayed audio fragments
//! - Turns and the append-only conversation log
//! - Error types

pub mod agent;
pub mod audio;
pub mod conversation;
pub mod error;
pub mod voice;

pub use agent::{AgentId, AgentIdentity};
pub use audio::{AudioFormat, AudioFragment};
pub use conversation::{ConversationLog, Turn, TurnCompletion};
pub use error::{Error, Result};
pub use voice::Voice;
