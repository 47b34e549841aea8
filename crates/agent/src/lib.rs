//! Dual-agent conversation orchestration
//!
//! Features:
//! - [`Session`]: one realtime connection per agent with a typed event stream
//! - [`TurnCoordinator`]: strict alternation and turn limit
//! - [`AudioRelay`]: ordered, non-blocking audio forwarding
//! - [`TranscriptRecorder`]: per-turn transcript and the conversation log
//! - [`LifecycleController`]: startup, supervision and teardown of a run

pub mod coordinator;
pub mod events;
pub mod lifecycle;
pub mod metrics;
pub mod presentation;
pub mod recorder;
pub mod relay;
pub mod session;

pub use coordinator::{ConversationState, TurnCoordinator, TurnDirective, TurnKind, TurnOutcome};
pub use events::{SessionEvent, SessionEventKind};
pub use lifecycle::{EndReason, LifecycleController, LifecyclePhase, RunConfig, RunReport};
pub use presentation::{NullSurface, PresentationSurface, SurfaceError};
pub use recorder::TranscriptRecorder;
pub use relay::{AudioChunkBuffer, AudioRelay, TurnAudio};
pub use session::{Session, SessionState};

use std::time::Duration;
use thiserror::Error;

use voice_duet_core::AgentId;
use voice_duet_transport::TransportError;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to connect agent {agent}: {source}")]
    Connection {
        agent: AgentId,
        #[source]
        source: TransportError,
    },

    #[error("Agent {agent} not ready after {waited:?}")]
    ReadinessTimeout { agent: AgentId, waited: Duration },

    #[error("Turn discipline violated: {0}")]
    TurnDiscipline(String),

    #[error("Session for agent {0} is closed")]
    SessionClosed(AgentId),

    #[error("Event stream for agent {0} already taken")]
    EventStreamTaken(AgentId),

    #[error("Controller has already run")]
    AlreadyRun,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
