//! Presentation surface interface
//!
//! The surface is a best-effort sink: every call returns immediately and a
//! failure is logged and counted by the caller, never retried.

use std::time::Duration;
use thiserror::Error;

use voice_duet_core::{AgentId, AgentIdentity, AudioFragment};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Surface is closed")]
    Closed,

    #[error("Surface unavailable: {0}")]
    Unavailable(String),
}

/// Live display of the conversation
pub trait PresentationSurface: Send + Sync {
    /// Announce both agents before the intro
    fn initialize(&self, agents: &[AgentIdentity; 2]) -> Result<(), SurfaceError>;

    /// Start the countdown/intro; the caller waits out `duration` itself
    fn run_intro_sequence(&self, duration: Duration) -> Result<(), SurfaceError>;

    fn set_active_speaker(&self, agent: AgentId) -> Result<(), SurfaceError>;

    fn push_audio_fragment(&self, fragment: &AudioFragment) -> Result<(), SurfaceError>;

    /// Show the latest text spoken by `agent`
    fn set_message(&self, agent: AgentId, text: &str) -> Result<(), SurfaceError>;

    fn close(&self) -> Result<(), SurfaceError>;
}

/// Log and count a failed surface call
pub(crate) fn report(operation: &'static str, result: Result<(), SurfaceError>) {
    if let Err(e) = result {
        tracing::warn!(operation, error = %e, "Presentation surface call failed");
        crate::metrics::record_surface_failure(operation);
    }
}

/// Surface that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl PresentationSurface for NullSurface {
    fn initialize(&self, _agents: &[AgentIdentity; 2]) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn run_intro_sequence(&self, _duration: Duration) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn set_active_speaker(&self, _agent: AgentId) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn push_audio_fragment(&self, _fragment: &AudioFragment) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn set_message(&self, _agent: AgentId, _text: &str) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn close(&self) -> Result<(), SurfaceError> {
        Ok(())
    }
}
