//! Voice Duet Server
//!
//! Serves a running conversation: WebSocket fan-out of the presentation
//! surface, health, metrics and the conversation log over HTTP.

pub mod http;
pub mod metrics;
pub mod presentation;
pub mod runner;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use metrics::{init_metrics, metrics_handler};
pub use presentation::{AgentCard, BroadcastSurface, SurfaceMessage, SurfaceSnapshot};
pub use runner::run_conversation;
pub use state::AppState;

use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
