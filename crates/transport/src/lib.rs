//! Transport layer for realtime voice sessions
//!
//! Provides:
//! - The JSON wire protocol spoken with the realtime endpoint
//! - [`RealtimeConnection`], a duplex event channel backed by I/O tasks
//! - [`WebSocketConnector`] for the real endpoint
//! - [`SimulatedConnector`], an in-process endpoint with fault injection

pub mod connection;
pub mod error;
pub mod protocol;
pub mod simulated;
pub mod websocket;

pub use connection::{Connector, RealtimeConnection, TransportEvent};
pub use error::TransportError;
pub use protocol::{ClientEvent, ErrorDetail, ResponseParams, ServerEvent, SessionParams};
pub use simulated::{SimulatedBehavior, SimulatedConnector, SimulatedStats};
pub use websocket::WebSocketConnector;
