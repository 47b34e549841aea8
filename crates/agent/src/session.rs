//! Realtime session for one agent
//!
//! State machine:
//! `Connecting -> Connected -> Ready -> Speaking <-> Ready -> Closed`
//!
//! `Connected` and `Ready` are reached at most once. An endpoint `error`
//! never closes the session; only [`Session::close`] or a transport drop
//! does.
//!
//! Events are tied to the response that produced them. Once a response has
//! ended (done or errored), anything still arriving for it is dropped.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use voice_duet_core::{AgentId, AgentIdentity};
use voice_duet_transport::{
    ClientEvent, Connector, RealtimeConnection, ServerEvent, SessionParams, TransportEvent,
};

use crate::events::{SessionEvent, SessionEventKind};
use crate::{AgentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Ready,
    Speaking,
    Closed,
}

/// One agent's connection to the realtime endpoint
pub struct Session {
    identity: Arc<AgentIdentity>,
    connection: RealtimeConnection,
    state: Arc<watch::Sender<SessionState>>,
    closed: Arc<AtomicBool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Open the connection and send the session configuration
    ///
    /// Resolves once the transport is open; readiness is signaled later by
    /// the endpoint (see [`Session::wait_ready`]).
    pub async fn connect(
        identity: Arc<AgentIdentity>,
        params: SessionParams,
        connector: &dyn Connector,
    ) -> Result<Self> {
        let agent = identity.id;
        let (state, _) = watch::channel(SessionState::Connecting);

        tracing::debug!(agent = %agent, connector = connector.name(), "Connecting session");

        let connection = connector
            .connect(&identity)
            .await
            .map_err(|source| AgentError::Connection { agent, source })?;
        state.send_replace(SessionState::Connected);

        connection
            .send(ClientEvent::SessionUpdate { session: params })
            .map_err(|source| AgentError::Connection { agent, source })?;

        tracing::info!(agent = %agent, name = %identity.name, "Session connected");

        Ok(Self {
            identity,
            connection,
            state: Arc::new(state),
            closed: Arc::new(AtomicBool::new(false)),
            dispatcher: Mutex::new(None),
        })
    }

    /// Route inbound events to `tx`
    ///
    /// Malformed frames are logged and skipped. Events keep protocol order.
    /// Can be called once per session.
    pub fn on_event(&self, tx: mpsc::UnboundedSender<SessionEvent>) -> Result<()> {
        let agent = self.agent();
        let mut events = self
            .connection
            .take_events()
            .ok_or(AgentError::EventStreamTaken(agent))?;
        let state = self.state.clone();
        let closed = self.closed.clone();

        let handle = tokio::spawn(async move {
            let mut responses = ResponseTracker::default();
            while let Some(event) = events.recv().await {
                let kind = match event {
                    TransportEvent::Message(message) => match translate(agent, message, &state, &mut responses) {
                        Some(kind) => kind,
                        None => continue,
                    },
                    TransportEvent::Malformed { raw, error } => {
                        tracing::warn!(agent = %agent, error = %error, raw = %raw, "Skipping malformed message");
                        crate::metrics::record_malformed(agent);
                        continue;
                    },
                    TransportEvent::Closed { reason } => {
                        state.send_replace(SessionState::Closed);
                        if closed.load(Ordering::SeqCst) {
                            break;
                        }
                        tracing::warn!(agent = %agent, reason = ?reason, "Session connection dropped");
                        let _ = tx.send(SessionEvent::new(agent, SessionEventKind::Disconnected(reason)));
                        break;
                    },
                };

                if tx.send(SessionEvent::new(agent, kind)).is_err() {
                    break;
                }
            }
        });

        *self.dispatcher.lock() = Some(handle);
        Ok(())
    }

    /// Wait until the endpoint has applied the session configuration
    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let agent = self.agent();
        let mut rx = self.state.subscribe();

        let waited = tokio::time::timeout(
            timeout,
            rx.wait_for(|s| {
                matches!(s, SessionState::Ready | SessionState::Speaking | SessionState::Closed)
            }),
        )
        .await;

        let reached = match waited {
            Err(_) => return Err(AgentError::ReadinessTimeout { agent, waited: timeout }),
            Ok(Err(_)) => return Err(AgentError::SessionClosed(agent)),
            Ok(Ok(state)) => *state,
        };

        match reached {
            SessionState::Closed => Err(AgentError::SessionClosed(agent)),
            _ => {
                tracing::debug!(agent = %agent, "Session ready");
                Ok(())
            },
        }
    }

    /// Ask the agent to speak
    ///
    /// Requires the session to be ready and not already speaking. Does not
    /// wait for the response.
    pub fn request_turn(&self, instructions: &str) -> Result<()> {
        let agent = self.agent();
        let mut observed = SessionState::Ready;
        let acquired = self.state.send_if_modified(|state| {
            observed = *state;
            if *state == SessionState::Ready {
                *state = SessionState::Speaking;
                true
            } else {
                false
            }
        });

        if !acquired {
            tracing::debug!(agent = %agent, state = ?observed, "Rejected turn request");
            return Err(match observed {
                SessionState::Closed => AgentError::SessionClosed(agent),
                SessionState::Speaking => {
                    AgentError::TurnDiscipline(format!("agent {} is already speaking", agent))
                },
                other => AgentError::TurnDiscipline(format!(
                    "agent {} is not ready (state {:?})",
                    agent, other
                )),
            });
        }

        if self.connection.send(ClientEvent::response(instructions)).is_err() {
            self.state.send_if_modified(|state| {
                if *state == SessionState::Speaking {
                    *state = SessionState::Ready;
                    true
                } else {
                    false
                }
            });
            return Err(AgentError::SessionClosed(agent));
        }

        Ok(())
    }

    /// Close the connection. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.send_replace(SessionState::Closed);
        self.connection.close().await;

        if let Some(handle) = self.dispatcher.lock().take() {
            handle.abort();
        }
        tracing::info!(agent = %self.agent(), "Session closed");
    }

    pub fn agent(&self) -> AgentId {
        self.identity.id
    }

    pub fn identity(&self) -> &Arc<AgentIdentity> {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state(), SessionState::Ready | SessionState::Speaking)
    }

    pub fn is_speaking(&self) -> bool {
        self.state() == SessionState::Speaking
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Finished responses remembered for filtering late events
const RETIRED_RESPONSES: usize = 8;

/// Which response a session's events currently belong to
#[derive(Debug, Default)]
struct ResponseTracker {
    active: Option<String>,
    retired: VecDeque<String>,
}

impl ResponseTracker {
    /// A new response began; whatever was active is over
    fn start(&mut self, id: Option<&str>) {
        self.retire_active();
        self.active = id.map(str::to_string);
    }

    /// Whether an event for `id` belongs to the active response
    ///
    /// Events without an id are always admitted. The first id seen with no
    /// active response becomes the active one.
    fn admits(&mut self, id: Option<&str>) -> bool {
        let Some(id) = id else {
            return true;
        };
        if self.retired.iter().any(|r| r == id) {
            return false;
        }
        match &self.active {
            Some(active) => active == id,
            None => {
                self.active = Some(id.to_string());
                true
            },
        }
    }

    fn retire_active(&mut self) {
        if let Some(id) = self.active.take() {
            if self.retired.len() == RETIRED_RESPONSES {
                self.retired.pop_front();
            }
            self.retired.push_back(id);
        }
    }
}

/// Map a protocol message to a session event, updating state on the way
fn translate(
    agent: AgentId,
    message: ServerEvent,
    state: &watch::Sender<SessionState>,
    responses: &mut ResponseTracker,
) -> Option<SessionEventKind> {
    if let ServerEvent::ResponseCreated { .. } = message {
        responses.start(message.response_id());
        tracing::trace!(agent = %agent, response_id = ?message.response_id(), "Response started");
        return None;
    }
    if !responses.admits(message.response_id()) {
        tracing::debug!(
            agent = %agent,
            response_id = ?message.response_id(),
            "Dropping event from a finished response"
        );
        return None;
    }

    match message {
        ServerEvent::SessionCreated => Some(SessionEventKind::Created),
        ServerEvent::SessionUpdated => {
            state.send_if_modified(|s| {
                if matches!(s, SessionState::Connecting | SessionState::Connected) {
                    *s = SessionState::Ready;
                    true
                } else {
                    false
                }
            });
            Some(SessionEventKind::Ready)
        },
        ServerEvent::TranscriptDelta { delta, .. } => Some(SessionEventKind::TranscriptDelta(delta)),
        ServerEvent::TranscriptDone { transcript, .. } => {
            Some(SessionEventKind::TranscriptDone(transcript))
        },
        ServerEvent::AudioDelta { delta, .. } => Some(SessionEventKind::AudioDelta(delta)),
        ServerEvent::ResponseDone { .. } => {
            responses.retire_active();
            release_speaking(state);
            Some(SessionEventKind::TurnDone)
        },
        ServerEvent::Error { error } => {
            tracing::warn!(agent = %agent, error = %error, "Endpoint reported an error");
            responses.retire_active();
            release_speaking(state);
            Some(SessionEventKind::Error(error.to_string()))
        },
        ServerEvent::ResponseCreated { .. } => None,
        ServerEvent::Unknown => {
            tracing::trace!(agent = %agent, "Ignoring unhandled event type");
            None
        },
    }
}

fn release_speaking(state: &watch::Sender<SessionState>) {
    state.send_if_modified(|s| {
        if *s == SessionState::Speaking {
            *s = SessionState::Ready;
            true
        } else {
            false
        }
    });
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("agent", &self.agent())
            .field("name", &self.identity.name)
            .field("state", &self.state())
            .finish()
    }
}
