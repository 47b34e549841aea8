//! Duplex connection to one realtime session
//!
//! A [`RealtimeConnection`] is a pair of channels in front of background
//! I/O tasks. Outbound events are queued without blocking; inbound events
//! are delivered in arrival order through a receiver that the owner takes
//! once with [`RealtimeConnection::take_events`].

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use voice_duet_core::{AgentId, AgentIdentity};

use crate::protocol::{ClientEvent, ServerEvent};
use crate::TransportError;

/// Something that happened on the inbound side of a connection
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A well-formed frame
    Message(ServerEvent),
    /// A frame that could not be decoded
    Malformed { raw: String, error: String },
    /// The connection ended; no further events follow
    Closed { reason: Option<String> },
}

/// Instructions for the writer task
#[derive(Debug)]
pub(crate) enum Outbound {
    Event(ClientEvent),
    Close,
}

/// Opens realtime connections for agents
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a connection for `agent`
    async fn connect(&self, agent: &AgentIdentity) -> Result<RealtimeConnection, TransportError>;

    /// Connector name for logs
    fn name(&self) -> &'static str;
}

/// Open duplex channel to one realtime session
pub struct RealtimeConnection {
    agent: AgentId,
    outbound: mpsc::UnboundedSender<Outbound>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    close_timeout: Duration,
    closed: AtomicBool,
}

impl RealtimeConnection {
    pub(crate) fn new(
        agent: AgentId,
        outbound: mpsc::UnboundedSender<Outbound>,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
        tasks: Vec<JoinHandle<()>>,
        close_timeout: Duration,
    ) -> Self {
        Self {
            agent,
            outbound,
            inbound: Mutex::new(Some(inbound)),
            tasks: Mutex::new(tasks),
            close_timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub fn agent(&self) -> AgentId {
        self.agent
    }

    /// Queue an event for sending
    ///
    /// Fails with [`TransportError::Closed`] once the connection is closed
    /// or its writer has stopped.
    pub fn send(&self, event: ClientEvent) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(Outbound::Event(event))
            .map_err(|_| TransportError::Closed)
    }

    /// Take the inbound event stream. Returns `None` after the first call.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.inbound.lock().take()
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }

    /// Close the connection
    ///
    /// Asks the writer to send a close frame, then waits up to the close
    /// timeout for the I/O tasks before aborting them. Calling this more
    /// than once is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.outbound.send(Outbound::Close);

        let mut tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        let joined = tokio::time::timeout(
            self.close_timeout,
            futures::future::join_all(tasks.iter_mut()),
        )
        .await;

        if joined.is_err() {
            tracing::warn!(
                agent = %self.agent,
                timeout_ms = self.close_timeout.as_millis() as u64,
                "Connection did not close in time, aborting I/O tasks"
            );
            for task in &tasks {
                task.abort();
            }
        }

        tracing::debug!(agent = %self.agent, "Connection closed");
    }
}

impl Drop for RealtimeConnection {
    fn drop(&mut self) {
        for task in self.tasks.lock().iter() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for RealtimeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConnection")
            .field("agent", &self.agent)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (
        RealtimeConnection,
        mpsc::UnboundedReceiver<Outbound>,
        mpsc::UnboundedSender<TransportEvent>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let conn = RealtimeConnection::new(AgentId::A, out_tx, in_rx, Vec::new(), Duration::from_millis(50));
        (conn, out_rx, in_tx)
    }

    #[tokio::test]
    async fn test_send_then_close_is_idempotent() {
        let (conn, mut out_rx, _in_tx) = pair();

        conn.send(ClientEvent::response("hi")).unwrap();
        assert!(matches!(out_rx.recv().await, Some(Outbound::Event(_))));

        conn.close().await;
        conn.close().await;
        assert!(matches!(out_rx.recv().await, Some(Outbound::Close)));
        assert!(!conn.is_open());
        assert!(matches!(conn.send(ClientEvent::response("late")), Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_events_can_be_taken_once() {
        let (conn, _out_rx, in_tx) = pair();
        let mut events = conn.take_events().unwrap();
        assert!(conn.take_events().is_none());

        in_tx.send(TransportEvent::Message(ServerEvent::SessionCreated)).unwrap();
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Message(ServerEvent::SessionCreated))
        );
    }

    #[tokio::test]
    async fn test_close_aborts_stuck_tasks() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (_in_tx, in_rx) = mpsc::unbounded_channel();
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let conn = RealtimeConnection::new(AgentId::B, out_tx, in_rx, vec![stuck], Duration::from_millis(20));

        let started = std::time::Instant::now();
        conn.close().await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_send_fails_when_writer_gone() {
        let (conn, out_rx, _in_tx) = pair();
        drop(out_rx);
        assert!(!conn.is_open());
        assert!(conn.send(ClientEvent::response("x")).is_err());
    }
}
