//! Broadcast presentation surface
//!
//! Every surface call becomes a [`SurfaceMessage`] fanned out to WebSocket
//! viewers. A snapshot of the display state is kept for late joiners.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

use voice_duet_agent::{PresentationSurface, SurfaceError};
use voice_duet_core::{AgentId, AgentIdentity, AudioFragment, Voice};

/// What a viewer needs to render one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCard {
    pub id: AgentId,
    pub name: String,
    pub role: String,
    pub voice: Voice,
}

impl From<&AgentIdentity> for AgentCard {
    fn from(identity: &AgentIdentity) -> Self {
        Self {
            id: identity.id,
            name: identity.name.clone(),
            role: identity.role.clone(),
            voice: identity.voice,
        }
    }
}

/// Display state for viewers that connect mid-run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSnapshot {
    pub agents: Vec<AgentCard>,
    pub active_speaker: Option<AgentId>,
    /// Latest message per agent, indexed by seat
    pub messages: [Option<String>; 2],
    pub closed: bool,
}

/// Message sent to viewers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceMessage {
    Snapshot {
        snapshot: SurfaceSnapshot,
    },
    Init {
        agents: Vec<AgentCard>,
    },
    Intro {
        duration_ms: u64,
    },
    ActiveSpeaker {
        agent: AgentId,
    },
    Audio {
        agent: AgentId,
        turn: u32,
        sequence: u32,
        format: String,
        /// Base64 audio payload
        data: String,
    },
    Message {
        agent: AgentId,
        text: String,
    },
    Closed,
}

impl SurfaceMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub struct BroadcastSurface {
    tx: broadcast::Sender<SurfaceMessage>,
    snapshot: RwLock<SurfaceSnapshot>,
    closed: AtomicBool,
}

impl BroadcastSurface {
    /// `capacity` bounds how far a slow viewer may fall behind before skipping
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            snapshot: RwLock::new(SurfaceSnapshot::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Current snapshot plus a receiver for everything after it
    pub fn subscribe(&self) -> (SurfaceSnapshot, broadcast::Receiver<SurfaceMessage>) {
        // Hold the read lock so no update slips between snapshot and subscribe
        let snapshot = self.snapshot.read();
        (snapshot.clone(), self.tx.subscribe())
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        self.snapshot.read().clone()
    }

    pub fn viewers(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Apply `update` to the snapshot and broadcast `message`
    fn publish(
        &self,
        message: SurfaceMessage,
        update: impl FnOnce(&mut SurfaceSnapshot),
    ) -> Result<(), SurfaceError> {
        if self.is_closed() {
            return Err(SurfaceError::Closed);
        }
        let mut snapshot = self.snapshot.write();
        update(&mut snapshot);
        // No viewers is fine
        let _ = self.tx.send(message);
        Ok(())
    }
}

impl Default for BroadcastSurface {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl PresentationSurface for BroadcastSurface {
    fn initialize(&self, agents: &[AgentIdentity; 2]) -> Result<(), SurfaceError> {
        let cards: Vec<AgentCard> = agents.iter().map(AgentCard::from).collect();
        tracing::debug!(viewers = self.viewers(), "Initializing presentation");
        self.publish(
            SurfaceMessage::Init {
                agents: cards.clone(),
            },
            |snapshot| snapshot.agents = cards,
        )
    }

    fn run_intro_sequence(&self, duration: Duration) -> Result<(), SurfaceError> {
        self.publish(
            SurfaceMessage::Intro {
                duration_ms: duration.as_millis() as u64,
            },
            |_| {},
        )
    }

    fn set_active_speaker(&self, agent: AgentId) -> Result<(), SurfaceError> {
        self.publish(SurfaceMessage::ActiveSpeaker { agent }, |snapshot| {
            snapshot.active_speaker = Some(agent)
        })
    }

    fn push_audio_fragment(&self, fragment: &AudioFragment) -> Result<(), SurfaceError> {
        self.publish(
            SurfaceMessage::Audio {
                agent: fragment.agent,
                turn: fragment.turn_index,
                sequence: fragment.sequence,
                format: fragment.format.as_str().to_string(),
                data: fragment.to_base64(),
            },
            |_| {},
        )
    }

    fn set_message(&self, agent: AgentId, text: &str) -> Result<(), SurfaceError> {
        self.publish(
            SurfaceMessage::Message {
                agent,
                text: text.to_string(),
            },
            |snapshot| snapshot.messages[agent.index()] = Some(text.to_string()),
        )
    }

    fn close(&self) -> Result<(), SurfaceError> {
        let mut snapshot = self.snapshot.write();
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        snapshot.closed = true;
        snapshot.active_speaker = None;
        let _ = self.tx.send(SurfaceMessage::Closed);
        tracing::info!("Presentation closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(agent: AgentId, sequence: u32) -> AudioFragment {
        AudioFragment::decode(agent, 0, sequence, voice_duet_core::AudioFormat::Pcm16, "AAABAA==")
            .unwrap()
    }

    fn agents() -> [AgentIdentity; 2] {
        [
            AgentIdentity::new(AgentId::A, "Alex").with_role("host"),
            AgentIdentity::new(AgentId::B, "Sam").with_role("guest"),
        ]
    }

    #[test]
    fn test_no_viewers_is_not_an_error() {
        let surface = BroadcastSurface::new(8);
        assert!(surface.initialize(&agents()).is_ok());
        assert!(surface.set_message(AgentId::A, "Hello").is_ok());
        assert_eq!(surface.snapshot().messages[0].as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_messages_fan_out_in_order() {
        let surface = BroadcastSurface::new(8);
        let (snapshot, mut rx) = surface.subscribe();
        assert!(snapshot.agents.is_empty());

        surface.set_active_speaker(AgentId::B).unwrap();
        surface.push_audio_fragment(&fragment(AgentId::B, 0)).unwrap();
        surface.set_message(AgentId::B, "Hi there.").unwrap();

        assert_eq!(rx.recv().await.unwrap(), SurfaceMessage::ActiveSpeaker { agent: AgentId::B });
        match rx.recv().await.unwrap() {
            SurfaceMessage::Audio {
                agent,
                sequence,
                data,
                ..
            } => {
                assert_eq!(agent, AgentId::B);
                assert_eq!(sequence, 0);
                assert_eq!(data, "AAABAA==");
            },
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            rx.recv().await.unwrap(),
            SurfaceMessage::Message {
                agent: AgentId::B,
                text: "Hi there.".to_string()
            }
        );
    }

    #[test]
    fn test_late_joiner_snapshot() {
        let surface = BroadcastSurface::new(8);
        surface.initialize(&agents()).unwrap();
        surface.set_active_speaker(AgentId::A).unwrap();
        surface.set_message(AgentId::A, "Welcome.").unwrap();

        let (snapshot, _rx) = surface.subscribe();
        assert_eq!(snapshot.agents.len(), 2);
        assert_eq!(snapshot.agents[1].name, "Sam");
        assert_eq!(snapshot.active_speaker, Some(AgentId::A));
        assert_eq!(snapshot.messages, [Some("Welcome.".to_string()), None]);
    }

    #[test]
    fn test_close_once_then_rejects() {
        let surface = BroadcastSurface::new(8);
        let (_, mut rx) = surface.subscribe();

        surface.close().unwrap();
        surface.close().unwrap();
        assert!(surface.is_closed());
        assert_eq!(surface.set_message(AgentId::A, "late"), Err(SurfaceError::Closed));

        assert_eq!(rx.try_recv().unwrap(), SurfaceMessage::Closed);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_message_json_shape() {
        let json = SurfaceMessage::ActiveSpeaker { agent: AgentId::A }.to_json().unwrap();
        assert_eq!(json, r#"{"type":"active_speaker","agent":"a"}"#);
    }
}
