//! In-process realtime endpoint
//!
//! Speaks the same event protocol as the real endpoint so the whole
//! orchestrator can run offline and under test. Faults are injected per
//! agent through [`SimulatedBehavior`]; response numbers are counted per
//! agent starting at 1.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use voice_duet_core::{AgentId, AgentIdentity, AudioFormat};

use crate::connection::{Connector, Outbound, RealtimeConnection, TransportEvent};
use crate::protocol::{decode_frame, ClientEvent};
use crate::TransportError;

/// Fault injection for one simulated agent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedBehavior {
    /// Fail the connection attempt
    pub refuse_connect: bool,
    /// Hold the connection attempt this long before answering it
    pub connect_delay: Duration,
    /// Never acknowledge `session.update`
    pub never_ready: bool,
    /// Produce nothing for the Nth response
    pub stall_on_response: Option<u32>,
    /// Emit an `error` event part-way through the Nth response
    pub error_on_response: Option<u32>,
    /// After that error, keep streaming the response and end it with a
    /// failed `response.done`
    pub trail_after_error: bool,
    /// Drop the connection part-way through the Nth response
    pub drop_on_response: Option<u32>,
    /// Send an undecodable frame before the Nth response
    pub malformed_on_response: Option<u32>,
    /// Complete the Nth response without a final transcript
    pub skip_final_transcript_on_response: Option<u32>,
}

/// Counters observed by the simulated endpoint
#[derive(Debug, Default)]
pub struct SimulatedStats {
    connects: [AtomicU32; 2],
    closes: [AtomicU32; 2],
    session_updates: [AtomicU32; 2],
    responses: [AtomicU32; 2],
}

impl SimulatedStats {
    /// Connection attempts, refused ones included
    pub fn connects(&self, agent: AgentId) -> u32 {
        self.connects[agent.index()].load(Ordering::SeqCst)
    }

    /// Client-initiated closes
    pub fn closes(&self, agent: AgentId) -> u32 {
        self.closes[agent.index()].load(Ordering::SeqCst)
    }

    pub fn session_updates(&self, agent: AgentId) -> u32 {
        self.session_updates[agent.index()].load(Ordering::SeqCst)
    }

    /// `response.create` requests received
    pub fn responses(&self, agent: AgentId) -> u32 {
        self.responses[agent.index()].load(Ordering::SeqCst)
    }
}

/// Connector backed by an in-process simulated endpoint
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    behaviors: [SimulatedBehavior; 2],
    frame_interval: Duration,
    audio_fragments: u32,
    samples_per_fragment: usize,
    output_format: AudioFormat,
    stats: Arc<SimulatedStats>,
}

impl Default for SimulatedConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedConnector {
    pub fn new() -> Self {
        Self {
            behaviors: Default::default(),
            frame_interval: Duration::from_millis(20),
            audio_fragments: 3,
            samples_per_fragment: 480,
            output_format: AudioFormat::Pcm16,
            stats: Arc::new(SimulatedStats::default()),
        }
    }

    pub fn with_behavior(mut self, agent: AgentId, behavior: SimulatedBehavior) -> Self {
        self.behaviors[agent.index()] = behavior;
        self
    }

    /// Pause between emitted frames
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Audio fragments emitted per response
    pub fn with_audio_fragments(mut self, fragments: u32) -> Self {
        self.audio_fragments = fragments;
        self
    }

    pub fn with_output_format(mut self, format: AudioFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn stats(&self) -> Arc<SimulatedStats> {
        self.stats.clone()
    }

    /// Transcript the simulated agent speaks for its Nth response
    pub fn line_for(identity: &AgentIdentity, response: u32) -> String {
        format!("This is {} with thought number {}.", identity.name, response)
    }
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn connect(&self, agent: &AgentIdentity) -> Result<RealtimeConnection, TransportError> {
        let seat = agent.id.index();
        self.stats.connects[seat].fetch_add(1, Ordering::SeqCst);

        let behavior = self.behaviors[seat].clone();
        if !behavior.connect_delay.is_zero() {
            tokio::time::sleep(behavior.connect_delay).await;
        }
        if behavior.refuse_connect {
            tracing::debug!(agent = %agent.id, "Simulated endpoint refusing connection");
            return Err(TransportError::ConnectionFailed(format!(
                "simulated endpoint refused {}",
                agent.name
            )));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let endpoint = SimulatedSession {
            identity: agent.clone(),
            behavior,
            frame_interval: self.frame_interval,
            audio_fragments: self.audio_fragments,
            fragment_bytes: self.samples_per_fragment * self.output_format.bytes_per_sample(),
            stats: self.stats.clone(),
            outbound: out_rx,
            inbound: in_tx,
            pending: VecDeque::new(),
        };
        let task = tokio::spawn(endpoint.run());

        Ok(RealtimeConnection::new(
            agent.id,
            out_tx,
            in_rx,
            vec![task],
            Duration::from_millis(500),
        ))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

enum Flow {
    Continue,
    /// The client closed the connection
    Closed,
    /// The endpoint dropped the connection
    Dropped,
}

struct SimulatedSession {
    identity: AgentIdentity,
    behavior: SimulatedBehavior,
    frame_interval: Duration,
    audio_fragments: u32,
    fragment_bytes: usize,
    stats: Arc<SimulatedStats>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    inbound: mpsc::UnboundedSender<TransportEvent>,
    /// Events received while a response was being produced
    pending: VecDeque<ClientEvent>,
}

impl SimulatedSession {
    async fn run(mut self) {
        let seat = self.identity.id;
        self.emit(json!({
            "type": "session.created",
            "session": {"id": format!("sess_sim_{}", seat.as_str())},
        }));

        let mut closed_by_client = false;
        loop {
            let event = match self.pending.pop_front() {
                Some(event) => event,
                None => match self.outbound.recv().await {
                    Some(Outbound::Event(event)) => event,
                    Some(Outbound::Close) => {
                        closed_by_client = true;
                        break;
                    },
                    None => break,
                },
            };

            match event {
                ClientEvent::SessionUpdate { session } => {
                    self.stats.session_updates[seat.index()].fetch_add(1, Ordering::SeqCst);
                    if !self.behavior.never_ready {
                        self.emit(json!({
                            "type": "session.updated",
                            "session": {"voice": session.voice, "instructions": session.instructions},
                        }));
                    }
                },
                ClientEvent::ResponseCreate { .. } => {
                    let n = self.stats.responses[seat.index()].fetch_add(1, Ordering::SeqCst) + 1;
                    match self.respond(n).await {
                        Flow::Continue => {},
                        Flow::Closed => {
                            closed_by_client = true;
                            break;
                        },
                        Flow::Dropped => {
                            self.send(TransportEvent::Closed {
                                reason: Some("simulated connection drop".to_string()),
                            });
                            closed_by_client = self.await_client_close().await;
                            if closed_by_client {
                                self.stats.closes[seat.index()].fetch_add(1, Ordering::SeqCst);
                            }
                            return;
                        },
                    }
                },
            }
        }

        if closed_by_client {
            self.stats.closes[seat.index()].fetch_add(1, Ordering::SeqCst);
        }
        self.send(TransportEvent::Closed { reason: None });
    }

    async fn respond(&mut self, n: u32) -> Flow {
        let b = self.behavior.clone();
        let response_id = format!("resp_sim_{}_{}", self.identity.id.as_str(), n);

        self.emit(json!({
            "type": "response.created",
            "response": {"id": response_id, "status": "in_progress"},
        }));
        self.emit(json!({"type": "rate_limits.updated", "rate_limits": []}));

        if b.malformed_on_response == Some(n) {
            self.send(decode_frame(r#"{"type":"response.audio.delta","delta":"#));
        }

        if b.stall_on_response == Some(n) {
            tracing::debug!(agent = %self.identity.id, response = n, "Simulated endpoint stalling");
            return Flow::Continue;
        }

        let text = SimulatedConnector::line_for(&self.identity, n);
        let words: Vec<&str> = text.split_inclusive(' ').collect();
        let frames = words.len().max(self.audio_fragments as usize);
        let audio = BASE64.encode(vec![0u8; self.fragment_bytes]);
        let mut failed = false;

        for i in 0..frames {
            if i < self.audio_fragments as usize {
                self.emit(json!({
                    "type": "response.audio.delta",
                    "response_id": response_id,
                    "delta": audio,
                }));
            }
            if let Some(word) = words.get(i) {
                self.emit(json!({
                    "type": "response.audio_transcript.delta",
                    "response_id": response_id,
                    "delta": word,
                }));
            }

            if i == 0 && b.error_on_response == Some(n) {
                self.emit(json!({
                    "type": "error",
                    "error": {
                        "type": "server_error",
                        "code": "simulated_failure",
                        "message": format!("simulated failure on response {}", n),
                    },
                }));
                if !b.trail_after_error {
                    return Flow::Continue;
                }
                failed = true;
            }
            if i == 0 && b.drop_on_response == Some(n) {
                return Flow::Dropped;
            }

            if !self.pause().await {
                return Flow::Closed;
            }
        }

        if failed {
            self.emit(json!({
                "type": "response.done",
                "response": {"id": response_id, "status": "failed"},
            }));
            return Flow::Continue;
        }

        if b.skip_final_transcript_on_response != Some(n) {
            self.emit(json!({
                "type": "response.audio_transcript.done",
                "response_id": response_id,
                "transcript": text,
            }));
        }
        self.emit(json!({
            "type": "response.done",
            "response": {"id": response_id, "status": "completed"},
        }));

        Flow::Continue
    }

    /// Wait one frame interval. Returns `false` if the client closed meanwhile.
    async fn pause(&mut self) -> bool {
        if self.frame_interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.frame_interval).await;
        }

        loop {
            match self.outbound.try_recv() {
                Ok(Outbound::Event(event)) => self.pending.push_back(event),
                Ok(Outbound::Close) | Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => return true,
            }
        }
    }

    /// After a drop, ignore everything until the client closes
    async fn await_client_close(&mut self) -> bool {
        while let Some(outbound) = self.outbound.recv().await {
            if matches!(outbound, Outbound::Close) {
                return true;
            }
        }
        false
    }

    fn emit(&self, frame: Value) {
        self.send(decode_frame(&frame.to_string()));
    }

    fn send(&self, event: TransportEvent) {
        // Receiver gone means nobody is listening anymore
        let _ = self.inbound.send(event);
    }
}
