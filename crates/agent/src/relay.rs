//! Audio relay
//!
//! Decodes audio deltas, keeps them per `(agent, turn)` in arrival order and
//! forwards each fragment to the presentation surface immediately.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use voice_duet_core::{AgentId, AudioFormat, AudioFragment};

use crate::presentation::{report, PresentationSurface};

/// Relayed fragments keyed by `(agent, turn)`
#[derive(Debug, Default)]
pub struct AudioChunkBuffer {
    entries: BTreeMap<(AgentId, u32), Vec<AudioFragment>>,
}

impl AudioChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment; the entry is created on first use
    pub fn push(&mut self, fragment: AudioFragment) {
        self.entries
            .entry((fragment.agent, fragment.turn_index))
            .or_default()
            .push(fragment);
    }

    pub fn fragments(&self, agent: AgentId, turn: u32) -> &[AudioFragment] {
        self.entries
            .get(&(agent, turn))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of fragments already stored for `(agent, turn)`
    pub fn next_sequence(&self, agent: AgentId, turn: u32) -> u32 {
        self.fragments(agent, turn).len() as u32
    }

    pub fn totals(&self) -> Vec<TurnAudio> {
        self.entries
            .iter()
            .map(|(&(agent, turn), fragments)| TurnAudio {
                agent,
                turn,
                fragments: fragments.len() as u32,
                bytes: fragments.iter().map(|f| f.len() as u64).sum(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Audio relayed for one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TurnAudio {
    pub agent: AgentId,
    pub turn: u32,
    pub fragments: u32,
    pub bytes: u64,
}

pub struct AudioRelay {
    surface: Arc<dyn PresentationSurface>,
    format: AudioFormat,
    buffer: AudioChunkBuffer,
    /// Turn whose fragments were relayed last
    active: Option<(AgentId, u32)>,
}

impl AudioRelay {
    pub fn new(surface: Arc<dyn PresentationSurface>, format: AudioFormat) -> Self {
        Self {
            surface,
            format,
            buffer: AudioChunkBuffer::new(),
            active: None,
        }
    }

    /// Relay one audio delta for `agent`'s turn `turn`
    ///
    /// Returns the decoded size, or `None` if the payload was invalid and
    /// skipped.
    pub fn on_audio_delta(&mut self, agent: AgentId, turn: u32, payload: &str) -> Option<usize> {
        let sequence = self.buffer.next_sequence(agent, turn);
        let fragment = match AudioFragment::decode(agent, turn, sequence, self.format, payload) {
            Ok(fragment) => fragment,
            Err(e) => {
                tracing::warn!(agent = %agent, turn, error = %e, "Skipping undecodable audio");
                crate::metrics::record_malformed(agent);
                return None;
            },
        };

        if self.active != Some((agent, turn)) {
            self.active = Some((agent, turn));
            tracing::debug!(agent = %agent, turn, "First audio of turn");
            report("set_active_speaker", self.surface.set_active_speaker(agent));
        }

        let bytes = fragment.len();
        report("push_audio_fragment", self.surface.push_audio_fragment(&fragment));
        crate::metrics::record_audio_relayed(agent, bytes);
        self.buffer.push(fragment);

        Some(bytes)
    }

    pub fn buffer(&self) -> &AudioChunkBuffer {
        &self.buffer
    }

    pub fn totals(&self) -> Vec<TurnAudio> {
        self.buffer.totals()
    }

    /// Drop buffered payloads
    pub fn release(&mut self) {
        self.buffer.clear();
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::SurfaceError;
    use parking_lot::Mutex;
    use std::time::Duration;
    use voice_duet_core::AgentIdentity;

    #[derive(Default)]
    struct Capture {
        calls: Mutex<Vec<String>>,
        fail_audio: bool,
    }

    impl PresentationSurface for Capture {
        fn initialize(&self, _agents: &[AgentIdentity; 2]) -> Result<(), SurfaceError> {
            Ok(())
        }
        fn run_intro_sequence(&self, _duration: Duration) -> Result<(), SurfaceError> {
            Ok(())
        }
        fn set_active_speaker(&self, agent: AgentId) -> Result<(), SurfaceError> {
            self.calls.lock().push(format!("speaker:{}", agent));
            Ok(())
        }
        fn push_audio_fragment(&self, fragment: &AudioFragment) -> Result<(), SurfaceError> {
            if self.fail_audio {
                return Err(SurfaceError::Unavailable("no listeners".into()));
            }
            self.calls
                .lock()
                .push(format!("audio:{}:{}:{}", fragment.agent, fragment.turn_index, fragment.sequence));
            Ok(())
        }
        fn set_message(&self, _agent: AgentId, _text: &str) -> Result<(), SurfaceError> {
            Ok(())
        }
        fn close(&self) -> Result<(), SurfaceError> {
            Ok(())
        }
    }

    // 4 bytes of PCM16 = 2 samples
    const PAYLOAD: &str = "AAABAA==";

    #[test]
    fn test_fragments_relayed_in_order_with_speaker_change() {
        let surface = Arc::new(Capture::default());
        let mut relay = AudioRelay::new(surface.clone(), AudioFormat::Pcm16);

        relay.on_audio_delta(AgentId::A, 0, PAYLOAD);
        relay.on_audio_delta(AgentId::A, 0, PAYLOAD);
        relay.on_audio_delta(AgentId::B, 1, PAYLOAD);

        assert_eq!(
            *surface.calls.lock(),
            vec![
                "speaker:A",
                "audio:A:0:0",
                "audio:A:0:1",
                "speaker:B",
                "audio:B:1:0",
            ]
        );

        let sequences: Vec<u32> = relay.buffer().fragments(AgentId::A, 0).iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);
        assert_eq!(
            relay.totals(),
            vec![
                TurnAudio { agent: AgentId::A, turn: 0, fragments: 2, bytes: 8 },
                TurnAudio { agent: AgentId::B, turn: 1, fragments: 1, bytes: 4 },
            ]
        );
    }

    #[test]
    fn test_invalid_payload_is_skipped() {
        let surface = Arc::new(Capture::default());
        let mut relay = AudioRelay::new(surface.clone(), AudioFormat::Pcm16);

        assert_eq!(relay.on_audio_delta(AgentId::A, 0, "%%%"), None);
        assert!(relay.buffer().is_empty());
        assert!(surface.calls.lock().is_empty());
    }

    #[test]
    fn test_surface_failure_does_not_lose_buffered_audio() {
        let surface = Arc::new(Capture {
            fail_audio: true,
            ..Default::default()
        });
        let mut relay = AudioRelay::new(surface, AudioFormat::Pcm16);

        assert_eq!(relay.on_audio_delta(AgentId::B, 3, PAYLOAD), Some(4));
        assert_eq!(relay.buffer().fragments(AgentId::B, 3).len(), 1);

        relay.release();
        assert!(relay.buffer().is_empty());
    }
}
