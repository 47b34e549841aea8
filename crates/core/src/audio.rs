//! Audio formats and relayed audio fragments

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{AgentId, Error, Result};

/// Audio encodings accepted by the realtime endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// 16-bit signed PCM, 24kHz mono, little-endian
    #[default]
    Pcm16,
    /// G.711 μ-law, 8kHz (telephony)
    G711Ulaw,
    /// G.711 A-law, 8kHz (telephony)
    G711Alaw,
}

impl AudioFormat {
    /// Wire name of the format
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Pcm16 => "pcm16",
            AudioFormat::G711Ulaw => "g711_ulaw",
            AudioFormat::G711Alaw => "g711_alaw",
        }
    }

    pub fn sample_rate(&self) -> u32 {
        match self {
            AudioFormat::Pcm16 => 24_000,
            AudioFormat::G711Ulaw | AudioFormat::G711Alaw => 8_000,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            AudioFormat::Pcm16 => 2,
            AudioFormat::G711Ulaw | AudioFormat::G711Alaw => 1,
        }
    }
}

/// One decoded fragment of synthesized audio
///
/// Fragments are keyed by `(agent, turn_index)` and numbered by `sequence`
/// in the order they arrived from the session.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioFragment {
    /// Agent that produced the audio
    pub agent: AgentId,
    /// Turn the fragment belongs to
    pub turn_index: u32,
    /// Arrival order within the turn, starting at 0
    pub sequence: u32,
    /// Encoding of `data`
    pub format: AudioFormat,
    /// Raw audio bytes
    pub data: Bytes,
}

impl std::fmt::Debug for AudioFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFragment")
            .field("agent", &self.agent)
            .field("turn_index", &self.turn_index)
            .field("sequence", &self.sequence)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl AudioFragment {
    pub fn new(
        agent: AgentId,
        turn_index: u32,
        sequence: u32,
        format: AudioFormat,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            agent,
            turn_index,
            sequence,
            format,
            data: data.into(),
        }
    }

    /// Decode a base64 payload as delivered by an `audio-delta` event
    pub fn decode(
        agent: AgentId,
        turn_index: u32,
        sequence: u32,
        format: AudioFormat,
        payload: &str,
    ) -> Result<Self> {
        let data = BASE64
            .decode(payload.trim())
            .map_err(|e| Error::InvalidAudio(e.to_string()))?;

        if format.bytes_per_sample() > 1 && data.len() % format.bytes_per_sample() != 0 {
            return Err(Error::InvalidAudio(format!(
                "{} bytes is not a whole number of {} samples",
                data.len(),
                format.as_str()
            )));
        }

        Ok(Self::new(agent, turn_index, sequence, format, data))
    }

    /// Re-encode the audio as base64 for text transports
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Playback duration of this fragment
    pub fn duration(&self) -> Duration {
        let bytes_per_second = self.format.sample_rate() as usize * self.format.bytes_per_sample();
        Duration::from_secs_f64(self.data.len() as f64 / bytes_per_second as f64)
    }
}
