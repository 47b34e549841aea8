//! Voice selectors understood by the realtime endpoint

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::Error;

/// Synthesized voice used for one agent's responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl Voice {
    pub const ALL: [Voice; 8] = [
        Voice::Alloy,
        Voice::Ash,
        Voice::Ballad,
        Voice::Coral,
        Voice::Echo,
        Voice::Sage,
        Voice::Shimmer,
        Voice::Verse,
    ];

    /// Wire name of the voice
    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Alloy => "alloy",
            Voice::Ash => "ash",
            Voice::Ballad => "ballad",
            Voice::Coral => "coral",
            Voice::Echo => "echo",
            Voice::Sage => "sage",
            Voice::Shimmer => "shimmer",
            Voice::Verse => "verse",
        }
    }
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Voice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Voice::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == wanted)
            .ok_or_else(|| Error::UnknownVoice(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_parse() {
        assert_eq!("Coral".parse::<Voice>().unwrap(), Voice::Coral);
        assert_eq!(" echo ".parse::<Voice>().unwrap(), Voice::Echo);
        assert!("baritone".parse::<Voice>().is_err());
    }

    #[test]
    fn test_voice_serde_lowercase() {
        let json = serde_json::to_string(&Voice::Shimmer).unwrap();
        assert_eq!(json, "\"shimmer\"");
    }
}
