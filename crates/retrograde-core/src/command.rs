//! Typed commands for the reversal and playback channels
//!
//! Each channel has a closed set of variants carrying their own typed
//! parameters. The shell boundary decodes into these (see
//! [`crate::channel`]); nothing downstream looks at method-name strings or
//! argument maps.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Request to reverse one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseRequest {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

/// Commands accepted by the playback controller
///
/// The serde representation matches the shell channel:
/// `{"method": "setPitch", "args": {"pitch": 1.5}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "camelCase")]
pub enum PlaybackCommand {
    /// Load a file into a fresh session
    LoadAudio {
        #[serde(rename = "filePath")]
        file_path: PathBuf,
    },
    /// Pitch ratio, clamped to 0.5..=2.0
    SetPitch { pitch: f64 },
    /// Speed ratio, clamped to 0.25..=4.0
    SetSpeed { speed: f64 },
    Play,
    Pause,
    Stop,
    /// Seek target in milliseconds
    Seek { position: f64 },
    SetLooping { looping: bool },
    GetPosition,
    GetDuration,
    IsPitchSupported,
}

/// Reply to a [`PlaybackCommand`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlaybackReply {
    Bool(bool),
    /// Integer milliseconds
    Millis(u64),
}

impl From<bool> for PlaybackReply {
    fn from(value: bool) -> Self {
        PlaybackReply::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_variant_needs_no_args() {
        let cmd: PlaybackCommand = serde_json::from_str(r#"{"method":"play"}"#).unwrap();
        assert_eq!(cmd, PlaybackCommand::Play);
    }

    #[test]
    fn test_reply_serializes_bare() {
        assert_eq!(serde_json::to_string(&PlaybackReply::Bool(true)).unwrap(), "true");
        assert_eq!(serde_json::to_string(&PlaybackReply::Millis(1500)).unwrap(), "1500");
    }
}
