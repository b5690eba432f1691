//! JSON message boundary for the application shell
//!
//! The shell speaks one JSON object per message:
//!
//! ```text
//! {"id": 7, "channel": "playback", "method": "setPitch", "args": {"pitch": 1.5}}
//! {"id": 8, "channel": "reverse", "method": "reverseAudio",
//!  "args": {"inputPath": "/a.m4a", "outputPath": "/a-rev.wav"}}
//! ```
//!
//! and gets one reply per message: `{"id": 7, "result": true}`. Unknown
//! methods are answered with `{"error": "notImplemented"}`; known methods
//! with missing or ill-typed arguments are rejected with `result: false`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::command::{PlaybackCommand, PlaybackReply, ReverseRequest};

/// Method name of the single reversal operation
pub const REVERSE_METHOD: &str = "reverseAudio";

/// Which handler a message is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Reverse,
    Playback,
}

/// Raw message as received from the shell
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: Option<u64>,
    pub channel: Channel,
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

/// A decoded, fully typed message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Reverse(ReverseRequest),
    Playback(PlaybackCommand),
}

/// Why a message could not be decoded
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Not valid JSON, or missing `channel`/`method`
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Method is not known on the channel
    #[error("Unknown method {method:?} on {channel:?} channel")]
    UnknownMethod { channel: Channel, method: String },

    /// Method known but its arguments are missing or ill-typed
    #[error("Invalid arguments for {method}: {reason}")]
    InvalidArgs { method: String, reason: String },
}

const PLAYBACK_METHODS: &[&str] = &[
    "loadAudio",
    "setPitch",
    "setSpeed",
    "play",
    "pause",
    "stop",
    "seek",
    "setLooping",
    "getPosition",
    "getDuration",
    "isPitchSupported",
];

/// `null`, missing and `{}` all mean "no arguments"
fn args_are_empty(args: &Value) -> bool {
    match args {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

impl Envelope {
    /// Parse one JSON message
    pub fn parse(line: &str) -> Result<Self, ChannelError> {
        serde_json::from_str(line).map_err(|e| ChannelError::Malformed(e.to_string()))
    }

    /// Decode method and arguments into a typed message
    pub fn decode(&self) -> Result<Message, ChannelError> {
        let invalid = |reason: String| ChannelError::InvalidArgs {
            method: self.method.clone(),
            reason,
        };

        match self.channel {
            Channel::Reverse => {
                if self.method != REVERSE_METHOD {
                    return Err(self.unknown());
                }
                let request: ReverseRequest = serde_json::from_value(self.args.clone())
                    .map_err(|e| invalid(e.to_string()))?;
                Ok(Message::Reverse(request))
            }
            Channel::Playback => {
                if !PLAYBACK_METHODS.contains(&self.method.as_str()) {
                    return Err(self.unknown());
                }
                let mut tagged = Map::new();
                tagged.insert("method".to_string(), Value::String(self.method.clone()));
                if !args_are_empty(&self.args) {
                    tagged.insert("args".to_string(), self.args.clone());
                }
                let command: PlaybackCommand = serde_json::from_value(Value::Object(tagged))
                    .map_err(|e| invalid(e.to_string()))?;
                Ok(Message::Playback(command))
            }
        }
    }

    fn unknown(&self) -> ChannelError {
        ChannelError::UnknownMethod {
            channel: self.channel,
            method: self.method.clone(),
        }
    }
}

/// One reply line back to the shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PlaybackReply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    pub fn result(id: Option<u64>, result: impl Into<PlaybackReply>) -> Self {
        Self {
            id,
            result: Some(result.into()),
            error: None,
        }
    }

    pub fn not_implemented(id: Option<u64>) -> Self {
        Self {
            id,
            result: None,
            error: Some("notImplemented".to_string()),
        }
    }

    /// Reply for a message that failed to decode
    ///
    /// Bad arguments are a rejected operation (`false`), not a fault.
    pub fn for_error(id: Option<u64>, err: &ChannelError) -> Self {
        match err {
            ChannelError::InvalidArgs { .. } => Self::result(id, false),
            ChannelError::UnknownMethod { .. } => Self::not_implemented(id),
            ChannelError::Malformed(reason) => Self {
                id,
                result: None,
                error: Some(reason.clone()),
            },
        }
    }

    /// Serialize to a single JSON line
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"error":"serialization"}"#.to_string())
    }
}
