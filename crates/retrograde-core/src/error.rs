//! Error types for reversal and playback
//!
//! Nothing in here crosses the public boundary of the orchestrator or the
//! playback controller: both collapse these into boolean results and log the
//! detail. The types exist so the pipeline stages can use `?` internally and
//! so tests can assert on the exact failure.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reversing an audio file
#[derive(Error, Debug)]
pub enum ReverseError {
    /// Input file does not exist
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// Malformed or unrecognized container or codec metadata
    #[error("Invalid format: {0}")]
    FormatError(String),

    /// No audio track, or the decoder could not be set up
    #[error("Decode failed: {0}")]
    DecodeError(String),

    /// The decoder ran to end-of-stream without producing any samples
    #[error("Decoder produced no audio")]
    EmptyStreamError,

    /// Sample data length is not a whole number of frames
    #[error("Truncated data: {len} units is not a multiple of frame size {frame_len}")]
    TruncatedDataError { len: usize, frame_len: usize },

    /// Output could not be written
    #[error("Failed to write output: {path}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for reversal operations
pub type ReverseResult<T> = Result<T, ReverseError>;

/// Errors raised by the frame reversal algorithm
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Frame length of zero can't partition anything
    #[error("Frame length must be non-zero")]
    ZeroFrameLength,

    /// Buffer has trailing units that don't form a whole frame
    #[error("Buffer of {len} units has {remainder} trailing units (frame length {frame_len})")]
    PartialFrame {
        len: usize,
        frame_len: usize,
        remainder: usize,
    },
}

impl From<FrameError> for ReverseError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::ZeroFrameLength => {
                ReverseError::FormatError("frame size of zero".to_string())
            }
            FrameError::PartialFrame { len, frame_len, .. } => {
                ReverseError::TruncatedDataError { len, frame_len }
            }
        }
    }
}

/// Errors that can occur in the playback controller
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// File to load does not exist
    #[error("Audio file not found: {0}")]
    InputNotFound(PathBuf),

    /// File exists but could not be decoded into a playback graph
    #[error("Failed to load audio: {0}")]
    LoadFailed(String),

    /// Seek target outside `[0, duration]`
    #[error("Position {position_ms}ms outside 0..={duration_ms}ms")]
    ParameterOutOfRange { position_ms: i64, duration_ms: u64 },

    /// Operation needs a loaded session
    #[error("No audio loaded")]
    NotLoaded,
}

/// Result type for playback operations
pub type PlaybackResult<T> = Result<T, PlaybackError>;
