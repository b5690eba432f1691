//! Retrograde Core - Frame-accurate audio reversal and pitch/speed playback

pub mod channel;
pub mod command;
pub mod config;
pub mod decode;
pub mod error;
pub mod frames;
pub mod playback;
pub mod reverse;
pub mod timestretch;
pub mod wav;

pub use command::{PlaybackCommand, PlaybackReply, ReverseRequest};
pub use error::{PlaybackError, ReverseError, ReverseResult};
pub use playback::PlaybackController;
pub use reverse::{reverse, reverse_file};
