//! Block decode pipeline for compressed inputs
//!
//! Anything that isn't a plain PCM WAV goes through here. A [`BlockDecoder`]
//! is stepped until it reports end-of-stream; every non-empty block it emits
//! is appended to an ordered list. Arrival order is temporal order, so the
//! list is never reordered before reversal.
//!
//! Track format (sample rate, channels, codec) is read once when the decoder
//! is opened and trusted for the rest of the stream. A decoder reporting a
//! new format mid-stream gets a warning and decoding carries on with the
//! original geometry. Later blocks may then use a different channel layout;
//! that case is surfaced only when the sample total no longer divides.

mod symphonia_decoder;

pub use symphonia_decoder::SymphoniaDecoder;

use crate::error::{ReverseError, ReverseResult};
use crate::frames;

/// Stream parameters read from the source track before decoding starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Short codec identifier (e.g. "mp3", "aac", "flac")
    pub codec: String,
}

/// Interleaved 16-bit PCM produced by one decode iteration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedBlock {
    pub samples: Vec<i16>,
}

impl DecodedBlock {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Outcome of one decoder iteration
#[derive(Debug)]
pub enum DecoderStep {
    /// Decoded samples, in stream order
    Block(DecodedBlock),
    /// Decoder reported different output parameters than the track advertised
    FormatChanged(TrackFormat),
    /// Input consumed without output (other track, priming, corrupt packet)
    Skipped,
    /// Output side drained, nothing more will come
    EndOfStream,
}

/// A decoder that can be stepped one block at a time
///
/// Each call to [`step`](BlockDecoder::step) feeds the decoder with whatever
/// input it needs and drains at most one output block.
pub trait BlockDecoder {
    /// Format advertised by the source track
    fn format(&self) -> &TrackFormat;

    /// Advance the decoder by one iteration
    fn step(&mut self) -> ReverseResult<DecoderStep>;
}

/// All blocks of a fully decoded stream plus the format they were read with
#[derive(Debug)]
pub struct DecodedStream {
    pub format: TrackFormat,
    pub blocks: Vec<DecodedBlock>,
}

impl DecodedStream {
    /// Total samples across all blocks
    pub fn sample_count(&self) -> usize {
        self.blocks.iter().map(DecodedBlock::len).sum()
    }

    /// Concatenate blocks in arrival order and reverse by sample frame
    ///
    /// Consumes the stream; the blocks are released once flattened.
    pub fn into_reversed(self) -> ReverseResult<Vec<i16>> {
        let channels = usize::from(self.format.channels);
        let blocks: Vec<Vec<i16>> = self.blocks.into_iter().map(|b| b.samples).collect();
        Ok(frames::reverse_blocks(&blocks, channels)?)
    }
}

/// Drive `decoder` to end-of-stream, collecting blocks in arrival order
///
/// Fails with [`ReverseError::EmptyStreamError`] if no samples came out.
pub fn decode_all<D: BlockDecoder + ?Sized>(decoder: &mut D) -> ReverseResult<DecodedStream> {
    let format = decoder.format().clone();
    log::info!(
        "decode: {} stream, {} Hz, {} channel(s)",
        format.codec,
        format.sample_rate,
        format.channels
    );

    let mut blocks = Vec::new();
    let mut skipped = 0usize;

    loop {
        match decoder.step()? {
            DecoderStep::Block(block) => {
                if !block.is_empty() {
                    blocks.push(block);
                }
            }
            DecoderStep::FormatChanged(changed) => {
                log::warn!(
                    "decode: output format changed mid-stream to {} Hz, {} channel(s); keeping {} Hz, {} channel(s)",
                    changed.sample_rate,
                    changed.channels,
                    format.sample_rate,
                    format.channels
                );
            }
            DecoderStep::Skipped => skipped += 1,
            DecoderStep::EndOfStream => break,
        }
    }

    if blocks.is_empty() {
        return Err(ReverseError::EmptyStreamError);
    }

    let stream = DecodedStream { format, blocks };
    log::debug!(
        "decode: {} block(s), {} samples, {} skipped iteration(s)",
        stream.blocks.len(),
        stream.sample_count(),
        skipped
    );
    Ok(stream)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted decoder replaying a fixed list of steps
    pub(crate) struct ScriptedDecoder {
        format: TrackFormat,
        steps: VecDeque<DecoderStep>,
    }

    impl ScriptedDecoder {
        pub(crate) fn new(channels: u16, steps: Vec<DecoderStep>) -> Self {
            Self {
                format: TrackFormat {
                    sample_rate: 8000,
                    channels,
                    codec: "synthetic".to_string(),
                },
                steps: steps.into(),
            }
        }

        /// Mono decoder emitting `count` blocks of `size` consecutive numbers
        pub(crate) fn numbered(count: usize, size: usize) -> Self {
            let steps = (0..count)
                .map(|b| {
                    let start = (b * size) as i16;
                    DecoderStep::Block(DecodedBlock::new((start..start + size as i16).collect()))
                })
                .collect();
            Self::new(1, steps)
        }
    }

    impl BlockDecoder for ScriptedDecoder {
        fn format(&self) -> &TrackFormat {
            &self.format
        }

        fn step(&mut self) -> ReverseResult<DecoderStep> {
            Ok(self.steps.pop_front().unwrap_or(DecoderStep::EndOfStream))
        }
    }

    #[test]
    fn test_blocks_kept_in_arrival_order() {
        let mut decoder = ScriptedDecoder::numbered(4, 3);
        let stream = decode_all(&mut decoder).unwrap();

        assert_eq!(stream.blocks.len(), 4);
        assert_eq!(stream.blocks[0].samples, vec![0, 1, 2]);
        assert_eq!(stream.blocks[3].samples, vec![9, 10, 11]);
        assert_eq!(stream.sample_count(), 12);
    }

    #[test]
    fn test_reversed_first_sample_is_source_last() {
        let mut decoder = ScriptedDecoder::numbered(5, 7);
        let reversed = decode_all(&mut decoder).unwrap().into_reversed().unwrap();

        assert_eq!(reversed.len(), 35);
        assert_eq!(reversed[0], 34);
        assert_eq!(reversed[34], 0);
        assert!(reversed.windows(2).all(|w| w[0] == w[1] + 1));
    }

    #[test]
    fn test_stereo_frames_stay_intact() {
        let mut decoder = ScriptedDecoder::new(
            2,
            vec![
                DecoderStep::Block(DecodedBlock::new(vec![1, -1, 2])),
                DecoderStep::Block(DecodedBlock::new(vec![-2, 3, -3])),
            ],
        );
        let reversed = decode_all(&mut decoder).unwrap().into_reversed().unwrap();
        assert_eq!(reversed, vec![3, -3, 2, -2, 1, -1]);
    }

    #[test]
    fn test_skips_and_empty_blocks_ignored() {
        let mut decoder = ScriptedDecoder::new(
            1,
            vec![
                DecoderStep::Skipped,
                DecoderStep::Block(DecodedBlock::default()),
                DecoderStep::Block(DecodedBlock::new(vec![5])),
                DecoderStep::Skipped,
            ],
        );
        let stream = decode_all(&mut decoder).unwrap();
        assert_eq!(stream.blocks, vec![DecodedBlock::new(vec![5])]);
    }

    #[test]
    fn test_format_change_keeps_original_geometry() {
        let mut decoder = ScriptedDecoder::new(
            2,
            vec![
                DecoderStep::Block(DecodedBlock::new(vec![1, 2])),
                DecoderStep::FormatChanged(TrackFormat {
                    sample_rate: 48000,
                    channels: 1,
                    codec: "synthetic".to_string(),
                }),
                DecoderStep::Block(DecodedBlock::new(vec![3, 4])),
            ],
        );
        let stream = decode_all(&mut decoder).unwrap();
        assert_eq!(stream.format.channels, 2);
        assert_eq!(stream.format.sample_rate, 8000);
        assert_eq!(stream.into_reversed().unwrap(), vec![3, 4, 1, 2]);
    }

    #[test]
    fn test_format_change_leaving_partial_frame_fails() {
        let mut decoder = ScriptedDecoder::new(
            2,
            vec![
                DecoderStep::Block(DecodedBlock::new(vec![1, 2])),
                DecoderStep::FormatChanged(TrackFormat {
                    sample_rate: 8000,
                    channels: 1,
                    codec: "synthetic".to_string(),
                }),
                DecoderStep::Block(DecodedBlock::new(vec![3])),
            ],
        );
        let stream = decode_all(&mut decoder).unwrap();
        assert!(matches!(
            stream.into_reversed(),
            Err(ReverseError::TruncatedDataError { len: 3, frame_len: 2 })
        ));
    }

    #[test]
    fn test_no_blocks_is_empty_stream() {
        let mut decoder = ScriptedDecoder::new(2, vec![DecoderStep::Skipped]);
        assert!(matches!(
            decode_all(&mut decoder),
            Err(ReverseError::EmptyStreamError)
        ));
    }
}
