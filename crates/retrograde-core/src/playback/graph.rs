//! Playback graph: decoded source feeding the pitch/rate stage

use std::path::Path;

use crate::decode::{decode_all, SymphoniaDecoder};
use crate::error::{PlaybackError, PlaybackResult};
use crate::timestretch::TimeStretcher;

/// Fully decoded source plus its time stretcher
///
/// Audio is pulled block by block from a read cursor. Each [`render`]
/// consumes the source frames following the previous one, so the
/// stretcher sees one continuous stream until [`seek_frame`] re-anchors it.
///
/// [`render`]: PlaybackGraph::render
/// [`seek_frame`]: PlaybackGraph::seek_frame
pub struct PlaybackGraph {
    /// Interleaved samples normalized to [-1.0, 1.0)
    source: Vec<f32>,
    channels: usize,
    sample_rate: u32,
    stretcher: TimeStretcher,
    /// Next source frame to feed the stretcher
    cursor: usize,
}

impl PlaybackGraph {
    /// Decode `path` into a new graph
    pub fn load(path: &Path) -> PlaybackResult<Self> {
        if !path.is_file() {
            return Err(PlaybackError::InputNotFound(path.to_path_buf()));
        }

        let mut decoder =
            SymphoniaDecoder::open(path).map_err(|e| PlaybackError::LoadFailed(e.to_string()))?;
        let stream = decode_all(&mut decoder).map_err(|e| PlaybackError::LoadFailed(e.to_string()))?;

        let samples: Vec<i16> = stream
            .blocks
            .into_iter()
            .flat_map(|block| block.samples)
            .collect();

        log::debug!(
            "playback: decoded {} ({} Hz, {} ch, {})",
            path.display(),
            stream.format.sample_rate,
            stream.format.channels,
            stream.format.codec
        );

        Ok(Self::from_samples(
            &samples,
            stream.format.channels,
            stream.format.sample_rate,
        ))
    }

    /// Build a graph over interleaved 16-bit samples
    pub fn from_samples(samples: &[i16], channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        Self {
            source: samples[..whole]
                .iter()
                .map(|&s| s as f32 / 32768.0)
                .collect(),
            channels: channels as usize,
            sample_rate,
            stretcher: TimeStretcher::new(channels, sample_rate),
            cursor: 0,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.source.len() / self.channels
    }

    /// Source length in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frame_count() as u64 * 1000 / self.sample_rate as u64
    }

    /// Source frame at a millisecond position
    pub fn frame_at_ms(&self, position_ms: f64) -> usize {
        let frame = (position_ms.max(0.0) * self.sample_rate as f64 / 1000.0) as usize;
        frame.min(self.frame_count())
    }

    pub fn set_pitch(&mut self, ratio: f32) {
        self.stretcher.set_pitch_ratio(ratio as f64);
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.stretcher.set_speed(speed as f64);
    }

    pub fn speed(&self) -> f64 {
        self.stretcher.speed()
    }

    /// Stretcher delay between input and output, in frames
    pub fn latency_frames(&self) -> usize {
        self.stretcher.input_latency() + self.stretcher.output_latency()
    }

    /// Read cursor in source frames
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// True once the cursor has consumed the whole source
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.frame_count()
    }

    /// Move the read cursor and drop stretcher history
    pub fn seek_frame(&mut self, frame: usize) {
        self.cursor = frame.min(self.frame_count());
        self.stretcher.reset();
    }

    /// Render the next `out_frames` interleaved frames
    ///
    /// Consumes `speed × out_frames` source frames from the cursor. Past the
    /// end of the source the stretcher is flushed, then silence follows.
    pub fn render(&mut self, out_frames: usize) -> Vec<f32> {
        let ch = self.channels;
        let mut output = vec![0.0; out_frames * ch];

        let start = self.cursor;
        let end = (start + self.stretcher.input_frames_for(out_frames)).min(self.frame_count());

        if start == end {
            self.stretcher.flush(&mut output);
        } else {
            self.stretcher
                .process(&self.source[start * ch..end * ch], &mut output);
        }
        self.cursor = end;
        output
    }
}
