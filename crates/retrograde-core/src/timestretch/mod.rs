//! Pitch and rate transform via signalsmith-stretch
//!
//! Pitch is applied as a transpose factor inside the stretcher. Speed is not
//! a stretcher parameter: the caller feeds `input_frames_for(output)` source
//! frames per block and the stretcher compresses or expands them to fill the
//! output, so tempo follows the speed ratio while pitch stays independent.

use signalsmith_stretch::Stretch;

/// Time stretcher for the playback graph
///
/// Works on interleaved `f32` buffers with any channel count.
pub struct TimeStretcher {
    /// The underlying signalsmith stretcher
    stretcher: Stretch,
    channels: usize,
    /// Playback rate (source frames consumed per output frame)
    speed: f64,
    /// Pitch ratio (2.0 = one octave up)
    pitch_ratio: f64,
}

impl TimeStretcher {
    /// Create a stretcher for `channels` interleaved channels
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        Self {
            stretcher: Stretch::preset_default(channels as u32, sample_rate),
            channels: channels as usize,
            speed: 1.0,
            pitch_ratio: 1.0,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Set the playback rate
    ///
    /// speed > 1.0: more source frames per output block (faster)
    /// speed < 1.0: fewer source frames per output block (slower)
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.max(f64::EPSILON);
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Set the pitch as a frequency ratio
    pub fn set_pitch_ratio(&mut self, ratio: f64) {
        self.pitch_ratio = ratio.max(f64::EPSILON);
        // None for tonality_limit means no limit on formant preservation
        self.stretcher
            .set_transpose_factor_semitones(Self::semitones(self.pitch_ratio) as f32, None);
    }

    pub fn pitch_ratio(&self) -> f64 {
        self.pitch_ratio
    }

    /// Semitone offset of a frequency ratio
    pub fn semitones(ratio: f64) -> f64 {
        12.0 * ratio.log2()
    }

    /// Source frames needed to produce `output_frames` at the current speed
    pub fn input_frames_for(&self, output_frames: usize) -> usize {
        (output_frames as f64 * self.speed).round() as usize
    }

    /// Get the input latency in samples
    pub fn input_latency(&self) -> usize {
        self.stretcher.input_latency()
    }

    /// Get the output latency in samples
    pub fn output_latency(&self) -> usize {
        self.stretcher.output_latency()
    }

    /// Reset the stretcher state (after a seek)
    pub fn reset(&mut self) {
        self.stretcher.reset();
    }

    /// Process interleaved audio
    ///
    /// The stretch ratio is input length / output length. Both slices must
    /// hold whole frames.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        output.fill(0.0);
        if input.is_empty() {
            return;
        }
        let input_len = input.len() - input.len() % self.channels;
        let output_len = output.len() - output.len() % self.channels;
        self.stretcher
            .process(&input[..input_len], &mut output[..output_len]);
    }

    /// Flush any remaining audio from the stretcher
    pub fn flush(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        let output_len = output.len() - output.len() % self.channels;
        self.stretcher.flush(&mut output[..output_len]);
    }
}
