//! [`BlockDecoder`] backed by symphonia's format and codec registries

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{BlockDecoder, DecodedBlock, DecoderStep, TrackFormat};
use crate::error::{ReverseError, ReverseResult};

/// Sample rate and channel count of decoded output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputGeometry {
    sample_rate: u32,
    channels: u16,
}

impl OutputGeometry {
    fn of_spec(spec: &SignalSpec) -> Self {
        Self {
            sample_rate: spec.rate,
            channels: spec.channels.count() as u16,
        }
    }

    fn of_track(format: &TrackFormat) -> Self {
        Self {
            sample_rate: format.sample_rate,
            channels: format.channels,
        }
    }
}

/// Decodes the first audio track of any container symphonia can recognize
pub struct SymphoniaDecoder {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    format: TrackFormat,
    /// Geometry of the most recent output, starting from what the track
    /// advertised
    geometry: OutputGeometry,
    /// Reused conversion buffer, its capacity in frames and its spec
    sample_buf: Option<(SampleBuffer<i16>, u64, SignalSpec)>,
    /// Block held back while a format change is reported
    pending: Option<DecodedBlock>,
}

impl SymphoniaDecoder {
    /// Probe `path` and set up a decoder for its first audio track
    pub fn open(path: &Path) -> ReverseResult<Self> {
        let file = File::open(path)
            .map_err(|e| ReverseError::DecodeError(format!("{}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| ReverseError::FormatError(format!("unrecognized container: {}", e)))?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| ReverseError::DecodeError("No audio track found".to_string()))?;

        let params = &track.codec_params;
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| ReverseError::DecodeError("track has no sample rate".to_string()))?;
        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| ReverseError::DecodeError("track has no channel layout".to_string()))?;
        if channels == 0 {
            return Err(ReverseError::DecodeError("track has zero channels".to_string()));
        }
        let codec = symphonia::default::get_codecs()
            .get_codec(params.codec)
            .map(|d| d.short_name.to_string())
            .unwrap_or_else(|| format!("{:?}", params.codec));

        let decoder = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| ReverseError::DecodeError(format!("decoder setup failed: {}", e)))?;

        let track_id = track.id;
        let format = TrackFormat {
            sample_rate,
            channels,
            codec,
        };

        Ok(Self {
            reader,
            decoder,
            track_id,
            geometry: OutputGeometry::of_track(&format),
            format,
            sample_buf: None,
            pending: None,
        })
    }
}

impl BlockDecoder for SymphoniaDecoder {
    fn format(&self) -> &TrackFormat {
        &self.format
    }

    fn step(&mut self) -> ReverseResult<DecoderStep> {
        if let Some(block) = self.pending.take() {
            return Ok(DecoderStep::Block(block));
        }

        let packet = match self.reader.next_packet() {
            Ok(packet) => packet,
            Err(e) => return read_error_step(e),
        };

        if packet.track_id() != self.track_id {
            return Ok(DecoderStep::Skipped);
        }

        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::warn!("decode: dropping corrupt packet: {}", msg);
                return Ok(DecoderStep::Skipped);
            }
            Err(e) => {
                return Err(ReverseError::DecodeError(format!("decoding packet: {}", e)));
            }
        };

        if decoded.frames() == 0 {
            return Ok(DecoderStep::Skipped);
        }

        let spec = *decoded.spec();
        let observed = OutputGeometry::of_spec(&spec);
        let changed = observed != self.geometry;
        self.geometry = observed;

        let capacity = decoded.capacity() as u64;
        let reuse = matches!(
            &self.sample_buf,
            Some((_, frames, buf_spec)) if *frames >= capacity && *buf_spec == spec
        );
        if !reuse {
            self.sample_buf = Some((SampleBuffer::new(capacity, spec), capacity, spec));
        }

        let block = match self.sample_buf.as_mut() {
            Some((buf, _, _)) => {
                buf.copy_interleaved_ref(decoded);
                DecodedBlock::new(buf.samples().to_vec())
            }
            None => return Ok(DecoderStep::Skipped),
        };

        if changed {
            self.pending = Some(block);
            return Ok(DecoderStep::FormatChanged(TrackFormat {
                sample_rate: observed.sample_rate,
                channels: observed.channels,
                codec: self.format.codec.clone(),
            }));
        }

        Ok(DecoderStep::Block(block))
    }
}

/// Map a packet read failure to a decoder step
///
/// Only a clean EOF ends the stream. A reset request means the stream was
/// chained or restarted; continuing would reverse a truncated signal, so it
/// fails the decode.
fn read_error_step(err: SymphoniaError) -> ReverseResult<DecoderStep> {
    match err {
        SymphoniaError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Ok(DecoderStep::EndOfStream)
        }
        SymphoniaError::ResetRequired => {
            log::error!("decode: stream requires a decoder reset (chained stream)");
            Err(ReverseError::DecodeError(
                "stream requires a decoder reset mid-file".to_string(),
            ))
        }
        e => Err(ReverseError::DecodeError(format!("reading packet: {}", e))),
    }
}
