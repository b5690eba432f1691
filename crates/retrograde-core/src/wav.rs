//! RIFF/WAVE container handling
//!
//! Parses the header of an uncompressed WAV file held in memory and writes
//! the canonical 44-byte layout back out:
//!
//! ```text
//! offset  size  field
//!      0     4  "RIFF"
//!      4     4  RIFF size (file length - 8)
//!      8     4  "WAVE"
//!     12     4  "fmt "
//!     16     4  fmt chunk size (16)
//!     20     2  format code
//!     22     2  channels
//!     24     4  sample rate
//!     28     4  byte rate
//!     32     2  block align
//!     34     2  bits per sample
//!     36     4  "data"
//!     40     4  data length
//!     44     …  interleaved PCM
//! ```
//!
//! Reading walks the chunk list rather than assuming those offsets, so files
//! carrying `LIST`/`fact`/`bext` chunks parse too. Writing always produces
//! the layout above; metadata chunks are not carried over.

use crate::error::{ReverseError, ReverseResult};

/// Size of the canonical header written by [`serialize`]
pub const CANONICAL_HEADER_LEN: usize = 44;

/// Integer PCM
pub const FORMAT_PCM: u16 = 1;
/// IEEE float
pub const FORMAT_IEEE_FLOAT: u16 = 3;
/// WAVE_FORMAT_EXTENSIBLE, real tag lives in the sub-format GUID
pub const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Largest data chunk that still fits a 32-bit RIFF size
const MAX_DATA_LEN: usize = (u32::MAX as usize) - (CANONICAL_HEADER_LEN - 8) - 1;

/// Header fields from the fmt and data chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// Audio format tag (1 = PCM, 3 = IEEE float); extensible files are
    /// resolved to their sub-format tag
    pub format_tag: u16,
    /// Number of interleaved channels (1-255)
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Declared bytes per second
    pub byte_rate: u32,
    /// Declared bytes per frame
    pub block_align: u16,
    /// Bits per sample (8, 16, 24 or 32)
    pub bits_per_sample: u16,
    /// Declared data chunk length in bytes
    pub data_len: u32,
}

impl WavHeader {
    /// Header for 16-bit integer PCM output from the decode path
    pub fn pcm16(sample_rate: u32, channels: u16, data_len: u32) -> Self {
        let block_align = channels * 2;
        Self {
            format_tag: FORMAT_PCM,
            channels,
            sample_rate,
            byte_rate: sample_rate * u32::from(block_align),
            block_align,
            bits_per_sample: 16,
            data_len,
        }
    }

    /// Bytes per frame: `channels × bits_per_sample / 8`
    pub fn frame_size(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bits_per_sample / 8)
    }

    /// Whole frames in the data chunk
    pub fn frame_count(&self) -> u64 {
        match self.frame_size() {
            0 => 0,
            size => u64::from(self.data_len) / size as u64,
        }
    }

    /// Duration of the data chunk in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frame_count() * 1000 / u64::from(self.sample_rate)
    }

    /// True for integer PCM and IEEE float, the encodings reversible byte-wise
    pub fn is_linear_pcm(&self) -> bool {
        matches!(self.format_tag, FORMAT_PCM | FORMAT_IEEE_FLOAT)
    }

    /// Check that the data can be reversed as raw frames
    pub fn check_fast_path(&self) -> ReverseResult<()> {
        if !self.is_linear_pcm() {
            return Err(ReverseError::FormatError(format!(
                "format tag {:#06x} is not linear PCM",
                self.format_tag
            )));
        }
        if !matches!(self.bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(ReverseError::FormatError(format!(
                "unsupported bit depth: {}",
                self.bits_per_sample
            )));
        }
        if usize::from(self.block_align) != self.frame_size() {
            return Err(ReverseError::FormatError(format!(
                "block align {} disagrees with {} channels × {} bits",
                self.block_align, self.channels, self.bits_per_sample
            )));
        }
        Ok(())
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// True if the buffer starts with the RIFF/WAVE magic
pub fn is_riff_wave(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Parse a complete WAV file held in memory
///
/// Returns the header and the byte offset of the first sample. Fails with
/// [`ReverseError::FormatError`] when the magic is missing, when declared
/// sizes run past the end of the buffer, when fmt/data chunks are missing,
/// or when channels or bits-per-sample is zero.
pub fn parse(bytes: &[u8]) -> ReverseResult<(WavHeader, usize)> {
    if bytes.len() < 12 {
        return Err(ReverseError::FormatError(format!(
            "file too short for a RIFF header ({} bytes)",
            bytes.len()
        )));
    }
    if &bytes[0..4] != b"RIFF" {
        return Err(ReverseError::FormatError("Not a RIFF file".into()));
    }
    if &bytes[8..12] != b"WAVE" {
        return Err(ReverseError::FormatError("Not a WAVE file".into()));
    }

    let riff_size = read_u32(bytes, 4) as usize;
    let riff_end = riff_size.saturating_add(8);
    if riff_end > bytes.len() {
        return Err(ReverseError::FormatError(format!(
            "RIFF size {} exceeds file length {}",
            riff_size,
            bytes.len()
        )));
    }

    let mut fmt: Option<WavHeader> = None;
    let mut data: Option<(usize, u32)> = None;
    let mut pos = 12;

    while pos + 8 <= riff_end && (fmt.is_none() || data.is_none()) {
        let chunk_id = &bytes[pos..pos + 4];
        let chunk_size = read_u32(bytes, pos + 4);
        let body = pos + 8;
        let body_end = body.saturating_add(chunk_size as usize);

        if body_end > riff_end {
            return Err(ReverseError::FormatError(format!(
                "chunk {:?} at offset {} overruns the file",
                String::from_utf8_lossy(chunk_id),
                pos
            )));
        }

        match chunk_id {
            b"fmt " => fmt = Some(parse_fmt(&bytes[body..body_end])?),
            b"data" => data = Some((body, chunk_size)),
            other => log::debug!(
                "wav: skipping {:?} chunk ({} bytes)",
                String::from_utf8_lossy(other),
                chunk_size
            ),
        }

        // Chunks are word aligned
        pos = body_end + (chunk_size as usize & 1);
    }

    let mut header = fmt.ok_or_else(|| ReverseError::FormatError("missing fmt chunk".into()))?;
    let (data_offset, data_len) =
        data.ok_or_else(|| ReverseError::FormatError("missing data chunk".into()))?;
    header.data_len = data_len;

    Ok((header, data_offset))
}

fn parse_fmt(fmt: &[u8]) -> ReverseResult<WavHeader> {
    if fmt.len() < 16 {
        return Err(ReverseError::FormatError(format!(
            "fmt chunk too small ({} bytes)",
            fmt.len()
        )));
    }

    let mut format_tag = read_u16(fmt, 0);
    let channels = read_u16(fmt, 2);
    let sample_rate = read_u32(fmt, 4);
    let byte_rate = read_u32(fmt, 8);
    let block_align = read_u16(fmt, 12);
    let bits_per_sample = read_u16(fmt, 14);

    if format_tag == FORMAT_EXTENSIBLE {
        // cbSize(2) validBits(2) channelMask(4) then the GUID, whose first
        // two bytes carry the plain format code
        if fmt.len() < 40 {
            return Err(ReverseError::FormatError(
                "extensible fmt chunk too small".into(),
            ));
        }
        format_tag = read_u16(fmt, 24);
    }

    if channels == 0 || channels > 255 {
        return Err(ReverseError::FormatError(format!(
            "channel count {} outside 1..=255",
            channels
        )));
    }
    if bits_per_sample == 0 {
        return Err(ReverseError::FormatError("bits per sample is zero".into()));
    }
    if sample_rate == 0 {
        return Err(ReverseError::FormatError("sample rate is zero".into()));
    }

    Ok(WavHeader {
        format_tag,
        channels,
        sample_rate,
        byte_rate,
        block_align,
        bits_per_sample,
        data_len: 0,
    })
}

/// Write the canonical 44-byte header followed by `data`
///
/// Header field values are taken from `header` as-is, except the data length
/// which always reflects `data.len()`. Odd-length data gets the RIFF pad byte.
pub fn serialize(header: &WavHeader, data: &[u8]) -> ReverseResult<Vec<u8>> {
    if data.len() > MAX_DATA_LEN {
        return Err(ReverseError::FormatError(format!(
            "{} bytes of audio exceed the 4GB RIFF limit",
            data.len()
        )));
    }

    let data_len = data.len() as u32;
    let pad = data.len() & 1;
    let riff_size = (CANONICAL_HEADER_LEN - 8) as u32 + data_len + pad as u32;

    let mut out = Vec::with_capacity(CANONICAL_HEADER_LEN + data.len() + pad);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&header.format_tag.to_le_bytes());
    out.extend_from_slice(&header.channels.to_le_bytes());
    out.extend_from_slice(&header.sample_rate.to_le_bytes());
    out.extend_from_slice(&header.byte_rate.to_le_bytes());
    out.extend_from_slice(&header.block_align.to_le_bytes());
    out.extend_from_slice(&header.bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(data);
    if pad == 1 {
        out.push(0);
    }

    Ok(out)
}

/// Encode interleaved 16-bit samples as a canonical PCM WAV file
pub fn encode_pcm16(sample_rate: u32, channels: u16, samples: &[i16]) -> ReverseResult<Vec<u8>> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    let data_len = u32::try_from(data.len()).map_err(|_| {
        ReverseError::FormatError(format!(
            "{} bytes of audio exceed the 4GB RIFF limit",
            data.len()
        ))
    })?;
    serialize(&WavHeader::pcm16(sample_rate, channels, data_len), &data)
}
