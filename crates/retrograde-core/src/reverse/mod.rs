//! Reversal orchestrator
//!
//! Picks a strategy from the input's content and owns the all-or-nothing
//! output contract:
//!
//! - **WAV fast path**: linear PCM WAV is parsed, its data chunk reversed
//!   frame by frame as raw bytes, and written back with the same header
//!   field values.
//! - **Decode path**: everything else is decoded to 16-bit PCM blocks,
//!   reversed by sample frame, and written as a canonical PCM WAV. The
//!   original compressed format is not preserved.
//!
//! Output is staged in a temporary file beside `output` and renamed into
//! place only after every stage succeeded, so a failed run never leaves a
//! truncated file at the destination.

pub mod service;

pub use service::{ReverseClient, ReverseCommand, ReverseService};

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::decode::{self, BlockDecoder, SymphoniaDecoder};
use crate::error::{ReverseError, ReverseResult};
use crate::frames;
use crate::wav::{self, WavHeader};

/// How an input was reversed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Raw byte frames of a PCM WAV
    WavFastPath,
    /// Decoded to 16-bit PCM and re-encoded as WAV
    Decode,
}

/// What a successful reversal produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseSummary {
    pub strategy: Strategy,
    /// Header of the written file
    pub header: WavHeader,
}

/// Reverse `input` into `output`, collapsing every failure to `false`
///
/// The error is logged; nothing is written at `output` unless the whole
/// pipeline succeeded.
pub fn reverse(input: impl AsRef<Path>, output: impl AsRef<Path>) -> bool {
    let (input, output) = (input.as_ref(), output.as_ref());
    match reverse_file(input, output) {
        Ok(summary) => {
            log::info!(
                "reverse: wrote {} ({:?}, {} frames)",
                output.display(),
                summary.strategy,
                summary.header.frame_count()
            );
            true
        }
        Err(e) => {
            log::error!("reverse: {} -> {} failed: {}", input.display(), output.display(), e);
            false
        }
    }
}

/// Reverse `input` into `output`, reporting the typed failure
pub fn reverse_file(input: &Path, output: &Path) -> ReverseResult<ReverseSummary> {
    if !input.is_file() {
        return Err(ReverseError::InputNotFound(input.to_path_buf()));
    }

    let (bytes, summary) = match fast_path_bytes(input)? {
        Some(contents) => {
            let (bytes, header) = reverse_wav_bytes(&contents)?;
            (bytes, ReverseSummary { strategy: Strategy::WavFastPath, header })
        }
        None => {
            let mut decoder = SymphoniaDecoder::open(input)?;
            let (bytes, header) = reverse_decoded(&mut decoder)?;
            (bytes, ReverseSummary { strategy: Strategy::Decode, header })
        }
    };

    write_atomically(output, &bytes)?;
    Ok(summary)
}

/// Whole-file contents if `input` qualifies for the fast path
///
/// Sniffs the RIFF/WAVE magic first so compressed inputs aren't slurped. A
/// WAV the raw byte path can't handle (ADPCM, µ-law, 64-bit float, odd
/// block alignment) returns `None` and goes to the decoder.
fn fast_path_bytes(input: &Path) -> ReverseResult<Option<Vec<u8>>> {
    let mut magic = [0u8; 12];
    let read = File::open(input)
        .and_then(|mut f| read_prefix(&mut f, &mut magic))
        .map_err(|e| ReverseError::FormatError(format!("reading {}: {}", input.display(), e)))?;
    if !wav::is_riff_wave(&magic[..read]) {
        return Ok(None);
    }

    let contents = std::fs::read(input)
        .map_err(|e| ReverseError::FormatError(format!("reading {}: {}", input.display(), e)))?;
    let (header, _) = wav::parse(&contents)?;
    if let Err(e) = header.check_fast_path() {
        log::info!("reverse: {}, decoding instead", e);
        return Ok(None);
    }
    Ok(Some(contents))
}

fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Reverse a complete PCM WAV file held in memory
pub fn reverse_wav_bytes(contents: &[u8]) -> ReverseResult<(Vec<u8>, WavHeader)> {
    let (header, offset) = wav::parse(contents)?;
    header.check_fast_path()?;

    let data = &contents[offset..offset + header.data_len as usize];
    let reversed = frames::reverse_frames(data, header.frame_size())?;
    let bytes = wav::serialize(&header, &reversed)?;
    Ok((bytes, header))
}

/// Decode everything, reverse by sample frame, encode as 16-bit PCM WAV
pub fn reverse_decoded<D: BlockDecoder + ?Sized>(
    decoder: &mut D,
) -> ReverseResult<(Vec<u8>, WavHeader)> {
    let stream = decode::decode_all(decoder)?;
    let (sample_rate, channels) = (stream.format.sample_rate, stream.format.channels);
    let reversed = stream.into_reversed()?;

    let bytes = wav::encode_pcm16(sample_rate, channels, &reversed)?;
    let header = WavHeader::pcm16(sample_rate, channels, (reversed.len() * 2) as u32);
    Ok((bytes, header))
}

/// Write `bytes` to a staging file beside `output`, then rename over it
fn write_atomically(output: &Path, bytes: &[u8]) -> ReverseResult<()> {
    let write_err = |source: std::io::Error| ReverseError::WriteError {
        path: output.to_path_buf(),
        source,
    };

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut staged = NamedTempFile::new_in(&dir).map_err(write_err)?;
    staged.write_all(bytes).map_err(write_err)?;
    staged.as_file().sync_all().map_err(write_err)?;
    staged.persist(output).map_err(|e| write_err(e.error))?;
    Ok(())
}
