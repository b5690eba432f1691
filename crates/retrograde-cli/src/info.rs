//! `retrograde info`

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use retrograde_core::decode::{BlockDecoder, SymphoniaDecoder};
use retrograde_core::wav;

/// Human-readable format summary of `path`
pub fn describe(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let mut out = String::new();

    if wav::is_riff_wave(&bytes) {
        match wav::parse(&bytes) {
            Ok((header, data_offset)) => {
                writeln!(out, "container:       WAV")?;
                writeln!(out, "format tag:      {}", header.format_tag)?;
                writeln!(out, "channels:        {}", header.channels)?;
                writeln!(out, "sample rate:     {} Hz", header.sample_rate)?;
                writeln!(out, "bits per sample: {}", header.bits_per_sample)?;
                writeln!(out, "block align:     {}", header.block_align)?;
                writeln!(out, "data offset:     {}", data_offset)?;
                writeln!(out, "frames:          {}", header.frame_count())?;
                write!(out, "duration:        {} ms", header.duration_ms())?;
                if header.check_fast_path().is_err() {
                    write!(out, "\n(not directly reversible, will be decoded)")?;
                }
                return Ok(out);
            }
            Err(e) => log::debug!("info: WAV header rejected ({}), probing decoders", e),
        }
    }

    let decoder = SymphoniaDecoder::open(path)
        .with_context(|| format!("Unrecognized audio file {:?}", path))?;
    let format = decoder.format();
    writeln!(out, "codec:           {}", format.codec)?;
    writeln!(out, "channels:        {}", format.channels)?;
    write!(out, "sample rate:     {} Hz", format.sample_rate)?;
    Ok(out)
}
