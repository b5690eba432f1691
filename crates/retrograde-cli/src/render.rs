//! `retrograde render`: run a file through the playback graph offline

use std::path::Path;

use anyhow::{Context, Result};

use retrograde_core::playback::{PlaybackGraph, PITCH_RANGE, SPEED_RANGE};
use retrograde_core::wav;

/// Frames pulled from the graph per iteration
const BLOCK_FRAMES: usize = 1024;

/// Render `input` at `pitch`/`speed` into a 16-bit WAV; returns frames written
pub fn run(input: &Path, output: &Path, pitch: f32, speed: f32) -> Result<usize> {
    let mut graph = PlaybackGraph::load(input)
        .with_context(|| format!("Failed to load {:?}", input))?;
    graph.set_pitch(pitch.clamp(*PITCH_RANGE.start(), *PITCH_RANGE.end()));
    graph.set_speed(speed.clamp(*SPEED_RANGE.start(), *SPEED_RANGE.end()));

    let mut rendered = Vec::new();
    while !graph.is_exhausted() {
        rendered.extend(graph.render(BLOCK_FRAMES));
    }
    // Cursor is at the end, so this flushes what the stretcher still holds
    let latency = graph.latency_frames();
    rendered.extend(graph.render(latency));
    log::debug!("render: flushed {} frames of stretcher latency", latency);

    let samples: Vec<i16> = rendered
        .iter()
        .map(|&s| (s * 32768.0).round().clamp(-32768.0, 32767.0) as i16)
        .collect();
    let frames = samples.len() / graph.channels();

    let bytes = wav::encode_pcm16(graph.sample_rate(), graph.channels() as u16, &samples)
        .context("Failed to encode rendered audio")?;
    std::fs::write(output, bytes).with_context(|| format!("Failed to write {:?}", output))?;

    log::info!("render: wrote {} frames to {}", frames, output.display());
    Ok(frames)
}
