//! State bound to one loaded file

use std::path::{Path, PathBuf};

use super::graph::PlaybackGraph;
use crate::error::{PlaybackError, PlaybackResult};

/// Transport state of a loaded session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

/// What a clock advance did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing; the clock should stop
    Idle,
    /// Still playing, position moved
    Running,
    /// Reached the end and restarted from zero
    Looped,
    /// Reached the end and halted at the duration
    Finished,
}

/// One loaded file: its graph, transport and position
pub struct PlaybackSession {
    path: PathBuf,
    graph: PlaybackGraph,
    transport: TransportState,
    looping: bool,
    /// Fractional so sub-millisecond ticks accumulate
    position_ms: f64,
    duration_ms: u64,
}

impl PlaybackSession {
    pub fn new(path: &Path, graph: PlaybackGraph, looping: bool) -> Self {
        let duration_ms = graph.duration_ms();
        Self {
            path: path.to_path_buf(),
            graph,
            transport: TransportState::Stopped,
            looping,
            position_ms: 0.0,
            duration_ms,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn transport(&self) -> TransportState {
        self.transport
    }

    pub fn is_playing(&self) -> bool {
        self.transport == TransportState::Playing
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms as u64
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn graph_mut(&mut self) -> &mut PlaybackGraph {
        &mut self.graph
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn at_end(&self) -> bool {
        self.position_ms >= self.duration_ms as f64
    }

    /// Move the clock and re-anchor the graph's read cursor to match
    fn relocate(&mut self, position_ms: f64) {
        self.position_ms = position_ms;
        let frame = self.graph.frame_at_ms(position_ms);
        self.graph.seek_frame(frame);
    }

    /// Start playing, rewinding first if parked at the end
    pub fn play(&mut self) {
        if self.at_end() {
            self.relocate(0.0);
        }
        self.transport = TransportState::Playing;
    }

    pub fn pause(&mut self) {
        if self.transport == TransportState::Playing {
            self.transport = TransportState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.transport = TransportState::Stopped;
        self.relocate(0.0);
    }

    /// Move the cursor; out-of-range targets leave the session untouched
    pub fn seek(&mut self, position_ms: f64) -> PlaybackResult<()> {
        if !(0.0..=self.duration_ms as f64).contains(&position_ms) {
            return Err(PlaybackError::ParameterOutOfRange {
                position_ms: position_ms as i64,
                duration_ms: self.duration_ms,
            });
        }
        self.relocate(position_ms);
        Ok(())
    }

    /// Advance the clock by `elapsed_ms` of wall time, scaled by speed
    pub fn advance(&mut self, elapsed_ms: f64) -> TickOutcome {
        if !self.is_playing() {
            return TickOutcome::Idle;
        }
        self.position_ms = (self.position_ms + elapsed_ms * self.graph.speed())
            .min(self.duration_ms as f64);
        if self.at_end() {
            self.end_of_stream()
        } else {
            TickOutcome::Running
        }
    }

    /// Natural end of the source: loop back or halt pinned at the duration
    pub fn end_of_stream(&mut self) -> TickOutcome {
        if self.looping {
            self.relocate(0.0);
            self.transport = TransportState::Playing;
            TickOutcome::Looped
        } else {
            self.transport = TransportState::Stopped;
            self.position_ms = self.duration_ms as f64;
            TickOutcome::Finished
        }
    }

    /// Pull the next block of audio; silence unless playing
    pub fn render(&mut self, out_frames: usize) -> Vec<f32> {
        if !self.is_playing() {
            return vec![0.0; out_frames * self.graph.channels()];
        }
        self.graph.render(out_frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mono, 8 kHz, 1 second
    fn session() -> PlaybackSession {
        let graph = PlaybackGraph::from_samples(&vec![0i16; 8000], 1, 8000);
        PlaybackSession::new(Path::new("mem.wav"), graph, false)
    }

    #[test]
    fn test_new_session_is_stopped_at_zero() {
        let s = session();
        assert_eq!(s.transport(), TransportState::Stopped);
        assert_eq!(s.position_ms(), 0);
        assert_eq!(s.duration_ms(), 1000);
    }

    #[test]
    fn test_advance_only_while_playing() {
        let mut s = session();
        assert_eq!(s.advance(100.0), TickOutcome::Idle);
        assert_eq!(s.position_ms(), 0);

        s.play();
        assert_eq!(s.advance(100.0), TickOutcome::Running);
        assert_eq!(s.position_ms(), 100);
    }

    #[test]
    fn test_advance_scales_with_speed() {
        let mut s = session();
        s.graph_mut().set_speed(0.5);
        s.play();
        s.advance(100.0);
        assert_eq!(s.position_ms(), 50);
    }

    #[test]
    fn test_finish_pins_at_duration() {
        let mut s = session();
        s.play();
        assert_eq!(s.advance(2500.0), TickOutcome::Finished);
        assert_eq!(s.position_ms(), 1000);
        assert_eq!(s.transport(), TransportState::Stopped);

        // Playing from the end starts over
        s.play();
        assert_eq!(s.position_ms(), 0);
        assert!(s.is_playing());
    }

    #[test]
    fn test_loop_restarts() {
        let mut s = session();
        s.set_looping(true);
        s.play();
        assert_eq!(s.advance(1000.0), TickOutcome::Looped);
        assert_eq!(s.position_ms(), 0);
        assert!(s.is_playing());
    }

    #[test]
    fn test_seek_bounds() {
        let mut s = session();
        assert!(s.seek(1000.0).is_ok());
        assert!(s.seek(0.0).is_ok());
        assert!(s.seek(250.0).is_ok());
        assert!(matches!(
            s.seek(-1.0),
            Err(PlaybackError::ParameterOutOfRange { .. })
        ));
        assert!(s.seek(1001.0).is_err());
        assert!(s.seek(f64::NAN).is_err());
        assert_eq!(s.position_ms(), 250);
    }

    #[test]
    fn test_pause_keeps_position_stop_rewinds() {
        let mut s = session();
        s.play();
        s.advance(300.0);
        s.pause();
        assert_eq!(s.transport(), TransportState::Paused);
        assert_eq!(s.position_ms(), 300);

        s.stop();
        assert_eq!(s.transport(), TransportState::Stopped);
        assert_eq!(s.position_ms(), 0);
    }

    #[test]
    fn test_render_streams_and_transport_reanchors() {
        let mut s = session();
        s.play();
        s.render(128);
        s.render(128);
        assert_eq!(s.graph_mut().cursor(), 256);

        s.seek(500.0).unwrap();
        assert_eq!(s.graph_mut().cursor(), 4000);
        s.render(64);
        assert_eq!(s.graph_mut().cursor(), 4064);

        s.stop();
        assert_eq!(s.graph_mut().cursor(), 0);

        s.set_looping(true);
        s.play();
        s.render(64);
        s.end_of_stream();
        assert_eq!(s.graph_mut().cursor(), 0);
    }

    #[test]
    fn test_render_silent_when_not_playing() {
        let mut s = session();
        let out = s.render(64);
        assert_eq!(out.len(), 64);
        assert!(out.iter().all(|&x| x == 0.0));
    }
}
