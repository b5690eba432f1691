//! Playback controller with runtime pitch and speed
//!
//! The controller owns at most one [`PlaybackSession`]. Loading tears the
//! previous session down (clock cancelled, graph released) before the new
//! file is decoded. Pitch, speed and the loop flag are controller settings:
//! they apply to the live session immediately and carry over to the next
//! load.
//!
//! Position is driven by a [`PositionTimer`] that runs only while playing.
//! Every transition out of playing cancels it before touching the session.

mod graph;
mod session;
mod timer;

pub use graph::PlaybackGraph;
pub use session::{PlaybackSession, TickOutcome, TransportState};
pub use timer::{PositionTimer, SharedSession};

use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::command::{PlaybackCommand, PlaybackReply};
use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, PlaybackResult};

/// Accepted pitch ratios (1.0 = unchanged, 2.0 = one octave up)
pub const PITCH_RANGE: RangeInclusive<f32> = 0.5..=2.0;

/// Accepted speed ratios
pub const SPEED_RANGE: RangeInclusive<f32> = 0.25..=4.0;

fn clamp_to(value: f64, range: &RangeInclusive<f32>) -> f32 {
    (value as f32).clamp(*range.start(), *range.end())
}

/// Loads files and drives transport, pitch and speed
pub struct PlaybackController {
    session: SharedSession,
    timer: Option<PositionTimer>,
    pitch: f32,
    speed: f32,
    looping: bool,
    tick_interval: Duration,
}

impl PlaybackController {
    pub fn new(config: &PlaybackConfig) -> Self {
        let mut config = config.clone();
        config.validate();
        Self {
            session: Arc::new(Mutex::new(None)),
            timer: None,
            pitch: config.initial_pitch,
            speed: config.initial_speed,
            looping: false,
            tick_interval: Duration::from_millis(config.position_interval_ms),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<PlaybackSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel the clock. Must not be called with the session locked.
    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    fn timer_running(&self) -> bool {
        self.timer.as_ref().is_some_and(PositionTimer::is_running)
    }

    fn restart_timer(&mut self) {
        self.stop_timer();
        match PositionTimer::start(self.tick_interval, Arc::clone(&self.session)) {
            Ok(timer) => self.timer = Some(timer),
            Err(e) => log::error!("playback: failed to start position timer: {}", e),
        }
    }

    /// Replace the current session with `path`
    pub fn load(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.unload();

        match self.open_session(path) {
            Ok(session) => {
                log::info!(
                    "playback: loaded {} ({} ms)",
                    path.display(),
                    session.duration_ms()
                );
                *self.lock() = Some(session);
                true
            }
            Err(e) => {
                log::error!("playback: load failed: {}", e);
                false
            }
        }
    }

    fn open_session(&self, path: &Path) -> PlaybackResult<PlaybackSession> {
        let mut graph = PlaybackGraph::load(path)?;
        graph.set_pitch(self.pitch);
        graph.set_speed(self.speed);
        Ok(PlaybackSession::new(path, graph, self.looping))
    }

    /// Release the current session, if any
    pub fn unload(&mut self) {
        self.stop_timer();
        if let Some(session) = self.lock().take() {
            log::debug!("playback: released {}", session.path().display());
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }

    /// Set the pitch ratio, clamped to [`PITCH_RANGE`]
    pub fn set_pitch(&mut self, pitch: f64) -> bool {
        if pitch.is_finite() {
            self.pitch = clamp_to(pitch, &PITCH_RANGE);
        }
        log::debug!(
            "playback: pitch {:.3} ({:+.0} cents)",
            self.pitch,
            self.pitch_cents()
        );
        if let Some(session) = self.lock().as_mut() {
            session.graph_mut().set_pitch(self.pitch);
        }
        true
    }

    /// Set the speed ratio, clamped to [`SPEED_RANGE`]
    pub fn set_speed(&mut self, speed: f64) -> bool {
        if speed.is_finite() {
            self.speed = clamp_to(speed, &SPEED_RANGE);
        }
        if let Some(session) = self.lock().as_mut() {
            session.graph_mut().set_speed(self.speed);
        }
        true
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Pitch change in cents
    pub fn pitch_cents(&self) -> f32 {
        (self.pitch - 1.0) * 1200.0
    }

    /// Start or resume playback; false when nothing is loaded
    pub fn play(&mut self) -> bool {
        let was_playing = {
            let mut guard = self.lock();
            let Some(session) = guard.as_mut() else {
                log::warn!("playback: play with no audio loaded");
                return false;
            };
            let was_playing = session.is_playing();
            session.play();
            was_playing
        };

        if !was_playing || !self.timer_running() {
            self.restart_timer();
        }
        true
    }

    pub fn pause(&mut self) -> bool {
        self.stop_timer();
        if let Some(session) = self.lock().as_mut() {
            session.pause();
        }
        true
    }

    pub fn stop(&mut self) -> bool {
        self.stop_timer();
        if let Some(session) = self.lock().as_mut() {
            session.stop();
        }
        true
    }

    /// Seek to `position_ms`; false outside `[0, duration]` or when unloaded
    pub fn seek(&mut self, position_ms: f64) -> bool {
        match self.try_seek(position_ms) {
            Ok(playing) => {
                if playing {
                    self.restart_timer();
                }
                true
            }
            Err(e) => {
                log::warn!("playback: seek rejected: {}", e);
                false
            }
        }
    }

    /// Relocate the cursor; returns whether the session is playing
    fn try_seek(&self, position_ms: f64) -> PlaybackResult<bool> {
        let mut guard = self.lock();
        let session = guard.as_mut().ok_or(PlaybackError::NotLoaded)?;
        session.seek(position_ms)?;
        Ok(session.is_playing())
    }

    pub fn set_looping(&mut self, looping: bool) -> bool {
        self.looping = looping;
        if let Some(session) = self.lock().as_mut() {
            session.set_looping(looping);
        }
        true
    }

    /// Current position in milliseconds, 0 when unloaded
    pub fn position_ms(&self) -> u64 {
        self.lock().as_ref().map_or(0, PlaybackSession::position_ms)
    }

    /// Duration in milliseconds, 0 when unloaded
    pub fn duration_ms(&self) -> u64 {
        self.lock().as_ref().map_or(0, PlaybackSession::duration_ms)
    }

    /// Transport state, `None` when unloaded
    pub fn transport(&self) -> Option<TransportState> {
        self.lock().as_ref().map(PlaybackSession::transport)
    }

    pub fn is_pitch_supported(&self) -> bool {
        true
    }

    /// Advance the position clock by `elapsed` as a timer tick would
    pub fn advance(&mut self, elapsed: Duration) {
        let outcome = match self.lock().as_mut() {
            Some(session) => session.advance(elapsed.as_secs_f64() * 1000.0),
            None => TickOutcome::Idle,
        };
        if matches!(outcome, TickOutcome::Finished) {
            self.stop_timer();
        }
    }

    /// React to the source running out
    pub fn handle_end_of_stream(&mut self) {
        let outcome = match self.lock().as_mut() {
            Some(session) => session.end_of_stream(),
            None => return,
        };
        match outcome {
            TickOutcome::Finished => self.stop_timer(),
            TickOutcome::Looped if !self.timer_running() => self.restart_timer(),
            _ => {}
        }
    }

    /// Pull `out_frames` interleaved frames at the current position
    ///
    /// Silence when unloaded or not playing.
    pub fn render(&self, out_frames: usize) -> Vec<f32> {
        match self.lock().as_mut() {
            Some(session) => session.render(out_frames),
            None => vec![0.0; out_frames],
        }
    }

    /// Execute one command from the shell channel
    pub fn dispatch(&mut self, command: PlaybackCommand) -> PlaybackReply {
        log::debug!("playback: {:?}", command);
        match command {
            PlaybackCommand::LoadAudio { file_path } => self.load(file_path).into(),
            PlaybackCommand::SetPitch { pitch } => self.set_pitch(pitch).into(),
            PlaybackCommand::SetSpeed { speed } => self.set_speed(speed).into(),
            PlaybackCommand::Play => self.play().into(),
            PlaybackCommand::Pause => self.pause().into(),
            PlaybackCommand::Stop => self.stop().into(),
            PlaybackCommand::Seek { position } => self.seek(position).into(),
            PlaybackCommand::SetLooping { looping } => self.set_looping(looping).into(),
            PlaybackCommand::GetPosition => PlaybackReply::Millis(self.position_ms()),
            PlaybackCommand::GetDuration => PlaybackReply::Millis(self.duration_ms()),
            PlaybackCommand::IsPitchSupported => self.is_pitch_supported().into(),
        }
    }
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(&PlaybackConfig::default())
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Mono 8 kHz WAV of `ms` milliseconds
    fn fixture(dir: &Path, name: &str, ms: u32) -> PathBuf {
        let path = dir.join(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..(ms * 8) {
            writer.write_sample(((i % 64) as i16) * 100).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    /// Slow clock so real ticks never land inside a test
    fn controller() -> PlaybackController {
        PlaybackController::new(&PlaybackConfig {
            position_interval_ms: 1000,
            ..Default::default()
        })
    }

    #[test]
    fn test_clamping() {
        let mut c = controller();
        assert!(c.set_pitch(3.0));
        assert_eq!(c.pitch(), 2.0);
        assert!(c.set_pitch(0.1));
        assert_eq!(c.pitch(), 0.5);
        assert!(c.set_speed(10.0));
        assert_eq!(c.speed(), 4.0);
        assert!(c.set_speed(0.0));
        assert_eq!(c.speed(), 0.25);
        assert!(c.set_pitch(f64::NAN));
        assert_eq!(c.pitch(), 0.5);
    }

    #[test]
    fn test_pitch_cents() {
        let mut c = controller();
        c.set_pitch(1.5);
        assert!((c.pitch_cents() - 600.0).abs() < 1e-3);
    }

    #[test]
    fn test_unloaded_reads_zero() {
        let mut c = controller();
        assert!(!c.is_loaded());
        assert_eq!(c.position_ms(), 0);
        assert_eq!(c.duration_ms(), 0);
        assert_eq!(c.transport(), None);
        assert!(!c.play());
        assert!(c.pause());
        assert!(c.stop());
        assert!(!c.seek(0.0));
        assert!(c.is_pitch_supported());
    }

    #[test]
    fn test_load_missing_file() {
        let mut c = controller();
        assert!(!c.load("/nonexistent/song.m4a"));
        assert!(!c.is_loaded());
        assert_eq!(c.duration_ms(), 0);
    }

    #[test]
    fn test_load_resets_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller();
        assert!(c.load(fixture(dir.path(), "a.wav", 1000)));
        assert_eq!(c.duration_ms(), 1000);
        assert_eq!(c.position_ms(), 0);
        assert_eq!(c.transport(), Some(TransportState::Stopped));

        c.play();
        c.advance(Duration::from_millis(400));
        assert!(c.timer_running());

        assert!(c.load(fixture(dir.path(), "b.wav", 2000)));
        assert!(c.timer.is_none());
        assert_eq!(c.duration_ms(), 2000);
        assert_eq!(c.position_ms(), 0);
        assert_eq!(c.transport(), Some(TransportState::Stopped));
    }

    #[test]
    fn test_failed_load_releases_previous_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller();
        assert!(c.load(fixture(dir.path(), "a.wav", 500)));
        assert!(!c.load(dir.path().join("missing.wav")));
        assert!(!c.is_loaded());
    }

    #[test]
    fn test_seek_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller();
        c.load(fixture(dir.path(), "a.wav", 1000));

        assert!(c.seek(600.0));
        assert_eq!(c.position_ms(), 600);

        assert!(!c.seek(-1.0));
        assert!(!c.seek(1001.0));
        assert_eq!(c.position_ms(), 600);
        assert_eq!(c.transport(), Some(TransportState::Stopped));

        assert!(c.seek(1000.0));
    }

    #[test]
    fn test_seek_while_playing_keeps_playing() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller();
        c.load(fixture(dir.path(), "a.wav", 1000));
        c.play();

        assert!(c.seek(250.0));
        assert_eq!(c.transport(), Some(TransportState::Playing));
        assert!(c.timer_running());
        c.pause();
        assert_eq!(c.position_ms(), 250);
    }

    #[test]
    fn test_speed_scales_position() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller();
        c.load(fixture(dir.path(), "a.wav", 2000));
        c.set_speed(2.0);
        c.play();
        c.advance(Duration::from_millis(100));
        c.pause();
        assert_eq!(c.position_ms(), 200);
    }

    #[test]
    fn test_pause_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller();
        c.load(fixture(dir.path(), "a.wav", 1000));
        c.play();
        c.advance(Duration::from_millis(300));

        assert!(c.pause());
        assert!(!c.timer_running());
        assert_eq!(c.transport(), Some(TransportState::Paused));
        assert_eq!(c.position_ms(), 300);

        // Paused clock does not move
        c.advance(Duration::from_millis(300));
        assert_eq!(c.position_ms(), 300);

        assert!(c.stop());
        assert_eq!(c.transport(), Some(TransportState::Stopped));
        assert_eq!(c.position_ms(), 0);
    }

    #[test]
    fn test_play_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller();
        c.load(fixture(dir.path(), "a.wav", 1000));
        assert!(c.play());
        c.advance(Duration::from_millis(100));
        assert!(c.play());
        c.pause();
        assert_eq!(c.position_ms(), 100);
    }

    #[test]
    fn test_looping_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller();
        c.load(fixture(dir.path(), "a.wav", 1000));
        assert!(c.set_looping(true));
        assert!(c.play());
        c.advance(Duration::from_millis(700));

        c.handle_end_of_stream();
        assert_eq!(c.position_ms(), 0);
        assert_eq!(c.transport(), Some(TransportState::Playing));
        assert!(c.timer_running());
    }

    #[test]
    fn test_end_without_looping_halts_at_duration() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller();
        c.load(fixture(dir.path(), "a.wav", 1000));
        c.play();
        c.advance(Duration::from_secs(5));

        assert_eq!(c.position_ms(), 1000);
        assert_eq!(c.transport(), Some(TransportState::Stopped));
        assert!(!c.timer_running());

        assert!(c.play());
        assert_eq!(c.position_ms(), 0);
        assert_eq!(c.transport(), Some(TransportState::Playing));
    }

    #[test]
    fn test_looping_carries_over_loads() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller();
        c.set_looping(true);
        c.set_speed(2.0);
        c.load(fixture(dir.path(), "a.wav", 500));
        c.play();
        c.advance(Duration::from_millis(250));
        assert_eq!(c.position_ms(), 0);
        assert_eq!(c.transport(), Some(TransportState::Playing));
    }

    #[test]
    fn test_timer_drives_position() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = PlaybackController::new(&PlaybackConfig {
            position_interval_ms: 10,
            ..Default::default()
        });
        c.load(fixture(dir.path(), "a.wav", 5000));
        c.play();
        std::thread::sleep(Duration::from_millis(200));
        c.pause();

        let paused_at = c.position_ms();
        assert!(paused_at > 0);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(c.position_ms(), paused_at);
    }

    #[test]
    fn test_render_follows_transport() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller();
        assert_eq!(c.render(32).len(), 32);

        c.load(fixture(dir.path(), "a.wav", 1000));
        assert!(c.render(128).iter().all(|&s| s == 0.0));
        c.play();
        assert_eq!(c.render(128).len(), 128);
    }

    #[test]
    fn test_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path(), "a.wav", 1500);
        let mut c = controller();

        assert_eq!(
            c.dispatch(PlaybackCommand::LoadAudio { file_path: path }),
            PlaybackReply::Bool(true)
        );
        assert_eq!(c.dispatch(PlaybackCommand::GetDuration), PlaybackReply::Millis(1500));
        assert_eq!(
            c.dispatch(PlaybackCommand::SetPitch { pitch: 3.0 }),
            PlaybackReply::Bool(true)
        );
        assert_eq!(c.pitch(), 2.0);
        assert_eq!(
            c.dispatch(PlaybackCommand::Seek { position: 2000.0 }),
            PlaybackReply::Bool(false)
        );
        assert_eq!(
            c.dispatch(PlaybackCommand::Seek { position: 750.0 }),
            PlaybackReply::Bool(true)
        );
        assert_eq!(c.dispatch(PlaybackCommand::GetPosition), PlaybackReply::Millis(750));
        assert_eq!(
            c.dispatch(PlaybackCommand::IsPitchSupported),
            PlaybackReply::Bool(true)
        );
    }
}
