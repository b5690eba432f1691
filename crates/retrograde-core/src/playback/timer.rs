//! Periodic position clock for a playing session
//!
//! The clock thread ticks at a fixed interval and advances the shared
//! session under its lock. It exits on its own when the session stops
//! playing or finishes; otherwise it runs until the [`PositionTimer`] is
//! cancelled or dropped, which joins the thread. Never cancel while
//! holding the session lock: the thread may be waiting on it.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam::channel::Sender;

use super::session::{PlaybackSession, TickOutcome};

/// Session slot shared between the controller and its clock
pub type SharedSession = Arc<Mutex<Option<PlaybackSession>>>;

/// Handle to a running position clock
pub struct PositionTimer {
    /// Dropping this sender stops the clock
    stop_tx: Option<Sender<()>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl PositionTimer {
    /// Start ticking every `interval`
    pub fn start(interval: Duration, session: SharedSession) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = crossbeam::channel::bounded::<()>(1);
        let elapsed_ms = interval.as_secs_f64() * 1000.0;

        let handle = thread::Builder::new()
            .name("position-timer".into())
            .spawn(move || {
                let ticker = crossbeam::channel::tick(interval);
                loop {
                    crossbeam::select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            let mut guard = session.lock().unwrap_or_else(PoisonError::into_inner);
                            let outcome = match guard.as_mut() {
                                Some(s) => s.advance(elapsed_ms),
                                None => TickOutcome::Idle,
                            };
                            match outcome {
                                TickOutcome::Running => {}
                                TickOutcome::Looped => log::debug!("position-timer: looped"),
                                TickOutcome::Idle | TickOutcome::Finished => break,
                            }
                        }
                    }
                }
                log::debug!("position-timer: stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            thread_handle: Some(handle),
        })
    }

    /// Check if the clock thread is still ticking
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop the clock and wait for its thread to exit
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("position-timer thread panicked");
            }
        }
    }
}

impl Drop for PositionTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::graph::PlaybackGraph;
    use std::path::Path;

    fn shared(looping: bool) -> SharedSession {
        let graph = PlaybackGraph::from_samples(&vec![0i16; 8000], 1, 8000);
        let mut session = PlaybackSession::new(Path::new("mem.wav"), graph, looping);
        session.play();
        Arc::new(Mutex::new(Some(session)))
    }

    fn position(session: &SharedSession) -> u64 {
        session.lock().unwrap().as_ref().unwrap().position_ms()
    }

    #[test]
    fn test_ticks_advance_position() {
        let session = shared(false);
        let timer = PositionTimer::start(Duration::from_millis(10), Arc::clone(&session)).unwrap();
        thread::sleep(Duration::from_millis(150));
        timer.cancel();
        assert!(position(&session) > 0);
    }

    #[test]
    fn test_cancel_stops_ticking() {
        let session = shared(false);
        let timer = PositionTimer::start(Duration::from_millis(10), Arc::clone(&session)).unwrap();
        thread::sleep(Duration::from_millis(50));
        timer.cancel();

        let frozen = position(&session);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(position(&session), frozen);
    }

    #[test]
    fn test_exits_when_session_finishes() {
        let session = shared(false);
        // One 300ms tick at 4x covers the whole second
        session
            .lock()
            .unwrap()
            .as_mut()
            .unwrap()
            .graph_mut()
            .set_speed(4.0);
        let timer = PositionTimer::start(Duration::from_millis(300), Arc::clone(&session)).unwrap();
        thread::sleep(Duration::from_millis(1000));

        assert!(!timer.is_running());
        assert_eq!(position(&session), 1000);
    }

    #[test]
    fn test_exits_when_unloaded() {
        let session: SharedSession = Arc::new(Mutex::new(None));
        let timer = PositionTimer::start(Duration::from_millis(10), Arc::clone(&session)).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(!timer.is_running());
    }
}
