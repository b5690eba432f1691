//! ReverseService - background reversal off the caller's thread
//!
//! A dispatcher thread receives commands over a crossbeam channel and runs
//! each reversal on a rayon pool, so independent requests proceed in
//! parallel. Every request gets exactly one `bool` back through its oneshot
//! reply; there are no progress messages and no cancellation.
//!
//! Two requests for the same output path may not overlap: while one is in
//! flight, a second one targeting the same path is answered with `false`
//! immediately.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crossbeam::channel::{Receiver, Sender};
use tokio::sync::oneshot;

use crate::command::ReverseRequest;
use crate::config::ReverseConfig;

/// Commands sent to the ReverseService
pub enum ReverseCommand {
    /// Reverse one file; `reply` receives the boolean outcome
    Reverse {
        request: ReverseRequest,
        reply: oneshot::Sender<bool>,
    },
    /// Stop accepting work; queued reversals still finish
    Shutdown,
}

/// Handle to a running service thread
pub struct ServiceHandle<Cmd> {
    /// Channel for sending commands to the service
    pub command_tx: Sender<Cmd>,
    /// Thread handle for the dispatcher
    pub thread_handle: Option<thread::JoinHandle<()>>,
}

impl<Cmd> ServiceHandle<Cmd> {
    /// Send a command to the service
    pub fn send(&self, cmd: Cmd) -> Result<(), crossbeam::channel::SendError<Cmd>> {
        self.command_tx.send(cmd)
    }

    /// Check if the service is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Wait for the dispatcher thread to exit
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("service thread panicked");
            }
        }
    }
}

/// Key identifying an output file regardless of how its path is spelled
///
/// The parent directory is canonicalized (it must exist for the write to
/// succeed anyway); the file itself usually doesn't exist yet, so its name
/// is appended as given.
fn output_key(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

/// Output files with a reversal currently running
#[derive(Clone, Default)]
struct InFlight(Arc<Mutex<HashSet<PathBuf>>>);

impl InFlight {
    /// Claim the output at `path`; `None` if it is already claimed
    fn claim(&self, path: &Path) -> Option<PathBuf> {
        let key = output_key(path);
        let claimed = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        claimed.then_some(key)
    }

    fn release(&self, key: &Path) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Runs reversal requests in the background
pub struct ReverseService {
    command_rx: Receiver<ReverseCommand>,
    pool: rayon::ThreadPool,
    in_flight: InFlight,
}

impl ReverseService {
    /// Spawn the dispatcher thread and its worker pool
    pub fn spawn(config: &ReverseConfig) -> Result<ServiceHandle<ReverseCommand>, String> {
        let (command_tx, command_rx) = crossbeam::channel::unbounded();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads.max(1))
            .thread_name(|i| format!("reverse-worker-{}", i))
            .build()
            .map_err(|e| format!("Failed to build reverse worker pool: {}", e))?;

        let service = ReverseService {
            command_rx,
            pool,
            in_flight: InFlight::default(),
        };

        let handle = thread::Builder::new()
            .name("reverse-service".into())
            .spawn(move || service.run())
            .map_err(|e| format!("Failed to spawn reverse service thread: {}", e))?;

        Ok(ServiceHandle {
            command_tx,
            thread_handle: Some(handle),
        })
    }

    /// Main service loop
    fn run(self) {
        log::info!(
            "ReverseService started with {} worker(s)",
            self.pool.current_num_threads()
        );

        while let Ok(cmd) = self.command_rx.recv() {
            match cmd {
                ReverseCommand::Reverse { request, reply } => self.dispatch(request, reply),
                ReverseCommand::Shutdown => {
                    log::info!("ReverseService shutting down");
                    break;
                }
            }
        }

        log::info!("ReverseService stopped");
    }

    fn dispatch(&self, request: ReverseRequest, reply: oneshot::Sender<bool>) {
        let Some(key) = self.in_flight.claim(&request.output_path) else {
            log::warn!(
                "ReverseService: {} already being written, rejecting request",
                request.output_path.display()
            );
            let _ = reply.send(false);
            return;
        };

        let in_flight = self.in_flight.clone();
        self.pool.spawn(move || {
            let ok = super::reverse(&request.input_path, &request.output_path);
            in_flight.release(&key);
            let _ = reply.send(ok);
        });
    }
}

/// Client for submitting reversals to a [`ReverseService`]
#[derive(Clone)]
pub struct ReverseClient {
    command_tx: Sender<ReverseCommand>,
}

impl ReverseClient {
    /// Create a new client from a service handle
    pub fn new(handle: &ServiceHandle<ReverseCommand>) -> Self {
        Self {
            command_tx: handle.command_tx.clone(),
        }
    }

    /// Submit a reversal; the receiver resolves once with the outcome
    ///
    /// If the service is gone the receiver resolves to `false` right away.
    pub fn reverse(&self, request: ReverseRequest) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        if let Err(err) = self.command_tx.send(ReverseCommand::Reverse { request, reply: tx }) {
            log::error!("ReverseClient: service unavailable");
            if let ReverseCommand::Reverse { reply, .. } = err.into_inner() {
                let _ = reply.send(false);
            }
        }
        rx
    }

    /// Submit a reversal and wait for the outcome (blocking)
    pub fn reverse_blocking(&self, request: ReverseRequest) -> bool {
        self.reverse(request).blocking_recv().unwrap_or(false)
    }

    /// Ask the service to stop
    pub fn shutdown(&self) -> Result<(), String> {
        self.command_tx
            .send(ReverseCommand::Shutdown)
            .map_err(|e| e.to_string())
    }
}
