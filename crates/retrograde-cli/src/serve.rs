//! `retrograde serve`: the JSON-lines shell boundary
//!
//! Playback messages are handled in order on the reading thread. Reversal
//! messages are handed to the background service and answered whenever
//! they finish, so reply lines may arrive out of order; match them by `id`.

use std::io::{BufRead, Write};
use std::thread;

use anyhow::{anyhow, Context, Result};
use crossbeam::channel::{Receiver, Sender};
use tokio::sync::oneshot;

use retrograde_core::channel::{Envelope, Message, Reply};
use retrograde_core::config::Config;
use retrograde_core::reverse::{ReverseClient, ReverseService};
use retrograde_core::PlaybackController;

/// Outcome of one message
enum Handled {
    /// Reply is ready
    Now(Reply),
    /// Reversal submitted; reply when the receiver resolves
    Later(Option<u64>, oneshot::Receiver<bool>),
}

/// Serve messages from `input` until EOF, returning `output` once every
/// reply has been written
pub fn run<R, W>(config: &Config, input: R, output: W) -> Result<W>
where
    R: BufRead,
    W: Write + Send + 'static,
{
    let mut service = ReverseService::spawn(&config.reverse).map_err(|e| anyhow!(e))?;
    let client = ReverseClient::new(&service);
    let mut controller = PlaybackController::new(&config.playback);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("serve-replies")
        .build()
        .context("Failed to build reply runtime")?;

    let (reply_tx, reply_rx) = crossbeam::channel::unbounded();
    let writer = thread::Builder::new()
        .name("serve-writer".into())
        .spawn(move || write_replies(output, reply_rx))
        .context("Failed to spawn reply writer")?;

    let mut pending = Vec::new();
    for line in input.lines() {
        let line = line.context("Failed to read message")?;
        if line.trim().is_empty() {
            continue;
        }

        match handle_line(&line, &mut controller, &client) {
            Handled::Now(reply) => send(&reply_tx, reply),
            Handled::Later(id, rx) => {
                let tx = reply_tx.clone();
                pending.push(runtime.spawn(async move {
                    let ok = rx.await.unwrap_or(false);
                    send(&tx, Reply::result(id, ok));
                }));
            }
        }
    }

    log::info!("serve: input closed, waiting for {} reversal(s)", pending.len());
    runtime.block_on(async {
        for task in pending {
            let _ = task.await;
        }
    });
    drop(reply_tx);

    controller.unload();
    let _ = client.shutdown();
    service.join();

    writer
        .join()
        .map_err(|_| anyhow!("Reply writer panicked"))?
}

fn handle_line(line: &str, controller: &mut PlaybackController, client: &ReverseClient) -> Handled {
    let envelope = match Envelope::parse(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            log::warn!("serve: {}", e);
            return Handled::Now(Reply::for_error(None, &e));
        }
    };
    let id = envelope.id;

    match envelope.decode() {
        Ok(Message::Playback(command)) => Handled::Now(Reply::result(id, controller.dispatch(command))),
        Ok(Message::Reverse(request)) => Handled::Later(id, client.reverse(request)),
        Err(e) => {
            log::warn!("serve: {}", e);
            Handled::Now(Reply::for_error(id, &e))
        }
    }
}

fn send(tx: &Sender<Reply>, reply: Reply) {
    if tx.send(reply).is_err() {
        log::error!("serve: reply writer gone");
    }
}

fn write_replies<W: Write>(mut output: W, replies: Receiver<Reply>) -> Result<W> {
    for reply in replies {
        writeln!(output, "{}", reply.to_line()).context("Failed to write reply")?;
        output.flush().context("Failed to flush reply")?;
    }
    Ok(output)
}
