/* This file is part of ZeroTrace
 *
 * ZeroTrace is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 */

//! Shutdown signaling shared across the node: a cancellation token handed to
//! every background task, wired to a Unix signal handler, in the style of
//! `script/research/dhtd`'s signal handling.

use log::debug;

/// A cancellation token handed to every long-running background task
/// (DHT maintenance loops, forward-queue sweepers). Cloning is cheap; calling
/// `trigger()` wakes every clone's `wait()` callers.
#[derive(Clone)]
pub struct StopSignal {
    recv: async_channel::Receiver<()>,
}

pub struct StopHandle {
    send: async_channel::Sender<()>,
}

impl StopHandle {
    pub fn trigger(&self) {
        let _ = self.send.try_send(());
    }
}

pub fn stop_signal() -> (StopHandle, StopSignal) {
    let (send, recv) = async_channel::bounded(1);
    (StopHandle { send }, StopSignal { recv })
}

impl StopSignal {
    /// Resolves once shutdown has been triggered. A loop should
    /// `futures::select!` this against its normal work.
    pub async fn wait(&self) {
        let _ = self.recv.recv().await;
    }
}

/// Installs a Ctrl-C/SIGTERM handler that triggers `handle` exactly once.
/// Mirrors `script/research/dhtd`'s `ctrlc::set_handler` + bounded channel.
pub fn install_signal_handler(handle: StopHandle) -> crate::error::Result<()> {
    ctrlc::set_handler(move || {
        debug!(target: "system::signal", "caught termination signal");
        handle.trigger();
    })
    .map_err(|e| crate::error::Error::Custom(format!("failed installing signal handler: {e}")))?;
    Ok(())
}
