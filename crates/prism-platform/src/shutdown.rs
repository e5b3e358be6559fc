// SPDX-License-Identifier: CEPL-1.0
//! Out-of-band shutdown requests.
//!
//! The watcher thread never touches GPU state. It only flips a flag that the
//! frame loop polls between frames.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Trips `signal` when a line (Enter) is read from stdin.
pub fn spawn_keyboard_watcher(signal: ShutdownSignal) -> io::Result<JoinHandle<()>> {
    spawn_watcher(io::BufReader::new(io::stdin()), signal)
}

/// Trips `signal` on the first line read from `reader`. End of input means
/// nobody is attached to the terminal and leaves the signal untouched.
pub fn spawn_watcher<R>(mut reader: R, signal: ShutdownSignal) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("shutdown-watch".into())
        .spawn(move || {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => {}
                Ok(_) => {
                    info!("shutdown requested from keyboard");
                    signal.trigger();
                }
                Err(e) => warn!("shutdown watcher stopped: {e}"),
            }
        })
}
