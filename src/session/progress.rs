// src/session/progress.rs — Loading messages shown while a session starts

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{SessionState, SessionView};

pub const INITIALIZING: &str = "Initializing your avatar session... This may take a few seconds.";
pub const ALMOST_READY: &str = "Almost ready! Setting up your interactive experience...";
pub const CREDENTIAL_FAILED: &str = "Having trouble connecting. Please try again.";
pub const CONNECT_FAILED: &str = "Something went wrong. Please try again.";

/// Cycled through while the start flow is suspended on the network.
pub const ROTATING: [&str; 4] = [
    "Connecting to the avatar service...",
    "Loading your knowledge base...",
    "Warming up your avatar's voice...",
    "This process usually takes 10-15 seconds...",
];

/// Background task that rotates `loading_message` while the session is
/// `Starting`. Aborted on drop.
pub struct ProgressTicker {
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn start(view: Arc<watch::Sender<SessionView>>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately; the phase message already covers it.
            ticker.tick().await;
            let mut index = 0usize;
            loop {
                ticker.tick().await;
                let still_starting = view.send_if_modified(|v| {
                    if v.state != SessionState::Starting {
                        return false;
                    }
                    v.loading_message = Some(ROTATING[index % ROTATING.len()].to_string());
                    true
                });
                if !still_starting {
                    break;
                }
                index += 1;
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
