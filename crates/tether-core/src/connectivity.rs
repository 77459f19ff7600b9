//! Connectivity signal

use std::sync::Arc;

use tokio::sync::watch;

/// Source of online/offline transitions.
pub trait ConnectivitySignal: Send + Sync + 'static {
    /// Receiver yielding `true` while connected.
    fn subscribe(&self) -> watch::Receiver<bool>;

    fn is_connected_now(&self) -> bool;
}

/// Connectivity driven by the host through [`WatchConnectivity::set_connected`].
#[derive(Debug, Clone)]
pub struct WatchConnectivity {
    sender: Arc<watch::Sender<bool>>,
}

impl WatchConnectivity {
    pub fn new(connected: bool) -> Self {
        let (sender, _receiver) = watch::channel(connected);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish a connectivity reading. Returns `true` if it changed.
    pub fn set_connected(&self, connected: bool) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == connected {
                false
            } else {
                *current = connected;
                true
            }
        })
    }
}

impl ConnectivitySignal for WatchConnectivity {
    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    fn is_connected_now(&self) -> bool {
        *self.sender.borrow()
    }
}
