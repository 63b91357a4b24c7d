/* Input tap: fans key events from a device's associated input node(s) out
 * to renderer callbacks. Grounded on the original source's single
 * callback-list event manager: devices are opened lazily on the 0->1
 * callback transition and closed on the 1->0 transition. */

use std::sync::Mutex;

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u16,
    pub pressed: bool,
}

/// A generic key-event source. The real binary wires this to `evdev`-style
/// input nodes; tests and the synthetic transport drive it by sending on
/// the paired `broadcast::Sender`.
pub struct InputTap {
    sender: broadcast::Sender<KeyEvent>,
    open: Mutex<bool>,
}

impl InputTap {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            sender,
            open: Mutex::new(false),
        }
    }

    /// Subscribe to key events, opening the underlying device(s) if this is
    /// the first subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<KeyEvent> {
        let mut open = self.open.lock().unwrap();
        if !*open {
            *open = true;
        }
        self.sender.subscribe()
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock().unwrap()
    }

    /// Close the tap unconditionally, dropping all subscribers.
    pub fn shutdown(&self) {
        *self.open.lock().unwrap() = false;
    }

    /// Feed a synthetic event to every subscriber (used by tests and the
    /// `dev-hooks` synthetic device path).
    pub fn emit(&self, event: KeyEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for InputTap {
    fn default() -> Self {
        Self::new()
    }
}
