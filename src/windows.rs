use crate::ipc::{Display, Prompt, Response, WindowMetadata};
use crate::ipc::responses::{Boundary, Position, Size};
use crate::lock;
use color_eyre::{Report, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub type WindowSender = mpsc::UnboundedSender<Response>;

#[derive(Debug)]
struct Window {
    display: Display,
    tx: WindowSender,
}

#[derive(Debug, Default)]
struct Inner {
    windows: BTreeMap<u32, Window>,
    next_id: u32,
    primary: Option<u32>,
    pending_prompts: Vec<Prompt>,
}

impl Inner {
    fn boundary(&self) -> Boundary {
        let mut displays = self.windows.values().map(|window| window.display);

        let Some(first) = displays.next() else {
            return Boundary::default();
        };

        let right = |display: Display| display.x.saturating_add_unsigned(display.width);
        let bottom = |display: Display| display.y.saturating_add_unsigned(display.height);

        displays.fold(
            Boundary {
                min_x: first.x,
                max_x: right(first),
                min_y: first.y,
                max_y: bottom(first),
            },
            |boundary, display| Boundary {
                min_x: boundary.min_x.min(display.x),
                max_x: boundary.max_x.max(right(display)),
                min_y: boundary.min_y.min(display.y),
                max_y: boundary.max_y.max(bottom(display)),
            },
        )
    }

    fn metadata(&self, id: u32) -> Option<WindowMetadata> {
        let window = self.windows.get(&id)?;

        Some(WindowMetadata {
            id,
            is_primary: self.primary == Some(id),
            position: Position {
                x: window.display.x,
                y: window.display.y,
            },
            size: Size {
                width: window.display.width,
                height: window.display.height,
            },
            overall_boundary: self.boundary(),
        })
    }

    fn send_all(&self, response: &Response) {
        for window in self.windows.values() {
            // a closed window is about to be detached
            let _ = window.tx.send(response.clone());
        }
    }

    fn send_primary(&self, response: Response) -> bool {
        self.primary
            .and_then(|id| self.windows.get(&id))
            .is_some_and(|window| window.tx.send(response).is_ok())
    }
}

/// The renderer windows attached to the bridge, one per display.
///
/// The first window to attach is the primary one,
/// unless a later window claims its display is primary.
#[derive(Debug, Default)]
pub struct Windows {
    inner: Mutex<Inner>,
}

impl Windows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a window, returning its metadata.
    /// Prompts queued before a primary window existed are delivered to it.
    pub fn attach(&self, display: Display, tx: WindowSender) -> WindowMetadata {
        let mut inner = lock!(self.inner);

        inner.next_id += 1;
        let id = inner.next_id;

        inner.windows.insert(id, Window { display, tx });
        if display.primary || inner.primary.is_none() {
            inner.primary = Some(id);
        }

        let Display {
            x,
            y,
            width,
            height,
            ..
        } = display;
        info!("Attached window {id} at {width}x{height}+{x}+{y}");

        let pending = std::mem::take(&mut inner.pending_prompts);
        for prompt in pending {
            inner.send_primary(Response::Prompt(prompt));
        }

        inner.metadata(id).unwrap_or_default()
    }

    pub fn detach(&self, id: u32) {
        let mut inner = lock!(self.inner);

        if inner.windows.remove(&id).is_some() {
            debug!("Detached window {id}");
        }

        if inner.primary == Some(id) {
            inner.primary = inner.windows.keys().next().copied();
        }
    }

    pub fn metadata(&self, id: u32) -> Option<WindowMetadata> {
        lock!(self.inner).metadata(id)
    }

    pub fn len(&self) -> usize {
        lock!(self.inner).windows.len()
    }

    /// Sends a greeter signal to every window.
    pub fn emit_signal(&self, name: &str, args: Vec<Value>) {
        debug!("Emitting signal '{name}'");

        lock!(self.inner).send_all(&Response::Signal {
            name: name.to_string(),
            args,
        });
    }

    /// Relays `data` from window `sender` to every window,
    /// including the sender.
    pub fn broadcast(&self, sender: u32, data: Value) -> Result<()> {
        let inner = lock!(self.inner);

        let sender = inner
            .metadata(sender)
            .ok_or_else(|| Report::msg(format!("Window {sender} is not attached")))?;

        inner.send_all(&Response::WindowBroadcast { sender, data });
        Ok(())
    }

    /// Shows `prompt` on the primary window,
    /// or queues it until one attaches.
    pub fn prompt(&self, prompt: Prompt) {
        let mut inner = lock!(self.inner);

        if !inner.send_primary(Response::Prompt(prompt.clone())) {
            debug!("No primary window, queueing prompt");
            inner.pending_prompts.push(prompt);
        }
    }

    /// Tells every window to reload `theme`.
    pub fn reload(&self, theme: &str) {
        info!("Reloading theme '{theme}'");

        lock!(self.inner).send_all(&Response::Reload {
            theme: theme.to_string(),
        });
    }
}
