use std::fmt;

use tokio::sync::watch;
use tracing::debug;

/// Closed set of dialogs a single view can show.
///
/// Implementors provide the "nothing visible" value and the back-navigation
/// table for the view. Every other transition is an unconditional `open`.
pub trait DialogKind: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// The state in which no dialog is visible.
    const NONE: Self;

    /// Target of the back button, or `None` when back is a no-op here.
    fn back_target(self) -> Option<Self>;

    fn is_none(self) -> bool {
        self == Self::NONE
    }
}

/// Holds the single visible dialog of a view and publishes every change.
///
/// The current value lives inside a watch channel so renderers observe the
/// same value the controller holds; there is never a moment where two
/// dialogs are considered visible.
pub struct DialogFlow<S: DialogKind> {
    state_tx: watch::Sender<S>,
}

impl<S: DialogKind> DialogFlow<S> {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(S::NONE);
        Self { state_tx }
    }

    /// Currently visible dialog.
    pub fn current(&self) -> S {
        *self.state_tx.borrow()
    }

    pub fn is_open(&self) -> bool {
        !self.current().is_none()
    }

    /// Replace whatever is visible with `target`.
    ///
    /// Any source state is accepted, which matches the close-then-open
    /// pattern the views use. Returns `true` when the state changed.
    pub fn open(&self, target: S) -> bool {
        self.transition(target, "open")
    }

    /// Navigate one step back. Returns `false` (and leaves the state alone)
    /// when the current dialog has no back target.
    pub fn back(&self) -> bool {
        let current = self.current();
        match current.back_target() {
            Some(target) => self.transition(target, "back"),
            None => {
                debug!(target: "dialog_flow", state = ?current, "back ignored");
                false
            }
        }
    }

    /// Hide every dialog.
    pub fn close(&self) -> bool {
        self.transition(S::NONE, "close")
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.state_tx.subscribe()
    }

    fn transition(&self, target: S, cause: &'static str) -> bool {
        let mut from = None;
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == target {
                return false;
            }
            from = Some(*state);
            *state = target;
            true
        });

        if let Some(from) = from {
            debug!(target: "dialog_flow", ?from, to = ?target, cause, "dialog transition");
        }
        changed
    }
}

impl<S: DialogKind> Default for DialogFlow<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DialogKind> fmt::Debug for DialogFlow<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogFlow")
            .field("current", &self.current())
            .finish()
    }
}
