//! Input capture: draft text, key handling and the pending flag.
//!
//! [`ChatInput`] is a cheap cloneable handle. Enter (without Shift) turns
//! the draft into a user message and spawns its submission; Shift+Enter
//! inserts a newline. While a submission is pending the control rejects
//! every edit.
//!
//! The control takes focus when it is created. It owns a cancellation token
//! for its lifetime: calling [`ChatInput::unmount`], or dropping the last
//! handle, abandons a submission whose request or reply is still in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::controller::{SubmissionController, SubmissionOutcome};
use crate::message::{IdGenerator, Message, UuidGenerator};

/// Delay before refocusing after a reply, so the UI can re-render first.
pub const DEFAULT_REFOCUS_DELAY: Duration = Duration::from_millis(10);

/// Placeholder shown in an empty input.
pub const DEFAULT_PLACEHOLDER: &str = "Got any questions?";

/// Something that can take keyboard focus, such as a text area.
pub trait FocusTarget: Send + Sync + std::fmt::Debug {
    fn focus(&self);
}

/// Focus target for surfaces with nothing to focus.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFocus;

impl FocusTarget for NoFocus {
    fn focus(&self) {}
}

/// Keys the input reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Backspace,
    Char(char),
    Other,
}

/// A key press with its Shift modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub shift: bool,
}

impl KeyPress {
    #[must_use]
    pub fn new(key: Key) -> Self {
        Self { key, shift: false }
    }

    #[must_use]
    pub fn shifted(key: Key) -> Self {
        Self { key, shift: true }
    }
}

/// Result of [`ChatInput::handle_key`].
#[derive(Debug)]
pub enum KeyOutcome {
    /// A submission was started.
    Submitted {
        message: Message,
        task: JoinHandle<SubmissionOutcome>,
    },
    /// A newline was inserted into the draft.
    Newline,
    /// The draft was edited.
    Edited,
    /// The input is disabled while a submission is pending.
    Rejected,
    /// The key has no effect.
    Ignored,
}

/// Presentation settings for the input.
#[derive(Debug, Clone)]
pub struct InputSettings {
    pub refocus_delay: Duration,
    pub placeholder: String,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            refocus_delay: DEFAULT_REFOCUS_DELAY,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

/// Handle to a chat input control.
#[derive(Debug, Clone)]
pub struct ChatInput {
    inner: Arc<InputInner>,
}

#[derive(Debug)]
struct InputInner {
    state: Mutex<InputState>,
    controller: SubmissionController,
    focus: Arc<dyn FocusTarget>,
    ids: Arc<dyn IdGenerator>,
    settings: InputSettings,
    lifetime: CancellationToken,
}

#[derive(Debug, Default)]
struct InputState {
    draft: String,
    pending: bool,
}

impl Drop for InputInner {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

impl ChatInput {
    /// Create an input with UUID message ids and default settings.
    #[must_use]
    pub fn new(controller: SubmissionController, focus: Arc<dyn FocusTarget>) -> Self {
        Self::with_options(
            controller,
            focus,
            Arc::new(UuidGenerator),
            InputSettings::default(),
        )
    }

    /// Create an input with explicit id source and settings.
    ///
    /// The focus target receives focus immediately.
    #[must_use]
    pub fn with_options(
        controller: SubmissionController,
        focus: Arc<dyn FocusTarget>,
        ids: Arc<dyn IdGenerator>,
        settings: InputSettings,
    ) -> Self {
        // Mounting focuses the control.
        focus.focus();
        Self {
            inner: Arc::new(InputInner {
                state: Mutex::new(InputState::default()),
                controller,
                focus,
                ids,
                settings,
                lifetime: CancellationToken::new(),
            }),
        }
    }

    /// Current draft text.
    #[must_use]
    pub fn draft(&self) -> String {
        self.inner.lock().draft.clone()
    }

    /// Whether a submission is in flight. The control is disabled while true.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.lock().pending
    }

    #[must_use]
    pub fn placeholder(&self) -> &str {
        &self.inner.settings.placeholder
    }

    /// Replace the draft, as a text-change event does. Rejected while pending.
    pub fn set_draft(&self, text: impl Into<String>) -> bool {
        let mut state = self.inner.lock();
        if state.pending {
            return false;
        }
        state.draft = text.into();
        true
    }

    /// React to a key press.
    ///
    /// Must be called from within a tokio runtime; Enter spawns the
    /// submission onto it.
    pub fn handle_key(&self, press: KeyPress) -> KeyOutcome {
        let mut state = self.inner.lock();
        if state.pending {
            return KeyOutcome::Rejected;
        }

        match press.key {
            Key::Enter if press.shift => {
                state.draft.push('\n');
                KeyOutcome::Newline
            }
            Key::Enter => {
                let message = Message::user(self.inner.ids.next_id(), state.draft.clone());
                state.pending = true;
                drop(state);

                let task = self.spawn_submission(message.clone());
                KeyOutcome::Submitted { message, task }
            }
            Key::Backspace => {
                state.draft.pop();
                KeyOutcome::Edited
            }
            Key::Char(c) => {
                state.draft.push(c);
                KeyOutcome::Edited
            }
            Key::Other => KeyOutcome::Ignored,
        }
    }

    /// Abandon any in-flight submission, whether it is still waiting on the
    /// request or streaming the reply.
    pub fn unmount(&self) {
        self.inner.lifetime.cancel();
    }

    fn spawn_submission(&self, message: Message) -> JoinHandle<SubmissionOutcome> {
        let controller = self.inner.controller.clone();
        let cancel = self.inner.lifetime.child_token();
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let outcome = controller.submit(message, &cancel).await;
            settle(&weak, &outcome).await;
            outcome
        })
    }
}

/// Apply a finished submission to the input, if it is still alive.
async fn settle(weak: &Weak<InputInner>, outcome: &SubmissionOutcome) {
    let Some(inner) = weak.upgrade() else {
        return;
    };

    match outcome {
        SubmissionOutcome::Completed { .. } => {
            {
                let mut state = inner.lock();
                state.draft.clear();
                state.pending = false;
            }
            let delay = inner.settings.refocus_delay;
            drop(inner);

            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                debug!(name: "input.refocus", "Refocusing input");
                inner.focus.focus();
            }
        }
        SubmissionOutcome::Failed { .. } => {
            inner.lock().pending = false;
            inner.focus.focus();
        }
        SubmissionOutcome::Cancelled { .. } => {
            inner.lock().pending = false;
        }
    }
}

impl InputInner {
    fn lock(&self) -> MutexGuard<'_, InputState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
