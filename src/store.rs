//! Ordered chat message store.
//!
//! The submission flow never reaches for ambient state: it is handed a
//! [`MessageStore`] and mutates it through explicit operations.
//!
//! # Example
//!
//! ```rust
//! use chat_input::message::Message;
//! use chat_input::store::{MessageStore, SharedMessageStore};
//!
//! let store = SharedMessageStore::new();
//! store.add_message(Message::response("r1"));
//! store.update_message("r1", &|prev| format!("{prev}Hel"));
//! store.update_message("r1", &|prev| format!("{prev}lo"));
//!
//! assert_eq!(store.messages()[0].text, "Hello");
//! ```

use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::message::Message;

/// Capacity of the change-notification channel.
const EVENT_CAPACITY: usize = 256;

/// Operations the submission flow needs from a message collection.
pub trait MessageStore: Send + Sync + Debug {
    /// Append a message at the end.
    fn add_message(&self, message: Message);

    /// Remove the message with the given id. Unknown ids are ignored.
    fn remove_message(&self, id: &str);

    /// Replace a message's text with `update(current_text)`. Unknown ids are ignored.
    fn update_message(&self, id: &str, update: &dyn Fn(&str) -> String);

    /// Mark whether a reply is currently being streamed in.
    fn set_is_message_updating(&self, updating: bool);

    /// Whether a reply is currently being streamed in.
    fn is_message_updating(&self) -> bool;

    /// Snapshot of all messages in insertion order.
    fn messages(&self) -> Vec<Message>;
}

/// Change notification emitted by [`SharedMessageStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Added(Message),
    Removed { id: String },
    Updated { id: String, text: String },
    Updating(bool),
}

/// Thread-safe in-memory store.
///
/// Cloning yields another handle to the same messages.
#[derive(Debug, Clone)]
pub struct SharedMessageStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    messages: RwLock<Vec<Message>>,
    updating: RwLock<bool>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for SharedMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                messages: RwLock::new(Vec::new()),
                updating: RwLock::new(false),
                events,
            }),
        }
    }

    /// Subscribe to changes made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    /// Look up a message by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Message> {
        self.read().iter().find(|m| m.id == id).cloned()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Message>> {
        self.inner
            .messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Message>> {
        self.inner
            .messages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

impl MessageStore for SharedMessageStore {
    fn add_message(&self, message: Message) {
        self.write().push(message.clone());
        self.emit(StoreEvent::Added(message));
    }

    fn remove_message(&self, id: &str) {
        let removed = {
            let mut guard = self.write();
            let before = guard.len();
            guard.retain(|m| m.id != id);
            before != guard.len()
        };
        if removed {
            self.emit(StoreEvent::Removed { id: id.to_string() });
        }
    }

    fn update_message(&self, id: &str, update: &dyn Fn(&str) -> String) {
        let updated = {
            let mut guard = self.write();
            guard.iter_mut().find(|m| m.id == id).map(|m| {
                m.text = update(&m.text);
                m.text.clone()
            })
        };
        if let Some(text) = updated {
            self.emit(StoreEvent::Updated {
                id: id.to_string(),
                text,
            });
        }
    }

    fn set_is_message_updating(&self, updating: bool) {
        *self
            .inner
            .updating
            .write()
            .unwrap_or_else(PoisonError::into_inner) = updating;
        self.emit(StoreEvent::Updating(updating));
    }

    fn is_message_updating(&self) -> bool {
        *self
            .inner
            .updating
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn messages(&self) -> Vec<Message> {
        self.read().clone()
    }
}
