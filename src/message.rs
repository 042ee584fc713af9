//! Chat message entity and the request payload sent to the backend.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single chat message.
///
/// Serialized in camelCase so the wire shape is
/// `{ "id": "...", "isUserMessage": true, "text": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Client-generated identifier.
    pub id: String,
    /// `true` for messages typed by the user, `false` for replies.
    pub is_user_message: bool,
    /// Message text. Replies grow while their stream is consumed.
    pub text: String,
}

impl Message {
    /// Create a user-origin message.
    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_user_message: true,
            text: text.into(),
        }
    }

    /// Create an empty reply placeholder.
    pub fn response(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_user_message: false,
            text: String::new(),
        }
    }
}

/// Request body for the message submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesPayload {
    pub messages: Vec<Message>,
}

impl MessagesPayload {
    /// Wrap a single message.
    pub fn single(message: Message) -> Self {
        Self {
            messages: vec![message],
        }
    }
}

/// Source of client-side message identifiers.
pub trait IdGenerator: Send + Sync + Debug {
    /// Produce a fresh identifier.
    fn next_id(&self) -> String;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix><n>` identifiers, starting at 1.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIds {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{n}", self.prefix)
    }
}
