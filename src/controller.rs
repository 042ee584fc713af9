//! Submission controller: optimistic append, send, stream the reply.
//!
//! Ordering per submission:
//!
//! 1. the user message is appended before the request starts,
//! 2. the empty reply placeholder is appended before the first chunk,
//! 3. each chunk is applied before the next read.
//!
//! A failure before any reply arrives rolls the user message back and
//! emits exactly one notification. Cancellation is honoured while the
//! request is in flight as well as while the reply streams.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::message::{IdGenerator, Message, MessagesPayload, UuidGenerator};
use crate::notify::{Notifier, SEND_FAILED};
use crate::store::MessageStore;
use crate::stream::{StreamSummary, consume_stream};
use crate::transport::{ByteStream, MessageTransport};

/// How a submission settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The reply streamed to completion.
    Completed {
        response_id: String,
        summary: StreamSummary,
    },
    /// The request or the reply stream failed.
    ///
    /// A failure before any reply arrived removes the user message
    /// (`rolled_back: true`). A failure while the reply was streaming keeps
    /// the user message and the partial reply (`rolled_back: false`), so the
    /// exchange stays paired.
    Failed {
        /// Whether the user message was removed from the store.
        rolled_back: bool,
    },
    /// The submission was abandoned through the cancellation token.
    ///
    /// `response_id` is `None` when the request itself was cancelled: no
    /// placeholder was added and the user message was removed. Otherwise the
    /// partial reply stays in the store.
    Cancelled { response_id: Option<String> },
}

impl SubmissionOutcome {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Drives one submission at a time against injected collaborators.
#[derive(Debug, Clone)]
pub struct SubmissionController {
    store: Arc<dyn MessageStore>,
    transport: Arc<dyn MessageTransport>,
    notifier: Arc<dyn Notifier>,
    ids: Arc<dyn IdGenerator>,
}

impl SubmissionController {
    /// Create a controller that generates reply ids with UUID v4.
    #[must_use]
    pub fn new(
        store: Arc<dyn MessageStore>,
        transport: Arc<dyn MessageTransport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_ids(store, transport, notifier, Arc::new(UuidGenerator))
    }

    /// Create a controller with a custom reply id source.
    #[must_use]
    pub fn with_ids(
        store: Arc<dyn MessageStore>,
        transport: Arc<dyn MessageTransport>,
        notifier: Arc<dyn Notifier>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            store,
            transport,
            notifier,
            ids,
        }
    }

    /// The store this controller mutates.
    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Submit `message` and stream the reply into the store.
    pub async fn submit(&self, message: Message, cancel: &CancellationToken) -> SubmissionOutcome {
        let user_id = message.id.clone();
        info!(
            name: "submission.started",
            message_id = %user_id,
            text_len = message.text.len(),
            "Submitting message"
        );

        self.store.add_message(message.clone());

        let request = self.request(MessagesPayload::single(message));
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = request => Some(result),
        };

        let stream = match result {
            None => {
                warn!(
                    name: "submission.cancelled",
                    message_id = %user_id,
                    "Request cancelled before reply"
                );
                self.store.remove_message(&user_id);
                return SubmissionOutcome::Cancelled { response_id: None };
            }
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                error!(
                    name: "submission.failed",
                    message_id = %user_id,
                    error = %e,
                    "Submission failed before reply"
                );
                self.notifier.error(SEND_FAILED);
                self.store.remove_message(&user_id);
                return SubmissionOutcome::Failed { rolled_back: true };
            }
        };

        let response_id = self.ids.next_id();
        self.store.add_message(Message::response(response_id.clone()));
        self.store.set_is_message_updating(true);

        let result = consume_stream(stream, self.store.as_ref(), &response_id, cancel).await;
        self.store.set_is_message_updating(false);

        match result {
            Ok(summary) if summary.cancelled => {
                warn!(
                    name: "submission.cancelled",
                    message_id = %user_id,
                    response_id = %response_id,
                    "Reply stream cancelled"
                );
                SubmissionOutcome::Cancelled {
                    response_id: Some(response_id),
                }
            }
            Ok(summary) => {
                info!(
                    name: "submission.completed",
                    message_id = %user_id,
                    response_id = %response_id,
                    "Reply complete"
                );
                SubmissionOutcome::Completed {
                    response_id,
                    summary,
                }
            }
            Err(e) => {
                // The exchange is already visible; keep both messages.
                error!(
                    name: "submission.stream_failed",
                    message_id = %user_id,
                    response_id = %response_id,
                    error = %e,
                    "Reply stream failed"
                );
                self.notifier.error(SEND_FAILED);
                SubmissionOutcome::Failed { rolled_back: false }
            }
        }
    }

    async fn request(&self, payload: MessagesPayload) -> Result<ByteStream> {
        self.transport
            .send(&payload)
            .await?
            .ok_or(Error::MissingStream)
    }
}
