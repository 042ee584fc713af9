//! Streaming consumer: appends a reply body into a store message.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::decode::Utf8ChunkDecoder;
use crate::error::Result;
use crate::store::MessageStore;
use crate::transport::ByteStream;

/// What a consumed stream delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Chunks received from the body.
    pub chunks: usize,
    /// Raw bytes received.
    pub bytes: usize,
    /// Whether the loop stopped because `cancel` fired.
    pub cancelled: bool,
}

/// Read `stream` to completion, appending decoded text to message `id`.
///
/// Reads are sequential: a chunk is applied to the store before the next
/// read is issued. The loop exits when the stream ends, a read fails, or
/// `cancel` fires. Text appended before a failure stays in the store.
pub async fn consume_stream(
    mut stream: ByteStream,
    store: &dyn MessageStore,
    id: &str,
    cancel: &CancellationToken,
) -> Result<StreamSummary> {
    let mut decoder = Utf8ChunkDecoder::new();
    let mut summary = StreamSummary::default();

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                summary.cancelled = true;
                break;
            }
            next = stream.next() => next,
        };

        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;

        summary.chunks += 1;
        summary.bytes += chunk.len();

        let text = decoder.decode(&chunk);
        debug!(
            name: "stream.chunk",
            message_id = %id,
            bytes = chunk.len(),
            "Reply chunk received"
        );
        append(store, id, &text);
    }

    append(store, id, &decoder.finish());

    info!(
        name: "stream.finished",
        message_id = %id,
        chunks = summary.chunks,
        bytes = summary.bytes,
        cancelled = summary.cancelled,
        "Reply stream finished"
    );
    Ok(summary)
}

fn append(store: &dyn MessageStore, id: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    store.update_message(id, &|prev| format!("{prev}{text}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::message::Message;
    use crate::store::{SharedMessageStore, StoreEvent};
    use bytes::Bytes;

    fn stream_of(chunks: Vec<Result<Bytes>>) -> ByteStream {
        Box::pin(futures::stream::iter(chunks))
    }

    #[tokio::test]
    async fn test_chunks_append_in_order() {
        let store = SharedMessageStore::new();
        store.add_message(Message::response("r1"));
        let mut rx = store.subscribe();

        let stream = stream_of(vec![Ok(Bytes::from("Hel")), Ok(Bytes::from("lo"))]);
        let summary = consume_stream(stream, &store, "r1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.bytes, 5);
        assert!(!summary.cancelled);
        assert_eq!(store.get("r1").unwrap().text, "Hello");

        // Exactly two appends, in chunk order.
        assert_eq!(
            rx.try_recv().unwrap(),
            StoreEvent::Updated { id: "r1".into(), text: "Hel".into() }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            StoreEvent::Updated { id: "r1".into(), text: "Hello".into() }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_split_character_across_chunks() {
        let store = SharedMessageStore::new();
        store.add_message(Message::response("r1"));

        let euro = "€".as_bytes();
        let stream = stream_of(vec![
            Ok(Bytes::copy_from_slice(&euro[..1])),
            Ok(Bytes::copy_from_slice(&euro[1..])),
        ]);
        consume_stream(stream, &store, "r1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(store.get("r1").unwrap().text, "€");
    }

    #[tokio::test]
    async fn test_error_mid_stream_keeps_partial_text() {
        let store = SharedMessageStore::new();
        store.add_message(Message::response("r1"));

        let stream = stream_of(vec![
            Ok(Bytes::from("partial")),
            Err(Error::Stream("connection reset".into())),
            Ok(Bytes::from("never")),
        ]);
        let err = consume_stream(stream, &store, "r1", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Stream(_)));
        assert_eq!(store.get("r1").unwrap().text, "partial");
    }

    #[tokio::test]
    async fn test_cancel_stops_pending_read() {
        let store = SharedMessageStore::new();
        store.add_message(Message::response("r1"));

        // First chunk, then a read that never completes.
        let stream: ByteStream = Box::pin(
            futures::stream::iter(vec![Ok(Bytes::from("Hi"))]).chain(futures::stream::pending::<Result<Bytes>>()),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            trigger.cancel();
        });

        let summary = consume_stream(stream, &store, "r1", &cancel).await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.chunks, 1);
        assert_eq!(store.get("r1").unwrap().text, "Hi");
    }
}
