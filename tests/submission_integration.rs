use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chat_input::input::{ChatInput, InputSettings, Key, KeyOutcome, KeyPress, NoFocus};
use chat_input::message::{Message, MessagesPayload, SequentialIds};
use chat_input::notify::{Notifier, SEND_FAILED};
use chat_input::store::{MessageStore, SharedMessageStore, StoreEvent};
use chat_input::transport::{ByteStream, MessageTransport};
use chat_input::{Error, Result, SubmissionController};

// Scripted transport: records payloads and replies with fixed chunks or a status.
#[derive(Debug)]
struct ScriptedTransport {
    chunks: Option<Vec<&'static str>>,
    payloads: Mutex<Vec<MessagesPayload>>,
}

impl ScriptedTransport {
    fn replying(chunks: Vec<&'static str>) -> Self {
        Self {
            chunks: Some(chunks),
            payloads: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            chunks: None,
            payloads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl MessageTransport for ScriptedTransport {
    async fn send(&self, payload: &MessagesPayload) -> Result<Option<ByteStream>> {
        self.payloads.lock().unwrap().push(payload.clone());
        match &self.chunks {
            Some(chunks) => {
                let items: Vec<Result<Bytes>> =
                    chunks.iter().map(|c| Ok(Bytes::from(*c))).collect();
                Ok(Some(Box::pin(futures::stream::iter(items))))
            }
            None => Err(Error::Status { status: 500 }),
        }
    }
}

#[derive(Debug, Default)]
struct RecordingNotifier(Mutex<Vec<String>>);

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

struct Harness {
    input: ChatInput,
    store: SharedMessageStore,
    transport: Arc<ScriptedTransport>,
    notifier: Arc<RecordingNotifier>,
}

fn harness(transport: ScriptedTransport) -> Harness {
    let store = SharedMessageStore::new();
    let transport = Arc::new(transport);
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = SubmissionController::with_ids(
        Arc::new(store.clone()),
        Arc::clone(&transport) as Arc<dyn MessageTransport>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Arc::new(SequentialIds::new("r")),
    );
    let input = ChatInput::with_options(
        controller,
        Arc::new(NoFocus),
        Arc::new(SequentialIds::new("u")),
        InputSettings::default(),
    );
    Harness {
        input,
        store,
        transport,
        notifier,
    }
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_submission() {
    let h = harness(ScriptedTransport::replying(vec!["Hi", " there"]));
    let mut events = h.store.subscribe();

    h.input.set_draft("hi");
    let KeyOutcome::Submitted { message, task } = h.input.handle_key(KeyPress::new(Key::Enter))
    else {
        panic!("Enter should submit");
    };
    assert_eq!(message, Message::user("u1", "hi"));

    let outcome = task.await.unwrap();
    assert!(outcome.is_completed());

    assert_eq!(
        h.store.messages(),
        vec![
            Message::user("u1", "hi"),
            Message {
                id: "r1".into(),
                is_user_message: false,
                text: "Hi there".into(),
            },
        ]
    );
    assert!(!h.input.is_pending());
    assert!(!h.store.is_message_updating());
    assert_eq!(h.input.draft(), "");
    assert!(h.notifier.0.lock().unwrap().is_empty());

    // Wire payload carries exactly the submitted message.
    let payloads = h.transport.payloads.lock().unwrap();
    assert_eq!(payloads.as_slice(), [MessagesPayload::single(Message::user("u1", "hi"))]);

    // Store mutation order: user, placeholder, updating, two appends, done.
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            StoreEvent::Added(Message::user("u1", "hi")),
            StoreEvent::Added(Message::response("r1")),
            StoreEvent::Updating(true),
            StoreEvent::Updated { id: "r1".into(), text: "Hi".into() },
            StoreEvent::Updated { id: "r1".into(), text: "Hi there".into() },
            StoreEvent::Updating(false),
        ]
    );
}

#[tokio::test]
async fn test_failure_rolls_back_and_notifies_once() {
    let h = harness(ScriptedTransport::failing());
    let mut events = h.store.subscribe();

    h.input.set_draft("hi");
    let KeyOutcome::Submitted { task, .. } = h.input.handle_key(KeyPress::new(Key::Enter)) else {
        panic!("Enter should submit");
    };
    task.await.unwrap();

    assert!(h.store.is_empty());
    assert_eq!(h.notifier.0.lock().unwrap().as_slice(), [SEND_FAILED]);
    assert_eq!(h.input.draft(), "hi");
    assert!(!h.input.is_pending());

    assert_eq!(events.try_recv().unwrap(), StoreEvent::Added(Message::user("u1", "hi")));
    assert_eq!(events.try_recv().unwrap(), StoreEvent::Removed { id: "u1".into() });
}

#[tokio::test]
async fn test_successive_exchanges_keep_order() {
    let h = harness(ScriptedTransport::replying(vec!["ok"]));

    for text in ["one", "two"] {
        h.input.set_draft(text);
        let KeyOutcome::Submitted { task, .. } = h.input.handle_key(KeyPress::new(Key::Enter))
        else {
            panic!("Enter should submit");
        };
        task.await.unwrap();
    }

    let ids: Vec<_> = h.store.messages().into_iter().map(|m| m.id).collect();
    assert_eq!(ids, ["u1", "r1", "u2", "r2"]);
}

#[tokio::test]
async fn test_multiline_draft_is_submitted_verbatim() {
    let h = harness(ScriptedTransport::replying(vec!["ok"]));

    h.input.set_draft("first");
    assert!(matches!(
        h.input.handle_key(KeyPress::shifted(Key::Enter)),
        KeyOutcome::Newline
    ));
    h.input.handle_key(KeyPress::new(Key::Char('2')));

    let KeyOutcome::Submitted { message, task } = h.input.handle_key(KeyPress::new(Key::Enter))
    else {
        panic!("Enter should submit");
    };
    task.await.unwrap();

    assert_eq!(message.text, "first\n2");
    assert_eq!(h.store.messages()[0].text, "first\n2");
}
