//! Chat input CLI.
//!
//! `serve` runs the reference backend; `chat` (the default) reads lines from
//! stdin and streams each reply to stdout.

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::map_err_ignore)]
#![allow(clippy::manual_let_else)]

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use chat_input::config::{AppConfig, ClientConfig, Command};
use chat_input::input::{ChatInput, Key, KeyOutcome, KeyPress, NoFocus};
use chat_input::message::UuidGenerator;
use chat_input::notify::Notifier;
use chat_input::server;
use chat_input::store::{SharedMessageStore, StoreEvent};
use chat_input::transport::HttpTransport;
use chat_input::SubmissionController;

/// Prints notifications to stderr, standing in for a toast.
#[derive(Debug)]
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn error(&self, message: &str) {
        eprintln!("! {message}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    // Initialize tracing (M-LOG-STRUCTURED); stdout is reserved for replies.
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let (config, command) =
        AppConfig::load_from_args(std::env::args()).context("Configuration error")?;

    match command.unwrap_or(Command::Chat) {
        Command::Serve => server::start_server(&config.server).await,
        Command::Chat => run_chat(&config.client).await,
    }
}

async fn run_chat(config: &ClientConfig) -> anyhow::Result<()> {
    let transport = HttpTransport::new(&config.base_url, &config.endpoint)?;
    info!(
        name: "chat.config.loaded",
        endpoint = %transport.endpoint(),
        "Chat client configured"
    );

    let store = SharedMessageStore::new();
    let controller = SubmissionController::new(
        Arc::new(store.clone()),
        Arc::new(transport),
        Arc::new(StderrNotifier),
    );
    let input = ChatInput::with_options(
        controller,
        Arc::new(NoFocus),
        Arc::new(UuidGenerator),
        config.input_settings(),
    );

    let renderer = tokio::spawn(render(store.subscribe()));

    eprintln!("{} (end a line with \\ for a newline)", input.placeholder());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let (text, newline) = match line.strip_suffix('\\') {
            Some(text) => (text, true),
            None => (line.as_str(), false),
        };
        input.set_draft(format!("{}{text}", input.draft()));

        if newline {
            input.handle_key(KeyPress::shifted(Key::Enter));
            continue;
        }
        if let KeyOutcome::Submitted { task, .. } = input.handle_key(KeyPress::new(Key::Enter)) {
            task.await?;
        }
    }

    // Dropping every handle closes the event channel and ends the renderer.
    input.unmount();
    drop(input);
    drop(store);
    renderer.await?;
    Ok(())
}

/// Write streamed reply text to stdout as it arrives.
async fn render(mut events: tokio::sync::broadcast::Receiver<StoreEvent>) {
    let mut replies = ReplyPrinter::default();
    let mut stdout = std::io::stdout();

    loop {
        match events.recv().await {
            Ok(event) => {
                if let Err(e) = replies.apply(&event, &mut stdout) {
                    debug!(
                        name: "render.write_failed",
                        error = %e,
                        "Failed to write reply text"
                    );
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(name: "render.lagged", skipped, "Renderer fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Tracks how much of each streaming reply has been written.
#[derive(Debug, Default)]
struct ReplyPrinter {
    printed: HashMap<String, usize>,
}

impl ReplyPrinter {
    fn apply(&mut self, event: &StoreEvent, out: &mut impl Write) -> std::io::Result<()> {
        match event {
            StoreEvent::Added(message) if !message.is_user_message => {
                self.printed.insert(message.id.clone(), 0);
            }
            StoreEvent::Updated { id, text } => {
                if let Some(len) = self.printed.get_mut(id) {
                    let delta = text.get(*len..).unwrap_or_default();
                    *len = text.len();
                    write!(out, "{delta}")?;
                    out.flush()?;
                }
            }
            StoreEvent::Updating(false) => {
                // Streaming ended; nothing more will arrive for these replies.
                self.printed.clear();
                writeln!(out)?;
            }
            _ => {}
        }
        Ok(())
    }
}
