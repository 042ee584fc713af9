//! Chat input with streamed replies.
//!
//! Captures a draft, submits it to a message endpoint and renders the reply
//! incrementally as its body streams in.
//!
//! # Architecture
//!
//! - **Input**: draft text, Enter / Shift+Enter handling, pending flag
//! - **Controller**: optimistic append, request, rollback on failure
//! - **Stream consumer**: sequential chunk reads, incremental UTF-8 decoding
//! - **Store**: ordered messages behind an injected trait
//!
//! # Modules
//!
//! - [`input`]: the input control
//! - [`controller`]: one submission from request to settled outcome
//! - [`stream`]: reply stream consumption
//! - [`transport`]: HTTP boundary
//! - [`store`]: message store trait and shared implementation
//! - [`server`]: reference `/api/message` backend

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod controller;
pub mod decode;
pub mod error;
pub mod input;
pub mod message;
pub mod notify;
pub mod server;
pub mod store;
pub mod stream;
pub mod transport;

pub use controller::{SubmissionController, SubmissionOutcome};
pub use error::{Error, Result};
pub use input::{ChatInput, Key, KeyOutcome, KeyPress};
pub use message::{Message, MessagesPayload};
pub use store::{MessageStore, SharedMessageStore};
