//! Hook-driven HTTP client with a line-oriented event stream decoder.
//!
//! `streamfetch` is the service layer of a console front end, lifted into a
//! library. Every call runs through a pipeline of composable hooks (bearer
//! token injection, 204 normalization, status classification, failure
//! notification) and streaming calls decode a chunked `data: {json}` line
//! protocol into typed events while tolerating partial frames, malformed
//! JSON, and mid-stream error payloads.
//!
//! # Getting started
//!
//! ```ignore
//! use std::sync::Arc;
//! use streamfetch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ClientError> {
//!     let store = MemoryStore::new();
//!     store.set("console_token", "my-token");
//!
//!     let client = Client::new(
//!         ClientConfig::from_env(),
//!         Arc::new(StoredToken::new(store)),
//!         Arc::new(LoggingNotifier),
//!     )?;
//!
//!     // Unary call.
//!     let apps = client
//!         .get("/apps", &RequestSpec::new().query("page", 1), &ClientOptions::default())
//!         .await?;
//!     println!("{:?}", apps.as_json());
//!
//!     // Streaming call, pulled one event at a time.
//!     let spec = RequestSpec::new().json(serde_json::json!({"query": "hi", "inputs": {}}));
//!     let mut stream = client.stream("/chat-messages", &spec, &ClientOptions::default()).await?;
//!     while let Some(event) = stream.next_event().await {
//!         if let StreamEvent::Message(fragment) = event {
//!             print!("{}", fragment.text);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Describe a request:** [`RequestSpec`](api::request::RequestSpec) for
//!   method, headers, query, and body; [`ClientOptions`](api::request::ClientOptions)
//!   for per-call behavior (`silent`, `need_all_response_content`,
//!   `delete_content_type`, abort sink, extra hooks).
//!
//! - **Intercept calls:** implement [`BeforeRequest`](api::hooks::BeforeRequest),
//!   [`AfterResponse`](api::hooks::AfterResponse), or
//!   [`BeforeError`](api::hooks::BeforeError) (closures work too) and add them
//!   through [`Hooks`](api::hooks::Hooks).
//!
//! - **Stream responses:** [`Client::stream`] for a pull-based
//!   [`EventStream`](api::streaming::EventStream), or
//!   [`Client::streaming_call`] with [`StreamHandlers`](api::streaming::StreamHandlers)
//!   callbacks. The decoder itself is [`api::decoder::StreamDecoder`].
//!
//! - **Plug in collaborators:** [`auth::TokenProvider`] supplies the bearer
//!   token (read fresh on every request) and [`notify::Notifier`] receives
//!   user-facing failures.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Request building, hooks, responses, stream decoding, streaming calls |
//! | [`auth`] | Token provider and key-value accessor |
//! | [`notify`] | Notifier trait and benign-cancellation classification |
//! | [`config`] | Immutable base configuration |
//! | [`error`] | [`ClientError`] |
//! | [`demo`] | Typed person lookup |

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod demo;
pub mod error;
pub mod notify;
pub mod prelude;

pub use client::Client;
pub use config::ClientConfig;
pub use error::ClientError;

// ── Content types ──────────────────────────────────────────────────

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_STREAM: &str = "text/event-stream";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded; charset=UTF-8";
/// Forces binary handling of a response.
pub const CONTENT_TYPE_DOWNLOAD: &str = "application/octet-stream";
/// Forces binary handling of a response.
pub const CONTENT_TYPE_DOWNLOAD_ZIP: &str = "application/zip";
