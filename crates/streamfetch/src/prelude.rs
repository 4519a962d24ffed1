//! Convenience re-exports for common `streamfetch` types.
//!
//! Meant to be glob-imported by callers:
//!
//! ```ignore
//! use streamfetch::prelude::*;
//! ```
//!
//! This pulls in what most programs need: the [`Client`] and its config,
//! request options, the stream types, and the token/notifier seams. Hook
//! implementations and the raw decoder are left out; import those from
//! their modules directly when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{Client, ClientConfig, ClientError};

// ── Requests and responses ──────────────────────────────────────────
pub use crate::api::{
    AbortHandle, Body, ClientOptions, Hooks, RawResponse, RequestSpec, ResponseBody, ResponseError,
};

// ── Streaming ───────────────────────────────────────────────────────
pub use crate::api::{EventStream, MessageFragment, StreamEvent, StreamHandlers};

// ── Collaborators ───────────────────────────────────────────────────
pub use crate::auth::{KeyValueStore, MemoryStore, StaticToken, StoredToken, TokenProvider};
pub use crate::notify::{LoggingNotifier, NoopNotifier, Notification, Notifier, Severity};
