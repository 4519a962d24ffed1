//! Request pipeline: building, hooks, responses, and streaming.
//!
//! These modules handle everything between a caller and the wire:
//!
//! - [`request`]: [`RequestSpec`], [`ClientOptions`], and the pure
//!   [`build_request`](request::build_request) step that produces a
//!   [`PreparedRequest`](request::PreparedRequest).
//! - [`hooks`]: ordered `before_request` / `after_response` / `before_error`
//!   interceptors, including authorization, 204 normalization, and status
//!   classification.
//! - [`response`]: buffered [`RawResponse`], decoded [`ResponseError`], and
//!   the caller-facing [`ResponseBody`].
//! - [`decoder`]: the push-driven [`StreamDecoder`] that turns `data: ` lines
//!   into [`StreamEvent`](decoder::StreamEvent)s.
//! - [`streaming`]: [`EventStream`] and the callback-driven
//!   [`Client::streaming_call`](crate::Client::streaming_call).

pub mod decoder;
pub mod hooks;
pub mod request;
pub mod response;
pub mod streaming;

// Re-export commonly used items at the module level.
pub use decoder::{DecoderState, MessageFragment, StreamDecoder, StreamEvent};
pub use hooks::Hooks;
pub use request::{AbortHandle, Body, ClientOptions, RequestSpec};
pub use response::{RawResponse, ResponseBody, ResponseError};
pub use streaming::{EventStream, StreamHandlers};
