//! Streaming calls over the line-oriented event protocol.
//!
//! Two shapes are offered on [`Client`]:
//!
//! - [`Client::stream`] returns an [`EventStream`]: a lazy, finite,
//!   non-restartable sequence of [`StreamEvent`]s that the caller pulls with
//!   [`EventStream::next_event`] (or adapts with
//!   [`into_stream`](EventStream::into_stream)). Aborting its handle ends the
//!   sequence with a cancellation error followed by completion.
//! - [`Client::streaming_call`] drives the same stream to completion and
//!   routes events to [`StreamHandlers`] callbacks, notifying the user about
//!   failures the way the unary path does.

use std::collections::VecDeque;

use futures::Stream;
use reqwest::Method;
use tracing::{debug, trace};

use super::decoder::{MessageFragment, StreamDecoder, StreamEvent};
use super::request::{AbortHandle, ClientOptions, RequestSpec};
use crate::client::Client;
use crate::error::ClientError;
use crate::notify::{Notification, is_benign_cancellation};

/// Message reported when a rejected stream's error body has none.
pub const SERVER_ERROR_MESSAGE: &str = "Server Error";

// ── EventStream ────────────────────────────────────────────────────

/// Pull-based event sequence for one streaming response.
pub struct EventStream {
    response: Option<reqwest::Response>,
    decoder: StreamDecoder,
    pending: VecDeque<StreamEvent>,
    abort: AbortHandle,
}

impl EventStream {
    fn new(response: reqwest::Response, abort: AbortHandle) -> Self {
        Self {
            response: Some(response),
            decoder: StreamDecoder::new(),
            pending: VecDeque::new(),
            abort,
        }
    }

    /// Handle that cancels this stream.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Next event, or `None` once the terminal `Completed` event has been
    /// returned.
    ///
    /// Reads another chunk only when no decoded events are waiting. A read
    /// failure or an abort ends the stream with `Error` then `Completed`.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let response = self.response.as_mut()?;
            let chunk = tokio::select! {
                biased;
                _ = self.abort.aborted() => Err(ClientError::Cancelled),
                chunk = response.chunk() => chunk.map_err(ClientError::Transport),
            };
            let events = match chunk {
                Ok(Some(bytes)) => {
                    trace!("stream chunk: {} bytes", bytes.len());
                    self.decoder.push(&bytes)
                }
                Ok(None) => self.decoder.finish(),
                Err(e) => self.decoder.fail(e.to_string()),
            };
            if self.decoder.is_finished() {
                // Drop the connection; nothing more will be read.
                self.response = None;
            }
            self.pending.extend(events);
        }
    }

    /// Adapt into a [`futures::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            stream.next_event().await.map(|event| (event, stream))
        })
    }

    /// Drain the remaining events.
    pub async fn collect(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }
}

// ── StreamHandlers ─────────────────────────────────────────────────

type MessageFn<'a> = Box<dyn FnMut(MessageFragment) + Send + 'a>;
type ErrorFn<'a> = Box<dyn FnMut(&str, Option<&str>) + Send + 'a>;
type CompletedFn<'a> = Box<dyn FnMut(bool, Option<&str>) + Send + 'a>;
type AbortFn<'a> = Box<dyn FnMut(AbortHandle) + Send + 'a>;

/// Callbacks for [`Client::streaming_call`]. Unset callbacks are no-ops.
///
/// ```ignore
/// let mut answer = String::new();
/// let handlers = StreamHandlers::new()
///     .on_message(|m| answer.push_str(&m.text))
///     .on_error(|msg, _code| eprintln!("stream failed: {msg}"));
/// client.streaming_call("/chat-messages", &spec, &options, handlers).await;
/// ```
pub struct StreamHandlers<'a> {
    on_message: MessageFn<'a>,
    on_error: ErrorFn<'a>,
    on_completed: CompletedFn<'a>,
    on_abort_handle: AbortFn<'a>,
}

impl Default for StreamHandlers<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> StreamHandlers<'a> {
    pub fn new() -> Self {
        Self {
            on_message: Box::new(|_| {}),
            on_error: Box::new(|_, _| {}),
            on_completed: Box::new(|_, _| {}),
            on_abort_handle: Box::new(|_| {}),
        }
    }

    /// Called for every answer fragment.
    pub fn on_message(mut self, f: impl FnMut(MessageFragment) + Send + 'a) -> Self {
        self.on_message = Box::new(f);
        self
    }

    /// Called once with the error message and optional code.
    pub fn on_error(mut self, f: impl FnMut(&str, Option<&str>) + Send + 'a) -> Self {
        self.on_error = Box::new(f);
        self
    }

    /// Called exactly once when the call ends, with `had_error` and the
    /// error message if any.
    pub fn on_completed(mut self, f: impl FnMut(bool, Option<&str>) + Send + 'a) -> Self {
        self.on_completed = Box::new(f);
        self
    }

    /// Receives the abort handle before the request is sent.
    pub fn on_abort_handle(mut self, f: impl FnMut(AbortHandle) + Send + 'a) -> Self {
        self.on_abort_handle = Box::new(f);
        self
    }
}

// ── Client ─────────────────────────────────────────────────────────

impl Client {
    /// Open a streaming request and return its event sequence.
    ///
    /// Defaults to POST. Rejected statuses are classified exactly like unary
    /// calls (including notifications) and returned as errors; the body of a
    /// rejected response is never decoded as a stream.
    pub async fn stream(
        &self,
        path: &str,
        spec: &RequestSpec,
        options: &ClientOptions,
    ) -> Result<EventStream, ClientError> {
        let abort = options.new_abort_handle();
        self.open_stream(path, spec, options, abort).await
    }

    async fn open_stream(
        &self,
        path: &str,
        spec: &RequestSpec,
        options: &ClientOptions,
        abort: AbortHandle,
    ) -> Result<EventStream, ClientError> {
        let hooks = self.pipeline(options);
        let method = spec.method.clone().unwrap_or(Method::POST);
        // Authorization runs last in the pipeline, right before the send.
        let prepared = self.prepare(path, spec, options, &hooks, method)?;
        // Streams are not bounded by the unary timeout.
        let response = self.send(&prepared, &hooks, &abort, None).await?;

        let status = response.status().as_u16();
        if !(200..400).contains(&status) {
            let raw = Self::read_body(response, &hooks, &abort).await?;
            hooks.run_after_response(&prepared, raw)?;
            // Only reachable if a caller hook accepted the failure status.
            return Err(ClientError::Decode(format!(
                "stream rejected with HTTP {status}"
            )));
        }
        debug!("stream opened: HTTP {status}");
        Ok(EventStream::new(response, abort))
    }

    /// Run a streaming request to completion, routing events to `handlers`.
    ///
    /// `on_error` fires at most once and `on_completed` exactly once. Stream
    /// errors are shown through the notifier unless the call is silent or the
    /// error is a benign cancellation.
    pub async fn streaming_call(
        &self,
        path: &str,
        spec: &RequestSpec,
        options: &ClientOptions,
        mut handlers: StreamHandlers<'_>,
    ) {
        let abort = options.new_abort_handle();
        (handlers.on_abort_handle)(abort.clone());

        let mut stream = match self.open_stream(path, spec, options, abort).await {
            Ok(stream) => stream,
            Err(e) => {
                let (mut message, code) = match &e {
                    ClientError::Unauthorized(response) => {
                        let error = response.error_body();
                        (error.message, Some(error.code))
                    }
                    ClientError::Forbidden { error, .. } | ClientError::Status { error, .. } => {
                        (error.message.clone(), Some(error.code.clone()))
                    }
                    other => (other.to_string(), None),
                };
                if message.is_empty() {
                    message = SERVER_ERROR_MESSAGE.to_string();
                }
                let code = code.filter(|c| !c.is_empty());
                (handlers.on_error)(&message, code.as_deref());
                (handlers.on_completed)(true, Some(&message));
                return;
            }
        };

        while let Some(event) = stream.next_event().await {
            match event {
                StreamEvent::Message(fragment) => (handlers.on_message)(fragment),
                StreamEvent::Error { message, code } => {
                    (handlers.on_error)(&message, code.as_deref());
                    if !options.silent && !is_benign_cancellation(&message) {
                        self.notifier.notify(&Notification::error(&message));
                    }
                }
                StreamEvent::Completed {
                    had_error,
                    error_message,
                } => (handlers.on_completed)(had_error, error_message.as_deref()),
            }
        }
    }
}
