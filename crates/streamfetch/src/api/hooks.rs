//! Ordered request/response interceptors.
//!
//! A call's pipeline is three ordered lists of hooks:
//!
//! 1. **[`BeforeRequest`]**: mutate the [`PreparedRequest`] just before it is
//!    sent (e.g. [`AuthorizationHook`]).
//! 2. **[`AfterResponse`]**: inspect or replace the buffered [`RawResponse`],
//!    or reject the call (e.g. [`NoContentHook`], [`StatusHook`]).
//! 3. **[`BeforeError`]**: observe a transport failure before it propagates
//!    (e.g. [`NotifyOnError`]).
//!
//! Hooks run in list order and the first rejection short-circuits the rest.
//! A [`Hooks`] value is never mutated once a call starts: each call builds its
//! own pipeline by concatenating the client's base hooks with the per-call
//! additions via [`Hooks::extend`].

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use tracing::debug;

use super::request::PreparedRequest;
use super::response::RawResponse;
use crate::auth::TokenProvider;
use crate::error::ClientError;
use crate::notify::{Notification, Notifier, is_benign_cancellation};

// ── Hook traits ────────────────────────────────────────────────────

/// Runs before the request is sent.
pub trait BeforeRequest: Send + Sync {
    fn before_request(&self, request: &mut PreparedRequest) -> Result<(), ClientError>;
}

/// Runs after the response body has been buffered.
///
/// Return the (possibly replaced) response to continue, or an error to
/// reject the call.
pub trait AfterResponse: Send + Sync {
    fn after_response(
        &self,
        request: &PreparedRequest,
        response: RawResponse,
    ) -> Result<RawResponse, ClientError>;
}

/// Runs when the send itself fails.
pub trait BeforeError: Send + Sync {
    fn before_error(&self, error: ClientError) -> ClientError;
}

impl<F> BeforeRequest for F
where
    F: Fn(&mut PreparedRequest) -> Result<(), ClientError> + Send + Sync,
{
    fn before_request(&self, request: &mut PreparedRequest) -> Result<(), ClientError> {
        self(request)
    }
}

impl<F> AfterResponse for F
where
    F: Fn(&PreparedRequest, RawResponse) -> Result<RawResponse, ClientError> + Send + Sync,
{
    fn after_response(
        &self,
        request: &PreparedRequest,
        response: RawResponse,
    ) -> Result<RawResponse, ClientError> {
        self(request, response)
    }
}

impl<F> BeforeError for F
where
    F: Fn(ClientError) -> ClientError + Send + Sync,
{
    fn before_error(&self, error: ClientError) -> ClientError {
        self(error)
    }
}

// ── Hooks ──────────────────────────────────────────────────────────

/// An ordered set of hooks.
#[derive(Clone, Default)]
pub struct Hooks {
    pub before_request: Vec<Arc<dyn BeforeRequest>>,
    pub after_response: Vec<Arc<dyn AfterResponse>>,
    pub before_error: Vec<Arc<dyn BeforeError>>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("before_request", &self.before_request.len())
            .field("after_response", &self.after_response.len())
            .field("before_error", &self.before_error.len())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The hooks every call starts from: 204 normalization.
    pub fn base() -> Self {
        Self::new().with_after_response(NoContentHook)
    }

    pub fn with_before_request(mut self, hook: impl BeforeRequest + 'static) -> Self {
        self.before_request.push(Arc::new(hook));
        self
    }

    pub fn with_after_response(mut self, hook: impl AfterResponse + 'static) -> Self {
        self.after_response.push(Arc::new(hook));
        self
    }

    pub fn with_before_error(mut self, hook: impl BeforeError + 'static) -> Self {
        self.before_error.push(Arc::new(hook));
        self
    }

    /// A new pipeline with `other`'s hooks appended after this one's.
    pub fn extend(&self, other: &Hooks) -> Hooks {
        Hooks {
            before_request: self
                .before_request
                .iter()
                .chain(&other.before_request)
                .cloned()
                .collect(),
            after_response: self
                .after_response
                .iter()
                .chain(&other.after_response)
                .cloned()
                .collect(),
            before_error: self
                .before_error
                .iter()
                .chain(&other.before_error)
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.before_request.is_empty()
            && self.after_response.is_empty()
            && self.before_error.is_empty()
    }

    pub fn run_before_request(&self, request: &mut PreparedRequest) -> Result<(), ClientError> {
        for hook in &self.before_request {
            hook.before_request(request)?;
        }
        Ok(())
    }

    pub fn run_after_response(
        &self,
        request: &PreparedRequest,
        mut response: RawResponse,
    ) -> Result<RawResponse, ClientError> {
        for hook in &self.after_response {
            response = hook.after_response(request, response)?;
        }
        Ok(response)
    }

    pub fn run_before_error(&self, mut error: ClientError) -> ClientError {
        for hook in &self.before_error {
            error = hook.before_error(error);
        }
        error
    }
}

// ── Built-in hooks ─────────────────────────────────────────────────

/// Sets `Authorization: Bearer <token>`, reading the provider every time.
pub struct AuthorizationHook {
    provider: Arc<dyn TokenProvider>,
}

impl AuthorizationHook {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}

impl BeforeRequest for AuthorizationHook {
    fn before_request(&self, request: &mut PreparedRequest) -> Result<(), ClientError> {
        let token = self.provider.token();
        request.set_header(AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }
}

/// Replaces a 204 with a JSON `{"result":"success"}` body so callers never
/// see an empty body.
pub struct NoContentHook;

impl AfterResponse for NoContentHook {
    fn after_response(
        &self,
        _request: &PreparedRequest,
        response: RawResponse,
    ) -> Result<RawResponse, ClientError> {
        if response.status == 204 {
            return Ok(RawResponse::json(&serde_json::json!({ "result": "success" })));
        }
        Ok(response)
    }
}

/// Classifies the response status.
///
/// - 2xx/3xx pass through.
/// - 401 rejects with [`ClientError::Unauthorized`] and never notifies.
/// - 403 rejects with [`ClientError::Forbidden`], notifying unless silent.
/// - Anything else rejects with [`ClientError::Status`], notifying unless
///   silent.
pub struct StatusHook {
    silent: bool,
    notifier: Arc<dyn Notifier>,
}

impl StatusHook {
    pub fn new(silent: bool, notifier: Arc<dyn Notifier>) -> Self {
        Self { silent, notifier }
    }
}

impl AfterResponse for StatusHook {
    fn after_response(
        &self,
        request: &PreparedRequest,
        response: RawResponse,
    ) -> Result<RawResponse, ClientError> {
        if response.is_success() {
            return Ok(response);
        }
        debug!(
            "{} {} rejected with HTTP {}",
            request.method, request.url, response.status
        );
        if response.status == 401 {
            return Err(ClientError::Unauthorized(response));
        }

        let error = response.error_body();
        if !self.silent {
            self.notifier.notify(&Notification::error(&error.message));
        }
        if response.status == 403 {
            Err(ClientError::Forbidden { error, response })
        } else {
            Err(ClientError::Status { error, response })
        }
    }
}

/// Notifies the user about a failed send unless silent or cancelled.
pub struct NotifyOnError {
    silent: bool,
    notifier: Arc<dyn Notifier>,
}

impl NotifyOnError {
    pub fn new(silent: bool, notifier: Arc<dyn Notifier>) -> Self {
        Self { silent, notifier }
    }
}

impl BeforeError for NotifyOnError {
    fn before_error(&self, error: ClientError) -> ClientError {
        let message = error.to_string();
        if !self.silent && !is_benign_cancellation(&message) {
            self.notifier.notify(&Notification::error(message));
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::request::{ClientOptions, RequestSpec, build_request};
    use crate::auth::StaticToken;
    use crate::notify::FnNotifier;
    use bytes::Bytes;
    use reqwest::Method;
    use reqwest::header::HeaderMap;
    use std::sync::Mutex;

    fn request() -> PreparedRequest {
        build_request(
            "https://example.com",
            "/x",
            &RequestSpec::new(),
            &ClientOptions::default(),
            Method::GET,
        )
        .unwrap()
    }

    fn response(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            headers: HeaderMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn recorder() -> (Arc<dyn Notifier>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let notifier = FnNotifier::new(move |n: &Notification| {
            sink.lock().unwrap().push(n.message.clone());
        });
        (Arc::new(notifier), seen)
    }

    #[test]
    fn authorization_reads_token_every_request() {
        let token = Arc::new(Mutex::new("one".to_string()));
        let source = token.clone();
        let provider: Arc<dyn TokenProvider> =
            Arc::new(move || source.lock().unwrap().clone());
        let hooks = Hooks::new().with_before_request(AuthorizationHook::new(provider));

        let mut req = request();
        hooks.run_before_request(&mut req).unwrap();
        assert_eq!(req.headers[AUTHORIZATION], "Bearer one");

        *token.lock().unwrap() = "two".into();
        let mut req = request();
        hooks.run_before_request(&mut req).unwrap();
        assert_eq!(req.headers[AUTHORIZATION], "Bearer two");
    }

    #[test]
    fn no_content_becomes_success_payload() {
        let out = Hooks::base()
            .run_after_response(&request(), response(204, ""))
            .unwrap();
        assert_eq!(out.status, 200);
        let v: serde_json::Value = out.json_body().unwrap();
        assert_eq!(v, serde_json::json!({"result": "success"}));
    }

    #[test]
    fn unauthorized_rejects_without_notifying() {
        let (notifier, seen) = recorder();
        let hooks = Hooks::new().with_after_response(StatusHook::new(false, notifier));
        let err = hooks
            .run_after_response(&request(), response(401, r#"{"message":"expired"}"#))
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized(ref r) if r.status == 401));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn forbidden_notifies_unless_silent() {
        let body = r#"{"code":"forbidden","message":"nope"}"#;

        let (notifier, seen) = recorder();
        let hooks = Hooks::new().with_after_response(StatusHook::new(false, notifier));
        let err = hooks
            .run_after_response(&request(), response(403, body))
            .unwrap_err();
        assert!(matches!(err, ClientError::Forbidden { ref error, .. } if error.message == "nope"));
        assert_eq!(*seen.lock().unwrap(), vec!["nope".to_string()]);

        let (notifier, seen) = recorder();
        let hooks = Hooks::new().with_after_response(StatusHook::new(true, notifier));
        assert!(hooks.run_after_response(&request(), response(403, body)).is_err());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn server_errors_reject_with_raw_response() {
        let (notifier, seen) = recorder();
        let hooks = Hooks::new().with_after_response(StatusHook::new(false, notifier));
        let err = hooks
            .run_after_response(&request(), response(500, r#"{"code":"x","message":"boom"}"#))
            .unwrap_err();
        match err {
            ClientError::Status { error, response } => {
                assert_eq!(error.status, 500);
                assert_eq!(error.code, "x");
                assert_eq!(&response.body[..], br#"{"code":"x","message":"boom"}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn redirects_pass_through() {
        let (notifier, _) = recorder();
        let hooks = Hooks::new().with_after_response(StatusHook::new(false, notifier));
        assert!(hooks.run_after_response(&request(), response(302, "")).is_ok());
    }

    #[test]
    fn first_rejection_short_circuits() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let hooks = Hooks::new()
            .with_before_request(|_: &mut PreparedRequest| -> Result<(), ClientError> {
                Err(ClientError::InvalidRequest("stop".into()))
            })
            .with_before_request(move |_: &mut PreparedRequest| -> Result<(), ClientError> {
                *counter.lock().unwrap() += 1;
                Ok(())
            });
        assert!(hooks.run_before_request(&mut request()).is_err());
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn extend_concatenates_without_mutating() {
        let base = Hooks::base();
        let extra = Hooks::new()
            .with_before_request(AuthorizationHook::new(Arc::new(StaticToken("t".into()))));
        let combined = base.extend(&extra);
        assert_eq!(base.before_request.len(), 0);
        assert_eq!(base.after_response.len(), 1);
        assert_eq!(combined.before_request.len(), 1);
        assert_eq!(combined.after_response.len(), 1);
        assert!(!combined.is_empty());
        assert!(Hooks::new().is_empty());
    }

    #[test]
    fn transport_errors_notify_unless_silent_or_cancelled() {
        let (notifier, seen) = recorder();
        let hooks = Hooks::new().with_before_error(NotifyOnError::new(false, notifier.clone()));
        hooks.run_before_error(ClientError::InvalidRequest("dns".into()));
        hooks.run_before_error(ClientError::Cancelled);
        assert_eq!(*seen.lock().unwrap(), vec!["invalid request: dns".to_string()]);

        let silent = Hooks::new().with_before_error(NotifyOnError::new(true, notifier));
        silent.run_before_error(ClientError::InvalidRequest("dns".into()));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
