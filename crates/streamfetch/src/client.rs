//! The [`Client`] and its unary (non-streaming) call path.
//!
//! A call goes: build the request → run `before_request` hooks → send →
//! buffer the body → run `after_response` hooks → decode. Failures of the
//! send itself pass through the `before_error` hooks once and are returned.
//! Streaming calls live in [`api::streaming`](crate::api::streaming).

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::api::hooks::{AuthorizationHook, Hooks, NotifyOnError, StatusHook};
use crate::api::request::{AbortHandle, ClientOptions, PreparedRequest, RequestSpec, build_request};
use crate::api::response::{RawResponse, ResponseBody};
use crate::auth::TokenProvider;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::notify::Notifier;

/// Async HTTP client with a hook pipeline.
///
/// Holds one immutable base configuration and one connection pool. Nothing
/// here changes after construction, so a `Client` can serve any number of
/// concurrent calls; per-call state lives in each call's own pipeline.
pub struct Client {
    pub(crate) http: reqwest::Client,
    pub(crate) config: ClientConfig,
    pub(crate) token: Arc<dyn TokenProvider>,
    pub(crate) notifier: Arc<dyn Notifier>,
    base_hooks: Hooks,
}

impl Client {
    /// Create a client. The token provider is read before every request;
    /// the notifier receives user-facing failures.
    pub fn new(
        config: ClientConfig,
        token: Arc<dyn TokenProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ClientError> {
        let http = config.build_http_client().map_err(ClientError::Transport)?;
        Ok(Self {
            http,
            config,
            token,
            notifier,
            base_hooks: Hooks::base(),
        })
    }

    /// Append hooks to the base pipeline shared by every call.
    pub fn with_base_hooks(mut self, hooks: &Hooks) -> Self {
        self.base_hooks = self.base_hooks.extend(hooks);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The pipeline for one call: base hooks, then the caller's additions,
    /// then authorization and status classification.
    pub(crate) fn pipeline(&self, options: &ClientOptions) -> Hooks {
        let builtin = Hooks::new()
            .with_before_request(AuthorizationHook::new(self.token.clone()))
            .with_after_response(StatusHook::new(options.silent, self.notifier.clone()))
            .with_before_error(NotifyOnError::new(options.silent, self.notifier.clone()));
        self.base_hooks.extend(&options.hooks).extend(&builtin)
    }

    /// Build the request with `method` and run the `before_request` hooks.
    pub(crate) fn prepare(
        &self,
        path: &str,
        spec: &RequestSpec,
        options: &ClientOptions,
        hooks: &Hooks,
        method: Method,
    ) -> Result<PreparedRequest, ClientError> {
        let mut prepared = build_request(&self.config.base_url, path, spec, options, method.clone())
            .map_err(|e| hooks.run_before_error(e))?;
        // Hooks must see the verb that goes on the wire.
        prepared.method = method;
        hooks
            .run_before_request(&mut prepared)
            .map_err(|e| hooks.run_before_error(e))?;
        Ok(prepared)
    }

    /// Send a prepared request, racing it against the abort handle.
    ///
    /// `timeout` bounds the whole exchange including the body read, so
    /// streaming calls pass `None`.
    pub(crate) async fn send(
        &self,
        prepared: &PreparedRequest,
        hooks: &Hooks,
        abort: &AbortHandle,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, ClientError> {
        debug!("{} {}", prepared.method, prepared.url);
        let mut request = prepared.clone().into_reqwest(&self.http);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let result = tokio::select! {
            biased;
            _ = abort.aborted() => Err(ClientError::Cancelled),
            sent = request.send() => sent.map_err(ClientError::Transport),
        };
        result.map_err(|e| hooks.run_before_error(e))
    }

    /// Buffer a response body, racing it against the abort handle.
    pub(crate) async fn read_body(
        response: reqwest::Response,
        hooks: &Hooks,
        abort: &AbortHandle,
    ) -> Result<RawResponse, ClientError> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let result = tokio::select! {
            biased;
            _ = abort.aborted() => Err(ClientError::Cancelled),
            body = response.bytes() => body.map_err(ClientError::Transport),
        };
        let body = result.map_err(|e| hooks.run_before_error(e))?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    /// Issue a unary request and decode the response.
    ///
    /// `method` overrides any method named in `spec`. Returns
    /// [`ResponseBody::Raw`] when `need_all_response_content` is set,
    /// [`ResponseBody::Binary`] for octet-stream and zip responses, and
    /// parsed JSON otherwise.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        spec: &RequestSpec,
        options: &ClientOptions,
    ) -> Result<ResponseBody, ClientError> {
        let hooks = self.pipeline(options);
        let abort = options.new_abort_handle();
        let prepared = self.prepare(path, spec, options, &hooks, method)?;

        let start = Instant::now();
        let response = self
            .send(&prepared, &hooks, &abort, Some(self.config.timeout))
            .await?;
        let raw = Self::read_body(response, &hooks, &abort).await?;
        debug!(
            "HTTP {} in {:.1}s ({} bytes)",
            raw.status,
            start.elapsed().as_secs_f64(),
            raw.body.len()
        );

        let raw = hooks.run_after_response(&prepared, raw)?;
        if options.need_all_response_content {
            return Ok(ResponseBody::Raw(raw));
        }
        if raw.is_binary() {
            trace!("binary response: {:?}", raw.content_type());
            return Ok(ResponseBody::Binary(raw.body));
        }
        raw.json_body()
            .map(ResponseBody::Json)
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn get(
        &self,
        path: &str,
        spec: &RequestSpec,
        options: &ClientOptions,
    ) -> Result<ResponseBody, ClientError> {
        self.request(Method::GET, path, spec, options).await
    }

    pub async fn post(
        &self,
        path: &str,
        spec: &RequestSpec,
        options: &ClientOptions,
    ) -> Result<ResponseBody, ClientError> {
        self.request(Method::POST, path, spec, options).await
    }

    pub async fn put(
        &self,
        path: &str,
        spec: &RequestSpec,
        options: &ClientOptions,
    ) -> Result<ResponseBody, ClientError> {
        self.request(Method::PUT, path, spec, options).await
    }

    pub async fn patch(
        &self,
        path: &str,
        spec: &RequestSpec,
        options: &ClientOptions,
    ) -> Result<ResponseBody, ClientError> {
        self.request(Method::PATCH, path, spec, options).await
    }

    pub async fn delete(
        &self,
        path: &str,
        spec: &RequestSpec,
        options: &ClientOptions,
    ) -> Result<ResponseBody, ClientError> {
        self.request(Method::DELETE, path, spec, options).await
    }

    /// GET and deserialize a JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        spec: &RequestSpec,
        options: &ClientOptions,
    ) -> Result<T, ClientError> {
        match self.get(path, spec, options).await? {
            ResponseBody::Json(value) => {
                serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
            }
            ResponseBody::Raw(raw) => raw
                .json_body()
                .map_err(|e| ClientError::Decode(e.to_string())),
            ResponseBody::Binary(_) => Err(ClientError::Decode(
                "expected a JSON body, got binary content".into(),
            )),
        }
    }
}
