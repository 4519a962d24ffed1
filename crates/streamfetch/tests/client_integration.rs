//! Integration tests for unary calls.
//!
//! Each test starts a wiremock server and drives a real [`Client`] against it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Method;
use serde_json::json;
use streamfetch::api::request::PreparedRequest;
use streamfetch::api::{ClientOptions, Hooks, RequestSpec, ResponseBody};
use streamfetch::auth::{MemoryStore, StaticToken, StoredToken, TokenProvider};
use streamfetch::notify::{FnNotifier, NoopNotifier, Notification, Severity};
use streamfetch::{Client, ClientConfig, ClientError};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Inbox = Arc<Mutex<Vec<Notification>>>;

/// Helper: a client pointed at `base` that records every notification.
fn client_with(base: &str, token: Arc<dyn TokenProvider>) -> (Client, Inbox) {
    let inbox: Inbox = Arc::default();
    let sink = inbox.clone();
    let notifier = FnNotifier::new(move |n: &Notification| sink.lock().unwrap().push(n.clone()));
    let client = Client::new(ClientConfig::new(base), token, Arc::new(notifier)).unwrap();
    (client, inbox)
}

fn client(base: &str) -> (Client, Inbox) {
    client_with(base, Arc::new(StaticToken("t0k3n".into())))
}

// ── Success paths ────────────────────────────────────────────────────

#[tokio::test]
async fn get_returns_parsed_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apps"))
        .and(query_param("page", "2"))
        .and(header("authorization", "Bearer t0k3n"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [1, 2]})))
        .mount(&server)
        .await;

    let (client, inbox) = client(&server.uri());
    let body = client
        .get("/apps", &RequestSpec::new().query("page", 2), &ClientOptions::default())
        .await
        .unwrap();

    assert_eq!(body.as_json().unwrap()["data"], json!([1, 2]));
    assert!(inbox.lock().unwrap().is_empty());
}

#[tokio::test]
async fn no_content_becomes_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/apps/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (client, _) = client(&server.uri());
    let body = client
        .delete("/apps/1", &RequestSpec::new(), &ClientOptions::default())
        .await
        .unwrap();

    assert_eq!(body.into_json(), Some(json!({"result": "success"})));
}

#[tokio::test]
async fn post_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/apps"))
        .and(body_string(r#"{"name":"demo"}"#))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "a1"})))
        .mount(&server)
        .await;

    let (client, _) = client(&server.uri());
    let spec = RequestSpec::new().json(json!({"name": "demo"}));
    let body = client.post("/apps", &spec, &ClientOptions::default()).await.unwrap();

    assert_eq!(body.as_json().unwrap()["id"], "a1");
}

#[tokio::test]
async fn form_body_is_sent_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header(
            "content-type",
            "application/x-www-form-urlencoded; charset=UTF-8",
        ))
        .and(body_string("email=a%40b.c&password=pw"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "success"})))
        .mount(&server)
        .await;

    let (client, _) = client(&server.uri());
    let spec = RequestSpec::new().form(&[("email", "a@b.c"), ("password", "pw")]);
    let body = client.post("/login", &spec, &ClientOptions::default()).await.unwrap();

    assert_eq!(body.as_json().unwrap()["result"], "success");
}

#[tokio::test]
async fn binary_content_type_returns_bytes() {
    let server = MockServer::start().await;
    Mock::given(path("/export"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x50, 0x4b, 3, 4], "application/zip"))
        .mount(&server)
        .await;

    let (client, _) = client(&server.uri());
    let body = client
        .get("/export", &RequestSpec::new(), &ClientOptions::default())
        .await
        .unwrap();

    assert_eq!(body.as_bytes().unwrap().as_ref(), &[0x50, 0x4b, 3, 4]);
}

#[tokio::test]
async fn need_all_response_content_returns_envelope() {
    let server = MockServer::start().await;
    Mock::given(path("/apps"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-total", "7")
                .set_body_json(json!({"data": []})),
        )
        .mount(&server)
        .await;

    let (client, _) = client(&server.uri());
    let options = ClientOptions::default().with_all_response_content();
    let body = client.get("/apps", &RequestSpec::new(), &options).await.unwrap();

    let ResponseBody::Raw(raw) = body else {
        panic!("expected the raw envelope, got {body:?}");
    };
    assert_eq!(raw.status, 200);
    assert_eq!(raw.headers["x-total"], "7");
    assert_eq!(raw.json_body::<serde_json::Value>().unwrap(), json!({"data": []}));
}

#[tokio::test]
async fn token_is_read_fresh_for_every_call() {
    let server = MockServer::start().await;
    Mock::given(header("authorization", "Bearer first"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"who": "first"})))
        .mount(&server)
        .await;
    Mock::given(header("authorization", "Bearer second"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"who": "second"})))
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let token = Arc::new(StoredToken::new(store.clone()));
    token.set("first");
    let (client, _) = client_with(&server.uri(), token.clone());

    let spec = RequestSpec::new();
    let options = ClientOptions::default();
    let a = client.get("/me", &spec, &options).await.unwrap();
    token.set("second");
    let b = client.get("/me", &spec, &options).await.unwrap();

    assert_eq!(a.as_json().unwrap()["who"], "first");
    assert_eq!(b.as_json().unwrap()["who"], "second");
}

#[tokio::test]
async fn delete_content_type_omits_header() {
    let server = MockServer::start().await;
    Mock::given(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let (client, _) = client(&server.uri());
    let options = ClientOptions::default().without_content_type();
    client
        .post("/upload", &RequestSpec::new().raw("bytes"), &options)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("content-type"));
    assert_eq!(requests[0].body, b"bytes");
}

#[tokio::test]
async fn fetch_person_uses_absolute_url_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/person"))
        .and(query_param("name", "Ada"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "Ada", "age": 36, "sex": "female"})),
        )
        .mount(&server)
        .await;

    // Base URL points elsewhere; the absolute endpoint must win.
    let (client, _) = client("http://127.0.0.1:1/api");
    let person = client
        .fetch_person_at(&format!("{}/person", server.uri()), "Ada")
        .await
        .unwrap();

    assert_eq!(person.name, "Ada");
    assert_eq!(person.age, 36);
    assert_eq!(person.sex, "female");
}

// ── Rejections ───────────────────────────────────────────────────────

#[tokio::test]
async fn unauthorized_rejects_without_notifying() {
    let server = MockServer::start().await;
    Mock::given(path("/apps"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"code": "unauthorized", "message": "login"})),
        )
        .mount(&server)
        .await;

    let (client, inbox) = client(&server.uri());
    let err = client
        .get("/apps", &RequestSpec::new(), &ClientOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Unauthorized(_)));
    assert_eq!(err.status(), Some(401));
    assert!(inbox.lock().unwrap().is_empty());
}

#[tokio::test]
async fn forbidden_is_notified_unless_silent() {
    let server = MockServer::start().await;
    Mock::given(path("/admin"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"code": "forbidden", "message": "No access"})),
        )
        .mount(&server)
        .await;

    let (client, inbox) = client(&server.uri());
    let spec = RequestSpec::new();

    let err = client
        .get("/admin", &spec, &ClientOptions::default().silent())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Forbidden { .. }));
    assert!(inbox.lock().unwrap().is_empty());

    client
        .get("/admin", &spec, &ClientOptions::default())
        .await
        .unwrap_err();
    let notes = inbox.lock().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].severity, Severity::Error);
    assert_eq!(notes[0].message, "No access");
}

#[tokio::test]
async fn server_error_is_notified_with_body_message() {
    let server = MockServer::start().await;
    Mock::given(path("/apps"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"code": 5001, "message": "db down"})),
        )
        .mount(&server)
        .await;

    let (client, inbox) = client(&server.uri());
    let err = client
        .get("/apps", &RequestSpec::new(), &ClientOptions::default())
        .await
        .unwrap_err();

    match &err {
        ClientError::Status { error, response } => {
            assert_eq!(response.status, 500);
            assert_eq!(error.code, "5001");
            assert_eq!(error.message, "db down");
        }
        other => panic!("expected a status error, got {other:?}"),
    }
    assert_eq!(inbox.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn non_json_error_body_falls_back_to_reason() {
    let server = MockServer::start().await;
    Mock::given(path("/gone"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let (client, inbox) = client(&server.uri());
    client
        .get("/gone", &RequestSpec::new(), &ClientOptions::default())
        .await
        .unwrap_err();

    assert_eq!(inbox.lock().unwrap()[0].message, "Bad Gateway");
}

#[tokio::test]
async fn invalid_json_success_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(path("/apps"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let (client, _) = client(&server.uri());
    let err = client
        .get("/apps", &RequestSpec::new(), &ClientOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Decode(_)));
}

// ── Transport and cancellation ───────────────────────────────────────

/// A loopback address nothing listens on.
async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[tokio::test]
async fn transport_failure_is_notified_unless_silent() {
    let base = closed_port_url().await;
    let (client, inbox) = client(&base);
    let spec = RequestSpec::new();

    let err = client
        .get("/apps", &spec, &ClientOptions::default().silent())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert!(inbox.lock().unwrap().is_empty());

    client
        .get("/apps", &spec, &ClientOptions::default())
        .await
        .unwrap_err();
    assert_eq!(inbox.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unary_call_is_bounded_by_the_timeout() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({})),
        )
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri()).with_timeout(Duration::from_millis(500));
    let client = Client::new(
        config,
        Arc::new(StaticToken::default()),
        Arc::new(NoopNotifier),
    )
    .unwrap();
    let err = client
        .get("/slow", &RequestSpec::new(), &ClientOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(&err, ClientError::Transport(e) if e.is_timeout()));
    // The source chain names the cause.
    assert!(err.to_string().contains("timed out"), "got {err}");
}

#[tokio::test]
async fn hooks_see_the_verb_that_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/apps/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let slot = seen.clone();
    let record = move |r: &mut PreparedRequest| -> Result<(), ClientError> {
        slot.lock().unwrap().push(r.method.clone());
        Ok(())
    };
    let hooks = Hooks::new().with_before_request(record);
    let (client, _) = client(&server.uri());
    client
        .delete(
            "/apps/1",
            &RequestSpec::new().method(Method::PUT),
            &ClientOptions::default().with_hooks(hooks),
        )
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), [Method::DELETE]);
}

#[tokio::test]
async fn aborted_call_is_cancelled_without_notification() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(json!({})),
        )
        .mount(&server)
        .await;

    let (client, inbox) = client(&server.uri());
    let options = ClientOptions::default().with_abort_sink(|handle| handle.abort());
    let err = client
        .get("/slow", &RequestSpec::new(), &options)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.to_string(), "AbortError: The user aborted a request.");
    assert!(inbox.lock().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_header_is_rejected_before_sending() {
    let server = MockServer::start().await;
    let (client, inbox) = client(&server.uri());

    let spec = RequestSpec::new().header("bad header", "x");
    let err = client
        .get("/apps", &spec, &ClientOptions::default().silent())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::InvalidRequest(_)));
    assert!(inbox.lock().unwrap().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}
