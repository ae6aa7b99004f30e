use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    response::IntoResponse,
    routing::{any, get},
    Router,
};
use retry_requests::{RequestConfig, RequestError, TransportError};
use serde_json::{json, Map};

#[derive(Clone)]
struct MockState {
    hits: Arc<AtomicUsize>,
}

async fn echo_handler(
    State(state): State<MockState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        CONTENT_TYPE,
        headers
            .get(CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream")),
    );
    response_headers.insert(
        "x-echo-method",
        HeaderValue::from_str(method.as_str()).expect("method must be a valid header value"),
    );
    if let Some(auth) = headers.get(AUTHORIZATION) {
        response_headers.insert("x-echo-authorization", auth.clone());
    }

    (response_headers, body)
}

async fn missing_handler(State(state): State<MockState>) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, r#"{"error":"not found"}"#)
}

async fn slow_handler(State(state): State<MockState>) -> impl IntoResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(300)).await;
    "too late"
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn spawn_server() -> TestServer {
    let state = MockState {
        hits: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new()
        .route("/echo", any(echo_handler))
        .route("/missing", get(missing_handler))
        .route("/slow", get(slow_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        hits: state.hits,
        task,
    }
}

fn fast_retry_config() -> RequestConfig {
    RequestConfig::new()
        .with_retry(2)
        .with_retry_delay(Duration::from_millis(1))
}

#[tokio::test]
async fn post_mapping_is_echoed_and_decoded() {
    let server = spawn_server().await;
    let mut config = fast_retry_config();

    let mut body = Map::new();
    body.insert("a".to_owned(), json!(1));
    config
        .post(&server.url("/echo"), body.clone())
        .await
        .expect("post must succeed");

    let response = config.response().expect("response must be held");
    assert_eq!(response.status(), retry_requests::StatusCode::OK);
    assert_eq!(response.headers()["x-echo-method"], "POST");
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(config.decode_json().expect("must decode"), body);
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn get_sends_configured_headers_and_no_body() {
    let server = spawn_server().await;
    let mut config = fast_retry_config()
        .with_header("Authorization", "Bearer abc")
        .expect("valid header");

    config
        .get(&server.url("/echo"))
        .await
        .expect("get must succeed");

    let response = config.response().expect("response must be held");
    assert_eq!(response.headers()["x-echo-method"], "GET");
    assert_eq!(response.headers()["x-echo-authorization"], "Bearer abc");
    assert!(response.body().is_empty());
}

#[tokio::test]
async fn put_and_delete_use_their_methods() {
    let server = spawn_server().await;
    let mut config = fast_retry_config();

    config
        .put(&server.url("/echo"), "renamed")
        .await
        .expect("put must succeed");
    let response = config.response().expect("response must be held");
    assert_eq!(response.headers()["x-echo-method"], "PUT");
    assert_eq!(response.text(), "\"renamed\"");

    config
        .delete(&server.url("/echo"), b"raw-bytes".to_vec())
        .await
        .expect("delete must succeed");
    let response = config.response().expect("response must be held");
    assert_eq!(response.headers()["x-echo-method"], "DELETE");
    assert_eq!(response.headers()["content-type"], "application/octet-stream");
    assert_eq!(&response.body()[..], b"raw-bytes");
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn not_found_is_captured_without_retry() {
    let server = spawn_server().await;
    let mut config = fast_retry_config();

    config
        .get(&server.url("/missing"))
        .await
        .expect("404 is not a transport failure");

    let response = config.response().expect("response must be held");
    assert_eq!(response.status(), retry_requests::StatusCode::NOT_FOUND);
    assert_eq!(
        config.decode_json().expect("body must be intact")["error"],
        json!("not found")
    );
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn timeout_is_retried_then_surfaced() {
    let server = spawn_server().await;
    let mut config = fast_retry_config().with_timeout(Duration::from_millis(30));

    let err = config
        .get(&server.url("/slow"))
        .await
        .expect_err("every attempt must time out");

    match err {
        RequestError::Dispatch {
            attempts,
            source: TransportError::Timeout(_),
        } => assert_eq!(attempts, 3),
        other => panic!("expected timeout dispatch error, got {other:?}"),
    }
    assert_eq!(server.hits(), 3);
    assert!(config.response().is_none());
}

#[tokio::test]
async fn connection_refused_exhausts_retries() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("must bind");
    let address = listener.local_addr().expect("must have local addr");
    drop(listener);

    let mut config = fast_retry_config();
    let err = config
        .get(&format!("http://{address}/gone"))
        .await
        .expect_err("nothing listens there");

    match err {
        RequestError::Dispatch {
            attempts,
            source: TransportError::Connect(_),
        } => assert_eq!(attempts, 3),
        other => panic!("expected connect dispatch error, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_url_is_not_retried() {
    let mut config = fast_retry_config();
    let err = config
        .get("not a url")
        .await
        .expect_err("url must be rejected");

    assert!(matches!(
        err,
        RequestError::Dispatch {
            attempts: 1,
            source: TransportError::InvalidRequest(_)
        }
    ));
}
