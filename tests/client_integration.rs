use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method as AxumMethod, StatusCode, Uri},
    response::Response,
    Router,
};
use gretch::{
    create, gretch, GretchOptions, Hooks, Method, Outcome, ResponseError, RetryOptions,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    headers: Vec<(&'static str, &'static str)>,
    body: String,
    delay: Duration,
}

impl MockResponse {
    fn text(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_owned(),
            delay: Duration::from_millis(0),
        }
    }

    fn json(status: StatusCode, body: Value) -> Self {
        Self::text(status, &body.to_string()).with_header("content-type", "application/json")
    }

    fn empty(status: StatusCode) -> Self {
        Self::text(status, "")
    }

    fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
struct Recorded {
    method: String,
    path: String,
    content_type: Option<String>,
    foo: Option<String>,
    body: String,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    hits: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
}

async fn mock_handler(
    State(state): State<MockState>,
    method: AxumMethod,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state
        .recorded
        .lock()
        .expect("recorded mutex must not be poisoned")
        .push(Recorded {
            method: method.to_string(),
            path: uri.path().to_owned(),
            content_type: header_text(&headers, "content-type"),
            foo: header_text(&headers, "foo"),
            body,
        });

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue
            .pop_front()
            .unwrap_or_else(|| MockResponse::empty(StatusCode::INTERNAL_SERVER_ERROR))
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let mut builder = axum::http::Response::builder().status(response.status);
    for (name, value) in response.headers {
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from(response.body))
        .expect("mock response must be valid")
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

struct TestServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn url(&self) -> String {
        format!("{}/", self.base_url)
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> Recorded {
        self.recorded
            .lock()
            .expect("recorded mutex must not be poisoned")
            .last()
            .cloned()
            .expect("server must have received a request")
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        hits: Arc::new(AtomicUsize::new(0)),
        recorded: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .fallback(mock_handler)
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
        recorded: state.recorded,
        task,
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct Message {
    message: String,
}

#[tokio::test]
async fn successful_request_returns_text() {
    let server = spawn_server(vec![MockResponse::text(StatusCode::OK, "ha")]).await;

    let result = gretch(&server.url(), GretchOptions::new())
        .expect("request must start")
        .text()
        .await;

    assert_eq!(result.status, 200);
    assert_eq!(result.data().map(String::as_str), Some("ha"));
    assert!(result.error().is_none());
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn retries_server_errors_with_default_policy() {
    let server = spawn_server(vec![
        MockResponse::empty(StatusCode::INTERNAL_SERVER_ERROR),
        MockResponse::empty(StatusCode::INTERNAL_SERVER_ERROR),
        MockResponse::text(StatusCode::OK, "ha"),
    ])
    .await;

    let result = gretch(&server.url(), GretchOptions::new())
        .expect("request must start")
        .text()
        .await;

    assert_eq!(result.data().map(String::as_str), Some("ha"));
    assert!(result.error().is_none());
    assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn exhausted_retries_surface_http_error() {
    let server = spawn_server(vec![]).await;

    let result = gretch(
        &server.url(),
        GretchOptions::new().retry(RetryOptions::default().attempts(1)),
    )
    .expect("request must start")
    .text()
    .await;

    assert_eq!(result.status, 500);
    match result.error() {
        Some(ResponseError::Http(err)) => assert_eq!(err.status, 500),
        other => panic!("expected http error, got {other:?}"),
    }
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn permanently_failing_server_is_hit_attempts_plus_one_times() {
    let server = spawn_server(vec![]).await;

    let result = gretch(
        &server.url(),
        GretchOptions::new().retry(RetryOptions::default().attempts(3).delay_ms(1)),
    )
    .expect("request must start")
    .flush()
    .await;

    assert_eq!(result.status, 500);
    assert_eq!(server.hits(), 4);
}

#[tokio::test]
async fn zero_attempts_sends_exactly_once() {
    let server = spawn_server(vec![]).await;

    let result = gretch(
        &server.url(),
        GretchOptions::new().retry(RetryOptions::default().attempts(0)),
    )
    .expect("request must start")
    .text()
    .await;

    assert!(result.error().is_some_and(ResponseError::is_http));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn post_is_not_retried_by_default() {
    let server = spawn_server(vec![]).await;

    let result = gretch(&server.url(), GretchOptions::new().method(Method::POST))
        .expect("request must start")
        .text()
        .await;

    assert!(result.is_error());
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn configured_methods_and_codes_are_retried() {
    let server = spawn_server(vec![
        MockResponse::empty(StatusCode::BAD_REQUEST),
        MockResponse::text(StatusCode::OK, "ha"),
    ])
    .await;

    let result = gretch(
        &server.url(),
        GretchOptions::new().method(Method::POST).retry(
            RetryOptions::default()
                .codes([400])
                .methods(["POST"])
                .delay_ms(1),
        ),
    )
    .expect("request must start")
    .text()
    .await;

    assert_eq!(result.data().map(String::as_str), Some("ha"));
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn request_timeout_surfaces_timeout_error_without_retry() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::OK, "ha").with_delay(Duration::from_millis(1_000))
    ])
    .await;

    let result = gretch(&server.url(), GretchOptions::new().timeout_ms(500))
        .expect("request must start")
        .text()
        .await;

    assert!(result.error().is_some_and(ResponseError::is_timeout));
    assert_eq!(result.status, 500);
    assert!(result.response.is_none());
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn disabled_timeout_waits_for_slow_server() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::OK, "ha").with_delay(Duration::from_millis(300))
    ])
    .await;

    let result = gretch(&server.url(), GretchOptions::new().timeout_ms(0))
        .expect("request must start")
        .text()
        .await;

    assert_eq!(result.data().map(String::as_str), Some("ha"));
}

#[tokio::test]
async fn json_posts_send_content_type_and_serialized_body() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::OK,
        json!({ "success": true }),
    )])
    .await;

    let result = gretch(
        &server.url(),
        GretchOptions::new()
            .method(Method::POST)
            .json(json!({ "foo": true })),
    )
    .expect("request must start")
    .json::<Value, Value>()
    .await;

    assert_eq!(result.data(), Some(&json!({ "success": true })));

    let request = server.last_request();
    assert_eq!(request.method, "POST");
    assert_eq!(request.content_type.as_deref(), Some("application/json"));
    assert_eq!(request.body, json!({ "foo": true }).to_string());
}

#[tokio::test]
async fn no_content_is_not_parsed() {
    let server = spawn_server(vec![
        MockResponse::empty(StatusCode::NO_CONTENT).with_header("content-type", "application/json")
    ])
    .await;

    let result = gretch(&server.url(), GretchOptions::new())
        .expect("request must start")
        .json::<Value, Value>()
        .await;

    assert_eq!(result.status, 204);
    assert!(matches!(result.outcome, Outcome::Empty));
    assert!(result.data().is_none());
    assert!(result.error().is_none());
}

#[tokio::test]
async fn error_body_is_returned_as_error() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::BAD_REQUEST,
        json!({ "message": "foo" }),
    )])
    .await;

    let result = gretch(&server.url(), GretchOptions::new())
        .expect("request must start")
        .json::<Value, Message>()
        .await;

    assert_eq!(result.status, 400);
    assert_eq!(
        result.error().and_then(ResponseError::body),
        Some(&Message {
            message: "foo".to_owned()
        })
    );
}

#[tokio::test]
async fn non_json_success_body_is_reported_as_error() {
    let server = spawn_server(vec![
        MockResponse::text(StatusCode::OK, "hey").with_header("content-type", "application/json")
    ])
    .await;

    let result = gretch(&server.url(), GretchOptions::new())
        .expect("request must start")
        .json::<Value, Value>()
        .await;

    assert!(matches!(result.error(), Some(ResponseError::Decode(_))));
    assert!(result.data().is_none());
}

#[tokio::test]
async fn hooks_fire_before_and_after() {
    let server = spawn_server(vec![MockResponse::empty(StatusCode::OK)]).await;
    let hooks_run = Arc::new(AtomicUsize::new(0));
    let (before, first_after, second_after) =
        (hooks_run.clone(), hooks_run.clone(), hooks_run.clone());

    let handle = gretch(
        &server.url(),
        GretchOptions::new().timeout_ms(50_000).hooks(
            Hooks::default()
                .before(move |request, options| {
                    assert!(!request.url.is_empty());
                    assert_eq!(options.timeout_ms, Some(50_000));
                    before.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .after(move |summary, options| {
                    assert_eq!(summary.status, 200);
                    assert_eq!(options.timeout_ms, Some(50_000));
                    first_after.fetch_add(1, Ordering::SeqCst);
                })
                .after(move |_, _| {
                    second_after.fetch_add(1, Ordering::SeqCst);
                }),
        ),
    )
    .expect("request must start");
    assert_eq!(hooks_run.load(Ordering::SeqCst), 1);

    handle.json::<Value, Value>().await;

    assert_eq!(hooks_run.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn create_merges_instance_defaults() {
    let server = spawn_server(vec![MockResponse::empty(StatusCode::OK)]).await;
    let instance = create(
        GretchOptions::new()
            .header("Foo", "Bar")
            .expect("valid header")
            .base_url(server.base_url.clone()),
    );

    let result = instance
        .request(
            "api",
            GretchOptions::new().hooks(Hooks::default().before(|_, options| {
                assert_eq!(options.headers["foo"], "Bar");
                Ok(())
            })),
        )
        .expect("request must start")
        .text()
        .await;

    assert_eq!(result.url, format!("{}/api", server.base_url));
    let request = server.last_request();
    assert_eq!(request.path, "/api");
    assert_eq!(request.foo.as_deref(), Some("Bar"));
}

#[tokio::test]
async fn per_request_base_url_overrides_instance() {
    let server = spawn_server(vec![MockResponse::empty(StatusCode::OK)]).await;
    let instance = create(GretchOptions::new().base_url("http://www.foo.com"));

    let result = instance
        .request(
            "/api",
            GretchOptions::new().base_url(format!("{}/", server.base_url)),
        )
        .expect("request must start")
        .flush()
        .await;

    assert_eq!(result.url, format!("{}/api", server.base_url));
    assert_eq!(result.status, 200);
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn flush_returns_metadata_without_body() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::OK,
        json!({ "message": "foo" }),
    )])
    .await;

    let handle = gretch(&server.url(), GretchOptions::new()).expect("request must start");
    let flushed = handle.flush().await;

    assert!(!flushed.url.is_empty());
    assert_eq!(flushed.status, 200);
    assert!(flushed.response.is_some());

    let parsed = handle.json::<Message, Value>().await;
    assert_eq!(
        parsed.data(),
        Some(&Message {
            message: "foo".to_owned()
        })
    );
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn retry_after_header_delays_next_attempt() {
    let server = spawn_server(vec![
        MockResponse::empty(StatusCode::SERVICE_UNAVAILABLE).with_header("retry-after", "1"),
        MockResponse::text(StatusCode::OK, "ha"),
    ])
    .await;
    let started = Instant::now();

    let result = gretch(&server.url(), GretchOptions::new())
        .expect("request must start")
        .text()
        .await;

    assert!(started.elapsed() >= Duration::from_millis(1_000));
    assert_eq!(result.data().map(String::as_str), Some("ha"));
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn connection_failure_is_reported_as_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind");
    let address = listener.local_addr().expect("must have local addr");
    drop(listener);

    let result = gretch(
        &format!("http://{address}/"),
        GretchOptions::new().retry(false),
    )
    .expect("request must start")
    .text()
    .await;

    assert!(matches!(result.error(), Some(ResponseError::Transport(_))));
    assert_eq!(result.status, 500);
}
