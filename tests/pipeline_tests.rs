//! Ordering and failure-routing tests for the interceptor pipeline, using an
//! in-process transport instead of a mock server.

use chainwire::{
    Chain, Client, Error, ExecutionMode, RequestConfig, RequestInterceptor, Response,
    ResponseInterceptor,
};
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

type Events = Arc<Mutex<Vec<String>>>;

fn record(events: &Events, event: impl Into<String>) {
    events.lock().push(event.into());
}

fn recorded(events: &Events) -> Vec<String> {
    events.lock().clone()
}

/// A client whose transport records the dispatch and echoes the config back.
fn echo_client(events: &Events) -> Client {
    let events = Arc::clone(events);
    Client::builder()
        .base_url("http://pipeline.test")
        .unwrap()
        .transport(move |config: RequestConfig| {
            record(&events, "dispatch");
            async move {
                Ok::<_, Error>(Response::new(
                    Value::Null,
                    String::new(),
                    StatusCode::OK,
                    HeaderMap::new(),
                    Duration::ZERO,
                    config,
                ))
            }
        })
        .build()
        .unwrap()
}

fn named(events: &Events, name: &'static str) -> RequestInterceptor {
    let events = Arc::clone(events);
    RequestInterceptor::sync(move |config: RequestConfig| {
        record(&events, name);
        let seen = match config.header("x-seen") {
            Some(existing) => format!("{}/{}", existing, name),
            None => name.to_string(),
        };
        config.with_header("x-seen", seen)
    })
    .synchronous(true)
}

fn raising(events: &Events, name: &'static str) -> RequestInterceptor {
    let events = Arc::clone(events);
    RequestInterceptor::sync(move |_config: RequestConfig| {
        record(&events, name);
        Err(Error::request_interceptor(format!("{} raised", name)))
    })
    .synchronous(true)
}

fn observed(events: &Events, name: &'static str) -> ResponseInterceptor {
    let events = Arc::clone(events);
    ResponseInterceptor::sync(move |response| {
        record(&events, name);
        Ok(response)
    })
}

fn mode_of(client: &Client, config: &RequestConfig) -> ExecutionMode {
    Chain::assemble(
        &client.interceptors().request().snapshot(),
        &client.interceptors().response().snapshot(),
        config,
    )
    .mode()
}

fn get(path: &str) -> RequestConfig {
    RequestConfig::new(Method::GET, path)
}

#[tokio::test]
async fn test_full_order_around_dispatch() {
    let events = Events::default();
    let client = echo_client(&events);

    for name in ["A", "B", "C"] {
        client.interceptors().request().use_interceptor(named(&events, name));
    }
    for name in ["X", "Y"] {
        client
            .interceptors()
            .response()
            .use_interceptor(observed(&events, name));
    }

    let response = client.request(get("/order")).await.unwrap();

    assert_eq!(recorded(&events), vec!["C", "B", "A", "dispatch", "X", "Y"]);
    assert_eq!(response.config.header("x-seen"), Some("C/B/A"));
}

#[tokio::test]
async fn test_synchronous_flag() {
    let events = Events::default();
    let client = echo_client(&events);
    let config = get("/flag");

    // No pre-send interceptors at all.
    assert_eq!(mode_of(&client, &config), ExecutionMode::Direct);

    client.interceptors().request().use_interceptor(named(&events, "A"));
    client.interceptors().request().use_interceptor(named(&events, "B"));
    assert_eq!(mode_of(&client, &config), ExecutionMode::Direct);

    // Post-receive interceptors never affect the mode.
    client.interceptors().response().use_interceptor(ResponseInterceptor::new(
        |response| async move { Ok(response) },
    ));
    assert_eq!(mode_of(&client, &config), ExecutionMode::Direct);

    let c = client
        .interceptors()
        .request()
        .use_interceptor(named(&events, "C").synchronous(false));
    assert_eq!(mode_of(&client, &config), ExecutionMode::Suspended);

    client.interceptors().request().eject(c);
    assert_eq!(mode_of(&client, &config), ExecutionMode::Direct);
}

#[tokio::test]
async fn test_direct_mode_runs_pre_send_before_polling() {
    let events = Events::default();
    let client = echo_client(&events);
    client.interceptors().request().use_interceptor(named(&events, "A"));

    let pending = client.request(get("/eager"));
    assert_eq!(recorded(&events), vec!["A", "dispatch"]);

    pending.await.unwrap();
}

#[tokio::test]
async fn test_suspended_mode_defers_until_polled() {
    let events = Events::default();
    let client = echo_client(&events);
    client
        .interceptors()
        .request()
        .use_interceptor(named(&events, "A").synchronous(false));

    let pending = client.request(get("/lazy"));
    assert!(recorded(&events).is_empty());

    pending.await.unwrap();
    assert_eq!(recorded(&events), vec!["A", "dispatch"]);
}

#[tokio::test]
async fn test_raise_without_failure_handler_still_dispatches() {
    let events = Events::default();
    let client = echo_client(&events);

    client.interceptors().request().use_interceptor(raising(&events, "A"));
    client.interceptors().request().use_interceptor(named(&events, "B"));

    let response = client.request(get("/raise")).await.unwrap();

    // Configuration as it stood immediately before "A" ran.
    assert_eq!(response.config.header("x-seen"), Some("B"));
    assert_eq!(recorded(&events), vec!["B", "A", "dispatch"]);
}

#[tokio::test]
async fn test_raise_stops_remaining_pre_send_handlers() {
    let events = Events::default();
    let client = echo_client(&events);

    client.interceptors().request().use_interceptor(named(&events, "A"));
    client.interceptors().request().use_interceptor(raising(&events, "B"));
    client.interceptors().request().use_interceptor(named(&events, "C"));

    let response = client.request(get("/raise")).await.unwrap();

    assert_eq!(recorded(&events), vec!["C", "B", "dispatch"]);
    assert_eq!(response.config.header("x-seen"), Some("C"));
}

#[tokio::test]
async fn test_raise_with_recovering_failure_handler_dispatches_recovered_config() {
    let events = Events::default();
    let client = echo_client(&events);

    client.interceptors().request().use_interceptor(named(&events, "A"));
    client.interceptors().request().use_interceptor(
        raising(&events, "B")
            .on_rejected_sync(|_error| get("/recovered").with_header("x-recovered", "1")),
    );

    let response = client.request(get("/raise")).await.unwrap();

    assert_eq!(response.config.path, "/recovered");
    assert_eq!(response.config.header("x-recovered"), Some("1"));
    assert_eq!(recorded(&events), vec!["B", "dispatch"]);
}

#[tokio::test]
async fn test_failing_failure_handler_settles_without_dispatch() {
    let events = Events::default();
    let client = echo_client(&events);

    client.interceptors().request().use_interceptor(
        raising(&events, "A").on_rejected_sync(|error| Err(error)),
    );
    client
        .interceptors()
        .response()
        .use_interceptor(observed(&events, "X"));

    let err = client.request(get("/fail")).await.unwrap_err();

    assert!(matches!(err, Error::Interceptor { .. }));
    // The response interceptor's success handler never sees the failure.
    assert_eq!(recorded(&events), vec!["A"]);
}

#[tokio::test]
async fn test_suspended_failure_skips_dispatch_and_reaches_response_failure_handler() {
    let events = Events::default();
    let client = echo_client(&events);

    client
        .interceptors()
        .request()
        .use_interceptor(raising(&events, "A").synchronous(false));

    let recovered_events = Arc::clone(&events);
    client.interceptors().response().use_interceptor(
        ResponseInterceptor::sync(Ok).on_rejected_sync(move |error| {
            record(&recovered_events, format!("recovered: {}", error));
            Ok(Response::new(
                Value::String("fallback".into()),
                String::new(),
                StatusCode::OK,
                HeaderMap::new(),
                Duration::ZERO,
                RequestConfig::default(),
            ))
        }),
    );

    let response = client.request(get("/fail")).await.unwrap();

    assert_eq!(response.data, Value::String("fallback".into()));
    assert_eq!(
        recorded(&events),
        vec!["A", "recovered: request interceptor failed: A raised"]
    );
}

#[tokio::test]
async fn test_activation_predicate_per_request() {
    let events = Events::default();
    let client = echo_client(&events);

    client.interceptors().request().use_interceptor(named(&events, "A"));
    client.interceptors().request().use_interceptor(
        RequestInterceptor::new(|config: RequestConfig| async move { Ok(config) })
            .run_when(|config: &RequestConfig| config.method == Method::POST),
    );

    // Excluded from both ordering and the mode for GET requests.
    assert_eq!(mode_of(&client, &get("/x")), ExecutionMode::Direct);
    assert_eq!(
        mode_of(&client, &RequestConfig::new(Method::POST, "/x")),
        ExecutionMode::Suspended
    );

    client.request(get("/x")).await.unwrap();
    assert_eq!(recorded(&events), vec!["A", "dispatch"]);
}

#[tokio::test]
async fn test_registry_mutation_does_not_affect_in_flight_request() {
    let events = Events::default();
    let client = echo_client(&events);

    let a = client
        .interceptors()
        .request()
        .use_interceptor(named(&events, "A").synchronous(false));

    let in_flight = client.request(get("/first"));

    client.interceptors().request().eject(a);
    client.interceptors().request().use_interceptor(named(&events, "B"));

    let first = in_flight.await.unwrap();
    assert_eq!(first.config.header("x-seen"), Some("A"));

    let second = client.request(get("/second")).await.unwrap();
    assert_eq!(second.config.header("x-seen"), Some("B"));

    assert_eq!(recorded(&events), vec!["A", "dispatch", "B", "dispatch"]);
}

#[tokio::test]
async fn test_transport_failure_routes_to_response_failure_handler() {
    let events = Events::default();
    let client = Client::builder()
        .base_url("http://pipeline.test")
        .unwrap()
        .transport(|_config: RequestConfig| async move {
            Err::<Response<Value>, _>(Error::HttpError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                raw_response: "down".to_string(),
                headers: HeaderMap::new(),
            })
        })
        .build()
        .unwrap();

    client
        .interceptors()
        .response()
        .use_interceptor(observed(&events, "X"));

    let err = client.request(get("/down")).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert!(recorded(&events).is_empty());
}
