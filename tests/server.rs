#![cfg(feature = "server")]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use ratelimit_decay::server::settings::Settings;
use ratelimit_decay::server::{build_state, router, AppState};
use ratelimit_decay::{Registry, RegistryError};
use tower::ServiceExt;

fn settings(requests: u32, alternate: Option<&str>) -> Settings {
    Settings {
        host: "127.0.0.1".into(),
        port: 0,
        requests,
        window_secs: 3600,
        strategy: "decay".into(),
        alternate: alternate.map(String::from),
        work_delay_ms: 0,
        log_level: "info".into(),
    }
}

fn harness(requests: u32, alternate: Option<&str>) -> (AppState, Router) {
    let state = build_state(&Registry::default(), &settings(requests, alternate)).unwrap();
    (state.clone(), router(state))
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn allows_any_origin(response: &Response) -> bool {
    response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .map_or(false, |v| v == "*")
}

#[tokio::test]
async fn async_route_rejects_when_exhausted() {
    let (state, app) = harness(1, None);

    let response = get(&app, "/async").await;
    assert_eq!(StatusCode::OK, response.status());
    assert!(allows_any_origin(&response));
    assert_eq!("OK", body_text(response).await);

    let response = get(&app, "/async").await;
    assert_eq!(StatusCode::TOO_MANY_REQUESTS, response.status());
    assert!(allows_any_origin(&response));
    state.destroy();
}

#[tokio::test]
async fn sync_route_consumes_a_permit() {
    let (state, app) = harness(2, None);

    let response = get(&app, "/sync").await;
    assert_eq!(StatusCode::OK, response.status());
    assert!(allows_any_origin(&response));
    assert_eq!("OK", body_text(response).await);
    assert_eq!(1, state.primary.limiter.consumed());
    state.destroy();
}

#[tokio::test]
async fn sync_route_unavailable_after_teardown() {
    let (state, app) = harness(2, None);
    state.destroy();

    let response = get(&app, "/sync").await;
    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, response.status());
    assert!(allows_any_origin(&response));
    assert_eq!(StatusCode::TOO_MANY_REQUESTS, get(&app, "/async").await.status());
}

#[tokio::test]
async fn waiting_request_released_by_teardown() {
    let (state, app) = harness(1, None);
    assert_eq!(StatusCode::OK, get(&app, "/async").await.status());

    let waiting = tokio::spawn({
        let app = app.clone();
        async move { get(&app, "/sync").await.status() }
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    state.destroy();
    assert_eq!(StatusCode::SERVICE_UNAVAILABLE, waiting.await.unwrap());
}

#[tokio::test]
async fn alternate_routes_only_when_configured() {
    let (state, app) = harness(1, None);
    assert_eq!(StatusCode::NOT_FOUND, get(&app, "/alternate/async").await.status());
    assert_eq!(StatusCode::NOT_FOUND, get(&app, "/alternate/sync").await.status());
    state.destroy();

    let (state, app) = harness(1, Some("unlimited"));
    for _ in 0..5 {
        assert_eq!(StatusCode::OK, get(&app, "/alternate/async").await.status());
        assert_eq!(StatusCode::OK, get(&app, "/alternate/sync").await.status());
    }
    state.destroy();
}

#[tokio::test]
async fn unknown_alternate_is_skipped() {
    let (state, app) = harness(1, Some("no-such-strategy"));
    assert!(state.alternate.is_none());
    assert_eq!(StatusCode::NOT_FOUND, get(&app, "/alternate/async").await.status());
    state.destroy();
}

#[test]
fn unknown_primary_is_an_error() {
    let mut settings = settings(1, None);
    settings.strategy = "no-such-strategy".into();
    assert!(matches!(
        build_state(&Registry::default(), &settings),
        Err(RegistryError::UnknownStrategy(_))
    ));
}

#[tokio::test]
async fn status_reports_every_limiter() {
    let (state, app) = harness(3, Some("unlimited"));
    assert_eq!(StatusCode::OK, get(&app, "/async").await.status());

    let response = get(&app, "/status").await;
    assert_eq!(StatusCode::OK, response.status());
    assert!(allows_any_origin(&response));
    let status: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!("decay", status["primary"]["strategy"]);
    assert_eq!(3, status["primary"]["capacity"]);
    assert_eq!(1, status["primary"]["consumed"]);
    assert_eq!(true, status["primary"]["allowed"]);
    assert_eq!("unlimited", status["alternate"]["strategy"]);
    assert_eq!(0, status["alternate"]["consumed"]);
    state.destroy();
}
