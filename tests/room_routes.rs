//! Router-level tests driving the HTTP surface end to end.

use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Method, Request, StatusCode,
        header::{CONTENT_TYPE, COOKIE, IF_MODIFIED_SINCE, LAST_MODIFIED, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use estimate_back::{
    config::AppConfig,
    dto::room::{IndexView, RoomView},
    routes,
    state::{AppState, SharedState},
};
use tokio::time::Instant;
use tower::ServiceExt;

fn app() -> (SharedState, Router) {
    let state = AppState::new(AppConfig::new("m1"));
    (state.clone(), routes::router(state))
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_form(uri: &str, form: impl Into<String>, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::from(form.into())).unwrap()
}

fn location(response: &Response) -> String {
    response.headers()[LOCATION].to_str().unwrap().to_string()
}

fn cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

fn cookie_value(response: &Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    cookies(response).into_iter().find_map(|cookie| {
        cookie
            .strip_prefix(&prefix)
            .and_then(|rest| rest.split(';').next())
            .map(str::to_string)
    })
}

async fn json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_room(app: &Router) -> String {
    let response = send(app, Request::post("/room").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    location(&response)
}

/// Join `room_path` as `form` and return the participant cookie pair.
async fn join(app: &Router, room_path: &str, form: &'static str) -> String {
    let response = send(app, post_form(room_path, form, None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let user = cookie_value(&response, "user").expect("joining sets the user cookie");
    format!("user={user}")
}

#[tokio::test]
async fn healthcheck_reports_instance() {
    let (_, app) = app();
    let response = send(&app, get("/healthcheck")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["instance"], "m1");
}

#[tokio::test]
async fn create_redirects_to_room_on_this_instance() {
    let (state, app) = app();
    let path = create_room(&app).await;

    let id = path.strip_prefix("/room/m1/").expect("room path names this instance");
    assert!(state.find_room(id).is_some());
}

#[tokio::test]
async fn visitor_sees_room_and_gets_affinity_cookies() {
    let (_, app) = app();
    let path = create_room(&app).await;

    let response = send(&app, get(&path)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(LAST_MODIFIED));
    assert_eq!(response.headers()["cache-control"], "no-cache");
    assert_eq!(cookie_value(&response, "machineId").as_deref(), Some("m1"));
    assert!(cookie_value(&response, "room").is_some());
    assert!(cookie_value(&response, "user").is_none());

    let view: RoomView = json(response).await;
    assert!(view.participants.is_empty());
    assert!(view.you.is_none());
    assert_eq!(view.options.len(), 10);
}

#[tokio::test]
async fn joining_by_form_makes_the_first_participant_host() {
    let (_, app) = app();
    let path = create_room(&app).await;

    let response = send(&app, post_form(&path, "user-name=Alice&topic=Login", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), path);
    let user = cookie_value(&response, "user").unwrap();
    assert_eq!(cookie_value(&response, "machineId").as_deref(), Some("m1"));

    let mut request = get(&path);
    request
        .headers_mut()
        .insert(COOKIE, format!("user={user}").parse().unwrap());
    let view: RoomView = json(send(&app, request).await).await;

    assert_eq!(view.you.as_deref(), Some(user.as_str()));
    assert!(view.is_host);
    assert_eq!(view.topic, "Login");
    assert_eq!(view.participants[0].name, "Alice");
}

#[tokio::test]
async fn htmx_update_redirects_to_immediate_poll() {
    let (_, app) = app();
    let path = create_room(&app).await;
    let user = join(&app, &path, "user-name=Alice").await;

    let mut request = post_form(&path, "estimate=5", Some(&user));
    request
        .headers_mut()
        .insert("hx-request", "true".parse().unwrap());
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("{path}/update?immediate=true"));
}

#[tokio::test]
async fn estimate_from_outsider_is_not_found() {
    let (_, app) = app();
    let path = create_room(&app).await;

    let response = send(&app, post_form(&path, "estimate=5", Some("user=ghost"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["hx-refresh"], "true");
}

#[tokio::test]
async fn oversized_form_is_rejected() {
    let (_, app) = app();
    let path = create_room(&app).await;

    let long_name = format!("user-name={}", "a".repeat(80));
    let response = send(&app, post_form(&path, long_name, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let (_, app) = app();
    let path = create_room(&app).await;

    let response = send(&app, post_form(&path, "estimate=1&estimate=2", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn foreign_update_is_replayed_whatever_the_body() {
    let (_, app) = app();
    let path = create_room(&app).await;
    let foreign = path.replacen("/room/m1/", "/room/m2/", 1);

    let response = send(&app, post_form(&foreign, "estimate=1&estimate=2", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["fly-replay"], "instance=m2");

    let untyped = Request::post(&foreign)
        .body(Body::from("user-name=Alice"))
        .unwrap();
    let response = send(&app, untyped).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["fly-replay"], "instance=m2");
}

#[tokio::test]
async fn foreign_instance_is_replayed() {
    let (_, app) = app();
    let path = create_room(&app).await;
    let foreign = path.replacen("/room/m1/", "/room/m2/", 1);

    let response = send(&app, get(&foreign)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["fly-replay"], "instance=m2");
    assert_eq!(response.headers()["hx-refresh"], "true");
}

#[tokio::test]
async fn unknown_room_and_path_are_not_found() {
    let (_, app) = app();

    let response = send(&app, get("/room/m1/0190f0e4-0000-7000-8000-000000000000")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(cookies(&response).iter().any(|c| c.starts_with("machineId=;")));

    let response = send(&app, get("/nowhere")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["hx-refresh"], "true");
}

#[tokio::test]
async fn index_points_back_to_last_room() {
    let (_, app) = app();
    let path = create_room(&app).await;
    let room_id = path.rsplit('/').next().unwrap().to_string();

    let mut request = get("/");
    request
        .headers_mut()
        .insert(COOKIE, format!("room={room_id}").parse().unwrap());
    let index: IndexView = json(send(&app, request).await).await;

    assert_eq!(index.instance, "m1");
    assert_eq!(index.last_room.as_deref(), Some(path.as_str()));

    let index: IndexView = json(send(&app, get("/")).await).await;
    assert!(index.last_room.is_none());
}

#[tokio::test(start_paused = true)]
async fn poll_with_current_token_times_out_with_not_modified() {
    let (_, app) = app();
    let path = create_room(&app).await;
    let user = join(&app, &path, "user-name=Alice").await;

    let mut request = get(&path);
    request.headers_mut().insert(COOKIE, user.parse().unwrap());
    let last_modified = send(&app, request).await.headers()[LAST_MODIFIED].clone();

    let mut request = get(&format!("{path}/update"));
    request.headers_mut().insert(COOKIE, user.parse().unwrap());
    request
        .headers_mut()
        .insert(IF_MODIFIED_SINCE, last_modified.clone());

    let started = Instant::now();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert!(started.elapsed() >= Duration::from_secs(20));
    assert_eq!(response.headers()[LAST_MODIFIED], last_modified);
}

#[tokio::test(start_paused = true)]
async fn immediate_poll_answers_with_the_room() {
    let (_, app) = app();
    let path = create_room(&app).await;
    let user = join(&app, &path, "user-name=Alice").await;

    let mut request = get(&format!("{path}/update?immediate=true"));
    request.headers_mut().insert(COOKIE, user.parse().unwrap());
    request
        .headers_mut()
        .insert(IF_MODIFIED_SINCE, "Sun, 01 Jan 2090 00:00:00 GMT".parse().unwrap());

    let started = Instant::now();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(started.elapsed(), Duration::ZERO);

    let view: RoomView = json(response).await;
    assert_eq!(view.participants.len(), 1);
}

#[tokio::test]
async fn outsider_poll_is_sent_home() {
    let (_, app) = app();
    let path = create_room(&app).await;

    let mut request = get(&format!("{path}/update"));
    request
        .headers_mut()
        .insert("hx-request", "true".parse().unwrap());
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["hx-location"], "/");

    let response = send(&app, get(&format!("{path}/update"))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}
