use axum::{
    Form, Json, Router,
    extract::{Path, Query, State, rejection::FormRejection},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, IF_MODIFIED_SINCE, LAST_MODIFIED, SET_COOKIE},
    },
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        format_http_date, parse_http_date,
        poll::PollQuery,
        room::{IndexView, RoomUpdateForm, RoomView},
    },
    error::AppError,
    services::{
        affinity,
        identity::{self, ClientTokens, ROOM_COOKIE, USER_COOKIE},
        poll_service::{self, PollOutcome},
        room_service::{self, RenderedRoom},
    },
    state::SharedState,
};

const HX_REQUEST: HeaderName = HeaderName::from_static("hx-request");
const HX_LOCATION: HeaderName = HeaderName::from_static("hx-location");

/// Room lifecycle, mutation and long-poll endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/room", post(create_room))
        .route("/room/{instance}/{room}", get(get_room).post(update_room))
        .route("/room/{instance}/{room}/update", get(poll_room))
}

fn room_path(instance: &str, room_id: &str) -> String {
    format!("/room/{instance}/{room_id}")
}

fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get(&HX_REQUEST)
        .is_some_and(|value| value.as_bytes() == b"true")
}

fn append_cookies(response: &mut Response, cookies: Vec<String>) {
    let headers = response.headers_mut();
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.append(SET_COOKIE, value);
        }
    }
}

/// Full room state with its conditional token.
fn room_response(rendered: RenderedRoom, cookies: Vec<String>) -> Response {
    let mut response = rendered.body.into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(value) = HeaderValue::from_str(&format_http_date(rendered.updated_at)) {
        headers.insert(LAST_MODIFIED, value);
    }
    append_cookies(&mut response, cookies);
    response
}

/// Send a client that no longer belongs to the room back to the home page.
fn leave_room(headers: &HeaderMap) -> Response {
    if is_htmx(headers) {
        [(HX_LOCATION, "/")].into_response()
    } else {
        Redirect::to("/").into_response()
    }
}

#[utoipa::path(
    get,
    path = "/",
    tag = "room",
    responses((status = 200, description = "Landing data, including the last visited room", body = IndexView))
)]
/// Describe this instance and point back to the last room the client visited, if it still exists.
pub async fn index(State(state): State<SharedState>, headers: HeaderMap) -> Json<IndexView> {
    let tokens = ClientTokens::from_headers(&headers);
    let last_room = tokens
        .room
        .as_deref()
        .and_then(|id| state.find_room(id))
        .map(|room| room_path(room.instance(), &room.id().to_string()));

    Json(IndexView {
        instance: state.instance_id().to_string(),
        last_room,
    })
}

#[utoipa::path(
    post,
    path = "/room",
    tag = "room",
    responses((status = 303, description = "Room created; redirects to its page"))
)]
/// Create a room on this instance and redirect to it.
pub async fn create_room(State(state): State<SharedState>) -> Redirect {
    let room = room_service::create_room(&state);
    Redirect::to(&room_path(room.instance(), &room.id().to_string()))
}

#[utoipa::path(
    get,
    path = "/room/{instance}/{room}",
    tag = "room",
    params(
        ("instance" = String, Path, description = "Instance owning the room"),
        ("room" = String, Path, description = "Room identifier"),
    ),
    responses(
        (status = 200, description = "Room as seen by the caller", body = RoomView),
        (status = 404, description = "Unknown room, or replayed to the owning instance")
    )
)]
/// Render the room for the caller and refresh the affinity cookies.
pub async fn get_room(
    State(state): State<SharedState>,
    Path((instance, room_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let tokens = ClientTokens::from_headers(&headers);
    affinity::ensure_local(&state, affinity::target_instance(Some(&instance), &tokens))?;

    let (rendered, member) =
        room_service::view_room(&state, &room_id, tokens.user.as_deref()).await?;

    let retention = state.config().retention;
    let mut cookies = vec![
        identity::instance_cookie(state.instance_id()),
        identity::persistent_cookie(ROOM_COOKIE, &room_id, retention),
    ];
    if let Some(member) = member {
        cookies.push(identity::persistent_cookie(USER_COOKIE, &member, retention));
    }

    Ok(room_response(rendered, cookies))
}

#[utoipa::path(
    post,
    path = "/room/{instance}/{room}",
    tag = "room",
    params(
        ("instance" = String, Path, description = "Instance owning the room"),
        ("room" = String, Path, description = "Room identifier"),
    ),
    request_body(content = RoomUpdateForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Update applied; redirects to the room or its update feed"),
        (status = 400, description = "Invalid form"),
        (status = 404, description = "Unknown room or participant")
    )
)]
/// Apply a room update and wake every client polling the room.
///
/// Misrouted requests are replayed before the body is looked at.
pub async fn update_room(
    State(state): State<SharedState>,
    Path((instance, room_id)): Path<(String, String)>,
    headers: HeaderMap,
    form: Result<Form<RoomUpdateForm>, FormRejection>,
) -> Result<Response, AppError> {
    let tokens = ClientTokens::from_headers(&headers);
    affinity::ensure_local(&state, affinity::target_instance(Some(&instance), &tokens))?;
    let Form(form) = form?;
    form.validate()?;

    let outcome =
        room_service::update_room(&state, &room_id, tokens.user.as_deref(), form.into()).await?;

    let room_id = outcome.room.id().to_string();
    let path = room_path(outcome.room.instance(), &room_id);
    let target = if is_htmx(&headers) {
        format!("{path}/update?immediate=true")
    } else {
        path
    };

    let mut response = Redirect::to(&target).into_response();
    if let Some(participant) = outcome.participant_id.as_deref() {
        let retention = state.config().retention;
        append_cookies(
            &mut response,
            vec![
                identity::instance_cookie(outcome.room.instance()),
                identity::persistent_cookie(ROOM_COOKIE, &room_id, retention),
                identity::persistent_cookie(USER_COOKIE, participant, retention),
            ],
        );
    }
    Ok(response)
}

#[utoipa::path(
    get,
    path = "/room/{instance}/{room}/update",
    tag = "room",
    params(
        ("instance" = String, Path, description = "Instance owning the room"),
        ("room" = String, Path, description = "Room identifier"),
        ("If-Modified-Since" = Option<String>, Header, description = "Last-Modified of the state the client rendered"),
        PollQuery,
    ),
    responses(
        (status = 200, description = "Room changed since the conditional token", body = RoomView),
        (status = 304, description = "Nothing changed before the poll timeout"),
        (status = 303, description = "Caller left the room; go back home")
    )
)]
/// Long-poll the room: answer once it changes, or with 304 after the poll timeout.
pub async fn poll_room(
    State(state): State<SharedState>,
    Path((instance, room_id)): Path<(String, String)>,
    Query(query): Query<PollQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let tokens = ClientTokens::from_headers(&headers);
    affinity::ensure_local(&state, affinity::target_instance(Some(&instance), &tokens))?;

    let since = headers
        .get(IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date);

    let outcome = poll_service::poll_room(
        &state,
        &room_id,
        tokens.user.as_deref(),
        since,
        query.immediate,
    )
    .await?;

    let response = match outcome {
        PollOutcome::Changed(rendered) => room_response(rendered, Vec::new()),
        PollOutcome::Unchanged { updated_at } => (
            StatusCode::NOT_MODIFIED,
            [
                (LAST_MODIFIED, format_http_date(updated_at)),
                (CACHE_CONTROL, "no-cache".to_string()),
            ],
        )
            .into_response(),
        PollOutcome::Departed => leave_room(&headers),
    };
    Ok(response)
}
