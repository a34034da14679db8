use axum::{
    Json,
    extract::rejection::FormRejection,
    http::{HeaderName, HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{services::identity, state::room::UpdateError};

/// Header asking the htmx client to reload the whole page.
pub const HX_REFRESH: HeaderName = HeaderName::from_static("hx-refresh");
/// Header consumed by the edge proxy to replay a request on another instance.
pub const FLY_REPLAY: HeaderName = HeaderName::from_static("fly-replay");

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No room with this identifier lives on this instance.
    #[error("room `{0}` not found")]
    RoomNotFound(String),
    /// The caller is not a participant of the room.
    #[error("participant not found")]
    ParticipantNotFound,
    /// The request targets a room owned by another instance.
    #[error("room is owned by instance `{owner}`")]
    WrongInstance {
        /// Instance holding the room.
        owner: String,
    },
    /// The room could not be rendered.
    #[error("failed to render room")]
    Render(#[source] serde_json::Error),
}

impl From<UpdateError> for ServiceError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::NotAParticipant => ServiceError::ParticipantNotFound,
        }
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested room or participant not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Request must be replayed on the instance owning the room.
    #[error("not found: room lives on instance `{owner}`")]
    Misrouted {
        /// Instance the edge should replay to.
        owner: String,
    },
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::RoomNotFound(id) => AppError::NotFound(format!("room `{id}`")),
            ServiceError::ParticipantNotFound => AppError::NotFound("participant".into()),
            ServiceError::WrongInstance { owner } => AppError::Misrouted { owner },
            ServiceError::Render(source) => AppError::Internal(source.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(_) => {
                let payload = Json(ErrorBody {
                    message: self.to_string(),
                });
                (StatusCode::BAD_REQUEST, payload).into_response()
            }
            AppError::NotFound(_) => not_found_response(None),
            AppError::Misrouted { owner } => not_found_response(Some(&owner)),
            AppError::Internal(message) => {
                tracing::error!(error = %message, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(HX_REFRESH, HeaderValue::from_static("true"))],
                    "Internal Server Error",
                )
                    .into_response()
            }
        }
    }
}

/// Not-found page that forces a full reload and drops the affinity cookie, optionally asking
/// the edge proxy to replay the request on `replay_to`.
fn not_found_response(replay_to: Option<&str>) -> Response {
    let payload = Json(ErrorBody {
        message: "not found".into(),
    });
    let mut response = (StatusCode::NOT_FOUND, payload).into_response();
    let headers = response.headers_mut();
    headers.insert(HX_REFRESH, HeaderValue::from_static("true"));
    if let Ok(cookie) = HeaderValue::from_str(&identity::clear_instance_cookie()) {
        headers.append(SET_COOKIE, cookie);
    }
    if let Some(owner) = replay_to
        && let Ok(value) = HeaderValue::from_str(&format!("instance={owner}"))
    {
        headers.insert(FLY_REPLAY, value);
    }
    response
}
