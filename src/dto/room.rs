use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::format_rfc3339,
    state::room::{Room, RoomState, RoomUpdate, parse_options},
};

/// Form fields accepted by `POST /room/{instance}/{room}`.
///
/// Every field is optional; empty values leave the matching aspect of the room untouched.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct RoomUpdateForm {
    /// Join the room under this name, or rename yourself.
    #[validate(length(max = 64))]
    pub user_name: Option<String>,
    /// New room display name.
    #[validate(length(max = 128))]
    pub name: Option<String>,
    /// Item currently being estimated.
    #[validate(length(max = 512))]
    pub topic: Option<String>,
    /// Comma separated list of estimate values.
    #[validate(length(max = 1024))]
    pub options: Option<String>,
    /// Estimate to select; sending your current value again clears it.
    #[validate(length(max = 32))]
    pub estimate: Option<String>,
    /// `true` reveals every estimate.
    pub show_estimates: Option<String>,
    /// `true` clears every estimate and hides them again.
    pub delete_estimates: Option<String>,
    /// `true` removes every participant.
    pub kick: Option<String>,
}

impl From<RoomUpdateForm> for RoomUpdate {
    fn from(form: RoomUpdateForm) -> Self {
        Self {
            participant_name: non_empty(form.user_name),
            room_name: non_empty(form.name),
            topic: non_empty(form.topic),
            options: non_empty(form.options).map(|raw| parse_options(&raw)),
            estimate: non_empty(form.estimate),
            reveal: is_true(form.show_estimates.as_deref()),
            clear_estimates: is_true(form.delete_estimates.as_deref()),
            kick_all: is_true(form.kick.as_deref()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn is_true(flag: Option<&str>) -> bool {
    flag == Some("true")
}

/// Room as seen by one participant (or by a visitor who has not joined yet).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomView {
    /// Room identifier.
    pub id: Uuid,
    /// Instance that owns the room; part of every room URL.
    pub instance: String,
    /// Display name, falling back to the identifier.
    pub name: String,
    /// Item being estimated.
    pub topic: String,
    /// Selectable estimate values.
    pub options: Vec<String>,
    /// Whether every vote is visible.
    pub revealed: bool,
    /// Participants in join order.
    pub participants: Vec<ParticipantView>,
    /// Identity of the viewer when they are a participant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub you: Option<String>,
    /// Whether the viewer holds host rights.
    pub is_host: bool,
    /// RFC 3339 timestamp of the last change.
    pub updated_at: String,
}

/// One row of the participant list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ParticipantView {
    /// Participant identity.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether this participant holds host rights.
    pub is_host: bool,
    /// Whether a vote is recorded, visible or not.
    pub has_voted: bool,
    /// Present once revealed, or for the viewer's own vote.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<String>,
}

impl RoomView {
    /// Render `room` for `viewer`, masking other participants' votes until revealed.
    pub fn render(room: &Room, state: &RoomState, viewer: Option<&str>) -> Self {
        let viewer = viewer.filter(|id| state.participant(id).is_some());

        let participants = state
            .participants
            .iter()
            .map(|participant| {
                let estimate = state.estimates.get(&participant.id);
                let visible = state.revealed || viewer == Some(participant.id.as_str());
                ParticipantView {
                    id: participant.id.clone(),
                    name: participant.name.clone(),
                    is_host: state.is_host(&participant.id),
                    has_voted: estimate.is_some(),
                    estimate: estimate.filter(|_| visible).cloned(),
                }
            })
            .collect();

        Self {
            id: room.id(),
            instance: room.instance().to_string(),
            name: room.display_name(state),
            topic: state.topic.clone(),
            options: state.options.clone(),
            revealed: state.revealed,
            participants,
            you: viewer.map(str::to_string),
            is_host: viewer.is_some_and(|id| state.is_host(id)),
            updated_at: format_rfc3339(state.updated_at),
        }
    }
}

/// Landing data for `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IndexView {
    /// Instance answering the request.
    pub instance: String,
    /// Path of the room named by the `room` cookie, while it still exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_room: Option<String>,
}
