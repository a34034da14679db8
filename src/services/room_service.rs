use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
    dto::room::RoomView,
    error::ServiceError,
    state::{AppState, Room, RoomState, RoomUpdate},
};

/// Room rendered for one viewer, ready to be sent.
#[derive(Debug, Clone)]
pub struct RenderedRoom {
    /// Serialized [`RoomView`].
    pub body: Vec<u8>,
    /// Last change of the rendered state; the client's next conditional token.
    pub updated_at: OffsetDateTime,
}

/// Result of a successful mutation.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// Updated room.
    pub room: Arc<Room>,
    /// Participant the caller acts as after the update.
    pub participant_id: Option<String>,
    /// True when the caller joined the room with this update.
    pub joined: bool,
}

/// Render `state` for `viewer`.
pub fn render(
    room: &Room,
    state: &RoomState,
    viewer: Option<&str>,
) -> Result<RenderedRoom, ServiceError> {
    let view = RoomView::render(room, state, viewer);
    let body = serde_json::to_vec(&view).map_err(ServiceError::Render)?;
    Ok(RenderedRoom {
        body,
        updated_at: state.updated_at,
    })
}

/// Create a room owned by this instance.
pub fn create_room(state: &AppState) -> Arc<Room> {
    let room = state.create_room();
    info!(room_id = %room.id(), instance = room.instance(), "room created");
    room
}

/// Find a room or report it as not found.
pub fn require_room(state: &AppState, room_id: &str) -> Result<Arc<Room>, ServiceError> {
    state
        .find_room(room_id)
        .ok_or_else(|| ServiceError::RoomNotFound(room_id.to_string()))
}

/// Render a room for `viewer`. Returns the viewer's identity when they are a participant.
pub async fn view_room(
    state: &AppState,
    room_id: &str,
    viewer: Option<&str>,
) -> Result<(RenderedRoom, Option<String>), ServiceError> {
    let room = require_room(state, room_id)?;
    let guard = room.state().lock().await;
    let member = viewer
        .filter(|id| guard.participant(id).is_some())
        .map(str::to_string);
    let rendered = render(&room, &guard, viewer)?;
    Ok((rendered, member))
}

/// Apply `update` under the room lock, then wake every long-poll waiting on the room.
pub async fn update_room(
    state: &AppState,
    room_id: &str,
    identity: Option<&str>,
    update: RoomUpdate,
) -> Result<UpdateOutcome, ServiceError> {
    let room = require_room(state, room_id)?;
    apply_update(state, room, identity, update).await
}

/// Apply `update` to an already resolved room.
///
/// The registry is checked again once the lock is held: a room evicted while the caller waited
/// for it is reported as not found instead of silently absorbing the change.
pub async fn apply_update(
    state: &AppState,
    room: Arc<Room>,
    identity: Option<&str>,
    update: RoomUpdate,
) -> Result<UpdateOutcome, ServiceError> {
    let effect = {
        let mut guard = room.state().lock().await;
        let registered = state
            .rooms()
            .get(&room.id())
            .is_some_and(|current| Arc::ptr_eq(&current, &room));
        if !registered {
            return Err(ServiceError::RoomNotFound(room.id().to_string()));
        }

        let effect = guard.apply_update(identity, update, OffsetDateTime::now_utc())?;
        state.rooms().mark_changed();
        let woken = room.changes().publish();
        debug!(room_id = %room.id(), woken, "room updated");
        effect
    };

    if effect.joined {
        info!(room_id = %room.id(), "participant joined");
    }

    Ok(UpdateOutcome {
        room,
        participant_id: effect.participant_id,
        joined: effect.joined,
    })
}
