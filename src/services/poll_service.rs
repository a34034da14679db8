//! Long-poll coordinator: answer as soon as a room changes, or report "unchanged" after the
//! poll timeout so the client can poll again.

use time::OffsetDateTime;
use tokio::time::timeout;
use tracing::debug;

use crate::{
    error::ServiceError,
    services::room_service::{self, RenderedRoom},
    state::{AppState, RoomState},
};

/// How a long-poll request ends.
#[derive(Debug)]
pub enum PollOutcome {
    /// The room is newer than the client's token (or changed while waiting).
    Changed(RenderedRoom),
    /// Nothing changed before the timeout.
    Unchanged {
        /// Last change of the room, echoed as `Last-Modified`.
        updated_at: OffsetDateTime,
    },
    /// The caller no longer belongs to the room, or the room is gone.
    Departed,
}

/// Whether a room last changed at `updated_at` is newer than the client's token.
///
/// Tokens carry whole seconds, so the room timestamp is truncated before comparing. A missing
/// token is always stale.
pub fn is_newer(updated_at: OffsetDateTime, since: Option<OffsetDateTime>) -> bool {
    match since {
        None => true,
        Some(since) => updated_at.replace_nanosecond(0).unwrap_or(updated_at) > since,
    }
}

fn is_member(state: &RoomState, viewer: Option<&str>) -> bool {
    viewer.is_some_and(|id| state.participant(id).is_some())
}

/// Serve one long-poll request for `viewer`.
///
/// The waiter is registered before the freshness check, so a mutation landing between the
/// check and the wait still wakes it. Dropping the returned future (client disconnect)
/// unregisters the waiter.
pub async fn poll_room(
    state: &AppState,
    room_id: &str,
    viewer: Option<&str>,
    since: Option<OffsetDateTime>,
    immediate: bool,
) -> Result<PollOutcome, ServiceError> {
    let Some(room) = state.find_room(room_id) else {
        return Ok(PollOutcome::Departed);
    };

    let mut subscription = room.changes().subscribe();
    {
        let guard = room.state().lock().await;
        if !is_member(&guard, viewer) {
            return Ok(PollOutcome::Departed);
        }
        if immediate || is_newer(guard.updated_at, since) {
            return room_service::render(&room, &guard, viewer).map(PollOutcome::Changed);
        }
    }

    let limit = state.config().poll_timeout;
    let published = timeout(limit, subscription.changed()).await.is_ok();
    drop(subscription);

    if state.rooms().get(&room.id()).is_none() {
        debug!(room_id = %room.id(), "room evicted while polling");
        return Ok(PollOutcome::Departed);
    }

    let guard = room.state().lock().await;
    if !published {
        return Ok(PollOutcome::Unchanged {
            updated_at: guard.updated_at,
        });
    }
    if !is_member(&guard, viewer) {
        return Ok(PollOutcome::Departed);
    }
    room_service::render(&room, &guard, viewer).map(PollOutcome::Changed)
}
