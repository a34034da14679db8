use std::sync::Arc;

use time::OffsetDateTime;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{error, info, warn};

use crate::{
    dao::{
        models::{RoomEntity, SnapshotDocument},
        storage::StorageResult,
    },
    state::{AppState, SharedState},
};

/// Load the configured snapshot into the room registry.
///
/// Returns the number of restored rooms; zero when persistence is disabled or no snapshot
/// exists yet. Restored rooms are owned by this instance.
pub async fn restore(state: &AppState) -> StorageResult<usize> {
    let Some(file) = state.snapshot_file() else {
        info!("no DATA_FILE_PATH provided; rooms are only stored in memory");
        return Ok(0);
    };

    let Some(document) = file.load().await? else {
        info!(path = %file.path().display(), "snapshot file does not exist; starting empty");
        return Ok(0);
    };

    let count = document.rooms.len();
    for entity in document.rooms {
        let room = entity.into_room(state.instance_id());
        state.rooms().insert(Arc::new(room));
    }
    info!(path = %file.path().display(), count, "restored rooms from snapshot");
    Ok(count)
}

/// Remove every room idle for longer than the retention window. Returns how many went away.
///
/// Each room is checked and removed under its own lock so a concurrent mutation either lands
/// before the check or finds the room already gone. Waiters of an evicted room are woken.
pub async fn evict_stale_rooms(state: &AppState, now: OffsetDateTime) -> usize {
    let cutoff = now - state.config().retention;
    let mut evicted = 0;

    for room in state.rooms().rooms() {
        let guard = room.state().lock().await;
        if guard.updated_at < cutoff {
            info!(
                room_id = %room.id(),
                name = %guard.name,
                participants = guard.participants.len(),
                "evicting stale room"
            );
            state.rooms().delete(&room.id());
            room.changes().publish();
            evicted += 1;
        }
    }

    evicted
}

/// Copy the persistable fields of every room, locking one room at a time.
pub async fn capture(state: &AppState) -> SnapshotDocument {
    let mut rooms = Vec::with_capacity(state.rooms().len());
    for room in state.rooms().rooms() {
        let guard = room.state().lock().await;
        rooms.push(RoomEntity::capture(&room, &guard));
    }
    rooms.sort_by_key(|entity| entity.id);
    SnapshotDocument::new(rooms)
}

/// Write the registry to the snapshot file. Returns `false` when persistence is disabled.
pub async fn write_snapshot(state: &AppState) -> StorageResult<bool> {
    let Some(file) = state.snapshot_file() else {
        return Ok(false);
    };
    let document = capture(state).await;
    file.save(&document).await?;
    Ok(true)
}

/// Periodic cleanup and snapshot loop.
///
/// Returns once `stop` is signalled (or its sender goes away), or early when a snapshot
/// write fails. A pass in progress always completes before the stop is observed.
pub async fn run(state: SharedState, mut stop: watch::Receiver<bool>) -> StorageResult<()> {
    let mut ticker = interval(state.config().snapshot_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut written_revision = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.changed() => return Ok(()),
        }
        evict_stale_rooms(&state, OffsetDateTime::now_utc()).await;

        // Unchanged registry: nothing to rewrite.
        let revision = state.rooms().revision();
        if written_revision == Some(revision) {
            continue;
        }
        if write_snapshot(&state).await? {
            written_revision = Some(revision);
        }
    }
}

/// Handle on the background task started by [`spawn`].
pub struct Supervisor {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Supervisor {
    /// Whether the task has ended, either stopped or failed.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the loop to stop and wait until no snapshot write is in flight.
    pub async fn stop(self) {
        // A send error only means the loop already returned.
        let _ = self.stop.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "snapshot task did not end cleanly");
        }
    }
}

/// Spawn [`run`] in the background. A failure stops the task, never request handling.
pub fn spawn(state: SharedState) -> Supervisor {
    let (stop, stop_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        if let Err(err) = run(state, stop_rx).await {
            error!(error = %err, "snapshot writer stopped; rooms are no longer persisted");
        }
    });
    Supervisor { stop, task }
}
