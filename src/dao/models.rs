use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::room::{Participant, Room, RoomState};

/// Current layout version of [`SnapshotDocument`].
pub const SNAPSHOT_VERSION: u32 = 1;

/// Whole-registry snapshot as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// Layout version, see [`SNAPSHOT_VERSION`].
    pub version: u32,
    /// Every persisted room.
    pub rooms: Vec<RoomEntity>,
}

impl SnapshotDocument {
    /// Wrap `rooms` in a document of the current layout version.
    pub fn new(rooms: Vec<RoomEntity>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            rooms,
        }
    }
}

/// Persistable fields of a room. The owning instance and the waiters are never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEntity {
    /// Room identifier.
    pub id: Uuid,
    /// Display name; empty when unset.
    #[serde(default)]
    pub name: String,
    /// Recorded host, possibly no longer present.
    #[serde(default)]
    pub host_id: Option<String>,
    /// Participants in join order.
    #[serde(default)]
    pub participants: Vec<ParticipantEntity>,
    /// Item being estimated.
    #[serde(default)]
    pub topic: String,
    /// Selectable estimate values.
    pub options: Vec<String>,
    /// Votes keyed by participant identity.
    #[serde(default)]
    pub estimates: IndexMap<String, String>,
    /// Whether votes are visible.
    #[serde(default)]
    pub revealed: bool,
    /// Last mutation.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Stored participant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantEntity {
    /// Participant identity.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl RoomEntity {
    /// Capture `room` as currently described by `state` (the caller holds the room lock).
    pub fn capture(room: &Room, state: &RoomState) -> Self {
        Self {
            id: room.id(),
            name: state.name.clone(),
            host_id: state.host_id.clone(),
            participants: state
                .participants
                .iter()
                .cloned()
                .map(ParticipantEntity::from)
                .collect(),
            topic: state.topic.clone(),
            options: state.options.clone(),
            estimates: state.estimates.clone(),
            revealed: state.revealed,
            updated_at: state.updated_at,
        }
    }

    /// Rebuild a live room owned by `instance`.
    pub fn into_room(self, instance: &str) -> Room {
        let state = RoomState {
            name: self.name,
            host_id: self.host_id,
            participants: self.participants.into_iter().map(Into::into).collect(),
            topic: self.topic,
            options: self.options,
            estimates: self.estimates,
            revealed: self.revealed,
            updated_at: self.updated_at,
        };
        Room::new(self.id, instance, state)
    }
}

impl From<Participant> for ParticipantEntity {
    fn from(value: Participant) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

impl From<ParticipantEntity> for Participant {
    fn from(value: ParticipantEntity) -> Self {
        Participant::new(value.id, value.name)
    }
}
