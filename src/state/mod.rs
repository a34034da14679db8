/// Per-room change notifications.
pub mod bus;
/// Room aggregate and its operations.
pub mod room;
/// Registry of live rooms.
pub mod store;

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{config::AppConfig, dao::snapshot::SnapshotFile};

pub use self::bus::{ChangeBus, Subscription};
pub use self::room::{Participant, Room, RoomState, RoomUpdate};
pub use self::store::RoomStore;

/// Application state shared by every handler and background task.
pub type SharedState = Arc<AppState>;

/// Central application state: configuration, the room registry and the snapshot location.
pub struct AppState {
    config: AppConfig,
    rooms: RoomStore,
    snapshot: Option<SnapshotFile>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The registry starts empty; restoring a snapshot is up to the caller.
    pub fn new(config: AppConfig) -> SharedState {
        let snapshot = config.data_file.clone().map(SnapshotFile::new);
        Arc::new(Self {
            config,
            rooms: RoomStore::new(),
            snapshot,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Identifier of this process instance.
    pub fn instance_id(&self) -> &str {
        &self.config.instance_id
    }

    /// Registry of rooms owned by this instance.
    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    /// Durable snapshot location, when persistence is enabled.
    pub fn snapshot_file(&self) -> Option<&SnapshotFile> {
        self.snapshot.as_ref()
    }

    /// Create a room owned by this instance.
    pub fn create_room(&self) -> Arc<Room> {
        self.rooms
            .create(self.instance_id(), OffsetDateTime::now_utc())
    }

    /// Look a room up by its textual identifier. Malformed identifiers are simply absent.
    pub fn find_room(&self, id: &str) -> Option<Arc<Room>> {
        let id = Uuid::parse_str(id).ok()?;
        self.rooms.get(&id)
    }
}
