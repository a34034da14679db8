use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::bus::ChangeBus;

/// Estimate values offered by a freshly created room.
pub const DEFAULT_OPTIONS: [&str; 10] = ["🤷", "0", "1", "2", "3", "5", "8", "13", "21", "🤯"];

/// One identity taking part in a room.
#[derive(Debug, Clone, Eq)]
pub struct Participant {
    /// Stable identity, carried by the client across rooms.
    pub id: String,
    /// Display name chosen by the participant.
    pub name: String,
}

impl Participant {
    /// Build a participant record.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl PartialEq for Participant {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Generate a fresh, time-ordered participant identity.
pub fn new_participant_id() -> String {
    Uuid::now_v7().to_string()
}

/// Mutable part of a room, guarded by the room lock.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomState {
    /// Optional label; empty means "use the identifier".
    pub name: String,
    /// Identity of the participant holding management rights.
    ///
    /// May point at a participant that is no longer present after [`RoomState::kick_all`].
    pub host_id: Option<String>,
    /// Participants in join order.
    pub participants: Vec<Participant>,
    /// Item currently being estimated.
    pub topic: String,
    /// Selectable estimate values, in display order.
    pub options: Vec<String>,
    /// Current vote of each participant; absence means "not voted yet".
    pub estimates: IndexMap<String, String>,
    /// Whether votes are visible to everyone.
    pub revealed: bool,
    /// Time of the last mutation. Never moves backwards.
    pub updated_at: OffsetDateTime,
}

impl RoomState {
    /// State of a brand-new room.
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            name: String::new(),
            host_id: None,
            participants: Vec::new(),
            topic: String::new(),
            options: DEFAULT_OPTIONS.iter().map(|value| value.to_string()).collect(),
            estimates: IndexMap::new(),
            revealed: false,
            updated_at: now,
        }
    }

    /// Look a participant up by identity.
    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|participant| participant.id == id)
    }

    /// Whether `id` currently holds host rights.
    pub fn is_host(&self, id: &str) -> bool {
        self.host_id.as_deref() == Some(id)
    }

    /// Add a participant, or rename it when the identity is already present.
    ///
    /// The newcomer becomes host when no present participant holds the role.
    pub fn join(&mut self, participant: Participant) {
        if let Some(existing) = self
            .participants
            .iter_mut()
            .find(|existing| **existing == participant)
        {
            existing.name = participant.name;
            return;
        }

        let host_present = self
            .host_id
            .as_deref()
            .is_some_and(|host| self.participant(host).is_some());
        if !host_present {
            self.host_id = Some(participant.id.clone());
        }
        self.participants.push(participant);
    }

    /// Select `value` for `participant_id`; selecting the current value again clears it.
    pub fn toggle_estimate(&mut self, participant_id: &str, value: &str) {
        if self.estimates.get(participant_id).map(String::as_str) == Some(value) {
            self.estimates.shift_remove(participant_id);
        } else {
            self.estimates
                .insert(participant_id.to_string(), value.to_string());
        }
    }

    /// Make every estimate visible.
    pub fn reveal(&mut self) {
        self.revealed = true;
    }

    /// Drop every estimate and mask the next round.
    pub fn clear_estimates(&mut self) {
        self.revealed = false;
        self.estimates.clear();
    }

    /// Remove every participant along with their estimates.
    ///
    /// The host field is left untouched; the next participant to join takes the role over.
    pub fn kick_all(&mut self) {
        self.participants.clear();
        self.estimates.clear();
    }

    /// Record a mutation at `now`, keeping the timestamp non-decreasing.
    pub fn touch(&mut self, now: OffsetDateTime) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Apply a form-style update in a fixed order and stamp the room.
    ///
    /// `identity` is the participant token presented by the caller, if any. The returned
    /// identity is the participant the caller acts as afterwards.
    pub fn apply_update(
        &mut self,
        identity: Option<&str>,
        update: RoomUpdate,
        now: OffsetDateTime,
    ) -> Result<UpdateEffect, UpdateError> {
        let member = identity.filter(|id| self.participant(id).is_some());

        if update.estimate.is_some() && member.is_none() && update.participant_name.is_none() {
            return Err(UpdateError::NotAParticipant);
        }

        let mut effect = UpdateEffect {
            participant_id: member.map(str::to_string),
            joined: false,
        };

        if let Some(name) = update.participant_name {
            let id = match member {
                Some(id) => id.to_string(),
                None => {
                    effect.joined = true;
                    identity.map(str::to_string).unwrap_or_else(new_participant_id)
                }
            };
            self.join(Participant::new(id.clone(), name));
            effect.participant_id = Some(id);
        }

        if let Some(name) = update.room_name {
            self.name = name;
        }

        if let Some(topic) = update.topic {
            self.topic = topic;
        }

        if let Some(value) = update.estimate
            && let Some(id) = effect.participant_id.as_deref()
        {
            self.toggle_estimate(id, &value);
        }

        if update.reveal {
            self.reveal();
        }

        if update.clear_estimates {
            self.clear_estimates();
        }

        if let Some(options) = update.options {
            self.options = options;
        }

        if update.kick_all {
            self.kick_all();
        }

        self.touch(now);
        Ok(effect)
    }
}

/// Parsed room mutation. `None` / `false` leaves the corresponding aspect untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomUpdate {
    /// Join the room, or rename the caller when already present.
    pub participant_name: Option<String>,
    /// New room display name.
    pub room_name: Option<String>,
    /// New topic.
    pub topic: Option<String>,
    /// Replacement option list.
    pub options: Option<Vec<String>>,
    /// Estimate to toggle for the caller.
    pub estimate: Option<String>,
    /// Reveal estimates.
    pub reveal: bool,
    /// Clear estimates and mask them again.
    pub clear_estimates: bool,
    /// Remove every participant.
    pub kick_all: bool,
}

/// Outcome of [`RoomState::apply_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEffect {
    /// Participant the caller acts as after the update.
    pub participant_id: Option<String>,
    /// True when the update added the caller to the room.
    pub joined: bool,
}

/// Reasons an update is refused before any field is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpdateError {
    /// The update needs a participant and the caller is none.
    #[error("caller is not a participant of this room")]
    NotAParticipant,
}

/// A room aggregate: immutable identity, locked state and its change bus.
pub struct Room {
    id: Uuid,
    instance: String,
    state: Mutex<RoomState>,
    changes: ChangeBus,
}

impl Room {
    /// Wrap `state` into a room owned by `instance`.
    pub fn new(id: Uuid, instance: impl Into<String>, state: RoomState) -> Self {
        Self {
            id,
            instance: instance.into(),
            state: Mutex::new(state),
            changes: ChangeBus::new(),
        }
    }

    /// Create an empty room with a fresh time-ordered identifier.
    pub fn create(instance: impl Into<String>, now: OffsetDateTime) -> Self {
        Self::new(Uuid::now_v7(), instance, RoomState::new(now))
    }

    /// Room identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Instance holding the authoritative copy of this room.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Room lock. Hold it only across in-memory updates, never across I/O.
    pub fn state(&self) -> &Mutex<RoomState> {
        &self.state
    }

    /// Change notifications for long-poll waiters.
    pub fn changes(&self) -> &ChangeBus {
        &self.changes
    }

    /// Display name, falling back to the identifier.
    pub fn display_name(&self, state: &RoomState) -> String {
        if state.name.is_empty() {
            self.id.to_string()
        } else {
            state.name.clone()
        }
    }
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

/// Split a comma-separated option list, trimming entries and skipping blanks.
pub fn parse_options(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(seconds)
    }

    fn join(state: &mut RoomState, id: &str, name: &str, now: OffsetDateTime) {
        state
            .apply_update(
                Some(id),
                RoomUpdate {
                    participant_name: Some(name.into()),
                    ..RoomUpdate::default()
                },
                now,
            )
            .unwrap();
    }

    #[test]
    fn new_room_uses_default_options() {
        let state = RoomState::new(at(0));
        assert_eq!(state.options, DEFAULT_OPTIONS.map(String::from).to_vec());
        assert!(state.participants.is_empty());
        assert!(!state.revealed);
    }

    #[test]
    fn first_participant_becomes_host() {
        let mut state = RoomState::new(at(0));
        join(&mut state, "a", "Alice", at(1));
        join(&mut state, "b", "Bob", at(2));

        assert_eq!(state.host_id.as_deref(), Some("a"));
        let ids: Vec<_> = state.participants.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn joining_twice_renames_instead_of_duplicating() {
        let mut state = RoomState::new(at(0));
        join(&mut state, "a", "Alice", at(1));
        join(&mut state, "a", "Alicia", at(2));

        assert_eq!(state.participants.len(), 1);
        assert_eq!(state.participants[0].name, "Alicia");
    }

    #[test]
    fn joining_without_identity_generates_one() {
        let mut state = RoomState::new(at(0));
        let effect = state
            .apply_update(
                None,
                RoomUpdate {
                    participant_name: Some("Anon".into()),
                    ..RoomUpdate::default()
                },
                at(1),
            )
            .unwrap();

        assert!(effect.joined);
        let id = effect.participant_id.unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        assert!(state.participant(&id).is_some());
    }

    #[test]
    fn estimate_toggles_and_replaces() {
        let mut state = RoomState::new(at(0));
        state.toggle_estimate("a", "3");
        assert_eq!(state.estimates.get("a").map(String::as_str), Some("3"));

        state.toggle_estimate("a", "5");
        assert_eq!(state.estimates.get("a").map(String::as_str), Some("5"));

        state.toggle_estimate("a", "5");
        assert!(!state.estimates.contains_key("a"));
    }

    #[test]
    fn estimate_from_stranger_is_refused_without_side_effects() {
        let mut state = RoomState::new(at(0));
        let before = state.clone();

        let err = state
            .apply_update(
                Some("ghost"),
                RoomUpdate {
                    topic: Some("should not stick".into()),
                    estimate: Some("3".into()),
                    ..RoomUpdate::default()
                },
                at(5),
            )
            .unwrap_err();

        assert_eq!(err, UpdateError::NotAParticipant);
        assert_eq!(state, before);
    }

    #[test]
    fn clear_estimates_resets_reveal() {
        let mut state = RoomState::new(at(0));
        state.toggle_estimate("a", "1");
        state.reveal();

        state.clear_estimates();
        assert!(state.estimates.is_empty());
        assert!(!state.revealed);

        state.clear_estimates();
        assert!(!state.revealed);
    }

    #[test]
    fn kick_all_keeps_room_settings() {
        let mut state = RoomState::new(at(0));
        join(&mut state, "a", "Alice", at(1));
        state
            .apply_update(
                Some("a"),
                RoomUpdate {
                    room_name: Some("Sprint 12".into()),
                    topic: Some("Login page".into()),
                    options: Some(parse_options("1, 2, 3")),
                    estimate: Some("2".into()),
                    ..RoomUpdate::default()
                },
                at(2),
            )
            .unwrap();

        state.kick_all();

        assert!(state.participants.is_empty());
        assert!(state.estimates.is_empty());
        assert_eq!(state.name, "Sprint 12");
        assert_eq!(state.topic, "Login page");
        assert_eq!(state.options, ["1", "2", "3"]);
        // Stale host reference is tolerated.
        assert_eq!(state.host_id.as_deref(), Some("a"));
    }

    #[test]
    fn next_joiner_after_kick_takes_over_host() {
        let mut state = RoomState::new(at(0));
        join(&mut state, "a", "Alice", at(1));
        state.kick_all();
        join(&mut state, "b", "Bob", at(2));

        assert!(state.is_host("b"));
    }

    #[test]
    fn updated_at_never_moves_backwards() {
        let mut state = RoomState::new(at(10));
        let updates = [at(12), at(11), at(12), at(3), at(20)];
        let mut previous = state.updated_at;

        for now in updates {
            state
                .apply_update(None, RoomUpdate::default(), now)
                .unwrap();
            assert!(state.updated_at >= previous);
            previous = state.updated_at;
        }
        assert_eq!(state.updated_at, at(20));
    }

    #[test]
    fn options_are_trimmed_and_blanks_dropped() {
        assert_eq!(parse_options(" 1,2 , ,3,"), ["1", "2", "3"]);
        assert_eq!(parse_options("S,M,L,XL"), ["S", "M", "L", "XL"]);
        assert!(parse_options(" , ").is_empty());
    }

    #[test]
    fn display_name_falls_back_to_identifier() {
        let room = Room::create("local", at(0));
        let mut state = RoomState::new(at(0));
        assert_eq!(room.display_name(&state), room.id().to_string());

        state.name = "Team Rocket".into();
        assert_eq!(room.display_name(&state), "Team Rocket");
    }
}
