//! Client-held tokens: which room and participant a browser belongs to, and which instance
//! should serve it.

use std::time::Duration;

use axum::http::{HeaderMap, header::COOKIE};

/// Cookie naming the last room the client visited.
pub const ROOM_COOKIE: &str = "room";
/// Cookie carrying the participant identity, shared by every room.
pub const USER_COOKIE: &str = "user";
/// Cookie read by the edge proxy to route the client to its room's instance.
pub const INSTANCE_COOKIE: &str = "machineId";

/// Tokens presented by the client on a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientTokens {
    /// Last room visited.
    pub room: Option<String>,
    /// Participant identity.
    pub user: Option<String>,
    /// Instance the client is pinned to.
    pub instance: Option<String>,
}

impl ClientTokens {
    /// Extract the tokens from every `Cookie` header of a request.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut tokens = Self::default();
        let pairs = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='));

        for (name, value) in pairs {
            let value = value.trim().trim_matches('"');
            if value.is_empty() {
                continue;
            }
            let slot = match name.trim() {
                ROOM_COOKIE => &mut tokens.room,
                USER_COOKIE => &mut tokens.user,
                INSTANCE_COOKIE => &mut tokens.instance,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }

        tokens
    }
}

/// `Set-Cookie` value remembering a room or participant for `max_age`.
pub fn persistent_cookie(name: &str, value: &str, max_age: Duration) -> String {
    format!("{name}={value}; Path=/; Max-Age={}", max_age.as_secs())
}

/// `Set-Cookie` value pinning the client to `instance` for the browser session.
pub fn instance_cookie(instance: &str) -> String {
    format!("{INSTANCE_COOKIE}={instance}; Path=/")
}

/// `Set-Cookie` value dropping the instance pin.
pub fn clear_instance_cookie() -> String {
    format!("{INSTANCE_COOKIE}=; Path=/")
}
