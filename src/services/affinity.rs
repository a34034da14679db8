//! Instance affinity: every request for a room must reach the instance that holds it in memory.

use tracing::info;

use crate::{error::ServiceError, services::identity::ClientTokens, state::AppState};

/// Instance a request is addressed to. The path segment wins over the affinity cookie.
pub fn target_instance<'a>(path: Option<&'a str>, tokens: &'a ClientTokens) -> Option<&'a str> {
    path.filter(|value| !value.is_empty())
        .or(tokens.instance.as_deref())
}

/// Refuse to serve requests addressed to another instance.
///
/// Requests without any target are served locally.
pub fn ensure_local(state: &AppState, target: Option<&str>) -> Result<(), ServiceError> {
    match target {
        Some(owner) if owner != state.instance_id() => {
            info!(
                instance = state.instance_id(),
                owner, "request addressed to another instance; asking edge to replay"
            );
            Err(ServiceError::WrongInstance {
                owner: owner.to_string(),
            })
        }
        _ => Ok(()),
    }
}
