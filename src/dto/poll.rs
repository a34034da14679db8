use serde::Deserialize;
use utoipa::IntoParams;

/// Query string of the long-poll endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PollQuery {
    /// Return the current state right away instead of waiting for a change.
    #[serde(default)]
    pub immediate: bool,
}
