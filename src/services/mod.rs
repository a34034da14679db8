/// Instance affinity checks for room requests.
pub mod affinity;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Client-held room, participant and instance tokens.
pub mod identity;
/// Long-poll coordinator.
pub mod poll_service;
/// Room creation, rendering and mutation.
pub mod room_service;
/// Periodic eviction and snapshot persistence.
pub mod snapshot_supervisor;
