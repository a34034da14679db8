/// Persisted representation of the room registry.
pub mod models;
/// Snapshot file reads and atomic writes.
pub mod snapshot;
/// Storage error types.
pub mod storage;
