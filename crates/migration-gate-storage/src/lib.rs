// crates/migration-gate-storage/src/lib.rs
// ============================================================================
// Crate: migration-gate-storage
// Description: Durable StorageSnapshot store, artifact registry, and legacy
// job migration.
// ============================================================================

//! File-backed persistence for the migration comparison pipeline: one
//! atomically-written snapshot file, one artifact directory tree, and the
//! legacy-jobs migration rule that runs transparently on load.

pub mod migration;
pub mod store;

pub use migration::MigrationError;
pub use store::FileSnapshotStore;
pub use store::FileStoreError;
pub use store::RunSummary;
pub use store::StorageOpCounts;
pub use store::StorageOpCountsSnapshot;
