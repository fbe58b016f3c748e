//! Bulk blob transfer: between storage backends of one instance, and from
//! one running instance to another.

mod bundle;
pub mod error;
mod mover;
mod peer;

pub use crate::bundle::{DEFAULT_CHUNK_SIZE, MigrationInfo, export_chunk, import_chunk, migration_info};
pub use crate::mover::{BatchMover, DEFAULT_BATCH_SIZE, DEFAULT_COOLDOWN, MoveReport, list_all};
pub use crate::peer::{HttpPeer, ImportReport, export_database, import_from};
