//! Durable download queue: one series at a time, resumable after a crash.
//!
//! [`Orchestrator`] owns the queue and its worker. Series are resolved
//! through the discovery cache, fetched through a
//! [`Remote`](inkvault_fetch::Remote) and committed episode by episode to
//! the catalog.

pub mod error;
mod events;
mod orchestrator;
mod queue;
mod schedule;

pub use crate::events::DownloadEvent;
pub use crate::orchestrator::{Enqueued, Orchestrator};
pub use crate::queue::QueueState;
pub use crate::schedule::{next_run_delay, run_daily};

