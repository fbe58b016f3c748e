//! SQLite catalog of archived series.
//!
//! The catalog records which series and episodes are archived and which
//! blobs make them up. It is the source of truth for "already saved" checks:
//! the download orchestrator resumes a series from
//! [`Repository::last_saved_episode_number`] and skips anything
//! [`Repository::is_episode_saved`] reports.
//!
//! # Schema
//! - **images**: one row per distinct content hash, typed by kind
//! - **series**: unique by (title, language), referencing its thumbnail and banners
//! - **episodes**: unique by (series, number)
//! - **episode_images**: dense 0-based page positions of an episode
//! - **genres** / **image_kinds**: seeded lookup tables

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{EpisodeRecord, ImageKind, Page, SeriesRecord};
pub use crate::repo::{PAGE_SIZE, Repository};
