use inkvault_source::models::CatalogEntry;
use serde::Serialize;

/// Progress notifications for whoever is watching the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// A series became current.
    Started(CatalogEntry),
    /// Share of the current series' episode list reached, 0 to 100.
    Progress(f64),
    /// Share of the current episode's pages downloaded, 0 to 100.
    EpisodeProgress(f64),
    /// The queue ran dry.
    Ended,
}
