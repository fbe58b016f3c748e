//! Network side of the archive: pages, images and their conversion.
//!
//! [`HttpRemote`] implements [`Remote`] on top of [`HttpClient`], with every
//! transient failure going through a [`RetryPolicy`]. Downloaded images are
//! re-encoded to WebP before anything else sees them.

mod client;
pub mod convert;
pub mod error;
mod progress;
mod providers;
mod remote;
mod retry;

pub use crate::client::{ClientOptions, DEFAULT_REFERER, DESKTOP_USER_AGENT, HttpClient, MOBILE_USER_AGENT};
pub use crate::progress::{EpisodeProgress, ProgressSink, TICK, no_progress};
pub use crate::remote::{FetchOptions, HttpRemote, Remote};
pub use crate::retry::RetryPolicy;
