mod assets;
mod entry;
mod episode;
mod provider;
mod series;
mod stars;

pub use self::assets::{EpisodeData, SeriesAssets};
pub use self::entry::CatalogEntry;
pub use self::episode::Episode;
pub use self::provider::Provider;
pub use self::series::{Banners, SeriesInfo};
pub use self::stars::Stars;
