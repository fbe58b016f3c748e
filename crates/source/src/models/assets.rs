/// Converted series images, ready for the blob store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesAssets {
    pub thumbnail: Vec<u8>,
    pub background_banner: Option<Vec<u8>>,
    pub top_banner: Vec<u8>,
    pub mobile_banner: Option<Vec<u8>>,
}

/// Converted images of one episode, pages in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeData {
    pub thumbnail: Vec<u8>,
    pub images: Vec<Vec<u8>>,
}
