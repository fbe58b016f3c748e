use serde::{Deserialize, Serialize};

/// One entry of a series' episode list, as shown in the viewer sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub title: String,
    /// 1-based, assigned in list order starting at the first reachable viewer.
    pub number: u32,
    pub link: String,
    pub thumbnail: String,
}
