use serde::{Deserialize, Serialize};

/// A playable radio station as surfaced by the directory.
///
/// Identity is `id`; two values with the same id are interchangeable within
/// one session and the cache applies last-write-wins on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub stream_url: String,
    pub image_url: String,
    #[serde(default)]
    pub description: String,
}
