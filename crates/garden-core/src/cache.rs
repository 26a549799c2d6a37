use crate::station::Station;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-lifetime station metadata cache.
///
/// Populated opportunistically from search results and directory lookups;
/// the single source of truth for "do we already know this station".  No
/// eviction — station metadata is small and session-scoped.  Not persisted.
#[derive(Debug, Clone, Default)]
pub struct StationCache {
    inner: Arc<RwLock<HashMap<String, Station>>>,
}

impl StationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure lookup; never fetches.
    pub async fn get(&self, id: &str) -> Option<Station> {
        self.inner.read().await.get(id).cloned()
    }

    /// Upsert; overwrites any prior entry for the same id.
    pub async fn put(&self, station: Station) {
        self.inner
            .write()
            .await
            .insert(station.id.clone(), station);
    }

    pub async fn put_all(&self, stations: &[Station]) {
        let mut map = self.inner.write().await;
        for station in stations {
            map.insert(station.id.clone(), station.clone());
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: &str, name: &str) -> Station {
        Station {
            id: id.to_string(),
            name: name.to_string(),
            stream_url: format!("https://example.com/listen/{id}/channel.mp3"),
            image_url: format!("https://example.com/channel/{id}/image.png"),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn get_returns_none_for_unknown_id() {
        let cache = StationCache::new();
        assert!(cache.get("missing").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn put_overwrites_prior_entry_for_same_id() {
        let cache = StationCache::new();
        cache.put(station("a", "First")).await;
        cache.put(station("a", "Second")).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("a").await.map(|s| s.name).as_deref(), Some("Second"));
    }

    #[tokio::test]
    async fn put_all_inserts_every_station() {
        let cache = StationCache::new();
        cache
            .put_all(&[station("a", "A"), station("b", "B")])
            .await;
        assert_eq!(cache.len().await, 2);
        assert!(cache.get("b").await.is_some());
    }
}
