//! Station directory client (Radio Garden style API).
//!
//! Search hits are filtered, not errored: anything that is not a playable
//! channel with a resolvable id silently drops out.  Every station that
//! survives mapping is written into the shared [`StationCache`] before it is
//! returned, so later favorites/restore resolution can stay off the network.

use crate::cache::StationCache;
use crate::config::DirectoryConfig;
use crate::error::DirectoryError;
use crate::station::Station;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

// ── wire models ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(rename = "_source")]
    source: Option<HitSource>,
}

#[derive(Debug, Deserialize)]
struct HitSource {
    page: Option<HitPage>,
}

#[derive(Debug, Deserialize)]
struct HitPage {
    url: Option<String>,
    title: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelResponse {
    data: ChannelData,
}

#[derive(Debug, Deserialize)]
struct ChannelData {
    title: String,
    place: ChannelPlace,
}

#[derive(Debug, Deserialize)]
struct ChannelPlace {
    title: String,
}

// ── client ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    cfg: DirectoryConfig,
    cache: StationCache,
}

impl DirectoryClient {
    /// Build a client with validating TLS and the directory's expected
    /// browser-like headers.  Certificate validation is intentionally left
    /// on; there is no trust-all knob.
    pub fn new(cfg: DirectoryConfig, cache: StationCache) -> Result<Self, DirectoryError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(referer) = reqwest::header::HeaderValue::from_str(&cfg.referer) {
            headers.insert(reqwest::header::REFERER, referer);
        }

        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { http, cfg, cache })
    }

    pub fn featured_count(&self) -> usize {
        self.cfg.featured_count
    }

    fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.cfg.search_timeout_secs)
    }

    /// Search the directory.  An empty query is replaced with the configured
    /// default browse term before dispatch.  Bounded by the search timeout —
    /// exceeding it fails with [`DirectoryError::Timeout`] rather than
    /// hanging.
    pub async fn search(&self, query: &str) -> Result<Vec<Station>, DirectoryError> {
        let q = effective_query(query, &self.cfg.default_query);
        let url = format!("{}/search", self.cfg.api_base.trim_end_matches('/'));

        let response = tokio::time::timeout(self.search_timeout(), async {
            let resp = self.http.get(&url).query(&[("q", q)]).send().await?;
            if !resp.status().is_success() {
                return Err(DirectoryError::Status(resp.status()));
            }
            let body = resp.text().await?;
            serde_json::from_str::<SearchResponse>(&body)
                .map_err(|e| DirectoryError::MalformedResponse(e.to_string()))
        })
        .await
        .map_err(|_| DirectoryError::Timeout)??;

        let stations: Vec<Station> = response
            .hits
            .hits
            .into_iter()
            .filter_map(|hit| map_hit(&self.cfg, hit))
            .collect();

        debug!(query = q, count = stations.len(), "directory search mapped");
        self.cache.put_all(&stations).await;
        Ok(stations)
    }

    /// Look up one channel by id.  Same timeout and failure modes as search.
    pub async fn lookup(&self, id: &str) -> Result<Station, DirectoryError> {
        let url = format!(
            "{}/ara/content/channel/{}",
            self.cfg.api_base.trim_end_matches('/'),
            id
        );

        let response = tokio::time::timeout(self.search_timeout(), async {
            let resp = self.http.get(&url).send().await?;
            if !resp.status().is_success() {
                return Err(DirectoryError::Status(resp.status()));
            }
            let body = resp.text().await?;
            serde_json::from_str::<ChannelResponse>(&body)
                .map_err(|e| DirectoryError::MalformedResponse(e.to_string()))
        })
        .await
        .map_err(|_| DirectoryError::Timeout)??;

        let station = Station {
            id: id.to_string(),
            name: response.data.title,
            stream_url: stream_url(&self.cfg, id),
            image_url: image_url(&self.cfg, id),
            description: response.data.place.title,
        };

        self.cache.put(station.clone()).await;
        Ok(station)
    }
}

/// An empty or whitespace-only query falls back to the default browse term.
fn effective_query<'a>(query: &'a str, default_query: &'a str) -> &'a str {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        default_query
    } else {
        trimmed
    }
}

fn stream_url(cfg: &DirectoryConfig, id: &str) -> String {
    format!("{}/{}/channel.mp3", cfg.stream_base.trim_end_matches('/'), id)
}

fn image_url(cfg: &DirectoryConfig, id: &str) -> String {
    format!(
        "{}/ara/content/channel/{}/image.png",
        cfg.api_base.trim_end_matches('/'),
        id
    )
}

/// Map one raw search hit into a [`Station`].
///
/// Filter, not failure: hits without a source, page, or page url, and hits
/// not typed as a playable channel, return `None`.  The id falls back to the
/// last path segment of the page url when the directory omits `_id`.
fn map_hit(cfg: &DirectoryConfig, hit: SearchHit) -> Option<Station> {
    let source = hit.source?;
    let page = source.page?;
    let url = page.url?;

    if page.kind.as_deref() != Some("channel") {
        return None;
    }

    let id = match hit.id {
        Some(id) if !id.is_empty() => id,
        _ => url.rsplit('/').next()?.to_string(),
    };
    if id.is_empty() {
        return None;
    }

    Some(Station {
        id: id.clone(),
        name: page.title.unwrap_or_else(|| "Unknown".to_string()),
        stream_url: stream_url(cfg, &id),
        image_url: image_url(cfg, &id),
        description: "Radio Garden".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_cfg(api_base: &str) -> DirectoryConfig {
        DirectoryConfig {
            api_base: api_base.to_string(),
            stream_base: format!("{api_base}/ara/content/listen"),
            search_timeout_secs: 2,
            ..DirectoryConfig::default()
        }
    }

    fn hit(id: Option<&str>, url: Option<&str>, title: Option<&str>, kind: Option<&str>) -> SearchHit {
        SearchHit {
            id: id.map(str::to_string),
            source: Some(HitSource {
                page: Some(HitPage {
                    url: url.map(str::to_string),
                    title: title.map(str::to_string),
                    kind: kind.map(str::to_string),
                }),
            }),
        }
    }

    #[test]
    fn empty_query_falls_back_to_default_term() {
        assert_eq!(effective_query("", "RRI"), "RRI");
        assert_eq!(effective_query("   ", "RRI"), "RRI");
        assert_eq!(effective_query("jazz", "RRI"), "jazz");
    }

    #[test]
    fn map_hit_keeps_only_channels() {
        let cfg = test_cfg("https://radio.garden/api");
        assert!(map_hit(&cfg, hit(Some("abc"), Some("/listen/x/abc"), Some("X"), Some("channel"))).is_some());
        assert!(map_hit(&cfg, hit(Some("abc"), Some("/visit/x/abc"), Some("X"), Some("place"))).is_none());
        assert!(map_hit(&cfg, hit(Some("abc"), Some("/listen/x/abc"), Some("X"), None)).is_none());
    }

    #[test]
    fn map_hit_drops_hits_without_resolvable_url() {
        let cfg = test_cfg("https://radio.garden/api");
        assert!(map_hit(&cfg, hit(Some("abc"), None, Some("X"), Some("channel"))).is_none());
        let no_source = SearchHit { id: Some("abc".into()), source: None };
        assert!(map_hit(&cfg, no_source).is_none());
    }

    #[test]
    fn map_hit_falls_back_to_url_segment_for_id() {
        let cfg = test_cfg("https://radio.garden/api");
        let station = map_hit(&cfg, hit(None, Some("/listen/some-city/xyz9"), Some("X"), Some("channel")))
            .expect("channel hit should map");
        assert_eq!(station.id, "xyz9");
        assert!(station.stream_url.contains("xyz9"));
        assert!(station.image_url.ends_with("/xyz9/image.png"));
    }

    #[test]
    fn map_hit_defaults_missing_title() {
        let cfg = test_cfg("https://radio.garden/api");
        let station = map_hit(&cfg, hit(Some("a1"), Some("/listen/x/a1"), None, Some("channel"))).unwrap();
        assert_eq!(station.name, "Unknown");
        assert_eq!(station.description, "Radio Garden");
    }

    #[tokio::test]
    async fn search_sends_default_query_and_caches_results() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "hits": { "hits": [
                { "_id": "st1", "_source": { "page": { "url": "/listen/city/st1", "title": "Station One", "type": "channel" } } },
                { "_id": "pl1", "_source": { "page": { "url": "/visit/city/pl1", "title": "A Place", "type": "place" } } },
                { "_source": { "page": { "url": "/listen/city/st2", "title": "Station Two", "type": "channel" } } }
            ]}
        });
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "RRI"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let cache = StationCache::new();
        let client = DirectoryClient::new(test_cfg(&server.uri()), cache.clone()).unwrap();
        let stations = client.search("").await.unwrap();

        let ids: Vec<&str> = stations.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["st1", "st2"]);
        for station in &stations {
            assert!(!station.id.is_empty());
            assert!(station.stream_url.contains(&station.id));
        }
        assert!(cache.get("st1").await.is_some());
        assert!(cache.get("st2").await.is_some());
        assert!(cache.get("pl1").await.is_none());
    }

    #[tokio::test]
    async fn search_maps_non_success_status_to_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = DirectoryClient::new(test_cfg(&server.uri()), StationCache::new()).unwrap();
        match client.search("jazz").await {
            Err(DirectoryError::Status(status)) => assert_eq!(status.as_u16(), 503),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_maps_bad_payload_to_malformed_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let client = DirectoryClient::new(test_cfg(&server.uri()), StationCache::new()).unwrap();
        assert!(matches!(
            client.search("jazz").await,
            Err(DirectoryError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn search_times_out_instead_of_hanging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let mut cfg = test_cfg(&server.uri());
        cfg.search_timeout_secs = 1;
        let client = DirectoryClient::new(cfg, StationCache::new()).unwrap();
        assert!(matches!(client.search("jazz").await, Err(DirectoryError::Timeout)));
    }

    #[tokio::test]
    async fn lookup_builds_station_and_caches_it() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "data": { "title": "Radio X", "url": "/listen/city/chan1", "place": { "title": "Jakarta" } }
        });
        Mock::given(method("GET"))
            .and(path("/ara/content/channel/chan1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let cache = StationCache::new();
        let client = DirectoryClient::new(test_cfg(&server.uri()), cache.clone()).unwrap();
        let station = client.lookup("chan1").await.unwrap();

        assert_eq!(station.name, "Radio X");
        assert_eq!(station.description, "Jakarta");
        assert!(station.stream_url.ends_with("/chan1/channel.mp3"));
        assert_eq!(cache.get("chan1").await, Some(station));
    }
}
