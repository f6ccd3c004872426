// QQMusic adapter
//
// Composite id convention: "songmid,mediaid". A bare id is shorthand for
// both halves being equal, which is what the web player produces.

use async_trait::async_trait;
use futures::future::join_all;
use musicparty_providers::QqMusicClient;

use super::error::{ProviderError, Result};
use super::traits::{ensure_https, MusicApi, PLAYLIST_PAGE_SIZE};
use crate::models::{PlayableMedia, Playlist, Track};

const NAME: &str = "QQMusic";

/// Album-art endpoint keyed by album mid.
const COVER_URL_PREFIX: &str = "https://y.qq.com/music/photo_new/T002R300x300M000";

/// Cover shown when the catalog entry has no album art.
const PLACEHOLDER_COVER_URL: &str = "https://y.qq.com/mediastyle/global/img/album_300.png";

pub struct QqMusicApi {
    client: QqMusicClient,
}

impl QqMusicApi {
    #[must_use]
    pub fn new(client: QqMusicClient) -> Self {
        Self { client }
    }

    fn cover_for(album_mid: Option<&str>) -> String {
        album_mid.map_or_else(
            || PLACEHOLDER_COVER_URL.to_string(),
            |mid| format!("{COVER_URL_PREFIX}{mid}.jpg"),
        )
    }

    /// Split a composite id into (songmid, mediaid).
    fn split_id(id: &str) -> (&str, &str) {
        match id.split_once(',') {
            Some((song_mid, media_id)) => (song_mid, media_id),
            None => (id, id),
        }
    }
}

#[async_trait]
impl MusicApi for QqMusicApi {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn resolve_by_id(&self, id: &str) -> Result<Track> {
        let (song_mid, _) = Self::split_id(id);
        let detail = self
            .client
            .song_detail(song_mid)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;

        Ok(Track {
            api_name: NAME.to_string(),
            id: id.to_string(),
            name: detail.name,
            artists: detail.artists,
            cover_url: Some(Self::cover_for(detail.album_mid.as_deref())),
        })
    }

    async fn resolve_playable(&self, track: &Track) -> Result<PlayableMedia> {
        let (song_mid, media_id) = Self::split_id(&track.id);

        let detail = self
            .client
            .song_detail(song_mid)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;
        let length_millis = detail.interval_secs * 1000;

        // 320kbps first; "unavailable at that quality" is a capability
        // response, so retry once at the gateway default (128kbps).
        let url = match self
            .client
            .song_url(song_mid, media_id, Some("320"))
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?
        {
            Some(url) => url,
            None => self
                .client
                .song_url(song_mid, media_id, None)
                .await
                .map_err(|e| ProviderError::from_client(NAME, e))?
                .ok_or_else(|| {
                    ProviderError::upstream(
                        NAME,
                        format!("no stream available for \"{}\" ({song_mid})", track.name),
                    )
                })?,
        };

        Ok(PlayableMedia {
            track: track.clone(),
            url: ensure_https(&url),
            length_millis,
        })
    }

    async fn search_by_name(&self, keyword: &str, offset: usize) -> Result<Vec<Track>> {
        let hits = self
            .client
            .search(keyword)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;

        // Enrich every hit with cover art concurrently; a failed detail
        // call degrades that hit to its basic search fields.
        let enriched = join_all(hits.into_iter().skip(offset).map(|hit| async move {
            match self.resolve_by_id(&hit.song_mid).await {
                Ok(track) => track,
                Err(err) => {
                    tracing::debug!(song_mid = %hit.song_mid, error = %err, "search enrichment failed, keeping basic hit");
                    Track {
                        api_name: NAME.to_string(),
                        id: hit.song_mid,
                        name: hit.name,
                        artists: hit.artists,
                        cover_url: None,
                    }
                }
            }
        }))
        .await;

        Ok(enriched)
    }

    async fn list_user_playlists(&self, user_identifier: &str) -> Result<Vec<Playlist>> {
        let owned = self
            .client
            .user_playlists(user_identifier)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;
        let collected = self
            .client
            .collected_playlists(user_identifier)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;

        // The catalog pads the owned list with a "0" sentinel entry; drop
        // it, then dedup across the two classes.
        let mut seen = std::collections::HashSet::new();
        let playlists = owned
            .into_iter()
            .chain(collected)
            .filter(|pl| pl.id != "0")
            .filter(|pl| seen.insert(pl.id.clone()))
            .map(|pl| Playlist {
                id: pl.id,
                name: pl.name,
            })
            .collect();
        Ok(playlists)
    }

    async fn list_playlist_tracks(&self, playlist_id: &str, offset: usize) -> Result<Vec<Track>> {
        let songs = self
            .client
            .playlist_songs(playlist_id)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;

        let page = songs
            .into_iter()
            .skip(offset)
            .take(PLAYLIST_PAGE_SIZE)
            .map(|song| Track {
                api_name: NAME.to_string(),
                id: song.song_mid,
                name: song.name,
                artists: song.artists,
                cover_url: Some(Self::cover_for(song.album_mid.as_deref())),
            })
            .collect();
        Ok(page)
    }

    async fn try_set_credential(&self, credential: &str) -> Result<bool> {
        let valid = self
            .client
            .check_cookie(credential)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;
        if valid {
            self.client.set_cookie(credential.to_string());
        }
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Track;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_split_composite_id() {
        assert_eq!(QqMusicApi::split_id("abc,def"), ("abc", "def"));
        assert_eq!(QqMusicApi::split_id("abc"), ("abc", "abc"));
    }

    #[test]
    fn test_cover_placeholder_when_album_missing() {
        assert_eq!(QqMusicApi::cover_for(None), PLACEHOLDER_COVER_URL);
        assert_eq!(
            QqMusicApi::cover_for(Some("003rytri2FHG3V")),
            format!("{COVER_URL_PREFIX}003rytri2FHG3V.jpg")
        );
    }

    fn track(id: &str) -> Track {
        Track {
            api_name: "QQMusic".to_string(),
            id: id.to_string(),
            name: "song".to_string(),
            artists: vec![],
            cover_url: None,
        }
    }

    async fn mount_song_detail(server: &MockServer, song_mid: &str) {
        Mock::given(method("GET"))
            .and(path("/song"))
            .and(query_param("songmid", song_mid))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": 100,
                "data": { "track_info": {
                    "name": "晴天",
                    "interval": 269,
                    "singer": [{ "name": "周杰伦" }],
                    "album": { "mid": "000MkMni19ClKG" }
                }}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_resolve_playable_falls_back_to_default_tier() {
        let server = MockServer::start().await;
        mount_song_detail(&server, "mid1").await;
        // 320 tier unavailable: the gateway answers 100 with empty data.
        Mock::given(method("GET"))
            .and(path("/song/url"))
            .and(query_param("type", "320"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "result": 100, "data": "" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/song/url"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": 100,
                "data": "http://stream.qq.example.com/mid1-128.mp3"
            })))
            .mount(&server)
            .await;

        let api = QqMusicApi::new(QqMusicClient::new(server.uri(), ""));
        let media = api.resolve_playable(&track("mid1")).await.expect("fallback tier");
        assert_eq!(media.url, "https://stream.qq.example.com/mid1-128.mp3");
        assert_eq!(media.length_millis, 269_000);
    }

    #[tokio::test]
    async fn test_resolve_playable_fails_when_both_tiers_dry() {
        let server = MockServer::start().await;
        mount_song_detail(&server, "mid1").await;
        Mock::given(method("GET"))
            .and(path("/song/url"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "result": 100, "data": "" })),
            )
            .mount(&server)
            .await;

        let api = QqMusicApi::new(QqMusicClient::new(server.uri(), ""));
        let err = api.resolve_playable(&track("mid1")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_resolve_by_id_substitutes_placeholder_cover() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/song"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": 100,
                "data": { "track_info": {
                    "name": "no album",
                    "interval": 100,
                    "singer": [{ "name": "someone" }]
                }}
            })))
            .mount(&server)
            .await;

        let api = QqMusicApi::new(QqMusicClient::new(server.uri(), ""));
        let resolved = api.resolve_by_id("mid2").await.expect("resolve");
        assert_eq!(resolved.cover_url.as_deref(), Some(PLACEHOLDER_COVER_URL));
        assert_eq!(resolved.artists, vec!["someone".to_string()]);
    }

    #[tokio::test]
    async fn test_search_keeps_basic_hit_when_enrichment_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": 100,
                "data": { "list": [{
                    "songmid": "gone1",
                    "songname": "ghost song",
                    "singer": [{ "name": "nobody" }]
                }]}
            })))
            .mount(&server)
            .await;
        // The detail call for the hit fails.
        Mock::given(method("GET"))
            .and(path("/song"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "result": 500, "message": "gone" })),
            )
            .mount(&server)
            .await;

        let api = QqMusicApi::new(QqMusicClient::new(server.uri(), ""));
        let hits = api.search_by_name("ghost", 0).await.expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "ghost song");
        assert!(hits[0].cover_url.is_none());
    }

    #[tokio::test]
    async fn test_rejected_credential_keeps_old_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recommend/daily"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": 301 })))
            .mount(&server)
            .await;

        let api = QqMusicApi::new(QqMusicClient::new(server.uri(), "old=cookie"));
        let accepted = api.try_set_credential("new=cookie").await.expect("check ran");
        assert!(!accepted);
    }

    #[tokio::test]
    async fn test_playlist_aggregation_filters_sentinel_and_dedups() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/songlist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": 100,
                "data": { "list": [
                    { "tid": 0, "diss_name": "sentinel" },
                    { "tid": 101, "diss_name": "owned" }
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user/collect/songlist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": 100,
                "data": { "list": [
                    { "dissid": 101, "dissname": "owned again" },
                    { "dissid": 202, "dissname": "collected" }
                ]}
            })))
            .mount(&server)
            .await;

        let api = QqMusicApi::new(QqMusicClient::new(server.uri(), ""));
        let playlists = api.list_user_playlists("777").await.expect("playlists");
        let ids: Vec<_> = playlists.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["101", "202"]);
    }
}
