//! QQMusic HTTP Client
//!
//! Talks to a self-hosted QQMusic API gateway (the community proxy the
//! server is configured with). Every endpoint wraps its payload in a
//! `{ result, data }` envelope where `result == 100` means success.

use std::sync::LazyLock;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Client;
use serde_json::Value;

use crate::error::{check_response, json_with_limit, ApiClientError};

const OK: i64 = 100;
/// `result` code the gateway returns when the bound cookie is not logged in.
const NOT_LOGGED_IN: i64 = 301;

/// Shared HTTP client for all QQMusic requests (connection pooling).
static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .build()
        .expect("Failed to build QQMusic shared HTTP client")
});

/// Song metadata from the `/song` endpoint.
#[derive(Debug, Clone)]
pub struct SongDetail {
    pub name: String,
    pub artists: Vec<String>,
    pub album_mid: Option<String>,
    pub interval_secs: u64,
}

/// One hit from the `/search` endpoint (basic fields only).
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub song_mid: String,
    pub name: String,
    pub artists: Vec<String>,
}

/// One song row inside a playlist page.
#[derive(Debug, Clone)]
pub struct PlaylistSong {
    pub song_mid: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album_mid: Option<String>,
}

/// A playlist reference (owned or collected).
#[derive(Debug, Clone)]
pub struct PlaylistRef {
    pub id: String,
    pub name: String,
}

/// QQMusic HTTP client.
pub struct QqMusicClient {
    client: Client,
    base_url: String,
    cookie: RwLock<String>,
}

impl QqMusicClient {
    pub fn new(base_url: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            client: SHARED_CLIENT.clone(),
            base_url: base_url.into(),
            cookie: RwLock::new(cookie.into()),
        }
    }

    /// Swap the active cookie. Callers must validate first via
    /// [`Self::check_cookie`]; readers always see the full old or full new
    /// value, never a partial write.
    pub fn set_cookie(&self, cookie: String) {
        *self.cookie.write() = cookie;
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, ApiClientError> {
        let url = format!("{}{}", self.base_url, path);
        let cookie = self.cookie.read().clone();
        let mut req = self.client.get(&url).query(query);
        if !cookie.is_empty() {
            req = req.header("Cookie", cookie);
        }
        let resp = check_response(req.send().await?)?;
        json_with_limit(resp).await
    }

    fn result_code(body: &Value) -> i64 {
        body["result"].as_i64().unwrap_or(-1)
    }

    /// Validate a candidate cookie without touching the active one.
    /// The gateway answers `/recommend/daily` with result 301 when the
    /// cookie is not logged in.
    pub async fn check_cookie(&self, cookie: &str) -> Result<bool, ApiClientError> {
        let url = format!("{}/recommend/daily", self.base_url);
        let req = self.client.get(&url).header("Cookie", cookie.to_string());
        let resp = check_response(req.send().await?)?;
        let body: Value = json_with_limit(resp).await?;
        Ok(Self::result_code(&body) != NOT_LOGGED_IN)
    }

    /// Fetch song metadata by song mid.
    pub async fn song_detail(&self, song_mid: &str) -> Result<SongDetail, ApiClientError> {
        let body = self.get_json("/song", &[("songmid", song_mid)]).await?;
        let code = Self::result_code(&body);
        if code != OK {
            return Err(ApiClientError::api(code, &body));
        }

        let track_info = &body["data"]["track_info"];
        let name = track_info["name"]
            .as_str()
            .ok_or_else(|| ApiClientError::Parse("missing track name".to_string()))?
            .to_string();
        let artists = singer_names(&track_info["singer"]);
        let album_mid = track_info["album"]["mid"].as_str().map(ToString::to_string);
        let interval_secs = track_info["interval"].as_u64().unwrap_or(0);

        Ok(SongDetail {
            name,
            artists,
            album_mid,
            interval_secs,
        })
    }

    /// Fetch a playable stream URL for one bitrate tier.
    ///
    /// Returns `Ok(None)` when the gateway reports the quality unavailable
    /// (non-100 result or empty url) so the caller can retry a lower tier;
    /// the raw envelope goes to the debug log for diagnosis.
    pub async fn song_url(
        &self,
        song_mid: &str,
        media_id: &str,
        bitrate: Option<&str>,
    ) -> Result<Option<String>, ApiClientError> {
        let mut query = vec![("id", song_mid), ("mediaId", media_id)];
        if let Some(rate) = bitrate {
            query.push(("type", rate));
        }
        let body = self.get_json("/song/url", &query).await?;

        let code = Self::result_code(&body);
        let url = body["data"].as_str().unwrap_or("");
        if code != OK || url.is_empty() {
            tracing::debug!(song_mid, ?bitrate, response = %body, "QQMusic stream url unavailable at this tier");
            return Ok(None);
        }
        Ok(Some(url.to_string()))
    }

    /// Search songs by keyword. Basic fields only; callers enrich each hit
    /// with [`Self::song_detail`] when they need cover art.
    pub async fn search(&self, keyword: &str) -> Result<Vec<SearchHit>, ApiClientError> {
        let body = self.get_json("/search", &[("key", keyword)]).await?;
        let code = Self::result_code(&body);
        if code != OK {
            return Err(ApiClientError::api(code, &body));
        }

        let hits = body["data"]["list"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|song| {
                        Some(SearchHit {
                            song_mid: song["songmid"].as_str()?.to_string(),
                            name: song["songname"].as_str().unwrap_or("").to_string(),
                            artists: singer_names(&song["singer"]),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(hits)
    }

    /// Playlists the user created.
    pub async fn user_playlists(&self, uid: &str) -> Result<Vec<PlaylistRef>, ApiClientError> {
        let body = self.get_json("/user/songlist", &[("id", uid)]).await?;
        let code = Self::result_code(&body);
        if code != OK {
            return Err(ApiClientError::api(code, &body));
        }

        Ok(playlist_refs(&body["data"]["list"], "tid", "diss_name"))
    }

    /// Playlists the user collected from others.
    pub async fn collected_playlists(&self, uid: &str) -> Result<Vec<PlaylistRef>, ApiClientError> {
        let body = self.get_json("/user/collect/songlist", &[("id", uid)]).await?;
        let code = Self::result_code(&body);
        if code != OK {
            return Err(ApiClientError::api(code, &body));
        }

        Ok(playlist_refs(&body["data"]["list"], "dissid", "dissname"))
    }

    /// All songs of a playlist; paging is the caller's concern.
    pub async fn playlist_songs(&self, playlist_id: &str) -> Result<Vec<PlaylistSong>, ApiClientError> {
        let body = self.get_json("/songlist", &[("id", playlist_id)]).await?;
        let code = Self::result_code(&body);
        if code != OK {
            return Err(ApiClientError::api(code, &body));
        }

        let songs = body["data"]["songlist"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|song| {
                        Some(PlaylistSong {
                            song_mid: song["songmid"].as_str()?.to_string(),
                            name: song["songorig"]
                                .as_str()
                                .or_else(|| song["songname"].as_str())
                                .unwrap_or("")
                                .to_string(),
                            artists: singer_names(&song["singer"]),
                            album_mid: song["albummid"].as_str().map(ToString::to_string),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(songs)
    }
}

/// Playlist ids come back as numbers from the gateway; stringify them.
fn playlist_refs(list: &Value, id_key: &str, name_key: &str) -> Vec<PlaylistRef> {
    list.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let id = match &item[id_key] {
                        Value::Number(n) => n.to_string(),
                        Value::String(s) => s.clone(),
                        _ => return None,
                    };
                    Some(PlaylistRef {
                        id,
                        name: item[name_key].as_str().unwrap_or("").to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn singer_names(singers: &Value) -> Vec<String> {
    singers
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|s| s["name"].as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}
