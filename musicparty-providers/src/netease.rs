//! Netease Cloud Music HTTP Client
//!
//! Talks to a self-hosted NeteaseCloudMusicApi gateway. Responses use a
//! `code` field where 200 means success; stream urls may be null for
//! region-locked or quality-unavailable tracks.

use std::sync::LazyLock;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Client;
use serde_json::Value;

use crate::error::{check_response, json_with_limit, ApiClientError};

const OK: i64 = 200;

/// Shared HTTP client for all Netease requests (connection pooling).
static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .build()
        .expect("Failed to build Netease shared HTTP client")
});

/// Full song metadata; `/song/detail` and `/cloudsearch` both produce it.
#[derive(Debug, Clone)]
pub struct NeteaseSong {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub cover_url: Option<String>,
    pub duration_millis: u64,
}

/// A playlist reference from `/user/playlist`.
#[derive(Debug, Clone)]
pub struct PlaylistRef {
    pub id: String,
    pub name: String,
}

/// A catalog account hit from user search.
#[derive(Debug, Clone)]
pub struct UserHit {
    pub user_id: String,
    pub nickname: String,
}

/// Netease Cloud Music HTTP client.
pub struct NeteaseClient {
    client: Client,
    base_url: String,
    cookie: RwLock<String>,
}

impl NeteaseClient {
    pub fn new(base_url: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            client: SHARED_CLIENT.clone(),
            base_url: base_url.into(),
            cookie: RwLock::new(cookie.into()),
        }
    }

    /// Swap the active cookie after the caller validated it via
    /// [`Self::check_cookie`].
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

    fn code(body: &Value) -> i64 {
        body["code"].as_i64().unwrap_or(-1)
    }

    /// Validate a candidate cookie: `/login/status` reports a null profile
    /// for anonymous sessions.
    pub async fn check_cookie(&self, cookie: &str) -> Result<bool, ApiClientError> {
        let url = format!("{}/login/status", self.base_url);
        let req = self.client.get(&url).header("Cookie", cookie.to_string());
        let resp = check_response(req.send().await?)?;
        let body: Value = json_with_limit(resp).await?;
        Ok(!body["data"]["profile"].is_null())
    }

    /// Fetch song metadata by id.
    pub async fn song_detail(&self, id: &str) -> Result<NeteaseSong, ApiClientError> {
        let body = self.get_json("/song/detail", &[("ids", id)]).await?;
        let code = Self::code(&body);
        if code != OK {
            return Err(ApiClientError::api(code, &body));
        }

        let song = body["songs"]
            .as_array()
            .and_then(|songs| songs.first())
            .ok_or_else(|| ApiClientError::Parse(format!("song {id} not in catalog")))?;
        Ok(parse_song(song))
    }

    /// Fetch a stream URL at the given bitrate (bits per second).
    ///
    /// Returns `Ok(None)` when the catalog has no stream at that tier (the
    /// url comes back null/empty) so the caller can retry lower.
    pub async fn song_url(
        &self,
        id: &str,
        bitrate: Option<u32>,
    ) -> Result<Option<String>, ApiClientError> {
        let rate;
        let mut query = vec![("id", id)];
        if let Some(br) = bitrate {
            rate = br.to_string();
            query.push(("br", &rate));
        }
        let body = self.get_json("/song/url", &query).await?;

        let code = Self::code(&body);
        if code != OK {
            return Err(ApiClientError::api(code, &body));
        }
        let url = body["data"]
            .as_array()
            .and_then(|data| data.first())
            .and_then(|entry| entry["url"].as_str())
            .unwrap_or("");
        if url.is_empty() {
            tracing::debug!(id, ?bitrate, "Netease stream url unavailable at this tier");
            return Ok(None);
        }
        Ok(Some(url.to_string()))
    }

    /// Search songs by keyword. `/cloudsearch` hits carry full detail, so
    /// no enrichment pass is needed.
    pub async fn search_songs(
        &self,
        keyword: &str,
        offset: usize,
    ) -> Result<Vec<NeteaseSong>, ApiClientError> {
        let offset = offset.to_string();
        let body = self
            .get_json(
                "/cloudsearch",
                &[("keywords", keyword), ("offset", &offset)],
            )
            .await?;
        let code = Self::code(&body);
        if code != OK {
            return Err(ApiClientError::api(code, &body));
        }

        let songs = body["result"]["songs"]
            .as_array()
            .map(|songs| songs.iter().map(parse_song).collect())
            .unwrap_or_default();
        Ok(songs)
    }

    /// Search catalog accounts by nickname (type 1002 = users).
    pub async fn search_users(&self, keyword: &str) -> Result<Vec<UserHit>, ApiClientError> {
        let body = self
            .get_json("/search", &[("keywords", keyword), ("type", "1002")])
            .await?;
        let code = Self::code(&body);
        if code != OK {
            return Err(ApiClientError::api(code, &body));
        }

        let users = body["result"]["userprofiles"]
            .as_array()
            .map(|profiles| {
                profiles
                    .iter()
                    .filter_map(|p| {
                        Some(UserHit {
                            user_id: p["userId"].as_i64()?.to_string(),
                            nickname: p["nickname"].as_str().unwrap_or("").to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(users)
    }

    /// Every playlist on the account page: created and collected ones come
    /// back in a single list.
    pub async fn user_playlists(&self, uid: &str) -> Result<Vec<PlaylistRef>, ApiClientError> {
        let body = self.get_json("/user/playlist", &[("uid", uid)]).await?;
        let code = Self::code(&body);
        if code != OK {
            return Err(ApiClientError::api(code, &body));
        }

        let playlists = body["playlist"]
            .as_array()
            .map(|lists| {
                lists
                    .iter()
                    .filter_map(|pl| {
                        Some(PlaylistRef {
                            id: pl["id"].as_i64()?.to_string(),
                            name: pl["name"].as_str().unwrap_or("").to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(playlists)
    }

    /// One page of a playlist, upstream-ordered.
    pub async fn playlist_tracks(
        &self,
        playlist_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<NeteaseSong>, ApiClientError> {
        let offset = offset.to_string();
        let limit = limit.to_string();
        let body = self
            .get_json(
                "/playlist/track/all",
                &[("id", playlist_id), ("offset", &offset), ("limit", &limit)],
            )
            .await?;
        let code = Self::code(&body);
        if code != OK {
            return Err(ApiClientError::api(code, &body));
        }

        let songs = body["songs"]
            .as_array()
            .map(|songs| songs.iter().map(parse_song).collect())
            .unwrap_or_default();
        Ok(songs)
    }
}

fn parse_song(song: &Value) -> NeteaseSong {
    let artists = song["ar"]
        .as_array()
        .map(|ar| {
            ar.iter()
                .filter_map(|a| a["name"].as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default();
    NeteaseSong {
        id: song["id"].as_i64().unwrap_or(0).to_string(),
        name: song["name"].as_str().unwrap_or("").to_string(),
        artists,
        cover_url: song["al"]["picUrl"].as_str().map(ToString::to_string),
        duration_millis: song["dt"].as_u64().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_song_full() {
        let song = json!({
            "id": 33894312,
            "name": "海阔天空",
            "ar": [{"name": "Beyond"}],
            "al": {"picUrl": "http://p1.music.126.net/cover.jpg"},
            "dt": 326000
        });
        let parsed = parse_song(&song);
        assert_eq!(parsed.id, "33894312");
        assert_eq!(parsed.name, "海阔天空");
        assert_eq!(parsed.artists, vec!["Beyond".to_string()]);
        assert_eq!(parsed.duration_millis, 326000);
        assert!(parsed.cover_url.is_some());
    }

    #[test]
    fn test_parse_song_missing_album() {
        let song = json!({"id": 1, "name": "x", "ar": [], "dt": 0});
        let parsed = parse_song(&song);
        assert!(parsed.cover_url.is_none());
        assert!(parsed.artists.is_empty());
    }
}
