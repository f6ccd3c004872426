// Netease Cloud Music adapter
//
// Ids are plain catalog numerics, no composite. Search hits already carry
// full detail, so no enrichment pass is needed.

use async_trait::async_trait;
use musicparty_providers::NeteaseClient;

use super::error::{ProviderError, Result};
use super::traits::{ensure_https, MusicApi, PLAYLIST_PAGE_SIZE};
use crate::models::{MusicServiceUser, PlayableMedia, Playlist, Track};

const NAME: &str = "NeteaseCloudMusic";

/// 320kbps, the highest tier worth asking for without a VIP account.
const TOP_BITRATE: u32 = 320_000;

pub struct NeteaseApi {
    client: NeteaseClient,
}

impl NeteaseApi {
    #[must_use]
    pub fn new(client: NeteaseClient) -> Self {
        Self { client }
    }

    fn track_from(song: musicparty_providers::netease::NeteaseSong) -> Track {
        Track {
            api_name: NAME.to_string(),
            id: song.id,
            name: song.name,
            artists: song.artists,
            cover_url: song.cover_url,
        }
    }
}

#[async_trait]
impl MusicApi for NeteaseApi {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn resolve_by_id(&self, id: &str) -> Result<Track> {
        let song = self
            .client
            .song_detail(id)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;
        Ok(Self::track_from(song))
    }

    async fn resolve_playable(&self, track: &Track) -> Result<PlayableMedia> {
        let song = self
            .client
            .song_detail(&track.id)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;

        let url = match self
            .client
            .song_url(&track.id, Some(TOP_BITRATE))
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?
        {
            Some(url) => url,
            None => self
                .client
                .song_url(&track.id, None)
                .await
                .map_err(|e| ProviderError::from_client(NAME, e))?
                .ok_or_else(|| {
                    ProviderError::upstream(
                        NAME,
                        format!("no stream available for \"{}\" ({})", track.name, track.id),
                    )
                })?,
        };

        Ok(PlayableMedia {
            track: track.clone(),
            url: ensure_https(&url),
            length_millis: song.duration_millis,
        })
    }

    async fn search_by_name(&self, keyword: &str, offset: usize) -> Result<Vec<Track>> {
        let songs = self
            .client
            .search_songs(keyword, offset)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;
        Ok(songs.into_iter().map(Self::track_from).collect())
    }

    async fn search_users(&self, keyword: &str) -> Result<Vec<MusicServiceUser>> {
        let users = self
            .client
            .search_users(keyword)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;
        Ok(users
            .into_iter()
            .map(|u| MusicServiceUser {
                identifier: u.user_id,
                name: u.nickname,
            })
            .collect())
    }

    async fn list_user_playlists(&self, user_identifier: &str) -> Result<Vec<Playlist>> {
        let playlists = self
            .client
            .user_playlists(user_identifier)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;

        // Created and collected playlists arrive in one list; dedup on id
        // and drop the "0" sentinel the API uses for accounts without any.
        let mut seen = std::collections::HashSet::new();
        Ok(playlists
            .into_iter()
            .filter(|pl| pl.id != "0")
            .filter(|pl| seen.insert(pl.id.clone()))
            .map(|pl| Playlist {
                id: pl.id,
                name: pl.name,
            })
            .collect())
    }

    async fn list_playlist_tracks(&self, playlist_id: &str, offset: usize) -> Result<Vec<Track>> {
        let songs = self
            .client
            .playlist_tracks(playlist_id, offset, PLAYLIST_PAGE_SIZE)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;
        Ok(songs.into_iter().map(Self::track_from).collect())
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
