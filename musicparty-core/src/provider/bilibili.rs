// Bilibili adapter (video catalog)
//
// Composite id convention: "bvid,cid". A bare bvid is accepted and the cid
// is filled in from the view API during resolution. Search and playlist
// listing are declared capability gaps: enqueueing happens by id.

use async_trait::async_trait;
use musicparty_providers::BilibiliClient;

use super::error::{ProviderError, Result};
use super::traits::{ensure_https, MusicApi};
use crate::models::{PlayableMedia, Track};

const NAME: &str = "Bilibili";

/// qn codes: 1080p first, then the 480p tier every video has.
const TOP_QUALITY: u32 = 80;
const FALLBACK_QUALITY: u32 = 32;

pub struct BilibiliApi {
    client: BilibiliClient,
}

impl BilibiliApi {
    #[must_use]
    pub fn new(client: BilibiliClient) -> Self {
        Self { client }
    }

    /// Split a composite id into (bvid, cid). cid 0 means "not known yet".
    fn split_id(id: &str) -> (&str, u64) {
        match id.split_once(',') {
            Some((bvid, cid)) => (bvid, cid.parse().unwrap_or(0)),
            None => (id, 0),
        }
    }
}

#[async_trait]
impl MusicApi for BilibiliApi {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn resolve_by_id(&self, id: &str) -> Result<Track> {
        let (bvid, _) = Self::split_id(id);
        let info = self
            .client
            .video_info(bvid)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?;

        Ok(Track {
            api_name: NAME.to_string(),
            // Canonical composite form, so playback needs no second lookup.
            id: format!("{},{}", info.bvid, info.cid),
            name: info.title,
            artists: vec![info.owner_name],
            cover_url: Some(ensure_https(&info.cover_url)),
        })
    }

    async fn resolve_playable(&self, track: &Track) -> Result<PlayableMedia> {
        let (bvid, mut cid) = Self::split_id(&track.id);
        let mut duration_secs = 0;

        if cid == 0 {
            let info = self
                .client
                .video_info(bvid)
                .await
                .map_err(|e| ProviderError::from_client(NAME, e))?;
            cid = info.cid;
            duration_secs = info.duration_secs;
        }

        let url = match self
            .client
            .play_url(bvid, cid, TOP_QUALITY)
            .await
            .map_err(|e| ProviderError::from_client(NAME, e))?
        {
            Some(url) => url,
            None => self
                .client
                .play_url(bvid, cid, FALLBACK_QUALITY)
                .await
                .map_err(|e| ProviderError::from_client(NAME, e))?
                .ok_or_else(|| {
                    ProviderError::upstream(
                        NAME,
                        format!("no stream available for \"{}\" ({bvid})", track.name),
                    )
                })?,
        };

        if duration_secs == 0 {
            // Composite id skipped the view call; fetch it for the duration.
            duration_secs = self
                .client
                .video_info(bvid)
                .await
                .map_err(|e| ProviderError::from_client(NAME, e))?
                .duration_secs;
        }

        Ok(PlayableMedia {
            track: track.clone(),
            url: ensure_https(&url),
            length_millis: duration_secs * 1000,
        })
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

    #[test]
    fn test_split_composite_id() {
        assert_eq!(BilibiliApi::split_id("BV1xx411c7mD,1176840"), ("BV1xx411c7mD", 1_176_840));
        assert_eq!(BilibiliApi::split_id("BV1xx411c7mD"), ("BV1xx411c7mD", 0));
        assert_eq!(BilibiliApi::split_id("BV1xx411c7mD,junk"), ("BV1xx411c7mD", 0));
    }

    #[tokio::test]
    async fn test_search_and_playlists_are_declared_gaps() {
        let api = BilibiliApi::new(BilibiliClient::new(""));

        let err = api.search_by_name("anything", 0).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotImplemented { .. }));

        let err = api.list_user_playlists("42").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotImplemented { .. }));
    }
}
