// Music Catalog Capability Trait
//
// One fixed operation set; each adapter implements a subset. Unimplemented
// operations answer with a declared NotImplemented instead of a dispatch
// failure, which keeps adapters substitutable behind `Arc<dyn MusicApi>`.

use async_trait::async_trait;

use super::error::{ProviderError, Result};
use crate::models::{MusicServiceUser, PlayableMedia, Playlist, Track};

/// Fixed page size for playlist track listings.
pub const PLAYLIST_PAGE_SIZE: usize = 10;

/// Capability interface over one external music/video catalog.
///
/// Only `name` is mandatory. Every other method defaults to
/// [`ProviderError::NotImplemented`].
#[async_trait]
pub trait MusicApi: Send + Sync {
    /// Catalog name as shown to clients (e.g. "QQMusic").
    fn name(&self) -> &'static str;

    /// Fetch canonical display metadata for a bare id.
    ///
    /// Missing cover art upstream degrades to a placeholder instead of
    /// failing the whole resolution.
    async fn resolve_by_id(&self, id: &str) -> Result<Track> {
        let _ = id;
        Err(ProviderError::not_implemented(self.name(), "resolve_by_id"))
    }

    /// Resolve a track into a directly streamable url plus duration.
    ///
    /// Contract: try the highest desired quality first; when upstream
    /// reports that tier unavailable, retry once at the default tier before
    /// surfacing failure. Returned urls use the https scheme.
    async fn resolve_playable(&self, track: &Track) -> Result<PlayableMedia> {
        let _ = track;
        Err(ProviderError::not_implemented(self.name(), "resolve_playable"))
    }

    /// Best-effort keyword search. Detail-enrichment failures degrade to
    /// the basic hit, they never drop it.
    async fn search_by_name(&self, keyword: &str, offset: usize) -> Result<Vec<Track>> {
        let _ = (keyword, offset);
        Err(ProviderError::not_implemented(self.name(), "search_by_name"))
    }

    /// Search catalog accounts by name, for the bind flow.
    async fn search_users(&self, keyword: &str) -> Result<Vec<MusicServiceUser>> {
        let _ = keyword;
        Err(ProviderError::not_implemented(self.name(), "search_users"))
    }

    /// All playlists of a catalog account (owned and collected),
    /// deduplicated, with the catalog's "no playlist" sentinel filtered out.
    async fn list_user_playlists(&self, user_identifier: &str) -> Result<Vec<Playlist>> {
        let _ = user_identifier;
        Err(ProviderError::not_implemented(self.name(), "list_user_playlists"))
    }

    /// One page ([`PLAYLIST_PAGE_SIZE`] entries) of a playlist, offset-based,
    /// in the catalog's order.
    async fn list_playlist_tracks(&self, playlist_id: &str, offset: usize) -> Result<Vec<Track>> {
        let _ = (playlist_id, offset);
        Err(ProviderError::not_implemented(self.name(), "list_playlist_tracks"))
    }

    /// Validate a new credential against upstream, then swap it in.
    /// Returns `Ok(false)` and keeps the old credential when validation
    /// fails; a half-applied credential is never observable.
    async fn try_set_credential(&self, credential: &str) -> Result<bool> {
        let _ = credential;
        Err(ProviderError::not_implemented(self.name(), "try_set_credential"))
    }
}

/// Normalize an upstream stream url to the https scheme.
#[must_use]
pub fn ensure_https(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("http://") {
        format!("https://{rest}")
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BareAdapter;

    #[async_trait]
    impl MusicApi for BareAdapter {
        fn name(&self) -> &'static str {
            "bare"
        }
    }

    #[tokio::test]
    async fn test_unimplemented_operations_are_declared() {
        let api = BareAdapter;
        let err = api.search_by_name("anything", 0).await.unwrap_err();
        match err {
            ProviderError::NotImplemented { provider, operation } => {
                assert_eq!(provider, "bare");
                assert_eq!(operation, "search_by_name");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(api.try_set_credential("x").await.is_err());
    }

    #[test]
    fn test_ensure_https() {
        assert_eq!(
            ensure_https("http://stream.example.com/a.mp3"),
            "https://stream.example.com/a.mp3"
        );
        assert_eq!(
            ensure_https("https://stream.example.com/a.mp3"),
            "https://stream.example.com/a.mp3"
        );
    }
}
