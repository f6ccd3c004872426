use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::id::ActionId;
use super::track::{PlayableMedia, Track};

/// One user's pending request to play a track.
///
/// Addressed by `action_id`, not track identity, so the same track
/// enqueued twice yields two independently promotable/removable entries.
/// Content is immutable; only queue position changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub action_id: ActionId,
    pub track: Track,
    pub enqueuer_name: String,
    /// Monotonic enqueue sequence number, process-wide.
    pub seq: u64,
}

/// The single globally shared "currently streaming" slot.
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub media: PlayableMedia,
    pub enqueuer_name: String,
    started_at: Instant,
}

impl NowPlaying {
    #[must_use]
    pub fn new(media: PlayableMedia, enqueuer_name: String) -> Self {
        Self {
            media,
            enqueuer_name,
            started_at: Instant::now(),
        }
    }

    /// A refreshed rendition of a track that is already playing: new media,
    /// original start instant, so the play position survives re-resolution.
    #[must_use]
    pub fn resumed(media: PlayableMedia, enqueuer_name: String, started_at: Instant) -> Self {
        Self {
            media,
            enqueuer_name,
            started_at,
        }
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Milliseconds since this track started playing.
    #[must_use]
    pub fn played_millis(&self) -> u64 {
        u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// The broadcastable view: media plus the play-position checkpoint.
    #[must_use]
    pub fn snapshot(&self) -> NowPlayingSnapshot {
        NowPlayingSnapshot {
            media: self.media.clone(),
            enqueuer_name: self.enqueuer_name.clone(),
            played_millis: self.played_millis(),
        }
    }
}

/// Point-in-time view of the now-playing slot, as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlayingSnapshot {
    pub media: PlayableMedia,
    pub enqueuer_name: String,
    pub played_millis: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media() -> PlayableMedia {
        PlayableMedia {
            track: Track {
                api_name: "QQMusic".to_string(),
                id: "001".to_string(),
                name: "song".to_string(),
                artists: vec![],
                cover_url: None,
            },
            url: "https://stream.example.com/001".to_string(),
            length_millis: 240_000,
        }
    }

    #[test]
    fn test_resumed_keeps_play_position() {
        let original = NowPlaying::new(media(), "Alice".to_string());
        std::thread::sleep(std::time::Duration::from_millis(10));
        let refreshed = NowPlaying::resumed(media(), "Alice".to_string(), original.started_at());
        assert!(refreshed.played_millis() >= 10);
    }

    #[test]
    fn test_snapshot_carries_enqueuer() {
        let np = NowPlaying::new(media(), "Bob".to_string());
        let snap = np.snapshot();
        assert_eq!(snap.enqueuer_name, "Bob");
        assert_eq!(snap.media, np.media);
    }
}
