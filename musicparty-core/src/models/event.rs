use serde::{Deserialize, Serialize};

use super::id::{ActionId, ConnectionId};
use super::queue::NowPlayingSnapshot;
use super::track::Track;

/// Events fanned out to every connected client, in commit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartyEvent {
    /// The now-playing slot changed. `playing` is `None` when the queue
    /// ran dry and playback stopped.
    NowPlayingChanged { playing: Option<NowPlayingSnapshot> },

    /// A track was appended to the queue.
    MusicEnqueued {
        action_id: ActionId,
        track: Track,
        enqueuer_name: String,
    },

    /// The queue head was popped into resolution.
    SongAdvanced,

    /// An entry was promoted to the head of the pending queue.
    SongTopped {
        action_id: ActionId,
        operator_name: String,
    },

    /// An entry was removed from the pending queue.
    SongRemoved {
        action_id: ActionId,
        operator_name: String,
    },

    /// Someone asked for the next song.
    NextSongRequested { operator_name: String },

    UserJoined { id: ConnectionId, name: String },

    UserLeft { id: ConnectionId },

    UserRenamed {
        id: ConnectionId,
        new_name: String,
    },

    ChatMessage { name: String, content: String },

    /// Informational notice (e.g. an unresolvable track was skipped).
    GlobalInfo { message: String },

    /// Unclassified server-side failure, surfaced without detail.
    ServerError { message: String },
}

impl PartyEvent {
    /// Get a short description of the event type
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::NowPlayingChanged { .. } => "now_playing_changed",
            Self::MusicEnqueued { .. } => "music_enqueued",
            Self::SongAdvanced => "song_advanced",
            Self::SongTopped { .. } => "song_topped",
            Self::SongRemoved { .. } => "song_removed",
            Self::NextSongRequested { .. } => "next_song_requested",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::UserRenamed { .. } => "user_renamed",
            Self::ChatMessage { .. } => "chat_message",
            Self::GlobalInfo { .. } => "global_info",
            Self::ServerError { .. } => "server_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PartyEvent::ChatMessage {
            name: "Alice".to_string(),
            content: "hello!".to_string(),
        };

        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("chat_message"));
        assert!(json.contains("hello!"));

        let deserialized: PartyEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(deserialized.event_type(), "chat_message");
    }

    #[test]
    fn test_empty_now_playing_serialization() {
        let event = PartyEvent::NowPlayingChanged { playing: None };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("now_playing_changed"));
        assert!(json.contains("null"));

        let deserialized: PartyEvent = serde_json::from_str(&json).expect("deserialize");
        match deserialized {
            PartyEvent::NowPlayingChanged { playing } => assert!(playing.is_none()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_enqueue_event_carries_action_id() {
        let event = PartyEvent::MusicEnqueued {
            action_id: ActionId::from_string("act123456789".to_string()),
            track: Track {
                api_name: "Netease".to_string(),
                id: "42".to_string(),
                name: "song".to_string(),
                artists: vec!["band".to_string()],
                cover_url: None,
            },
            enqueuer_name: "Bob".to_string(),
        };

        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("music_enqueued"));
        assert!(json.contains("act123456789"));
        assert_eq!(event.event_type(), "music_enqueued");
    }
}
