pub mod event;
pub mod id;
pub mod queue;
pub mod track;

pub use event::PartyEvent;
pub use id::{generate_id, ActionId, ConnectionId};
pub use queue::{NowPlaying, NowPlayingSnapshot, QueueEntry};
pub use track::{MusicServiceUser, PlayableMedia, Playlist, Track};
