//! The party session hub.
//!
//! Single serialization point between client requests and the queue /
//! now-playing state, and the sole broadcaster of state-change events.
//!
//! Locking discipline:
//! - `commit` is held across every mutate+broadcast pair, so events leave
//!   in exactly the order mutations commit.
//! - `advance` serializes advance/resolve cycles; catalog resolution runs
//!   outside `commit` so a slow upstream never blocks unrelated queue
//!   operations, and re-enters it only for the final state commit.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::queue::QueueStore;
use crate::error::{Error, Result};
use crate::models::{
    ActionId, ConnectionId, NowPlaying, NowPlayingSnapshot, PartyEvent, PlayableMedia, QueueEntry,
    Track,
};
use crate::provider::{ApiRegistry, ProviderError};

/// Chat messages longer than this are rejected.
pub const MAX_CHAT_LEN: usize = 30;
/// Display names longer than this are rejected.
pub const MAX_NAME_LEN: usize = 32;

/// A connected client as seen by snapshot reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub id: ConnectionId,
    pub name: String,
}

struct Member {
    name: String,
    sender: mpsc::UnboundedSender<PartyEvent>,
}

/// The real-time coordination layer tying users, queue and now-playing
/// together for one party.
pub struct PartyHub {
    apis: Arc<ApiRegistry>,
    queue: QueueStore,
    members: DashMap<ConnectionId, Member>,
    /// Commit-order guard; see module docs.
    commit: parking_lot::Mutex<()>,
    /// At most one advance/resolve cycle in flight.
    advance: tokio::sync::Mutex<()>,
    resolve_timeout: Duration,
}

impl PartyHub {
    #[must_use]
    pub fn new(apis: Arc<ApiRegistry>, resolve_timeout: Duration) -> Self {
        Self {
            apis,
            queue: QueueStore::new(),
            members: DashMap::new(),
            commit: parking_lot::Mutex::new(()),
            advance: tokio::sync::Mutex::new(()),
            resolve_timeout,
        }
    }

    // ---- connection lifecycle ----

    /// Register a new connection and announce it. The returned receiver
    /// yields every broadcast from this moment on, in commit order; the
    /// newcomer is additionally sent the current now-playing state.
    pub fn connect(&self, name: impl Into<String>) -> (ConnectionId, mpsc::UnboundedReceiver<PartyEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        let name = name.into();

        let _guard = self.commit.lock();
        self.members.insert(
            id.clone(),
            Member {
                name: name.clone(),
                sender: tx,
            },
        );
        self.broadcast(&PartyEvent::UserJoined {
            id: id.clone(),
            name: name.clone(),
        });
        self.send_to(
            &id,
            PartyEvent::NowPlayingChanged {
                playing: self.queue.now_playing_snapshot(),
            },
        );
        info!(connection_id = %id, name, "user joined the party");
        (id, rx)
    }

    /// Discard a connection and announce the departure. Idempotent: the
    /// transport may detect the same disconnect more than once.
    pub fn disconnect(&self, id: &ConnectionId) {
        let _guard = self.commit.lock();
        if self.members.remove(id).is_some() {
            self.broadcast(&PartyEvent::UserLeft { id: id.clone() });
            info!(connection_id = %id, "user left the party");
        }
    }

    pub fn rename(&self, id: &ConnectionId, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(Error::Validation("name cannot be empty".to_string()));
        }
        if new_name.chars().count() > MAX_NAME_LEN {
            return Err(Error::Validation(format!(
                "name must be at most {MAX_NAME_LEN} characters"
            )));
        }

        let _guard = self.commit.lock();
        {
            let mut member = self
                .members
                .get_mut(id)
                .ok_or_else(|| Error::NotFound(format!("connection {id}")))?;
            member.name = new_name.to_string();
        }
        self.broadcast(&PartyEvent::UserRenamed {
            id: id.clone(),
            new_name: new_name.to_string(),
        });
        Ok(())
    }

    // ---- queue mutations ----

    /// Resolve the id against the named catalog and append it to the queue.
    /// Resolution failures propagate to the caller only; nothing is
    /// broadcast for a rejected enqueue.
    pub async fn enqueue_music(
        &self,
        id: &ConnectionId,
        music_id: &str,
        api_name: &str,
    ) -> Result<QueueEntry> {
        let enqueuer = self.member_name(id)?;
        let api = self
            .apis
            .get(api_name)
            .ok_or_else(|| Error::Validation(format!("unknown music api: {api_name}")))?;

        let track = self
            .with_timeout(api.name(), api.resolve_by_id(music_id))
            .await?;

        // The enqueue commits even if the requester dropped mid-resolve;
        // the entry is attributed to the name captured at call time.
        let _guard = self.commit.lock();
        let entry = self.queue.enqueue(track, &enqueuer);
        self.broadcast(&PartyEvent::MusicEnqueued {
            action_id: entry.action_id.clone(),
            track: entry.track.clone(),
            enqueuer_name: entry.enqueuer_name.clone(),
        });
        Ok(entry)
    }

    /// Promote an entry to the head of the pending queue. A missing id lost
    /// a race with a concurrent remove/advance: swallowed, no broadcast.
    pub fn top_song(&self, id: &ConnectionId, action_id: &ActionId) -> Result<()> {
        let operator = self.member_name(id)?;
        let _guard = self.commit.lock();
        match self.queue.promote(action_id) {
            Ok(_) => {
                self.broadcast(&PartyEvent::SongTopped {
                    action_id: action_id.clone(),
                    operator_name: operator,
                });
                Ok(())
            }
            Err(Error::NotFound(_)) => {
                debug!(%action_id, "top_song lost a race, entry already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Remove an entry from the pending queue. Same race semantics as
    /// [`Self::top_song`].
    pub fn remove_song(&self, id: &ConnectionId, action_id: &ActionId) -> Result<()> {
        let operator = self.member_name(id)?;
        let _guard = self.commit.lock();
        match self.queue.remove(action_id) {
            Ok(_) => {
                self.broadcast(&PartyEvent::SongRemoved {
                    action_id: action_id.clone(),
                    operator_name: operator,
                });
                Ok(())
            }
            Err(Error::NotFound(_)) => {
                debug!(%action_id, "remove_song lost a race, entry already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // ---- playback ----

    /// Advance to the next resolvable queue entry. Unresolvable entries are
    /// skipped with an informational broadcast each; once the queue is
    /// exhausted the empty now-playing state is committed and broadcast
    /// exactly once.
    pub async fn next_song(&self, id: &ConnectionId) -> Result<()> {
        let operator = self.member_name(id)?;
        {
            let _guard = self.commit.lock();
            self.broadcast(&PartyEvent::NextSongRequested {
                operator_name: operator,
            });
        }
        self.play_next().await
    }

    /// Re-resolve the current now-playing track (upstream urls expire) and
    /// rebroadcast it with its original play position. No-op when nothing
    /// is playing; failures go to the requester, not the room.
    pub async fn request_set_now_playing(&self, id: &ConnectionId) -> Result<()> {
        self.member_name(id)?;
        let _advance = self.advance.lock().await;

        let Some(current) = self.queue.now_playing() else {
            return Ok(());
        };
        let media = self.resolve_playable(&current.media.track).await?;

        let _guard = self.commit.lock();
        // The slot cannot have advanced (we hold the advance lock), but
        // assert the identity anyway before overwriting it.
        match self.queue.now_playing() {
            Some(np) if np.media.track.same_identity(&media.track) => {
                let playing =
                    NowPlaying::resumed(media, np.enqueuer_name.clone(), np.started_at());
                let snapshot = playing.snapshot();
                self.queue.set_now_playing(playing);
                self.broadcast(&PartyEvent::NowPlayingChanged {
                    playing: Some(snapshot),
                });
            }
            _ => debug!("now-playing changed during re-resolution, refresh discarded"),
        }
        Ok(())
    }

    async fn play_next(&self) -> Result<()> {
        let _advance = self.advance.lock().await;

        // Skip-forward bound: entries present when the cycle starts. A
        // fully broken queue stops at idle instead of chasing entries
        // enqueued mid-cycle.
        let budget = self.queue.pending_len();
        let mut failures = 0usize;

        loop {
            let entry = {
                let _guard = self.commit.lock();
                let entry = self.queue.advance();
                if entry.is_some() {
                    self.broadcast(&PartyEvent::SongAdvanced);
                }
                entry
            };
            let Some(entry) = entry else {
                return self.stop_playback();
            };

            match self.resolve_playable(&entry.track).await {
                Ok(media) => {
                    let _guard = self.commit.lock();
                    let playing = NowPlaying::new(media, entry.enqueuer_name);
                    let snapshot = playing.snapshot();
                    self.queue.set_now_playing(playing);
                    self.broadcast(&PartyEvent::NowPlayingChanged {
                        playing: Some(snapshot),
                    });
                    return Ok(());
                }
                Err(err) => {
                    warn!(track = %entry.track.name, api = %entry.track.api_name, error = %err, "skipping unresolvable track");
                    {
                        let _guard = self.commit.lock();
                        self.broadcast(&PartyEvent::GlobalInfo {
                            message: format!(
                                "Skipped \"{} - {}\": {err}",
                                entry.track.name,
                                entry.track.artists.join("/")
                            ),
                        });
                    }
                    failures += 1;
                    if failures >= budget {
                        return self.stop_playback();
                    }
                }
            }
        }
    }

    fn stop_playback(&self) -> Result<()> {
        let _guard = self.commit.lock();
        self.queue.clear_now_playing();
        self.broadcast(&PartyEvent::NowPlayingChanged { playing: None });
        Ok(())
    }

    // ---- chat ----

    pub fn chat_say(&self, id: &ConnectionId, content: &str) -> Result<()> {
        let name = self.member_name(id)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Validation("chat message cannot be empty".to_string()));
        }
        if content.chars().count() > MAX_CHAT_LEN {
            return Err(Error::Validation(format!(
                "chat message must be at most {MAX_CHAT_LEN} characters"
            )));
        }

        let _guard = self.commit.lock();
        self.broadcast(&PartyEvent::ChatMessage {
            name,
            content: content.to_string(),
        });
        Ok(())
    }

    // ---- snapshot reads ----

    #[must_use]
    pub fn music_queue(&self) -> Vec<QueueEntry> {
        self.queue.snapshot()
    }

    #[must_use]
    pub fn now_playing(&self) -> Option<NowPlayingSnapshot> {
        self.queue.now_playing_snapshot()
    }

    #[must_use]
    pub fn online_users(&self) -> Vec<OnlineUser> {
        let mut users: Vec<OnlineUser> = self
            .members
            .iter()
            .map(|entry| OnlineUser {
                id: entry.key().clone(),
                name: entry.value().name.clone(),
            })
            .collect();
        users.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        users
    }

    // ---- internals ----

    fn member_name(&self, id: &ConnectionId) -> Result<String> {
        self.members
            .get(id)
            .map(|m| m.name.clone())
            .ok_or_else(|| Error::NotFound(format!("connection {id}")))
    }

    async fn resolve_playable(&self, track: &Track) -> Result<PlayableMedia> {
        let api = self.apis.get(&track.api_name).ok_or_else(|| {
            Error::Validation(format!("unknown music api: {}", track.api_name))
        })?;
        self.with_timeout(api.name(), api.resolve_playable(track))
            .await
    }

    /// Bound a catalog call; a timeout is an upstream failure like any
    /// other and feeds the same fallback/skip handling.
    async fn with_timeout<T, F>(&self, provider: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.resolve_timeout, fut).await {
            Ok(res) => res.map_err(Error::from),
            Err(_) => Err(ProviderError::Timeout {
                provider,
                seconds: self.resolve_timeout.as_secs(),
            }
            .into()),
        }
    }

    /// Fan an event out to every live connection; dead senders are pruned.
    fn broadcast(&self, event: &PartyEvent) {
        let mut dead = Vec::new();
        for entry in self.members.iter() {
            if entry.value().sender.send(event.clone()).is_err() {
                dead.push(entry.key().clone());
            }
        }
        for id in dead {
            warn!(connection_id = %id, "dropping dead connection during broadcast");
            self.members.remove(&id);
        }
    }

    fn send_to(&self, id: &ConnectionId, event: PartyEvent) {
        if let Some(member) = self.members.get(id) {
            let _ = member.sender.send(event);
        }
    }
}
