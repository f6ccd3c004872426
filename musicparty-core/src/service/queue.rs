//! The ordered play queue and the now-playing slot.
//!
//! All mutation goes through one interior mutex: conceptually one mutation
//! at a time, which is the whole concurrency story for a human-paced queue.
//! Reads lock the same mutex and therefore always see the latest committed
//! state, never a half-applied mutation.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::models::{ActionId, NowPlaying, NowPlayingSnapshot, QueueEntry, Track};

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueueEntry>,
    now_playing: Option<NowPlaying>,
    next_seq: u64,
}

/// Owner of all queue entries and the now-playing slot.
#[derive(Default)]
pub struct QueueStore {
    inner: Mutex<QueueState>,
}

impl QueueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new entry at the tail. Always succeeds; whether the track
    /// actually resolves is advance-time business.
    pub fn enqueue(&self, track: Track, enqueuer_name: &str) -> QueueEntry {
        let mut state = self.inner.lock();
        let entry = QueueEntry {
            action_id: ActionId::new(),
            track,
            enqueuer_name: enqueuer_name.to_string(),
            seq: state.next_seq,
        };
        state.next_seq += 1;
        state.pending.push_back(entry.clone());
        entry
    }

    /// Move the entry to the head of the pending queue. Promoting the head
    /// is a no-op that still succeeds.
    pub fn promote(&self, action_id: &ActionId) -> Result<QueueEntry> {
        let mut state = self.inner.lock();
        let idx = state
            .pending
            .iter()
            .position(|e| &e.action_id == action_id)
            .ok_or_else(|| Error::NotFound(format!("queue entry {action_id}")))?;
        let entry = state.pending.remove(idx).expect("index just found");
        state.pending.push_front(entry.clone());
        Ok(entry)
    }

    /// Delete the entry wherever it sits in the pending queue.
    pub fn remove(&self, action_id: &ActionId) -> Result<QueueEntry> {
        let mut state = self.inner.lock();
        let idx = state
            .pending
            .iter()
            .position(|e| &e.action_id == action_id)
            .ok_or_else(|| Error::NotFound(format!("queue entry {action_id}")))?;
        Ok(state.pending.remove(idx).expect("index just found"))
    }

    /// Pop the head entry, or `None` when the queue is empty. The only
    /// operation that decides what now-playing will become.
    pub fn advance(&self) -> Option<QueueEntry> {
        self.inner.lock().pending.pop_front()
    }

    /// Point-in-time consistent view of the pending queue.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.inner.lock().pending.iter().cloned().collect()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn set_now_playing(&self, playing: NowPlaying) {
        self.inner.lock().now_playing = Some(playing);
    }

    pub fn clear_now_playing(&self) {
        self.inner.lock().now_playing = None;
    }

    #[must_use]
    pub fn now_playing(&self) -> Option<NowPlaying> {
        self.inner.lock().now_playing.clone()
    }

    #[must_use]
    pub fn now_playing_snapshot(&self) -> Option<NowPlayingSnapshot> {
        self.inner.lock().now_playing.as_ref().map(NowPlaying::snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayableMedia;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn track(id: &str) -> Track {
        Track {
            api_name: "TestApi".to_string(),
            id: id.to_string(),
            name: format!("track-{id}"),
            artists: vec!["artist".to_string()],
            cover_url: None,
        }
    }

    #[test]
    fn test_concurrent_enqueues_all_land_with_unique_ids() {
        let store = Arc::new(QueueStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store.enqueue(track(&format!("{t}-{i}")), "someone");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("enqueue thread");
        }

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 200);
        let ids: HashSet<_> = snapshot.iter().map(|e| e.action_id.clone()).collect();
        assert_eq!(ids.len(), 200);
        let seqs: HashSet<_> = snapshot.iter().map(|e| e.seq).collect();
        assert_eq!(seqs.len(), 200);
    }

    #[test]
    fn test_promote_moves_to_head_preserving_rest() {
        let store = QueueStore::new();
        let a = store.enqueue(track("a"), "u");
        let b = store.enqueue(track("b"), "u");
        let c = store.enqueue(track("c"), "u");

        store.promote(&c.action_id).expect("promote c");
        let order: Vec<_> = store.snapshot().iter().map(|e| e.track.id.clone()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);

        // Promoting the current head changes nothing.
        store.promote(&c.action_id).expect("promote head");
        let order: Vec<_> = store.snapshot().iter().map(|e| e.track.id.clone()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);

        let _ = (a, b);
    }

    #[test]
    fn test_remove_twice_is_not_found() {
        let store = QueueStore::new();
        let a = store.enqueue(track("a"), "u");
        store.remove(&a.action_id).expect("first remove");
        let err = store.remove(&a.action_id).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_promote_missing_is_not_found() {
        let store = QueueStore::new();
        let err = store.promote(&ActionId::new()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_advance_empty_leaves_now_playing_unset() {
        let store = QueueStore::new();
        assert!(store.advance().is_none());
        assert!(store.now_playing().is_none());
    }

    #[test]
    fn test_advance_pops_in_order() {
        let store = QueueStore::new();
        store.enqueue(track("a"), "u");
        store.enqueue(track("b"), "u");

        assert_eq!(store.advance().expect("head").track.id, "a");
        assert_eq!(store.advance().expect("head").track.id, "b");
        assert!(store.advance().is_none());
    }

    #[test]
    fn test_snapshot_round_trips_track_fields() {
        let store = QueueStore::new();
        let submitted = Track {
            api_name: "QQMusic".to_string(),
            id: "mid,mid".to_string(),
            name: "晴天".to_string(),
            artists: vec!["周杰伦".to_string()],
            cover_url: None,
        };
        store.enqueue(submitted.clone(), "Alice");

        let got = &store.snapshot()[0];
        assert_eq!(got.track.api_name, submitted.api_name);
        assert_eq!(got.track.id, submitted.id);
        assert_eq!(got.track.name, submitted.name);
        assert_eq!(got.track.artists, submitted.artists);
        assert_eq!(got.enqueuer_name, "Alice");
    }

    #[test]
    fn test_now_playing_slot() {
        let store = QueueStore::new();
        let media = PlayableMedia {
            track: track("a"),
            url: "https://stream.example.com/a".to_string(),
            length_millis: 1000,
        };
        store.set_now_playing(NowPlaying::new(media, "Alice".to_string()));
        assert_eq!(
            store.now_playing_snapshot().expect("playing").enqueuer_name,
            "Alice"
        );
        store.clear_now_playing();
        assert!(store.now_playing_snapshot().is_none());
    }
}
