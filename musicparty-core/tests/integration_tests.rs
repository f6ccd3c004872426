//! Cross-module tests driving the hub through its public API only.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use musicparty_core::models::{PartyEvent, PlayableMedia, Track};
use musicparty_core::provider::{ApiRegistry, MusicApi, ProviderError};
use musicparty_core::service::PartyHub;

const API: &str = "StubCatalog";

struct StubCatalog {
    /// Extra latency per playable resolution, to widen race windows.
    delay: Duration,
}

#[async_trait]
impl MusicApi for StubCatalog {
    fn name(&self) -> &'static str {
        API
    }

    async fn resolve_by_id(&self, id: &str) -> Result<Track, ProviderError> {
        Ok(Track {
            api_name: API.to_string(),
            id: id.to_string(),
            name: format!("track-{id}"),
            artists: vec!["someone".to_string()],
            cover_url: Some("https://covers.example.com/default.jpg".to_string()),
        })
    }

    async fn resolve_playable(&self, track: &Track) -> Result<PlayableMedia, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Ok(PlayableMedia {
            track: track.clone(),
            url: format!("https://stream.example.com/{}", track.id),
            length_millis: 200_000,
        })
    }
}

fn hub(delay: Duration) -> Arc<PartyHub> {
    let mut registry = ApiRegistry::new();
    registry.register(Arc::new(StubCatalog { delay }));
    Arc::new(PartyHub::new(Arc::new(registry), Duration::from_secs(5)))
}

#[tokio::test]
async fn concurrent_enqueues_all_commit_with_unique_action_ids() {
    let hub = hub(Duration::ZERO);
    let (conn, mut rx) = hub.connect("driver");

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let hub = Arc::clone(&hub);
            let conn = conn.clone();
            tokio::spawn(async move { hub.enqueue_music(&conn, &i.to_string(), API).await })
        })
        .collect();
    for task in tasks {
        task.await.expect("join").expect("enqueue");
    }

    let queue = hub.music_queue();
    assert_eq!(queue.len(), 20);
    let ids: HashSet<_> = queue.iter().map(|e| e.action_id.as_str().to_string()).collect();
    assert_eq!(ids.len(), 20);

    let mut enqueued = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, PartyEvent::MusicEnqueued { .. }) {
            enqueued += 1;
        }
    }
    assert_eq!(enqueued, 20);
}

#[tokio::test]
async fn observers_see_identical_event_order() {
    let hub = hub(Duration::ZERO);
    let (driver, mut driver_rx) = hub.connect("driver");
    let (_watcher, mut watcher_rx) = hub.connect("watcher");

    for i in 0..10 {
        hub.enqueue_music(&driver, &i.to_string(), API)
            .await
            .expect("enqueue");
    }
    hub.next_song(&driver).await.expect("next");
    hub.chat_say(&driver, "order check").expect("chat");

    let driver_events: Vec<String> = drain_types(&mut driver_rx);
    let watcher_events: Vec<String> = drain_types(&mut watcher_rx);

    // The watcher joined one event later; everything after the join must
    // match the driver's tail exactly.
    let tail_len = watcher_events.len() - 2; // skip own join + state snapshot
    assert_eq!(
        driver_events[driver_events.len() - tail_len..],
        watcher_events[watcher_events.len() - tail_len..]
    );
}

#[tokio::test]
async fn queue_mutations_proceed_while_resolution_is_in_flight() {
    let hub = hub(Duration::from_millis(200));
    let (conn, _rx) = hub.connect("driver");

    hub.enqueue_music(&conn, "slow", API).await.expect("enqueue");

    let next = {
        let hub = Arc::clone(&hub);
        let conn = conn.clone();
        tokio::spawn(async move { hub.next_song(&conn).await })
    };

    // While "slow" resolves, the queue must stay mutable.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let entry = hub
        .enqueue_music(&conn, "while-resolving", API)
        .await
        .expect("enqueue during resolution");
    assert_eq!(hub.music_queue().len(), 1);
    hub.remove_song(&conn, &entry.action_id).expect("remove during resolution");

    next.await.expect("join").expect("next");
    assert_eq!(
        hub.now_playing().expect("playing").media.track.id,
        "slow"
    );
}

fn drain_types(rx: &mut tokio::sync::mpsc::UnboundedReceiver<PartyEvent>) -> Vec<String> {
    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        types.push(event.event_type().to_string());
    }
    types
}
