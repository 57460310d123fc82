//! Session drivers talking through an in-process relay

use crate::helpers::{eventually, fast_config, start};
use cotext_core::sync::{ConnectionState, MemoryRelay, RopeSurface, SessionDriver, SessionEvent};
use cotext_core::{SessionConfig, SyncError};
use std::sync::Arc;

async fn wait_open(handle: &cotext_core::sync::SessionHandle) {
    eventually!(handle.state().await.unwrap() == ConnectionState::Open);
}

#[tokio::test]
async fn test_two_sessions_converge() {
    let relay = MemoryRelay::new();
    let (alice, _alice_events) = start(&relay, "doc", "alice");
    let (bob, _bob_events) = start(&relay, "doc", "bob");
    wait_open(&alice).await;
    wait_open(&bob).await;

    assert_eq!(alice.edit("hello").await.unwrap(), 5);
    eventually!(bob.text().await.unwrap() == "hello");
    assert_eq!(bob.surface_text().await.unwrap(), "hello");

    bob.edit("hello world").await.unwrap();
    eventually!(alice.text().await.unwrap() == "hello world");
    assert_eq!(alice.surface_text().await.unwrap(), "hello world");
    eventually!(alice.pending().await.unwrap() == 0 && bob.pending().await.unwrap() == 0);
}

#[tokio::test]
async fn test_concurrent_sessions_agree() {
    let relay = MemoryRelay::new();
    let (alice, _alice_events) = start(&relay, "doc", "alice");
    let (bob, _bob_events) = start(&relay, "doc", "bob");
    wait_open(&alice).await;
    wait_open(&bob).await;

    alice.edit("a").await.unwrap();
    eventually!(bob.text().await.unwrap() == "a");

    // Cut both off so neither edit can reach the other first
    relay.set_offline(true).unwrap();
    relay.drop_connections("doc").unwrap();
    eventually!(alice.state().await.unwrap() != ConnectionState::Open);
    eventually!(bob.state().await.unwrap() != ConnectionState::Open);

    alice.edit("aX").await.unwrap();
    bob.edit("aY").await.unwrap();
    relay.set_offline(false).unwrap();

    eventually!({
        let left = alice.text().await.unwrap();
        left.len() == 3 && left == bob.text().await.unwrap()
    });
    let text = alice.text().await.unwrap();
    assert!(text == "aXY" || text == "aYX", "unexpected {}", text);
}

#[tokio::test]
async fn test_one_user_in_two_tabs() {
    let relay = MemoryRelay::new();
    let (tab_one, _one_events) = start(&relay, "doc", "alice");
    let (tab_two, _two_events) = start(&relay, "doc", "alice");
    wait_open(&tab_one).await;
    wait_open(&tab_two).await;
    assert_eq!(relay.connection_count("doc").unwrap(), 2);

    // Both tabs type into an empty document while cut off from each other
    relay.set_offline(true).unwrap();
    relay.drop_connections("doc").unwrap();
    eventually!(tab_one.state().await.unwrap() != ConnectionState::Open);
    eventually!(tab_two.state().await.unwrap() != ConnectionState::Open);

    tab_one.edit("x").await.unwrap();
    tab_two.edit("y").await.unwrap();
    relay.set_offline(false).unwrap();

    eventually!({
        let left = tab_one.text().await.unwrap();
        left.len() == 2 && left == tab_two.text().await.unwrap()
    });
    let text = tab_one.text().await.unwrap();
    assert_eq!(tab_one.surface_text().await.unwrap(), text);
    assert_eq!(tab_two.surface_text().await.unwrap(), text);

    tab_two.edit("").await.unwrap();
    eventually!(tab_one.text().await.unwrap().is_empty());
    assert_eq!(tab_one.surface_text().await.unwrap(), "");
}

#[tokio::test]
async fn test_combining_mark_from_peer_lands_on_surface() {
    let relay = MemoryRelay::new();
    let (alice, _alice_events) = start(&relay, "doc", "alice");
    let (bob, _bob_events) = start(&relay, "doc", "bob");
    wait_open(&alice).await;
    wait_open(&bob).await;

    // Typed piece by piece, so the mark is stored on its own
    alice.edit("e").await.unwrap();
    alice.edit("e\u{301}").await.unwrap();
    alice.edit("e\u{301}\r").await.unwrap();
    alice.edit("e\u{301}\r\n").await.unwrap();
    eventually!(bob.text().await.unwrap() == "e\u{301}\r\n");
    assert_eq!(bob.surface_text().await.unwrap(), "e\u{301}\r\n");

    // Removing the mark and the "\r" on one side shows up intact on the other
    bob.edit("e\n").await.unwrap();
    eventually!(alice.text().await.unwrap() == "e\n");
    assert_eq!(alice.surface_text().await.unwrap(), "e\n");
    assert_eq!(bob.surface_text().await.unwrap(), "e\n");
}

#[tokio::test]
async fn test_presence_join_caret_and_leave() {
    let relay = MemoryRelay::new();
    let (alice, mut alice_events) = start(&relay, "doc", "alice");
    wait_open(&alice).await;
    let (bob, _bob_events) = start(&relay, "doc", "bob");
    wait_open(&bob).await;

    eventually!(alice
        .participants()
        .await
        .unwrap()
        .iter()
        .any(|p| p.user_id == "bob"));

    bob.edit("hi").await.unwrap();
    bob.set_caret(2).unwrap();
    eventually!(alice
        .participants()
        .await
        .unwrap()
        .iter()
        .any(|p| p.user_id == "bob" && p.caret == Some(2)));

    bob.shutdown().await.unwrap();
    eventually!(alice
        .participants()
        .await
        .unwrap()
        .iter()
        .all(|p| p.user_id != "bob"));

    // Presence changes were reported as events along the way
    let mut saw_presence = false;
    while let Ok(event) = alice_events.try_recv() {
        if matches!(event, SessionEvent::PresenceChanged(_)) {
            saw_presence = true;
        }
    }
    assert!(saw_presence);
}

#[tokio::test]
async fn test_offline_edits_are_sent_after_reconnect() {
    let relay = MemoryRelay::new();
    let (alice, _alice_events) = start(&relay, "doc", "alice");
    let (bob, _bob_events) = start(&relay, "doc", "bob");
    wait_open(&alice).await;
    wait_open(&bob).await;

    relay.set_offline(true).unwrap();
    relay.drop_connections("doc").unwrap();
    eventually!(alice.state().await.unwrap() != ConnectionState::Open);

    alice.edit("offline").await.unwrap();
    assert_eq!(alice.text().await.unwrap(), "offline");
    assert_eq!(alice.pending().await.unwrap(), 7);

    relay.set_offline(false).unwrap();
    eventually!(bob.text().await.unwrap() == "offline");
    eventually!(alice.pending().await.unwrap() == 0);
    assert_eq!(relay.history("doc").unwrap().len(), 7);
}

#[tokio::test]
async fn test_late_joiner_receives_history() {
    let relay = MemoryRelay::new();
    let (alice, _alice_events) = start(&relay, "doc", "alice");
    wait_open(&alice).await;
    alice.edit("abc").await.unwrap();
    alice.edit("ac").await.unwrap();
    eventually!(relay.history("doc").unwrap().len() == 4);

    let (carol, _carol_events) = start(&relay, "doc", "carol");
    eventually!(carol.text().await.unwrap() == "ac");
    assert_eq!(carol.surface_text().await.unwrap(), "ac");
}

#[tokio::test]
async fn test_first_events_are_connecting_then_open() {
    let relay = MemoryRelay::new();
    let (_alice, mut events) = start(&relay, "doc", "alice");

    assert_eq!(
        events.recv().await,
        Some(SessionEvent::StateChanged(ConnectionState::Connecting))
    );
    assert_eq!(
        events.recv().await,
        Some(SessionEvent::StateChanged(ConnectionState::Open))
    );
}

#[tokio::test]
async fn test_shutdown_returns_unsent_operations() {
    let relay = MemoryRelay::new();
    relay.set_offline(true).unwrap();
    let (alice, _events) = start(&relay, "doc", "alice");
    let spare = alice.clone();

    alice.edit("ab").await.unwrap();
    let unsent = alice.shutdown().await.unwrap();
    assert_eq!(unsent.len(), 2);

    assert!(matches!(spare.text().await, Err(SyncError::SessionClosed)));
    assert!(matches!(spare.set_caret(1), Err(SyncError::SessionClosed)));
}

#[tokio::test]
async fn test_shutdown_flushes_when_open() {
    let relay = MemoryRelay::new();
    let config = SessionConfig {
        // Long enough that only the final flush can send
        flush_interval_ms: 60_000,
        flush_on_shutdown: true,
        ..fast_config()
    };
    let (alice, mut events) = SessionDriver::spawn(
        Arc::new(relay.clone()),
        "doc".to_string(),
        "alice".to_string(),
        config,
        Box::new(RopeSurface::new()),
    )
    .unwrap();
    wait_open(&alice).await;

    alice.edit("bye").await.unwrap();
    let unsent = alice.shutdown().await.unwrap();
    assert!(unsent.is_empty());
    assert_eq!(relay.history("doc").unwrap().len(), 3);
    assert_eq!(relay.connection_count("doc").unwrap(), 0);

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::StateChanged(state) = event {
            states.push(state);
        }
    }
    assert_eq!(
        states,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closing,
            ConnectionState::Closed,
        ]
    );
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let relay = MemoryRelay::new();
    let config = SessionConfig {
        flush_interval_ms: 0,
        ..SessionConfig::default()
    };
    let result = SessionDriver::spawn(
        Arc::new(relay),
        "doc".to_string(),
        "alice".to_string(),
        config,
        Box::new(RopeSurface::new()),
    );
    assert!(matches!(result, Err(SyncError::Config(_))));
}
