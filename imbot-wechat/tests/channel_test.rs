//! Integration tests for [`imbot_wechat::WechatChannel`] and [`imbot_wechat::WechatThread`].
//!
//! Covers: idempotent thread resolution, reclamation threshold, default-thread
//! permanence, and the send activity policies. Time is paused and advanced manually.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use imbot_core::{Channel, Identifiable, ImbotError, Sender, Thread, DEFAULT_THREAD_ID};
use imbot_wechat::{ActivityPolicy, ChannelKind, WechatChannel, WechatParticipant};

const TIMEOUT: Duration = Duration::from_secs(30 * 60);

fn room_channel(puppet: Arc<MockPuppet>, policy: ActivityPolicy) -> Arc<WechatChannel> {
    WechatChannel::new(
        "r1",
        ChannelKind::Room,
        puppet,
        vec![me(), alice(), bob()]
            .into_iter()
            .map(WechatParticipant::from)
            .collect(),
        TIMEOUT,
        policy,
    )
}

fn participants(contacts: Vec<imbot_wechat::Contact>) -> Vec<Arc<WechatParticipant>> {
    contacts
        .into_iter()
        .map(|c| Arc::new(WechatParticipant::from(c)))
        .collect()
}

/// **Test: Resolution is idempotent and order-insensitive.**
///
/// **Expected:** the same `Arc` for repeated and permuted sets; the empty set is the default thread.
#[tokio::test]
async fn test_find_or_add_thread_is_idempotent() {
    let channel = room_channel(Arc::new(MockPuppet::new()), ActivityPolicy::OnSuccess);

    let first = channel.find_or_add_thread(&participants(vec![alice(), bob()]));
    let again = channel.find_or_add_thread(&participants(vec![alice(), bob()]));
    let permuted = channel.find_or_add_thread(&participants(vec![bob(), alice()]));

    assert!(Arc::ptr_eq(&first, &again));
    assert!(Arc::ptr_eq(&first, &permuted));
    assert_eq!(channel.thread_count(), 2);

    let default = channel.find_or_add_thread(&[]);
    assert_eq!(default.id(), DEFAULT_THREAD_ID);
    assert!(Arc::ptr_eq(&default, &channel.default_wechat_thread()));
    assert!(channel.find_thread(first.id()).is_some());
}

/// **Test: A new thread keeps its participants sorted and deduplicated.**
#[tokio::test]
async fn test_thread_participants_are_canonical() {
    let channel = room_channel(Arc::new(MockPuppet::new()), ActivityPolicy::OnSuccess);

    let thread = channel.find_or_add_thread(&participants(vec![bob(), alice(), bob()]));
    let ids: Vec<String> = thread
        .participants()
        .iter()
        .map(|p| p.id().to_string())
        .collect();
    assert_eq!(ids, vec![ALICE.to_string(), BOB.to_string()]);
    assert_eq!(thread.channel_id(), "r1");
}

/// **Test: A thread idle 31 minutes is reclaimed with a 30-minute timeout.**
///
/// **Setup:** one sub-thread created at t0.
/// **Action:** advance 31 minutes, sweep.
/// **Expected:** one removed; only the default thread remains.
#[tokio::test(start_paused = true)]
async fn test_idle_thread_is_reclaimed() {
    let channel = room_channel(Arc::new(MockPuppet::new()), ActivityPolicy::OnSuccess);
    let thread = channel.find_or_add_thread(&participants(vec![alice(), bob()]));
    let thread_id = thread.id().to_string();

    tokio::time::advance(Duration::from_secs(31 * 60)).await;

    assert_eq!(channel.reclaim_threads(), 1);
    assert!(channel.find_wechat_thread(&thread_id).is_none());
    assert_eq!(channel.thread_ids(), vec![DEFAULT_THREAD_ID.to_string()]);
}

/// **Test: A thread idle exactly the timeout survives; one tick more does not.**
#[tokio::test(start_paused = true)]
async fn test_reclamation_threshold() {
    let channel = room_channel(Arc::new(MockPuppet::new()), ActivityPolicy::OnSuccess);
    channel.find_or_add_thread(&participants(vec![alice()]));

    tokio::time::advance(TIMEOUT).await;
    assert_eq!(channel.reclaim_threads(), 0);
    assert_eq!(channel.thread_count(), 2);

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(channel.reclaim_threads(), 1);
    assert_eq!(channel.thread_count(), 1);
}

/// **Test: Activity resets the idle clock.**
#[tokio::test(start_paused = true)]
async fn test_touch_keeps_thread_alive() {
    let channel = room_channel(Arc::new(MockPuppet::new()), ActivityPolicy::OnSuccess);
    let thread = channel.find_or_add_thread(&participants(vec![alice()]));

    tokio::time::advance(Duration::from_secs(20 * 60)).await;
    thread.touch();
    tokio::time::advance(Duration::from_secs(20 * 60)).await;

    assert_eq!(channel.reclaim_threads(), 0);
    assert!(channel.find_wechat_thread(ALICE).is_some());
}

/// **Test: The default thread survives any number of sweeps and any idle time.**
#[tokio::test(start_paused = true)]
async fn test_default_thread_is_never_reclaimed() {
    let channel = room_channel(Arc::new(MockPuppet::new()), ActivityPolicy::OnSuccess);
    let default = channel.default_wechat_thread();

    for _ in 0..5 {
        tokio::time::advance(Duration::from_secs(24 * 60 * 60)).await;
        assert_eq!(channel.reclaim_threads(), 0);
    }

    assert!(Arc::ptr_eq(&default, &channel.default_wechat_thread()));
    assert_eq!(channel.thread_ids(), vec![DEFAULT_THREAD_ID.to_string()]);
}

/// **Test: With OnSuccess, a failed send leaves the activity timestamp untouched.**
#[tokio::test(start_paused = true)]
async fn test_failed_send_does_not_refresh_on_success_policy() {
    let puppet = Arc::new(MockPuppet::new());
    let channel = room_channel(puppet.clone(), ActivityPolicy::OnSuccess);
    let thread = channel.find_or_add_thread(&participants(vec![alice()]));
    let created = thread.last_active();

    tokio::time::advance(Duration::from_secs(60)).await;
    puppet.set_fail_sends(true);
    let err = thread.send("hello").await.unwrap_err();

    assert!(matches!(err, ImbotError::Transport(_)));
    assert_eq!(thread.last_active(), created);

    puppet.set_fail_sends(false);
    thread.send("hello").await.unwrap();
    assert_eq!(thread.last_active(), created + Duration::from_secs(60));
}

/// **Test: With OnAttempt, a failed send still refreshes the activity timestamp.**
#[tokio::test(start_paused = true)]
async fn test_failed_send_refreshes_on_attempt_policy() {
    let puppet = Arc::new(MockPuppet::new());
    let channel = room_channel(puppet.clone(), ActivityPolicy::OnAttempt);
    let thread = channel.find_or_add_thread(&participants(vec![alice()]));
    let created = thread.last_active();

    tokio::time::advance(Duration::from_secs(60)).await;
    puppet.set_fail_sends(true);
    assert!(thread.send("hello").await.is_err());

    assert_eq!(thread.last_active(), created + Duration::from_secs(60));
}

/// **Test: Sending through a thread whose channel was dropped fails with ChannelGone.**
#[tokio::test]
async fn test_send_after_channel_dropped() {
    let channel = room_channel(Arc::new(MockPuppet::new()), ActivityPolicy::OnSuccess);
    let thread = channel.find_or_add_thread(&participants(vec![alice()]));
    drop(channel);

    assert!(thread.channel().is_none());
    let err = thread.send("hello").await.unwrap_err();
    assert!(matches!(err, ImbotError::ChannelGone(id) if id == "r1"));
}

/// **Test: Channel send goes straight to the puppet without any prefix.**
#[tokio::test]
async fn test_channel_send_uses_channel_id() {
    let puppet = Arc::new(MockPuppet::new());
    let channel = room_channel(puppet.clone(), ActivityPolicy::OnSuccess);

    channel.send("broadcast").await.unwrap();
    assert_eq!(
        puppet.sent(),
        vec![("r1".to_string(), "broadcast".to_string())]
    );
    assert_eq!(channel.participants().len(), 3);
}
