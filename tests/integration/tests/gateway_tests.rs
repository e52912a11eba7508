//! Gateway Integration Tests
//!
//! Drive a real client against the in-process mock gateway.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use cyan_gateway::events::{
    Channel, ChannelCreated, ChannelMessageReceived, GuildCreated, MemberJoined, Message,
    RawEvent, Ready, ReadyEvent,
};
use cyan_gateway::{GatewayError, Intents, RestTransport, SessionState};
use integration_tests::{
    assert_quiet, at_message, channel_group, eventually, next_report, reporter, test_client,
    test_client_with, text_channel, MockGateway,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Identify
// ============================================================================

#[tokio::test]
async fn test_identify_carries_registered_intents() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);
    client.get_event::<ChannelCreated>().unwrap();
    client.get_event::<ChannelMessageReceived>().unwrap();

    client.connect().await.unwrap();
    assert!(client.is_connected());
    assert_eq!(
        gateway.last_authorization().as_deref(),
        Some("Bot 102030.integration-token")
    );

    let mut conn = gateway.next_connection().await;
    conn.hello(45_000);
    let identify = conn.expect_op(2).await;

    assert_eq!(identify["d"]["token"], "Bot 102030.integration-token");
    assert_eq!(identify["d"]["intents"], (1 << 0) | (1 << 30));
    assert!(identify["d"]["properties"].is_object());
    assert_eq!(client.heartbeat_interval(), Duration::from_millis(45_000));

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_ready_activates_session() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);
    let (tx, mut reports) = reporter();
    client
        .listen_payload::<ReadyEvent, _, _>(move |ready: Arc<Ready>| {
            let tx = tx.clone();
            async move {
                tx.send(ready.session_id.clone())?;
                Ok(())
            }
        })
        .unwrap();

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.establish("session-1").await;

    assert_eq!(next_report(&mut reports).await, "session-1");
    eventually("active session", || client.state() == SessionState::Active).await;
    assert_eq!(client.session_id().as_deref(), Some("session-1"));
    assert_eq!(client.last_sequence(), 1);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_heartbeat_carries_last_sequence() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.hello(100);
    conn.expect_op(2).await;
    conn.dispatch("READY", 5, integration_tests::ready("session-hb"));
    eventually("sequence 5", || client.last_sequence() == 5).await;

    loop {
        let heartbeat = conn.expect_op(1).await;
        if heartbeat["d"] == 5 {
            break;
        }
    }

    client.disconnect().await.unwrap();
}

// ============================================================================
// Subscription gating
// ============================================================================

#[tokio::test]
async fn test_subscription_after_connect() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);
    client.get_event::<GuildCreated>().unwrap();

    client.connect().await.unwrap();
    let _conn = gateway.next_connection().await;

    let err = client.get_event::<MemberJoined>().err().unwrap();
    assert!(matches!(
        err,
        GatewayError::CannotSubscribeAfterConnect { event: "GUILD_MEMBER_ADD", .. }
    ));
    assert_eq!(client.intents(), Intents::GUILDS);

    // Intents already negotiated remain available.
    client.get_event::<ChannelCreated>().unwrap();
    client.get_event::<ReadyEvent>().unwrap();

    client.disconnect().await.unwrap();
    client.get_event::<MemberJoined>().unwrap();
    assert_eq!(client.intents(), Intents::GUILDS | Intents::GUILD_MEMBERS);
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_every_channel_create_handler_runs() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);
    let (tx, mut reports) = reporter();

    let handle = client.get_event::<ChannelCreated>().unwrap();
    for label in ["first", "second"] {
        let tx = tx.clone();
        handle.bind_payload(move |channel: Arc<Channel>| {
            let tx = tx.clone();
            async move {
                tx.send(format!("{label}:{}", channel.name))?;
                Ok(())
            }
        });
    }
    handle.bind_payload(|_| async { Err::<(), _>(anyhow::anyhow!("this handler always fails")) });

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.establish("session-dispatch").await;
    conn.dispatch("CHANNEL_CREATE", 2, text_channel("c-1", "general"));

    let mut seen = vec![next_report(&mut reports).await, next_report(&mut reports).await];
    seen.sort();
    assert_eq!(seen, vec!["first:general", "second:general"]);
    assert_quiet(&mut reports).await;

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_channel_group_reaches_raw_event_only() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);
    let (tx, mut reports) = reporter();

    let typed = tx.clone();
    client
        .listen_payload::<ChannelCreated, _, _>(move |channel: Arc<Channel>| {
            let tx = typed.clone();
            async move {
                tx.send(format!("typed:{}", channel.id))?;
                Ok(())
            }
        })
        .unwrap();
    client
        .listen_payload::<RawEvent<ChannelCreated>, _, _>(move |raw: Arc<Value>| {
            let tx = tx.clone();
            async move {
                tx.send(format!("raw:{}", raw["id"].as_str().unwrap_or_default()))?;
                Ok(())
            }
        })
        .unwrap();

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.establish("session-raw").await;
    conn.dispatch("CHANNEL_CREATE", 2, channel_group("g-1"));

    assert_eq!(next_report(&mut reports).await, "raw:g-1");
    assert_quiet(&mut reports).await;

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_started_hooks_run_after_connect() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);
    let (tx, mut reports) = reporter();

    client.on_started(|_| async { Err::<(), _>(anyhow::anyhow!("this hook always fails")) });
    client.on_started(move |client| {
        let tx = tx.clone();
        async move {
            let user = client.transport().get_json("/users/@me").await?;
            tx.send(format!("{}:{}", user["username"].as_str().unwrap_or_default(), client.is_connected()))?;
            Ok(())
        }
    });

    client.connect().await.unwrap();
    // Hooks have finished by the time connect returns.
    assert_eq!(reports.try_recv().unwrap(), "cyan-test:true");

    let _conn = gateway.next_connection().await;
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_handler_receives_client() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);
    let (tx, mut reports) = reporter();

    client
        .listen::<ChannelMessageReceived, _, _>(move |message: Arc<Message>, client| {
            let tx = tx.clone();
            async move {
                tx.send(format!("{}@{}", message.content, client.last_sequence()))?;
                Ok(())
            }
        })
        .unwrap();

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.establish("session-client").await;
    conn.dispatch("AT_MESSAGE_CREATE", 7, at_message("m-1", "<@!1> ping"));

    assert_eq!(next_report(&mut reports).await, "<@!1> ping@7");

    client.disconnect().await.unwrap();
}

// ============================================================================
// Resume
// ============================================================================

#[tokio::test]
async fn test_session_timeout_resumes() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);
    let (tx, mut reports) = reporter();
    client
        .listen_payload::<ChannelCreated, _, _>(move |channel: Arc<Channel>| {
            let tx = tx.clone();
            async move {
                tx.send(channel.id.clone())?;
                Ok(())
            }
        })
        .unwrap();

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.establish("session-resume").await;
    conn.dispatch("CHANNEL_CREATE", 2, text_channel("c-1", "before"));
    assert_eq!(next_report(&mut reports).await, "c-1");

    conn.close(4009, "session timed out");

    let mut resumed = gateway.next_connection().await;
    resumed.hello(45_000);
    let resume = resumed.expect_op(6).await;
    assert_eq!(resume["d"]["session_id"], "session-resume");
    assert_eq!(resume["d"]["seq"], 2);
    assert_eq!(resume["d"]["token"], "Bot 102030.integration-token");

    resumed.dispatch("RESUMED", 3, Value::String(String::new()));
    eventually("resumed session", || client.state() == SessionState::Active).await;
    assert_eq!(client.session_id().as_deref(), Some("session-resume"));
    assert!(client.is_connected());

    resumed.dispatch("CHANNEL_CREATE", 4, text_channel("c-2", "after"));
    assert_eq!(next_report(&mut reports).await, "c-2");
    assert_eq!(client.last_sequence(), 4);

    // The cached gateway URL is reused.
    assert_eq!(gateway.gateway_requests(), 1);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_dropped_socket_resumes() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.establish("session-drop").await;
    eventually("active session", || client.state() == SessionState::Active).await;

    drop(conn);

    let mut resumed = gateway.next_connection().await;
    resumed.hello(45_000);
    let resume = resumed.expect_op(6).await;
    assert_eq!(resume["d"]["session_id"], "session-drop");
    assert_eq!(resume["d"]["seq"], 1);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_request_resumes() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.establish("session-op7").await;
    eventually("active session", || client.state() == SessionState::Active).await;

    conn.send(serde_json::json!({ "op": 7 }));
    assert_eq!(conn.expect_close().await, Some(1000));

    let mut resumed = gateway.next_connection().await;
    resumed.hello(45_000);
    let resume = resumed.expect_op(6).await;
    assert_eq!(resume["d"]["session_id"], "session-op7");

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_drop_before_ready_identifies_again() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.hello(45_000);
    conn.expect_op(2).await;
    conn.close(4009, "session timed out");

    let mut second = gateway.next_connection().await;
    second.hello(45_000);
    second.expect_op(2).await;

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_resume_gives_up_after_max_attempts() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.establish("session-lost").await;
    eventually("active session", || client.state() == SessionState::Active).await;

    gateway.set_accepting(false);
    conn.close(4009, "session timed out");

    let err = client.wait_until_stopped().await.unwrap_err();
    assert!(matches!(err, GatewayError::ResumeFailed { attempts: 3, .. }));
    assert!(!client.is_connected());
    assert_eq!(client.session_id(), None);
    assert_eq!(client.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_disconnect_during_resume() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client_with(&gateway, |config| {
        config.with_reconnect_delay(Duration::from_secs(30))
    });

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.establish("session-interrupted").await;
    eventually("active session", || client.state() == SessionState::Active).await;

    gateway.set_accepting(false);
    conn.close(4009, "session timed out");
    eventually("resume in progress", || client.state() == SessionState::Connecting).await;

    // The drop is not visible while the session is being resumed.
    assert!(client.is_connected());
    assert_eq!(client.session_id().as_deref(), Some("session-interrupted"));

    gateway.set_accepting(true);
    let started = Instant::now();
    client.disconnect().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    client.wait_until_stopped().await.unwrap();

    assert!(!client.is_connected());
    assert_eq!(client.state(), SessionState::Disconnected);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(gateway.try_next_connection().is_none());
}

// ============================================================================
// Fatal close and disconnect
// ============================================================================

#[tokio::test]
async fn test_every_waiter_sees_fatal_close() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.establish("session-watched").await;
    eventually("active session", || client.state() == SessionState::Active).await;

    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.wait_until_stopped().await })
        })
        .collect();

    conn.close(4914, "offline");

    for waiter in waiters {
        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            GatewayError::NonResumableDisconnect { code: Some(4914), .. }
        ));
    }
    let err = client.wait_until_stopped().await.unwrap_err();
    assert!(matches!(err, GatewayError::NonResumableDisconnect { .. }));
}

#[tokio::test]
async fn test_fatal_close_surfaces() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);
    client.get_event::<GuildCreated>().unwrap();

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.establish("session-fatal").await;
    eventually("active session", || client.state() == SessionState::Active).await;

    conn.close(4914, "bot is offline");

    let err = client.wait_until_stopped().await.unwrap_err();
    match err {
        GatewayError::NonResumableDisconnect { code, reason } => {
            assert_eq!(code, Some(4914));
            assert_eq!(reason, "bot is offline");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!client.is_connected());
    assert_eq!(client.session_id(), None);
    assert!(gateway.try_next_connection().is_none());

    // The registry is open again and the client can reconnect.
    client.get_event::<MemberJoined>().unwrap();
    assert!(matches!(
        client.disconnect().await,
        Err(GatewayError::NotConnected)
    ));
    client.connect().await.unwrap();
    let mut again = gateway.next_connection().await;
    again.hello(45_000);
    let identify = again.expect_op(2).await;
    assert_eq!(identify["d"]["intents"], (1 << 0) | (1 << 1));

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_resets_session() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);

    client.connect().await.unwrap();
    assert!(matches!(
        client.connect().await,
        Err(GatewayError::AlreadyConnected)
    ));

    let mut conn = gateway.next_connection().await;
    conn.establish("session-bye").await;
    eventually("active session", || client.state() == SessionState::Active).await;

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move { client.wait_until_stopped().await })
    };

    client.disconnect().await.unwrap();
    assert_eq!(conn.expect_close().await, Some(1000));
    waiter.await.unwrap().unwrap();

    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(!client.is_connected());
    assert_eq!(client.session_id(), None);
    assert_eq!(client.last_sequence(), -1);
    assert!(matches!(
        client.disconnect().await,
        Err(GatewayError::NotConnected)
    ));
}

#[tokio::test]
async fn test_server_ignores_unknown_frames() {
    let mut gateway = MockGateway::start().await.expect("Failed to start gateway");
    let client = test_client(&gateway);

    client.connect().await.unwrap();
    let mut conn = gateway.next_connection().await;
    conn.establish("session-unknown").await;
    conn.send(serde_json::json!({ "op": 42, "d": { "anything": true } }));
    conn.send(serde_json::json!({ "op": 9, "d": false }));
    conn.send(serde_json::json!({ "op": 11 }));
    conn.dispatch("GUILD_CREATE", 2, serde_json::json!({ "id": "1", "name": "g" }));

    eventually("sequence 2", || client.last_sequence() == 2).await;
    assert!(client.is_connected());
    assert_eq!(client.state(), SessionState::Active);

    client.disconnect().await.unwrap();
    assert_eq!(conn.expect_close().await, Some(1000));
}
