//! End-to-end tests for the chat server over TCP.

mod common;

use std::time::Duration;

use common::TestServer;
use parlor::config::RateLimitConfig;
use parlor::{CommandKind, Config};

const QUIET: Duration = Duration::from_millis(200);

#[tokio::test]
async fn test_message_reaches_other_members_only() {
    let server = TestServer::start().await;
    let mut first = server.connect().await;
    let mut second = server.connect().await;

    assert_eq!(first.command("/join general").await, "Welcome to general");
    assert_eq!(
        second.command("/name nick2").await,
        "Nickname changed to: nick2"
    );
    assert_eq!(second.command("/join general").await, "Welcome to general");
    first.expect_line("nick2 joined the room").await;

    second.send_line("/msg general hello").await.unwrap();

    first.expect_line("nick2: hello").await;
    second.expect_silence(QUIET).await;
}

#[tokio::test]
async fn test_usage_and_lookup_errors() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    assert!(client
        .command("/name")
        .await
        .starts_with("Error: nickname is required"));
    assert!(client
        .command("/join")
        .await
        .starts_with("Error: room name is required"));
    assert_eq!(
        client.command("/msg nowhere hello").await,
        "Error: room not found: nowhere"
    );
}

#[tokio::test]
async fn test_unknown_command_keeps_connection() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    assert_eq!(
        client.command("/dance").await,
        "Error: Unknown command: /dance"
    );
    assert_eq!(client.command("/rooms").await, "Rooms: no rooms available");
}

#[tokio::test]
async fn test_history_replayed_on_join() {
    let mut config = Config::default();
    config.chat.history_size = 3;
    let server = TestServer::start_with(config).await;

    let mut talker = server.connect().await;
    talker.command("/name talker").await;
    talker.command("/join lobby").await;
    for i in 1..=5 {
        talker.send_line(&format!("/msg lobby m{i}")).await.unwrap();
    }

    // Wait until every message has been recorded
    let deadline = tokio::time::Instant::now() + common::DEFAULT_TIMEOUT;
    loop {
        let snapshot = server.processor.snapshot().await.unwrap();
        if snapshot.commands_processed.get(&CommandKind::SendMessage) == Some(&5) {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "messages not processed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut late = server.connect().await;
    late.send_line("/join lobby").await.unwrap();
    late.expect_line("talker: m3").await;
    late.expect_line("talker: m4").await;
    late.expect_line("talker: m5").await;
    late.expect_line("Welcome to lobby").await;
}

#[tokio::test]
async fn test_switching_rooms() {
    let server = TestServer::start().await;
    let mut mover = server.connect().await;
    let mut stay_a = server.connect().await;
    let mut stay_b = server.connect().await;

    stay_a.command("/join a").await;
    stay_b.command("/join b").await;
    mover.command("/name mover").await;
    mover.command("/join a").await;
    stay_a.expect_line("mover joined the room").await;

    assert_eq!(mover.command("/join b").await, "Welcome to b");
    stay_a.expect_line("mover left the room").await;
    stay_b.expect_line("mover joined the room").await;

    stay_a.send_line("/msg a only a").await.unwrap();
    stay_b.send_line("/msg b only b").await.unwrap();
    mover.expect_line("Anonymous: only b").await;
    mover.expect_silence(QUIET).await;
}

#[tokio::test]
async fn test_quit_closes_connection() {
    let server = TestServer::start().await;
    let mut leaver = server.connect().await;
    let mut watcher = server.connect().await;

    leaver.command("/name leaver").await;
    leaver.command("/join general").await;
    watcher.command("/join general").await;
    leaver.expect_line("Anonymous joined the room").await;

    leaver.send_line("/quit").await.unwrap();
    leaver.expect_line("Goodbye!").await;
    assert_eq!(leaver.recv_line().await, None);

    watcher.expect_line("leaver left the room").await;
    server.wait_for_sessions(1).await;
}

#[tokio::test]
async fn test_abrupt_disconnect_is_cleaned_up() {
    let server = TestServer::start().await;
    let mut ghost = server.connect().await;
    let mut watcher = server.connect().await;

    ghost.command("/name ghost").await;
    ghost.command("/join general").await;
    watcher.command("/join general").await;

    drop(ghost);

    watcher.expect_line("ghost left the room").await;
    server.wait_for_sessions(1).await;

    let snapshot = server.processor.snapshot().await.unwrap();
    assert_eq!(snapshot.room("general").unwrap().members, 1);
}

#[tokio::test]
async fn test_room_listing_is_stable() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client.command("/join zeta").await;
    client.command("/join alpha").await;

    let first = client.command("/rooms").await;
    let second = client.command("/rooms").await;
    assert_eq!(first, "Rooms: alpha, zeta");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_default_config_processes_command_bursts() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client.send_raw("/rooms\n".repeat(25).as_bytes()).await.unwrap();

    for _ in 0..25 {
        client.expect_line("Rooms: no rooms available").await;
    }
}

#[tokio::test]
async fn test_rate_limit_rejects_excess_commands() {
    let mut config = Config::default();
    config.rate_limit = RateLimitConfig {
        enabled: true,
        burst: 3,
        per_second: 1,
    };
    let server = TestServer::start_with(config).await;
    let mut client = server.connect().await;

    client
        .send_raw(b"/rooms\n/rooms\n/rooms\n/rooms\n/rooms\n")
        .await
        .unwrap();

    let mut replies = Vec::new();
    for _ in 0..5 {
        replies.push(client.recv_line().await.unwrap());
    }
    let limited = replies
        .iter()
        .filter(|r| r.starts_with("Error: rate limit exceeded"))
        .count();
    assert_eq!(limited, 2);
}

#[tokio::test]
async fn test_max_connections_queues_extra_clients() {
    let mut config = Config::default();
    config.server.max_connections = 1;
    let server = TestServer::start_with(config).await;

    let mut first = server.connect().await;
    assert_eq!(first.command("/rooms").await, "Rooms: no rooms available");

    let mut second = server.connect().await;
    second.send_line("/rooms").await.unwrap();
    second.expect_silence(QUIET).await;

    first.send_line("/quit").await.unwrap();
    first.expect_line("Goodbye!").await;

    second.expect_line("Rooms: no rooms available").await;
}

#[tokio::test]
async fn test_concurrent_senders_all_delivered() {
    let server = TestServer::start().await;
    let mut listener = server.connect().await;
    listener.command("/join busy").await;

    let mut tasks = Vec::new();
    for n in 0..8 {
        let addr = server.addr;
        tasks.push(tokio::spawn(async move {
            let mut client = common::TestClient::connect(addr).await.unwrap();
            client.command(&format!("/name user{n}")).await;
            for i in 0..5 {
                client
                    .send_line(&format!("/msg busy hello {i}"))
                    .await
                    .unwrap();
            }
            // Keep the connection until the listener has read everything
            client
        }));
    }

    let mut clients = Vec::new();
    for task in tasks {
        clients.push(task.await.unwrap());
    }

    let mut received = 0;
    while received < 40 {
        let line = listener.recv_line().await.unwrap();
        assert!(line.starts_with("user"), "unexpected line {line}");
        received += 1;
    }

    let snapshot = server.processor.snapshot().await.unwrap();
    assert_eq!(snapshot.commands_processed[&CommandKind::SendMessage], 40);
    assert_eq!(snapshot.room("busy").unwrap().history_len, 5);
}
