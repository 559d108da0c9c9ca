//! Blocking Client Tests
//!
//! End-to-end tests against an in-process RCON server on loopback.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::thread;

use common::{test_config, FakeServer, RecordingSink, Reply, PASSWORD};
use rconlink::{Client, Config, Phase, RconError};

fn open(server: &FakeServer) -> Client {
    Client::open("127.0.0.1", server.port, PASSWORD, test_config()).unwrap()
}

// =============================================================================
// Happy Path Tests
// =============================================================================

#[test]
fn test_open_and_issue_command() {
    let server = FakeServer::echo();
    let client = open(&server);

    assert!(client.is_ready());
    assert_eq!(client.issue_command("list").unwrap(), "echo: list");
    assert_eq!(client.issue_command("time query").unwrap(), "echo: time query");
    assert_eq!(client.stats().commands_issued, 2);

    client.close().unwrap();
    assert_eq!(client.phase(), Phase::Closed);
}

#[test]
fn test_connect_then_authenticate() {
    let server = FakeServer::echo();
    let client = Client::new(test_config()).unwrap();
    assert_eq!(client.phase(), Phase::Disconnected);

    client.connect("127.0.0.1", server.port).unwrap();
    assert_eq!(client.phase(), Phase::Connected);

    client.authenticate(PASSWORD).unwrap();
    assert_eq!(client.phase(), Phase::Ready);
}

#[test]
fn test_large_response_reassembled() {
    let body = "0123456789".repeat(500);
    let expected = body.clone();
    // Three frames: 1700 + 1700 + 1600, then the sentinel echo
    let server = FakeServer::spawn(move |_| Reply::Chunked(body.clone(), 1700));
    let client = open(&server);

    let response = client.issue_command("help").unwrap();
    assert_eq!(response.len(), 5000);
    assert_eq!(response, expected);
    assert!(client.is_ready());
}

#[test]
fn test_body_larger_than_one_server_frame() {
    let body = "abcdefghij".repeat(500);
    let expected = body.clone();
    let server = FakeServer::spawn(move |_| Reply::Text(body.clone()));
    let client = open(&server);

    // 4096 + 904 bytes
    assert_eq!(client.issue_command("help").unwrap(), expected);
}

#[test]
fn test_many_small_fragments() {
    let body: String = (0..300).map(|i| format!("line {}\n", i)).collect();
    let expected = body.clone();
    let server = FakeServer::spawn(move |_| Reply::Chunked(body.clone(), 7));
    let client = open(&server);

    assert_eq!(client.issue_command("dump").unwrap(), expected);
}

#[test]
fn test_multibyte_text_across_fragments() {
    let body = "§6Gold §r ünïcödé ✓ ".repeat(50);
    let expected = body.clone();
    // An odd chunk size splits multi-byte characters between frames
    let server = FakeServer::spawn(move |_| Reply::Chunked(body.clone(), 5));
    let client = open(&server);

    assert_eq!(client.issue_command("motd").unwrap(), expected);
}

#[test]
fn test_empty_response() {
    let server = FakeServer::spawn(|_| Reply::Text(String::new()));
    let client = open(&server);

    assert_eq!(client.issue_command("save-all").unwrap(), "");
    assert!(client.is_ready());
}

#[test]
fn test_auth_with_pre_ack() {
    let server = FakeServer::spawn_with(PASSWORD, true, |cmd| Reply::Text(cmd.to_uppercase()));
    let client = open(&server);

    assert_eq!(client.issue_command("seed").unwrap(), "SEED");
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_bad_password() {
    let server = FakeServer::echo();
    let client = Client::new(test_config()).unwrap();
    client.connect("127.0.0.1", server.port).unwrap();

    let err = client.authenticate("not-the-password").unwrap_err();
    assert!(err.is_auth_failure());
    assert!(!client.is_ready());

    assert!(matches!(
        client.issue_command("list"),
        Err(RconError::SessionClosed)
    ));
}

#[test]
fn test_open_with_bad_password() {
    let server = FakeServer::echo();
    let result = Client::open("127.0.0.1", server.port, "nope", test_config());
    assert!(matches!(result, Err(RconError::Authentication)));
}

#[test]
fn test_connection_refused() {
    // Bind then drop to find a port nobody listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = Client::open("127.0.0.1", port, PASSWORD, test_config())
        .err()
        .unwrap();
    assert!(err.is_connection_failure(), "got {:?}", err);
}

#[test]
fn test_peer_closes_mid_response() {
    let server = FakeServer::spawn(|_| Reply::DropAfter("x".repeat(300), 100, 2));
    let client = open(&server);

    assert!(matches!(
        client.issue_command("list"),
        Err(RconError::ConnectionClosed)
    ));
    assert_eq!(client.phase(), Phase::Failed);
    assert!(matches!(
        client.issue_command("list"),
        Err(RconError::SessionClosed)
    ));
}

#[test]
fn test_command_timeout() {
    let server = FakeServer::spawn(|_| Reply::Silent);
    let config = Config::builder()
        .timeout_ms(2_000)
        .command_timeout_ms(200)
        .build();
    let client = Client::open("127.0.0.1", server.port, PASSWORD, config).unwrap();

    assert!(matches!(client.issue_command("hang"), Err(RconError::Timeout)));
    assert_eq!(client.phase(), Phase::Failed);
}

#[test]
fn test_stray_id_is_protocol_error() {
    let server = FakeServer::spawn(|_| Reply::StrayId(999));
    let client = open(&server);

    assert!(matches!(
        client.issue_command("list"),
        Err(RconError::Protocol(_))
    ));
    assert_eq!(client.phase(), Phase::Failed);
}

#[test]
fn test_invalid_config_rejected() {
    let config = Config::builder().first_request_id(0).build();
    assert!(matches!(Client::new(config), Err(RconError::Config(_))));
}

// =============================================================================
// Sharing Tests
// =============================================================================

#[test]
fn test_independent_clients_in_parallel() {
    let server = FakeServer::spawn(|cmd| Reply::Chunked(cmd.repeat(200), 64));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let port = server.port;
            thread::spawn(move || {
                let client = Client::open("127.0.0.1", port, PASSWORD, test_config()).unwrap();
                for round in 0..10 {
                    let command = format!("c{}r{};", i, round);
                    let response = client.issue_command(&command).unwrap();
                    assert_eq!(response, command.repeat(200));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_shared_client_never_mixes_responses() {
    let server = FakeServer::spawn(|cmd| Reply::Chunked(cmd.repeat(50), 16));
    let client = Arc::new(open(&server));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                let mut completed = 0u64;
                for round in 0..50 {
                    let command = format!("t{}-{};", i, round);
                    match client.issue_command(&command) {
                        Ok(response) => {
                            assert_eq!(response, command.repeat(50));
                            completed += 1;
                        }
                        Err(RconError::SessionBusy) => thread::yield_now(),
                        Err(e) => panic!("unexpected error: {:?}", e),
                    }
                }
                completed
            })
        })
        .collect();

    let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(client.stats().commands_issued, total);
    assert!(client.is_ready());
}

// =============================================================================
// Audit Tests
// =============================================================================

#[test]
fn test_audit_sink_receives_completed_commands() {
    let server = FakeServer::echo();
    let sink = Arc::new(RecordingSink::default());
    let client = open(&server).with_audit(sink.clone());

    client.issue_command("list").unwrap();
    client.issue_command("seed").unwrap();

    let records = sink.records.lock();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].command, "list");
    assert_eq!(records[0].response, "echo: list");
    assert_eq!(records[1].command, "seed");
    assert!(records[1].timestamp > 0.0);
}

#[test]
fn test_failed_command_not_audited() {
    let server = FakeServer::spawn(|_| Reply::StrayId(5));
    let sink = Arc::new(RecordingSink::default());
    let client = open(&server).with_audit(sink.clone());

    assert!(client.issue_command("list").is_err());
    assert!(sink.records.lock().is_empty());
}
