// End-to-end tests over TCP

use mudrelay::relay::*;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

struct TestRelay {
    addr: SocketAddr,
    broker: Broker,
    shutdown: CancellationToken,
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_relay() -> TestRelay {
    let config = RelayConfig {
        addr: "127.0.0.1:0".parse().unwrap(),
        poll_interval: Duration::from_millis(20),
        ..RelayConfig::default()
    };

    let server = RelayServer::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let broker = server.broker().clone();
    let shutdown = CancellationToken::new();
    tokio::spawn(server.run(shutdown.clone()));

    TestRelay {
        addr,
        broker,
        shutdown,
    }
}

async fn read_response(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> Response {
    let line = tokio::time::timeout(WAIT, lines.next_line())
        .await
        .expect("timed out waiting for response")
        .unwrap()
        .expect("connection closed");
    serde_json::from_str(&line).unwrap()
}

async fn next_frame(subscription: &mut Subscription) -> Option<String> {
    tokio::time::timeout(WAIT, subscription.next_frame())
        .await
        .expect("timed out waiting for frame")
        .unwrap()
}

fn remote_kind(err: &anyhow::Error) -> ErrorKind {
    err.downcast_ref::<RemoteError>()
        .expect("expected a relay error response")
        .kind
}

#[tokio::test]
async fn test_handshake_post_and_stream() {
    let relay = start_relay().await;

    let mut alice = RelayClient::connect(relay.addr).await.unwrap();
    let reply = alice.handshake("alice", "").await.unwrap();
    assert_eq!(reply.name, "alice");

    alice.post(&reply.token, "hi").await.unwrap();

    let mut subscription = RelayClient::connect(relay.addr)
        .await
        .unwrap()
        .subscribe(&reply.token)
        .await
        .unwrap();

    assert_eq!(next_frame(&mut subscription).await.as_deref(), Some("hi"));
}

#[tokio::test]
async fn test_room_broadcast_between_clients() {
    let relay = start_relay().await;

    let mut alice = RelayClient::connect(relay.addr).await.unwrap();
    let mut bob = RelayClient::connect(relay.addr).await.unwrap();
    let alice_token = alice.handshake("alice", "").await.unwrap().token;
    let bob_token = bob.handshake("bob", "").await.unwrap().token;

    let mut bob_stream = RelayClient::connect(relay.addr)
        .await
        .unwrap()
        .subscribe(&bob_token)
        .await
        .unwrap();

    alice.post(&alice_token, "one").await.unwrap();
    alice.post(&alice_token, "two").await.unwrap();
    bob.post(&bob_token, "three").await.unwrap();

    assert_eq!(next_frame(&mut bob_stream).await.as_deref(), Some("one"));
    assert_eq!(next_frame(&mut bob_stream).await.as_deref(), Some("two"));
    assert_eq!(next_frame(&mut bob_stream).await.as_deref(), Some("three"));
}

#[tokio::test]
async fn test_forged_post_rejected() {
    let relay = start_relay().await;

    let mut alice = RelayClient::connect(relay.addr).await.unwrap();
    let token = alice.handshake("alice", "").await.unwrap().token;
    let mut stream = RelayClient::connect(relay.addr)
        .await
        .unwrap()
        .subscribe(&token)
        .await
        .unwrap();

    let forged = TokenCodec::new(b"wrong-secret").sign("mallory", "s1").unwrap();
    let err = alice.post(&forged, "x").await.unwrap_err();
    assert_eq!(remote_kind(&err), ErrorKind::Authentication);

    // The connection stays usable and "x" never shows up
    alice.post(&token, "after").await.unwrap();
    assert_eq!(next_frame(&mut stream).await.as_deref(), Some("after"));
}

#[tokio::test]
async fn test_stream_for_unknown_session() {
    let relay = start_relay().await;
    let token = TokenCodec::default().sign("ghost", "unknown-session").unwrap();

    let result = RelayClient::connect(relay.addr)
        .await
        .unwrap()
        .subscribe(&token)
        .await;

    match result {
        Ok(_) => panic!("stream opened for an unknown session"),
        Err(err) => assert_eq!(remote_kind(&err), ErrorKind::SessionNotFound),
    }
}

#[tokio::test]
async fn test_stream_with_forged_token() {
    let relay = start_relay().await;

    let result = RelayClient::connect(relay.addr)
        .await
        .unwrap()
        .subscribe("a.b.c")
        .await;

    match result {
        Ok(_) => panic!("stream opened with a forged token"),
        Err(err) => assert_eq!(remote_kind(&err), ErrorKind::Authentication),
    }
}

#[tokio::test]
async fn test_close_stream() {
    let relay = start_relay().await;

    let mut alice = RelayClient::connect(relay.addr).await.unwrap();
    let token = alice.handshake("alice", "").await.unwrap().token;
    let mut stream = RelayClient::connect(relay.addr)
        .await
        .unwrap()
        .subscribe(&token)
        .await
        .unwrap();

    stream.close().await.unwrap();
    assert_eq!(next_frame(&mut stream).await, None);
}

#[tokio::test]
async fn test_token_refresh_over_wire() {
    let relay = start_relay().await;

    let mut alice = RelayClient::connect(relay.addr).await.unwrap();
    let first = alice.handshake("alice", "").await.unwrap();
    let refreshed = alice.handshake("alice", &first.token).await.unwrap();

    let codec = TokenCodec::default();
    assert_eq!(
        codec.verify(&first.token).unwrap().session_id,
        codec.verify(&refreshed.token).unwrap().session_id
    );

    alice.ping().await.unwrap();
}

#[tokio::test]
async fn test_invalid_request_line() {
    let relay = start_relay().await;

    let stream = TcpStream::connect(relay.addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    write_half.write_all(b"not json\n").await.unwrap();

    let line = tokio::time::timeout(WAIT, lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let response: Response = serde_json::from_str(&line).unwrap();

    assert!(matches!(
        response,
        Response::Error {
            kind: ErrorKind::InvalidRequest,
            ..
        }
    ));
}

#[tokio::test]
async fn test_second_stream_replaces_first() {
    let relay = start_relay().await;
    let first = relay.broker.handshake().handle("alice", "").await.unwrap();
    let second = relay.broker.handshake().handle("bob", "").await.unwrap();
    let first_id = relay.broker.codec().verify(&first.token).unwrap().session_id;

    let stream = TcpStream::connect(relay.addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let open_first = serde_json::to_string(&Request::OpenStream { token: first.token }).unwrap();
    let open_second = serde_json::to_string(&Request::OpenStream { token: second.token.clone() }).unwrap();
    write_half
        .write_all(format!("{}\n{}\n", open_first, open_second).as_bytes())
        .await
        .unwrap();

    // The replaced stream reports its end before the new one starts
    assert_eq!(read_response(&mut lines).await, Response::StreamOpened);
    assert_eq!(read_response(&mut lines).await, Response::StreamClosed);
    assert_eq!(read_response(&mut lines).await, Response::StreamOpened);

    relay.broker.post().handle(&second.token, "for everyone").await.unwrap();
    assert_eq!(
        read_response(&mut lines).await,
        Response::Frame {
            text: "for everyone".to_string()
        }
    );

    // Only the second stream is live; the first session keeps its copy
    let extra = tokio::time::timeout(Duration::from_millis(200), lines.next_line()).await;
    assert!(extra.is_err(), "unexpected line: {:?}", extra);
    assert_eq!(
        relay.broker.store().drain(&first_id).await.unwrap(),
        vec!["for everyone"]
    );
}

#[tokio::test]
async fn test_dropped_connection_ends_stream() {
    let relay = start_relay().await;

    let mut alice = RelayClient::connect(relay.addr).await.unwrap();
    let token = alice.handshake("alice", "").await.unwrap().token;
    let session_id = relay.broker.codec().verify(&token).unwrap().session_id;

    let subscription = RelayClient::connect(relay.addr)
        .await
        .unwrap()
        .subscribe(&token)
        .await
        .unwrap();
    drop(subscription);

    // Give the relay several poll intervals to notice the closed connection
    tokio::time::sleep(Duration::from_millis(200)).await;
    alice.post(&token, "while away").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Nothing drained the mailbox and the session survived
    assert_eq!(relay.broker.store().len().await, 1);
    assert!(relay.broker.store().lookup(&session_id).await.is_ok());

    let mut again = RelayClient::connect(relay.addr)
        .await
        .unwrap()
        .subscribe(&token)
        .await
        .unwrap();
    assert_eq!(next_frame(&mut again).await.as_deref(), Some("while away"));

    alice.ping().await.unwrap();
}
