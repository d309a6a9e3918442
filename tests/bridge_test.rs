use std::{sync::Arc, time::Duration};

use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream},
};

use wust_bridge::{
    BridgeClient, BridgeServer, ConnConfig, Dispatcher, Error, PING_PAYLOAD, PONG_PAYLOAD,
    ReadStrategy, TEXT_REQUIRED, UpgradeError,
    backend::MemoryBackend,
    frames::{Frame, Opcode},
    protocol::{KvBridge, SET_USAGE, UNKNOWN_COMMAND},
};

fn conn_config(read: ReadStrategy) -> ConnConfig {
    ConnConfig {
        read,
        read_timeout: Duration::from_secs(5),
        ..ConnConfig::default()
    }
}

// Starts a server on an ephemeral port and returns its ws:// url.
async fn start(dispatcher: Dispatcher, read: ReadStrategy) -> String {
    let server = BridgeServer::bind("127.0.0.1:0", dispatcher, conn_config(read))
        .await
        .unwrap();
    let url = format!("ws://{}/", server.local_addr().unwrap());
    tokio::spawn(server.run());
    url
}

async fn connect(dispatcher: Dispatcher) -> BridgeClient {
    let url = start(dispatcher, ReadStrategy::Deadline).await;
    BridgeClient::connect(&url).await.unwrap()
}

fn bridge() -> Dispatcher {
    Dispatcher::CommandBridge(KvBridge::new(Arc::new(MemoryBackend::new())))
}

async fn ask(ws: &mut BridgeClient, text: &str) -> String {
    ws.send_text(text).await.unwrap();
    let frame = ws.recv().await.unwrap();
    assert_eq!(frame.opcode, Opcode::Text);
    frame.as_text().unwrap().to_owned()
}

#[tokio::test]
async fn plain_echo_round_trip() {
    let mut ws = connect(Dispatcher::PlainEcho).await;
    for text in ["hello from wust-bridge!", "second", "üñíçødé"] {
        assert_eq!(ask(&mut ws, text).await, text);
    }
}

#[tokio::test]
async fn close_command_ends_session_without_reply() {
    let mut ws = connect(Dispatcher::PlainEcho).await;
    ws.send_text("close").await.unwrap();
    assert!(matches!(ws.recv().await, Err(Error::PeerClosed)));
}

#[tokio::test]
async fn large_payload_uses_extended_length() {
    let mut ws = connect(Dispatcher::TypedEcho).await;
    let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    ws.send_bytes(&payload).await.unwrap();
    let frame = ws.recv().await.unwrap();
    assert_eq!(frame, Frame::binary(payload));
}

#[tokio::test]
async fn typed_echo_control_frames() {
    let mut ws = connect(Dispatcher::TypedEcho).await;

    ws.send(Opcode::Ping, b"are you there").await.unwrap();
    assert_eq!(ws.recv().await.unwrap(), Frame::new(Opcode::Pong, PONG_PAYLOAD));

    ws.send(Opcode::Pong, b"").await.unwrap();
    assert_eq!(ws.recv().await.unwrap(), Frame::new(Opcode::Ping, PING_PAYLOAD));

    ws.send_bytes(&[0, 1, 2, 255]).await.unwrap();
    assert_eq!(ws.recv().await.unwrap(), Frame::binary(vec![0u8, 1, 2, 255]));

    assert_eq!(ask(&mut ws, "text stays text").await, "text stays text");
}

#[tokio::test]
async fn typed_echo_rejects_unsupported_opcode() {
    let mut ws = connect(Dispatcher::TypedEcho).await;
    ws.send(Opcode::Cont, b"fragment").await.unwrap();
    assert!(ws.recv().await.is_err());
}

#[tokio::test]
async fn bridge_set_then_get() {
    let mut ws = connect(bridge()).await;
    assert_eq!(
        ask(&mut ws, "SET foo bar").await,
        "Successfully set foo to bar, retrieve it using GET foo"
    );
    assert_eq!(ask(&mut ws, "GET foo").await, "bar");
}

#[tokio::test]
async fn bridge_errors_keep_connection_open() {
    let mut ws = connect(bridge()).await;
    assert_eq!(
        ask(&mut ws, "GET missingkey").await,
        "[ERROR]: No value for key missingkey, try giving it a value"
    );
    assert_eq!(ask(&mut ws, "SET foo").await, SET_USAGE);
    assert_eq!(ask(&mut ws, "FOO bar").await, UNKNOWN_COMMAND);

    ws.send_bytes(b"GET foo").await.unwrap();
    assert_eq!(ws.recv().await.unwrap(), Frame::text(TEXT_REQUIRED));

    assert!(ask(&mut ws, "SET k v").await.starts_with("Successfully"));
    assert_eq!(ask(&mut ws, "GET k").await, "v");
}

#[tokio::test]
async fn bridge_backend_is_shared_between_connections() {
    let url = start(bridge(), ReadStrategy::Deadline).await;
    let mut writer = BridgeClient::connect(&url).await.unwrap();
    let mut reader = BridgeClient::connect(&url).await.unwrap();
    ask(&mut writer, "SET shared yes").await;
    assert_eq!(ask(&mut reader, "GET shared").await, "yes");
}

#[tokio::test]
async fn idle_poll_mode_serves_requests() {
    let url = start(
        Dispatcher::PlainEcho,
        ReadStrategy::IdlePoll(Duration::from_millis(20)),
    )
    .await;
    let mut ws = BridgeClient::connect(&url).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ask(&mut ws, "after a pause").await, "after a pause");
    ws.send_text("close").await.unwrap();
    assert!(matches!(ws.recv().await, Err(Error::PeerClosed)));
}

#[tokio::test]
async fn connect_rejects_bad_url() {
    assert!(BridgeClient::connect("http://127.0.0.1:1/").await.is_err());
    assert!(BridgeClient::connect("not a url").await.is_err());
}

#[tokio::test]
async fn silent_socket_is_dropped_after_read_timeout() {
    let cfg = ConnConfig {
        read: ReadStrategy::Deadline,
        read_timeout: Duration::from_millis(100),
        ..ConnConfig::default()
    };
    let server = BridgeServer::bind("127.0.0.1:0", Dispatcher::PlainEcho, cfg)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let mut socket = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(2), socket.read(&mut buf))
        .await
        .expect("server should hang up on a silent socket")
        .unwrap_or(0);
    assert_eq!(n, 0);
}

#[tokio::test]
async fn connect_timeout_gives_up_on_mute_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());
    // accepts but never answers the upgrade
    let _hold = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let res = BridgeClient::connect_timeout(&url, Duration::from_millis(100)).await;
    assert!(matches!(res, Err(UpgradeError::Timeout)));
}
