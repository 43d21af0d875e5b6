//! TCP adapter tests: newline framing and a full handshake over a socket.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use objlink_client::transport::tcp::TcpLineTransport;
use objlink_client::transport::Transport;
use objlink_client::Channel;

#[tokio::test]
async fn frames_cross_the_socket_line_by_line() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        write_half
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
        write_half.write_all(b"{\"type\":4}\n").await.unwrap();
        line
    });

    let transport = TcpLineTransport::connect(&addr.to_string()).await.unwrap();
    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let (notify, mut notified) = mpsc::unbounded_channel();
    let sink = received.clone();
    transport.register_message_handler(Box::new(move |msg: &str| {
        sink.lock().unwrap().push(msg.to_string());
        let _ = notify.send(());
    }));

    transport.send("{\"type\":3,\"id\":0}").unwrap();

    notified.recv().await.unwrap();
    notified.recv().await.unwrap();

    let echoed = server.await.unwrap();
    assert_eq!(echoed, "{\"type\":3,\"id\":0}");
    assert_eq!(
        *received.lock().unwrap(),
        vec![
            "{\"type\":3,\"id\":0}".to_string(),
            "{\"type\":4}".to_string()
        ]
    );
}

#[tokio::test]
async fn channel_handshake_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let init_line = lines.next_line().await.unwrap().unwrap();
        let init: serde_json::Value = serde_json::from_str(&init_line).unwrap();
        assert_eq!(init["type"], 3);
        assert_eq!(init["id"], 0);

        let response = r#"{"type":10,"id":0,"data":{"obj1":{"methods":[["ping",7]],"properties":[[1,"x",[1,3],42]],"signals":[],"enums":{}}}}"#;
        write_half
            .write_all(format!("{response}\n").as_bytes())
            .await
            .unwrap();

        let idle_line = lines.next_line().await.unwrap().unwrap();
        let idle: serde_json::Value = serde_json::from_str(&idle_line).unwrap();
        assert_eq!(idle["type"], 4);
    });

    let transport = TcpLineTransport::connect(&addr.to_string()).await.unwrap();
    let (ready, mut ready_rx) = mpsc::unbounded_channel();
    let channel = Channel::with_init(transport, move |_channel: &Arc<Channel>| {
        let _ = ready.send(());
    });

    ready_rx.recv().await.unwrap();
    server.await.unwrap();

    let obj1 = channel.object("obj1").expect("obj1 registered");
    assert_eq!(obj1.property("x").get::<i64>(), Some(42));
    assert!(obj1.signal_names().contains(&"xChanged".to_string()));
}
