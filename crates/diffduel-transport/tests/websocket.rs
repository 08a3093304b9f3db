//! Integration tests: a real client socket against the transport.

use diffduel_transport::WebSocketTransport;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

async fn bind_local() -> (WebSocketTransport, String) {
    let transport = WebSocketTransport::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = transport.local_addr().expect("local addr");
    (transport, format!("ws://{addr}"))
}

#[tokio::test]
async fn test_accept_and_receive_text_frame() {
    let (mut transport, url) = bind_local().await;

    let client = tokio::spawn(async move {
        let (mut ws, _) =
            tokio_tungstenite::connect_async(url).await.expect("connect");
        ws.send(Message::Text("hello".into())).await.expect("send");
        ws
    });

    let conn = transport.accept().await.expect("accept");
    let (_, _tx, mut rx) = conn.into_split();

    let data = rx.recv().await.expect("recv").expect("frame");
    assert_eq!(data, b"hello");

    client.await.unwrap();
}

#[tokio::test]
async fn test_send_reaches_client_as_text() {
    let (mut transport, url) = bind_local().await;

    let client = tokio::spawn(async move {
        let (mut ws, _) =
            tokio_tungstenite::connect_async(url).await.expect("connect");
        let msg = ws.next().await.expect("frame").expect("ok");
        match msg {
            Message::Text(text) => assert_eq!(text.as_str(), r#"{"a":1}"#),
            other => panic!("expected text frame, got {other:?}"),
        }
    });

    let conn = transport.accept().await.expect("accept");
    let (_, mut tx, _rx) = conn.into_split();
    tx.send(br#"{"a":1}"#).await.expect("send");

    client.await.unwrap();
}

#[tokio::test]
async fn test_clean_close_yields_none() {
    let (mut transport, url) = bind_local().await;

    let client = tokio::spawn(async move {
        let (mut ws, _) =
            tokio_tungstenite::connect_async(url).await.expect("connect");
        ws.close(None).await.expect("close");
    });

    let conn = transport.accept().await.expect("accept");
    let (_, _tx, mut rx) = conn.into_split();

    let frame = rx.recv().await.expect("recv should not error");
    assert!(frame.is_none(), "clean close should yield None");

    client.await.unwrap();
}

#[tokio::test]
async fn test_connection_ids_are_unique() {
    let (mut transport, url) = bind_local().await;

    let url2 = url.clone();
    let c1 = tokio::spawn(async move {
        tokio_tungstenite::connect_async(url).await.expect("connect")
    });
    let conn1 = transport.accept().await.expect("accept");
    let c2 = tokio::spawn(async move {
        tokio_tungstenite::connect_async(url2).await.expect("connect")
    });
    let conn2 = transport.accept().await.expect("accept");

    assert_ne!(conn1.id(), conn2.id());

    c1.await.unwrap();
    c2.await.unwrap();
}
