//! Integration tests for the TCP transport.
//!
//! These spin up a real listener on a random loopback port and verify
//! that bytes flow both ways through the split connection.

use gamechannel_transport::{TcpOptions, TcpTransport, Transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[tokio::test]
async fn test_tcp_accept_and_exchange() {
    let mut transport = TcpTransport::bind("127.0.0.1:0", TcpOptions::default())
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("local addr");

    let server = tokio::spawn(async move {
        transport.accept().await.expect("should accept")
    });

    let mut client = TcpStream::connect(addr).await.expect("connect");
    let mut conn = server.await.expect("task should complete");

    assert_eq!(conn.peer, client.local_addr().unwrap());
    assert_eq!(conn.sink.peer_addr(), conn.peer);

    // Client → server through the buffered reader.
    client.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    conn.reader.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    // Server → client through the sink.
    conn.sink.send(b"pong").await.expect("send");
    let mut buf = [0u8; 4];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"pong");
}

#[tokio::test]
async fn test_sink_close_ends_peer_stream() {
    let mut transport = TcpTransport::bind("127.0.0.1:0", TcpOptions::default())
        .await
        .expect("should bind");
    let addr = transport.local_addr().unwrap();

    let server = tokio::spawn(async move { transport.accept().await.unwrap() });
    let mut client = TcpStream::connect(addr).await.unwrap();
    let conn = server.await.unwrap();

    conn.sink.close().await;

    let mut buf = Vec::new();
    let n = client.read_to_end(&mut buf).await.unwrap();
    assert_eq!(n, 0, "peer should observe end of stream");
    assert!(conn.sink.is_closed());
}

#[tokio::test]
async fn test_accept_serves_multiple_connections() {
    let mut transport = TcpTransport::bind("127.0.0.1:0", TcpOptions::default())
        .await
        .unwrap();
    let addr = transport.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let a = transport.accept().await.unwrap();
        let b = transport.accept().await.unwrap();
        (a.peer, b.peer)
    });

    let c1 = TcpStream::connect(addr).await.unwrap();
    let c2 = TcpStream::connect(addr).await.unwrap();
    let (p1, p2) = server.await.unwrap();

    assert_ne!(p1, p2);
    let mut expected = vec![c1.local_addr().unwrap(), c2.local_addr().unwrap()];
    let mut got = vec![p1, p2];
    expected.sort();
    got.sort();
    assert_eq!(got, expected);
}
