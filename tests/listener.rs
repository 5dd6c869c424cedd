use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use rproxy::listener::{self, Listener};

#[tokio::test]
async fn try_accept_latest_is_empty_when_nothing_connects() {
    let listener = Listener::bind(0, 5).unwrap();
    assert!(listener.try_accept_latest(10).await.is_none());
}

#[tokio::test]
async fn try_accept_latest_reads_full_request_and_respond_writes_back() {
    let listener = Listener::bind(0, 5).unwrap();
    let addr = listener.local_addr().unwrap();

    let client = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();
        stream.shutdown().await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        out
    });

    let (request, handle) = loop {
        if let Some(pair) = listener.try_accept_latest(50).await {
            break pair;
        }
    };
    assert!(String::from_utf8_lossy(&request).starts_with("GET / HTTP/1.1"));

    listener::respond(handle, b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), client).await.unwrap().unwrap();
    assert_eq!(received, b"HTTP/1.1 200 OK\r\n\r\n");
}
