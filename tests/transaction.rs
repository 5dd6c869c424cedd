use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use rproxy::backend::Pool;
use rproxy::listener::ClientHandle;
use rproxy::transaction::TransactionManager;

/// Builds a connected loopback pair: the half handed to the transaction as
/// the "client" handle, and the half the test reads the eventual response
/// back from.
async fn client_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connect = TcpStream::connect(addr);
    let (accepted, connected) = tokio::join!(listener.accept(), connect);
    (accepted.unwrap().0, connected.unwrap())
}

async fn reap_until<F: Fn(&TransactionManager, &VecDeque<rproxy::transaction::FailureRecord>) -> bool>(
    manager: &mut TransactionManager,
    pool: &Pool,
    failure_queue: &mut VecDeque<rproxy::transaction::FailureRecord>,
    done: F,
) {
    for _ in 0..200 {
        manager.reap(pool, 3, failure_queue).await;
        if done(manager, failure_queue) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("transaction did not resolve in time");
}

#[tokio::test]
async fn successful_reply_marks_backend_active_and_writes_to_client() {
    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut sock, _) = upstream.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = sock.read(&mut buf).await.unwrap();
        sock.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();
    });

    let pool = Arc::new(Pool::new());
    pool.add(upstream_addr.ip().to_string(), upstream_addr.port(), 1, None).await;
    pool.write().await[0].inactive = true;

    let (server_side, mut client_side) = client_pair().await;
    let mut manager = TransactionManager::new();
    manager.dispatch(
        pool.clone(),
        0,
        ClientHandle::Client(server_side),
        b"GET / HTTP/1.1\r\n\r\n".to_vec(),
        0,
    );

    let mut failure_queue = VecDeque::new();
    reap_until(&mut manager, &pool, &mut failure_queue, |m, _| m.live_count() == 0).await;

    assert!(failure_queue.is_empty());
    assert!(!pool.read().await[0].inactive);

    let mut out = Vec::new();
    client_side.read_to_end(&mut out).await.unwrap();
    assert!(String::from_utf8(out).unwrap().starts_with("HTTP/1.1 200 OK"));
}

#[tokio::test]
async fn failure_within_retry_budget_is_queued_with_incremented_attempt() {
    let pool = Arc::new(Pool::new());
    // Nothing listens here; connect fails immediately.
    pool.add("127.0.0.1".to_string(), 1, 1, None).await;

    let (server_side, _client_side) = client_pair().await;
    let mut manager = TransactionManager::new();
    manager.dispatch(
        pool.clone(),
        0,
        ClientHandle::Client(server_side),
        b"GET / HTTP/1.1\r\n\r\n".to_vec(),
        0,
    );

    let mut failure_queue = VecDeque::new();
    reap_until(&mut manager, &pool, &mut failure_queue, |_, q| !q.is_empty()).await;

    assert_eq!(failure_queue.len(), 1);
    assert_eq!(failure_queue.pop_front().unwrap().attempt, 1);
    assert!(pool.read().await[0].inactive);
}

#[tokio::test]
async fn failure_past_retry_budget_writes_503_to_client() {
    let pool = Arc::new(Pool::new());
    pool.add("127.0.0.1".to_string(), 1, 1, None).await;

    let (server_side, mut client_side) = client_pair().await;
    let mut manager = TransactionManager::new();
    manager.dispatch(
        pool.clone(),
        0,
        ClientHandle::Client(server_side),
        b"GET / HTTP/1.1\r\n\r\n".to_vec(),
        3, // attempt == max_retries(3): no retry budget left
    );

    let mut failure_queue = VecDeque::new();
    reap_until(&mut manager, &pool, &mut failure_queue, |m, _| m.live_count() == 0).await;

    assert!(failure_queue.is_empty());
    let mut out = Vec::new();
    client_side.read_to_end(&mut out).await.unwrap();
    assert!(String::from_utf8(out).unwrap().starts_with("HTTP/1.1 503 Service Unavailable"));
}

#[tokio::test]
async fn probe_never_touches_failure_queue_or_client_and_clears_probing() {
    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut sock, _) = upstream.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = sock.read(&mut buf).await.unwrap();
        sock.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();
    });

    let pool = Arc::new(Pool::new());
    pool.add(upstream_addr.ip().to_string(), upstream_addr.port(), 1, None).await;
    pool.write().await[0].probing = true;

    let mut manager = TransactionManager::new();
    manager.dispatch(pool.clone(), 0, ClientHandle::Probe, b"HEAD / HTTP/1.1\r\n\r\n".to_vec(), 0);

    let mut failure_queue = VecDeque::new();
    reap_until(&mut manager, &pool, &mut failure_queue, |m, _| m.live_count() == 0).await;

    assert!(failure_queue.is_empty());
    let backend = &pool.read().await[0];
    assert!(!backend.probing);
    assert!(!backend.inactive);
}
