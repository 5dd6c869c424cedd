/// Listener (C3).
///
/// Accepts one client at a time with a bounded poll timeout and holds the
/// accepted socket until a response is written, then closes it. The
/// listening socket is configured with `SO_REUSEADDR`/`SO_REUSEPORT` and a
/// short per-connection receive timeout so a stuck client can never wedge
/// the accept path.
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Socket, Type};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// Bound on how long a single client read may straggle before the listener
/// gives up and forwards whatever has been read so far.
const CLIENT_READ_TIMEOUT: Duration = Duration::from_millis(200);
const READ_CHUNK: usize = 8192;

#[derive(Debug)]
pub enum ListenError {
    Bind(io::Error),
}

impl fmt::Display for ListenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenError::Bind(e) => write!(f, "failed to bind listening socket: {}", e),
        }
    }
}

impl std::error::Error for ListenError {}

/// The client socket handle produced by a successful accept, or the
/// sentinel used by health probes, which have no client to respond to.
pub enum ClientHandle {
    Client(TcpStream),
    Probe,
}

impl ClientHandle {
    pub fn is_probe(&self) -> bool {
        matches!(self, ClientHandle::Probe)
    }
}

pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Binds a listening socket on `port` with `SO_REUSEADDR`/`SO_REUSEPORT`
    /// set and a backlog equal to `connections_accepted`.
    pub fn bind(port: u16, connections_accepted: u32) -> Result<Listener, ListenError> {
        let addr: SocketAddr = (std::net::Ipv4Addr::UNSPECIFIED, port).into();
        let socket = Socket::new(Domain::IPV4, Type::STREAM, None).map_err(ListenError::Bind)?;
        socket.set_reuse_address(true).map_err(ListenError::Bind)?;
        #[cfg(unix)]
        socket.set_reuse_port(true).map_err(ListenError::Bind)?;
        socket.set_nonblocking(true).map_err(ListenError::Bind)?;
        socket.bind(&addr.into()).map_err(ListenError::Bind)?;
        socket
            .listen(connections_accepted as i32)
            .map_err(ListenError::Bind)?;
        let inner = TcpListener::from_std(socket.into()).map_err(ListenError::Bind)?;
        Ok(Listener { inner })
    }

    /// Polls for readiness for at most `timeout_ms`. If nothing is ready,
    /// returns `None` (`AcceptEmpty`). Otherwise accepts exactly one
    /// connection, reads the full request (until the peer half-closes or a
    /// short receive timeout elapses) and returns the bytes plus the
    /// client handle.
    pub async fn try_accept_latest(&self, timeout_ms: u64) -> Option<(Vec<u8>, ClientHandle)> {
        let (mut stream, _addr) = match timeout(Duration::from_millis(timeout_ms), self.inner.accept()).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(_)) | Err(_) => return None,
        };

        let request = read_full_request(&mut stream).await;
        Some((request, ClientHandle::Client(stream)))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

/// Reads until the peer half-closes its write side or `CLIENT_READ_TIMEOUT`
/// elapses, whichever comes first.
async fn read_full_request(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match timeout(CLIENT_READ_TIMEOUT, stream.read(&mut chunk)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
            Ok(Err(_)) | Err(_) => break,
        }
    }
    buf
}

/// Writes `bytes` in full, retrying partial sends, then releases the
/// handle by dropping it (closing the socket). A write failure is logged
/// by the caller; the handle is always released regardless of outcome.
pub async fn respond(handle: ClientHandle, bytes: &[u8]) -> Result<(), io::Error> {
    match handle {
        ClientHandle::Client(mut stream) => {
            let result = stream.write_all(bytes).await;
            let _ = stream.shutdown().await;
            result
        }
        ClientHandle::Probe => Ok(()),
    }
}

/// Releases a client handle without writing anything, closing the socket.
pub fn close_client(_handle: ClientHandle) {}
