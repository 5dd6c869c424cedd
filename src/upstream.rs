/// Upstream client (C2).
///
/// One independent TCP round-trip per call: connect, write all bytes, read
/// until the peer closes its write side or the receive timeout elapses.
/// Never surfaces an error type the caller has to unwrap into more than
/// "this attempt failed" — connect/send/recv failures and an empty reply all
/// collapse to [`UpstreamError`].
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Receive timeout floor recommended by §4.2.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, PartialEq, Eq)]
pub enum UpstreamError {
    Connect,
    Send,
    Recv,
    EmptyReply,
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamError::Connect => write!(f, "failed to connect to upstream"),
            UpstreamError::Send => write!(f, "failed to send request to upstream"),
            UpstreamError::Recv => write!(f, "failed to read reply from upstream"),
            UpstreamError::EmptyReply => write!(f, "upstream closed without sending any bytes"),
        }
    }
}

impl std::error::Error for UpstreamError {}

/// Opens a fresh connection to `addr`, writes `request` in full, and reads
/// the accumulated reply until the peer half-closes or `RECEIVE_TIMEOUT`
/// elapses. The socket is always closed on return (dropped at the end of
/// the call); there is no connection pooling or reuse.
pub async fn query(addr: SocketAddr, request: &[u8]) -> Result<Vec<u8>, UpstreamError> {
    let mut stream = TcpStream::connect(addr).await.map_err(|_| UpstreamError::Connect)?;

    stream.write_all(request).await.map_err(|_| UpstreamError::Send)?;

    let mut reply = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match timeout(RECEIVE_TIMEOUT, stream.read(&mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(read)) => reply.extend_from_slice(&buf[..read]),
            Ok(Err(_)) => return Err(UpstreamError::Recv),
            Err(_) => break,
        }
    }

    if reply.is_empty() {
        return Err(UpstreamError::EmptyReply);
    }
    Ok(reply)
}
