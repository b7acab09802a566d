//! Snapshot server: one KML document per TCP connection.
//!
//! The request is read up to the blank line ending its header block and
//! otherwise ignored. Every connection gets the same fixed HTTP/1.0 200
//! response with the current registry snapshot, then the socket is closed.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use ais_core::kml::render_kml;
use ais_core::registry::VesselRegistry;

use crate::supervise;

/// Status line and headers sent ahead of every document.
pub const RESPONSE_HEAD: &str =
    "HTTP/1.0 200 OK\r\nContent-Type: text/xml; charset=\"UTF-8\"\r\n\r\n";

/// Largest request header block read before answering anyway.
const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Accept connections forever, serving each on its own supervised task.
pub async fn serve(listener: TcpListener, registry: Arc<VesselRegistry>) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!(%peer, "connection accepted");
        let registry = Arc::clone(&registry);
        supervise::spawn(
            format!("conn-{peer}"),
            connection_worker(peer, handle_connection(stream, peer, registry)),
        );
    }
}

/// Run one connection. I/O errors are logged at debug; only panics reach
/// the supervisor.
async fn connection_worker<F>(peer: SocketAddr, work: F) -> Result<(), Infallible>
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = work.await {
        tracing::debug!(%peer, error = %e, "connection closed early");
    }
    Ok(())
}

/// Serve one request/response exchange.
pub async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<VesselRegistry>,
) -> std::io::Result<()> {
    discard_request(&mut stream).await?;

    let body = render_kml(&registry.snapshot(Utc::now()));
    stream.write_all(RESPONSE_HEAD.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await?;
    stream.shutdown().await?;

    tracing::debug!(%peer, bytes = body.len(), "snapshot sent");
    Ok(())
}

/// Read until the end of the request header block, end of stream, or the
/// size cap, whichever comes first.
async fn discard_request(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut seen: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        seen.extend_from_slice(&chunk[..n]);
        if header_complete(&seen) || seen.len() >= MAX_REQUEST_BYTES {
            return Ok(());
        }
    }
}

/// True once `data` holds a terminated empty line. CRLF and bare LF
/// endings may be mixed.
fn header_complete(data: &[u8]) -> bool {
    data.split_inclusive(|&b| b == b'\n')
        .any(|line| line == b"\n" || line == b"\r\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
