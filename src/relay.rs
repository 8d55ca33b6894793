//! The duplex copy engine.
//!
//! A relayed connection is two copy legs running concurrently, one per
//! direction. The legs are raced, not joined: whichever stops first, on
//! EOF or error, settles the whole connection, and returning drops both
//! streams. That is what unblocks the other leg's pending read or write
//! and closes both sockets together.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bytes moved per read before the chunk is drained into the other side.
pub const CHUNK_SIZE: usize = 8192;

/// One of the two copy legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    /// client to server
    Up,
    /// server to client
    Down,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("client"),
            Self::Down => f.write_str("server"),
        }
    }
}

/// How a relayed connection ended.
#[derive(Debug)]
pub struct Finished {
    /// The leg that stopped first.
    pub leg: Leg,
    /// `Ok` for a clean EOF, the I/O error otherwise.
    pub cause: io::Result<()>,
    /// Bytes moved client to server.
    pub up: u64,
    /// Bytes moved server to client.
    pub down: u64,
}

/// Copy bytes both ways between `client` and `server` until either side
/// stops, then tear the whole connection down.
pub async fn splice<C, S>(client: C, server: S) -> Finished
where
    C: AsyncRead + AsyncWrite + Unpin,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (client_rx, client_tx) = tokio::io::split(client);
    let (server_rx, server_tx) = tokio::io::split(server);

    let up = AtomicU64::new(0);
    let down = AtomicU64::new(0);

    let up_leg = copy_chunks(client_rx, server_tx, &up);
    let down_leg = copy_chunks(server_rx, client_tx, &down);

    let (leg, cause) = tokio::select! {
        r = up_leg => (Leg::Up, r),
        r = down_leg => (Leg::Down, r),
    };

    Finished {
        leg,
        cause,
        up: up.load(Ordering::Relaxed),
        down: down.load(Ordering::Relaxed),
    }
}

/// One leg: read a chunk, drain it fully into the destination, count it,
/// repeat. A zero-length read is a clean EOF. Interrupted reads are
/// retried in place, they end nothing.
async fn copy_chunks<R, W>(mut src: R, mut dst: W, copied: &AtomicU64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match src.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        dst.write_all(&buf[..n]).await?;
        copied.fetch_add(n as u64, Ordering::Relaxed);
    }
}
