use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket};

use crate::config::{Family, ListenAddr};

use super::{is_family_error, resolve};

/// Pending-connection backlog passed to listen(2).
const BACKLOG: u32 = 10;

/// A listening socket, together with the family that actually got bound.
/// After a fallback it may not be the family that was asked for.
#[derive(Debug)]
pub struct Bound {
    pub listener: TcpListener,
    pub local: SocketAddr,
    pub family: Family,
}

#[derive(Debug, Error)]
#[error("cannot listen on {addr}: {source}")]
pub struct BindError {
    addr: ListenAddr,
    source: io::Error,
}

/// Bind and listen on `addr`, preferring `family`. A failure that stems
/// from the family itself is retried once with no preference.
pub async fn bind(addr: &ListenAddr, family: Family) -> Result<Bound, BindError> {
    let attempt = async move |family| bind_family(addr, family).await;

    let listener = bind_with_fallback(family, attempt)
        .await
        .map_err(|source| BindError {
            addr: addr.clone(),
            source,
        })?;

    let local = listener.local_addr().map_err(|source| BindError {
        addr: addr.clone(),
        source,
    })?;

    Ok(Bound {
        family: Family::of(&local),
        listener,
        local,
    })
}

async fn bind_with_fallback<T, F>(preferred: Family, mut attempt: F) -> io::Result<T>
where
    F: AsyncFnMut(Family) -> io::Result<T>,
{
    let err = match attempt(preferred).await {
        Ok(x) => return Ok(x),
        Err(e) if preferred != Family::Any && is_family_error(&e) => e,
        Err(e) => return Err(e),
    };

    warn!("no {preferred} listener ({err}), falling back to any family");

    attempt(Family::Any).await
}

async fn bind_family(addr: &ListenAddr, family: Family) -> io::Result<TcpListener> {
    let candidates = match &addr.host {
        Some(host) => resolve(host, addr.port, family).await?,
        None => unspecified(addr.port, family),
    };

    let mut last = None;

    for candidate in candidates {
        match listen_on(candidate) {
            Ok(listener) => return Ok(listener),
            Err(e) => last = Some(e),
        }
    }

    Err(last.expect("candidate list is never empty"))
}

fn listen_on(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };

    // lets a restart rebind while old connections linger in TIME_WAIT
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(BACKLOG)
}

fn unspecified(port: u16, family: Family) -> Vec<SocketAddr> {
    let v6 = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port);
    let v4 = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);

    match family {
        Family::V6 => vec![v6],
        Family::V4 => vec![v4],
        Family::Any => vec![v6, v4],
    }
}
