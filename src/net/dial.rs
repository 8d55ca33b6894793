use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpStream;

use crate::config::{Endpoint, Family};

use super::resolve;

#[derive(Debug, Error)]
#[error("cannot reach {target}: {source}")]
pub struct DialError {
    target: Endpoint,
    source: io::Error,
}

/// Connect to `target`, preferring `family`. The target is resolved once;
/// the first pass tries its addresses of the preferred family, and unlike
/// the listener, ANY failure of that pass earns the one fallback pass
/// over the full list: a server may be unreachable on its published IPv4
/// address yet fine on IPv6, and only connecting can tell.
pub async fn dial(target: &Endpoint, family: Family) -> Result<TcpStream, DialError> {
    let wrap = |source| DialError {
        target: target.clone(),
        source,
    };

    let addrs = resolve(&target.host, target.port, Family::Any)
        .await
        .map_err(wrap)?;

    let attempt = async move |family| connect_any(&addrs, family).await;

    dial_with_fallback(family, attempt).await.map_err(wrap)
}

async fn dial_with_fallback<T, F>(preferred: Family, mut attempt: F) -> io::Result<T>
where
    F: AsyncFnMut(Family) -> io::Result<T>,
{
    let err = match attempt(preferred).await {
        Ok(x) => return Ok(x),
        Err(e) if preferred != Family::Any => e,
        Err(e) => return Err(e),
    };

    debug!("no {preferred} route ({err}), retrying with any family");

    attempt(Family::Any).await
}

/// Try every address the family preference allows, in resolver order, and
/// keep the first stream that connects.
async fn connect_any(addrs: &[SocketAddr], family: Family) -> io::Result<TcpStream> {
    let mut last = None;

    for &addr in addrs.iter().filter(|addr| family.matches(addr)) {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                trace!("connect {addr}: {e}");
                last = Some(e);
            }
        }
    }

    match last {
        Some(e) => Err(e),
        None => Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no {family} address"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;

    #[test]
    fn dial_futures_can_be_spawned() {
        fn spawnable<T: Send>(_: T) {}

        let target = Endpoint {
            host: "localhost".to_owned(),
            port: 1,
        };

        // the accept loop spawns connection tasks, so this future must
        // be Send; the call is never awaited
        spawnable(dial(&target, Family::Any));
    }

    #[tokio::test]
    async fn any_failure_falls_back_exactly_once() {
        let mut calls = Vec::new();

        let r = dial_with_fallback(Family::V6, async |family| {
            calls.push(family);
            match family {
                // refused is not a family problem, it still falls back
                Family::V6 => Err(io::Error::from(io::ErrorKind::ConnectionRefused)),
                _ => Ok(7u32),
            }
        })
        .await;

        assert_eq!(r.unwrap(), 7);
        assert_eq!(calls, [Family::V6, Family::Any]);
    }

    #[tokio::test]
    async fn preferred_success_never_falls_back() {
        let mut calls = 0;

        let r = dial_with_fallback(Family::V6, async |_| {
            calls += 1;
            Ok(7u32)
        })
        .await;

        assert_eq!(r.unwrap(), 7);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn fallback_failure_is_final() {
        let mut calls = 0;

        let r: io::Result<u32> = dial_with_fallback(Family::V6, async |_| {
            calls += 1;
            Err(io::Error::from(io::ErrorKind::ConnectionRefused))
        })
        .await;

        assert_eq!(r.unwrap_err().kind(), io::ErrorKind::ConnectionRefused);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn connects_in_resolver_order_skipping_the_wrong_family() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let addrs = ["[::1]:1".parse().unwrap(), addr];

        // under a V4 preference the dead IPv6 candidate is never tried
        let (connected, accepted) = tokio::join!(connect_any(&addrs, Family::V4), async {
            listener.accept().await.unwrap()
        });

        assert_eq!(connected.unwrap().peer_addr().unwrap(), addr);
        assert!(accepted.1.ip().is_loopback());
    }

    #[tokio::test]
    async fn empty_pass_reports_the_missing_family() {
        let addrs = ["127.0.0.1:1".parse().unwrap()];

        let e = connect_any(&addrs, Family::V6).await.unwrap_err();

        assert_eq!(e.kind(), io::ErrorKind::AddrNotAvailable);
    }

    #[tokio::test]
    async fn dials_through_the_fallback_pass() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let target = Endpoint {
            host: "127.0.0.1".to_owned(),
            port,
        };

        // the preferred pass has no IPv6 address to try at all
        let (dialed, accepted) = tokio::join!(dial(&target, Family::V6), async {
            listener.accept().await.unwrap()
        });

        assert!(dialed.is_ok());
        assert!(accepted.1.ip().is_loopback());
    }

    #[tokio::test]
    async fn dead_target_is_an_error() {
        // bind, learn the port, drop: nothing listens there anymore
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let target = Endpoint {
            host: "127.0.0.1".to_owned(),
            port,
        };

        assert!(dial(&target, Family::V4).await.is_err());
    }
}
