use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::config::{Config, Direction};
use crate::net;
use crate::relay::{self, Finished};

/// One accepted connection.
#[derive(Debug)]
pub struct Conn {
    pub id: u64,
    pub peer: SocketAddr,
    pub started: Instant,
}

/// Serve one accepted client end to end. Everything that can go wrong in
/// here is scoped to this connection: log it and return, the accept loop
/// never hears about it.
pub async fn handle(
    client: TcpStream,
    conn: Conn,
    config: Arc<Config>,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!("connected");

    if config.direction == Direction::Forward && is_mapped_peer(conn.peer.ip()) {
        // On a dual-stack listener an IPv4-mapped peer in forward mode
        // can be our own outbound leg looping straight back into us.
        // Hang up before dialing and multiplying.
        info!("dropping IPv4-mapped peer, looks like our own dial");
        return;
    }

    let server = match net::dial(&config.target, config.direction.dial_family()).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("{e}");
            return;
        }
    };

    debug!("dialed {}", display!(config.target));

    tokio::select! {
        fin = relay::splice(client, server) => finish(&conn, fin),
        _ = shutdown.recv() => info!("shutting down, hanging up"),
    }
}

fn finish(conn: &Conn, fin: Finished) {
    let elapsed = conn.started.elapsed();

    match fin.cause {
        Ok(()) => info!(
            "{} closed after {}, {} bytes up, {} bytes down",
            display!(fin.leg),
            display!(elapsed),
            fin.up,
            fin.down,
        ),
        Err(e) => warn!(
            "{} leg failed after {}: {}, {} bytes up, {} bytes down",
            display!(fin.leg),
            display!(elapsed),
            display!(e),
            fin.up,
            fin.down,
        ),
    }
}

/// `::ffff:a.b.c.d` peers mean the dual-stack socket accepted an IPv4
/// connection, which a forward-mode relay dialing IPv4 can produce all by
/// itself when the target loops back here.
fn is_mapped_peer(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().is_some(),
        IpAddr::V4(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_peers_are_recognized() {
        let mapped: IpAddr = "::ffff:127.0.0.1".parse().unwrap();
        let v6: IpAddr = "::1".parse().unwrap();
        let v4: IpAddr = "127.0.0.1".parse().unwrap();

        assert!(is_mapped_peer(mapped));
        assert!(!is_mapped_peer(v6));
        assert!(!is_mapped_peer(v4));
    }
}
