use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::{Context, Result};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::Instrument;

use crate::config::Config;
use crate::net;
use crate::signal::{Signals, Termination};

mod conn;

use self::conn::Conn;

/// Wait this long before accepting again after a transient accept error.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How long connection tasks get to notice a shutdown broadcast and hang
/// up their sockets before the process exits anyway.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct App {
    config: Arc<Config>,
    bound: net::Bound,
}

impl App {
    /// Bind the listener. Failing here is fatal, there is no accept loop
    /// yet to limp along without one.
    pub async fn bind(config: Config) -> Result<Self> {
        debug!("binding {}", display!(config.listen));

        let bound = net::bind(&config.listen, config.direction.listen_family()).await?;

        info!(
            "{}: listening on {} ({}), relaying to {}",
            config.direction,
            display!(bound.local),
            bound.family,
            display!(config.target),
        );

        Ok(Self {
            config: Arc::new(config),
            bound,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.bound.local
    }

    pub async fn run(self) -> Result<()> {
        let Self { config, bound } = self;

        let mut signals = Signals::new().context("failed to register signal handlers")?;
        let (shutdown, _) = broadcast::channel(1);
        let mut tasks = JoinSet::new();
        let mut served: u64 = 0;

        let signaled = loop {
            // forget connections that already finished
            while tasks.try_join_next().is_some() {}

            tokio::select! {
                sig = signals.wait_terminate() => break Some(sig),

                r = bound.listener.accept() => {
                    let (client, peer) = match r {
                        Ok(x) => x,
                        Err(e) => {
                            warn!("failed to accept connection: {}", display!(e));
                            sleep(ACCEPT_BACKOFF).await;
                            continue;
                        }
                    };

                    served += 1;

                    let conn = Conn {
                        id: served,
                        peer,
                        started: Instant::now(),
                    };

                    let span = error_span!("conn", id = conn.id, peer = peer.to_string());
                    let rx = shutdown.subscribe();
                    tasks.spawn(
                        conn::handle(client, conn, Arc::clone(&config), rx).instrument(span),
                    );

                    if config.max_connections != 0 && served >= config.max_connections {
                        info!("served {served} connections, draining...");
                        break None;
                    }

                    if !config.accept_delay.is_zero() {
                        // pace the loop, but never outwait a signal
                        tokio::select! {
                            _ = sleep(config.accept_delay) => {}
                            sig = signals.wait_terminate() => break Some(sig),
                        }
                    }
                }
            }
        };

        // stop taking connections before seeing the old ones out
        drop(bound);

        match signaled {
            Some(sig) => shut_down(sig, &shutdown, &mut tasks).await,

            None => loop {
                if tasks.is_empty() {
                    info!("exiting...");
                    break;
                }

                tokio::select! {
                    _ = tasks.join_next() => {}
                    sig = signals.wait_terminate() => {
                        shut_down(sig, &shutdown, &mut tasks).await;
                        break;
                    }
                }
            },
        }

        Ok(())
    }
}

async fn shut_down(sig: Termination, shutdown: &broadcast::Sender<()>, tasks: &mut JoinSet<()>) {
    info!("{sig} received, exiting...");

    let _ = shutdown.send(());

    let grace = async {
        while tasks.join_next().await.is_some() {}
    };

    let _ = tokio::time::timeout(SHUTDOWN_GRACE, grace).await;
}
