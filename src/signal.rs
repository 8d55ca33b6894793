use std::fmt;

use eyre::Result;
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Which signal asked us to stop. Only ever used for the exit log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Interrupt,
    Terminate,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
        }
    }
}

#[derive(Debug)]
pub struct Signals {
    int: Signal,
    term: Signal,
}

impl Signals {
    pub fn new() -> Result<Self> {
        Ok(Self {
            int: signal(SignalKind::interrupt())?,
            term: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for either termination signal. Cancel safe, so it can sit in
    /// the accept loop's select and be polled over and over.
    pub async fn wait_terminate(&mut self) -> Termination {
        tokio::select! {
            _ = self.int.recv() => Termination::Interrupt,
            _ = self.term.recv() => Termination::Terminate,
        }
    }
}
