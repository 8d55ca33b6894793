//! Socket establishment with one-shot address-family fallback.
//!
//! Both the listener and the dialer first try the family the relay's
//! direction asks for. If that family cannot work here, one more pass is
//! made with no family preference at all, and whatever that yields is
//! used. There is never a second retry.

use std::io;
use std::net::SocketAddr;

use tokio::net::lookup_host;

use crate::config::Family;

mod dial;
mod listen;

pub use self::dial::{DialError, dial};
pub use self::listen::{BindError, Bound, bind};

/// Resolve `host:port`, keeping only addresses the family preference
/// allows. A lookup that succeeds but leaves nothing usable is reported
/// as `AddrNotAvailable` so it takes the fallback path like any other
/// family problem.
async fn resolve(host: &str, port: u16, family: Family) -> io::Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await?
        .filter(|addr| family.matches(addr))
        .collect();

    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no {family} address for {host}"),
        ));
    }

    Ok(addrs)
}

/// Whether `e` means "this address family does not work here", as
/// opposed to, say, a taken port. EAFNOSUPPORT, EADDRNOTAVAIL and EINVAL
/// all surface through these kinds.
fn is_family_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Unsupported
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::InvalidInput
    )
}
