#[macro_use]
extern crate tracing;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, CommandFactory, Parser};
use eyre::{Context, Result};
use tracing::Level;

use strait::app::App;
use strait::config::{Config, Direction, Endpoint, ListenAddr};
use strait::pidfile::PidFile;

/// Bridge TCP across address families: accept connections over one and
/// relay each to a server reachable over the other.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Serve at most N connections, then drain and exit (0 = no limit)
    #[arg(
        short = 'c',
        long,
        value_name = "N",
        default_value_t = 0,
        env = "STRAIT_MAX_CONNECTIONS"
    )]
    max_connections: u64,

    /// Listen on IPv4 and dial out over IPv6 instead
    #[arg(short, long)]
    reverse: bool,

    /// Pause between accepted connections
    #[arg(
        long,
        value_name = "DURATION",
        default_value = "100ms",
        env = "STRAIT_DELAY",
        value_parser = humantime::parse_duration
    )]
    delay: Duration,

    /// Write the process id here, removed again on exit
    #[arg(long, value_name = "PATH")]
    pidfile: Option<PathBuf>,

    /// More detailed logs, repeatable
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Port or host:port to accept connections on
    listen: ListenAddr,

    /// host:port every connection is relayed to
    target: Endpoint,
}

#[tokio::main]
async fn main() -> ExitCode {
    // a bare invocation asks for help, it is not a broken command line
    if env::args_os().len() <= 1 {
        let _ = Args::command().print_help();
        return ExitCode::SUCCESS;
    }

    let args = Args::parse();

    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_max_level(verbosity(args.verbose))
        .init();

    match try_main(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn try_main(args: Args) -> Result<()> {
    let _pidfile = match &args.pidfile {
        Some(path) => {
            let pidfile = PidFile::create(path)
                .with_context(|| format!("cannot write pidfile {}", path.display()))?;

            debug!("wrote pidfile {}", pidfile.path().display());
            Some(pidfile)
        }
        None => None,
    };

    let direction = if args.reverse || invoked_as_46() {
        Direction::Reverse
    } else {
        Direction::Forward
    };

    let config = Config {
        direction,
        listen: args.listen,
        target: args.target,
        max_connections: args.max_connections,
        accept_delay: args.delay,
    };

    let app = App::bind(config).await?;
    app.run().await
}

fn verbosity(v: u8) -> Level {
    match v {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installed under a name ending in "46" (say a `strait46` hardlink), the
/// relay runs reversed by default, as if --reverse were given.
fn invoked_as_46() -> bool {
    env::args_os()
        .next()
        .map(PathBuf::from)
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .is_some_and(|stem| stem.ends_with("46"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_the_typical_invocation() {
        let args = Args::try_parse_from(["strait", "5900", "10.0.0.7:5900"]).unwrap();

        assert_eq!(args.listen, "5900".parse().unwrap());
        assert_eq!(args.target, "10.0.0.7:5900".parse().unwrap());
        assert_eq!(args.max_connections, 0);
        assert_eq!(args.delay, Duration::from_millis(100));
        assert!(!args.reverse);
        assert_eq!(args.pidfile, None);
    }

    #[test]
    fn parses_flags_and_durations() {
        let args = Args::try_parse_from([
            "strait", "-r", "-c", "32", "--delay", "2s", "::1:5900", "fe80::1%eth0:5900",
        ])
        .unwrap();

        assert!(args.reverse);
        assert_eq!(args.max_connections, 32);
        assert_eq!(args.delay, Duration::from_secs(2));
        assert_eq!(args.listen, "::1:5900".parse().unwrap());
        assert_eq!(args.target, "fe80::1%eth0:5900".parse().unwrap());
    }

    #[test]
    fn rejects_a_bad_endpoint() {
        assert!(Args::try_parse_from(["strait", "5900", "no-port-here"]).is_err());
    }
}
