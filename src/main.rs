mod cli;
mod config;
mod error;
mod prober;
mod resolver;

use cli::Cli;
use config::{LogFormat, Settings};
use error::ProbeError;
use prober::{DEFAULT_TIMEOUT_SECS, TimeoutBudget};
use resolver::SystemResolver;

use clap::Parser;
use std::io::{self, Write};
use std::num::NonZeroU16;
use std::process::ExitCode;
use tracing::debug;

const EXIT_CONNECTED: u8 = 0;
const EXIT_FAILED: u8 = 1;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    // Exits with usage on bad arity or port before anything touches the network.
    let cli = Cli::parse();

    let settings = Settings::load().await?;
    init_tracing(&settings)?;

    let budget = cli.budget().unwrap_or_else(|raw| {
        eprintln!("WARNING: Invalid timeout: {}, using default timeout: {}", raw, DEFAULT_TIMEOUT_SECS);
        TimeoutBudget::default()
    });
    debug!(host = %cli.host, port = cli.port.get(), timeout = budget.as_secs(), "starting tcp probe");

    let result = prober::probe(&SystemResolver, &cli.host, cli.port, budget).await;
    let status = report(&result, &cli.host, cli.port, &mut io::stdout().lock(), &mut io::stderr().lock());
    Ok(ExitCode::from(status))
}

/// Writes the single result line, the success line to `out` and any failure
/// to `err`, and returns the process exit status.
fn report(
    result: &Result<(), ProbeError>,
    host: &str,
    port: NonZeroU16,
    out: &mut impl Write,
    err: &mut impl Write,
) -> u8 {
    match result {
        Ok(()) => {
            let _ = writeln!(out, "Successfully connected to host: {} on port: {}", host, port);
            EXIT_CONNECTED
        }
        Err(e) => {
            let _ = writeln!(err, "ERROR: {}", e);
            EXIT_FAILED
        }
    }
}

/// Logs go to stderr; stdout carries only the success line.
fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let log_level = settings.get_tracing_level()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
                         .add_directive(format!("tcp_connect={}", log_level.as_str().to_lowercase()).parse()?))
        .with_writer(std::io::stderr);

    match settings.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::{ConnectionOutcome, SystemError};

    fn render(outcome: ConnectionOutcome, timeout: u64) -> (u8, String, String) {
        let budget = TimeoutBudget::from_secs(timeout).unwrap();
        let result = ProbeError::check_outcome("127.0.0.1", 22, budget, outcome);
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let status = report(&result, "127.0.0.1", NonZeroU16::new(22).unwrap(), &mut out, &mut err);
        (status, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn connected_prints_to_stdout_and_succeeds() {
        let (status, out, err) = render(ConnectionOutcome::Connected, 5);
        assert_eq!(status, 0);
        assert_eq!(out, "Successfully connected to host: 127.0.0.1 on port: 22\n");
        assert!(err.is_empty());
    }

    #[test]
    fn refusal_goes_to_stderr_with_errno() {
        let reason = SystemError::from_raw(libc::ECONNREFUSED);
        let (status, out, err) = render(ConnectionOutcome::Refused(reason), 5);
        assert_eq!(status, 1);
        assert!(out.is_empty());
        assert!(err.starts_with("ERROR: Unable to connect to host: 127.0.0.1 on port: 22"), "{err}");
        assert!(err.contains(&format!("errno={}", libc::ECONNREFUSED)), "{err}");
        assert_eq!(err.lines().count(), 1);
    }

    #[test]
    fn timeout_goes_to_stderr_with_budget() {
        let (status, out, err) = render(ConnectionOutcome::TimedOut, 2);
        assert_eq!(status, 1);
        assert!(out.is_empty());
        assert!(err.starts_with("ERROR: Unable to connect, timed out"), "{err}");
        assert!(err.contains("timeout: 2"), "{err}");
    }

    #[test]
    fn setup_failure_is_not_success() {
        let reason = SystemError::from_raw(libc::EMFILE);
        let (status, out, err) = render(ConnectionOutcome::SetupFailed(reason), 10);
        assert_eq!(status, 1);
        assert!(out.is_empty());
        assert!(err.contains("Unable to initialize socket"), "{err}");
    }
}
