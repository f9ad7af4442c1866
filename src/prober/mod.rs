use std::ffi::CStr;
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::num::{NonZeroU16, NonZeroU64};
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::ProbeError;
use crate::resolver::{self, Resolve};

pub mod tcp_connect;

/// Resolves `host` and runs one timed connect against it.
pub async fn probe<R>(
    resolver: &R,
    host: &str,
    port: NonZeroU16,
    budget: TimeoutBudget,
) -> Result<(), ProbeError>
where
    R: Resolve + Clone + Send + 'static,
{
    let address = resolver::resolve_blocking(resolver, host)
        .await
        .map_err(|source| ProbeError::Resolution { host: host.to_string(), source })?;

    let target = ConnectionTarget::new(address, port);
    let outcome = tcp_connect::attempt(target, budget).await;
    info!(
        host, %address, port = port.get(), timeout = budget.as_secs(),
        connected = outcome.is_connected(), ?outcome, "tcp probe done"
    );

    ProbeError::check_outcome(host, port.get(), budget, outcome)
}

/// Timeout used when none is given or the given one is not a positive integer.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Resolved address and port of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTarget {
    address: IpAddr,
    port: NonZeroU16,
}

impl ConnectionTarget {
    pub fn new(address: IpAddr, port: NonZeroU16) -> Self {
        Self { address, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port.get())
    }
}

/// Upper bound, in whole seconds, on the wait for connect completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutBudget(NonZeroU64);

impl TimeoutBudget {
    pub fn from_secs(secs: u64) -> Option<Self> {
        NonZeroU64::new(secs).map(Self)
    }

    pub fn as_secs(&self) -> u64 {
        self.0.get()
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0.get())
    }
}

impl Default for TimeoutBudget {
    fn default() -> Self {
        Self::from_secs(DEFAULT_TIMEOUT_SECS).unwrap_or(Self(NonZeroU64::MIN))
    }
}

impl FromStr for TimeoutBudget {
    type Err = std::num::ParseIntError;

    /// Accepts positive integers only; "0" is rejected like any other junk.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<NonZeroU64>().map(Self)
    }
}

impl fmt::Display for TimeoutBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// OS error captured at the point of failure, in place of a global `errno`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemError {
    pub code: i32,
    pub message: String,
}

impl SystemError {
    pub fn from_raw(code: i32) -> Self {
        Self {
            code,
            message: describe_errno(code),
        }
    }
}

impl From<&io::Error> for SystemError {
    fn from(err: &io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => Self::from_raw(code),
            None => Self {
                code: 0,
                message: err.to_string(),
            },
        }
    }
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "errno={} ({})", self.code, self.message)
    }
}

fn describe_errno(code: i32) -> String {
    let mut buf = [0 as libc::c_char; 256];
    // strerror_r (XSI flavour) writes into our buffer, so no shared static is touched.
    let rc = unsafe { libc::strerror_r(code, buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return format!("Unknown error {code}");
    }
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Terminal result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    Connected,
    Refused(SystemError),
    TimedOut,
    SetupFailed(SystemError),
}

impl ConnectionOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionOutcome::Connected)
    }
}
