use thiserror::Error;

use crate::prober::{ConnectionOutcome, SystemError, TimeoutBudget};
use crate::resolver::ResolverError;

/// Every way a probe can end other than a successful connect. `Display` is
/// the diagnostic line written to stderr.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Unable to resolve host: {host} {source}")]
    Resolution {
        host: String,
        #[source]
        source: ResolverError,
    },

    #[error("Unable to initialize socket for host: {host} on port: {port}, timeout: {timeout}, {reason}")]
    SetupFailed {
        host: String,
        port: u16,
        timeout: TimeoutBudget,
        reason: SystemError,
    },

    #[error("Unable to connect to host: {host} on port: {port}, timeout: {timeout}, {reason}")]
    Refused {
        host: String,
        port: u16,
        timeout: TimeoutBudget,
        reason: SystemError,
    },

    #[error("Unable to connect, timed out, to host: {host} on port: {port}, timeout: {timeout}")]
    TimedOut {
        host: String,
        port: u16,
        timeout: TimeoutBudget,
    },
}

impl ProbeError {
    pub fn check_outcome(
        host: &str,
        port: u16,
        timeout: TimeoutBudget,
        outcome: ConnectionOutcome,
    ) -> Result<(), ProbeError> {
        let host = host.to_string();
        match outcome {
            ConnectionOutcome::Connected => Ok(()),
            ConnectionOutcome::Refused(reason) => Err(ProbeError::Refused { host, port, timeout, reason }),
            ConnectionOutcome::TimedOut => Err(ProbeError::TimedOut { host, port, timeout }),
            ConnectionOutcome::SetupFailed(reason) => {
                Err(ProbeError::SetupFailed { host, port, timeout, reason })
            }
        }
    }
}
