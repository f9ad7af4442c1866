use clap::Parser;
use std::num::NonZeroU16;

use crate::prober::TimeoutBudget;

#[derive(Debug, Parser)]
#[command(
    name = "tcp-connect",
    version,
    about = "A simple utility for checking connections to generic TCP servers",
    after_help = "Examples:\n  tcp-connect 172.16.10.13 22\n  tcp-connect pseudo 8888 5"
)]
pub struct Cli {
    /// Host name or IP address
    pub host: String,

    /// TCP port, 1-65535
    #[arg(value_parser = parse_port)]
    pub port: NonZeroU16,

    /// Seconds to wait for the connection (default 10)
    #[arg(allow_hyphen_values = true)]
    pub timeout: Option<String>,
}

fn parse_port(s: &str) -> Result<NonZeroU16, String> {
    s.parse::<NonZeroU16>().map_err(|_| format!("Invalid port: {s}"))
}

impl Cli {
    /// The requested budget, or the raw argument when it is not a positive
    /// integer. An absent argument yields the default.
    pub fn budget(&self) -> Result<TimeoutBudget, &str> {
        match self.timeout.as_deref() {
            None => Ok(TimeoutBudget::default()),
            Some(raw) => raw.parse().map_err(|_| raw),
        }
    }
}
