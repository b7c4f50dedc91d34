use std::time::Duration;

use clap::{Args, Subcommand};
use svcwire_session::{ConnectionConfig, Session, SessionConfig};
use svcwire_transport::DEFAULT_DIRECTORY;

use crate::exit::{session_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod resolve;
pub mod services;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a service and call one of its methods.
    Call(CallArgs),
    /// Look up a service in the directory and print its endpoints.
    Resolve(ResolveArgs),
    /// List every service registered in the directory.
    Services(ServicesArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format),
        Command::Resolve(args) => resolve::run(args, format),
        Command::Services(args) => services::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DirectoryArgs {
    /// Directory address.
    #[arg(long, env = "SVCWIRE_DIRECTORY", default_value = DEFAULT_DIRECTORY)]
    pub directory: String,
    /// Bound on connecting, the lookup and the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Service name registered in the directory.
    pub service: String,
    /// Method signature, e.g. "reply::(s)".
    pub signature: String,
    /// One argument per type code in the signature.
    #[arg(allow_negative_numbers = true)]
    pub args: Vec<String>,
    #[command(flatten)]
    pub directory: DirectoryArgs,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Service name registered in the directory.
    pub service: String,
    #[command(flatten)]
    pub directory: DirectoryArgs,
}

#[derive(Args, Debug)]
pub struct ServicesArgs {
    #[command(flatten)]
    pub directory: DirectoryArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Connect a session whose every step is bounded by `timeout`.
pub fn open_session(address: &str, timeout: Duration) -> CliResult<Session> {
    let config = SessionConfig {
        connection: ConnectionConfig {
            connect_timeout: Some(timeout),
            ..ConnectionConfig::default()
        },
        lookup_timeout: timeout,
        ..SessionConfig::default()
    };
    let mut session = Session::with_config(config);
    session
        .try_connect(address)
        .map_err(|err| session_error(&format!("cannot connect to directory {address}"), err))?;
    Ok(session)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("  ").unwrap_err().code, USAGE);
    }
}
