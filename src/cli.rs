/// Command-line surface (§6 of the specification).
///
/// Treated as an external collaborator: the dispatcher only consumes the
/// resulting [`Config`], never the raw argv. Parsing itself stays a small,
/// hand-rolled pass over `std::env::args()` — this isn't HTTP plumbing, just
/// flag/positional bookkeeping, so no argument-parsing crate is pulled in.
use std::fmt;

use crate::config::{BackendSpec, Config, Strategy};

#[derive(Debug, PartialEq, Eq)]
pub enum CliError {
    Help,
    ArgParseFail(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Help => write!(f, "{}", usage()),
            CliError::ArgParseFail(reason) => write!(f, "{}\n\n{}", reason, usage()),
        }
    }
}

impl std::error::Error for CliError {}

pub fn usage() -> String {
    "usage: rproxy [-h|--help] [-p|--port PORT] [-t|--stale SECONDS]\n\
     \x20             [-r|--retries N] [-c|--connections N] [--log LEVEL]\n\
     \x20             [--robin|--least|--random]\n\
     \x20             { HOST PORT WEIGHT }..."
        .to_string()
}

/// Parses a full argv (program name included) into a [`Config`].
///
/// On success also returns the `--log LEVEL` value, if any, for the caller
/// to apply before `env_logger` initializes — log level plumbing itself
/// stays outside this crate's core per §1.
pub fn parse(args: &[String]) -> Result<(Config, Option<String>), CliError> {
    let mut config = Config::default();
    let mut log_level = None;
    let mut positionals = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(CliError::Help),
            "-p" | "--port" => config.port = parse_next(&mut iter, arg)?,
            "-t" | "--stale" => {
                let secs: u64 = parse_next(&mut iter, arg)?;
                config.stale_timeout = std::time::Duration::from_secs(secs);
            }
            "-r" | "--retries" => config.retries = parse_next(&mut iter, arg)?,
            "-c" | "--connections" => config.connections_accepted = parse_next(&mut iter, arg)?,
            "--log" => {
                log_level = Some(next_value(&mut iter, arg)?);
            }
            "--robin" => config.strategy = Strategy::WeightedRoundRobin,
            "--least" => config.strategy = Strategy::LeastConnections,
            "--random" => config.strategy = Strategy::Random,
            other => positionals.push(other.to_string()),
        }
    }

    if positionals.len() % 3 != 0 {
        return Err(CliError::ArgParseFail(format!(
            "backend arguments must come in HOST PORT WEIGHT triples, got {} positional argument(s)",
            positionals.len()
        )));
    }

    for triple in positionals.chunks(3) {
        let host = triple[0].clone();
        let port: u16 = triple[1]
            .parse()
            .map_err(|_| CliError::ArgParseFail(format!("invalid backend port: {}", triple[1])))?;
        let weight: u32 = triple[2]
            .parse()
            .map_err(|_| CliError::ArgParseFail(format!("invalid backend weight: {}", triple[2])))?;
        if weight < 1 {
            return Err(CliError::ArgParseFail("backend weight must be >= 1".to_string()));
        }
        config.backends.push(BackendSpec { host, port, weight });
    }

    if config.backends.is_empty() {
        return Err(CliError::ArgParseFail(
            "at least one HOST PORT WEIGHT backend triple is required".to_string(),
        ));
    }

    Ok((config, log_level))
}

fn next_value<'a, I: Iterator<Item = &'a String>>(iter: &mut I, flag: &str) -> Result<String, CliError> {
    iter.next()
        .cloned()
        .ok_or_else(|| CliError::ArgParseFail(format!("{} requires a value", flag)))
}

fn parse_next<'a, I, T>(iter: &mut I, flag: &str) -> Result<T, CliError>
where
    I: Iterator<Item = &'a String>,
    T: std::str::FromStr,
{
    let value = next_value(iter, flag)?;
    value
        .parse()
        .map_err(|_| CliError::ArgParseFail(format!("{} has an invalid value: {}", flag, value)))
}
