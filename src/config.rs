//! Command-line and environment configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub addr: SocketAddr,
    pub users_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Serve(ServeConfig),
    HashPassword(String),
}

pub fn command() -> Command {
    Command::new("mergington-activities")
        .about("Mergington High School extracurricular activities directory")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("host")
                .long("host")
                .help("Address to bind to")
                .default_value("127.0.0.1")
                .env("MERGINGTON_HOST")
                .value_parser(clap::value_parser!(IpAddr)),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8000")
                .env("MERGINGTON_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("users")
                .long("users")
                .help("Path to the staff directory JSON file")
                .default_value("users.json")
                .env("MERGINGTON_USERS_FILE")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Log more: -v debug, -vv trace (ignored when RUST_LOG is set)")
                .global(true)
                .action(ArgAction::Count),
        )
        .subcommand(
            Command::new("hash-password")
                .about("Print the directory digest for a password")
                .arg(Arg::new("password").required(true)),
        )
}

/// Map parsed arguments to what the binary should do.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    if let Some(sub) = matches.subcommand_matches("hash-password") {
        let password = sub
            .get_one::<String>("password")
            .cloned()
            .context("missing required argument: <password>")?;
        return Ok(Action::HashPassword(password));
    }

    let host = matches
        .get_one::<IpAddr>("host")
        .copied()
        .context("missing argument: --host")?;
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8000);
    let users_path = matches
        .get_one::<PathBuf>("users")
        .cloned()
        .context("missing argument: --users")?;

    Ok(Action::Serve(ServeConfig {
        addr: SocketAddr::new(host, port),
        users_path,
    }))
}

/// Level used when `RUST_LOG` is unset.
pub fn log_level(matches: &ArgMatches) -> &'static str {
    match matches.get_count(ARG_VERBOSITY) {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
