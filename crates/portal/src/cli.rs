//! Command-line interface of the portal launcher.

use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Run the HTTP API (the default)
    Serve,
    /// Create an admin account and exit
    CreateAdmin {
        username: String,
        email: Option<String>,
        password: String,
    },
}

/// Command line arguments. Options override the configuration file.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    pub bind_address: Option<String>,
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// SQLite file, or `:memory:`
    pub database: Option<String>,
    pub command: CliCommand,
}

impl CliArgs {
    fn command() -> Command {
        Command::new("Minecraft Whitelist Portal")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Registration, verification and whitelist API for Minecraft servers")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("portal.toml"),
            )
            .arg(
                Arg::new("bind")
                    .short('b')
                    .long("bind")
                    .value_name("ADDRESS")
                    .help("Bind address (e.g., 127.0.0.1:3001)"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
            .arg(
                Arg::new("database")
                    .short('d')
                    .long("database")
                    .value_name("FILE")
                    .help("SQLite database file (use :memory: for a throwaway database)"),
            )
            .subcommand(
                Command::new("create-admin")
                    .about("Create an admin account")
                    .arg(
                        Arg::new("username")
                            .long("username")
                            .value_name("NAME")
                            .required(true),
                    )
                    .arg(
                        Arg::new("email")
                            .long("email")
                            .value_name("EMAIL")
                            .help("Receives appeal notifications"),
                    )
                    .arg(
                        Arg::new("password")
                            .long("password")
                            .value_name("PASSWORD")
                            .required(true),
                    ),
            )
    }

    /// Parses the process arguments. Exits with usage on invalid input.
    pub fn parse() -> Self {
        Self::from_matches(&Self::command().get_matches())
    }

    /// Parses an explicit argument list.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&Self::command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let command = match matches.subcommand() {
            Some(("create-admin", sub)) => CliCommand::CreateAdmin {
                username: sub.get_one::<String>("username").cloned().unwrap_or_default(),
                email: sub.get_one::<String>("email").cloned(),
                password: sub.get_one::<String>("password").cloned().unwrap_or_default(),
            },
            _ => CliCommand::Serve,
        };

        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("portal.toml")),
            bind_address: matches.get_one::<String>("bind").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            database: matches.get_one::<String>("database").cloned(),
            command,
        }
    }
}
