// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, ffi::OsString, path::PathBuf, process::ExitCode};

use clap::{ArgMatches, Command, ValueHint, arg, builder::styling, crate_version, value_parser};
use colored::Colorize;
use errands_core::APP_NAME;
use errands_core::caldav::{CancellationToken, Client};
use futures::{FutureExt, future::BoxFuture};

use crate::cmd_calendar::{CmdCalendarCreate, CmdCalendarDelete, CmdCalendarList};
use crate::cmd_discover::CmdDiscover;
use crate::cmd_events::CmdEvents;
use crate::cmd_generate_completion::CmdGenerateCompletion;
use crate::cmd_sync::CmdSync;
use crate::config::parse_config;
use crate::util::init_tracing;

/// Run the command-line interface.
pub async fn run() -> ExitCode {
    let cli = match Cli::parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(cli.verbose);
    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}

/// Command-line interface
#[derive(Debug)]
pub struct Cli {
    /// Path to the configuration file
    pub config: Option<PathBuf>,

    /// Show debug logs
    pub verbose: bool,

    /// The command to execute
    pub command: Commands,
}

impl Cli {
    /// Create the command-line interface
    pub fn command() -> Command {
        const STYLES: styling::Styles = styling::Styles::styled()
            .header(styling::AnsiColor::Green.on_default().bold())
            .usage(styling::AnsiColor::Green.on_default().bold())
            .literal(styling::AnsiColor::Blue.on_default().bold())
            .placeholder(styling::AnsiColor::Cyan.on_default());

        Command::new(APP_NAME)
            .about("Keep local task lists in sync with a CalDAV server.")
            .author("Zexin Yuan <aim@yzx9.xyz>")
            .version(crate_version!())
            .styles(STYLES)
            .subcommand_required(false) // allow default to sync
            .arg_required_else_help(false)
            .arg(
                arg!(-c --config [CONFIG] "Path to the configuration file")
                    .long_help(
                        "\
Path to the configuration file. Defaults to $ERRANDS_SYNC_CONFIG, then \
$XDG_CONFIG_HOME/errands-sync/config.toml on Linux and MacOS, \
%LOCALAPPDATA%/errands-sync/config.toml on Windows.",
                    )
                    .value_parser(value_parser!(PathBuf))
                    .value_hint(ValueHint::FilePath)
                    .global(true),
            )
            .arg(arg!(-v --verbose "Show debug logs, overridden by RUST_LOG").global(true))
            .subcommand(CmdSync::command())
            .subcommand(CmdDiscover::command())
            .subcommand(CmdCalendarList::command())
            .subcommand(CmdCalendarCreate::command())
            .subcommand(CmdCalendarDelete::command())
            .subcommand(CmdEvents::command())
            .subcommand(CmdGenerateCompletion::command())
    }

    /// Parse the command-line arguments
    pub fn parse() -> Result<Self, Box<dyn Error>> {
        let commands = Self::command();
        let matches = commands.get_matches();
        Self::from(matches)
    }

    /// Parse the specified arguments
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, Box<dyn Error>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let commands = Self::command();
        let matches = commands.try_get_matches_from(args)?;
        Self::from(matches)
    }

    /// Create a CLI instance from the `ArgMatches`
    pub fn from(matches: ArgMatches) -> Result<Self, Box<dyn Error>> {
        use Commands::*;
        let command = match matches.subcommand() {
            Some((CmdSync::NAME, matches)) => Sync(CmdSync::from(matches)),
            Some((CmdDiscover::NAME, matches)) => Discover(CmdDiscover::from(matches)),
            Some((CmdCalendarList::NAME, matches)) => Calendars(CmdCalendarList::from(matches)),
            Some((CmdCalendarCreate::NAME, matches)) => {
                CreateCalendar(CmdCalendarCreate::from(matches)?)
            }
            Some((CmdCalendarDelete::NAME, matches)) => {
                DeleteCalendar(CmdCalendarDelete::from(matches))
            }
            Some((CmdEvents::NAME, matches)) => Events(CmdEvents::from(matches)),
            Some((CmdGenerateCompletion::NAME, matches)) => {
                GenerateCompletion(CmdGenerateCompletion::from(matches))
            }
            None => Sync(CmdSync::default()),
            Some((name, _)) => return Err(format!("Unknown command: {name}").into()),
        };

        let config = matches.get_one("config").cloned();
        let verbose = matches.get_flag("verbose");
        Ok(Cli {
            config,
            verbose,
            command,
        })
    }

    /// Run the command
    pub async fn run(self) -> Result<(), Box<dyn Error>> {
        self.command.run(self.config).await
    }
}

/// The commands available in the CLI
#[derive(Debug, Clone)]
pub enum Commands {
    /// Synchronize local lists with the server
    Sync(CmdSync),

    /// Show the discovered principal and calendar home
    Discover(CmdDiscover),

    /// List calendars
    Calendars(CmdCalendarList),

    /// Create a calendar
    CreateCalendar(CmdCalendarCreate),

    /// Delete a calendar
    DeleteCalendar(CmdCalendarDelete),

    /// List the items of a calendar
    Events(CmdEvents),

    /// Generate shell completion
    GenerateCompletion(CmdGenerateCompletion),
}

impl Commands {
    /// Run the command with the given configuration
    #[rustfmt::skip]
    pub async fn run(self, config: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
        use Commands::*;
        match self {
            Sync(a) => a.run(parse_config(config).await?).await,
            Discover(a)       => Self::run_with(config, |x| a.run(x).boxed()).await,
            Calendars(a)      => Self::run_with(config, |x| a.run(x).boxed()).await,
            CreateCalendar(a) => Self::run_with(config, |x| a.run(x).boxed()).await,
            DeleteCalendar(a) => Self::run_with(config, |x| a.run(x).boxed()).await,
            Events(a)         => Self::run_with(config, |x| a.run(x).boxed()).await,
            GenerateCompletion(a) => a.run(),
        }
    }

    async fn run_with<F>(config: Option<PathBuf>, f: F) -> Result<(), Box<dyn Error>>
    where
        F: for<'a> FnOnce(&'a mut Client) -> BoxFuture<'a, Result<(), Box<dyn Error>>>,
    {
        tracing::debug!("parsing configuration...");
        let config = parse_config(config).await?;
        let mut client = Client::discover(config.server, CancellationToken::new()).await?;

        f(&mut client).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cmd_generate_completion::Shell, util::OutputFormat};

    #[test]
    fn test_parse_config() {
        let cli = Cli::try_parse_from(vec!["test", "-c", "/tmp/config.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Sync(_)));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let args = vec!["test", "calendars", "-v", "--config", "/tmp/config.toml"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
        assert!(matches!(cli.command, Commands::Calendars(_)));
    }

    #[test]
    fn test_parse_default_sync() {
        let cli = Cli::try_parse_from(vec!["test"]).unwrap();
        match cli.command {
            Commands::Sync(cmd) => assert_eq!(cmd.output_format, OutputFormat::Table),
            _ => panic!("Expected Sync command"),
        }
    }

    #[test]
    fn test_parse_sync() {
        let args = vec!["test", "sync", "--output-format", "json"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Sync(cmd) => assert_eq!(cmd.output_format, OutputFormat::Json),
            _ => panic!("Expected Sync command"),
        }
    }

    #[test]
    fn test_parse_discover() {
        let cli = Cli::try_parse_from(vec!["test", "discover"]).unwrap();
        assert!(matches!(cli.command, Commands::Discover(_)));
    }

    #[test]
    fn test_parse_calendars_alias() {
        let cli = Cli::try_parse_from(vec!["test", "ls"]).unwrap();
        assert!(matches!(cli.command, Commands::Calendars(_)));
    }

    #[test]
    fn test_parse_create_calendar() {
        let args = vec!["test", "create-calendar", "Groceries", "--uid", "groceries"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::CreateCalendar(cmd) => {
                assert_eq!(cmd.name, "Groceries");
                assert_eq!(cmd.uid, "groceries");
            }
            _ => panic!("Expected CreateCalendar command"),
        }
    }

    #[test]
    fn test_parse_create_calendar_bad_component() {
        let args = vec!["test", "create-calendar", "X", "--component", "nope"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_delete_calendar() {
        let cli = Cli::try_parse_from(vec!["test", "delete-calendar", "work"]).unwrap();
        match cli.command {
            Commands::DeleteCalendar(cmd) => assert_eq!(cmd.uid, "work"),
            _ => panic!("Expected DeleteCalendar command"),
        }
    }

    #[test]
    fn test_parse_events() {
        let cli = Cli::try_parse_from(vec!["test", "events", "work"]).unwrap();
        match cli.command {
            Commands::Events(cmd) => assert_eq!(cmd.uid, "work"),
            _ => panic!("Expected Events command"),
        }
    }

    #[test]
    fn test_parse_generate_completions() {
        let args = vec!["test", "generate-completion", "zsh"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::GenerateCompletion(cmd) => {
                assert_eq!(cmd.shell, Shell::Zsh);
            }
            _ => panic!("Expected GenerateCompletion command"),
        }
    }
}
