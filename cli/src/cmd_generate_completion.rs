// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Completion scripts, printed or written next to a package's other files.

use std::error::Error;
use std::io;
use std::path::PathBuf;

use clap::{ArgMatches, Command, ValueEnum, arg, value_parser};
use clap_complete::{Generator, generate, generate_to};
use clap_complete_nushell::Nushell;

use crate::Cli;

#[derive(Debug, Clone)]
pub struct CmdGenerateCompletion {
    pub shell: Shell,
    pub out_dir: Option<PathBuf>,
}

impl CmdGenerateCompletion {
    pub const NAME: &str = "generate-completion";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Print the completion script of a shell")
            .hide(true)
            .arg(arg!(shell: <SHELL> "Target shell").value_parser(value_parser!(Shell)))
            .arg(
                arg!(-o --"out-dir" <DIR> "Write the script into DIR instead of stdout")
                    .value_parser(value_parser!(PathBuf)),
            )
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            shell: matches.get_one("shell").copied().unwrap_or(Shell::Bash),
            out_dir: matches.get_one("out-dir").cloned(),
        }
    }

    pub fn run(self) -> Result<(), Box<dyn Error>> {
        let mut cmd = Cli::command();
        let bin_name = cmd.get_name().to_string();
        match &self.out_dir {
            Some(dir) => {
                let path = generate_to(self.shell, &mut cmd, bin_name, dir)?;
                tracing::info!(path = %path.display(), "completion script written");
            }
            None => generate(self.shell, &mut cmd, bin_name, &mut io::stdout()),
        }
        Ok(())
    }
}

/// Shells with a completion generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Fish,
    Nushell,
    #[clap(name = "powershell")]
    #[allow(clippy::enum_variant_names)]
    PowerShell,
    Zsh,
}

impl Shell {
    /// The generator shipped with `clap_complete`; `None` for nushell.
    const fn builtin(self) -> Option<clap_complete::Shell> {
        match self {
            Self::Bash => Some(clap_complete::Shell::Bash),
            Self::Fish => Some(clap_complete::Shell::Fish),
            Self::PowerShell => Some(clap_complete::Shell::PowerShell),
            Self::Zsh => Some(clap_complete::Shell::Zsh),
            Self::Nushell => None,
        }
    }
}

impl Generator for Shell {
    fn file_name(&self, name: &str) -> String {
        match self.builtin() {
            Some(shell) => shell.file_name(name),
            None => Nushell.file_name(name),
        }
    }

    fn generate(&self, cmd: &Command, buf: &mut dyn io::Write) {
        match self.builtin() {
            Some(shell) => shell.generate(cmd, buf),
            None => Nushell.generate(cmd, buf),
        }
    }
}
