//! Command-line flags.
//!
//! Flags are single-dash words (`-clean`, `-run`, ...). clap collects them
//! as raw tokens and [`parse_flags`] maps them onto phases.

use clap::Parser;

use crate::build::Actions;

#[derive(Parser, Debug)]
#[command(name = "cbuild", about = "Incremental build orchestrator for small C projects")]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
    /// Flags such as -clean, -run, -full, -init, -usage
    #[arg(allow_hyphen_values = true, trailing_var_arg = true, num_args = 0..)]
    pub flags: Vec<String>,
}

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Usage,
    ShowConfig,
    Phases(Actions),
}

/// Flags and their one-line descriptions, in usage order.
pub const OPTIONS: &[(&str, &str)] = &[
    ("", "Build default settings."),
    ("-clean", "Clean build directories."),
    ("-config", "Show the resolved configuration."),
    ("-full", "Clean, build and run."),
    ("-init", "Initialize the project directory."),
    ("-run", "Build default settings and run."),
    ("-usage", "Display this usage message."),
];

/// Map flag tokens onto a request.
///
/// Returns the first unrecognized token as the error. A usage flag anywhere
/// wins over every other flag.
pub fn parse_flags<S: AsRef<str>>(flags: &[S]) -> Result<Request, String> {
    if flags.is_empty() {
        return Ok(Request::Phases(Actions::build_only()));
    }

    let mut actions = Actions::default();
    let mut show_config = false;
    let mut usage = false;

    for flag in flags {
        match flag.as_ref() {
            "-clean" => actions.clean = true,
            "-init" => actions.init = true,
            "-run" => {
                actions.build = true;
                actions.run = true;
            }
            "-full" => {
                actions.clean = true;
                actions.build = true;
                actions.run = true;
            }
            "-config" => show_config = true,
            "-usage" | "-help" | "--help" | "-h" => usage = true,
            other => return Err(other.to_string()),
        }
    }

    if usage {
        Ok(Request::Usage)
    } else if show_config {
        Ok(Request::ShowConfig)
    } else {
        Ok(Request::Phases(actions))
    }
}

/// Render the usage table for `exec_name`.
pub fn usage(exec_name: &str) -> String {
    let commands: Vec<String> = OPTIONS
        .iter()
        .map(|(flag, _)| {
            if flag.is_empty() {
                exec_name.to_string()
            } else {
                format!("{exec_name} {flag}")
            }
        })
        .collect();
    let width = commands.iter().map(String::len).max().unwrap_or(0) + 4;

    let mut out = String::from("Usage:\n");
    for (command, (_, description)) in commands.iter().zip(OPTIONS) {
        out.push_str(&format!("  {command:<width$} {description}\n"));
    }
    out
}
