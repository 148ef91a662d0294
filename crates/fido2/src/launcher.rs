//! Hand-off of interactive invocations to a terminal window
//!
//! Credential deletion and fingerprint enrollment ask the user to confirm
//! or touch the key repeatedly, so they run in a terminal of their own. The
//! controller does not wait for them; callers re-list to see the effect.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::Result;
use crate::error::ExecutionError;
use crate::tool::Invocation;

/// Linux terminal emulators in order of preference, with the flag that
/// introduces the command to run
const LINUX_TERMINALS: &[(&str, &str)] = &[
    ("gnome-terminal", "--"),
    ("x-terminal-emulator", "-e"),
    ("xterm", "-e"),
    ("konsole", "-e"),
    ("lxterminal", "-e"),
    ("tilix", "-e"),
    ("mate-terminal", "-e"),
];

/// Starts an invocation in a terminal the user can interact with
pub trait TerminalLauncher: Send + Sync {
    fn launch(&self, invocation: &Invocation) -> Result<()>;
}

/// Opens the platform's terminal emulator
#[derive(Debug, Clone)]
pub struct SystemTerminal {
    program: PathBuf,
}

impl SystemTerminal {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Program and arguments that open a terminal running `invocation`
    fn terminal_command(&self, invocation: &Invocation) -> Result<(String, Vec<String>)> {
        let tool = self.program.display().to_string();

        if cfg!(target_os = "macos") {
            let script = format!(
                "tell application \"Terminal\" to do script \"{}\"",
                applescript_escape(&shell_command(&tool, invocation.args()))
            );
            return Ok((
                "osascript".to_string(),
                vec!["-e".to_string(), script, "-e".to_string(), "tell application \"Terminal\" to activate".to_string()],
            ));
        }

        if cfg!(windows) {
            let mut args = vec!["/c".to_string(), "start".to_string(), String::new(), tool];
            args.extend(invocation.args().iter().cloned());
            return Ok(("cmd".to_string(), args));
        }

        let (terminal, flag) = LINUX_TERMINALS
            .iter()
            .find(|(terminal, _)| which::which(terminal).is_ok())
            .ok_or(ExecutionError::NoTerminal)?;
        let mut args = vec![flag.to_string(), tool];
        args.extend(invocation.args().iter().cloned());
        Ok((terminal.to_string(), args))
    }
}

impl TerminalLauncher for SystemTerminal {
    fn launch(&self, invocation: &Invocation) -> Result<()> {
        let (program, args) = self.terminal_command(invocation)?;
        info!("Opening a terminal for {}", invocation.operation());
        debug!("Terminal command: {} {:?}", program, invocation.redacted_args());

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ExecutionError::Spawn { program, source })?;

        // Reap in the background so the terminal never lingers as a zombie
        std::thread::spawn(move || {
            if let Err(err) = child.wait() {
                warn!("Terminal process wait failed: {}", err);
            }
        });
        Ok(())
    }
}

/// Quote `args` for a POSIX shell command line
fn shell_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(shell_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/-_.:=+@".contains(c))
    {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn applescript_escape(text: &str) -> String {
    text.replace('\\', r"\\").replace('"', "\\\"")
}
