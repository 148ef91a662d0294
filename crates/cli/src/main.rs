use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use fido2_manage::{Error, Fido2Manager, ManagerConfig, Remediation, Timeouts, ToolLocator};
use tracing_subscriber::EnvFilter;

mod commands;
mod utils;

use commands::Commands;

#[derive(Parser)]
#[command(version, about = "Manage FIDO2 security keys through fido2-token2")]
struct Cli {
    /// Location of the fido2-token2 binary (searched for when not given)
    #[arg(long, env = "FIDO2_TOKEN_PATH")]
    tool: Option<PathBuf>,

    /// Seconds to wait for the tool and for each of its prompts
    #[arg(long, env = "FIDO2_MANAGE_TIMEOUT", default_value_t = 20)]
    timeout: u64,

    /// Seconds to wait for a touch on the key
    #[arg(long, default_value_t = 30)]
    touch_timeout: u64,

    /// Debug output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(err.as_ref());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let tool = ToolLocator::new().with_explicit(cli.tool).resolve();
    let timeouts = Timeouts {
        touch: Duration::from_secs(cli.touch_timeout),
        ..Timeouts::with_base(Duration::from_secs(cli.timeout))
    };
    let manager = Fido2Manager::new(ManagerConfig::new(tool).with_timeouts(timeouts))?;

    commands::dispatch(&manager, cli.command).await
}

/// Print an error with what to do about it
fn report(err: &(dyn std::error::Error + 'static)) {
    eprintln!("{} {}", "\u{274C}".red(), err);

    let Some(Error::Device(classified)) = err.downcast_ref::<Error>() else {
        return;
    };
    let hint = match classified.remediation() {
        Remediation::RetryPin => "Run the command again with the correct PIN.",
        Remediation::ReplugDevice => "Unplug and replug the key, then run `fido2-manage list`.",
        Remediation::SetPin => "Set a PIN first with `fido2-manage set-pin`.",
        Remediation::BasicInfoOnly => "Run `fido2-manage info --basic` to see what the key reports.",
        Remediation::ChooseStrongerPin { .. } => "Choose a longer PIN that is not a simple sequence.",
        Remediation::ReportRaw => return,
    };
    eprintln!("{} {}", "\u{1F4A1}".yellow(), hint);
}
