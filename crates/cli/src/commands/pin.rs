//! Set-PIN and change-PIN commands

use colored::Colorize;
use fido2_manage::{Error, Fido2Manager, PinDialogOutcome, PinDialogUpdate};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::utils::{DeviceArgs, PinArgs, prompt_for_new_pin, session};

/// Print dialog notifications as they arrive
fn print_updates() -> (mpsc::UnboundedSender<PinDialogUpdate>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            if update == PinDialogUpdate::TouchRequired {
                println!("\u{1F446} Touch your key to continue...");
            }
        }
    });
    (tx, printer)
}

fn finish(outcome: PinDialogOutcome, done: &str) -> Result<(), Box<dyn std::error::Error>> {
    match outcome {
        PinDialogOutcome::Success => {
            println!("{} {}", "\u{2705}".green(), done);
            Ok(())
        }
        PinDialogOutcome::PolicyViolation(err) | PinDialogOutcome::OtherError(err) => {
            Err(Error::Device(err).into())
        }
        PinDialogOutcome::Timeout => {
            Err("The key stopped responding. Replug it and try again.".into())
        }
    }
}

/// Set a first PIN
pub async fn set_pin_command(
    manager: &Fido2Manager,
    device: &DeviceArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = session::select(manager, device, None).await?;
    let new_pin = prompt_for_new_pin()?;

    let outcome = manager.set_pin(&mut session, new_pin, None).await?;
    finish(outcome, "PIN set successfully!")
}

/// Change the PIN
pub async fn change_pin_command(
    manager: &Fido2Manager,
    device: &DeviceArgs,
    pin: &PinArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = session::select(manager, device, None).await?;
    session.enter_pin(pin.resolve()?);
    let new_pin = prompt_for_new_pin()?;

    let (updates, printer) = print_updates();
    let outcome = manager
        .change_pin(&mut session, new_pin, Some(updates))
        .await?;
    // The sender went away with the dialog
    printer.await?;

    finish(outcome, "PIN changed successfully!")
}
