//! Fingerprint (bio enrollment) commands

use clap::Subcommand;
use fido2_manage::Fido2Manager;

use crate::utils::{DeviceArgs, PinArgs, session};

#[derive(Subcommand)]
pub enum FingerprintCommands {
    /// List enrolled fingerprints
    List {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        pin: PinArgs,
    },

    /// Enroll a new fingerprint (opens a terminal)
    Add {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Delete a fingerprint (opens a terminal)
    Delete {
        /// Template id as shown by `fingerprints list`
        #[arg(required = true)]
        template_id: String,

        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Rename a fingerprint (opens a terminal)
    Rename {
        /// Template id as shown by `fingerprints list`
        #[arg(required = true)]
        template_id: String,

        /// New name
        #[arg(required = true)]
        name: String,

        #[command(flatten)]
        device: DeviceArgs,
    },
}

pub async fn fingerprints_command(
    manager: &Fido2Manager,
    command: FingerprintCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        FingerprintCommands::List { device, pin } => {
            let session = session::open_session(manager, &device, &pin).await?;
            if !session.capabilities().can_manage_fingerprints {
                println!("This key has no fingerprint sensor.");
                return Ok(());
            }

            let templates = manager.list_fingerprints(&session).await?;
            if templates.is_empty() {
                println!("No fingerprints enrolled.");
            }
            for template in &templates {
                let name = if template.name.is_empty() {
                    "(unnamed)"
                } else {
                    template.name.as_str()
                };
                println!("  {}  {}", template.template_id, name);
            }
        }
        FingerprintCommands::Add { device } => {
            let session = session::select(manager, &device, None).await?;
            manager.enroll_fingerprint(&session)?;
            println!("\u{1F446} Follow the prompts in the new terminal window.");
        }
        FingerprintCommands::Delete {
            template_id,
            device,
        } => {
            let session = session::select(manager, &device, None).await?;
            manager.delete_fingerprint(&session, &template_id)?;
            println!("\u{1F5D1} Confirm the deletion in the new terminal window.");
        }
        FingerprintCommands::Rename {
            template_id,
            name,
            device,
        } => {
            let session = session::select(manager, &device, None).await?;
            manager.rename_fingerprint(&session, &template_id, &name)?;
            println!("\u{270F} Renaming in the new terminal window.");
        }
    }

    Ok(())
}
