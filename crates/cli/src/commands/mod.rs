use clap::Subcommand;
use fido2_manage::Fido2Manager;

use crate::utils::{DeviceArgs, PinArgs};

mod devices;
mod fingerprints;
mod passkeys;
mod pin;
mod reset;

pub use devices::*;
pub use fingerprints::*;
pub use passkeys::*;
pub use pin::*;
pub use reset::*;

/// Define subcommands for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// List connected security keys
    List,

    /// Show device information and storage
    Info {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        pin: PinArgs,

        /// Show basic information only, without a PIN
        #[arg(long)]
        basic: bool,
    },

    /// List the passkeys stored on a key
    Passkeys {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        pin: PinArgs,
    },

    /// Delete a passkey (opens a terminal to confirm)
    DeletePasskey {
        /// Credential id as shown by `passkeys`
        #[arg(required = true)]
        credential_id: String,

        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Set a PIN on a key that has none
    SetPin {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Change the PIN of a key
    ChangePin {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        pin: PinArgs,
    },

    /// Factory reset a key, deleting all passkeys and the PIN
    Reset {
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },

    /// Manage fingerprints on keys with a sensor
    Fingerprints {
        #[command(subcommand)]
        command: FingerprintCommands,
    },
}

/// Run the handler for `command`
pub async fn dispatch(
    manager: &Fido2Manager,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::List => list_command(manager).await,
        Commands::Info { device, pin, basic } => info_command(manager, &device, &pin, basic).await,
        Commands::Passkeys { device, pin } => passkeys_command(manager, &device, &pin).await,
        Commands::DeletePasskey {
            credential_id,
            device,
        } => delete_passkey_command(manager, &device, &credential_id).await,
        Commands::SetPin { device } => set_pin_command(manager, &device).await,
        Commands::ChangePin { device, pin } => change_pin_command(manager, &device, &pin).await,
        Commands::Reset { yes } => reset_command(manager, yes).await,
        Commands::Fingerprints { command } => fingerprints_command(manager, command).await,
    }
}
