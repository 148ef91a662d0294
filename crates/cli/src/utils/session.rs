use colored::Colorize;
use fido2_manage::{Fido2Manager, Pin, SessionState};
use tracing::info;

use crate::utils::{DeviceArgs, PinArgs};

/// Select the key numbered in `device`, without loading anything
pub async fn select(
    manager: &Fido2Manager,
    device: &DeviceArgs,
    pin: Option<Pin>,
) -> Result<SessionState, Box<dyn std::error::Error>> {
    let session = manager.select_device(device.device, pin).await?;
    info!("Using {}", session.device());
    println!("\u{1F511} {}", session.device());
    Ok(session)
}

/// Select a key with its PIN and load its attributes
pub async fn open_session(
    manager: &Fido2Manager,
    device: &DeviceArgs,
    pin: &PinArgs,
) -> Result<SessionState, Box<dyn std::error::Error>> {
    // Resolve the device before asking for a PIN
    let mut session = select(manager, device, None).await?;
    session.enter_pin(pin.resolve()?);

    if let Some(warning) = manager.load_attributes(&mut session).await? {
        println!("{} {}", "\u{26A0}".yellow(), warning);
    }
    Ok(session)
}
