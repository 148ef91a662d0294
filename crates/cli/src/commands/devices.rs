//! Device listing and information commands

use colored::Colorize;
use fido2_manage::{Capabilities, Fido2Manager};

use crate::utils::{DeviceArgs, PinArgs, session};

/// List connected keys
pub async fn list_command(manager: &Fido2Manager) -> Result<(), Box<dyn std::error::Error>> {
    let devices = manager.try_list_devices().await?;

    if devices.is_empty() {
        println!("No FIDO2 devices found!");
        return Ok(());
    }

    println!("Connected devices:");
    for device in &devices {
        println!("  {}  {}", device, device.handle.dimmed());
    }

    Ok(())
}

/// Show everything the key reports about itself
pub async fn info_command(
    manager: &Fido2Manager,
    device: &DeviceArgs,
    pin: &PinArgs,
    basic: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = if basic {
        let mut session = session::select(manager, device, None).await?;
        manager.load_basic_attributes(&mut session).await?;
        session
    } else {
        session::open_session(manager, device, pin).await?
    };

    println!("\n\u{1F4CA} Device information:");
    for (key, value) in session.attributes().rows() {
        println!("  {key}: {value}");
    }

    print_capabilities(&session.capabilities());
    Ok(())
}

fn print_capabilities(capabilities: &Capabilities) {
    let mark = |enabled: bool| {
        if enabled {
            "\u{2705} Yes".green()
        } else {
            "\u{274C} No".red()
        }
    };

    println!("\n\u{1F6E0} Available actions:");
    println!("  Manage passkeys: {}", mark(capabilities.can_manage_passkeys));
    println!("  Change PIN: {}", mark(capabilities.can_change_pin));
    println!(
        "  Manage fingerprints: {}",
        mark(capabilities.can_manage_fingerprints)
    );
}
