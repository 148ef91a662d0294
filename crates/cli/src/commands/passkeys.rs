//! Passkey (resident credential) commands

use fido2_manage::Fido2Manager;

use crate::utils::{DeviceArgs, PinArgs, session};

/// List passkeys grouped by domain
pub async fn passkeys_command(
    manager: &Fido2Manager,
    device: &DeviceArgs,
    pin: &PinArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = session::open_session(manager, device, pin).await?;
    if !session.capabilities().can_manage_passkeys {
        println!("No passkeys stored on this key.");
        return Ok(());
    }

    let domains = manager.list_credentials(&session).await?;
    for domain in &domains {
        println!("\n\u{1F310} {}", domain.domain);
        for credential in &domain.credentials {
            println!("  Credential ID: {}", credential.credential_id);
            if !credential.user.is_empty() {
                println!("    User: {}", credential.user);
            }
            if !credential.email.is_empty() {
                println!("    Email: {}", credential.email);
            }
        }
    }

    Ok(())
}

/// Hand passkey deletion off to a terminal
pub async fn delete_passkey_command(
    manager: &Fido2Manager,
    device: &DeviceArgs,
    credential_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = session::select(manager, device, None).await?;
    manager.delete_credential(&session, credential_id)?;

    println!("\u{1F5D1} Confirm the deletion in the new terminal window.");
    println!("Run `fido2-manage passkeys` afterwards to check the result.");
    Ok(())
}
