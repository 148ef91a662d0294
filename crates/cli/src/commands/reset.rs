//! Factory reset command

use std::time::Instant;

use colored::Colorize;
use fido2_manage::Fido2Manager;

use crate::utils::{confirm, wait_for_enter};

/// Reset a freshly replugged key
pub async fn reset_command(
    manager: &Fido2Manager,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "{}",
        "\u{26A0} A factory reset deletes every passkey and the PIN. This cannot be undone."
            .yellow()
    );
    if !yes && !confirm("Continue?")? {
        println!("Reset cancelled.");
        return Ok(());
    }

    wait_for_enter("Unplug the key, plug it back in and press Enter...")?;
    let replugged_at = Instant::now();
    println!(
        "\u{1F446} Touch the key within {}s when it blinks.",
        manager.timeouts().touch.as_secs()
    );

    let handle = manager.factory_reset(replugged_at).await?;
    println!("{} {} was reset.", "\u{2705}".green(), handle);
    Ok(())
}
