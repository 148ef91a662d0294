use std::io::{self, Write};

use clap::Args;
use fido2_manage::{ConfirmedPin, Pin};

pub mod session;

/// Which key to use
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Device number as shown by `list`
    #[arg(short, long, default_value_t = 1)]
    pub device: usize,
}

/// PIN of the selected key
#[derive(Args, Debug, Clone)]
pub struct PinArgs {
    /// PIN of the key (prompted for when not given)
    #[arg(long)]
    pub pin: Option<String>,
}

impl PinArgs {
    /// The given PIN, or one read from the terminal
    pub fn resolve(&self) -> Result<Pin, Box<dyn std::error::Error>> {
        match &self.pin {
            Some(pin) => Ok(Pin::new(pin.as_str())),
            None => prompt_for_pin("Enter PIN: "),
        }
    }
}

fn read_line(prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Prompt for PIN
pub fn prompt_for_pin(prompt: &str) -> Result<Pin, Box<dyn std::error::Error>> {
    Ok(Pin::new(read_line(prompt)?))
}

/// Prompt for a new PIN twice until both entries match
pub fn prompt_for_new_pin() -> Result<ConfirmedPin, Box<dyn std::error::Error>> {
    loop {
        let pin = prompt_for_pin("Enter new PIN: ")?;
        if pin.expose().is_empty() {
            println!("The PIN must not be empty.");
            continue;
        }
        let again = prompt_for_pin("Enter the same PIN again: ")?;
        match ConfirmedPin::confirm(pin, &again) {
            Some(confirmed) => return Ok(confirmed),
            None => println!("The PINs do not match, try again."),
        }
    }
}

/// Ask a yes/no question; anything but `y` or `yes` is no
pub fn confirm(question: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let answer = read_line(&format!("{question} [y/N]: "))?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

/// Wait for the user to press Enter
pub fn wait_for_enter(prompt: &str) -> Result<(), Box<dyn std::error::Error>> {
    read_line(prompt).map(|_| ())
}
