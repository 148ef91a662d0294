//! Invocations of the external `fido2-token2` tool

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::Result;
use crate::types::Pin;

mod process;

pub use process::ProcessRunner;

/// Flag that carries the PIN; its value is masked in logs
const PIN_FLAG: &str = "-w";

/// One invocation of the tool: an operation name and its arguments
#[derive(Clone, PartialEq, Eq)]
pub struct Invocation {
    operation: &'static str,
    args: Vec<String>,
}

impl Invocation {
    fn new(operation: &'static str, args: &[&str]) -> Self {
        Self {
            operation,
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    fn with_pin(mut self, pin: Option<&Pin>) -> Self {
        if let Some(pin) = Pin::for_tool(pin) {
            self.args.push(PIN_FLAG.to_string());
            self.args.push(pin.to_string());
        }
        self
    }

    fn with_handle(mut self, handle: &str) -> Self {
        self.args.push(handle.to_string());
        self
    }

    /// `-L`
    pub fn list_devices() -> Self {
        Self::new("list devices", &["-L"])
    }

    /// `-I -c [-w PIN] <handle>`
    pub fn storage_info(handle: &str, pin: Option<&Pin>) -> Self {
        Self::new("storage info", &["-I", "-c"])
            .with_pin(pin)
            .with_handle(handle)
    }

    /// `-I [-w PIN] <handle>`
    pub fn device_info(handle: &str, pin: Option<&Pin>) -> Self {
        Self::new("device info", &["-I"])
            .with_pin(pin)
            .with_handle(handle)
    }

    /// `-L -r [-w PIN] <handle>`
    pub fn list_domains(handle: &str, pin: Option<&Pin>) -> Self {
        Self::new("list domains", &["-L", "-r"])
            .with_pin(pin)
            .with_handle(handle)
    }

    /// `-L -k <domain> [-w PIN] <handle>`
    pub fn list_credentials(handle: &str, pin: Option<&Pin>, domain: &str) -> Self {
        Self::new("list credentials", &["-L", "-k", domain])
            .with_pin(pin)
            .with_handle(handle)
    }

    /// `-D -i <credential id> <handle>`
    pub fn delete_credential(handle: &str, credential_id: &str) -> Self {
        Self::new("delete credential", &["-D", "-i", credential_id]).with_handle(handle)
    }

    /// `-S <handle>`, interactive
    pub fn set_pin(handle: &str) -> Self {
        Self::new("set PIN", &["-S"]).with_handle(handle)
    }

    /// `-C <handle>`, interactive
    pub fn change_pin(handle: &str) -> Self {
        Self::new("change PIN", &["-C"]).with_handle(handle)
    }

    /// `-R <handle>`
    pub fn factory_reset(handle: &str) -> Self {
        Self::new("factory reset", &["-R"]).with_handle(handle)
    }

    /// `-L -e [-w PIN] <handle>`
    pub fn list_fingerprints(handle: &str, pin: Option<&Pin>) -> Self {
        Self::new("list fingerprints", &["-L", "-e"])
            .with_pin(pin)
            .with_handle(handle)
    }

    /// `-S -e <handle>`
    pub fn enroll_fingerprint(handle: &str) -> Self {
        Self::new("enroll fingerprint", &["-S", "-e"]).with_handle(handle)
    }

    /// `-D -e -i <template id> <handle>`
    pub fn delete_fingerprint(handle: &str, template_id: &str) -> Self {
        Self::new("delete fingerprint", &["-D", "-e", "-i", template_id]).with_handle(handle)
    }

    /// `-S -e -i <template id> -n <name> <handle>`
    pub fn rename_fingerprint(handle: &str, template_id: &str, name: &str) -> Self {
        Self::new(
            "rename fingerprint",
            &["-S", "-e", "-i", template_id, "-n", name],
        )
        .with_handle(handle)
    }

    /// Short name of the operation, for logs and timeouts
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Arguments with the PIN masked
    pub fn redacted_args(&self) -> Vec<&str> {
        let mut masked = Vec::with_capacity(self.args.len());
        let mut after_pin_flag = false;
        for arg in &self.args {
            masked.push(if after_pin_flag { "***" } else { arg.as_str() });
            after_pin_flag = arg == PIN_FLAG;
        }
        masked
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("operation", &self.operation)
            .field("args", &self.redacted_args())
            .finish()
    }
}

/// Captured result of a finished batch invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Runs non-interactive invocations to completion
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `invocation`, giving up (and killing the child) after `timeout`
    async fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<ToolOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_is_omitted_for_placeholder() {
        let with_pin = Invocation::storage_info("/dev/hidraw0", Some(&Pin::new("1234")));
        assert_eq!(with_pin.args(), ["-I", "-c", "-w", "1234", "/dev/hidraw0"]);

        let placeholder = Invocation::storage_info("/dev/hidraw0", Some(&Pin::new("0000")));
        assert_eq!(placeholder.args(), ["-I", "-c", "/dev/hidraw0"]);

        let none = Invocation::device_info("pcsc://slot0", None);
        assert_eq!(none.args(), ["-I", "pcsc://slot0"]);
    }

    #[test]
    fn test_credential_listing_arguments() {
        let invocation =
            Invocation::list_credentials("ioreg://4302783856", Some(&Pin::new("9876")), "github.com");
        assert_eq!(
            invocation.args(),
            ["-L", "-k", "github.com", "-w", "9876", "ioreg://4302783856"]
        );
    }

    #[test]
    fn test_debug_masks_pin() {
        let invocation = Invocation::list_domains("/dev/hidraw1", Some(&Pin::new("secret1")));
        let debug = format!("{invocation:?}");
        assert!(!debug.contains("secret1"));
        assert!(debug.contains("***"));
        assert_eq!(
            invocation.redacted_args(),
            ["-L", "-r", "-w", "***", "/dev/hidraw1"]
        );
    }

    #[test]
    fn test_hand_off_invocations() {
        assert_eq!(
            Invocation::delete_credential("/dev/hidraw0", "AbC=").args(),
            ["-D", "-i", "AbC=", "/dev/hidraw0"]
        );
        assert_eq!(
            Invocation::rename_fingerprint("/dev/hidraw0", "3f2a", "left index").args(),
            ["-S", "-e", "-i", "3f2a", "-n", "left index", "/dev/hidraw0"]
        );
    }
}
