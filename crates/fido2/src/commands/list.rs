use std::time::Duration;

use tracing::{debug, warn};

use crate::Result;
use crate::error::ExecutionError;
use crate::tool::{Invocation, ToolRunner};
use crate::types::DeviceRecord;

/// Canonical handle of the first PC/SC reader slot
const PCSC_SLOT0: &str = "pcsc://slot0";

/// Parse the device listing into records with fresh ordinals
///
/// Blank lines and lines without a `:` are skipped and take no ordinal.
pub fn parse_device_list(output: &str) -> Vec<DeviceRecord> {
    output
        .lines()
        .filter_map(parse_device_line)
        .enumerate()
        .map(|(index, (handle, label))| DeviceRecord::new(handle, label, index + 1))
        .collect()
}

/// `(handle, label)` of one listing line
fn parse_device_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || !line.contains(':') {
        return None;
    }

    if line.contains(PCSC_SLOT0) {
        return Some((PCSC_SLOT0.to_string(), PCSC_SLOT0.to_string()));
    }

    let handle = line
        .split_whitespace()
        .next()?
        .trim_end_matches(':')
        .to_string();
    if handle.is_empty() {
        return None;
    }

    let label = parenthesized(line)
        .map(str::to_string)
        .unwrap_or_else(|| handle.clone());
    Some((handle, label))
}

/// Contents of the first `(...)` group, if non-empty
fn parenthesized(line: &str) -> Option<&str> {
    let (_, rest) = line.split_once('(')?;
    let (inner, _) = rest.split_once(')')?;
    let inner = inner.trim();
    (!inner.is_empty()).then_some(inner)
}

/// Run the list operation once
///
/// A failed exit is an execution fault; the listing itself never yields a
/// device error.
pub async fn list_devices(runner: &dyn ToolRunner, timeout: Duration) -> Result<Vec<DeviceRecord>> {
    let output = runner.run(&Invocation::list_devices(), timeout).await?;
    if !output.success() {
        warn!("Device listing failed: {}", output.stderr.trim());
        return Err(ExecutionError::Failed {
            code: output.code,
            stderr: output.stderr,
        }
        .into());
    }

    let devices = parse_device_list(&output.stdout);
    debug!("Found {} device(s)", devices.len());
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::testing::{FakeRunner, failed, ok};

    const LISTING: &str = "\
/dev/hidraw4: vendor=0x349e, product=0x0022 (Token2 FIDO2 Security Key)
ioreg://4302783856: vendor=0x1050, product=0x0407 (Yubico YubiKey OTP+FIDO+CCID)

pcsc://slot0: vendor=0x0000, product=0x0000 (ACS ACR122U PICC Interface 00 00)
";

    #[test]
    fn test_ordinals_follow_parsed_lines() {
        let devices = parse_device_list(LISTING);
        let ordinals: Vec<_> = devices.iter().map(|d| d.ordinal).collect();
        assert_eq!(ordinals, [1, 2, 3]);

        assert_eq!(devices[0].handle, "/dev/hidraw4");
        assert_eq!(devices[0].label, "Token2 FIDO2 Security Key");
        assert_eq!(devices[1].handle, "ioreg://4302783856");
        assert_eq!(devices[1].label, "Yubico YubiKey OTP+FIDO+CCID");
    }

    #[test]
    fn test_pcsc_line_collapses_to_slot0() {
        let devices = parse_device_list("pcsc://slot0:reader=ACS ACR1252 1S CL Reader PICC 0\n");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].handle, "pcsc://slot0");
        assert_eq!(devices[0].ordinal, 1);
    }

    #[test]
    fn test_unparseable_lines_take_no_ordinal() {
        let devices = parse_device_list("warning without separator\n/dev/hidraw0: vendor=0x1\n");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].ordinal, 1);
        // No parenthesised description
        assert_eq!(devices[0].label, "/dev/hidraw0");
    }

    #[tokio::test]
    async fn test_list_devices_runs_list_operation() {
        let runner = FakeRunner::new(|_| ok(LISTING));
        let devices = list_devices(&runner, Duration::from_secs(1)).await.unwrap();
        assert_eq!(devices.len(), 3);
        assert_eq!(runner.calls()[0].args(), ["-L"]);
    }

    #[tokio::test]
    async fn test_failed_listing_is_an_execution_fault() {
        let runner = FakeRunner::new(|_| failed("fido2-token: fido_dev_info_manifest: FIDO_ERR_INTERNAL"));
        let err = list_devices(&runner, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, Error::Execution(ExecutionError::Failed { code: Some(1), .. })));
    }
}
