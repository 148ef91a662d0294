//! Operations against one authenticator, built from tool invocations
//!
//! Each operation runs one or more invocations and turns their output into
//! typed records. Failures reported by the device come back as
//! [`Error::Device`] with a classified error attached.

mod credentials;
mod fingerprints;
mod info;
mod list;
mod pin;
mod reset;

use std::time::Duration;

pub use credentials::{list_credentials, list_domains, parse_domains};
pub use fingerprints::{list_fingerprints, parse_templates};
pub use info::{AttributeLoad, load_attributes, load_basic_attributes};
pub use list::{list_devices, parse_device_list};
pub use pin::{PinDialog, PinDialogOutcome, PinDialogState, PinDialogUpdate, run_pin_dialog};
pub use reset::{find_resettable, replug_window_left, reset_device, resettable_handle};

use crate::classify::{ClassifiedError, ErrorKind, classify, classify_failure};
use crate::tool::{Invocation, ToolOutput, ToolRunner};
use crate::{Error, Result};

/// Error text of an invocation: stderr, or stdout when stderr is empty
fn diagnostics(output: &ToolOutput) -> &str {
    if output.stderr.trim().is_empty() {
        &output.stdout
    } else {
        &output.stderr
    }
}

/// The device error an invocation reported, if any
///
/// A known marker on stderr counts even when the exit status is zero.
/// Unrecognised text only counts on a failed exit.
pub(crate) fn device_error(output: &ToolOutput) -> Option<ClassifiedError> {
    match classify(&output.stderr) {
        Some(err) if err.kind != ErrorKind::Unknown => Some(err),
        _ if !output.success() => Some(classify_failure(diagnostics(output))),
        _ => None,
    }
}

/// Run `invocation` and fail on any device error
pub(crate) async fn run_checked(
    runner: &dyn ToolRunner,
    invocation: &Invocation,
    timeout: Duration,
) -> Result<ToolOutput> {
    let output = runner.run(invocation, timeout).await?;
    match device_error(&output) {
        Some(err) => Err(Error::Device(err)),
        None => Ok(output),
    }
}
