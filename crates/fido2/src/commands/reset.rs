use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{info, warn};

use super::{list_devices, run_checked};
use crate::config::Timeouts;
use crate::tool::{Invocation, ToolRunner};
use crate::types::DeviceRecord;
use crate::{Error, Result};

/// First handle in `devices` matching `pattern`, trimmed to the match
pub fn find_resettable(devices: &[DeviceRecord], pattern: &Regex) -> Option<String> {
    devices
        .iter()
        .find_map(|device| pattern.find(&device.handle))
        .map(|found| found.as_str().to_string())
}

/// Handle of the first resettable key currently plugged in
pub async fn resettable_handle(
    runner: &dyn ToolRunner,
    pattern: &Regex,
    timeouts: &Timeouts,
) -> Result<String> {
    let devices = list_devices(runner, timeouts.invocation).await?;
    find_resettable(&devices, pattern).ok_or(Error::NoResettableDevice)
}

/// Factory reset the key at `handle`
///
/// Keys only accept a reset shortly after being plugged in, so the call is
/// refused once `timeouts.replug_window` has passed since `replugged_at`.
/// The reset itself waits for a touch and is bounded by the touch timeout.
/// Callers hold the handle's lock across this call.
pub async fn reset_device(
    runner: &dyn ToolRunner,
    handle: &str,
    replugged_at: Instant,
    timeouts: &Timeouts,
) -> Result<()> {
    let elapsed = replugged_at.elapsed();
    if elapsed > timeouts.replug_window {
        warn!("Reset of {} requested {:?} after replug", handle, elapsed);
        return Err(Error::ReplugWindowElapsed);
    }

    info!("Resetting {}; touch the key to confirm", handle);
    run_checked(runner, &Invocation::factory_reset(handle), timeouts.touch).await?;
    Ok(())
}

/// Time left to start a reset, for front ends that count down
pub fn replug_window_left(replugged_at: Instant, timeouts: &Timeouts) -> Duration {
    timeouts.replug_window.saturating_sub(replugged_at.elapsed())
}
