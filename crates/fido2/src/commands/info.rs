use std::time::Duration;

use tracing::{debug, warn};

use super::{device_error, run_checked};
use crate::classify::{ClassifiedError, ErrorKind};
use crate::tool::{Invocation, ToolRunner};
use crate::types::{DeviceAttributes, Pin};
use crate::{Error, Result};

/// Attribute snapshot, with the warning raised while loading it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeLoad {
    pub attributes: DeviceAttributes,
    /// Set for legacy keys whose storage could not be read
    pub warning: Option<ClassifiedError>,
}

/// Load storage then device info into one snapshot
///
/// Storage rows come first. A legacy key that cannot report storage still
/// gets its device info, and the load carries the warning. Every other
/// device error aborts the load.
pub async fn load_attributes(
    runner: &dyn ToolRunner,
    handle: &str,
    pin: Option<&Pin>,
    timeout: Duration,
) -> Result<AttributeLoad> {
    let mut load = AttributeLoad::default();

    let storage = runner
        .run(&Invocation::storage_info(handle, pin), timeout)
        .await?;
    match device_error(&storage) {
        Some(err) if err.kind == ErrorKind::LegacyDevice => {
            warn!("{} cannot report storage: {}", handle, err.raw_message);
            load.warning = Some(err);
        }
        Some(err) => return Err(Error::Device(err)),
        None => load.attributes.extend_from_output(&storage.stdout),
    }

    let info = run_checked(runner, &Invocation::device_info(handle, pin), timeout).await?;
    load.attributes.extend_from_output(&info.stdout);

    debug!("Loaded {} attribute rows for {}", load.attributes.len(), handle);
    Ok(load)
}

/// Load device info only, without a PIN
pub async fn load_basic_attributes(
    runner: &dyn ToolRunner,
    handle: &str,
    timeout: Duration,
) -> Result<DeviceAttributes> {
    let info = run_checked(runner, &Invocation::device_info(handle, None), timeout).await?;
    Ok(DeviceAttributes::parse(&info.stdout))
}
