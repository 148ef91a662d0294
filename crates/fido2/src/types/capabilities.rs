use super::DeviceAttributes;
use super::attributes::names;

/// Which management actions a device supports, derived from its attributes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The key holds at least one resident credential
    pub can_manage_passkeys: bool,
    pub can_change_pin: bool,
    /// The key reports fingerprint user verification
    pub can_manage_fingerprints: bool,
}

impl Capabilities {
    /// Derive the flags from an attribute snapshot
    ///
    /// Absent or non-numeric counts leave a flag off.
    pub fn derive(attributes: &DeviceAttributes) -> Self {
        let positive = |key: &str| attributes.count(key).is_some_and(|n| n > 0);

        let can_change_pin = if attributes.get(names::REMAINING_RKS).is_some() {
            positive(names::REMAINING_RKS)
        } else {
            positive(names::PIN_RETRIES)
        };

        let can_manage_fingerprints = attributes.rows().any(|(key, value)| {
            key.to_lowercase().contains("fingerprint") || value.to_lowercase().contains("fingerprint")
        });

        Self {
            can_manage_passkeys: positive(names::EXISTING_RKS),
            can_change_pin,
            can_manage_fingerprints,
        }
    }
}

impl From<&DeviceAttributes> for Capabilities {
    fn from(attributes: &DeviceAttributes) -> Self {
        Self::derive(attributes)
    }
}
