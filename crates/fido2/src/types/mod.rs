mod attributes;
mod capabilities;
mod credential;
mod device;
mod fingerprint;
mod pin;

pub use attributes::DeviceAttributes;
pub use capabilities::Capabilities;
pub use credential::{CredentialRecord, DomainCredentials};
pub use device::DeviceRecord;
pub use fingerprint::FingerprintTemplate;
pub use pin::{ConfirmedPin, Pin};
