use derive_more::Display;

/// One connected authenticator, as listed by the tool
///
/// `ordinal` is only meaningful within the listing it came from; the
/// `handle` is what every later invocation targets.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("Device [{ordinal}] : {label}")]
pub struct DeviceRecord {
    /// Transport specific address (HID path, PC/SC slot or registry id)
    pub handle: String,
    /// Human readable description
    pub label: String,
    /// 1-based position in the listing
    pub ordinal: usize,
}

impl DeviceRecord {
    pub fn new(handle: impl Into<String>, label: impl Into<String>, ordinal: usize) -> Self {
        Self {
            handle: handle.into(),
            label: label.into(),
            ordinal,
        }
    }
}
