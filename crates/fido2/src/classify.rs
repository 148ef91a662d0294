//! Classification of the tool's error output into a closed taxonomy

use std::borrow::Cow;

use crate::parser;

/// Marker emitted by libfido2 when a candidate PIN fails the device policy
pub const POLICY_VIOLATION_MARKER: &str = "FIDO_ERR_PIN_POLICY_VIOLATION";

/// Kind of device-reported error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrorKind {
    #[error("Invalid PIN provided. Enter the PIN again")]
    InvalidPin,
    /// Too many wrong PINs; the key must be replugged
    #[error("Wrong PIN provided too many times. Reinsert the key before trying again")]
    PinAuthBlocked,
    /// No PIN is set on the key
    #[error("No PIN set for this key. Passkeys can be managed only with a PIN set; set a PIN first")]
    PinRequired,
    /// FIDO 2.0 key without credential management support
    #[error(
        "This is an older key (probably FIDO2.0). No passkey management is possible with this key; only basic information will be shown"
    )]
    LegacyDevice,
    #[error(
        "Internal error communicating with the device. Unplug and replug the device, then refresh the device list"
    )]
    InternalDeviceError,
    #[error(
        "The provided PIN does not fulfill the requirements of your device. The PIN has to be at least {} long and must not be an easily guessable sequence, like e.g. 123456",
        min_length_text(.min_length)
    )]
    PolicyViolation {
        /// Minimum PIN length, when it could be recovered
        min_length: Option<u32>,
    },
    #[error("Unrecognised device error")]
    Unknown,
}

fn min_length_text(min_length: &Option<u32>) -> String {
    min_length.map_or_else(|| "unknown".to_string(), |n| n.to_string())
}

/// What the user should do about an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
    /// Enter the PIN again
    RetryPin,
    /// Unplug and replug the key, then refresh
    ReplugDevice,
    /// Set a PIN before retrying
    SetPin,
    /// Only basic information is available for this key
    BasicInfoOnly,
    ChooseStrongerPin { min_length: Option<u32> },
    /// Nothing known; show the tool's own text
    ReportRaw,
}

impl Remediation {
    /// Whether the same operation can be retried straight away
    pub const fn retryable(self) -> bool {
        matches!(self, Self::RetryPin)
    }
}

impl ErrorKind {
    pub const fn remediation(self) -> Remediation {
        match self {
            Self::InvalidPin => Remediation::RetryPin,
            Self::PinAuthBlocked | Self::InternalDeviceError => Remediation::ReplugDevice,
            Self::PinRequired => Remediation::SetPin,
            Self::LegacyDevice => Remediation::BasicInfoOnly,
            Self::PolicyViolation { min_length } => Remediation::ChooseStrongerPin { min_length },
            Self::Unknown => Remediation::ReportRaw,
        }
    }

    /// Whether the error ends the current operation until the user acts
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::PinAuthBlocked | Self::PinRequired | Self::InternalDeviceError
        )
    }
}

/// A device error together with the raw text it was classified from
///
/// Displays the kind's message; `Unknown` shows the tool's own text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", message(.kind, .raw_message))]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub raw_message: String,
}

fn message<'a>(kind: &ErrorKind, raw_message: &'a str) -> Cow<'a, str> {
    match kind {
        ErrorKind::Unknown => Cow::Borrowed(raw_message.trim()),
        known => Cow::Owned(known.to_string()),
    }
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, raw_message: impl Into<String>) -> Self {
        Self {
            kind,
            raw_message: raw_message.into(),
        }
    }

    pub const fn remediation(&self) -> Remediation {
        self.kind.remediation()
    }

    /// Fill in the minimum PIN length of a policy violation
    pub fn with_min_length(mut self, min_length: Option<u32>) -> Self {
        if let ErrorKind::PolicyViolation { min_length: current } = &mut self.kind {
            if current.is_none() {
                *current = min_length;
            }
        }
        self
    }
}

/// Ordered marker table; more specific markers come first
const MARKERS: &[(&str, ErrorKind)] = &[
    (
        POLICY_VIOLATION_MARKER,
        ErrorKind::PolicyViolation { min_length: None },
    ),
    ("FIDO_ERR_PIN_AUTH_BLOCKED", ErrorKind::PinAuthBlocked),
    ("FIDO_ERR_PIN_INVALID", ErrorKind::InvalidPin),
    ("FIDO_ERR_INVALID_ARGUMENT", ErrorKind::InvalidPin),
    ("FIDO_ERR_PIN_REQUIRED", ErrorKind::PinRequired),
    ("FIDO_ERR_PIN_NOT_SET", ErrorKind::PinRequired),
    ("FIDO_ERR_INVALID_CBOR", ErrorKind::LegacyDevice),
    ("FIDO_ERR_INTERNAL", ErrorKind::InternalDeviceError),
];

/// Classify tool output, returning `None` when it carries no error markers
///
/// Known `FIDO_ERR_*` markers map to their kind. Any other `FIDO_ERR` or a
/// case-insensitive "error" is `Unknown`.
pub fn classify(output: &str) -> Option<ClassifiedError> {
    let kind = MARKERS
        .iter()
        .find(|(marker, _)| output.contains(marker))
        .map(|(_, kind)| *kind)
        .or_else(|| {
            (output.contains("FIDO_ERR") || output.to_lowercase().contains("error"))
                .then_some(ErrorKind::Unknown)
        })?;

    let classified = ClassifiedError::new(kind, output.trim());
    Some(match kind {
        ErrorKind::PolicyViolation { .. } => {
            classified.with_min_length(parser::find_min_pin_length(output))
        }
        _ => classified,
    })
}

/// Classify the output of an invocation already known to have failed
pub fn classify_failure(output: &str) -> ClassifiedError {
    classify(output).unwrap_or_else(|| ClassifiedError::new(ErrorKind::Unknown, output.trim()))
}
