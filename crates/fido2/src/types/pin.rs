use std::fmt;

use zeroize::Zeroizing;

/// PIN value that is treated as "no PIN set or known"
pub const NO_PIN_PLACEHOLDER: &str = "0000";

/// A PIN held in memory for the lifetime of a session
///
/// The buffer is wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(Zeroizing<String>);

impl Pin {
    pub fn new(pin: impl Into<String>) -> Self {
        Self(Zeroizing::new(pin.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Whether this is the placeholder users enter when no PIN is set
    pub fn is_placeholder(&self) -> bool {
        self.expose() == NO_PIN_PLACEHOLDER
    }

    /// The PIN to pass to the tool, if any
    pub fn for_tool(pin: Option<&Self>) -> Option<&str> {
        pin.filter(|p| !p.expose().is_empty() && !p.is_placeholder())
            .map(Self::expose)
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(***)")
    }
}

impl From<&str> for Pin {
    fn from(pin: &str) -> Self {
        Self::new(pin)
    }
}

impl From<String> for Pin {
    fn from(pin: String) -> Self {
        Self::new(pin)
    }
}

/// A new PIN the user typed twice, identically
///
/// The PIN dialogs only ever receive a matched pair; mismatches are the
/// caller's to re-prompt.
#[derive(Clone, PartialEq, Eq)]
pub struct ConfirmedPin(Pin);

impl ConfirmedPin {
    /// `None` when the two entries differ
    pub fn confirm(pin: Pin, again: &Pin) -> Option<Self> {
        (pin == *again).then_some(Self(pin))
    }

    pub const fn pin(&self) -> &Pin {
        &self.0
    }

    pub fn into_pin(self) -> Pin {
        self.0
    }
}

impl fmt::Debug for ConfirmedPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConfirmedPin(***)")
    }
}
