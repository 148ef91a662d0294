//! Device session controller for FIDO2 security keys
//!
//! Manages authenticators by driving the external `fido2-token2` tool:
//! enumerating devices, loading their attributes, walking resident
//! credentials, and running the interactive set-PIN and change-PIN dialogs
//! over a pseudo-terminal. Tool output is parsed in [`parser`] and errors
//! are classified in [`classify`] into a closed taxonomy with a
//! recommended remediation.

pub mod classify;
pub mod commands;
pub mod config;
mod error;
pub mod interactive;
pub mod launcher;
pub mod locks;
mod manager;
pub mod parser;
mod session;
pub mod tool;
pub mod types;

#[cfg(test)]
mod testing;

pub use classify::{ClassifiedError, ErrorKind, Remediation};
pub use commands::{PinDialogOutcome, PinDialogState, PinDialogUpdate};
pub use config::{ManagerConfig, Timeouts, ToolLocator};
pub use error::{Error, ExecutionError, Result};
pub use manager::Fido2Manager;
pub use session::SessionState;
pub use types::{
    Capabilities, ConfirmedPin, CredentialRecord, DeviceAttributes, DeviceRecord, DomainCredentials,
    FingerprintTemplate, Pin,
};
