//! Set-PIN and change-PIN conversations with the interactive tool
//!
//! Both dialogs are explicit state machines over an [`Expect`] wrapper:
//!
//! ```text
//! Set:    Start -> AwaitNewPinPrompt -> AwaitConfirmPrompt -> AwaitCompletion -> Finished
//! Change: Start -> AwaitTouchOrPinPrompt -> [AwaitPinPromptAfterTouch]
//!               -> AwaitNewPinPrompt -> AwaitConfirmPrompt -> AwaitCompletion -> Finished
//! ```
//!
//! Every wait is bounded. The child is closed, and killed if still running,
//! whenever the dialog finishes.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

use crate::Result;
use crate::classify::{ClassifiedError, ErrorKind, POLICY_VIOLATION_MARKER, classify};
use crate::config::Timeouts;
use crate::interactive::{DialogSpawner, Expect, ExpectOutcome, PromptChannel};
use crate::parser;
use crate::tool::{Invocation, ToolRunner};
use crate::types::{ConfirmedPin, Pin};

const CURRENT_PIN_PROMPT: &str = "Enter current PIN";
const NEW_PIN_PROMPT: &str = "Enter new PIN";
const CONFIRM_PIN_PROMPT: &str = "Enter the same PIN again";

/// First prompts of the change dialog; the current PIN prompt is last
const CHANGE_PIN_OPENERS: [&str; 4] = ["Touch", "Tap", "Waiting for user", CURRENT_PIN_PROMPT];

/// Notification sent while a dialog runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PinDialogUpdate {
    /// The key waits for a touch before it asks for the current PIN
    TouchRequired,
}

/// Where a dialog ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinDialogOutcome {
    Success,
    /// The key rejected the new PIN
    PolicyViolation(ClassifiedError),
    OtherError(ClassifiedError),
    /// The tool stopped answering; the child was terminated
    Timeout,
}

impl PinDialogOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub const fn error(&self) -> Option<&ClassifiedError> {
        match self {
            Self::PolicyViolation(err) | Self::OtherError(err) => Some(err),
            Self::Success | Self::Timeout => None,
        }
    }

    /// Outcome for an error found in the tool's output
    fn from_error(err: ClassifiedError) -> Self {
        match err.kind {
            ErrorKind::PolicyViolation { .. } => Self::PolicyViolation(err),
            _ => Self::OtherError(err),
        }
    }

    /// Outcome for the output captured up to EOF
    fn from_completion(buffer: &str) -> Self {
        classify(buffer).map_or(Self::Success, Self::from_error)
    }

    /// Outcome for a tool that exited before the dialog got going
    fn from_early_exit(buffer: &str) -> Self {
        classify(buffer).map_or_else(
            || Self::OtherError(ClassifiedError::new(ErrorKind::Unknown, buffer.trim())),
            Self::from_error,
        )
    }
}

/// States of a PIN dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinDialogState {
    Start,
    AwaitTouchOrPinPrompt,
    AwaitPinPromptAfterTouch,
    AwaitNewPinPrompt,
    AwaitConfirmPrompt,
    AwaitCompletion,
    Finished(PinDialogOutcome),
}

#[derive(Debug, Clone)]
enum Mode {
    Set,
    Change { current: Pin },
}

/// A PIN dialog waiting to be run
#[derive(Debug)]
pub struct PinDialog {
    mode: Mode,
    new_pin: ConfirmedPin,
    timeouts: Timeouts,
    updates: Option<UnboundedSender<PinDialogUpdate>>,
}

impl PinDialog {
    /// Set a first PIN on a key that has none
    pub const fn set(new_pin: ConfirmedPin, timeouts: Timeouts) -> Self {
        Self {
            mode: Mode::Set,
            new_pin,
            timeouts,
            updates: None,
        }
    }

    /// Replace `current` with a new PIN
    pub const fn change(current: Pin, new_pin: ConfirmedPin, timeouts: Timeouts) -> Self {
        Self {
            mode: Mode::Change { current },
            new_pin,
            timeouts,
            updates: None,
        }
    }

    /// Receive [`PinDialogUpdate`]s while the dialog runs
    pub fn with_updates(mut self, updates: UnboundedSender<PinDialogUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// The interactive invocation this dialog drives
    pub fn invocation(&self, handle: &str) -> Invocation {
        match self.mode {
            Mode::Set => Invocation::set_pin(handle),
            Mode::Change { .. } => Invocation::change_pin(handle),
        }
    }

    pub const fn new_pin(&self) -> &ConfirmedPin {
        &self.new_pin
    }

    /// Drive the dialog over `channel` to a terminal state
    pub async fn run(self, channel: Box<dyn PromptChannel>) -> Result<PinDialogOutcome> {
        let mut driver = Driver {
            expect: Expect::new(channel),
            dialog: self,
        };

        let mut state = PinDialogState::Start;
        loop {
            if let PinDialogState::Finished(outcome) = state {
                driver.expect.close().await;
                return Ok(outcome);
            }

            let next = match driver.step(&state).await {
                Ok(next) => next,
                Err(err) => {
                    driver.expect.close().await;
                    return Err(err);
                }
            };
            debug!("PIN dialog {:?} -> {:?}", state, next);
            state = next;
        }
    }
}

struct Driver {
    expect: Expect,
    dialog: PinDialog,
}

impl Driver {
    async fn step(&mut self, state: &PinDialogState) -> Result<PinDialogState> {
        let timeouts = self.dialog.timeouts;

        let next = match state {
            PinDialogState::Start => match self.dialog.mode {
                Mode::Set => PinDialogState::AwaitNewPinPrompt,
                Mode::Change { .. } => PinDialogState::AwaitTouchOrPinPrompt,
            },

            PinDialogState::AwaitTouchOrPinPrompt => {
                match self.expect.expect(&CHANGE_PIN_OPENERS, timeouts.prompt).await? {
                    ExpectOutcome::Matched { index, .. }
                        if CHANGE_PIN_OPENERS[index] == CURRENT_PIN_PROMPT =>
                    {
                        self.send_current_pin().await?;
                        PinDialogState::AwaitNewPinPrompt
                    }
                    ExpectOutcome::Matched { .. } => {
                        self.notify(PinDialogUpdate::TouchRequired);
                        PinDialogState::AwaitPinPromptAfterTouch
                    }
                    other => Self::cut_short(other),
                }
            }

            PinDialogState::AwaitPinPromptAfterTouch => {
                match self.expect.expect(&[CURRENT_PIN_PROMPT], timeouts.touch).await? {
                    ExpectOutcome::Matched { .. } => {
                        self.send_current_pin().await?;
                        PinDialogState::AwaitNewPinPrompt
                    }
                    other => Self::cut_short(other),
                }
            }

            PinDialogState::AwaitNewPinPrompt => {
                match self.expect.expect(&[NEW_PIN_PROMPT], timeouts.prompt).await? {
                    ExpectOutcome::Matched { .. } => {
                        self.send_new_pin().await?;
                        PinDialogState::AwaitConfirmPrompt
                    }
                    other => Self::cut_short(other),
                }
            }

            PinDialogState::AwaitConfirmPrompt => {
                match self.expect.expect(&[CONFIRM_PIN_PROMPT], timeouts.prompt).await? {
                    ExpectOutcome::Matched { .. } => {
                        self.send_new_pin().await?;
                        PinDialogState::AwaitCompletion
                    }
                    other => Self::cut_short(other),
                }
            }

            PinDialogState::AwaitCompletion => PinDialogState::Finished(self.await_completion().await?),

            PinDialogState::Finished(outcome) => PinDialogState::Finished(outcome.clone()),
        };

        Ok(next)
    }

    /// Wait for the tool to exit after the confirmation line
    ///
    /// A policy rejection is reported straight away, so it is probed for
    /// briefly before waiting for the end of output.
    async fn await_completion(&mut self) -> Result<PinDialogOutcome> {
        let timeouts = self.dialog.timeouts;

        let probe = self
            .expect
            .expect(&[POLICY_VIOLATION_MARKER], timeouts.policy_probe)
            .await?;
        let outcome = match probe {
            ExpectOutcome::Matched { before, .. } => {
                // Pick up whatever the tool prints after the marker
                let rest = match self.expect.expect_eof(timeouts.policy_probe).await? {
                    ExpectOutcome::Matched { before, .. }
                    | ExpectOutcome::Eof { before }
                    | ExpectOutcome::Timeout { before } => before,
                };
                PinDialogOutcome::from_completion(&format!(
                    "{before}{POLICY_VIOLATION_MARKER}{rest}"
                ))
            }
            ExpectOutcome::Eof { before } => PinDialogOutcome::from_completion(&before),
            ExpectOutcome::Timeout { .. } => match self.expect.expect_eof(timeouts.prompt).await? {
                ExpectOutcome::Eof { before } => PinDialogOutcome::from_completion(&before),
                ExpectOutcome::Matched { before, .. } | ExpectOutcome::Timeout { before } => {
                    warn!("PIN dialog did not finish in time");
                    classify(&before).map_or(PinDialogOutcome::Timeout, PinDialogOutcome::from_error)
                }
            },
        };
        Ok(outcome)
    }

    /// Terminal state for a wait that ended without its prompt
    fn cut_short(outcome: ExpectOutcome) -> PinDialogState {
        let outcome = match outcome {
            ExpectOutcome::Eof { before } => {
                trace!("Tool exited early: {:?}", before);
                PinDialogOutcome::from_early_exit(&before)
            }
            ExpectOutcome::Timeout { before } => {
                trace!("No prompt within bound, saw: {:?}", before);
                warn!("PIN dialog timed out waiting for a prompt");
                PinDialogOutcome::Timeout
            }
            ExpectOutcome::Matched { .. } => PinDialogOutcome::Timeout,
        };
        PinDialogState::Finished(outcome)
    }

    async fn send_current_pin(&mut self) -> Result<()> {
        match &self.dialog.mode {
            Mode::Change { current } => self.expect.send_line(current.expose()).await,
            // The set dialog never asks for a current PIN
            Mode::Set => Ok(()),
        }
    }

    async fn send_new_pin(&mut self) -> Result<()> {
        self.expect
            .send_line(self.dialog.new_pin.pin().expose())
            .await
    }

    fn notify(&self, update: PinDialogUpdate) {
        if let Some(updates) = &self.dialog.updates {
            // Nobody listening is fine
            let _ = updates.send(update);
        }
    }
}

/// Spawn the tool for `dialog` against `handle` and run it
///
/// A policy rejection without a minimum length is completed from a device
/// info query. That query is best effort and never replaces the rejection.
pub async fn run_pin_dialog(
    dialog: PinDialog,
    spawner: &dyn DialogSpawner,
    runner: &dyn ToolRunner,
    handle: &str,
) -> Result<PinDialogOutcome> {
    let probe_timeout = dialog.timeouts.invocation;
    let channel = spawner.spawn(&dialog.invocation(handle))?;
    let outcome = dialog.run(channel).await?;

    let err = match outcome {
        PinDialogOutcome::PolicyViolation(err) => err,
        other => return Ok(other),
    };
    if matches!(err.kind, ErrorKind::PolicyViolation { min_length: Some(_) }) {
        return Ok(PinDialogOutcome::PolicyViolation(err));
    }

    let min_length = match runner
        .run(&Invocation::device_info(handle, None), probe_timeout)
        .await
    {
        Ok(output) => parser::find_min_pin_length(&output.stdout),
        Err(probe_err) => {
            debug!("Could not read the PIN policy: {}", probe_err);
            None
        }
    };
    Ok(PinDialogOutcome::PolicyViolation(err.with_min_length(min_length)))
}
