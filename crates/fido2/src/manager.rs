use std::sync::Arc;
use std::time::Instant;

use regex::Regex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::classify::ClassifiedError;
use crate::commands::{self, PinDialog, PinDialogOutcome, PinDialogUpdate};
use crate::config::{ManagerConfig, Timeouts};
use crate::interactive::{DialogSpawner, PtySpawner};
use crate::launcher::{SystemTerminal, TerminalLauncher};
use crate::locks::DeviceLocks;
use crate::session::SessionState;
use crate::tool::{Invocation, ProcessRunner, ToolRunner};
use crate::types::{ConfirmedPin, DeviceRecord, DomainCredentials, FingerprintTemplate, Pin};
use crate::{Error, Result};

/// Device session controller
///
/// Drives the `fido2-token2` tool for one or more authenticators. Session
/// state is owned by the caller and passed into each operation; invocations
/// against the same device handle never overlap.
pub struct Fido2Manager {
    runner: Arc<dyn ToolRunner>,
    spawner: Arc<dyn DialogSpawner>,
    launcher: Arc<dyn TerminalLauncher>,
    timeouts: Timeouts,
    reset_pattern: Regex,
    locks: DeviceLocks,
}

impl std::fmt::Debug for Fido2Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fido2Manager")
            .field("timeouts", &self.timeouts)
            .field("reset_pattern", &self.reset_pattern.as_str())
            .finish_non_exhaustive()
    }
}

impl Fido2Manager {
    /// Create a manager that runs the configured tool
    pub fn new(config: ManagerConfig) -> Result<Self> {
        info!("Using {}", config.tool.display());
        Self::with_parts(
            Arc::new(ProcessRunner::new(&config.tool)),
            Arc::new(PtySpawner::new(&config.tool)),
            Arc::new(SystemTerminal::new(&config.tool)),
            config.timeouts,
            &config.reset_pattern,
        )
    }

    /// Create a manager from explicit collaborators
    pub fn with_parts(
        runner: Arc<dyn ToolRunner>,
        spawner: Arc<dyn DialogSpawner>,
        launcher: Arc<dyn TerminalLauncher>,
        timeouts: Timeouts,
        reset_pattern: &str,
    ) -> Result<Self> {
        Ok(Self {
            runner,
            spawner,
            launcher,
            timeouts,
            reset_pattern: Regex::new(reset_pattern)?,
            locks: DeviceLocks::new(),
        })
    }

    pub const fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// List connected devices, or nothing if the listing failed
    ///
    /// The failure is logged; callers retry with a refresh.
    pub async fn list_devices(&self) -> Vec<DeviceRecord> {
        match self.try_list_devices().await {
            Ok(devices) => devices,
            Err(err) => {
                warn!("Failed to list devices: {}", err);
                Vec::new()
            }
        }
    }

    /// List connected devices, reporting why the listing failed
    pub async fn try_list_devices(&self) -> Result<Vec<DeviceRecord>> {
        commands::list_devices(self.runner.as_ref(), self.timeouts.invocation).await
    }

    /// End the current session, if any, and list devices again
    pub async fn refresh(&self, session: &mut Option<SessionState>) -> Vec<DeviceRecord> {
        if let Some(ended) = session.take() {
            ended.end();
        }
        self.list_devices().await
    }

    /// Start a session with the device listed at `ordinal`
    ///
    /// Ordinals are re-resolved against a fresh listing every time.
    pub async fn select_device(&self, ordinal: usize, pin: Option<Pin>) -> Result<SessionState> {
        let device = self
            .try_list_devices()
            .await?
            .into_iter()
            .find(|device| device.ordinal == ordinal)
            .ok_or(Error::NoSuchDevice(ordinal))?;
        info!("Selected {}", device);
        Ok(SessionState::new(device, pin))
    }

    /// Fetch storage and device info into the session
    ///
    /// Returns the warning for a legacy key, whose snapshot then only holds
    /// device info.
    pub async fn load_attributes(
        &self,
        session: &mut SessionState,
    ) -> Result<Option<ClassifiedError>> {
        let _guard = self.locks.acquire(session.handle()).await;
        let load = commands::load_attributes(
            self.runner.as_ref(),
            session.handle(),
            session.pin(),
            self.timeouts.invocation,
        )
        .await?;
        session.set_attributes(load.attributes);
        Ok(load.warning)
    }

    /// Fetch device info only, without using the PIN
    pub async fn load_basic_attributes(&self, session: &mut SessionState) -> Result<()> {
        let _guard = self.locks.acquire(session.handle()).await;
        let attributes = commands::load_basic_attributes(
            self.runner.as_ref(),
            session.handle(),
            self.timeouts.invocation,
        )
        .await?;
        session.set_attributes(attributes);
        Ok(())
    }

    /// All resident credentials on the session's device, by domain
    pub async fn list_credentials(&self, session: &SessionState) -> Result<Vec<DomainCredentials>> {
        let pin = session.pin().ok_or(Error::PinRequired)?;
        let _guard = self.locks.acquire(session.handle()).await;
        commands::list_credentials(
            self.runner.as_ref(),
            session.handle(),
            Some(pin),
            self.timeouts.invocation,
        )
        .await
    }

    /// Open a terminal that deletes `credential_id`; re-list to see the result
    pub fn delete_credential(&self, session: &SessionState, credential_id: &str) -> Result<()> {
        self.launcher
            .launch(&Invocation::delete_credential(session.handle(), credential_id))
    }

    /// Set a first PIN; the session PIN becomes `new_pin` on success
    pub async fn set_pin(
        &self,
        session: &mut SessionState,
        new_pin: ConfirmedPin,
        updates: Option<UnboundedSender<PinDialogUpdate>>,
    ) -> Result<PinDialogOutcome> {
        let dialog = with_updates(PinDialog::set(new_pin, self.timeouts), updates);
        self.pin_dialog(session, dialog).await
    }

    /// Change the session PIN; it becomes `new_pin` on success
    pub async fn change_pin(
        &self,
        session: &mut SessionState,
        new_pin: ConfirmedPin,
        updates: Option<UnboundedSender<PinDialogUpdate>>,
    ) -> Result<PinDialogOutcome> {
        let current = session.pin().cloned().ok_or(Error::PinRequired)?;
        let dialog = with_updates(PinDialog::change(current, new_pin, self.timeouts), updates);
        self.pin_dialog(session, dialog).await
    }

    async fn pin_dialog(&self, session: &mut SessionState, dialog: PinDialog) -> Result<PinDialogOutcome> {
        let new_pin = dialog.new_pin().pin().clone();
        let outcome = {
            let _guard = self.locks.acquire(session.handle()).await;
            commands::run_pin_dialog(
                dialog,
                self.spawner.as_ref(),
                self.runner.as_ref(),
                session.handle(),
            )
            .await?
        };

        match &outcome {
            PinDialogOutcome::Success => session.set_pin(new_pin),
            other => debug!("PIN dialog ended with {:?}", other),
        }
        Ok(outcome)
    }

    /// Factory reset the first resettable key plugged in at `replugged_at`
    pub async fn factory_reset(&self, replugged_at: Instant) -> Result<String> {
        let handle =
            commands::resettable_handle(self.runner.as_ref(), &self.reset_pattern, &self.timeouts)
                .await?;
        let _guard = self.locks.acquire(&handle).await;
        commands::reset_device(self.runner.as_ref(), &handle, replugged_at, &self.timeouts).await?;
        Ok(handle)
    }

    /// Enrolled fingerprint templates
    pub async fn list_fingerprints(&self, session: &SessionState) -> Result<Vec<FingerprintTemplate>> {
        let pin = session.pin().ok_or(Error::PinRequired)?;
        let _guard = self.locks.acquire(session.handle()).await;
        commands::list_fingerprints(
            self.runner.as_ref(),
            session.handle(),
            Some(pin),
            self.timeouts.invocation,
        )
        .await
    }

    /// Open a terminal that enrolls a new fingerprint
    pub fn enroll_fingerprint(&self, session: &SessionState) -> Result<()> {
        self.launcher
            .launch(&Invocation::enroll_fingerprint(session.handle()))
    }

    pub fn delete_fingerprint(&self, session: &SessionState, template_id: &str) -> Result<()> {
        self.launcher
            .launch(&Invocation::delete_fingerprint(session.handle(), template_id))
    }

    pub fn rename_fingerprint(&self, session: &SessionState, template_id: &str, name: &str) -> Result<()> {
        self.launcher
            .launch(&Invocation::rename_fingerprint(session.handle(), template_id, name))
    }
}

fn with_updates(dialog: PinDialog, updates: Option<UnboundedSender<PinDialogUpdate>>) -> PinDialog {
    match updates {
        Some(updates) => dialog.with_updates(updates),
        None => dialog,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::classify::ErrorKind;
    use crate::config::RESETTABLE_HANDLE_PATTERN;
    use crate::testing::{
        FakeRunner, RecordingLauncher, ScriptStep, ScriptedChannel, ScriptedSpawner, TranscriptEntry,
        failed, ok,
    };

    use ScriptStep::{AwaitLine, Emit, Hang};

    const LISTING: &str = "\
/dev/hidraw0: vendor=0x349e, product=0x0022 (Token2 FIDO2 Security Key)
/dev/hidraw3: vendor=0x1050, product=0x0407 (Yubico YubiKey)
";

    struct Parts {
        runner: Arc<FakeRunner>,
        spawner: Arc<ScriptedSpawner>,
        launcher: Arc<RecordingLauncher>,
    }

    impl Parts {
        fn manager(&self) -> Fido2Manager {
            Fido2Manager::with_parts(
                self.runner.clone(),
                self.spawner.clone(),
                self.launcher.clone(),
                Timeouts::default(),
                RESETTABLE_HANDLE_PATTERN,
            )
            .unwrap()
        }
    }

    fn parts(runner: FakeRunner, spawner: ScriptedSpawner) -> Parts {
        Parts {
            runner: Arc::new(runner),
            spawner: Arc::new(spawner),
            launcher: Arc::new(RecordingLauncher::default()),
        }
    }

    fn listing_runner() -> FakeRunner {
        FakeRunner::new(|inv| match inv.operation() {
            "list devices" => ok(LISTING),
            "storage info" => ok("existing rk(s): 1\nremaining rk(s): 24\n"),
            "device info" => ok("pin retries: 8\nuv modality: 0x2 (fingerprint)\nminpinlen: 4\n"),
            _ => failed("FIDO_ERR_RX"),
        })
    }

    fn set_pin_script(tail: &'static str) -> ScriptedChannel {
        ScriptedChannel::new(vec![
            Emit("Enter new PIN for /dev/hidraw3: "),
            AwaitLine,
            Emit("Enter the same PIN again: "),
            AwaitLine,
            Emit(tail),
        ])
        .0
    }

    fn confirmed(pin: &str) -> ConfirmedPin {
        ConfirmedPin::confirm(Pin::new(pin), &Pin::new(pin)).unwrap()
    }

    #[tokio::test]
    async fn test_select_resolves_ordinal_to_handle() {
        let parts = parts(listing_runner(), ScriptedSpawner::default());
        let manager = parts.manager();

        let session = manager.select_device(2, None).await.unwrap();
        assert_eq!(session.handle(), "/dev/hidraw3");

        let err = manager.select_device(3, None).await.unwrap_err();
        assert!(matches!(err, Error::NoSuchDevice(3)));
    }

    #[tokio::test]
    async fn test_refresh_ends_session() {
        let parts = parts(listing_runner(), ScriptedSpawner::default());
        let manager = parts.manager();

        let mut session = Some(manager.select_device(1, Some(Pin::new("1234"))).await.unwrap());
        let devices = manager.refresh(&mut session).await;
        assert!(session.is_none());
        assert_eq!(devices.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_listing_yields_no_devices() {
        let parts = parts(FakeRunner::new(|_| failed("fido_init failed")), ScriptedSpawner::default());
        assert!(parts.manager().list_devices().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_attributes_derives_capabilities() {
        let parts = parts(listing_runner(), ScriptedSpawner::default());
        let manager = parts.manager();

        let mut session = manager.select_device(1, Some(Pin::new("1234"))).await.unwrap();
        let warning = manager.load_attributes(&mut session).await.unwrap();

        assert!(warning.is_none());
        let capabilities = session.capabilities();
        assert!(capabilities.can_manage_passkeys);
        assert!(capabilities.can_change_pin);
        assert!(capabilities.can_manage_fingerprints);
    }

    #[tokio::test]
    async fn test_set_pin_success_updates_session_pin() {
        let parts = parts(listing_runner(), ScriptedSpawner::with(set_pin_script("\r\n")));
        let manager = parts.manager();
        let mut session = manager.select_device(2, None).await.unwrap();

        let outcome = manager
            .set_pin(&mut session, confirmed("482193"), None)
            .await
            .unwrap();

        assert_eq!(outcome, PinDialogOutcome::Success);
        assert_eq!(session.pin().map(Pin::expose), Some("482193"));
        assert_eq!(parts.spawner.spawned()[0].args(), ["-S", "/dev/hidraw3"]);
    }

    #[tokio::test]
    async fn test_policy_violation_keeps_session_pin() {
        let parts = parts(
            listing_runner(),
            ScriptedSpawner::with(set_pin_script("FIDO_ERR_PIN_POLICY_VIOLATION\r\n")),
        );
        let manager = parts.manager();
        let mut session = manager.select_device(2, Some(Pin::new("0000"))).await.unwrap();

        let outcome = manager
            .set_pin(&mut session, confirmed("1234"), None)
            .await
            .unwrap();

        // Minimum length comes from the follow-up info query
        assert_eq!(
            outcome.error().map(|err| err.kind),
            Some(ErrorKind::PolicyViolation { min_length: Some(4) })
        );
        assert!(session.pin().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_pin_timeout_keeps_session_pin() {
        let (channel, transcript) = ScriptedChannel::new(vec![
            Emit("Enter new PIN for /dev/hidraw3: "),
            AwaitLine,
            Emit("Enter the same PIN again: "),
            AwaitLine,
            Hang,
        ]);
        let parts = parts(listing_runner(), ScriptedSpawner::with(channel));
        let manager = parts.manager();
        let mut session = manager.select_device(2, Some(Pin::new("1234"))).await.unwrap();

        let outcome = manager
            .set_pin(&mut session, confirmed("482193"), None)
            .await
            .unwrap();

        assert_eq!(outcome, PinDialogOutcome::Timeout);
        assert_eq!(session.pin().map(Pin::expose), Some("1234"));
        assert_eq!(transcript.lock().last(), Some(&TranscriptEntry::Closed));
    }

    #[tokio::test]
    async fn test_change_pin_needs_current_pin() {
        let parts = parts(listing_runner(), ScriptedSpawner::default());
        let manager = parts.manager();
        let mut session = manager.select_device(1, None).await.unwrap();

        let err = manager
            .change_pin(&mut session, confirmed("482193"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PinRequired));
        assert!(parts.spawner.spawned().is_empty());
    }

    #[tokio::test]
    async fn test_hand_offs_target_session_device() {
        let parts = parts(listing_runner(), ScriptedSpawner::default());
        let manager = parts.manager();
        let session = manager.select_device(1, Some(Pin::new("1234"))).await.unwrap();

        manager.delete_credential(&session, "AbCdEf==").unwrap();
        manager.enroll_fingerprint(&session).unwrap();

        let launched = parts.launcher.launched();
        assert_eq!(launched[0].args(), ["-D", "-i", "AbCdEf==", "/dev/hidraw0"]);
        assert_eq!(launched[1].args(), ["-S", "-e", "/dev/hidraw0"]);
    }

    #[tokio::test]
    async fn test_credentials_need_a_pin() {
        let parts = parts(listing_runner(), ScriptedSpawner::default());
        let manager = parts.manager();
        let session = manager.select_device(1, Some(Pin::new("0000"))).await.unwrap();

        let err = manager.list_credentials(&session).await.unwrap_err();
        assert!(matches!(err, Error::PinRequired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_waits_for_busy_handle() {
        let runner = FakeRunner::new(|inv| match inv.operation() {
            "list devices" => ok(LISTING),
            _ => ok(""),
        });
        let parts = parts(runner, ScriptedSpawner::default());
        let manager = parts.manager();

        let held = manager.locks.acquire("/dev/hidraw0").await;
        let blocked =
            tokio::time::timeout(Duration::from_secs(2), manager.factory_reset(Instant::now())).await;
        assert!(blocked.is_err());
        assert!(parts.runner.calls().iter().all(|call| call.args()[0] != "-R"));

        drop(held);
        let handle = manager.factory_reset(Instant::now()).await.unwrap();
        assert_eq!(handle, "/dev/hidraw0");
        assert_eq!(parts.runner.calls().last().unwrap().args(), ["-R", "/dev/hidraw0"]);
    }

    #[test]
    fn test_invalid_reset_pattern_is_rejected() {
        let err = Fido2Manager::with_parts(
            Arc::new(listing_runner()),
            Arc::new(ScriptedSpawner::default()),
            Arc::new(RecordingLauncher::default()),
            Timeouts::default(),
            "(unclosed",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Pattern(_)));
    }
}
