//! Scripted stand-ins for the tool, used by the unit tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::commands::PinDialogUpdate;
use crate::error::ExecutionError;
use crate::interactive::{DialogSpawner, PromptChannel};
use crate::launcher::TerminalLauncher;
use crate::tool::{Invocation, ToolOutput, ToolRunner};
use crate::{Error, Result};

/// Successful output
pub(crate) fn ok(stdout: &str) -> Result<ToolOutput> {
    Ok(ToolOutput {
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

/// Failed output with `stderr`
pub(crate) fn failed(stderr: &str) -> Result<ToolOutput> {
    Ok(ToolOutput {
        code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    })
}

type Responder = Box<dyn Fn(&Invocation) -> Result<ToolOutput> + Send + Sync>;

/// Batch runner answering from a closure and recording every call
pub(crate) struct FakeRunner {
    respond: Responder,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeRunner {
    pub(crate) fn new(
        respond: impl Fn(&Invocation) -> Result<ToolOutput> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation, _timeout: Duration) -> Result<ToolOutput> {
        self.calls.lock().push(invocation.clone());
        (self.respond)(invocation)
    }
}

/// One step of a scripted interactive tool
#[derive(Debug, Clone, Copy)]
pub(crate) enum ScriptStep {
    /// Print text
    Emit(&'static str),
    /// Block until the controller has sent a line
    AwaitLine,
    /// Never print anything again
    Hang,
}

/// What happened on a scripted channel, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TranscriptEntry {
    Sent(String),
    Update(PinDialogUpdate),
    Closed,
}

pub(crate) type Transcript = Arc<Mutex<Vec<TranscriptEntry>>>;

/// Interactive channel that plays back a script
///
/// Dialog updates received before each line is sent are folded into the
/// transcript, so tests can check notifications against responses.
pub(crate) struct ScriptedChannel {
    steps: VecDeque<ScriptStep>,
    pending_lines: usize,
    transcript: Transcript,
    updates: Option<mpsc::UnboundedReceiver<PinDialogUpdate>>,
}

impl ScriptedChannel {
    pub(crate) fn new(steps: Vec<ScriptStep>) -> (Self, Transcript) {
        let transcript = Transcript::default();
        let channel = Self {
            steps: steps.into(),
            pending_lines: 0,
            transcript: Arc::clone(&transcript),
            updates: None,
        };
        (channel, transcript)
    }

    pub(crate) fn observing(mut self, updates: mpsc::UnboundedReceiver<PinDialogUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    fn drain_updates(&mut self) {
        if let Some(updates) = self.updates.as_mut() {
            while let Ok(update) = updates.try_recv() {
                self.transcript.lock().push(TranscriptEntry::Update(update));
            }
        }
    }
}

#[async_trait]
impl PromptChannel for ScriptedChannel {
    async fn read_chunk(&mut self) -> Result<Option<String>> {
        loop {
            match self.steps.front().copied() {
                None => return Ok(None),
                Some(ScriptStep::Emit(text)) => {
                    self.steps.pop_front();
                    return Ok(Some(text.to_string()));
                }
                Some(ScriptStep::AwaitLine) if self.pending_lines > 0 => {
                    self.pending_lines -= 1;
                    self.steps.pop_front();
                }
                Some(ScriptStep::AwaitLine) | Some(ScriptStep::Hang) => {
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.drain_updates();
        self.pending_lines += 1;
        self.transcript
            .lock()
            .push(TranscriptEntry::Sent(line.to_string()));
        Ok(())
    }

    async fn close(&mut self) {
        self.drain_updates();
        self.transcript.lock().push(TranscriptEntry::Closed);
    }
}

/// Hands out prepared channels in order
#[derive(Default)]
pub(crate) struct ScriptedSpawner {
    channels: Mutex<VecDeque<ScriptedChannel>>,
    spawned: Mutex<Vec<Invocation>>,
}

impl ScriptedSpawner {
    pub(crate) fn with(channel: ScriptedChannel) -> Self {
        let spawner = Self::default();
        spawner.channels.lock().push_back(channel);
        spawner
    }

    pub(crate) fn spawned(&self) -> Vec<Invocation> {
        self.spawned.lock().clone()
    }
}

impl DialogSpawner for ScriptedSpawner {
    fn spawn(&self, invocation: &Invocation) -> Result<Box<dyn PromptChannel>> {
        self.spawned.lock().push(invocation.clone());
        let channel = self.channels.lock().pop_front().ok_or_else(|| {
            Error::Execution(ExecutionError::Pty("no scripted channel left".to_string()))
        })?;
        Ok(Box::new(channel))
    }
}

/// Records hand-offs instead of opening a terminal
#[derive(Default)]
pub(crate) struct RecordingLauncher {
    launched: Mutex<Vec<Invocation>>,
}

impl RecordingLauncher {
    pub(crate) fn launched(&self) -> Vec<Invocation> {
        self.launched.lock().clone()
    }
}

impl TerminalLauncher for RecordingLauncher {
    fn launch(&self, invocation: &Invocation) -> Result<()> {
        self.launched.lock().push(invocation.clone());
        Ok(())
    }
}
