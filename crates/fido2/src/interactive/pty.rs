use std::io::{Read, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{DialogSpawner, PromptChannel};
use crate::Result;
use crate::error::ExecutionError;
use crate::tool::Invocation;

const READ_BUFFER_SIZE: usize = 1024;

/// Spawns the tool attached to a pseudo-terminal
#[derive(Debug, Clone)]
pub struct PtySpawner {
    program: PathBuf,
}

impl PtySpawner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl DialogSpawner for PtySpawner {
    fn spawn(&self, invocation: &Invocation) -> Result<Box<dyn PromptChannel>> {
        debug!(
            "Spawning {} {:?} on a pty",
            self.program.display(),
            invocation.redacted_args()
        );
        let channel = PtyChannel::spawn(&self.program, invocation.args())?;
        Ok(Box::new(channel))
    }
}

/// Interactive channel over a pseudo-terminal
///
/// A reader thread forwards output chunks; the channel closes when the tool
/// exits and the slave side hangs up.
pub struct PtyChannel {
    child: Option<Box<dyn Child + Send + Sync>>,
    writer: Box<dyn Write + Send>,
    output: mpsc::UnboundedReceiver<Vec<u8>>,
    // Trailing bytes of a character split across reads
    pending: Vec<u8>,
    // Dropping the master hangs up the terminal
    _master: Box<dyn MasterPty + Send>,
}

impl PtyChannel {
    pub fn spawn(program: &std::path::Path, args: &[String]) -> Result<Self> {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(ExecutionError::from)?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        // CommandBuilder starts from an empty environment
        for (key, value) in std::env::vars() {
            cmd.env(key, value);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|err| ExecutionError::Spawn {
            program: program.display().to_string(),
            source: std::io::Error::other(err.to_string()),
        })?;
        // Only the child may hold the slave, otherwise EOF never arrives
        drop(pair.slave);

        let mut reader = pair.master.try_clone_reader().map_err(ExecutionError::from)?;
        let writer = pair.master.take_writer().map_err(ExecutionError::from)?;

        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf) {
                    // Linux reports EIO once the slave side is gone
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            child: Some(child),
            writer,
            output: rx,
            pending: Vec::new(),
            _master: pair.master,
        })
    }

    /// OS process id of the tool, while it has not been reaped
    pub fn process_id(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.process_id())
    }
}

/// Decode the complete characters at the front of `pending`
///
/// An incomplete sequence at the end stays in `pending` for the next read.
/// Invalid bytes become U+FFFD.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    let mut text = String::new();
    loop {
        match std::str::from_utf8(pending) {
            Ok(valid) => {
                text.push_str(valid);
                pending.clear();
                return text;
            }
            Err(err) => {
                let valid = err.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&pending[..valid]));
                match err.error_len() {
                    None => {
                        pending.drain(..valid);
                        return text;
                    }
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid + len);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl PromptChannel for PtyChannel {
    async fn read_chunk(&mut self) -> Result<Option<String>> {
        loop {
            match self.output.recv().await {
                Some(bytes) => {
                    self.pending.extend_from_slice(&bytes);
                    let text = take_utf8(&mut self.pending);
                    if !text.is_empty() {
                        return Ok(Some(text));
                    }
                }
                None if self.pending.is_empty() => return Ok(None),
                None => {
                    let rest = String::from_utf8_lossy(&self.pending).into_owned();
                    self.pending.clear();
                    return Ok(Some(rest));
                }
            }
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .map_err(ExecutionError::from)?;
        self.writer.flush().map_err(ExecutionError::from)?;
        Ok(())
    }

    async fn close(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        let reaped = tokio::task::spawn_blocking(move || {
            if matches!(child.try_wait(), Ok(None)) {
                let _ = child.kill();
            }
            child.wait()
        })
        .await;

        match reaped {
            Ok(Ok(status)) => debug!("Interactive tool exited: {:?}", status),
            Ok(Err(err)) => warn!("Failed to reap interactive tool: {}", err),
            Err(err) => warn!("Reaper task failed: {}", err),
        }
    }
}

impl Drop for PtyChannel {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        // The kill lands asynchronously; reap off-thread
        std::thread::spawn(move || {
            if matches!(child.try_wait(), Ok(None)) {
                let _ = child.kill();
            }
            if let Err(err) = child.wait() {
                warn!("Failed to reap interactive tool: {}", err);
            }
        });
    }
}
