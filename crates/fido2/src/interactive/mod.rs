//! Prompt/response conversations with the tool over a terminal-like channel

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::trace;

use crate::Result;
use crate::tool::Invocation;

mod pty;

pub use pty::{PtyChannel, PtySpawner};

/// A running interactive invocation
#[async_trait]
pub trait PromptChannel: Send {
    /// Next chunk of output, `None` once the tool closed its output
    async fn read_chunk(&mut self) -> Result<Option<String>>;

    /// Write `line` followed by a line terminator
    async fn send_line(&mut self, line: &str) -> Result<()>;

    /// Kill the tool if still running and reap it
    async fn close(&mut self);
}

/// Starts interactive invocations
pub trait DialogSpawner: Send + Sync {
    fn spawn(&self, invocation: &Invocation) -> Result<Box<dyn PromptChannel>>;
}

/// Result of waiting for one of several prompts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectOutcome {
    /// `patterns[index]` appeared; `before` is the text preceding it
    Matched { index: usize, before: String },
    /// Output ended first; `before` is everything unconsumed
    Eof { before: String },
    /// Nothing matched within the bound
    Timeout { before: String },
}

/// Buffers a channel's output and waits for expected substrings
pub struct Expect {
    channel: Box<dyn PromptChannel>,
    buffer: String,
    eof: bool,
}

impl Expect {
    pub fn new(channel: Box<dyn PromptChannel>) -> Self {
        Self {
            channel,
            buffer: String::new(),
            eof: false,
        }
    }

    /// Wait until one of `patterns` shows up in the output
    ///
    /// The earliest match in the buffer wins; ties go to the pattern listed
    /// first. Text up to and including the match is consumed.
    pub async fn expect(&mut self, patterns: &[&str], within: Duration) -> Result<ExpectOutcome> {
        let deadline = Instant::now() + within;

        loop {
            if let Some((index, start, len)) = self.earliest_match(patterns) {
                let before = self.buffer[..start].to_string();
                self.buffer.drain(..start + len);
                trace!("Matched {:?}", patterns[index]);
                return Ok(ExpectOutcome::Matched { index, before });
            }

            if self.eof {
                return Ok(ExpectOutcome::Eof {
                    before: std::mem::take(&mut self.buffer),
                });
            }

            match tokio::time::timeout_at(deadline, self.channel.read_chunk()).await {
                Ok(Ok(Some(chunk))) => {
                    trace!("Read {} bytes", chunk.len());
                    self.buffer.push_str(&chunk);
                }
                Ok(Ok(None)) => self.eof = true,
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    return Ok(ExpectOutcome::Timeout {
                        before: self.buffer.clone(),
                    });
                }
            }
        }
    }

    /// Wait for the end of output
    pub async fn expect_eof(&mut self, within: Duration) -> Result<ExpectOutcome> {
        self.expect(&[], within).await
    }

    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.channel.send_line(line).await
    }

    /// Kill and reap the tool
    pub async fn close(&mut self) {
        self.channel.close().await;
    }

    fn earliest_match(&self, patterns: &[&str]) -> Option<(usize, usize, usize)> {
        patterns
            .iter()
            .enumerate()
            .filter_map(|(index, pattern)| {
                self.buffer
                    .find(pattern)
                    .map(|start| (index, start, pattern.len()))
            })
            .min_by_key(|&(index, start, _)| (start, index))
    }
}
