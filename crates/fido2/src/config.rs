//! Controller configuration and tool resolution

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

/// Name of the tool binary
pub const TOOL_NAME: &str = "fido2-token2";

/// Handles a factory reset may target: macOS registry ids and Linux hidraw nodes
pub const RESETTABLE_HANDLE_PATTERN: &str = r"(ioreg://\d+|/dev/hidraw\d+)";

/// Bounds on every wait the controller performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Whole batch invocation
    pub invocation: Duration,
    /// Waiting for one expected prompt
    pub prompt: Duration,
    /// Waiting for the PIN prompt after the key asked for a touch
    pub touch: Duration,
    /// Waiting for an immediate policy marker after the confirmation line
    pub policy_probe: Duration,
    /// How long after replugging a factory reset is still accepted
    pub replug_window: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            invocation: Duration::from_secs(20),
            prompt: Duration::from_secs(20),
            touch: Duration::from_secs(30),
            policy_probe: Duration::from_secs(1),
            replug_window: Duration::from_secs(10),
        }
    }
}

impl Timeouts {
    /// Same bound for invocations and prompts
    pub fn with_base(base: Duration) -> Self {
        Self {
            invocation: base,
            prompt: base,
            ..Self::default()
        }
    }
}

/// Configuration of a [`crate::Fido2Manager`]
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Resolved tool location
    pub tool: PathBuf,
    pub timeouts: Timeouts,
    /// Regular expression selecting the factory reset target
    pub reset_pattern: String,
}

impl ManagerConfig {
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            timeouts: Timeouts::default(),
            reset_pattern: RESETTABLE_HANDLE_PATTERN.to_string(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_reset_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.reset_pattern = pattern.into();
        self
    }
}

/// Locates the tool binary once at startup
///
/// Search order: explicit location, locations bundled next to the running
/// executable, adjacent development directories, the search path, and
/// finally the bare name.
#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    explicit: Option<PathBuf>,
    exe_dir: Option<PathBuf>,
    work_dir: Option<PathBuf>,
}

impl ToolLocator {
    /// Locator for the current process
    pub fn new() -> Self {
        Self {
            explicit: None,
            exe_dir: std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
            work_dir: std::env::current_dir().ok(),
        }
    }

    pub fn with_explicit(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    pub fn with_dirs(mut self, exe_dir: Option<PathBuf>, work_dir: Option<PathBuf>) -> Self {
        self.exe_dir = exe_dir;
        self.work_dir = work_dir;
        self
    }

    /// Candidate locations in search order, excluding the search path
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(explicit) = &self.explicit {
            candidates.push(explicit.clone());
        }

        if let Some(exe_dir) = &self.exe_dir {
            candidates.push(exe_dir.join(TOOL_NAME));
            if let Some(bundle) = exe_dir.parent() {
                candidates.push(bundle.join("MacOS").join(TOOL_NAME));
                candidates.push(bundle.join("Frameworks").join(TOOL_NAME));
            }
        }

        for base in self.exe_dir.iter().chain(self.work_dir.iter()) {
            for dir in ["build/staging", "staging", "build/tools", "tools"] {
                candidates.push(base.join(dir).join(TOOL_NAME));
            }
        }

        candidates
    }

    /// First existing candidate, then the search path, then the bare name
    pub fn resolve(&self) -> PathBuf {
        if let Some(found) = self.candidates().into_iter().find(|path| path.is_file()) {
            info!("Using tool at {}", found.display());
            return found;
        }

        match which::which(TOOL_NAME) {
            Ok(found) => {
                info!("Using tool from search path: {}", found.display());
                found
            }
            Err(err) => {
                debug!("{} not found on search path: {}", TOOL_NAME, err);
                PathBuf::from(TOOL_NAME)
            }
        }
    }
}
