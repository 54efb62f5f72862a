//! OS tool invocation with a hard deadline, and the command the scheduler runs

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{GastroError, GastroResult};

/// How often a running child is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The command line an installed trigger executes
///
/// Scheduled and manual backups share the `backup create` entry point; the
/// trigger only adds `--scheduled --cleanup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCommand {
    executable: PathBuf,
    data_dir: PathBuf,
}

impl ScheduledCommand {
    pub fn new(executable: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Use the running binary as the scheduled executable
    ///
    /// The data directory is made absolute, since cron and Task Scheduler do
    /// not start in the operator's working directory.
    pub fn current(data_dir: &Path) -> GastroResult<Self> {
        let executable = std::env::current_exe().map_err(|e| {
            GastroError::Scheduler(format!("Cannot locate the gastro executable: {}", e))
        })?;
        let data_dir = std::path::absolute(data_dir).map_err(|e| {
            GastroError::Scheduler(format!(
                "Cannot resolve data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;
        Ok(Self::new(executable, data_dir))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Render as a single shell-safe line
    pub fn render(&self) -> String {
        format!(
            "\"{}\" --data-dir \"{}\" backup create --scheduled --cleanup",
            self.executable.display(),
            self.data_dir.display()
        )
    }
}

/// Captured result of a finished OS tool
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args`, feeding `input` on stdin, killing it after `timeout`
///
/// Spawn failures and timeouts are errors; a nonzero exit is reported in the
/// returned [`CommandOutput`].
pub fn run_with_timeout(
    program: &str,
    args: &[String],
    input: Option<&str>,
    timeout: Duration,
) -> GastroResult<CommandOutput> {
    debug!(program, ?args, "running scheduler tool");

    let mut child = Command::new(program)
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| GastroError::Scheduler(format!("Failed to run {}: {}", program, e)))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
        if let Err(e) = stdin.write_all(text.as_bytes()) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(GastroError::Scheduler(format!(
                "Failed to write to {}: {}",
                program, e
            )));
        }
    }

    let status = wait_until(&mut child, timeout).map_err(|e| {
        GastroError::Scheduler(format!("Failed to wait for {}: {}", program, e))
    })?;

    let Some(status) = status else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(GastroError::Scheduler(format!(
            "{} timed out after {}s",
            program,
            timeout.as_secs()
        )));
    };

    Ok(CommandOutput {
        success: status.success(),
        code: status.code(),
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn wait_until(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Read a pipe to completion on a helper thread so the child never blocks on a full pipe
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}
