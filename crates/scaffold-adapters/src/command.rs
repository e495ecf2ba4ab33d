//! External command adapter using `std::process`.
//!
//! Output is captured on reader threads so a chatty tool cannot fill its
//! pipe and stall while the timeout is being polled. Commands with a
//! timeout run in their own process group; on expiry the whole group is
//! killed so grandchildren cannot keep the pipes open.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use scaffold_core::{
    application::{
        ApplicationError,
        ports::{CommandInvocation, CommandOutput, CommandRunner},
    },
    error::{ScaffoldError, ScaffoldResult},
};

/// Exit code reported when the program could not be started at all.
const SPAWN_FAILURE_CODE: i32 = 127;

/// How long to wait for captured output once the process is gone.
const READER_GRACE: Duration = Duration::from_millis(500);

/// Runs commands as child processes of the scaffold binary.
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    poll_interval: Duration,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }

    fn spawn(&self, invocation: &CommandInvocation) -> ScaffoldResult<Child> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        if invocation.timeout.is_some() {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command.spawn().map_err(|e| spawn_error(invocation, &e))
    }

    fn wait_with_timeout(
        &self,
        invocation: &CommandInvocation,
        mut child: Child,
        timeout: Duration,
    ) -> ScaffoldResult<CommandOutput> {
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let deadline = Instant::now() + timeout;

        let status = loop {
            match child.try_wait().map_err(|e| wait_error(invocation, &e))? {
                Some(status) => break Some(status),
                None if Instant::now() >= deadline => break None,
                None => thread::sleep(self.poll_interval),
            }
        };

        let Some(status) = status else {
            warn!(command = %invocation, ?timeout, "Command timed out, killing its process group");
            kill_group(&mut child);
            let _ = child.wait();
            return Err(ApplicationError::ExternalTool {
                command: invocation.to_string(),
                exit_code: None,
                stderr: collect(stderr, READER_GRACE),
                timed_out: true,
            }
            .into());
        };

        // A background grandchild may still hold the pipes.
        let wait = deadline.saturating_duration_since(Instant::now()).max(READER_GRACE);
        Ok(output(status, collect(stdout, wait), collect(stderr, READER_GRACE)))
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for ProcessRunner {
    #[instrument(skip_all, fields(command = %invocation, cwd = %invocation.cwd.display()))]
    fn run(&self, invocation: &CommandInvocation) -> ScaffoldResult<CommandOutput> {
        let child = self.spawn(invocation)?;

        let result = match invocation.timeout {
            Some(timeout) => self.wait_with_timeout(invocation, child, timeout)?,
            None => {
                let out = child
                    .wait_with_output()
                    .map_err(|e| wait_error(invocation, &e))?;
                output(
                    out.status,
                    String::from_utf8_lossy(&out.stdout).into_owned(),
                    String::from_utf8_lossy(&out.stderr).into_owned(),
                )
            }
        };

        debug!(exit_code = ?result.exit_code, "Command finished");
        Ok(result)
    }
}

fn output(status: ExitStatus, stdout: String, stderr: String) -> CommandOutput {
    CommandOutput {
        exit_code: status.code(),
        stdout,
        stderr,
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

/// Captured output, or an empty string if the pipe stays open past `wait`.
fn collect(rx: Option<Receiver<String>>, wait: Duration) -> String {
    rx.and_then(|rx| rx.recv_timeout(wait).ok())
        .unwrap_or_default()
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let killed = i32::try_from(child.id())
        .ok()
        .map(|pid| killpg(Pid::from_raw(pid), Signal::SIGKILL));
    if !matches!(killed, Some(Ok(()))) {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

fn spawn_error(invocation: &CommandInvocation, e: &io::Error) -> ScaffoldError {
    ApplicationError::ExternalTool {
        command: invocation.to_string(),
        exit_code: Some(SPAWN_FAILURE_CODE),
        stderr: format!("failed to start '{}': {e}", invocation.program),
        timed_out: false,
    }
    .into()
}

fn wait_error(invocation: &CommandInvocation, e: &io::Error) -> ScaffoldError {
    ScaffoldError::Internal {
        message: format!("failed waiting for '{invocation}': {e}"),
    }
}
