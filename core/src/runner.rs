use ::std::{io, thread};
use ::std::io::Read;
use ::std::os::unix::process::CommandExt;
use ::std::process::{self, Child, ExitStatus, Stdio};
use ::std::str::FromStr;
use ::std::sync::mpsc::{self, RecvTimeoutError};
use ::std::time::{Duration, Instant};
use ::libc::pid_t;
use ::log::Level;
use ::nix::sys::signal::{self, Signal};
use ::nix::unistd::Pid;
use ::scopeguard::{self, ScopeGuard};
use ::command_line::CommandLine;
use ::interrupt::Interrupter;
use ::logger::{self, SharedLogger};
use ::result::{Error, ErrorKind, Result, CommentError};

pub const DEFAULT_SHELL: &'static str = "/bin/bash";

/// Decides whether a finished command succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessPolicy {
    /// Fails iff anything was written to stderr. The exit status is ignored,
    /// so a warning on stderr fails the call and a silent non-zero exit passes.
    LegacyStderr,
    /// Fails iff the exit status is non-zero or the process died from a signal.
    ExitStatus,
}

impl SuccessPolicy {
    pub fn evaluate(&self, captured: Captured) -> Result<String> {
        match *self {
            SuccessPolicy::LegacyStderr => {
                if captured.stderr.len() != 0 {
                    return Err(Error::execution(captured.stderr));
                }
                Ok(captured.stdout)
            }
            SuccessPolicy::ExitStatus => {
                if captured.success() {
                    return Ok(captured.stdout);
                }
                if !captured.stderr.is_empty() {
                    return Err(Error::execution(captured.stderr));
                }
                Err(Error::execution(match captured.exit_code {
                    Some(code) => format!("'{}' exited with status {}", captured.command, code),
                    None => format!("'{}' was killed by a signal", captured.command),
                }))
            }
        }
    }
}

impl Default for SuccessPolicy {
    fn default() -> Self {
        SuccessPolicy::LegacyStderr
    }
}

impl FromStr for SuccessPolicy {
    type Err = String;

    fn from_str(s: &str) -> ::std::result::Result<Self, String> {
        match s {
            "legacy" | "legacy-stderr" => Ok(SuccessPolicy::LegacyStderr),
            "exit-status" => Ok(SuccessPolicy::ExitStatus),
            other => Err(format!("unknown success policy '{}'", other)),
        }
    }
}

/// How a `CommandLine` reaches the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Rendered to text and passed to `<shell> -c`.
    Shell,
    /// Spawned from its argument vector, no interpreter involved.
    Direct,
}

impl Default for Invocation {
    fn default() -> Self {
        Invocation::Shell
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub shell: String,
    pub policy: SuccessPolicy,
    pub invocation: Invocation,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    /// Time between SIGTERM and SIGKILL when a child has to be stopped.
    pub kill_grace: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            shell: DEFAULT_SHELL.to_string(),
            policy: SuccessPolicy::default(),
            invocation: Invocation::default(),
            timeout: None,
            poll_interval: Duration::from_millis(10),
            kill_grace: Duration::from_secs(1),
        }
    }
}

/// Everything a finished command left behind.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs commands synchronously and captures both output streams.
///
/// Every call owns its child process and reaps it before returning, on error
/// paths too. A `Runner` holds no per-call state and can be shared between
/// threads.
pub struct Runner {
    config: RunnerConfig,
    logger: SharedLogger,
    interrupter: Interrupter,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Runner { config, logger: logger::global_logger(), interrupter: Interrupter::new() }
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_interrupter(mut self, interrupter: Interrupter) -> Self {
        self.interrupter = interrupter;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn interrupter(&self) -> &Interrupter {
        &self.interrupter
    }

    /// Runs `command` through `<shell> -c` and applies the success policy.
    pub fn execute(&self, command: &str) -> Result<String> {
        let captured = self.capture_shell(command)?;
        self.apply(captured)
    }

    pub fn run(&self, line: &CommandLine) -> Result<String> {
        let captured = self.capture(line)?;
        self.apply(captured)
    }

    /// Like `run`, without applying the success policy.
    pub fn capture(&self, line: &CommandLine) -> Result<Captured> {
        match self.config.invocation {
            Invocation::Shell => self.capture_shell(&line.to_shell_string()),
            Invocation::Direct => self.spawn_and_wait(line.to_command(), &line.to_shell_string()),
        }
    }

    pub fn capture_shell(&self, command: &str) -> Result<Captured> {
        let mut shell = process::Command::new(&self.config.shell);
        shell.arg("-c").arg(command);
        self.spawn_and_wait(shell, command)
    }

    fn apply(&self, captured: Captured) -> Result<String> {
        let error_output = if captured.stderr.is_empty() { None } else { Some(captured.stderr.clone()) };
        let res = self.config.policy.evaluate(captured);
        if let Some(error_output) = error_output {
            // A rejected result carries the text in its error, the caller reports it.
            let level = if res.is_ok() { Level::Warn } else { Level::Debug };
            emit!(self.logger, level, "Shell Error Output: {}", error_output);
        }
        res
    }

    fn spawn_and_wait(&self, mut command: process::Command, display: &str) -> Result<Captured> {
        emit!(self.logger, Level::Debug, "Shell cmd: {}", display);
        // An interrupt that arrives too late for this call must not fail the next one.
        defer! {{ self.interrupter.take(); }}

        // Own process group, so background jobs of the command can be stopped with it.
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()
            .map_err(|e| Error::spawn(format!("Error spawning '{}'", display), e))?;
        let mut child = scopeguard::guard(child, |mut child| {
            let _ = signal::killpg(process_group(&child), Signal::SIGKILL);
            let _ = child.kill();
            let _ = child.wait();
        });

        // Both pipes are drained while waiting, a full pipe would stall the child.
        let (sender, receiver) = mpsc::channel();
        drain(Stream::Stdout, child.stdout.take(), sender.clone());
        drain(Stream::Stderr, child.stderr.take(), sender);

        let deadline = self.config.timeout.map(|timeout| (Instant::now() + timeout, timeout));
        let mut status: Option<ExitStatus> = None;
        let mut stdout: Option<String> = None;
        let mut stderr: Option<String> = None;

        while status.is_none() || stdout.is_none() || stderr.is_none() {
            if status.is_none() {
                status = child.try_wait()
                    .comment_error(format!("Error waiting for '{}'", display))?;
            }

            if self.interrupter.take() {
                emit!(self.logger, Level::Warn, "Interrupted, stopping '{}'", display);
                self.terminate(&mut child);
                return Err(Error::interrupted(
                    format!("Interrupted while waiting for '{}'", display)));
            }

            if let Some((deadline, timeout)) = deadline {
                if Instant::now() >= deadline {
                    emit!(self.logger, Level::Warn, "Timed out, stopping '{}'", display);
                    self.terminate(&mut child);
                    return Err(Error::timeout(
                        format!("'{}' did not finish within {:?}", display, timeout)));
                }
            }

            if stdout.is_some() && stderr.is_some() {
                thread::sleep(self.config.poll_interval);
                continue;
            }
            match receiver.recv_timeout(self.config.poll_interval) {
                Ok((Stream::Stdout, output)) => {
                    stdout = Some(output
                        .comment_error(format!("Error reading stdout of '{}'", display))?);
                }
                Ok((Stream::Stderr, output)) => {
                    stderr = Some(output
                        .comment_error(format!("Error reading stderr of '{}'", display))?);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::simple(ErrorKind::Io,
                        format!("Pipe reader of '{}' exited without a result", display)));
                }
            }
        }
        drop(ScopeGuard::into_inner(child));

        let stdout = stdout.unwrap_or_default();
        emit!(self.logger, Level::Debug, "Shell Output: {}", stdout);
        Ok(Captured {
            command: display.to_string(),
            stdout,
            stderr: stderr.unwrap_or_default(),
            exit_code: status.and_then(|status| status.code()),
        })
    }

    // SIGTERM to the whole group first, SIGKILL once the grace period runs out.
    // Always reaps the child itself.
    fn terminate(&self, child: &mut Child) {
        let group = process_group(child);
        if signal::killpg(group, Signal::SIGTERM).is_ok() {
            let deadline = Instant::now() + self.config.kill_grace;
            while Instant::now() < deadline {
                let exited = match child.try_wait() {
                    Ok(Some(_)) | Err(_) => true,
                    Ok(None) => false,
                };
                if exited && signal::killpg(group, None::<Signal>).is_err() {
                    break;
                }
                thread::sleep(self.config.poll_interval);
            }
        }
        let _ = signal::killpg(group, Signal::SIGKILL);
        let _ = child.kill();
        let _ = child.wait();
    }
}

impl Default for Runner {
    fn default() -> Self {
        Runner::new(RunnerConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

fn process_group(child: &Child) -> Pid {
    Pid::from_raw(child.id() as pid_t)
}

fn drain<R: Read + Send + 'static>(stream: Stream, pipe: Option<R>,
                                   results: mpsc::Sender<(Stream, io::Result<String>)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let res = match pipe {
            Some(mut pipe) => pipe.read_to_end(&mut buf).map(|_| ()),
            None => Ok(()),
        };
        // The receiver is gone once the call gave up, nobody is left to tell.
        let _ = results.send((stream, res.map(|_| String::from_utf8_lossy(&buf).into_owned())));
    });
}

/// `Runner::execute` with the default configuration.
pub fn execute(command: &str) -> Result<String> {
    Runner::default().execute(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::result::ErrorKind;

    fn captured(stdout: &str, stderr: &str, exit_code: Option<i32>) -> Captured {
        Captured {
            command: "cmd".to_string(),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
        }
    }

    #[test]
    fn legacy_policy_ignores_exit_status() {
        let policy = SuccessPolicy::LegacyStderr;
        assert_eq!(policy.evaluate(captured("out\n", "", Some(3))).unwrap(), "out\n");
        assert_eq!(policy.evaluate(captured("", "", None)).unwrap(), "");

        let error = policy.evaluate(captured("out", "warning: x\n", Some(0))).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Execution);
        assert_eq!(error.message(), "warning: x\n");
    }

    #[test]
    fn exit_status_policy() {
        let policy = SuccessPolicy::ExitStatus;
        assert_eq!(policy.evaluate(captured("out", "warning", Some(0))).unwrap(), "out");

        let error = policy.evaluate(captured("", "", Some(2))).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Execution);
        assert_eq!(error.message(), "'cmd' exited with status 2");

        let error = policy.evaluate(captured("", "denied\n", Some(1))).unwrap_err();
        assert_eq!(error.message(), "denied\n");

        let error = policy.evaluate(captured("", "", None)).unwrap_err();
        assert_eq!(error.message(), "'cmd' was killed by a signal");
    }

    #[test]
    fn parse_policy() {
        assert_eq!("legacy".parse::<SuccessPolicy>(), Ok(SuccessPolicy::LegacyStderr));
        assert_eq!("exit-status".parse::<SuccessPolicy>(), Ok(SuccessPolicy::ExitStatus));
        assert!("strict".parse::<SuccessPolicy>().is_err());
    }

    #[test]
    fn default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.shell, "/bin/bash");
        assert_eq!(config.policy, SuccessPolicy::LegacyStderr);
        assert_eq!(config.invocation, Invocation::Shell);
        assert!(config.timeout.is_none());
    }
}
