//! Spawning and terminating the service child process.

use std::{
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How to run the service: `interpreter entry_point`, from the entry point's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCommand {
    /// Executable that hosts the service (for example a Python interpreter).
    pub interpreter: PathBuf,
    /// Script or program passed as the sole argument.
    pub entry_point: PathBuf,
    /// File receiving the child's stdout and stderr; discarded when `None`.
    pub output_log: Option<PathBuf>,
}

impl ServiceCommand {
    /// Directory the service runs in.
    pub fn working_dir(&self) -> &Path {
        match self.entry_point.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// First of interpreter/entry point that does not exist on disk.
    pub(crate) fn missing_path(&self) -> Option<&Path> {
        [&self.interpreter, &self.entry_point]
            .into_iter()
            .find(|path| !path.exists())
            .map(PathBuf::as_path)
    }
}

/// Start the service without waiting for it.
pub(crate) fn spawn(command: &ServiceCommand) -> io::Result<Child> {
    let mut cmd = Command::new(&command.interpreter);
    cmd.arg(&command.entry_point)
        .current_dir(command.working_dir())
        .stdin(Stdio::null());
    match &command.output_log {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            cmd.stdout(Stdio::from(file.try_clone()?))
                .stderr(Stdio::from(file));
        }
        None => {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
    }
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    let child = cmd.spawn()?;
    debug!(
        "Spawned {} {} (pid {}) in {}",
        command.interpreter.display(),
        command.entry_point.display(),
        child.id(),
        command.working_dir().display()
    );
    Ok(child)
}

/// Wait up to `timeout` for the child to exit on its own.
///
/// Returns `Ok(None)` if it is still running when the timeout elapses.
pub(crate) fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(EXIT_POLL_INTERVAL.min(deadline - now));
    }
}

/// Forcefully terminate this exact child and reap it.
pub(crate) fn terminate(child: &mut Child) {
    let pid = child.id();
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!("Service pid {pid} had already exited with {status}");
            return;
        }
        Ok(None) => {}
        Err(err) => warn!("Could not query service pid {pid}: {err}"),
    }
    if let Err(err) = child.kill() {
        warn!("Failed to kill service pid {pid}: {err}");
    }
    match child.wait() {
        Ok(status) => debug!("Service pid {pid} terminated with {status}"),
        Err(err) => warn!("Failed to reap service pid {pid}: {err}"),
    }
}
