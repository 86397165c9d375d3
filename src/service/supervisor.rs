//! Lifecycle management for the backing service process.
//!
//! ```text
//! Stopped --start--> Starting --healthy--> Running --stop_soft/stop_hard--> Stopped
//! ```
//!
//! The supervisor tracks the exact child it spawned; a hard stop kills that
//! child only, never other processes sharing its executable name.

use std::{
    fmt,
    ops::ControlFlow,
    path::PathBuf,
    process::{Child, ExitStatus},
    thread,
    time::Duration,
};

use thiserror::Error;
use tracing::{info, warn};

use super::launch::{self, ServiceCommand};
use super::rpc::RpcClient;

/// Observable lifecycle state of the supervised service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

/// Errors reported by supervisor transitions.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Interpreter or entry point is missing on disk.
    #[error("Service executable not found: {path}")]
    MissingExecutable { path: PathBuf },
    /// The child process could not be spawned.
    #[error("Failed to launch {path}: {source}")]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The service never reported healthy within the attempt budget.
    #[error("Service did not become healthy after {attempts} attempts")]
    StartupTimeout { attempts: u32 },
    /// The child exited before it became healthy.
    #[error("Service exited during startup with {status}")]
    ExitedDuringStartup { status: ExitStatus },
    /// `start` was called while the service is not stopped.
    #[error("Service is already {state}")]
    AlreadyRunning { state: ServiceState },
    /// A soft stop was requested while nothing is running.
    #[error("Service is not running")]
    NotRunning,
}

/// Boolean readiness probe used by [`wait_until_ready`].
pub trait HealthProbe {
    fn probe(&self) -> bool;
}

impl<F: Fn() -> bool> HealthProbe for F {
    fn probe(&self) -> bool {
        self()
    }
}

/// What the supervisor needs from the running service.
pub trait ServiceEndpoint {
    /// Readiness check; failures are `false`.
    fn health_check(&self) -> bool;
    /// Advisory graceful shutdown; failures are ignored.
    fn request_shutdown(&self);
}

impl ServiceEndpoint for RpcClient {
    fn health_check(&self) -> bool {
        RpcClient::health_check(self)
    }

    fn request_shutdown(&self) {
        self.shutdown();
    }
}

struct EndpointProbe<'a, E: ?Sized>(&'a E);

impl<E: ServiceEndpoint + ?Sized> HealthProbe for EndpointProbe<'_, E> {
    fn probe(&self) -> bool {
        self.0.health_check()
    }
}

/// Fixed-budget readiness polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Pause before the first probe.
    pub warmup: Duration,
    /// Number of probes before giving up.
    pub attempts: u32,
    /// Pause between consecutive probes.
    pub delay: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            warmup: Duration::from_secs(3),
            attempts: 10,
            delay: Duration::from_secs(1),
        }
    }
}

/// Result of [`wait_until_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness<B = ()> {
    /// A probe succeeded on attempt `attempts`.
    Ready { attempts: u32 },
    /// Every probe failed.
    Exhausted { attempts: u32 },
    /// The pre-attempt check broke off before attempt `attempts` ran.
    Aborted { attempts: u32, reason: B },
}

/// Poll `probe` until it succeeds or the policy's budget runs out.
///
/// `before_attempt` runs before each attempt with the 1-based attempt number;
/// `Break(reason)` ends the loop early with that reason.
pub fn wait_until_ready<P: HealthProbe + ?Sized, B>(
    probe: &P,
    policy: &ReadinessPolicy,
    mut before_attempt: impl FnMut(u32) -> ControlFlow<B>,
) -> Readiness<B> {
    if !policy.warmup.is_zero() {
        thread::sleep(policy.warmup);
    }
    for attempt in 1..=policy.attempts {
        if let ControlFlow::Break(reason) = before_attempt(attempt) {
            return Readiness::Aborted {
                attempts: attempt,
                reason,
            };
        }
        if probe.probe() {
            return Readiness::Ready { attempts: attempt };
        }
        info!("Waiting for service... ({attempt}/{})", policy.attempts);
        if attempt < policy.attempts && !policy.delay.is_zero() {
            thread::sleep(policy.delay);
        }
    }
    Readiness::Exhausted {
        attempts: policy.attempts,
    }
}

/// How a soft stop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftStop {
    /// The service exited on its own; `None` when the status was unavailable.
    Exited(Option<ExitStatus>),
    /// The grace period ran out and the child was killed.
    Killed,
}

/// Default grace period a soft stop waits for the service to exit.
pub const DEFAULT_SOFT_STOP_GRACE: Duration = Duration::from_secs(30);

/// Owns the service child process and its lifecycle state.
pub struct Supervisor<E: ServiceEndpoint = RpcClient> {
    command: ServiceCommand,
    endpoint: E,
    policy: ReadinessPolicy,
    soft_stop_grace: Duration,
    state: ServiceState,
    child: Option<Child>,
}

impl<E: ServiceEndpoint> Supervisor<E> {
    /// Create a stopped supervisor.
    pub fn new(command: ServiceCommand, endpoint: E, policy: ReadinessPolicy) -> Self {
        Self {
            command,
            endpoint,
            policy,
            soft_stop_grace: DEFAULT_SOFT_STOP_GRACE,
            state: ServiceState::Stopped,
            child: None,
        }
    }

    /// Override how long [`Supervisor::stop_soft`] waits before killing the child.
    pub fn with_soft_stop_grace(mut self, grace: Duration) -> Self {
        self.soft_stop_grace = grace;
        self
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Process id of the tracked child, if any.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    pub fn command(&self) -> &ServiceCommand {
        &self.command
    }

    /// Launch the service and block until it reports healthy.
    ///
    /// Returns the number of probes it took. On failure the child is killed
    /// and the supervisor is back in [`ServiceState::Stopped`].
    pub fn start(&mut self) -> Result<u32, SupervisorError> {
        if self.state != ServiceState::Stopped {
            return Err(SupervisorError::AlreadyRunning { state: self.state });
        }
        if let Some(path) = self.command.missing_path() {
            return Err(SupervisorError::MissingExecutable {
                path: path.to_path_buf(),
            });
        }

        let mut child = launch::spawn(&self.command).map_err(|source| SupervisorError::Spawn {
            path: self.command.interpreter.clone(),
            source,
        })?;
        self.state = ServiceState::Starting;
        info!("Starting service (pid {})", child.id());

        let readiness = wait_until_ready(&EndpointProbe(&self.endpoint), &self.policy, |_| {
            match child.try_wait() {
                Ok(Some(status)) => ControlFlow::Break(status),
                Ok(None) => ControlFlow::Continue(()),
                Err(err) => {
                    warn!("Could not query service process: {err}");
                    ControlFlow::Continue(())
                }
            }
        });

        match readiness {
            Readiness::Ready { attempts } => {
                info!("Service healthy after {attempts} attempt(s)");
                self.child = Some(child);
                self.state = ServiceState::Running;
                Ok(attempts)
            }
            Readiness::Exhausted { attempts } => {
                warn!("Service failed to become healthy after {attempts} attempts");
                launch::terminate(&mut child);
                self.state = ServiceState::Stopped;
                Err(SupervisorError::StartupTimeout { attempts })
            }
            Readiness::Aborted { reason: status, .. } => {
                warn!("Service exited during startup with {status}");
                launch::terminate(&mut child);
                self.state = ServiceState::Stopped;
                Err(SupervisorError::ExitedDuringStartup { status })
            }
        }
    }

    /// Ask the service to shut down, then wait for the child to exit.
    ///
    /// The shutdown request is advisory. If the child is still alive after the
    /// grace period it is killed. The state is `Stopped` afterwards either way.
    pub fn stop_soft(&mut self) -> Result<SoftStop, SupervisorError> {
        if !matches!(self.state, ServiceState::Running | ServiceState::Starting) {
            return Err(SupervisorError::NotRunning);
        }
        self.state = ServiceState::Stopping;
        self.endpoint.request_shutdown();

        let outcome = match self.child.take() {
            Some(mut child) => match launch::wait_with_timeout(&mut child, self.soft_stop_grace) {
                Ok(Some(status)) => {
                    info!("Service exited with {status}");
                    SoftStop::Exited(Some(status))
                }
                Ok(None) => {
                    warn!(
                        "Service still running {:?} after shutdown request; killing it",
                        self.soft_stop_grace
                    );
                    launch::terminate(&mut child);
                    SoftStop::Killed
                }
                Err(err) => {
                    warn!("Lost track of service process: {err}");
                    launch::terminate(&mut child);
                    SoftStop::Exited(None)
                }
            },
            None => SoftStop::Exited(None),
        };
        self.state = ServiceState::Stopped;
        info!("Service stopped (soft)");
        Ok(outcome)
    }

    /// Kill the tracked child without asking. A no-op when nothing runs.
    pub fn stop_hard(&mut self) {
        if let Some(mut child) = self.child.take() {
            launch::terminate(&mut child);
            info!("Service stopped (hard)");
        }
        self.state = ServiceState::Stopped;
    }

    /// Live health probe; never changes state.
    pub fn is_healthy(&self) -> bool {
        self.endpoint.health_check()
    }
}
