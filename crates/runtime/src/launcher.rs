//! Host process lifecycle.
//!
//! [`HostSession::launch`] spawns a host binary and dials its control
//! socket. Launches are serialized process-wide: the session holds a
//! startup gate from spawn until [`HostSession::startup_complete`], so
//! two drivers starting hosts concurrently cannot interleave their
//! handshakes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;
use waldo_protocol::control_socket_path;

use crate::error::{Error, Result};

/// Default budget for the control socket to accept a connection.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after spawn before checking whether the child died on arrival.
const STARTUP_GRACE: Duration = Duration::from_millis(50);

/// Interval between connection attempts while the socket is not yet bound.
const CONNECT_POLL: Duration = Duration::from_millis(50);

static STARTUP_GATE: LazyLock<Arc<Mutex<()>>> = LazyLock::new(|| Arc::new(Mutex::new(())));

/// How to start a host process.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
	/// Host binary to spawn.
	pub executable: PathBuf,
	/// Full argument list, already including the driver pid.
	pub args: Vec<String>,
	/// Budget for the control socket to accept a connection.
	pub connection_timeout: Duration,
}

impl LaunchConfig {
	pub fn new(executable: impl Into<PathBuf>) -> Self {
		Self {
			executable: executable.into(),
			args: Vec::new(),
			connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
		}
	}
}

/// A spawned host process and the rendezvous to reach it.
///
/// The child is killed when the session drops, so an abandoned session
/// cannot leave a host running.
#[derive(Debug)]
pub struct HostSession {
	child: Child,
	socket_path: PathBuf,
	connection_timeout: Duration,
	gate: Option<OwnedMutexGuard<()>>,
}

impl HostSession {
	/// Spawns the host and derives its control socket path from the
	/// child pid. Holds the startup gate until
	/// [`HostSession::startup_complete`] or the session is dropped.
	pub async fn launch(config: LaunchConfig) -> Result<Self> {
		let gate = STARTUP_GATE.clone().lock_owned().await;

		if !config.executable.is_file() {
			return Err(Error::HostNotFound(config.executable.display().to_string()));
		}

		debug!(
			target: "waldo",
			executable = %config.executable.display(),
			"spawning host process"
		);
		let mut child = Command::new(&config.executable)
			.args(&config.args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::inherit())
			.kill_on_drop(true)
			.spawn()
			.map_err(|err| {
				Error::LaunchFailed(format!("{}: {err}", config.executable.display()))
			})?;

		// An immediately-dead child means a bad binary or bad arguments;
		// catch that before waiting out the whole connection budget.
		tokio::time::sleep(STARTUP_GRACE).await;
		if let Some(status) = child.try_wait()? {
			return Err(Error::LaunchFailed(format!(
				"host exited during startup with {status}"
			)));
		}

		let pid = child
			.id()
			.ok_or_else(|| Error::LaunchFailed("host exited before reporting a pid".to_owned()))?;

		Ok(Self {
			child,
			socket_path: control_socket_path(pid),
			connection_timeout: config.connection_timeout,
			gate: Some(gate),
		})
	}

	/// Dials the control socket until it accepts or the budget runs out.
	pub async fn connect(&mut self) -> Result<UnixStream> {
		let deadline = Instant::now() + self.connection_timeout;
		loop {
			if let Some(status) = self.child.try_wait()? {
				return Err(Error::LaunchFailed(format!(
					"host exited during startup with {status}"
				)));
			}
			match UnixStream::connect(&self.socket_path).await {
				Ok(stream) => {
					debug!(
						target: "waldo",
						socket = %self.socket_path.display(),
						"connected to host"
					);
					return Ok(stream);
				}
				Err(err) => {
					if Instant::now() >= deadline {
						return Err(Error::ConnectionFailed(format!(
							"{} did not accept within {:?}: {err}",
							self.socket_path.display(),
							self.connection_timeout
						)));
					}
					tokio::time::sleep(CONNECT_POLL).await;
				}
			}
		}
	}

	/// Marks the handshake finished and lets the next launch proceed.
	pub fn startup_complete(&mut self) {
		self.gate.take();
	}

	pub fn pid(&self) -> Option<u32> {
		self.child.id()
	}

	pub fn socket_path(&self) -> &Path {
		&self.socket_path
	}

	pub fn connection_timeout(&self) -> Duration {
		self.connection_timeout
	}

	/// Waits for the host process to exit on its own.
	pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
		Ok(self.child.wait().await?)
	}

	/// Terminates the host and removes its socket file.
	pub async fn kill(&mut self) {
		let _ = self.child.kill().await;
		let _ = std::fs::remove_file(&self.socket_path);
	}

	/// Releases the child so it outlives this session. The process is no
	/// longer killed on drop, and nothing reaps it.
	pub fn detach(self) -> Option<u32> {
		let Self { child, .. } = self;
		let pid = child.id();
		std::mem::forget(child);
		pid
	}
}
