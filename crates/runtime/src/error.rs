//! Error types for driver-host communication.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// The host executable could not be located.
	#[error("Host executable not found: {0}")]
	HostNotFound(String),

	/// The host process could not be spawned or died during startup.
	#[error("Failed to launch host: {0}")]
	LaunchFailed(String),

	/// The control socket never became connectable.
	#[error("Failed to connect to host: {0}")]
	ConnectionFailed(String),

	/// Framing-level failure on the control stream.
	#[error("Transport error: {0}")]
	Transport(String),

	/// A frame arrived that violates the protocol.
	#[error("Protocol error: {0}")]
	Protocol(String),

	/// The host rejected the request itself, before running the operation.
	#[error("{name}: {message}")]
	Remote {
		name: String,
		message: String,
		stack: Option<String>,
	},

	/// The operation ran host-side and reported one or more failures.
	#[error("{}", .messages.join("\n"))]
	Host { messages: Vec<String> },

	/// A deadline elapsed.
	#[error("Timed out: {0}")]
	Timeout(String),

	/// The connection closed while a reply was outstanding.
	#[error("Connection closed")]
	ChannelClosed,

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl Error {
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_))
	}

	/// True when the failure is about reaching the host rather than about
	/// the operation itself.
	pub fn is_connectivity(&self) -> bool {
		matches!(
			self,
			Error::ConnectionFailed(_) | Error::Transport(_) | Error::ChannelClosed
		)
	}
}
