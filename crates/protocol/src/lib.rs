//! Wire types for the waldo control protocol.
//!
//! This crate contains the serde-serializable types used for communication
//! between the driver and the host over the framed control channel. These
//! types represent the protocol layer: the shapes of data as they appear on
//! the wire, plus the value model and serializer chain that both sides use
//! to move typed values through it.
//!
//! Types here are pure data; connection management lives in `waldo-runtime`
//! and the operation semantics in `waldo-host`.

pub mod message;
pub mod ops;
pub mod serializer;
pub mod value;

pub use message::{ErrorPayload, Event, Message, Request, Response};
pub use ops::NodeHandle;
pub use serializer::{Serializer, SerializerChain};
pub use value::{Color, Value, ValueError, Visibility};

/// Filesystem rendezvous for a host's control socket.
///
/// The host binds here on startup; the driver derives the same path from
/// the spawned process id and dials until the socket accepts.
pub fn control_socket_path(host_pid: u32) -> std::path::PathBuf {
	std::env::temp_dir().join(format!("waldo-{host_pid}.sock"))
}
