//! Driver-side runtime for the waldo control protocol.
//!
//! This crate owns everything between the typed protocol payloads and a
//! running host process: length-prefixed frame transport, the connection
//! that multiplexes concurrent requests and event pushes over one stream,
//! and the launcher that spawns a host and waits for its control socket.

pub mod connection;
pub mod error;
pub mod launcher;
pub mod transport;

pub use connection::Connection;
pub use error::{Error, Result};
pub use launcher::{HostSession, LaunchConfig, DEFAULT_CONNECTION_TIMEOUT};
pub use transport::{PipeTransport, TransportSender};
