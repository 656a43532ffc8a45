//! Connection serving.
//!
//! A [`ControlHost`] owns the UI thread and identity cache and serves any
//! number of concurrent driver sessions over length-prefixed JSON frames.
//! Sessions share the widget tree but each gets its own event bridge, so a
//! disconnecting driver takes only its own subscriptions with it.
//!
//! Shutdown is level-triggered through a watch channel. The response to a
//! `shutdown` request is queued before the signal fires, and each session
//! drains its in-flight requests and flushes its write queue before
//! returning, so the driver always sees the reply.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use waldo_protocol::{Message, Request, Response};
use waldo_runtime::transport;

use crate::cache::IdentityCache;
use crate::dispatcher::Dispatcher;
use crate::service::SessionService;
use crate::stage::Stage;

/// Shared control surface behind every driver session.
#[derive(Clone)]
pub struct ControlHost {
	dispatcher: Arc<Dispatcher>,
	cache: Arc<IdentityCache>,
	shutdown_tx: watch::Sender<Option<i32>>,
	shutdown_rx: watch::Receiver<Option<i32>>,
}

impl ControlHost {
	/// Spawns the UI thread for `stage` and wraps it in a host.
	pub fn new(stage: Stage) -> io::Result<Self> {
		let (shutdown_tx, shutdown_rx) = watch::channel(None);
		Ok(Self {
			dispatcher: Dispatcher::spawn(stage)?,
			cache: Arc::new(IdentityCache::new()),
			shutdown_tx,
			shutdown_rx,
		})
	}

	/// Exit code requested by a `shutdown` operation, once one arrived.
	pub fn exit_code(&self) -> Option<i32> {
		*self.shutdown_rx.borrow()
	}

	/// Serves one driver session over a reader/writer pair until the peer
	/// disconnects or a shutdown is requested.
	pub async fn serve_transport<R, W>(&self, mut reader: R, writer: W)
	where
		R: AsyncRead + Unpin,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
		let write_task = tokio::spawn(async move {
			let mut writer = writer;
			while let Some(message) = outbound_rx.recv().await {
				if let Err(err) = transport::write_message(&mut writer, &message).await {
					warn!(target: "waldo", error = %err, "failed to write frame");
					break;
				}
			}
		});

		let service = Arc::new(SessionService::new(
			self.dispatcher.clone(),
			self.cache.clone(),
			outbound_tx.clone(),
		));
		let mut shutdown = self.shutdown_rx.clone();
		let mut requests = JoinSet::new();

		loop {
			tokio::select! {
				biased;
				_ = shutdown.changed() => {
					if shutdown.borrow_and_update().is_some() {
						break;
					}
				}
				frame = transport::read_message(&mut reader) => match frame {
					Ok(Some(Message::Request(request))) => {
						let service = service.clone();
						let outbound = outbound_tx.clone();
						let shutdown_tx = self.shutdown_tx.clone();
						requests.spawn(async move {
							let Request { id, method, params } = request;
							let handled = service.handle(&method, params).await;
							let response = match handled.result {
								Ok(result) => Response { id, result: Some(result), error: None },
								Err(error) => Response { id, result: None, error: Some(error) },
							};
							// Queue the reply before firing shutdown so the
							// driver sees it.
							let _ = outbound.send(Message::Response(response));
							if let Some(code) = handled.exit {
								info!(target: "waldo", code, "shutdown requested");
								let _ = shutdown_tx.send(Some(code));
							}
						});
					}
					Ok(Some(other)) => {
						warn!(target: "waldo", frame = ?other, "ignoring non-request frame");
					}
					Ok(None) => {
						debug!(target: "waldo", "driver disconnected");
						break;
					}
					Err(err) => {
						warn!(target: "waldo", error = %err, "transport failed");
						break;
					}
				}
			}
		}

		// Settle in-flight requests, detach this session's event listeners,
		// then close the queue so the write task drains and stops.
		while requests.join_next().await.is_some() {}
		drop(service);
		drop(outbound_tx);
		let _ = write_task.await;
	}

	/// Serves one session over a single duplex stream.
	pub async fn serve_stream<S>(&self, stream: S)
	where
		S: AsyncRead + AsyncWrite + Send + 'static,
	{
		let (reader, writer) = tokio::io::split(stream);
		self.serve_transport(reader, writer).await;
	}

	/// Accepts driver connections until a `shutdown` operation arrives, then
	/// waits for every open session and returns the requested exit code.
	pub async fn serve_listener(&self, listener: UnixListener) -> i32 {
		let mut shutdown = self.shutdown_rx.clone();
		let mut sessions = JoinSet::new();
		loop {
			tokio::select! {
				biased;
				_ = shutdown.changed() => {
					let requested = *shutdown.borrow_and_update();
					if let Some(code) = requested {
						while sessions.join_next().await.is_some() {}
						return code;
					}
				}
				accepted = listener.accept() => match accepted {
					Ok((stream, _)) => {
						debug!(target: "waldo", "driver connected");
						let host = self.clone();
						sessions.spawn(async move {
							let (reader, writer) = stream.into_split();
							host.serve_transport(reader, writer).await;
						});
					}
					Err(err) => {
						warn!(target: "waldo", error = %err, "accept failed");
					}
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use waldo_protocol::ops::method;

	use crate::widgets::Registry;

	fn host() -> ControlHost {
		ControlHost::new(Stage::new(Registry::with_builtins())).unwrap()
	}

	#[tokio::test]
	async fn a_raw_session_round_trips_a_request() {
		let host = host();
		let (driver, hosted) = tokio::io::duplex(64 * 1024);
		let session = {
			let host = host.clone();
			tokio::spawn(async move { host.serve_stream(hosted).await })
		};

		let (mut reader, mut writer) = tokio::io::split(driver);
		transport::write_message(
			&mut writer,
			&Message::Request(Request {
				id: 1,
				method: method::GET_VERSION.to_owned(),
				params: json!({}),
			}),
		)
		.await
		.unwrap();

		let response = match transport::read_message(&mut reader).await.unwrap().unwrap() {
			Message::Response(response) => response,
			other => panic!("expected a response, got {other:?}"),
		};
		assert_eq!(response.id, 1);
		assert_eq!(response.result.unwrap()["hostVersion"], env!("CARGO_PKG_VERSION"));

		drop(reader);
		drop(writer);
		session.await.unwrap();
	}

	#[tokio::test]
	async fn shutdown_replies_before_the_session_ends() {
		let host = host();
		let (driver, hosted) = tokio::io::duplex(64 * 1024);
		let session = {
			let host = host.clone();
			tokio::spawn(async move { host.serve_stream(hosted).await })
		};

		let (mut reader, mut writer) = tokio::io::split(driver);
		transport::write_message(
			&mut writer,
			&Message::Request(Request {
				id: 9,
				method: method::SHUTDOWN.to_owned(),
				params: json!({"exitCode": 5}),
			}),
		)
		.await
		.unwrap();

		match transport::read_message(&mut reader).await.unwrap().unwrap() {
			Message::Response(response) => assert_eq!(response.id, 9),
			other => panic!("expected a response, got {other:?}"),
		}
		session.await.unwrap();
		assert_eq!(host.exit_code(), Some(5));
	}

	#[tokio::test]
	async fn the_listener_accepts_and_honors_shutdown() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("control.sock");
		let listener = UnixListener::bind(&path).unwrap();
		let host = host();
		let serving = {
			let host = host.clone();
			tokio::spawn(async move { host.serve_listener(listener).await })
		};

		let stream = tokio::net::UnixStream::connect(&path).await.unwrap();
		let (mut reader, mut writer) = stream.into_split();
		transport::write_message(
			&mut writer,
			&Message::Request(Request {
				id: 2,
				method: method::SHUTDOWN.to_owned(),
				params: json!({"exitCode": 0}),
			}),
		)
		.await
		.unwrap();

		assert!(matches!(
			transport::read_message(&mut reader).await.unwrap().unwrap(),
			Message::Response(_)
		));
		assert_eq!(serving.await.unwrap(), 0);
	}
}
