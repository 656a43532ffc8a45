//! Request/response multiplexing over one control stream.
//!
//! A [`Connection`] pairs every outgoing request with a fresh id and hands
//! the matching response back to the caller that sent it, so any number of
//! tasks can talk to the host concurrently over the single stream. Event
//! push frames are routed by subscription id to whoever registered for
//! them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use waldo_protocol::{Event, Message, Request, Response};

use crate::error::{Error, Result};
use crate::transport::{PipeTransport, TransportSender};

/// Driver end of a control stream.
pub struct Connection {
	last_id: AtomicU32,
	pending: DashMap<u32, oneshot::Sender<Response>>,
	subscriptions: DashMap<String, mpsc::UnboundedSender<Event>>,
	outbound: TransportSender,
	inbound: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
	closed: AtomicBool,
}

/// Removes the pending-reply slot if the caller gives up before the
/// response arrives, so an abandoned request cannot leak its slot.
struct CancelGuard<'a> {
	pending: &'a DashMap<u32, oneshot::Sender<Response>>,
	id: u32,
	armed: bool,
}

impl CancelGuard<'_> {
	fn disarm(mut self) {
		self.armed = false;
	}
}

impl Drop for CancelGuard<'_> {
	fn drop(&mut self) {
		if self.armed {
			self.pending.remove(&self.id);
		}
	}
}

impl Connection {
	fn new(outbound: TransportSender, inbound: mpsc::UnboundedReceiver<Message>) -> Arc<Self> {
		Arc::new(Self {
			last_id: AtomicU32::new(0),
			pending: DashMap::new(),
			subscriptions: DashMap::new(),
			outbound,
			inbound: Mutex::new(Some(inbound)),
			closed: AtomicBool::new(false),
		})
	}

	/// Builds a connection over raw stream halves and spawns the frame
	/// pump. [`Connection::run`] must still be driven to dispatch
	/// incoming frames.
	///
	/// Must be called from within a Tokio runtime.
	pub fn over_stream<R, W>(reader: R, writer: W) -> Arc<Self>
	where
		R: AsyncRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		let (transport, sender, inbound) = PipeTransport::new(reader, writer);
		tokio::spawn(async move {
			if let Err(err) = transport.run().await {
				debug!(target: "waldo", error = %err, "transport pump ended");
			}
		});
		Self::new(sender, inbound)
	}

	/// Sends a request and waits for its response.
	///
	/// A response carrying an error payload becomes [`Error::Remote`];
	/// those signal protocol faults like an unknown method, not operation
	/// failures, which ride inside the typed reply.
	pub async fn request<P, T>(&self, method: &str, params: &P) -> Result<T>
	where
		P: Serialize,
		T: DeserializeOwned,
	{
		if self.closed.load(Ordering::SeqCst) {
			return Err(Error::ChannelClosed);
		}

		let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
		let (tx, rx) = oneshot::channel();
		self.pending.insert(id, tx);
		let guard = CancelGuard {
			pending: &self.pending,
			id,
			armed: true,
		};

		self.outbound.send(Message::Request(Request {
			id,
			method: method.to_owned(),
			params: serde_json::to_value(params)?,
		}))?;

		let response = rx.await.map_err(|_| Error::ChannelClosed)?;
		guard.disarm();

		if let Some(error) = response.error {
			return Err(Error::Remote {
				name: error.name.unwrap_or_else(|| "HostError".to_owned()),
				message: error.message,
				stack: error.stack,
			});
		}
		let result = response
			.result
			.unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
		Ok(serde_json::from_value(result)?)
	}

	/// Registers a channel for pushes on the given subscription id.
	/// Frames arriving for an unknown id are dropped.
	pub fn subscribe_events(&self, subscription: &str) -> mpsc::UnboundedReceiver<Event> {
		let (tx, rx) = mpsc::unbounded_channel();
		self.subscriptions.insert(subscription.to_owned(), tx);
		rx
	}

	pub fn unsubscribe_events(&self, subscription: &str) {
		self.subscriptions.remove(subscription);
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	fn dispatch(&self, message: Message) {
		match message {
			Message::Response(response) => match self.pending.remove(&response.id) {
				Some((_, tx)) => {
					let _ = tx.send(response);
				}
				None => {
					debug!(target: "waldo", id = response.id, "response for unknown request id");
				}
			},
			Message::Event(event) => {
				let key = event.subscription.clone();
				let stale = match self.subscriptions.get(&key) {
					Some(entry) => entry.value().send(event).is_err(),
					None => {
						debug!(target: "waldo", subscription = %key, "event for unknown subscription");
						false
					}
				};
				if stale {
					self.subscriptions.remove(&key);
				}
			}
			Message::Request(request) => {
				warn!(
					target: "waldo",
					method = %request.method,
					"unexpected request frame from host"
				);
			}
		}
	}

	/// Dispatches incoming frames until the transport closes, then fails
	/// every outstanding request with [`Error::ChannelClosed`].
	pub async fn run(self: Arc<Self>) {
		let receiver = self.inbound.lock().take();
		let Some(mut receiver) = receiver else {
			// Already being driven elsewhere.
			return;
		};
		while let Some(message) = receiver.recv().await {
			self.dispatch(message);
		}
		self.closed.store(true, Ordering::SeqCst);
		self.pending.clear();
		self.subscriptions.clear();
	}
}

#[cfg(test)]
mod tests;
