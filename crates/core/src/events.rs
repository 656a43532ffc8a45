//! Event subscriptions: frames pushed by the host for UI events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use waldo_protocol::ops::{self, method};
use waldo_runtime::{Error, Result};

use crate::app::{AppCtx, require_ok};

/// A live registration for one element event.
///
/// Frames the host pushes queue here until read with
/// [`EventSubscription::next`]. Dropping the subscription detaches the
/// local stream; [`EventSubscription::unregister`] also tells the host to
/// stop pushing.
pub struct EventSubscription {
	ctx: Arc<AppCtx>,
	id: String,
	event: String,
	rx: mpsc::UnboundedReceiver<waldo_protocol::Event>,
}

impl EventSubscription {
	pub(crate) fn new(ctx: Arc<AppCtx>, id: String, event: String) -> Self {
		let rx = ctx.connection.subscribe_events(&id);
		Self { ctx, id, event, rx }
	}

	/// Subscription id assigned by the host.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Event name this subscription was registered for.
	pub fn event(&self) -> &str {
		&self.event
	}

	/// Waits for the next pushed event frame.
	///
	/// Reports [`Error::Timeout`] if nothing arrives within the budget
	/// and [`Error::ChannelClosed`] once the stream can no longer
	/// deliver.
	pub async fn next(&mut self, timeout: Duration) -> Result<ops::EventArgs> {
		let frame = tokio::time::timeout(timeout, self.rx.recv())
			.await
			.map_err(|_| Error::Timeout(format!("no '{}' event within {timeout:?}", self.event)))?
			.ok_or(Error::ChannelClosed)?;
		Ok(serde_json::from_value(frame.args)?)
	}

	/// Tells the host to stop pushing and detaches the local stream.
	pub async fn unregister(mut self) -> Result<()> {
		self.detach();
		let ops::EventUnregistrationReply { error_messages } = self
			.ctx
			.connection
			.request(
				method::UNREGISTER_FOR_EVENT,
				&ops::EventUnregistrationRequest {
					subscription: self.id.clone(),
				},
			)
			.await?;
		require_ok(error_messages)
	}

	fn detach(&mut self) {
		self.ctx.connection.unsubscribe_events(&self.id);
	}
}

impl Drop for EventSubscription {
	fn drop(&mut self) {
		self.detach();
	}
}

impl std::fmt::Debug for EventSubscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventSubscription")
			.field("id", &self.id)
			.field("event", &self.event)
			.finish()
	}
}
