//! Event bridge between widgets and a connected driver.
//!
//! Widgets own an [`EventSource`] and raise named events into it. A driver
//! registers interest through the [`EventBridge`], which hands out opaque
//! subscription ids and forwards raised events onto the session's outbound
//! channel as unsolicited frames. Subscriptions die with the session: the
//! bridge detaches every listener it installed when it is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use waldo_protocol::ops::EventArgs;
use waldo_protocol::{Event, Message};

use crate::tree::{NodeRef, UiNode};

struct Listener {
	id: String,
	event: String,
	push: mpsc::UnboundedSender<Message>,
}

/// Per-widget event hookup point.
///
/// Thread-safe by construction: `raise` runs on the UI thread while
/// `attach`/`detach` may be driven from the session side.
#[derive(Default)]
pub struct EventSource {
	listeners: Mutex<Vec<Listener>>,
}

impl EventSource {
	pub fn attach(&self, id: String, event: String, push: mpsc::UnboundedSender<Message>) {
		self.listeners.lock().push(Listener { id, event, push });
	}

	pub fn detach(&self, id: &str) {
		self.listeners.lock().retain(|listener| listener.id != id);
	}

	/// Fires `event` to every listener registered for it. Listeners whose
	/// session has gone away are dropped on the spot.
	pub fn raise(&self, event: &str, args: &EventArgs) {
		let payload = serde_json::to_value(args).unwrap_or_default();
		self.listeners.lock().retain(|listener| {
			if listener.event != event {
				return true;
			}
			let frame = Message::Event(Event {
				subscription: listener.id.clone(),
				event: event.to_owned(),
				args: payload.clone(),
			});
			listener.push.send(frame).is_ok()
		});
	}
}

struct Subscription {
	node: Weak<dyn UiNode>,
	event: String,
}

/// Session-scoped registry of event subscriptions.
pub struct EventBridge {
	push: mpsc::UnboundedSender<Message>,
	subscriptions: DashMap<String, Subscription>,
	next_id: AtomicU64,
}

impl EventBridge {
	pub fn new(push: mpsc::UnboundedSender<Message>) -> Self {
		Self {
			push,
			subscriptions: DashMap::new(),
			next_id: AtomicU64::new(0),
		}
	}

	/// Attaches a listener for `event` on `node` and returns the
	/// subscription id, or `None` when the node's kind declares no such
	/// event. Absence is not a fault; drivers probe for optional events.
	pub fn register(&self, node: &NodeRef, event: &str) -> Option<String> {
		if !node.kind().has_event(event) {
			debug!(target: "waldo", kind = node.kind().name, event, "event not declared by kind");
			return None;
		}
		let source = node.events()?;
		let id = format!("event@{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
		source.attach(id.clone(), event.to_owned(), self.push.clone());
		self.subscriptions.insert(
			id.clone(),
			Subscription {
				node: Arc::downgrade(node),
				event: event.to_owned(),
			},
		);
		Some(id)
	}

	/// Detaches the listener behind `id`. Unknown ids are ignored.
	pub fn unregister(&self, id: &str) {
		let Some((_, subscription)) = self.subscriptions.remove(id) else {
			return;
		};
		if let Some(node) = subscription.node.upgrade() {
			if let Some(source) = node.events() {
				debug!(target: "waldo", id, event = %subscription.event, "unregistered event subscription");
				source.detach(id);
			}
		}
	}
}

impl Drop for EventBridge {
	fn drop(&mut self) {
		for entry in self.subscriptions.iter() {
			if let Some(node) = entry.value().node.upgrade() {
				if let Some(source) = node.events() {
					source.detach(entry.key());
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::widgets::controls::TextBox;

	fn args(text: &str) -> EventArgs {
		EventArgs::new().with("text", text)
	}

	#[test]
	fn raised_events_reach_matching_listeners_only() {
		let source = EventSource::default();
		let (tx_a, mut rx_a) = mpsc::unbounded_channel();
		let (tx_b, mut rx_b) = mpsc::unbounded_channel();
		source.attach("event@1".into(), "TextChanged".into(), tx_a);
		source.attach("event@2".into(), "Click".into(), tx_b);

		source.raise("TextChanged", &args("abc"));

		let Ok(Message::Event(event)) = rx_a.try_recv() else {
			panic!("expected an event frame");
		};
		assert_eq!(event.subscription, "event@1");
		assert_eq!(event.event, "TextChanged");
		assert!(rx_b.try_recv().is_err());
	}

	#[test]
	fn dead_listeners_are_pruned_on_raise() {
		let source = EventSource::default();
		let (tx, rx) = mpsc::unbounded_channel();
		source.attach("event@1".into(), "TextChanged".into(), tx);
		drop(rx);

		source.raise("TextChanged", &args("x"));
		assert!(source.listeners.lock().is_empty());
	}

	#[test]
	fn register_rejects_undeclared_events() {
		let (tx, _rx) = mpsc::unbounded_channel();
		let bridge = EventBridge::new(tx);
		let node: NodeRef = TextBox::new();

		assert!(bridge.register(&node, "TextChanged").is_some());
		assert_eq!(bridge.register(&node, "NoSuchEvent"), None);
	}

	#[test]
	fn dropping_the_bridge_detaches_its_listeners() {
		let (tx, _rx) = mpsc::unbounded_channel();
		let bridge = EventBridge::new(tx);
		let node: NodeRef = TextBox::new();

		let id = bridge.register(&node, "TextChanged");
		assert!(id.is_some());
		let source = node.events().unwrap();
		assert_eq!(source.listeners.lock().len(), 1);

		drop(bridge);
		assert!(source.listeners.lock().is_empty());
	}
}
