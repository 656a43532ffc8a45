//! Element handles: typed attribute access, sub-queries, input, events.

use std::sync::Arc;

use waldo_protocol::ops::{self, method};
use waldo_protocol::{NodeHandle, Value};
use waldo_runtime::{Error, Result};

use crate::app::{AppCtx, decode_screenshot, require_ok};
use crate::events::EventSubscription;

/// Handle to one element in a host window.
///
/// The handle stays valid for as long as the element is alive host-side;
/// operations on a gone element report a host error naming it.
#[derive(Clone)]
pub struct Element {
	ctx: Arc<AppCtx>,
	handle: NodeHandle,
}

impl Element {
	pub(crate) fn new(ctx: Arc<AppCtx>, handle: NodeHandle) -> Self {
		Self { ctx, handle }
	}

	pub(crate) fn from_reply(ctx: Arc<AppCtx>, reply: ops::ElementReply) -> Result<Self> {
		let ops::ElementReply {
			element,
			error_messages,
		} = reply;
		require_ok(error_messages)?;
		let handle =
			element.ok_or_else(|| Error::Protocol("element reply carried no handle".to_owned()))?;
		Ok(Self::new(ctx, handle))
	}

	/// Identity of the element within its host session.
	pub fn id(&self) -> &str {
		&self.handle.id
	}

	/// Type name the host reports for the element.
	pub fn kind(&self) -> &str {
		&self.handle.kind
	}

	/// Finds a descendant by query, rooted at this element.
	pub async fn get_element(&self, query: &str) -> Result<Element> {
		let reply = self
			.ctx
			.connection
			.request(
				method::GET_ELEMENT,
				&ops::GetElementRequest {
					parent: Some(self.handle.id.clone()),
					query: query.to_owned(),
				},
			)
			.await?;
		Self::from_reply(Arc::clone(&self.ctx), reply)
	}

	/// Reads an attribute as a typed value.
	///
	/// `Ok(None)` means the attribute exists but currently holds nothing.
	pub async fn attribute(&self, name: &str) -> Result<Option<Value>> {
		let ops::PropertyReply {
			value,
			value_type,
			error_messages,
		} = self
			.ctx
			.connection
			.request(
				method::GET_PROPERTY,
				&ops::GetPropertyRequest {
					element: self.handle.id.clone(),
					name: name.to_owned(),
				},
			)
			.await?;
		require_ok(error_messages)?;
		self.decode(value, value_type)
	}

	/// Writes an attribute and returns the value as the host re-read it
	/// after assignment.
	pub async fn set_attribute(&self, name: &str, value: &Value) -> Result<Option<Value>> {
		let rendered = self
			.ctx
			.serializers
			.lock()
			.serialize(value)
			.map_err(|err| Error::Protocol(err.to_string()))?;
		let ops::PropertyReply {
			value: new_value,
			value_type,
			error_messages,
		} = self
			.ctx
			.connection
			.request(
				method::SET_PROPERTY,
				&ops::SetPropertyRequest {
					element: self.handle.id.clone(),
					name: name.to_owned(),
					value: rendered,
					value_type: value.type_name().to_owned(),
				},
			)
			.await?;
		require_ok(error_messages)?;
		self.decode(new_value, value_type)
	}

	fn decode(&self, value: Option<String>, value_type: Option<String>) -> Result<Option<Value>> {
		match (value, value_type) {
			(Some(value), Some(value_type)) => self
				.ctx
				.serializers
				.lock()
				.deserialize(&value_type, &value)
				.map(Some)
				.map_err(|err| Error::Protocol(err.to_string())),
			(Some(value), None) => Err(Error::Protocol(format!(
				"value '{value}' arrived without a type"
			))),
			(None, _) => Ok(None),
		}
	}

	/// Types text into the element as if entered by a user. The host
	/// fires the element's change events.
	pub async fn send_input(&self, text: &str) -> Result<()> {
		let ops::SendInputReply { error_messages } = self
			.ctx
			.connection
			.request(
				method::SEND_INPUT,
				&ops::SendInputRequest {
					element: self.handle.id.clone(),
					text: text.to_owned(),
				},
			)
			.await?;
		require_ok(error_messages)
	}

	/// Captures a PNG of just this element's rendered bounds.
	pub async fn screenshot(&self) -> Result<Vec<u8>> {
		let reply = self
			.ctx
			.connection
			.request(
				method::GET_SCREENSHOT,
				&ops::GetScreenshotRequest {
					element: Some(self.handle.id.clone()),
				},
			)
			.await?;
		decode_screenshot(reply)
	}

	/// Subscribes to a named event on this element.
	///
	/// `Ok(None)` means the element's kind does not declare the event;
	/// that is a soft miss, not an error.
	pub async fn register_event(&self, event: &str) -> Result<Option<EventSubscription>> {
		let ops::EventRegistrationReply {
			subscription,
			error_messages,
		} = self
			.ctx
			.connection
			.request(
				method::REGISTER_FOR_EVENT,
				&ops::EventRegistrationRequest {
					element: self.handle.id.clone(),
					event: event.to_owned(),
				},
			)
			.await?;
		require_ok(error_messages)?;
		Ok(subscription
			.map(|id| EventSubscription::new(Arc::clone(&self.ctx), id, event.to_owned())))
	}
}

impl std::fmt::Debug for Element {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Element")
			.field("id", &self.handle.id)
			.field("kind", &self.handle.kind)
			.finish()
	}
}
