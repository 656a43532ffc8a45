//! Envelope frames for the control channel.
//!
//! Every frame on the channel is one JSON value: a [`Request`] from the
//! driver, a [`Response`] correlated back to it by id, or an out-of-band
//! [`Event`] push keyed by subscription id. Operation payloads are typed in
//! [`crate::ops`]; this module only fixes the envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol request sent by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	/// Unique request id for correlating the response.
	pub id: u32,
	/// Operation name (see [`crate::ops::method`]).
	pub method: String,
	/// Operation parameters as a JSON object.
	#[serde(default)]
	pub params: Value,
}

/// Protocol response from the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	/// Request id this response correlates to.
	pub id: u32,
	/// Success result (mutually exclusive with `error`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Protocol fault (mutually exclusive with `result`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorPayload>,
}

/// Fault in the channel contract itself: unknown method, malformed params.
///
/// Operation failures never use this; they travel in-band as
/// `errorMessages` lists on the typed replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
	/// Error message.
	pub message: String,
	/// Error category name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Stack text, when the fault carries one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stack: Option<String>,
}

impl ErrorPayload {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			name: None,
			stack: None,
		}
	}
}

/// Out-of-band event push from the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
	/// Subscription id the firing belongs to.
	pub subscription: String,
	/// Event name as declared on the node's kind.
	pub event: String,
	/// Structured argument data (see [`crate::ops::EventArgs`]).
	#[serde(default)]
	pub args: Value,
}

/// Any frame that can appear on the wire.
///
/// Untagged: a `Request` is recognized by `id` + `method`, a `Response` by
/// `id` without `method`, an `Event` by `subscription`. Variant order
/// matters for deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	Request(Request),
	Response(Response),
	Event(Event),
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn request_frame_round_trips() {
		let frame = json!({"id": 7, "method": "getVersion", "params": {}});
		let msg: Message = serde_json::from_value(frame).unwrap();
		match msg {
			Message::Request(req) => {
				assert_eq!(req.id, 7);
				assert_eq!(req.method, "getVersion");
			}
			other => panic!("expected request, got {other:?}"),
		}
	}

	#[test]
	fn response_without_result_is_not_a_request() {
		let frame = json!({"id": 3, "error": {"message": "unknown method 'nope'"}});
		let msg: Message = serde_json::from_value(frame).unwrap();
		match msg {
			Message::Response(resp) => {
				assert_eq!(resp.id, 3);
				assert_eq!(resp.error.unwrap().message, "unknown method 'nope'");
			}
			other => panic!("expected response, got {other:?}"),
		}
	}

	#[test]
	fn event_frame_is_recognized() {
		let frame = json!({"subscription": "event@1", "event": "Click", "args": {"fields": {}}});
		let msg: Message = serde_json::from_value(frame).unwrap();
		match msg {
			Message::Event(ev) => {
				assert_eq!(ev.subscription, "event@1");
				assert_eq!(ev.event, "Click");
			}
			other => panic!("expected event, got {other:?}"),
		}
	}
}
