//! Typed payloads for the control operations, one request/reply pair per
//! method. Field names are camelCase on the wire.
//!
//! Every reply carries an `errorMessages` list; an empty list means the
//! operation succeeded. Protocol faults (unknown method, malformed params)
//! do not appear here — they ride on [`crate::message::Response::error`].

use base64::prelude::{BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire method names.
pub mod method {
	pub const SHUTDOWN: &str = "shutdown";
	pub const INITIALIZE_APPLICATION: &str = "initializeApplication";
	pub const CREATE_WINDOW: &str = "createWindow";
	pub const GET_MAIN_WINDOW: &str = "getMainWindow";
	pub const GET_WINDOWS: &str = "getWindows";
	pub const GET_ELEMENT: &str = "getElement";
	pub const GET_PROPERTY: &str = "getProperty";
	pub const SET_PROPERTY: &str = "setProperty";
	pub const GET_RESOURCE: &str = "getResource";
	pub const GET_SCREENSHOT: &str = "getScreenshot";
	pub const REGISTER_SERIALIZER: &str = "registerSerializer";
	pub const GET_VERSION: &str = "getVersion";
	pub const REGISTER_FOR_EVENT: &str = "registerForEvent";
	pub const UNREGISTER_FOR_EVENT: &str = "unregisterForEvent";
	pub const SEND_INPUT: &str = "sendInput";
}

/// Remote node reference: opaque id plus the node's concrete kind name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHandle {
	pub id: String,
	pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownRequest {
	pub exit_code: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownReply {
	#[serde(default)]
	pub error_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
	/// Named registration hooks to activate before anything else.
	#[serde(default)]
	pub component_packs: Vec<String>,
	/// Markup declaring application-level resources, may be empty.
	#[serde(default)]
	pub resource_markup: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeReply {
	#[serde(default)]
	pub error_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWindowRequest {
	/// Markup for the window content; exclusive with `window_type`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub markup: Option<String>,
	/// Registered native window type key; exclusive with `markup`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub window_type: Option<String>,
	/// Clamp the new window's dimensions to the virtual screen.
	#[serde(default)]
	pub fit_to_screen: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWindowReply {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub window: Option<NodeHandle>,
	/// Diagnostic lines produced while loading the window.
	#[serde(default)]
	pub log_messages: Vec<String>,
	#[serde(default)]
	pub error_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetMainWindowRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainWindowReply {
	/// Absent both when there is no window and when the designation is
	/// ambiguous; ambiguity is not an error.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub window: Option<NodeHandle>,
	#[serde(default)]
	pub error_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetWindowsRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowsReply {
	/// Top-level windows in creation order.
	#[serde(default)]
	pub windows: Vec<NodeHandle>,
	#[serde(default)]
	pub error_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetElementRequest {
	/// Handle id of the search root; absent means "search each window".
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parent: Option<String>,
	pub query: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementReply {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub element: Option<NodeHandle>,
	#[serde(default)]
	pub error_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPropertyRequest {
	pub element: String,
	pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPropertyRequest {
	pub element: String,
	pub name: String,
	/// Rendered value, parsed host-side through the serializer chain.
	pub value: String,
	/// Wire type name selecting the serializer.
	pub value_type: String,
}

/// Reply for both property operations; `setProperty` reports the effective
/// value re-read after assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyReply {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value_type: Option<String>,
	#[serde(default)]
	pub error_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResourceRequest {
	pub key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReply {
	pub key: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value_type: Option<String>,
	#[serde(default)]
	pub error_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetScreenshotRequest {
	/// Node to capture; absent captures every window composited.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub element: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotReply {
	/// Base64-encoded PNG bytes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
	#[serde(default)]
	pub error_messages: Vec<String>,
}

impl ScreenshotReply {
	/// Wraps already-encoded PNG bytes for the wire.
	pub fn from_png(bytes: &[u8]) -> Self {
		Self {
			data: Some(BASE64_STANDARD.encode(bytes)),
			error_messages: Vec::new(),
		}
	}

	/// Decodes the payload back into PNG bytes.
	pub fn decode_bytes(&self) -> Result<Option<Vec<u8>>, base64::DecodeError> {
		self.data
			.as_deref()
			.map(|data| BASE64_STANDARD.decode(data))
			.transpose()
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSerializerRequest {
	/// Name a serializer factory was registered under host-side.
	pub name: String,
	/// Chain position; 0 is consulted first.
	pub index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSerializerReply {
	#[serde(default)]
	pub error_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetVersionRequest {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionReply {
	/// Version of the host library serving the protocol.
	pub host_version: String,
	/// Version reported by the embedding application.
	pub app_version: String,
	#[serde(default)]
	pub error_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRegistrationRequest {
	pub element: String,
	pub event: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRegistrationReply {
	/// Absent when the node's kind declares no such event; that is a soft
	/// failure and comes with an empty error list.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subscription: Option<String>,
	#[serde(default)]
	pub error_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUnregistrationRequest {
	pub subscription: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUnregistrationReply {
	#[serde(default)]
	pub error_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInputRequest {
	pub element: String,
	pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInputReply {
	#[serde(default)]
	pub error_messages: Vec<String>,
}

/// Structured argument data attached to an event push frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventArgs {
	/// Argument name → rendered value, in stable order.
	#[serde(default)]
	pub fields: BTreeMap<String, String>,
}

impl EventArgs {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.fields.insert(name.into(), value.into());
		self
	}
}
