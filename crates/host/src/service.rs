//! Operation handlers.
//!
//! One [`SessionService`] exists per control connection. Handlers parse
//! typed params, hop onto the UI thread through the dispatcher, and report
//! operation failures in-band through each reply's error list; the
//! response envelope's `error` field is reserved for protocol faults such
//! as unparseable params or an unknown method. A panicking operation
//! becomes an error-list entry carrying the captured backtrace.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::warn;
use waldo_protocol::ops::{self, NodeHandle, method};
use waldo_protocol::{ErrorPayload, Message};

use crate::cache::IdentityCache;
use crate::dispatcher::{DispatchError, Dispatcher};
use crate::events::EventBridge;
use crate::query::{self, QueryError};
use crate::render;
use crate::stage::Stage;
use crate::tree::{NodeRef, PropertyValue};
use crate::widgets::{Window, markup};

/// Host version reported by `getVersion`.
const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

trait OpReply: Default {
	fn push_error(&mut self, message: String);
}

macro_rules! op_reply {
	($($reply:ty),+ $(,)?) => {$(
		impl OpReply for $reply {
			fn push_error(&mut self, message: String) {
				self.error_messages.push(message);
			}
		}
	)+};
}

op_reply!(
	ops::ShutdownReply,
	ops::InitializeReply,
	ops::CreateWindowReply,
	ops::MainWindowReply,
	ops::WindowsReply,
	ops::ElementReply,
	ops::PropertyReply,
	ops::ResourceReply,
	ops::ScreenshotReply,
	ops::RegisterSerializerReply,
	ops::VersionReply,
	ops::EventRegistrationReply,
	ops::EventUnregistrationReply,
	ops::SendInputReply,
);

fn fail<R: OpReply>(message: impl Into<String>) -> R {
	let mut reply = R::default();
	reply.push_error(message.into());
	reply
}

fn recover<R: OpReply>(result: Result<R, DispatchError>) -> R {
	match result {
		Ok(reply) => reply,
		Err(err) => fail(err.detail()),
	}
}

fn protocol_fault(message: String) -> ErrorPayload {
	ErrorPayload {
		message,
		name: Some("ProtocolError".to_owned()),
		stack: None,
	}
}

fn parse<R: DeserializeOwned>(params: serde_json::Value) -> Result<R, ErrorPayload> {
	serde_json::from_value(params).map_err(|err| protocol_fault(format!("Malformed params: {err}")))
}

fn encode<R: Serialize>(reply: R) -> Result<serde_json::Value, ErrorPayload> {
	serde_json::to_value(reply)
		.map_err(|err| protocol_fault(format!("Failed to encode reply: {err}")))
}

/// Outcome of one dispatched request.
pub struct Handled {
	pub result: Result<serde_json::Value, ErrorPayload>,
	/// Exit code when the operation asked the host to terminate. The
	/// response must be queued before the exit signal is acted on.
	pub exit: Option<i32>,
}

impl Handled {
	fn reply<R: Serialize>(reply: R) -> Self {
		Self {
			result: encode(reply),
			exit: None,
		}
	}

	fn fault(error: ErrorPayload) -> Self {
		Self {
			result: Err(error),
			exit: None,
		}
	}
}

/// Per-session operation handlers.
pub struct SessionService {
	dispatcher: Arc<Dispatcher>,
	cache: Arc<IdentityCache>,
	events: Arc<EventBridge>,
}

impl SessionService {
	pub fn new(
		dispatcher: Arc<Dispatcher>,
		cache: Arc<IdentityCache>,
		push: mpsc::UnboundedSender<Message>,
	) -> Self {
		Self {
			dispatcher,
			cache,
			events: Arc::new(EventBridge::new(push)),
		}
	}

	/// Routes one request to its handler.
	pub async fn handle(&self, method_name: &str, params: serde_json::Value) -> Handled {
		match method_name {
			method::SHUTDOWN => match parse::<ops::ShutdownRequest>(params) {
				Ok(request) => Handled {
					result: encode(ops::ShutdownReply::default()),
					exit: Some(request.exit_code),
				},
				Err(error) => Handled::fault(error),
			},
			method::INITIALIZE_APPLICATION => match parse(params) {
				Ok(request) => Handled::reply(self.initialize(request).await),
				Err(error) => Handled::fault(error),
			},
			method::CREATE_WINDOW => match parse(params) {
				Ok(request) => Handled::reply(self.create_window(request).await),
				Err(error) => Handled::fault(error),
			},
			method::GET_MAIN_WINDOW => match parse(params) {
				Ok(request) => Handled::reply(self.get_main_window(request).await),
				Err(error) => Handled::fault(error),
			},
			method::GET_WINDOWS => match parse(params) {
				Ok(request) => Handled::reply(self.get_windows(request).await),
				Err(error) => Handled::fault(error),
			},
			method::GET_ELEMENT => match parse(params) {
				Ok(request) => Handled::reply(self.get_element(request).await),
				Err(error) => Handled::fault(error),
			},
			method::GET_PROPERTY => match parse(params) {
				Ok(request) => Handled::reply(self.get_property(request).await),
				Err(error) => Handled::fault(error),
			},
			method::SET_PROPERTY => match parse(params) {
				Ok(request) => Handled::reply(self.set_property(request).await),
				Err(error) => Handled::fault(error),
			},
			method::GET_RESOURCE => match parse(params) {
				Ok(request) => Handled::reply(self.get_resource(request).await),
				Err(error) => Handled::fault(error),
			},
			method::GET_SCREENSHOT => match parse(params) {
				Ok(request) => Handled::reply(self.get_screenshot(request).await),
				Err(error) => Handled::fault(error),
			},
			method::REGISTER_SERIALIZER => match parse(params) {
				Ok(request) => Handled::reply(self.register_serializer(request).await),
				Err(error) => Handled::fault(error),
			},
			method::GET_VERSION => match parse(params) {
				Ok(request) => Handled::reply(self.get_version(request).await),
				Err(error) => Handled::fault(error),
			},
			method::REGISTER_FOR_EVENT => match parse(params) {
				Ok(request) => Handled::reply(self.register_for_event(request).await),
				Err(error) => Handled::fault(error),
			},
			method::UNREGISTER_FOR_EVENT => match parse(params) {
				Ok(request) => Handled::reply(self.unregister_for_event(request).await),
				Err(error) => Handled::fault(error),
			},
			method::SEND_INPUT => match parse(params) {
				Ok(request) => Handled::reply(self.send_input(request).await),
				Err(error) => Handled::fault(error),
			},
			unknown => {
				warn!(target: "waldo", method = unknown, "unknown method");
				Handled::fault(protocol_fault(format!("Unknown method '{unknown}'")))
			}
		}
	}

	async fn initialize(&self, request: ops::InitializeRequest) -> ops::InitializeReply {
		recover(
			self.dispatcher
				.invoke(move |stage| {
					let mut reply = ops::InitializeReply::default();
					for pack in &request.component_packs {
						if let Err(message) = stage.activate_pack(pack) {
							reply.error_messages.push(message);
						}
					}
					if !request.resource_markup.trim().is_empty() {
						match markup::load_resources(stage.serializers(), &request.resource_markup)
						{
							Ok(resources) => {
								for (key, value) in resources {
									stage.set_resource(key, value);
								}
							}
							Err(message) => reply.error_messages.push(message),
						}
					}
					reply
				})
				.await,
		)
	}

	async fn create_window(&self, request: ops::CreateWindowRequest) -> ops::CreateWindowReply {
		let cache = self.cache.clone();
		recover(
			self.dispatcher
				.invoke(move |stage| {
					let loaded = match (request.markup, request.window_type) {
						(Some(markup_text), None) => {
							match markup::load_tree(
								stage.registry(),
								stage.serializers(),
								&markup_text,
							) {
								Ok(loaded) => loaded,
								Err(message) => return fail(message),
							}
						}
						(None, Some(key)) => match stage.registry().window_type(&key) {
							Some(factory) => markup::LoadedMarkup {
								root: factory(),
								log: Vec::new(),
							},
							None => return fail(format!("Unknown window type '{key}'")),
						},
						(Some(_), Some(_)) => {
							return fail("Specify either markup or a window type, not both");
						}
						(None, None) => return fail("Specify markup or a window type"),
					};

					let markup::LoadedMarkup { root, log } = loaded;
					let window = match root.downcast_arc::<Window>() {
						Ok(window) => window,
						Err(root) => {
							// A non-window root gets wrapped in a default window.
							let window = Window::new();
							window.set_content(root);
							window
						}
					};
					if request.fit_to_screen {
						window.fit_to_screen();
					}
					stage.add_window(window.clone());
					let node: NodeRef = window;
					match cache.get_or_assign(&node) {
						Some(id) => ops::CreateWindowReply {
							window: Some(NodeHandle {
								id,
								kind: node.kind().name.to_owned(),
							}),
							log_messages: log,
							error_messages: Vec::new(),
						},
						None => fail("Window could not be addressed"),
					}
				})
				.await,
		)
	}

	async fn get_main_window(&self, _request: ops::GetMainWindowRequest) -> ops::MainWindowReply {
		let cache = self.cache.clone();
		recover(
			self.dispatcher
				.invoke(move |stage| ops::MainWindowReply {
					window: stage
						.main_window()
						.and_then(|window| window_handle(&cache, &window)),
					error_messages: Vec::new(),
				})
				.await,
		)
	}

	async fn get_windows(&self, _request: ops::GetWindowsRequest) -> ops::WindowsReply {
		let cache = self.cache.clone();
		recover(
			self.dispatcher
				.invoke(move |stage| ops::WindowsReply {
					windows: stage
						.windows()
						.iter()
						.filter_map(|window| window_handle(&cache, window))
						.collect(),
					error_messages: Vec::new(),
				})
				.await,
		)
	}

	async fn get_element(&self, request: ops::GetElementRequest) -> ops::ElementReply {
		let cache = self.cache.clone();
		recover(
			self.dispatcher
				.invoke(move |stage| {
					let ops::GetElementRequest { parent, query } = request;
					match parent {
						Some(id) => {
							let Some(root) = cache.resolve(&id) else {
								return fail("Could not find element");
							};
							match query::evaluate(&root, &query) {
								Ok(node) => element_reply(&cache, &query, node),
								Err(err) => fail(err.to_string()),
							}
						}
						None => {
							// No parent: search each window in creation order.
							for window in stage.windows() {
								let root: NodeRef = window.clone();
								match query::evaluate(&root, &query) {
									Ok(node) => return element_reply(&cache, &query, node),
									Err(err @ QueryError::Malformed(_)) => {
										return fail(err.to_string());
									}
									Err(_) => {}
								}
							}
							fail(format!("Failed to find element by query '{query}'"))
						}
					}
				})
				.await,
		)
	}

	async fn get_property(&self, request: ops::GetPropertyRequest) -> ops::PropertyReply {
		let cache = self.cache.clone();
		recover(
			self.dispatcher
				.invoke(move |stage| {
					let Some(node) = cache.resolve(&request.element) else {
						return fail("Could not find element");
					};
					read_property(stage, &node, &request.name)
				})
				.await,
		)
	}

	async fn set_property(&self, request: ops::SetPropertyRequest) -> ops::PropertyReply {
		let cache = self.cache.clone();
		recover(
			self.dispatcher
				.invoke(move |stage| {
					let Some(node) = cache.resolve(&request.element) else {
						return fail("Could not find element");
					};
					let kind = node.kind();
					let Some(accessor) = kind.property(&request.name) else {
						return fail(format!(
							"Failed to find property '{}' on element of type '{}'",
							request.name, kind.name
						));
					};
					let Some(set) = accessor.set else {
						return fail(format!(
							"Property '{}' on '{}' is read-only",
							request.name, kind.name
						));
					};
					let value = match stage
						.serializers()
						.deserialize(&request.value_type, &request.value)
					{
						Ok(value) => value,
						Err(err) => return fail(err.to_string()),
					};
					if let Err(message) = set(node.as_ref(), value) {
						return fail(message);
					}
					// Report the effective value as re-read, not as sent.
					read_property(stage, &node, &request.name)
				})
				.await,
		)
	}

	async fn get_resource(&self, request: ops::GetResourceRequest) -> ops::ResourceReply {
		recover(
			self.dispatcher
				.invoke(move |stage| {
					let key = request.key;
					match stage.resource(&key) {
						Some(value) => match stage.serializers().serialize(value) {
							Ok(text) => ops::ResourceReply {
								value: Some(text),
								value_type: Some(value.type_name().to_owned()),
								key,
								error_messages: Vec::new(),
							},
							Err(err) => {
								let mut reply: ops::ResourceReply = fail(err.to_string());
								reply.key = key;
								reply
							}
						},
						None => {
							let mut reply: ops::ResourceReply =
								fail(format!("Resource with key '{key}' not found"));
							reply.key = key;
							reply
						}
					}
				})
				.await,
		)
	}

	async fn get_screenshot(&self, request: ops::GetScreenshotRequest) -> ops::ScreenshotReply {
		let cache = self.cache.clone();
		recover(
			self.dispatcher
				.invoke(move |stage| {
					let rendered = match request.element {
						Some(id) => match cache.resolve(&id) {
							Some(node) => render::render_node(&node),
							None => return fail("Could not find element"),
						},
						None => render::render_windows(stage.windows()),
					};
					match rendered {
						Ok(png) => ops::ScreenshotReply::from_png(&png),
						Err(message) => fail(message),
					}
				})
				.await,
		)
	}

	async fn register_serializer(
		&self,
		request: ops::RegisterSerializerRequest,
	) -> ops::RegisterSerializerReply {
		recover(
			self.dispatcher
				.invoke(move |stage| {
					let Some(factory) = stage.registry().serializer(&request.name) else {
						return fail(format!("Unknown serializer '{}'", request.name));
					};
					stage.serializers_mut().insert(request.index, factory());
					ops::RegisterSerializerReply::default()
				})
				.await,
		)
	}

	async fn get_version(&self, _request: ops::GetVersionRequest) -> ops::VersionReply {
		recover(
			self.dispatcher
				.invoke(move |stage| ops::VersionReply {
					host_version: HOST_VERSION.to_owned(),
					app_version: stage.app_version().to_owned(),
					error_messages: Vec::new(),
				})
				.await,
		)
	}

	async fn register_for_event(
		&self,
		request: ops::EventRegistrationRequest,
	) -> ops::EventRegistrationReply {
		let cache = self.cache.clone();
		let events = self.events.clone();
		recover(
			self.dispatcher
				.invoke(move |_stage| {
					let Some(node) = cache.resolve(&request.element) else {
						return fail("Could not find element");
					};
					ops::EventRegistrationReply {
						subscription: events.register(&node, &request.event),
						error_messages: Vec::new(),
					}
				})
				.await,
		)
	}

	async fn unregister_for_event(
		&self,
		request: ops::EventUnregistrationRequest,
	) -> ops::EventUnregistrationReply {
		let events = self.events.clone();
		recover(
			self.dispatcher
				.invoke(move |_stage| {
					events.unregister(&request.subscription);
					ops::EventUnregistrationReply::default()
				})
				.await,
		)
	}

	async fn send_input(&self, request: ops::SendInputRequest) -> ops::SendInputReply {
		let cache = self.cache.clone();
		recover(
			self.dispatcher
				.invoke(move |stage| {
					let Some(node) = cache.resolve(&request.element) else {
						return fail("Could not find element");
					};
					match stage.send_input(&node, &request.text) {
						Ok(()) => ops::SendInputReply::default(),
						Err(message) => fail(message),
					}
				})
				.await,
		)
	}
}

fn window_handle(cache: &IdentityCache, window: &Arc<Window>) -> Option<NodeHandle> {
	let node: NodeRef = window.clone();
	cache.get_or_assign(&node).map(|id| NodeHandle {
		id,
		kind: node.kind().name.to_owned(),
	})
}

fn element_reply(cache: &IdentityCache, query: &str, node: NodeRef) -> ops::ElementReply {
	match cache.get_or_assign(&node) {
		Some(id) => ops::ElementReply {
			element: Some(NodeHandle {
				id,
				kind: node.kind().name.to_owned(),
			}),
			error_messages: Vec::new(),
		},
		None => fail(format!(
			"Element found by query '{query}' is frozen and cannot be addressed"
		)),
	}
}

fn read_property(stage: &Stage, node: &NodeRef, name: &str) -> ops::PropertyReply {
	let kind = node.kind();
	let Some(accessor) = kind.property(name) else {
		return fail(format!(
			"Failed to find property '{name}' on element of type '{}'",
			kind.name
		));
	};
	match (accessor.get)(node.as_ref()) {
		PropertyValue::Value(value) => match stage.serializers().serialize(&value) {
			Ok(text) => ops::PropertyReply {
				value: Some(text),
				value_type: Some(value.type_name().to_owned()),
				error_messages: Vec::new(),
			},
			Err(err) => fail(err.to_string()),
		},
		PropertyValue::Node(_) => fail(format!(
			"Property '{name}' on '{}' is an element and has no serialized form",
			kind.name
		)),
		PropertyValue::Empty => ops::PropertyReply {
			value: None,
			value_type: Some(accessor.value_type.to_owned()),
			error_messages: Vec::new(),
		},
	}
}
