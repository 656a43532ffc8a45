//! Top-level window widget.

use parking_lot::RwLock;
use std::sync::Arc;

use waldo_protocol::ops::EventArgs;
use waldo_protocol::value::type_name;
use waldo_protocol::{Color, Value};

use super::property;
use crate::events::EventSource;
use crate::tree::{ELEMENT_TYPE, NodeKind, NodeRef, PropertyAccessor, PropertyValue, UiNode};

/// Virtual screen bounds used by `fitToScreen`.
pub const SCREEN_WIDTH: f64 = 1920.0;
pub const SCREEN_HEIGHT: f64 = 1080.0;

struct WindowState {
	name: String,
	title: String,
	background: Color,
	width: f64,
	height: f64,
	content: Option<NodeRef>,
	style: Option<NodeRef>,
	overlay: Vec<NodeRef>,
}

pub struct Window {
	state: RwLock<WindowState>,
	events: EventSource,
}

impl Window {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			state: RwLock::new(WindowState {
				name: String::new(),
				title: String::new(),
				background: Color::WHITE,
				width: 800.0,
				height: 600.0,
				content: None,
				style: None,
				overlay: Vec::new(),
			}),
			events: EventSource::default(),
		})
	}

	pub fn set_name(&self, name: impl Into<String>) {
		self.state.write().name = name.into();
	}

	pub fn title(&self) -> String {
		self.state.read().title.clone()
	}

	pub fn set_title(&self, title: impl Into<String>) {
		self.state.write().title = title.into();
	}

	pub fn background(&self) -> Color {
		self.state.read().background
	}

	pub fn set_background(&self, background: Color) {
		self.state.write().background = background;
	}

	pub fn size(&self) -> (f64, f64) {
		let state = self.state.read();
		(state.width, state.height)
	}

	pub fn set_size(&self, width: f64, height: f64) {
		let mut state = self.state.write();
		state.width = width;
		state.height = height;
	}

	/// Clamps the window to the virtual screen bounds.
	pub fn fit_to_screen(&self) {
		let mut state = self.state.write();
		state.width = state.width.min(SCREEN_WIDTH);
		state.height = state.height.min(SCREEN_HEIGHT);
	}

	pub fn content(&self) -> Option<NodeRef> {
		self.state.read().content.clone()
	}

	/// Replaces the window content.
	pub fn set_content(&self, content: NodeRef) {
		self.state.write().content = Some(content);
	}

	pub fn style(&self) -> Option<NodeRef> {
		self.state.read().style.clone()
	}

	pub fn set_style(&self, style: NodeRef) {
		self.state.write().style = Some(style);
	}

	/// Adds a node to the overlay layer. Overlay content is reachable
	/// from queries rooted at this window but has no structural parent.
	pub fn push_overlay(&self, node: NodeRef) {
		self.state.write().overlay.push(node);
	}

	/// Raises `Activated`; called when the window joins the stage.
	pub fn activate(&self) {
		self.events.raise("Activated", &EventArgs::new());
	}

	/// Raises `Closed`; called when the window leaves the stage.
	pub fn close(&self) {
		self.events.raise("Closed", &EventArgs::new());
	}

	fn attach(&self, child: NodeRef) -> Result<(), String> {
		let mut state = self.state.write();
		if state.content.is_some() {
			return Err("'Window' supports a single content element".to_owned());
		}
		state.content = Some(child);
		Ok(())
	}
}

static WINDOW_PROPERTIES: [PropertyAccessor; 7] = [
	property!("Name", type_name::STRING, Window,
		get: |window| PropertyValue::Value(Value::Text(window.name())),
		set: |window, value| {
			window.set_name(String::try_from(value).map_err(|err| err.to_string())?);
			Ok(())
		}),
	property!("Title", type_name::STRING, Window,
		get: |window| PropertyValue::Value(Value::Text(window.title())),
		set: |window, value| {
			window.set_title(String::try_from(value).map_err(|err| err.to_string())?);
			Ok(())
		}),
	property!("Background", type_name::COLOR, Window,
		get: |window| PropertyValue::Value(Value::Color(window.background())),
		set: |window, value| {
			window.set_background(Color::try_from(value).map_err(|err| err.to_string())?);
			Ok(())
		}),
	property!("Width", type_name::FLOAT, Window,
		get: |window| PropertyValue::Value(Value::Float(window.size().0)),
		set: |window, value| {
			let width = f64::try_from(value).map_err(|err| err.to_string())?;
			let (_, height) = window.size();
			window.set_size(width, height);
			Ok(())
		}),
	property!("Height", type_name::FLOAT, Window,
		get: |window| PropertyValue::Value(Value::Float(window.size().1)),
		set: |window, value| {
			let height = f64::try_from(value).map_err(|err| err.to_string())?;
			let (width, _) = window.size();
			window.set_size(width, height);
			Ok(())
		}),
	property!("Content", ELEMENT_TYPE, Window,
		get: |window| match window.content() {
			Some(content) => PropertyValue::Node(content),
			None => PropertyValue::Empty,
		}),
	property!("Style", ELEMENT_TYPE, Window,
		get: |window| match window.style() {
			Some(style) => PropertyValue::Node(style),
			None => PropertyValue::Empty,
		}),
];

pub static WINDOW_KIND: NodeKind = NodeKind {
	name: "Window",
	ancestry: &["Window", "ContentControl", "Control", "Element"],
	properties: &WINDOW_PROPERTIES,
	events: &["Activated", "Closed"],
	attach_child: Some(|node: &dyn UiNode, child: NodeRef| match node.downcast_ref::<Window>() {
		Some(window) => window.attach(child),
		None => Err("node is not a Window".to_owned()),
	}),
};

impl UiNode for Window {
	fn kind(&self) -> &'static NodeKind {
		&WINDOW_KIND
	}

	fn name(&self) -> String {
		self.state.read().name.clone()
	}

	fn visual_children(&self) -> Vec<NodeRef> {
		self.state.read().content.iter().cloned().collect()
	}

	fn overlay_children(&self) -> Vec<NodeRef> {
		self.state.read().overlay.clone()
	}

	fn events(&self) -> Option<&EventSource> {
		Some(&self.events)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::widgets::controls::Label;

	#[test]
	fn fit_to_screen_clamps_oversized_windows() {
		let window = Window::new();
		window.set_size(4000.0, 500.0);
		window.fit_to_screen();
		assert_eq!(window.size(), (SCREEN_WIDTH, 500.0));
	}

	#[test]
	fn title_round_trips_through_the_accessor_table() {
		let window = Window::new();
		let node: NodeRef = window.clone();
		let accessor = node.kind().property("Title").unwrap();
		let set = accessor.set.unwrap();

		set(node.as_ref(), Value::Text("Hello".into())).unwrap();
		match (accessor.get)(node.as_ref()) {
			PropertyValue::Value(Value::Text(title)) => assert_eq!(title, "Hello"),
			_ => panic!("expected a text value"),
		}
		assert_eq!(window.title(), "Hello");
	}

	#[test]
	fn markup_attachment_accepts_a_single_child() {
		let window = Window::new();
		let attach = WINDOW_KIND.attach_child.unwrap();

		attach(window.as_ref(), Label::new()).unwrap();
		let err = attach(window.as_ref(), Label::new()).unwrap_err();
		assert!(err.contains("single content element"));
	}

	#[test]
	fn width_rejects_non_float_values() {
		let window = Window::new();
		let accessor = WINDOW_KIND.property("Width").unwrap();
		let set = accessor.set.unwrap();

		let err = set(window.as_ref(), Value::Text("wide".into())).unwrap_err();
		assert!(err.contains("expected Float"));
	}
}
