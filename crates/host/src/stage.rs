//! The stage: everything the host process is currently showing.
//!
//! One `Stage` lives on the UI thread behind the dispatcher. It owns the
//! window list, the resource dictionary, the serializer chain used for
//! property and resource rendering, and the registry consulted when
//! constructing widgets by name. Embedding applications configure it
//! before serving begins; afterwards every touch comes through dispatched
//! operations.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use waldo_protocol::{SerializerChain, Value};

use crate::tree::NodeRef;
use crate::widgets::controls::TextBox;
use crate::widgets::{Registry, Window};

type InputSink = Box<dyn Fn(&NodeRef, &str) -> Result<(), String> + Send>;

pub struct Stage {
	registry: Registry,
	windows: Vec<Arc<Window>>,
	main_window: Option<usize>,
	resources: HashMap<String, Value>,
	app_version: String,
	serializers: SerializerChain,
	input_sink: Option<InputSink>,
}

impl Stage {
	pub fn new(registry: Registry) -> Self {
		Self {
			registry,
			windows: Vec::new(),
			main_window: None,
			resources: HashMap::new(),
			app_version: String::new(),
			serializers: SerializerChain::default(),
			input_sink: None,
		}
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	pub fn registry_mut(&mut self) -> &mut Registry {
		&mut self.registry
	}

	pub fn serializers(&self) -> &SerializerChain {
		&self.serializers
	}

	pub fn serializers_mut(&mut self) -> &mut SerializerChain {
		&mut self.serializers
	}

	/// Adds a window in creation order and raises its `Activated` event.
	pub fn add_window(&mut self, window: Arc<Window>) -> usize {
		self.windows.push(window.clone());
		let index = self.windows.len() - 1;
		debug!(target: "waldo", index, "window added");
		window.activate();
		index
	}

	/// Removes the window at `index` from the stage, raising `Closed`.
	pub fn close_window(&mut self, index: usize) {
		if index >= self.windows.len() {
			return;
		}
		let window = self.windows.remove(index);
		match self.main_window {
			Some(main) if main == index => self.main_window = None,
			Some(main) if main > index => self.main_window = Some(main - 1),
			_ => {}
		}
		window.close();
	}

	pub fn windows(&self) -> &[Arc<Window>] {
		&self.windows
	}

	/// The designated main window, or the only window when exactly one
	/// exists and none was designated. With several windows and no
	/// designation there is no main window.
	pub fn main_window(&self) -> Option<Arc<Window>> {
		if let Some(index) = self.main_window {
			return self.windows.get(index).cloned();
		}
		match self.windows.as_slice() {
			[only] => Some(only.clone()),
			_ => None,
		}
	}

	pub fn designate_main_window(&mut self, index: usize) {
		if index < self.windows.len() {
			self.main_window = Some(index);
		}
	}

	pub fn app_version(&self) -> &str {
		&self.app_version
	}

	pub fn set_app_version(&mut self, version: impl Into<String>) {
		self.app_version = version.into();
	}

	pub fn resource(&self, key: &str) -> Option<&Value> {
		self.resources.get(key)
	}

	pub fn set_resource(&mut self, key: impl Into<String>, value: Value) {
		self.resources.insert(key.into(), value);
	}

	/// Runs a registered component pack's hook against the registry.
	pub fn activate_pack(&mut self, name: &str) -> Result<(), String> {
		let Some(pack) = self.registry.pack(name) else {
			return Err(format!("Unknown component pack '{name}'"));
		};
		pack(&mut self.registry);
		debug!(target: "waldo", pack = name, "component pack activated");
		Ok(())
	}

	/// Runs a registered application definition against the stage.
	pub fn activate_application(&mut self, key: &str) -> Result<(), String> {
		let Some(app) = self.registry.application(key) else {
			return Err(format!("Unknown application type '{key}'"));
		};
		app(self);
		Ok(())
	}

	/// Replaces the default text input behavior.
	pub fn set_input_sink(&mut self, sink: InputSink) {
		self.input_sink = Some(sink);
	}

	/// Delivers typed text to a node. Without a custom sink, text appends
	/// to `TextBox` widgets and anything else rejects it.
	pub fn send_input(&self, node: &NodeRef, text: &str) -> Result<(), String> {
		if let Some(sink) = &self.input_sink {
			return sink(node, text);
		}
		match node.downcast_ref::<TextBox>() {
			Some(text_box) => {
				text_box.insert_text(text);
				Ok(())
			}
			None => Err(format!(
				"Element of type '{}' does not accept text input",
				node.kind().name
			)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::widgets::controls::Label;

	fn stage() -> Stage {
		Stage::new(Registry::with_builtins())
	}

	#[test]
	fn a_single_window_is_the_main_window_by_default() {
		let mut stage = stage();
		assert!(stage.main_window().is_none());

		let window = Window::new();
		stage.add_window(window.clone());
		assert!(Arc::ptr_eq(&stage.main_window().unwrap(), &window));
	}

	#[test]
	fn several_windows_need_an_explicit_designation() {
		let mut stage = stage();
		stage.add_window(Window::new());
		let second = Window::new();
		let index = stage.add_window(second.clone());
		assert!(stage.main_window().is_none());

		stage.designate_main_window(index);
		assert!(Arc::ptr_eq(&stage.main_window().unwrap(), &second));
	}

	#[test]
	fn closing_a_window_shifts_the_designation() {
		let mut stage = stage();
		stage.add_window(Window::new());
		let second = Window::new();
		stage.add_window(second.clone());
		stage.designate_main_window(1);

		stage.close_window(0);
		assert!(Arc::ptr_eq(&stage.main_window().unwrap(), &second));

		stage.close_window(0);
		assert!(stage.main_window().is_none());
		assert!(stage.windows().is_empty());
	}

	#[test]
	fn default_input_goes_to_text_boxes_only() {
		let stage = stage();
		let text_box = TextBox::new();
		let node: NodeRef = text_box.clone();
		stage.send_input(&node, "hi").unwrap();
		assert_eq!(text_box.text(), "hi");

		let label: NodeRef = Label::new();
		let err = stage.send_input(&label, "hi").unwrap_err();
		assert_eq!(err, "Element of type 'Label' does not accept text input");
	}

	#[test]
	fn a_custom_sink_replaces_the_default() {
		let mut stage = stage();
		stage.set_input_sink(Box::new(|_node, text| {
			if text.is_empty() {
				Err("empty input".to_owned())
			} else {
				Ok(())
			}
		}));

		let label: NodeRef = Label::new();
		assert!(stage.send_input(&label, "anything").is_ok());
		assert_eq!(stage.send_input(&label, "").unwrap_err(), "empty input");
	}

	#[test]
	fn unknown_packs_and_applications_are_rejected() {
		let mut stage = stage();
		assert_eq!(
			stage.activate_pack("extras").unwrap_err(),
			"Unknown component pack 'extras'"
		);
		assert_eq!(
			stage.activate_application("demo").unwrap_err(),
			"Unknown application type 'demo'"
		);
	}
}
