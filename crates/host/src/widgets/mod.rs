//! Built-in widget set and the factory registry.
//!
//! The registry is the embedding surface: applications register additional
//! widget tags, window types, component packs, application definitions,
//! and named serializers before the host starts serving. Markup loading,
//! `createWindow`, `initializeApplication`, and `registerSerializer` all
//! resolve names through it.

use std::collections::HashMap;
use std::sync::Arc;

use waldo_protocol::Serializer;

use crate::stage::Stage;
use crate::tree::NodeRef;

pub mod controls;
pub mod markup;
pub mod window;

pub use controls::{Button, CheckBox, Label, Panel, Style, TextBox};
pub use window::Window;

/// Builds a [`crate::tree::PropertyAccessor`] for one widget type,
/// downcasting the erased node before handing it to the get/set bodies.
macro_rules! property {
	($name:literal, $value_type:expr, $widget:ty, get: |$get_node:ident| $get:expr) => {
		$crate::tree::PropertyAccessor {
			name: $name,
			value_type: $value_type,
			get: |node: &dyn $crate::tree::UiNode| match node.downcast_ref::<$widget>() {
				Some($get_node) => $get,
				None => $crate::tree::PropertyValue::Empty,
			},
			set: None,
		}
	};
	($name:literal, $value_type:expr, $widget:ty,
		get: |$get_node:ident| $get:expr,
		set: |$set_node:ident, $value:ident| $set:expr) => {
		$crate::tree::PropertyAccessor {
			name: $name,
			value_type: $value_type,
			get: |node: &dyn $crate::tree::UiNode| match node.downcast_ref::<$widget>() {
				Some($get_node) => $get,
				None => $crate::tree::PropertyValue::Empty,
			},
			set: Some(
				|node: &dyn $crate::tree::UiNode, $value: waldo_protocol::Value| {
					match node.downcast_ref::<$widget>() {
						Some($set_node) => $set,
						None => Err(concat!("node is not a ", stringify!($widget)).to_owned()),
					}
				},
			),
		}
	};
}
pub(crate) use property;

/// Factory tables the host consults when constructing things by name.
pub struct Registry {
	widgets: HashMap<String, fn() -> NodeRef>,
	window_types: HashMap<String, fn() -> Arc<Window>>,
	packs: HashMap<String, fn(&mut Registry)>,
	applications: HashMap<String, fn(&mut Stage)>,
	serializers: HashMap<String, fn() -> Arc<dyn Serializer>>,
}

impl Registry {
	/// A registry with no tags at all, for embeddings that replace the
	/// built-in widget set entirely.
	pub fn empty() -> Self {
		Self {
			widgets: HashMap::new(),
			window_types: HashMap::new(),
			packs: HashMap::new(),
			applications: HashMap::new(),
			serializers: HashMap::new(),
		}
	}

	/// A registry pre-loaded with the built-in widget tags.
	pub fn with_builtins() -> Self {
		let mut registry = Self::empty();
		registry.register_widget("Window", || -> NodeRef { Window::new() });
		registry.register_widget("Panel", || -> NodeRef { Panel::new() });
		registry.register_widget("Label", || -> NodeRef { Label::new() });
		registry.register_widget("Button", || -> NodeRef { Button::new() });
		registry.register_widget("TextBox", || -> NodeRef { TextBox::new() });
		registry.register_widget("CheckBox", || -> NodeRef { CheckBox::new() });
		registry
	}

	/// Maps a markup tag to a widget constructor.
	pub fn register_widget(&mut self, tag: impl Into<String>, ctor: fn() -> NodeRef) {
		self.widgets.insert(tag.into(), ctor);
	}

	/// Maps a `createWindow` window-type key to a window factory.
	pub fn register_window_type(&mut self, key: impl Into<String>, ctor: fn() -> Arc<Window>) {
		self.window_types.insert(key.into(), ctor);
	}

	/// Maps a component-pack name to its registration hook. Activating the
	/// pack runs the hook against this registry.
	pub fn register_pack(&mut self, name: impl Into<String>, pack: fn(&mut Registry)) {
		self.packs.insert(name.into(), pack);
	}

	/// Maps an application-type key to a startup hook run against the
	/// stage before the host serves.
	pub fn register_application(&mut self, key: impl Into<String>, app: fn(&mut Stage)) {
		self.applications.insert(key.into(), app);
	}

	/// Maps a serializer name to a factory; `registerSerializer` inserts
	/// the produced serializer into the host's chain.
	pub fn register_serializer(
		&mut self,
		name: impl Into<String>,
		factory: fn() -> Arc<dyn Serializer>,
	) {
		self.serializers.insert(name.into(), factory);
	}

	pub fn widget(&self, tag: &str) -> Option<fn() -> NodeRef> {
		self.widgets.get(tag).copied()
	}

	pub fn window_type(&self, key: &str) -> Option<fn() -> Arc<Window>> {
		self.window_types.get(key).copied()
	}

	pub fn pack(&self, name: &str) -> Option<fn(&mut Registry)> {
		self.packs.get(name).copied()
	}

	pub fn application(&self, key: &str) -> Option<fn(&mut Stage)> {
		self.applications.get(key).copied()
	}

	pub fn serializer(&self, name: &str) -> Option<fn() -> Arc<dyn Serializer>> {
		self.serializers.get(name).copied()
	}
}

impl Default for Registry {
	fn default() -> Self {
		Self::with_builtins()
	}
}
