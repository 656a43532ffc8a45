//! Built-in control widgets.

use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use waldo_protocol::Value;
use waldo_protocol::ops::EventArgs;
use waldo_protocol::value::type_name;

use super::property;
use crate::events::EventSource;
use crate::tree::{ELEMENT_TYPE, NodeKind, NodeRef, PropertyAccessor, PropertyValue, UiNode};

/// Multi-child layout container.
pub struct Panel {
	state: RwLock<PanelState>,
}

struct PanelState {
	name: String,
	children: Vec<NodeRef>,
}

impl Panel {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			state: RwLock::new(PanelState {
				name: String::new(),
				children: Vec::new(),
			}),
		})
	}

	pub fn set_name(&self, name: impl Into<String>) {
		self.state.write().name = name.into();
	}

	pub fn add_child(&self, child: NodeRef) {
		self.state.write().children.push(child);
	}
}

static PANEL_PROPERTIES: [PropertyAccessor; 1] = [property!(
	"Name",
	type_name::STRING,
	Panel,
	get: |panel| PropertyValue::Value(Value::Text(panel.name())),
	set: |panel, value| {
		panel.set_name(String::try_from(value).map_err(|err| err.to_string())?);
		Ok(())
	}
)];

pub static PANEL_KIND: NodeKind = NodeKind {
	name: "Panel",
	ancestry: &["Panel", "Element"],
	properties: &PANEL_PROPERTIES,
	events: &[],
	attach_child: Some(|node: &dyn UiNode, child: NodeRef| match node.downcast_ref::<Panel>() {
		Some(panel) => {
			panel.add_child(child);
			Ok(())
		}
		None => Err("node is not a Panel".to_owned()),
	}),
};

impl UiNode for Panel {
	fn kind(&self) -> &'static NodeKind {
		&PANEL_KIND
	}

	fn name(&self) -> String {
		self.state.read().name.clone()
	}

	fn visual_children(&self) -> Vec<NodeRef> {
		self.state.read().children.clone()
	}
}

/// Static text display.
pub struct Label {
	state: RwLock<LabelState>,
}

struct LabelState {
	name: String,
	text: String,
}

impl Label {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			state: RwLock::new(LabelState {
				name: String::new(),
				text: String::new(),
			}),
		})
	}

	pub fn set_name(&self, name: impl Into<String>) {
		self.state.write().name = name.into();
	}

	pub fn text(&self) -> String {
		self.state.read().text.clone()
	}

	pub fn set_text(&self, text: impl Into<String>) {
		self.state.write().text = text.into();
	}
}

static LABEL_PROPERTIES: [PropertyAccessor; 2] = [
	property!("Name", type_name::STRING, Label,
		get: |label| PropertyValue::Value(Value::Text(label.name())),
		set: |label, value| {
			label.set_name(String::try_from(value).map_err(|err| err.to_string())?);
			Ok(())
		}),
	property!("Text", type_name::STRING, Label,
		get: |label| PropertyValue::Value(Value::Text(label.text())),
		set: |label, value| {
			label.set_text(String::try_from(value).map_err(|err| err.to_string())?);
			Ok(())
		}),
];

pub static LABEL_KIND: NodeKind = NodeKind {
	name: "Label",
	ancestry: &["Label", "Control", "Element"],
	properties: &LABEL_PROPERTIES,
	events: &[],
	attach_child: None,
};

impl UiNode for Label {
	fn kind(&self) -> &'static NodeKind {
		&LABEL_KIND
	}

	fn name(&self) -> String {
		self.state.read().name.clone()
	}

	fn visual_children(&self) -> Vec<NodeRef> {
		Vec::new()
	}
}

/// Clickable button. Content is an arbitrary child node; tooltip and
/// context menu hang off the button without being structural children.
pub struct Button {
	state: RwLock<ButtonState>,
	events: EventSource,
}

struct ButtonState {
	name: String,
	content: Option<NodeRef>,
	tooltip: Option<NodeRef>,
	context_menu: Option<NodeRef>,
}

impl Button {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			state: RwLock::new(ButtonState {
				name: String::new(),
				content: None,
				tooltip: None,
				context_menu: None,
			}),
			events: EventSource::default(),
		})
	}

	pub fn set_name(&self, name: impl Into<String>) {
		self.state.write().name = name.into();
	}

	pub fn content(&self) -> Option<NodeRef> {
		self.state.read().content.clone()
	}

	pub fn set_content(&self, content: NodeRef) {
		self.state.write().content = Some(content);
	}

	pub fn set_tooltip(&self, tooltip: NodeRef) {
		self.state.write().tooltip = Some(tooltip);
	}

	pub fn set_context_menu(&self, menu: NodeRef) {
		self.state.write().context_menu = Some(menu);
	}

	/// Raises `Click`.
	pub fn click(&self) {
		self.events.raise("Click", &EventArgs::new());
	}
}

static BUTTON_PROPERTIES: [PropertyAccessor; 2] = [
	property!("Name", type_name::STRING, Button,
		get: |button| PropertyValue::Value(Value::Text(button.name())),
		set: |button, value| {
			button.set_name(String::try_from(value).map_err(|err| err.to_string())?);
			Ok(())
		}),
	property!("Content", ELEMENT_TYPE, Button,
		get: |button| match button.content() {
			Some(content) => PropertyValue::Node(content),
			None => PropertyValue::Empty,
		}),
];

pub static BUTTON_KIND: NodeKind = NodeKind {
	name: "Button",
	ancestry: &["Button", "ButtonBase", "Control", "Element"],
	properties: &BUTTON_PROPERTIES,
	events: &["Click"],
	attach_child: Some(|node: &dyn UiNode, child: NodeRef| match node.downcast_ref::<Button>() {
		Some(button) => {
			if button.content().is_some() {
				return Err("'Button' supports a single content element".to_owned());
			}
			button.set_content(child);
			Ok(())
		}
		None => Err("node is not a Button".to_owned()),
	}),
};

impl UiNode for Button {
	fn kind(&self) -> &'static NodeKind {
		&BUTTON_KIND
	}

	fn name(&self) -> String {
		self.state.read().name.clone()
	}

	fn visual_children(&self) -> Vec<NodeRef> {
		self.state.read().content.iter().cloned().collect()
	}

	fn attached_children(&self) -> Vec<NodeRef> {
		let state = self.state.read();
		state
			.tooltip
			.iter()
			.chain(state.context_menu.iter())
			.cloned()
			.collect()
	}

	fn events(&self) -> Option<&EventSource> {
		Some(&self.events)
	}
}

/// Editable text input; the default target for `sendInput`.
pub struct TextBox {
	state: RwLock<TextBoxState>,
	events: EventSource,
}

struct TextBoxState {
	name: String,
	text: String,
}

impl TextBox {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			state: RwLock::new(TextBoxState {
				name: String::new(),
				text: String::new(),
			}),
			events: EventSource::default(),
		})
	}

	pub fn set_name(&self, name: impl Into<String>) {
		self.state.write().name = name.into();
	}

	pub fn text(&self) -> String {
		self.state.read().text.clone()
	}

	/// Replaces the text and raises `TextChanged`, matching the behavior
	/// of a programmatic text assignment.
	pub fn set_text(&self, text: impl Into<String>) {
		let text = text.into();
		self.state.write().text = text.clone();
		self.events
			.raise("TextChanged", &EventArgs::new().with("text", text));
	}

	/// Appends typed text and raises `TextChanged` once.
	pub fn insert_text(&self, text: &str) {
		let full = {
			let mut state = self.state.write();
			state.text.push_str(text);
			state.text.clone()
		};
		self.events
			.raise("TextChanged", &EventArgs::new().with("text", full));
	}
}

static TEXT_BOX_PROPERTIES: [PropertyAccessor; 2] = [
	property!("Name", type_name::STRING, TextBox,
		get: |text_box| PropertyValue::Value(Value::Text(text_box.name())),
		set: |text_box, value| {
			text_box.set_name(String::try_from(value).map_err(|err| err.to_string())?);
			Ok(())
		}),
	property!("Text", type_name::STRING, TextBox,
		get: |text_box| PropertyValue::Value(Value::Text(text_box.text())),
		set: |text_box, value| {
			text_box.set_text(String::try_from(value).map_err(|err| err.to_string())?);
			Ok(())
		}),
];

pub static TEXT_BOX_KIND: NodeKind = NodeKind {
	name: "TextBox",
	ancestry: &["TextBox", "Control", "Element"],
	properties: &TEXT_BOX_PROPERTIES,
	events: &["TextChanged"],
	attach_child: None,
};

impl UiNode for TextBox {
	fn kind(&self) -> &'static NodeKind {
		&TEXT_BOX_KIND
	}

	fn name(&self) -> String {
		self.state.read().name.clone()
	}

	fn visual_children(&self) -> Vec<NodeRef> {
		Vec::new()
	}

	fn events(&self) -> Option<&EventSource> {
		Some(&self.events)
	}
}

/// Two-state toggle. Its content child is logical rather than visual,
/// so queries reach it only through the logical fallback.
pub struct CheckBox {
	state: RwLock<CheckBoxState>,
	events: EventSource,
}

struct CheckBoxState {
	name: String,
	checked: bool,
	content: Option<NodeRef>,
}

impl CheckBox {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			state: RwLock::new(CheckBoxState {
				name: String::new(),
				checked: false,
				content: None,
			}),
			events: EventSource::default(),
		})
	}

	pub fn set_name(&self, name: impl Into<String>) {
		self.state.write().name = name.into();
	}

	pub fn is_checked(&self) -> bool {
		self.state.read().checked
	}

	/// Sets the checked state, raising `Toggled` when it changes.
	pub fn set_checked(&self, checked: bool) {
		let changed = {
			let mut state = self.state.write();
			let changed = state.checked != checked;
			state.checked = checked;
			changed
		};
		if changed {
			self.events.raise(
				"Toggled",
				&EventArgs::new().with("isChecked", checked.to_string()),
			);
		}
	}

	pub fn set_content(&self, content: NodeRef) {
		self.state.write().content = Some(content);
	}
}

static CHECK_BOX_PROPERTIES: [PropertyAccessor; 3] = [
	property!("Name", type_name::STRING, CheckBox,
		get: |check_box| PropertyValue::Value(Value::Text(check_box.name())),
		set: |check_box, value| {
			check_box.set_name(String::try_from(value).map_err(|err| err.to_string())?);
			Ok(())
		}),
	property!("IsChecked", type_name::BOOLEAN, CheckBox,
		get: |check_box| PropertyValue::Value(Value::Bool(check_box.is_checked())),
		set: |check_box, value| {
			check_box.set_checked(bool::try_from(value).map_err(|err| err.to_string())?);
			Ok(())
		}),
	property!("Content", ELEMENT_TYPE, CheckBox,
		get: |check_box| match check_box.state.read().content.clone() {
			Some(content) => PropertyValue::Node(content),
			None => PropertyValue::Empty,
		}),
];

pub static CHECK_BOX_KIND: NodeKind = NodeKind {
	name: "CheckBox",
	ancestry: &["CheckBox", "ToggleButton", "ButtonBase", "Control", "Element"],
	properties: &CHECK_BOX_PROPERTIES,
	events: &["Toggled"],
	attach_child: Some(
		|node: &dyn UiNode, child: NodeRef| match node.downcast_ref::<CheckBox>() {
			Some(check_box) => {
				check_box.set_content(child);
				Ok(())
			}
			None => Err("node is not a CheckBox".to_owned()),
		},
	),
};

impl UiNode for CheckBox {
	fn kind(&self) -> &'static NodeKind {
		&CHECK_BOX_KIND
	}

	fn name(&self) -> String {
		self.state.read().name.clone()
	}

	fn visual_children(&self) -> Vec<NodeRef> {
		Vec::new()
	}

	fn logical_children(&self) -> Vec<NodeRef> {
		self.state.read().content.iter().cloned().collect()
	}

	fn events(&self) -> Option<&EventSource> {
		Some(&self.events)
	}
}

static SHARED_STYLE: LazyLock<Arc<Style>> = LazyLock::new(|| Arc::new(Style { _priv: () }));

/// Frozen shared style. A single instance is reused across windows, so it
/// carries no identity and cannot be addressed by a driver.
pub struct Style {
	_priv: (),
}

impl Style {
	pub fn shared() -> Arc<Self> {
		SHARED_STYLE.clone()
	}
}

pub static STYLE_KIND: NodeKind = NodeKind {
	name: "Style",
	ancestry: &["Style"],
	properties: &[],
	events: &[],
	attach_child: None,
};

impl UiNode for Style {
	fn kind(&self) -> &'static NodeKind {
		&STYLE_KIND
	}

	fn name(&self) -> String {
		String::new()
	}

	fn is_frozen(&self) -> bool {
		true
	}

	fn visual_children(&self) -> Vec<NodeRef> {
		Vec::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn check_box_toggles_only_on_change() {
		let check_box = CheckBox::new();
		assert!(!check_box.is_checked());
		check_box.set_checked(true);
		assert!(check_box.is_checked());

		let accessor = CHECK_BOX_KIND.property("IsChecked").unwrap();
		match (accessor.get)(check_box.as_ref()) {
			PropertyValue::Value(Value::Bool(checked)) => assert!(checked),
			_ => panic!("expected a bool value"),
		}
	}

	#[test]
	fn text_box_insert_appends() {
		let text_box = TextBox::new();
		text_box.set_text("ab");
		text_box.insert_text("cd");
		assert_eq!(text_box.text(), "abcd");
	}

	#[test]
	fn button_attachments_are_not_visual_children() {
		let button = Button::new();
		button.set_content(Label::new());
		button.set_tooltip(Label::new());

		assert_eq!(button.visual_children().len(), 1);
		assert_eq!(button.attached_children().len(), 1);
	}

	#[test]
	fn shared_style_is_one_instance() {
		assert!(Arc::ptr_eq(&Style::shared(), &Style::shared()));
		assert!(Style::shared().is_frozen());
	}
}
