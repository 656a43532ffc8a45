//! Node capability layer.
//!
//! Every widget the control service can address implements [`UiNode`], and
//! every widget type describes itself through a static [`NodeKind`] table.
//! The kind table is the registration surface standing in for runtime
//! reflection: property reads, writes, event names, and markup child
//! attachment all go through it, so the service never needs to know a
//! concrete widget type.

use std::fmt;
use std::sync::Arc;

use downcast_rs::{DowncastSync, impl_downcast};
use waldo_protocol::Value;

use crate::events::EventSource;

/// Shared handle to a live node in the tree.
pub type NodeRef = Arc<dyn UiNode>;

/// What reading a named property can produce.
pub enum PropertyValue {
	/// A serializable leaf value.
	Value(Value),
	/// A node-valued property; query walks may continue through it.
	Node(NodeRef),
	/// The property exists but nothing is currently assigned.
	Empty,
}

/// Getter/setter pair for one named property of a kind.
///
/// `value_type` is the wire type name the property trades in. Node-valued
/// properties use [`ELEMENT_TYPE`] and have no serialized form.
pub struct PropertyAccessor {
	pub name: &'static str,
	pub value_type: &'static str,
	pub get: fn(&dyn UiNode) -> PropertyValue,
	/// Absent for read-only properties.
	pub set: Option<fn(&dyn UiNode, Value) -> Result<(), String>>,
}

/// Marker `value_type` for node-valued properties.
pub const ELEMENT_TYPE: &str = "Element";

/// Static per-type metadata for a widget kind.
pub struct NodeKind {
	pub name: &'static str,
	/// Own type name plus every ancestor type name, most derived first.
	pub ancestry: &'static [&'static str],
	pub properties: &'static [PropertyAccessor],
	pub events: &'static [&'static str],
	/// Accepts a markup child; `None` for leaf kinds.
	pub attach_child: Option<fn(&dyn UiNode, NodeRef) -> Result<(), String>>,
}

impl NodeKind {
	pub fn property(&self, name: &str) -> Option<&PropertyAccessor> {
		self.properties.iter().find(|accessor| accessor.name == name)
	}

	/// Type-step matching: a node satisfies `/TypeName` when the name
	/// appears anywhere in its ancestry, so `/Control` matches a `Button`.
	pub fn is_a(&self, type_name: &str) -> bool {
		self.ancestry.contains(&type_name)
	}

	pub fn has_event(&self, event: &str) -> bool {
		self.events.contains(&event)
	}
}

/// A live widget as seen by the control machinery.
///
/// Implementations must be internally synchronized: the dispatcher confines
/// tree mutation to the UI thread, but event detachment and identity checks
/// may read from other threads.
pub trait UiNode: DowncastSync {
	fn kind(&self) -> &'static NodeKind;

	/// Structural name (the `Name` attribute), empty when unnamed.
	fn name(&self) -> String;

	/// Frozen nodes are shared immutable instances and are excluded from
	/// identity assignment.
	fn is_frozen(&self) -> bool {
		false
	}

	/// Structural children in presentation order.
	fn visual_children(&self) -> Vec<NodeRef>;

	/// Content fallback consulted when a node has no visual children.
	fn logical_children(&self) -> Vec<NodeRef> {
		Vec::new()
	}

	/// Auxiliary content attached to this node but not part of its
	/// structural tree, such as a tooltip or context menu.
	fn attached_children(&self) -> Vec<NodeRef> {
		Vec::new()
	}

	/// Overlay layer content; consulted only when this node roots a
	/// traversal.
	fn overlay_children(&self) -> Vec<NodeRef> {
		Vec::new()
	}

	/// Event hookup point; `None` when the kind declares no events.
	fn events(&self) -> Option<&EventSource> {
		None
	}
}
impl_downcast!(sync UiNode);

impl fmt::Debug for dyn UiNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = self.name();
		if name.is_empty() {
			write!(f, "{}", self.kind().name)
		} else {
			write!(f, "{}(\"{name}\")", self.kind().name)
		}
	}
}

/// Children of `node` for traversal purposes: visual children, or the
/// logical fallback when there are none, plus attached auxiliary content.
pub fn children_of(node: &dyn UiNode) -> Vec<NodeRef> {
	let mut children = node.visual_children();
	if children.is_empty() {
		children = node.logical_children();
	}
	children.extend(node.attached_children());
	children
}
