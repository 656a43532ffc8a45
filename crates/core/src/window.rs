//! Window handles.

use std::sync::Arc;

use waldo_protocol::{NodeHandle, Value};
use waldo_runtime::{Error, Result};

use crate::app::AppCtx;
use crate::element::Element;

/// Handle to a top-level window.
///
/// A window is an element with window affordances; [`Window::element`]
/// exposes the underlying handle for generic element operations.
#[derive(Clone)]
pub struct Window {
	element: Element,
}

impl Window {
	pub(crate) fn from_handle(ctx: Arc<AppCtx>, handle: NodeHandle) -> Self {
		Self {
			element: Element::new(ctx, handle),
		}
	}

	/// The window as a plain element.
	pub fn element(&self) -> &Element {
		&self.element
	}

	/// Finds a descendant by query, rooted at this window.
	pub async fn get_element(&self, query: &str) -> Result<Element> {
		self.element.get_element(query).await
	}

	/// Reads an attribute of the window itself.
	pub async fn attribute(&self, name: &str) -> Result<Option<Value>> {
		self.element.attribute(name).await
	}

	/// Writes an attribute of the window itself.
	pub async fn set_attribute(&self, name: &str, value: &Value) -> Result<Option<Value>> {
		self.element.set_attribute(name, value).await
	}

	/// Reads the window title. An unset title reads as empty.
	pub async fn title(&self) -> Result<String> {
		match self.element.attribute("Title").await? {
			Some(Value::Text(title)) => Ok(title),
			Some(other) => Err(Error::Protocol(format!(
				"Title rendered as {}, expected a string",
				other.type_name()
			))),
			None => Ok(String::new()),
		}
	}

	pub async fn set_title(&self, title: &str) -> Result<()> {
		self.element
			.set_attribute("Title", &Value::Text(title.to_owned()))
			.await
			.map(|_| ())
	}
}

impl std::fmt::Debug for Window {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Window")
			.field("id", &self.element.id())
			.finish()
	}
}
