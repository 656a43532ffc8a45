//! Declarative markup loading.
//!
//! Markup is a strict XML-like dialect with a single root element:
//!
//! ```text
//! <Window Title="Demo"><Panel><Button Name="ok"/></Panel></Window>
//! ```
//!
//! Tags resolve to widget constructors through the [`Registry`], and
//! attributes flow through the kind's accessor table after chain
//! deserialization, so a custom serializer also changes how markup
//! attribute text is read. Unknown attributes and stray text content are
//! diagnostics, not faults; unknown tags and unparseable values fail the
//! load. Resource dictionaries use the same syntax with typed value
//! elements under a `<Resources>` root: `<Color Key="Accent">#FF336699</Color>`.

use waldo_protocol::{SerializerChain, Value};

use super::Registry;
use crate::tree::NodeRef;

#[derive(Debug, Default)]
struct Element {
	tag: String,
	attributes: Vec<(String, String)>,
	children: Vec<Element>,
	text: String,
}

struct Parser<'a> {
	full: &'a str,
	rest: &'a str,
}

impl<'a> Parser<'a> {
	fn new(markup: &'a str) -> Self {
		Self {
			full: markup,
			rest: markup,
		}
	}

	fn offset(&self) -> usize {
		self.full.len() - self.rest.len()
	}

	fn err(&self, detail: impl Into<String>) -> String {
		format!("Markup error at offset {}: {}", self.offset(), detail.into())
	}

	fn skip_whitespace(&mut self) {
		self.rest = self.rest.trim_start();
	}

	fn eat(&mut self, token: &str) -> bool {
		match self.rest.strip_prefix(token) {
			Some(rest) => {
				self.rest = rest;
				true
			}
			None => false,
		}
	}

	fn take_name(&mut self) -> Result<String, String> {
		let end = self
			.rest
			.find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
			.unwrap_or(self.rest.len());
		if end == 0 || !self.rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
			return Err(self.err("expected a name"));
		}
		let (name, rest) = self.rest.split_at(end);
		self.rest = rest;
		Ok(name.to_owned())
	}

	fn take_quoted(&mut self) -> Result<String, String> {
		if !self.eat("\"") {
			return Err(self.err("expected '\"'"));
		}
		let end = self
			.rest
			.find('"')
			.ok_or_else(|| self.err("unterminated attribute value"))?;
		let raw = &self.rest[..end];
		self.rest = &self.rest[end + 1..];
		decode_entities(raw).map_err(|detail| self.err(detail))
	}

	fn parse_element(&mut self) -> Result<Element, String> {
		if !self.eat("<") {
			return Err(self.err("expected '<'"));
		}
		let tag = self.take_name()?;
		let mut element = Element {
			tag,
			..Element::default()
		};
		loop {
			self.skip_whitespace();
			if self.eat("/>") {
				return Ok(element);
			}
			if self.eat(">") {
				break;
			}
			let name = self.take_name()?;
			self.skip_whitespace();
			if !self.eat("=") {
				return Err(self.err(format!("expected '=' after attribute '{name}'")));
			}
			self.skip_whitespace();
			let value = self.take_quoted()?;
			element.attributes.push((name, value));
		}

		let mut text = String::new();
		loop {
			let until_tag = self
				.rest
				.find('<')
				.ok_or_else(|| self.err(format!("missing closing tag for '{}'", element.tag)))?;
			text.push_str(&self.rest[..until_tag]);
			self.rest = &self.rest[until_tag..];
			if self.eat("</") {
				let closing = self.take_name()?;
				if closing != element.tag {
					return Err(self.err(format!(
						"mismatched closing tag '{closing}' for '{}'",
						element.tag
					)));
				}
				self.skip_whitespace();
				if !self.eat(">") {
					return Err(self.err("expected '>'"));
				}
				element.text = decode_entities(text.trim()).map_err(|detail| self.err(detail))?;
				return Ok(element);
			}
			element.children.push(self.parse_element()?);
		}
	}

	fn parse_document(&mut self) -> Result<Element, String> {
		self.skip_whitespace();
		let root = self.parse_element()?;
		self.skip_whitespace();
		if !self.rest.is_empty() {
			return Err(self.err("trailing content after the root element"));
		}
		Ok(root)
	}
}

fn decode_entities(raw: &str) -> Result<String, String> {
	if !raw.contains('&') {
		return Ok(raw.to_owned());
	}
	let mut out = String::with_capacity(raw.len());
	let mut rest = raw;
	while let Some(at) = rest.find('&') {
		out.push_str(&rest[..at]);
		rest = &rest[at..];
		let end = rest
			.find(';')
			.ok_or_else(|| format!("unterminated entity in '{raw}'"))?;
		out.push(match &rest[1..end] {
			"lt" => '<',
			"gt" => '>',
			"amp" => '&',
			"quot" => '"',
			"apos" => '\'',
			other => return Err(format!("unknown entity '&{other};'")),
		});
		rest = &rest[end + 1..];
	}
	out.push_str(rest);
	Ok(out)
}

/// A built widget tree plus the diagnostics produced while building it.
pub struct LoadedMarkup {
	pub root: NodeRef,
	pub log: Vec<String>,
}

impl std::fmt::Debug for LoadedMarkup {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LoadedMarkup")
			.field("log", &self.log)
			.finish_non_exhaustive()
	}
}

/// Builds a widget tree from markup.
pub fn load_tree(
	registry: &Registry,
	serializers: &SerializerChain,
	markup: &str,
) -> Result<LoadedMarkup, String> {
	let document = Parser::new(markup).parse_document()?;
	let mut log = Vec::new();
	let root = build_node(registry, serializers, &document, &mut log)?;
	Ok(LoadedMarkup { root, log })
}

fn build_node(
	registry: &Registry,
	serializers: &SerializerChain,
	element: &Element,
	log: &mut Vec<String>,
) -> Result<NodeRef, String> {
	let Some(ctor) = registry.widget(&element.tag) else {
		return Err(format!("Unknown element '{}'", element.tag));
	};
	let node = ctor();
	let kind = node.kind();

	for (name, raw) in &element.attributes {
		let Some(accessor) = kind.property(name) else {
			log.push(format!("Ignored unknown attribute '{name}' on '{}'", kind.name));
			continue;
		};
		let Some(set) = accessor.set else {
			log.push(format!("Ignored read-only attribute '{name}' on '{}'", kind.name));
			continue;
		};
		let value = serializers
			.deserialize(accessor.value_type, raw)
			.map_err(|err| format!("Bad value for '{name}' on '{}': {err}", kind.name))?;
		set(node.as_ref(), value).map_err(|err| format!("Failed to set '{name}' on '{}': {err}", kind.name))?;
	}

	if !element.text.is_empty() {
		log.push(format!("Ignored text content in '{}'", kind.name));
	}

	for child in &element.children {
		let built = build_node(registry, serializers, child, log)?;
		match kind.attach_child {
			Some(attach) => attach(node.as_ref(), built)?,
			None => return Err(format!("'{}' does not accept child elements", kind.name)),
		}
	}
	Ok(node)
}

/// Parses a `<Resources>` dictionary into key/value pairs.
pub fn load_resources(
	serializers: &SerializerChain,
	markup: &str,
) -> Result<Vec<(String, Value)>, String> {
	let document = Parser::new(markup).parse_document()?;
	if document.tag != "Resources" {
		return Err(format!(
			"Expected a <Resources> root, found '{}'",
			document.tag
		));
	}
	let mut resources = Vec::new();
	for child in &document.children {
		if !child.children.is_empty() {
			return Err(format!("Resource '{}' cannot contain elements", child.tag));
		}
		let key = child
			.attributes
			.iter()
			.find(|(name, _)| name == "Key")
			.map(|(_, value)| value.clone())
			.ok_or_else(|| format!("Resource '{}' is missing a Key attribute", child.tag))?;
		let value = serializers
			.deserialize(&child.tag, &child.text)
			.map_err(|err| format!("Failed to parse resource '{key}': {err}"))?;
		resources.push((key, value));
	}
	Ok(resources)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tree::UiNode;
	use crate::widgets::Window;
	use crate::widgets::controls::{Label, Panel};
	use waldo_protocol::Color;

	fn chain() -> SerializerChain {
		SerializerChain::default()
	}

	#[test]
	fn builds_a_nested_tree_with_attributes() {
		let registry = Registry::with_builtins();
		let loaded = load_tree(
			&registry,
			&chain(),
			r##"<Window Title="Demo" Background="#FF336699">
				<Panel Name="root">
					<Label Text="hi"/>
					<Button Name="ok"><Label Text="OK"/></Button>
				</Panel>
			</Window>"##,
		)
		.unwrap();

		assert!(loaded.log.is_empty());
		let window = loaded.root.downcast_ref::<Window>().unwrap();
		assert_eq!(window.title(), "Demo");
		assert_eq!(window.background(), Color::rgb(0x33, 0x66, 0x99));

		let panel = window.content().unwrap();
		let panel = panel.downcast_ref::<Panel>().unwrap();
		assert_eq!(panel.visual_children().len(), 2);
	}

	#[test]
	fn unknown_tags_fail_the_load() {
		let registry = Registry::with_builtins();
		let err = load_tree(&registry, &chain(), "<Carousel/>").unwrap_err();
		assert_eq!(err, "Unknown element 'Carousel'");
	}

	#[test]
	fn unknown_attributes_are_logged_not_fatal() {
		let registry = Registry::with_builtins();
		let loaded = load_tree(&registry, &chain(), r#"<Label Text="x" Wobble="3"/>"#).unwrap();
		assert_eq!(loaded.log, vec!["Ignored unknown attribute 'Wobble' on 'Label'"]);
	}

	#[test]
	fn stray_text_content_is_logged() {
		let registry = Registry::with_builtins();
		let loaded = load_tree(&registry, &chain(), "<Label>hello</Label>").unwrap();
		assert_eq!(loaded.log, vec!["Ignored text content in 'Label'"]);
	}

	#[test]
	fn bad_attribute_values_fail_the_load() {
		let registry = Registry::with_builtins();
		let err = load_tree(&registry, &chain(), r#"<Window Background="teal"/>"#).unwrap_err();
		assert!(err.contains("Bad value for 'Background' on 'Window'"), "{err}");
	}

	#[test]
	fn leaf_widgets_reject_children() {
		let registry = Registry::with_builtins();
		let err = load_tree(&registry, &chain(), "<Label><Label/></Label>").unwrap_err();
		assert_eq!(err, "'Label' does not accept child elements");
	}

	#[test]
	fn entities_decode_in_attribute_values() {
		let registry = Registry::with_builtins();
		let loaded = load_tree(
			&registry,
			&chain(),
			r#"<Label Text="&lt;a&gt; &amp; &quot;b&quot;"/>"#,
		)
		.unwrap();
		let label = loaded.root.downcast_ref::<Label>().unwrap();
		assert_eq!(label.text(), r#"<a> & "b""#);
	}

	#[test]
	fn mismatched_closing_tags_are_an_error() {
		let registry = Registry::with_builtins();
		let err = load_tree(&registry, &chain(), "<Panel><Label/></Window>").unwrap_err();
		assert!(err.contains("mismatched closing tag 'Window'"), "{err}");
	}

	#[test]
	fn trailing_content_is_an_error() {
		let registry = Registry::with_builtins();
		let err = load_tree(&registry, &chain(), "<Label/><Label/>").unwrap_err();
		assert!(err.contains("trailing content"), "{err}");
	}

	#[test]
	fn resources_parse_typed_values() {
		let resources = load_resources(
			&chain(),
			r#"<Resources>
				<Color Key="Accent">#FF336699</Color>
				<String Key="AppName">waldo</String>
				<Boolean Key="Ready">true</Boolean>
			</Resources>"#,
		)
		.unwrap();

		assert_eq!(resources.len(), 3);
		assert_eq!(
			resources[0],
			("Accent".to_owned(), Value::Color(Color::rgb(0x33, 0x66, 0x99)))
		);
		assert_eq!(resources[1], ("AppName".to_owned(), Value::Text("waldo".into())));
		assert_eq!(resources[2], ("Ready".to_owned(), Value::Bool(true)));
	}

	#[test]
	fn resources_require_a_key() {
		let err = load_resources(&chain(), "<Resources><Color>#FF000000</Color></Resources>")
			.unwrap_err();
		assert_eq!(err, "Resource 'Color' is missing a Key attribute");
	}

	#[test]
	fn unknown_resource_types_are_an_error() {
		let err = load_resources(
			&chain(),
			r#"<Resources><Thickness Key="Pad">4</Thickness></Resources>"#,
		)
		.unwrap_err();
		assert!(err.contains("no serializer handles type 'Thickness'"), "{err}");
	}
}
