//! Pluggable value marshaling.
//!
//! Both peers carry an ordered chain of serializers. For any value or wire
//! type name the first serializer whose [`Serializer::handles`] claims it
//! performs the conversion; later entries are never consulted, even when the
//! claimed conversion fails. Registering a custom serializer at index 0
//! therefore overrides the built-in rendering for its types.

use crate::value::{type_name, Color, Value, ValueError, Visibility};
use std::fmt;
use std::sync::Arc;

/// Converts between [`Value`]s and their rendered wire form.
pub trait Serializer: Send + Sync {
	/// Stable name this serializer is registered and addressed by.
	fn name(&self) -> &'static str;

	/// Whether this serializer claims the given wire type name.
	fn handles(&self, type_name: &str) -> bool;

	fn serialize(&self, value: &Value) -> Result<String, ValueError>;

	fn deserialize(&self, type_name: &str, text: &str) -> Result<Value, ValueError>;
}

/// Ordered first-claim-wins serializer chain.
#[derive(Clone)]
pub struct SerializerChain {
	entries: Vec<Arc<dyn Serializer>>,
}

impl fmt::Debug for SerializerChain {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list()
			.entries(self.entries.iter().map(|s| s.name()))
			.finish()
	}
}

impl Default for SerializerChain {
	fn default() -> Self {
		Self::with_defaults()
	}
}

impl SerializerChain {
	/// An empty chain that claims nothing.
	pub fn empty() -> Self {
		Self { entries: Vec::new() }
	}

	/// The built-in chain every peer starts with.
	pub fn with_defaults() -> Self {
		Self {
			entries: vec![
				Arc::new(ColorSerializer),
				Arc::new(VisibilitySerializer),
				Arc::new(DefaultSerializer),
			],
		}
	}

	/// Inserts at `index`, clamped to the current length.
	pub fn insert(&mut self, index: usize, serializer: Arc<dyn Serializer>) {
		let index = index.min(self.entries.len());
		self.entries.insert(index, serializer);
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	fn claimant(&self, type_name: &str) -> Option<&Arc<dyn Serializer>> {
		self.entries.iter().find(|s| s.handles(type_name))
	}

	/// Renders `value` through the first serializer claiming its type.
	pub fn serialize(&self, value: &Value) -> Result<String, ValueError> {
		match self.claimant(value.type_name()) {
			Some(serializer) => serializer.serialize(value),
			None => Err(ValueError::Unsupported {
				type_name: value.type_name().to_owned(),
			}),
		}
	}

	/// Parses `text` as `type_name` through the first serializer claiming it.
	pub fn deserialize(&self, type_name: &str, text: &str) -> Result<Value, ValueError> {
		match self.claimant(type_name) {
			Some(serializer) => serializer.deserialize(type_name, text),
			None => Err(ValueError::Unsupported {
				type_name: type_name.to_owned(),
			}),
		}
	}
}

/// Handles the scalar types with their canonical renderings.
pub struct DefaultSerializer;

impl Serializer for DefaultSerializer {
	fn name(&self) -> &'static str {
		"default"
	}

	fn handles(&self, type_name: &str) -> bool {
		matches!(
			type_name,
			type_name::BOOLEAN | type_name::INTEGER | type_name::FLOAT | type_name::STRING
		)
	}

	fn serialize(&self, value: &Value) -> Result<String, ValueError> {
		match value {
			Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Text(_) => {
				Ok(value.to_string())
			}
			other => Err(ValueError::Unsupported {
				type_name: other.type_name().to_owned(),
			}),
		}
	}

	fn deserialize(&self, type_name: &str, text: &str) -> Result<Value, ValueError> {
		let parse_err = || ValueError::Parse {
			type_name: type_name.to_owned(),
			text: text.to_owned(),
		};
		match type_name {
			// Accepts any casing on input; renders lowercase.
			type_name::BOOLEAN => match text.to_ascii_lowercase().as_str() {
				"true" => Ok(Value::Bool(true)),
				"false" => Ok(Value::Bool(false)),
				_ => Err(parse_err()),
			},
			type_name::INTEGER => text.parse().map(Value::Int).map_err(|_| parse_err()),
			type_name::FLOAT => text.parse().map(Value::Float).map_err(|_| parse_err()),
			type_name::STRING => Ok(Value::Text(text.to_owned())),
			_ => Err(ValueError::Unsupported {
				type_name: type_name.to_owned(),
			}),
		}
	}
}

/// Handles [`Color`] in `#AARRGGBB` form.
pub struct ColorSerializer;

impl Serializer for ColorSerializer {
	fn name(&self) -> &'static str {
		"color"
	}

	fn handles(&self, type_name: &str) -> bool {
		type_name == type_name::COLOR
	}

	fn serialize(&self, value: &Value) -> Result<String, ValueError> {
		match value {
			Value::Color(color) => Ok(color.to_string()),
			other => Err(ValueError::Mismatch {
				expected: type_name::COLOR,
				actual: other.type_name(),
			}),
		}
	}

	fn deserialize(&self, type_name: &str, text: &str) -> Result<Value, ValueError> {
		if type_name != type_name::COLOR {
			return Err(ValueError::Unsupported {
				type_name: type_name.to_owned(),
			});
		}
		text.parse::<Color>()
			.map(Value::Color)
			.map_err(|_| ValueError::Parse {
				type_name: type_name.to_owned(),
				text: text.to_owned(),
			})
	}
}

/// Handles [`Visibility`] by its exact variant names.
pub struct VisibilitySerializer;

impl Serializer for VisibilitySerializer {
	fn name(&self) -> &'static str {
		"visibility"
	}

	fn handles(&self, type_name: &str) -> bool {
		type_name == type_name::VISIBILITY
	}

	fn serialize(&self, value: &Value) -> Result<String, ValueError> {
		match value {
			Value::Visibility(v) => Ok(v.to_string()),
			other => Err(ValueError::Mismatch {
				expected: type_name::VISIBILITY,
				actual: other.type_name(),
			}),
		}
	}

	fn deserialize(&self, type_name: &str, text: &str) -> Result<Value, ValueError> {
		if type_name != type_name::VISIBILITY {
			return Err(ValueError::Unsupported {
				type_name: type_name.to_owned(),
			});
		}
		text.parse::<Visibility>()
			.map(Value::Visibility)
			.map_err(|_| ValueError::Parse {
				type_name: type_name.to_owned(),
				text: text.to_owned(),
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct ShoutingStrings;

	impl Serializer for ShoutingStrings {
		fn name(&self) -> &'static str {
			"shouting"
		}

		fn handles(&self, type_name: &str) -> bool {
			type_name == type_name::STRING
		}

		fn serialize(&self, value: &Value) -> Result<String, ValueError> {
			Ok(value.to_string().to_uppercase())
		}

		fn deserialize(&self, _type_name: &str, text: &str) -> Result<Value, ValueError> {
			Ok(Value::Text(text.to_lowercase()))
		}
	}

	#[test]
	fn default_chain_round_trips_each_type() {
		let chain = SerializerChain::with_defaults();
		let values = [
			Value::Bool(true),
			Value::Int(-42),
			Value::Float(1.5),
			Value::Text("hello".into()),
			Value::Color(Color::argb(0xFF, 0x11, 0x22, 0x33)),
			Value::Visibility(Visibility::Collapsed),
		];
		for value in values {
			let text = chain.serialize(&value).unwrap();
			let back = chain.deserialize(value.type_name(), &text).unwrap();
			assert_eq!(back, value);
		}
	}

	#[test]
	fn bool_rendering_is_lowercase_and_parsing_ignores_case() {
		let chain = SerializerChain::with_defaults();
		assert_eq!(chain.serialize(&Value::Bool(true)).unwrap(), "true");
		assert_eq!(
			chain.deserialize(type_name::BOOLEAN, "True").unwrap(),
			Value::Bool(true)
		);
	}

	#[test]
	fn front_insertion_takes_precedence() {
		let mut chain = SerializerChain::with_defaults();
		chain.insert(0, Arc::new(ShoutingStrings));
		let text = chain.serialize(&Value::Text("quiet".into())).unwrap();
		assert_eq!(text, "QUIET");
		// The built-in string serializer is shadowed even for parsing.
		let back = chain.deserialize(type_name::STRING, "LOUD").unwrap();
		assert_eq!(back, Value::Text("loud".into()));
	}

	#[test]
	fn oversized_index_clamps_to_end() {
		let mut chain = SerializerChain::with_defaults();
		let len = chain.len();
		chain.insert(999, Arc::new(ShoutingStrings));
		assert_eq!(chain.len(), len + 1);
		// At the end it never wins over the default string handling.
		assert_eq!(chain.serialize(&Value::Text("quiet".into())).unwrap(), "quiet");
	}

	#[test]
	fn unclaimed_type_is_unsupported() {
		let chain = SerializerChain::empty();
		let err = chain.deserialize("Thickness", "1,2,3,4").unwrap_err();
		assert!(matches!(err, ValueError::Unsupported { .. }));
	}
}
