//! Typed values crossing the control channel.
//!
//! The wire carries values as `(type name, rendered string)` pairs; the
//! [`crate::serializer`] chain maps between the pair and a [`Value`]. The
//! set of value types is closed — serializer extensibility changes how a
//! type is rendered, not which types exist.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Wire-stable names for the value types the chain can carry.
pub mod type_name {
	pub const BOOLEAN: &str = "Boolean";
	pub const INTEGER: &str = "Integer";
	pub const FLOAT: &str = "Float";
	pub const STRING: &str = "String";
	pub const COLOR: &str = "Color";
	pub const VISIBILITY: &str = "Visibility";
}

/// Failure converting between values, renderings, and Rust types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
	#[error("no serializer handles type '{type_name}'")]
	Unsupported { type_name: String },
	#[error("cannot parse '{text}' as {type_name}")]
	Parse { type_name: String, text: String },
	#[error("expected {expected}, got {actual}")]
	Mismatch {
		expected: &'static str,
		actual: &'static str,
	},
}

/// A typed property, resource, or attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Bool(bool),
	Int(i64),
	Float(f64),
	Text(String),
	Color(Color),
	Visibility(Visibility),
}

impl Value {
	/// Wire type name of this value.
	pub fn type_name(&self) -> &'static str {
		match self {
			Value::Bool(_) => type_name::BOOLEAN,
			Value::Int(_) => type_name::INTEGER,
			Value::Float(_) => type_name::FLOAT,
			Value::Text(_) => type_name::STRING,
			Value::Color(_) => type_name::COLOR,
			Value::Visibility(_) => type_name::VISIBILITY,
		}
	}
}

/// Canonical rendering, identical to what the built-in serializers emit.
/// Property-expression query steps compare against this form.
impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Bool(b) => write!(f, "{b}"),
			Value::Int(i) => write!(f, "{i}"),
			Value::Float(x) => write!(f, "{x}"),
			Value::Text(s) => f.write_str(s),
			Value::Color(c) => write!(f, "{c}"),
			Value::Visibility(v) => write!(f, "{v}"),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int(v.into())
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Float(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Text(v.to_owned())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Text(v)
	}
}

impl From<Color> for Value {
	fn from(v: Color) -> Self {
		Value::Color(v)
	}
}

impl From<Visibility> for Value {
	fn from(v: Visibility) -> Self {
		Value::Visibility(v)
	}
}

macro_rules! try_from_value {
	($ty:ty, $variant:ident, $expected:expr) => {
		impl TryFrom<Value> for $ty {
			type Error = ValueError;

			fn try_from(value: Value) -> Result<Self, ValueError> {
				match value {
					Value::$variant(v) => Ok(v),
					other => Err(ValueError::Mismatch {
						expected: $expected,
						actual: other.type_name(),
					}),
				}
			}
		}
	};
}

try_from_value!(bool, Bool, type_name::BOOLEAN);
try_from_value!(i64, Int, type_name::INTEGER);
try_from_value!(f64, Float, type_name::FLOAT);
try_from_value!(String, Text, type_name::STRING);
try_from_value!(Color, Color, type_name::COLOR);
try_from_value!(Visibility, Visibility, type_name::VISIBILITY);

/// ARGB color, rendered as `#AARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
	pub a: u8,
	pub r: u8,
	pub g: u8,
	pub b: u8,
}

impl Color {
	pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
		Self { a, r, g, b }
	}

	/// Fully opaque color.
	pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
		Self { a: 0xFF, r, g, b }
	}

	pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);
	pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
	pub const TRANSPARENT: Color = Color::argb(0x00, 0xFF, 0xFF, 0xFF);
}

impl fmt::Display for Color {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
	}
}

impl FromStr for Color {
	type Err = ValueError;

	/// Parses `#AARRGGBB` or `#RRGGBB` (alpha defaults to opaque).
	fn from_str(s: &str) -> Result<Self, ValueError> {
		let parse_err = || ValueError::Parse {
			type_name: type_name::COLOR.to_owned(),
			text: s.to_owned(),
		};
		let hex = s.strip_prefix('#').ok_or_else(parse_err)?;
		let byte = |at: usize| {
			hex.get(at..at + 2)
				.and_then(|pair| u8::from_str_radix(pair, 16).ok())
				.ok_or_else(parse_err)
		};
		match hex.len() {
			8 => Ok(Color::argb(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
			6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
			_ => Err(parse_err()),
		}
	}
}

/// Display state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
	/// Rendered and occupying layout space.
	Visible,
	/// Invisible but still occupying layout space.
	Hidden,
	/// Invisible and excluded from layout.
	Collapsed,
}

impl fmt::Display for Visibility {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Visibility::Visible => "Visible",
			Visibility::Hidden => "Hidden",
			Visibility::Collapsed => "Collapsed",
		};
		f.write_str(name)
	}
}

impl FromStr for Visibility {
	type Err = ValueError;

	fn from_str(s: &str) -> Result<Self, ValueError> {
		match s {
			"Visible" => Ok(Visibility::Visible),
			"Hidden" => Ok(Visibility::Hidden),
			"Collapsed" => Ok(Visibility::Collapsed),
			_ => Err(ValueError::Parse {
				type_name: type_name::VISIBILITY.to_owned(),
				text: s.to_owned(),
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn color_renders_argb_uppercase() {
		assert_eq!(Color::argb(0xFF, 0x12, 0xAB, 0x03).to_string(), "#FF12AB03");
	}

	#[test]
	fn color_parses_with_and_without_alpha() {
		assert_eq!("#FF336699".parse::<Color>().unwrap(), Color::rgb(0x33, 0x66, 0x99));
		assert_eq!("#336699".parse::<Color>().unwrap(), Color::rgb(0x33, 0x66, 0x99));
		assert!("336699".parse::<Color>().is_err());
		assert!("#33669".parse::<Color>().is_err());
		assert!("#GG3366".parse::<Color>().is_err());
	}

	#[test]
	fn visibility_round_trips_names() {
		for v in [Visibility::Visible, Visibility::Hidden, Visibility::Collapsed] {
			assert_eq!(v.to_string().parse::<Visibility>().unwrap(), v);
		}
		assert!("visible".parse::<Visibility>().is_err());
	}

	#[test]
	fn try_from_reports_mismatch() {
		let err = bool::try_from(Value::Int(1)).unwrap_err();
		assert_eq!(
			err,
			ValueError::Mismatch {
				expected: type_name::BOOLEAN,
				actual: type_name::INTEGER,
			}
		);
	}
}
