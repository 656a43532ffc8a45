//! Query grammar: parsing and evaluation of element paths.
//!
//! A query is a sequence of steps evaluated left to right, each step
//! searching breadth-first below the node the previous step produced:
//!
//! * `name` / `~name` finds the nearest descendant with that structural
//!   name.
//! * `.Property` reads a node-valued property of the current node and
//!   continues the walk from it.
//! * `/TypeName` finds a descendant whose type ancestry contains
//!   `TypeName`.
//! * `[Property="value"]` finds a descendant whose named property renders
//!   exactly to `value`.
//!
//! Name, type, and expression steps accept a trailing `[n]` selecting the
//! n-th match in traversal order. Expression values escape `"`, `]`, and
//! `\` with a backslash. Failures are immediate and name the failed step
//! and the type of the node it searched under.

use std::collections::VecDeque;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::tree::{NodeRef, PropertyValue, children_of};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
	#[error("Malformed query: {0}")]
	Malformed(String),
	#[error("Failed to find element by name '{name}' in '{kind}'")]
	NameNotFound { name: String, kind: String },
	#[error("Failed to find child element of type '{type_name}' in '{kind}'")]
	TypeNotFound { type_name: String, kind: String },
	#[error("Failed to find child element with property expression '{expression}' in '{kind}'")]
	ExpressionNotFound { expression: String, kind: String },
	#[error("Failed to find property '{name}' on element of type '{kind}'")]
	PropertyNotFound { name: String, kind: String },
	#[error("Property '{name}' on '{kind}' is not an element")]
	NotAnElement { name: String, kind: String },
	#[error("Property '{name}' on '{kind}' has no value")]
	EmptyProperty { name: String, kind: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
	/// `name` or `~name`, optionally indexed.
	Name { name: String, index: usize },
	/// `.Property`; reads a node-valued property of the current node.
	Property { name: String },
	/// `/TypeName`, optionally indexed; matches against the ancestry list.
	ChildType { type_name: String, index: usize },
	/// `[Property="value"]`, optionally indexed.
	Expression {
		property: String,
		value: String,
		index: usize,
	},
}

impl fmt::Display for Step {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fn indexed(f: &mut fmt::Formatter<'_>, index: usize) -> fmt::Result {
			if index > 0 { write!(f, "[{index}]") } else { Ok(()) }
		}
		match self {
			Step::Name { name, index } => {
				write!(f, "{name}")?;
				indexed(f, *index)
			}
			Step::Property { name } => write!(f, ".{name}"),
			Step::ChildType { type_name, index } => {
				write!(f, "/{type_name}")?;
				indexed(f, *index)
			}
			Step::Expression {
				property,
				value,
				index,
			} => {
				let escaped = value
					.replace('\\', "\\\\")
					.replace('"', "\\\"")
					.replace(']', "\\]");
				write!(f, "[{property}=\"{escaped}\"]")?;
				indexed(f, *index)
			}
		}
	}
}

/// Trailing indexer such as `[2]`.
static INDEX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[(\d+)\]").unwrap());
/// Head of a property expression, up to the opening quote.
static EXPRESSION_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r#"^\[([A-Za-z_][A-Za-z0-9_]*)=""#).unwrap());

struct Scanner<'a> {
	rest: &'a str,
}

impl<'a> Scanner<'a> {
	fn new(query: &'a str) -> Self {
		Self { rest: query }
	}

	fn is_empty(&self) -> bool {
		self.rest.is_empty()
	}

	fn peek(&self) -> Option<char> {
		self.rest.chars().next()
	}

	fn bump(&mut self) {
		let mut chars = self.rest.chars();
		chars.next();
		self.rest = chars.as_str();
	}

	/// Consumes up to the next step delimiter.
	fn take_segment(&mut self) -> &'a str {
		let end = self
			.rest
			.find(['.', '/', '~', '['])
			.unwrap_or(self.rest.len());
		let (segment, rest) = self.rest.split_at(end);
		self.rest = rest;
		segment
	}

	/// Consumes a trailing `[n]` indexer if one is present.
	fn take_index(&mut self) -> Result<usize, QueryError> {
		let Some(captures) = INDEX_RE.captures(self.rest) else {
			return Ok(0);
		};
		let matched = captures.get(0).map_or(0, |m| m.end());
		let index = captures[1]
			.parse::<usize>()
			.map_err(|_| QueryError::Malformed(format!("index out of range in '{}'", &captures[0])))?;
		self.rest = &self.rest[matched..];
		Ok(index)
	}

	/// Consumes `[Property="value"]` starting at the opening bracket.
	fn take_expression(&mut self) -> Result<(String, String), QueryError> {
		let Some(captures) = EXPRESSION_RE.captures(self.rest) else {
			return Err(QueryError::Malformed(format!(
				"expected [Property=\"value\"] at '{}'",
				self.rest
			)));
		};
		let property = captures[1].to_owned();
		self.rest = &self.rest[captures.get(0).map_or(0, |m| m.end())..];

		let mut value = String::new();
		let mut chars = self.rest.char_indices();
		let close = loop {
			match chars.next() {
				Some((_, '\\')) => match chars.next() {
					Some((_, escaped)) => value.push(escaped),
					None => {
						return Err(QueryError::Malformed(
							"dangling escape in property expression value".to_owned(),
						));
					}
				},
				Some((at, '"')) => break at,
				Some((_, ']')) => {
					return Err(QueryError::Malformed(
						"unescaped ']' in property expression value".to_owned(),
					));
				}
				Some((_, c)) => value.push(c),
				None => {
					return Err(QueryError::Malformed(
						"unterminated property expression value".to_owned(),
					));
				}
			}
		};
		self.rest = &self.rest[close + 1..];
		if !self.rest.starts_with(']') {
			return Err(QueryError::Malformed(
				"property expression missing closing ']'".to_owned(),
			));
		}
		self.rest = &self.rest[1..];
		Ok((property, value))
	}
}

pub fn parse(query: &str) -> Result<Vec<Step>, QueryError> {
	if query.is_empty() {
		return Err(QueryError::Malformed("empty query".to_owned()));
	}
	let mut scanner = Scanner::new(query);
	let mut steps = Vec::new();
	while !scanner.is_empty() {
		match scanner.peek() {
			Some('.') => {
				scanner.bump();
				let name = scanner.take_segment();
				if name.is_empty() {
					return Err(QueryError::Malformed(
						"missing property name after '.'".to_owned(),
					));
				}
				steps.push(Step::Property {
					name: name.to_owned(),
				});
			}
			Some('/') => {
				scanner.bump();
				let type_name = scanner.take_segment();
				if type_name.is_empty() {
					return Err(QueryError::Malformed(
						"missing type name after '/'".to_owned(),
					));
				}
				let index = scanner.take_index()?;
				steps.push(Step::ChildType {
					type_name: type_name.to_owned(),
					index,
				});
			}
			Some('~') => {
				scanner.bump();
				let name = scanner.take_segment();
				if name.is_empty() {
					return Err(QueryError::Malformed("missing name after '~'".to_owned()));
				}
				let index = scanner.take_index()?;
				steps.push(Step::Name {
					name: name.to_owned(),
					index,
				});
			}
			Some('[') => {
				let (property, value) = scanner.take_expression()?;
				let index = scanner.take_index()?;
				steps.push(Step::Expression {
					property,
					value,
					index,
				});
			}
			_ => {
				let name = scanner.take_segment();
				let index = scanner.take_index()?;
				steps.push(Step::Name {
					name: name.to_owned(),
					index,
				});
			}
		}
	}
	Ok(steps)
}

/// Breadth-first walk below a root. The root itself is not a candidate,
/// but its overlay layer joins the initial frontier.
struct Bfs {
	queue: VecDeque<NodeRef>,
}

impl Bfs {
	fn below(root: &NodeRef) -> Self {
		let mut queue: VecDeque<NodeRef> = children_of(root.as_ref()).into();
		queue.extend(root.overlay_children());
		Self { queue }
	}
}

impl Iterator for Bfs {
	type Item = NodeRef;

	fn next(&mut self) -> Option<NodeRef> {
		let node = self.queue.pop_front()?;
		self.queue.extend(children_of(node.as_ref()));
		Some(node)
	}
}

fn nth_match(
	root: &NodeRef,
	index: usize,
	mut matches: impl FnMut(&NodeRef) -> bool,
) -> Option<NodeRef> {
	Bfs::below(root).filter(|node| matches(node)).nth(index)
}

/// Rendering of a node's property for expression matching. Node-valued
/// and unset properties never match.
fn rendered_property(node: &NodeRef, property: &str) -> Option<String> {
	let accessor = node.kind().property(property)?;
	match (accessor.get)(node.as_ref()) {
		PropertyValue::Value(value) => Some(value.to_string()),
		PropertyValue::Node(_) | PropertyValue::Empty => None,
	}
}

fn apply(current: &NodeRef, step: &Step) -> Result<NodeRef, QueryError> {
	let kind = current.kind().name.to_owned();
	match step {
		Step::Name { name, index } => nth_match(current, *index, |node| node.name() == *name)
			.ok_or_else(|| QueryError::NameNotFound {
				name: step.to_string(),
				kind,
			}),
		Step::ChildType { type_name, index } => {
			nth_match(current, *index, |node| node.kind().is_a(type_name)).ok_or_else(|| {
				QueryError::TypeNotFound {
					type_name: step.to_string(),
					kind,
				}
			})
		}
		Step::Expression {
			property,
			value,
			index,
		} => nth_match(current, *index, |node| {
			rendered_property(node, property).as_deref() == Some(value)
		})
		.ok_or_else(|| QueryError::ExpressionNotFound {
			expression: step.to_string(),
			kind,
		}),
		Step::Property { name } => {
			let accessor =
				current
					.kind()
					.property(name)
					.ok_or_else(|| QueryError::PropertyNotFound {
						name: name.clone(),
						kind: kind.clone(),
					})?;
			match (accessor.get)(current.as_ref()) {
				PropertyValue::Node(node) => Ok(node),
				PropertyValue::Value(_) => Err(QueryError::NotAnElement {
					name: name.clone(),
					kind,
				}),
				PropertyValue::Empty => Err(QueryError::EmptyProperty {
					name: name.clone(),
					kind,
				}),
			}
		}
	}
}

/// Evaluates `query` below `root` and returns the single node it selects.
pub fn evaluate(root: &NodeRef, query: &str) -> Result<NodeRef, QueryError> {
	let steps = parse(query)?;
	let mut current = root.clone();
	for step in &steps {
		current = apply(&current, step)?;
	}
	Ok(current)
}
