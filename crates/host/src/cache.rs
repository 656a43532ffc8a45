//! Identity cache: stable opaque ids for live nodes.
//!
//! Handles returned to a driver are strings minted here. The cache holds
//! only weak references so it never extends a widget's lifetime; a handle
//! whose target has been dropped resolves to nothing and its slots are
//! evicted on the spot. Repeated lookups of the same live node yield the
//! same id, which lets drivers compare handles for identity.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::tree::{NodeRef, UiNode};

struct CacheEntry {
	node: Weak<dyn UiNode>,
	key: usize,
}

#[derive(Default)]
struct CacheInner {
	next_id: u64,
	by_id: HashMap<String, CacheEntry>,
	by_node: HashMap<usize, String>,
}

#[derive(Default)]
pub struct IdentityCache {
	inner: Mutex<CacheInner>,
}

fn node_key(node: &NodeRef) -> usize {
	Arc::as_ptr(node) as *const () as usize
}

impl IdentityCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Mints or returns the stable id for a live node. Frozen nodes are
	/// shared instances and never receive an identity.
	pub fn get_or_assign(&self, node: &NodeRef) -> Option<String> {
		if node.is_frozen() {
			return None;
		}
		let key = node_key(node);
		let mut inner = self.inner.lock();
		if let Some(id) = inner.by_node.get(&key).cloned() {
			// An address can be reused by a new allocation after its old
			// occupant died; trust the slot only while its weak target is
			// still alive.
			let live = inner
				.by_id
				.get(&id)
				.is_some_and(|entry| entry.node.upgrade().is_some());
			if live {
				return Some(id);
			}
			inner.by_id.remove(&id);
			inner.by_node.remove(&key);
		}
		inner.next_id += 1;
		let id = format!("node@{}", inner.next_id);
		inner.by_id.insert(
			id.clone(),
			CacheEntry {
				node: Arc::downgrade(node),
				key,
			},
		);
		inner.by_node.insert(key, id.clone());
		Some(id)
	}

	/// Resolves an id to its live node, evicting the entry when the node
	/// has been dropped.
	pub fn resolve(&self, id: &str) -> Option<NodeRef> {
		let mut inner = self.inner.lock();
		let (upgraded, key) = match inner.by_id.get(id) {
			Some(entry) => (entry.node.upgrade(), entry.key),
			None => return None,
		};
		match upgraded {
			Some(node) => Some(node),
			None => {
				inner.by_id.remove(id);
				inner.by_node.remove(&key);
				None
			}
		}
	}

	#[cfg(test)]
	fn len(&self) -> usize {
		self.inner.lock().by_id.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::widgets::controls::{Label, Style};

	#[test]
	fn ids_are_stable_for_the_same_node() {
		let cache = IdentityCache::new();
		let node: NodeRef = Label::new();

		let first = cache.get_or_assign(&node).unwrap();
		let second = cache.get_or_assign(&node).unwrap();
		assert_eq!(first, second);
	}

	#[test]
	fn distinct_nodes_get_distinct_ids() {
		let cache = IdentityCache::new();
		let a: NodeRef = Label::new();
		let b: NodeRef = Label::new();

		assert_ne!(cache.get_or_assign(&a), cache.get_or_assign(&b));
	}

	#[test]
	fn resolve_returns_the_original_node() {
		let cache = IdentityCache::new();
		let node: NodeRef = Label::new();
		let id = cache.get_or_assign(&node).unwrap();

		let resolved = cache.resolve(&id).unwrap();
		assert!(Arc::ptr_eq(&resolved, &node));
	}

	#[test]
	fn dead_nodes_resolve_to_none_and_are_evicted() {
		let cache = IdentityCache::new();
		let node: NodeRef = Label::new();
		let id = cache.get_or_assign(&node).unwrap();
		drop(node);

		assert!(cache.resolve(&id).is_none());
		assert_eq!(cache.len(), 0);
		assert!(cache.resolve(&id).is_none());
	}

	#[test]
	fn frozen_nodes_are_never_assigned_an_id() {
		let cache = IdentityCache::new();
		let style: NodeRef = Style::shared();

		assert_eq!(cache.get_or_assign(&style), None);
		assert_eq!(cache.len(), 0);
	}
}
