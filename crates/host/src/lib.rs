//! Host side of the waldo control protocol.
//!
//! This crate runs inside the application under control. It owns the UI
//! thread and the widget tree, serves driver sessions over the framed
//! control channel, and maps protocol operations onto the tree: querying
//! elements, reading and writing properties, pushing event firings, and
//! rendering screenshots. The `waldo-host` binary wraps all of it behind a
//! command line for drivers that launch a stock host; embedders link the
//! library, register their own widgets and applications, and serve.

pub mod cache;
pub mod dispatcher;
pub mod events;
pub mod logging;
pub mod query;
pub mod render;
pub mod server;
pub mod service;
pub mod stage;
pub mod tree;
pub mod watchdog;
pub mod widgets;

pub use cache::IdentityCache;
pub use dispatcher::{DispatchError, Dispatcher};
pub use server::ControlHost;
pub use stage::Stage;
pub use tree::{NodeKind, NodeRef, PropertyAccessor, PropertyValue, UiNode};
pub use widgets::Registry;
