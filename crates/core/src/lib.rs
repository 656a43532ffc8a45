//! waldo: drive a running UI host from a separate process.
//!
//! The entry point is [`App`]: launch a host binary (or attach over an
//! existing byte stream), create windows from markup, look elements up by
//! query, read and write typed attributes, subscribe to element events,
//! and capture screenshots. Typed values cross the wire as rendered text
//! through a serializer chain that the driver and the host extend
//! symmetrically.
//!
//! # Examples
//!
//! ```ignore
//! use waldo::{App, AppOptions, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = App::launch(AppOptions::new("target/debug/waldo-host")).await?;
//!
//!     let window = app
//!         .create_window(r#"<Window Title="Demo"><TextBox Name="Entry"/></Window>"#)
//!         .await?;
//!     let entry = window.get_element("~Entry").await?;
//!
//!     entry.send_input("hello").await?;
//!     assert_eq!(
//!         entry.attribute("Text").await?,
//!         Some(Value::Text("hello".into()))
//!     );
//!
//!     app.close().await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod element;
pub mod events;
pub mod window;

pub use app::{App, AppOptions, Versions};
pub use element::Element;
pub use events::EventSubscription;
pub use window::Window;

pub use waldo_protocol::ops::EventArgs;
pub use waldo_protocol::{Color, Serializer, SerializerChain, Value, ValueError, Visibility};
pub use waldo_runtime::{DEFAULT_CONNECTION_TIMEOUT, Error, Result};
