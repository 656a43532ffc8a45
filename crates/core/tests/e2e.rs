//! The full driver facade against an in-process host over a duplex
//! stream: markup, queries, typed attributes, events, serializers,
//! screenshots, and shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use waldo::{App, Color, Error, Serializer, Value, ValueError};
use waldo_host::widgets::{Label, Registry, Style, Window};
use waldo_host::{ControlHost, NodeRef, Stage};
use waldo_protocol::value::type_name;

/// Uppercases on the way out, lowercases on the way back in.
struct ShoutingStrings;

impl Serializer for ShoutingStrings {
	fn name(&self) -> &'static str {
		"ShoutingStrings"
	}

	fn handles(&self, requested: &str) -> bool {
		requested == type_name::STRING
	}

	fn serialize(&self, value: &Value) -> Result<String, ValueError> {
		match value {
			Value::Text(text) => Ok(text.to_uppercase()),
			other => Err(ValueError::Mismatch {
				expected: type_name::STRING,
				actual: other.type_name(),
			}),
		}
	}

	fn deserialize(&self, _requested: &str, text: &str) -> Result<Value, ValueError> {
		Ok(Value::Text(text.to_lowercase()))
	}
}

fn stage() -> Stage {
	let mut registry = Registry::with_builtins();
	registry.register_window_type("styled", || -> Arc<Window> {
		let window = Window::new();
		window.set_style(Style::shared());
		window
	});
	registry.register_pack("extras", |registry: &mut Registry| {
		registry.register_widget("Badge", || -> NodeRef { Label::new() });
	});
	registry.register_serializer("ShoutingStrings", || -> Arc<dyn Serializer> {
		Arc::new(ShoutingStrings)
	});
	let mut stage = Stage::new(registry);
	stage.set_app_version("2.4.0");
	stage
}

async fn start() -> (App, ControlHost, JoinHandle<()>) {
	let host = ControlHost::new(stage()).unwrap();
	let (driver_io, host_io) = tokio::io::duplex(256 * 1024);
	let session = {
		let host = host.clone();
		tokio::spawn(async move { host.serve_stream(host_io).await })
	};
	let (reader, writer) = tokio::io::split(driver_io);
	(App::attach(reader, writer), host, session)
}

#[tokio::test]
async fn markup_round_trips_typed_attributes() {
	let (app, _host, _session) = start().await;

	let window = app
		.create_window(r#"<Window Title="Main"><TextBox Name="Entry"/></Window>"#)
		.await
		.unwrap();
	assert_eq!(window.element().kind(), "Window");
	assert_eq!(window.title().await.unwrap(), "Main");

	let entry = window.get_element("~Entry").await.unwrap();
	assert_eq!(entry.kind(), "TextBox");

	let echoed = entry
		.set_attribute("Text", &Value::Text("hello".into()))
		.await
		.unwrap();
	assert_eq!(echoed, Some(Value::Text("hello".into())));
	assert_eq!(
		entry.attribute("Text").await.unwrap(),
		Some(Value::Text("hello".into()))
	);
}

#[tokio::test]
async fn a_single_window_is_the_main_window() {
	let (app, _host, _session) = start().await;

	assert!(app.main_window().await.unwrap().is_none());

	let first = app.create_window("<Window/>").await.unwrap();
	let main = app.main_window().await.unwrap().unwrap();
	assert_eq!(main.element().id(), first.element().id());

	app.create_window("<Window/>").await.unwrap();
	assert_eq!(app.windows().await.unwrap().len(), 2);
	// Two windows and no explicit designation is ambiguous, not an error.
	assert!(app.main_window().await.unwrap().is_none());
}

#[tokio::test]
async fn parentless_queries_search_every_window() {
	let (app, _host, _session) = start().await;

	app.create_window(r#"<Window><Label Name="A"/></Window>"#)
		.await
		.unwrap();
	app.create_window(r#"<Window><Button Name="B"><Label/></Button></Window>"#)
		.await
		.unwrap();

	let found = app.get_element("~B").await.unwrap();
	assert_eq!(found.kind(), "Button");

	let label = found.get_element("/Label").await.unwrap();
	assert_eq!(label.kind(), "Label");
}

#[tokio::test]
async fn expression_steps_match_rendered_values() {
	let (app, _host, _session) = start().await;

	let window = app
		.create_window(r#"<Window><Panel><Label Text="a"/><Label Text="b"/></Panel></Window>"#)
		.await
		.unwrap();

	let second = window.get_element(r#"[Text="b"]"#).await.unwrap();
	assert_eq!(second.kind(), "Label");
	assert_eq!(
		second.attribute("Text").await.unwrap(),
		Some(Value::Text("b".into()))
	);
}

#[tokio::test]
async fn missing_elements_surface_the_host_error() {
	let (app, _host, _session) = start().await;
	app.create_window("<Window/>").await.unwrap();

	let err = app.get_element("~Ghost").await.unwrap_err();
	assert!(matches!(err, Error::Host { .. }));
	assert!(err.to_string().contains("Failed to find element"));
}

#[tokio::test]
async fn facade_windows_are_clamped_to_the_screen() {
	let (app, _host, _session) = start().await;

	let window = app
		.create_window(r#"<Window Width="4000" Height="4000"/>"#)
		.await
		.unwrap();

	assert_eq!(
		window.attribute("Width").await.unwrap(),
		Some(Value::Float(1920.0))
	);
	assert_eq!(
		window.attribute("Height").await.unwrap(),
		Some(Value::Float(1080.0))
	);
}

#[tokio::test]
async fn empty_attributes_read_as_none() {
	let (app, _host, _session) = start().await;

	let empty = app.create_window("<Window/>").await.unwrap();
	assert_eq!(empty.attribute("Content").await.unwrap(), None);

	let filled = app
		.create_window("<Window><Label/></Window>")
		.await
		.unwrap();
	let err = filled.attribute("Content").await.unwrap_err();
	assert!(err.to_string().contains("no serialized form"));
}

#[tokio::test]
async fn read_only_attributes_reject_assignment() {
	let (app, _host, _session) = start().await;

	let window = app
		.create_window(r#"<Window><Button Name="B"><Label/></Button></Window>"#)
		.await
		.unwrap();
	let button = window.get_element("~B").await.unwrap();

	let err = button
		.set_attribute("Content", &Value::Text("x".into()))
		.await
		.unwrap_err();
	assert!(err.to_string().contains("read-only"));
}

#[tokio::test]
async fn text_input_pushes_change_events() {
	let (app, _host, _session) = start().await;

	let window = app
		.create_window(r#"<Window><TextBox Name="Entry"/></Window>"#)
		.await
		.unwrap();
	let entry = window.get_element("~Entry").await.unwrap();

	let mut changed = entry
		.register_event("TextChanged")
		.await
		.unwrap()
		.expect("TextBox declares TextChanged");

	entry.send_input("abc").await.unwrap();
	let args = changed.next(Duration::from_secs(5)).await.unwrap();
	assert_eq!(args.fields.get("text").map(String::as_str), Some("abc"));

	changed.unregister().await.unwrap();
}

#[tokio::test]
async fn next_times_out_when_nothing_arrives() {
	let (app, _host, _session) = start().await;

	let window = app
		.create_window(r#"<Window><TextBox Name="Entry"/></Window>"#)
		.await
		.unwrap();
	let entry = window.get_element("~Entry").await.unwrap();
	let mut changed = entry.register_event("TextChanged").await.unwrap().unwrap();

	let err = changed.next(Duration::from_millis(50)).await.unwrap_err();
	assert!(err.is_timeout());
}

#[tokio::test]
async fn undeclared_events_are_a_soft_miss() {
	let (app, _host, _session) = start().await;

	let window = app
		.create_window(r#"<Window><Label Name="L"/></Window>"#)
		.await
		.unwrap();
	let label = window.get_element("~L").await.unwrap();

	assert!(label.register_event("TextChanged").await.unwrap().is_none());
}

#[tokio::test]
async fn initialize_loads_packs_and_resources() {
	let (app, _host, _session) = start().await;

	app.initialize(
		["extras"],
		r#"<Resources><Color Key="Accent">#FF336699</Color></Resources>"#,
	)
	.await
	.unwrap();

	let accent = app.get_resource("Accent").await.unwrap();
	assert_eq!(accent, Value::Color(Color::argb(0xFF, 0x33, 0x66, 0x99)));

	// The pack registered a Badge widget; markup can use it now.
	let window = app
		.create_window(r#"<Window><Badge Name="B"/></Window>"#)
		.await
		.unwrap();
	assert_eq!(window.get_element("~B").await.unwrap().kind(), "Label");
}

#[tokio::test]
async fn unknown_packs_fail_initialize() {
	let (app, _host, _session) = start().await;

	let err = app.initialize(["nope"], "").await.unwrap_err();
	assert!(matches!(err, Error::Host { .. }));
	assert!(err.to_string().contains("Unknown component pack 'nope'"));
}

#[tokio::test]
async fn missing_resources_report_their_key() {
	let (app, _host, _session) = start().await;

	let err = app.get_resource("Ghost").await.unwrap_err();
	assert!(err.to_string().contains("Resource with key 'Ghost' not found"));
}

#[tokio::test]
async fn screenshots_decode_as_png() {
	let (app, _host, _session) = start().await;

	app.create_window(r#"<Window Width="320" Height="200"/>"#)
		.await
		.unwrap();

	let bytes = app.screenshot().await.unwrap();
	assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

	let windows = app.windows().await.unwrap();
	let bytes = windows[0].element().screenshot().await.unwrap();
	assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
}

#[tokio::test]
async fn registered_serializers_shape_both_directions() {
	let (app, _host, _session) = start().await;

	let window = app
		.create_window(r#"<Window><TextBox Name="Entry"/></Window>"#)
		.await
		.unwrap();
	let entry = window.get_element("~Entry").await.unwrap();

	app.register_serializer(Arc::new(ShoutingStrings), 0)
		.await
		.unwrap();

	// Outbound text is shouted on the wire; both sides whisper it back.
	let echoed = entry
		.set_attribute("Text", &Value::Text("Hello".into()))
		.await
		.unwrap();
	assert_eq!(echoed, Some(Value::Text("hello".into())));
}

#[tokio::test]
async fn window_types_resolve_through_the_registry() {
	let (app, _host, _session) = start().await;

	let window = app.create_window_type("styled").await.unwrap();
	assert_eq!(window.element().kind(), "Window");

	let err = app.create_window_type("nope").await.unwrap_err();
	assert!(err.to_string().contains("Unknown window type 'nope'"));
}

#[tokio::test]
async fn frozen_styles_cannot_be_addressed() {
	let (app, _host, _session) = start().await;

	let window = app.create_window_type("styled").await.unwrap();
	let err = window.get_element(".Style").await.unwrap_err();
	assert!(err.to_string().contains("frozen"));
}

#[tokio::test]
async fn version_reports_both_sides() {
	let (app, _host, _session) = start().await;

	let versions = app.version().await.unwrap();
	assert_eq!(versions.host, env!("CARGO_PKG_VERSION"));
	assert_eq!(versions.app, "2.4.0");
}

#[tokio::test]
async fn close_shuts_the_host_down() {
	let (app, host, session) = start().await;
	app.create_window("<Window/>").await.unwrap();

	app.close().await.unwrap();
	session.await.unwrap();
	assert_eq!(host.exit_code(), Some(0));
}
