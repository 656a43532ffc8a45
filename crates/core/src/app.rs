//! Application handle: launching hosts and top-level operations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use waldo_protocol::ops::{self, method};
use waldo_protocol::{Serializer, SerializerChain, Value};
use waldo_runtime::{
	Connection, DEFAULT_CONNECTION_TIMEOUT, Error, HostSession, LaunchConfig, Result,
};

use crate::element::Element;
use crate::window::Window;

/// Interval between version probes while waiting for the host to serve.
const HANDSHAKE_POLL: Duration = Duration::from_millis(100);

/// How long [`App::close`] waits for a host to exit before killing it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// State shared by every handle minted from one application connection.
pub(crate) struct AppCtx {
	pub(crate) connection: Arc<Connection>,
	/// Driver-side rendering chain, kept in step with the host's by
	/// [`App::register_serializer`].
	pub(crate) serializers: Mutex<SerializerChain>,
}

/// Collapses an operation's error list into a single [`Error::Host`].
pub(crate) fn require_ok(messages: Vec<String>) -> Result<()> {
	if messages.is_empty() {
		Ok(())
	} else {
		Err(Error::Host { messages })
	}
}

pub(crate) fn decode_screenshot(reply: ops::ScreenshotReply) -> Result<Vec<u8>> {
	if !reply.error_messages.is_empty() {
		return Err(Error::Host {
			messages: reply.error_messages,
		});
	}
	reply
		.decode_bytes()
		.map_err(|err| Error::Protocol(format!("screenshot payload: {err}")))?
		.ok_or_else(|| Error::Protocol("screenshot reply carried no image".to_owned()))
}

/// How to start a host process for [`App::launch`].
#[derive(Debug, Clone)]
pub struct AppOptions {
	executable: PathBuf,
	application_type: Option<String>,
	log_file: Option<PathBuf>,
	debug: bool,
	connection_timeout: Duration,
}

impl AppOptions {
	pub fn new(executable: impl Into<PathBuf>) -> Self {
		Self {
			executable: executable.into(),
			application_type: None,
			log_file: None,
			debug: false,
			connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
		}
	}

	/// Asks the host to activate a registered application before serving.
	pub fn application_type(mut self, key: impl Into<String>) -> Self {
		self.application_type = Some(key.into());
		self
	}

	/// Routes host logs to a file instead of the host's stderr.
	pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.log_file = Some(path.into());
		self
	}

	/// Turns on debug-level host logging.
	pub fn debug(mut self, debug: bool) -> Self {
		self.debug = debug;
		self
	}

	/// Budget for the host to accept a connection; also bounds the
	/// version handshake after connecting.
	pub fn connection_timeout(mut self, timeout: Duration) -> Self {
		self.connection_timeout = timeout;
		self
	}

	fn launch_config(&self) -> LaunchConfig {
		let mut config = LaunchConfig::new(&self.executable);
		config.connection_timeout = self.connection_timeout;
		// The host watches this pid and exits when the driver disappears.
		config.args.push(std::process::id().to_string());
		if let Some(key) = &self.application_type {
			config.args.push("--application-type".to_owned());
			config.args.push(key.clone());
		}
		if let Some(path) = &self.log_file {
			config.args.push("--log-file".to_owned());
			config.args.push(path.display().to_string());
		}
		if self.debug {
			config.args.push("--debug".to_owned());
		}
		config
	}
}

struct AppInner {
	ctx: Arc<AppCtx>,
	/// Present only for launched hosts; holds the kill-on-drop child.
	session: tokio::sync::Mutex<Option<HostSession>>,
	/// Task driving [`Connection::run`].
	pump: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for AppInner {
	fn drop(&mut self) {
		if let Some(pump) = self.pump.lock().take() {
			pump.abort();
		}
	}
}

/// A connected host application.
///
/// Cloning is cheap and shares the connection. Dropping the last clone of
/// a launched app kills the host process; [`App::close`] shuts it down
/// cleanly instead, and [`App::detach`] lets it outlive the handle.
#[derive(Clone)]
pub struct App {
	inner: Arc<AppInner>,
}

/// Version pair reported by [`App::version`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versions {
	/// Version of the host binary serving the protocol.
	pub host: String,
	/// Version the embedding application reports for itself.
	pub app: String,
}

impl App {
	/// Spawns a host process and connects to it.
	///
	/// Returns once the host answers its first version call, so a
	/// returned `App` is ready for operations. A handshake that does not
	/// complete within the connection budget kills the spawned host
	/// before the timeout is reported.
	pub async fn launch(options: AppOptions) -> Result<Self> {
		let mut session = HostSession::launch(options.launch_config()).await?;
		let stream = match session.connect().await {
			Ok(stream) => stream,
			Err(err) => {
				session.kill().await;
				return Err(err);
			}
		};
		let (reader, writer) = stream.into_split();
		let app = Self::attach(reader, writer);

		let deadline = Instant::now() + session.connection_timeout();
		loop {
			// Bound each probe as well: a host that accepted the socket but
			// never serves must not hang the launch.
			let remaining = deadline.saturating_duration_since(Instant::now());
			match tokio::time::timeout(remaining, app.version()).await {
				Ok(Ok(_)) => break,
				Ok(Err(err)) => {
					if Instant::now() >= deadline {
						session.kill().await;
						return Err(Error::Timeout(format!(
							"host did not serve within {:?}: {err}",
							session.connection_timeout()
						)));
					}
					tokio::time::sleep(HANDSHAKE_POLL).await;
				}
				Err(_) => {
					session.kill().await;
					return Err(Error::Timeout(format!(
						"host did not serve within {:?}",
						session.connection_timeout()
					)));
				}
			}
		}

		session.startup_complete();
		*app.inner.session.lock().await = Some(session);
		Ok(app)
	}

	/// Wraps an already-established control channel.
	///
	/// Used by in-process tests and by embeddings that manage the host
	/// process themselves. The returned app owns no child process.
	///
	/// Must be called from within a Tokio runtime.
	pub fn attach<R, W>(reader: R, writer: W) -> Self
	where
		R: AsyncRead + Unpin + Send + 'static,
		W: AsyncWrite + Unpin + Send + 'static,
	{
		let connection = Connection::over_stream(reader, writer);
		let pump = tokio::spawn(Arc::clone(&connection).run());
		Self {
			inner: Arc::new(AppInner {
				ctx: Arc::new(AppCtx {
					connection,
					serializers: Mutex::new(SerializerChain::with_defaults()),
				}),
				session: tokio::sync::Mutex::new(None),
				pump: Mutex::new(Some(pump)),
			}),
		}
	}

	fn ctx(&self) -> &Arc<AppCtx> {
		&self.inner.ctx
	}

	/// Loads component packs and a resource dictionary into the host.
	pub async fn initialize<I, S>(&self, component_packs: I, resource_markup: &str) -> Result<()>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let request = ops::InitializeRequest {
			component_packs: component_packs.into_iter().map(Into::into).collect(),
			resource_markup: resource_markup.to_owned(),
		};
		let ops::InitializeReply { error_messages } = self
			.ctx()
			.connection
			.request(method::INITIALIZE_APPLICATION, &request)
			.await?;
		require_ok(error_messages)
	}

	async fn build_window(&self, request: ops::CreateWindowRequest) -> Result<Window> {
		let ops::CreateWindowReply {
			window,
			log_messages,
			error_messages,
		} = self
			.ctx()
			.connection
			.request(method::CREATE_WINDOW, &request)
			.await?;
		for line in &log_messages {
			debug!(target: "waldo", "{line}");
		}
		require_ok(error_messages)?;
		let handle =
			window.ok_or_else(|| Error::Protocol("window reply carried no handle".to_owned()))?;
		Ok(Window::from_handle(Arc::clone(self.ctx()), handle))
	}

	/// Creates a window from markup and waits for it to be shown.
	///
	/// The new window is clamped to the host's virtual screen, so its
	/// elements stay visible and capturable.
	pub async fn create_window(&self, markup: &str) -> Result<Window> {
		self.build_window(ops::CreateWindowRequest {
			markup: Some(markup.to_owned()),
			window_type: None,
			fit_to_screen: true,
		})
		.await
	}

	/// Creates a window of a type registered with the host application.
	pub async fn create_window_type(&self, key: &str) -> Result<Window> {
		self.build_window(ops::CreateWindowRequest {
			markup: None,
			window_type: Some(key.to_owned()),
			fit_to_screen: true,
		})
		.await
	}

	/// The window the host currently designates as main.
	///
	/// `Ok(None)` covers both "no windows" and an ambiguous designation.
	pub async fn main_window(&self) -> Result<Option<Window>> {
		let ops::MainWindowReply {
			window,
			error_messages,
		} = self
			.ctx()
			.connection
			.request(method::GET_MAIN_WINDOW, &ops::GetMainWindowRequest {})
			.await?;
		require_ok(error_messages)?;
		Ok(window.map(|handle| Window::from_handle(Arc::clone(self.ctx()), handle)))
	}

	/// Every window the host is showing, in creation order.
	pub async fn windows(&self) -> Result<Vec<Window>> {
		let ops::WindowsReply {
			windows,
			error_messages,
		} = self
			.ctx()
			.connection
			.request(method::GET_WINDOWS, &ops::GetWindowsRequest {})
			.await?;
		require_ok(error_messages)?;
		Ok(windows
			.into_iter()
			.map(|handle| Window::from_handle(Arc::clone(self.ctx()), handle))
			.collect())
	}

	/// Finds an element by query, searching every window in order.
	pub async fn get_element(&self, query: &str) -> Result<Element> {
		let reply = self
			.ctx()
			.connection
			.request(
				method::GET_ELEMENT,
				&ops::GetElementRequest {
					parent: None,
					query: query.to_owned(),
				},
			)
			.await?;
		Element::from_reply(Arc::clone(self.ctx()), reply)
	}

	/// Reads a typed value from the host's resource dictionary.
	pub async fn get_resource(&self, key: &str) -> Result<Value> {
		let ops::ResourceReply {
			key: _,
			value,
			value_type,
			error_messages,
		} = self
			.ctx()
			.connection
			.request(
				method::GET_RESOURCE,
				&ops::GetResourceRequest {
					key: key.to_owned(),
				},
			)
			.await?;
		require_ok(error_messages)?;
		let (Some(value), Some(value_type)) = (value, value_type) else {
			return Err(Error::Protocol(format!(
				"resource '{key}' came back without a rendering"
			)));
		};
		self.ctx()
			.serializers
			.lock()
			.deserialize(&value_type, &value)
			.map_err(|err| Error::Protocol(err.to_string()))
	}

	/// Captures a PNG of every window composited onto one canvas.
	pub async fn screenshot(&self) -> Result<Vec<u8>> {
		let reply = self
			.ctx()
			.connection
			.request(
				method::GET_SCREENSHOT,
				&ops::GetScreenshotRequest { element: None },
			)
			.await?;
		decode_screenshot(reply)
	}

	/// Registers a serializer at `index` in the host's chain and mirrors
	/// it into this driver's chain, so custom renderings round-trip.
	///
	/// The host resolves `serializer.name()` against its registry; the
	/// embedding must have registered a factory under the same name.
	pub async fn register_serializer(
		&self,
		serializer: Arc<dyn Serializer>,
		index: usize,
	) -> Result<()> {
		let ops::RegisterSerializerReply { error_messages } = self
			.ctx()
			.connection
			.request(
				method::REGISTER_SERIALIZER,
				&ops::RegisterSerializerRequest {
					name: serializer.name().to_owned(),
					index,
				},
			)
			.await?;
		require_ok(error_messages)?;
		self.ctx().serializers.lock().insert(index, serializer);
		Ok(())
	}

	/// Reports the host binary's version and the embedding application's.
	pub async fn version(&self) -> Result<Versions> {
		let ops::VersionReply {
			host_version,
			app_version,
			error_messages,
		} = self
			.ctx()
			.connection
			.request(method::GET_VERSION, &ops::GetVersionRequest {})
			.await?;
		require_ok(error_messages)?;
		Ok(Versions {
			host: host_version,
			app: app_version,
		})
	}

	/// Asks the host to exit with `exit_code`. The host replies before
	/// terminating, so this returns once the request is acknowledged.
	pub async fn shutdown(&self, exit_code: i32) -> Result<()> {
		let ops::ShutdownReply { error_messages } = self
			.ctx()
			.connection
			.request(method::SHUTDOWN, &ops::ShutdownRequest { exit_code })
			.await?;
		require_ok(error_messages)
	}

	/// Shuts the host down cleanly and reaps a launched process.
	pub async fn close(&self) -> Result<()> {
		self.shutdown(0).await?;
		if let Some(mut session) = self.inner.session.lock().await.take() {
			// The host exits on its own after replying; kill one that has
			// not gone within the grace period.
			if tokio::time::timeout(SHUTDOWN_GRACE, session.wait())
				.await
				.is_err()
			{
				session.kill().await;
			}
		}
		Ok(())
	}

	/// Releases a launched host so it keeps running after this app is
	/// dropped. Returns the host pid when there was a child to release.
	pub async fn detach(&self) -> Option<u32> {
		let session = self.inner.session.lock().await.take()?;
		session.detach()
	}
}
