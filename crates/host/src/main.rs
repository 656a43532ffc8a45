use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::UnixListener;
use tracing::info;
use waldo_host::{ControlHost, Registry, Stage, logging, watchdog};
use waldo_protocol::control_socket_path;

#[derive(Parser, Debug)]
#[command(name = "waldo-host")]
#[command(about = "Control host serving the waldo driver protocol")]
#[command(version)]
struct Args {
	/// Pid of the driver process; the host exits when it disappears.
	driver_pid: u32,

	/// Application definition to activate before serving.
	#[arg(long, value_name = "KEY")]
	application_type: Option<String>,

	/// Write logs to this file instead of stderr.
	#[arg(long, value_name = "FILE")]
	log_file: Option<PathBuf>,

	/// Log at debug level.
	#[arg(long)]
	debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	logging::init(args.log_file.as_deref(), args.debug)?;
	info!(target: "waldo", driver_pid = args.driver_pid, "host starting");

	watchdog::spawn(args.driver_pid);

	let mut stage = Stage::new(Registry::with_builtins());
	if let Some(key) = &args.application_type {
		stage
			.activate_application(key)
			.map_err(|message| anyhow::anyhow!(message))?;
	}

	let host = ControlHost::new(stage).context("failed to start the UI thread")?;
	let socket_path = control_socket_path(std::process::id());
	if socket_path.exists() {
		// Left behind by a previous host with this pid.
		std::fs::remove_file(&socket_path)
			.with_context(|| format!("failed to remove stale socket {}", socket_path.display()))?;
	}
	let listener = UnixListener::bind(&socket_path)
		.with_context(|| format!("failed to bind {}", socket_path.display()))?;
	info!(target: "waldo", socket = %socket_path.display(), "listening");

	let code = host.serve_listener(listener).await;
	let _ = std::fs::remove_file(&socket_path);
	info!(target: "waldo", code, "host exiting");
	std::process::exit(code);
}
