//! Host-process logging.
//!
//! The host shares stdio with whatever launched it, so logs default to
//! stderr and a driver that wants them out of the way passes a log file
//! path on the command line. `WALDO_LOG` overrides the level filter in
//! either mode.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init(log_file: Option<&Path>, debug: bool) -> anyhow::Result<()> {
	let default_level = if debug { "waldo=debug" } else { "waldo=info" };
	let env_filter =
		EnvFilter::try_from_env("WALDO_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

	match log_file {
		Some(path) => {
			let file = File::create(path)
				.with_context(|| format!("failed to open log file {}", path.display()))?;
			tracing_subscriber::fmt()
				.with_env_filter(env_filter)
				.with_writer(Mutex::new(file))
				.with_ansi(false)
				.with_target(true)
				.with_level(true)
				.compact()
				.init();
		}
		None => {
			let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);
			tracing_subscriber::fmt()
				.with_env_filter(env_filter)
				.with_writer(stderr)
				.with_target(true)
				.with_level(true)
				.compact()
				.init();
		}
	}
	Ok(())
}
