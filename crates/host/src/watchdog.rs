//! Driver-process watchdog.
//!
//! The host must not outlive the driver that spawned it; an orphaned host
//! would keep its socket and UI thread alive forever. A background thread
//! polls for the driver pid and exits the process the moment it is gone.

#[cfg(target_os = "linux")]
use std::time::Duration;

#[cfg(target_os = "linux")]
use tracing::warn;

#[cfg(target_os = "linux")]
const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[cfg(target_os = "linux")]
fn driver_alive(pid: u32) -> bool {
	std::path::Path::new(&format!("/proc/{pid}")).exists()
}

/// Spawns the watchdog thread for `driver_pid`.
#[cfg(target_os = "linux")]
pub fn spawn(driver_pid: u32) {
	let spawned = std::thread::Builder::new()
		.name("waldo-watchdog".to_owned())
		.spawn(move || {
			loop {
				if !driver_alive(driver_pid) {
					warn!(target: "waldo", driver_pid, "driver process is gone, exiting");
					std::process::exit(1);
				}
				std::thread::sleep(POLL_INTERVAL);
			}
		});
	if let Err(err) = spawned {
		warn!(target: "waldo", error = %err, "failed to start the watchdog");
	}
}

#[cfg(not(target_os = "linux"))]
pub fn spawn(driver_pid: u32) {
	tracing::debug!(target: "waldo", driver_pid, "driver watchdog unavailable on this platform");
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
	use super::*;

	#[test]
	fn liveness_tracks_the_proc_entry() {
		assert!(driver_alive(std::process::id()));
		// Above the kernel's pid ceiling, so never a live process.
		assert!(!driver_alive(u32::MAX));
	}
}
