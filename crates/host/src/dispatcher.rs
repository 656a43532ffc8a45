//! UI-thread confinement.
//!
//! All tree access runs on one dedicated thread owning the [`Stage`].
//! Operations are submitted as closures and awaited through a oneshot,
//! so the async session code never touches a widget directly. A panic
//! inside an operation is caught, reported with the backtrace captured at
//! the panic site, and leaves the thread serving subsequent operations.

use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::stage::Stage;

const UI_THREAD_NAME: &str = "waldo-ui";

type Task = Box<dyn FnOnce(&mut Stage) + Send>;

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
	#[error("UI task panicked: {message}")]
	Panicked { message: String, stack: String },
	#[error("UI thread is gone")]
	Closed,
}

impl DispatchError {
	/// Rendering for operation error lists, including the backtrace when
	/// one was captured.
	pub fn detail(&self) -> String {
		match self {
			DispatchError::Panicked { message, stack } if !stack.is_empty() => {
				format!("{message}\n{stack}")
			}
			DispatchError::Panicked { message, .. } => message.clone(),
			DispatchError::Closed => self.to_string(),
		}
	}
}

struct CapturedPanic {
	location: String,
	backtrace: String,
}

thread_local! {
	static LAST_PANIC: RefCell<Option<CapturedPanic>> = const { RefCell::new(None) };
}

/// The default hook would print every caught panic to stderr. Ours stays
/// quiet for UI-thread panics and records the backtrace for the error
/// report instead; panics elsewhere fall through to the previous hook.
fn install_panic_hook() {
	static HOOK: Once = Once::new();
	HOOK.call_once(|| {
		let previous = panic::take_hook();
		panic::set_hook(Box::new(move |info| {
			if std::thread::current().name() == Some(UI_THREAD_NAME) {
				let captured = CapturedPanic {
					location: info
						.location()
						.map(|location| location.to_string())
						.unwrap_or_default(),
					backtrace: Backtrace::force_capture().to_string(),
				};
				LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(captured));
			} else {
				previous(info);
			}
		}));
	});
}

fn take_captured_stack() -> String {
	LAST_PANIC
		.with(|slot| slot.borrow_mut().take())
		.map(|captured| {
			if captured.location.is_empty() {
				captured.backtrace
			} else {
				format!("panicked at {}\n{}", captured.location, captured.backtrace)
			}
		})
		.unwrap_or_default()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	if let Some(text) = payload.downcast_ref::<&str>() {
		(*text).to_owned()
	} else if let Some(text) = payload.downcast_ref::<String>() {
		text.clone()
	} else {
		"unknown panic payload".to_owned()
	}
}

/// Handle for submitting work to the UI thread.
pub struct Dispatcher {
	tx: mpsc::UnboundedSender<Task>,
}

impl Dispatcher {
	/// Spawns the UI thread owning `stage`. The thread runs until every
	/// dispatcher handle is dropped.
	pub fn spawn(stage: Stage) -> io::Result<Arc<Self>> {
		install_panic_hook();
		let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
		std::thread::Builder::new()
			.name(UI_THREAD_NAME.to_owned())
			.spawn(move || {
				let mut stage = stage;
				while let Some(task) = rx.blocking_recv() {
					task(&mut stage);
				}
				debug!(target: "waldo", "UI thread finished");
			})?;
		Ok(Arc::new(Self { tx }))
	}

	/// Runs `task` on the UI thread and waits for its result.
	pub async fn invoke<T, F>(&self, task: F) -> Result<T, DispatchError>
	where
		F: FnOnce(&mut Stage) -> T + Send + 'static,
		T: Send + 'static,
	{
		let (done_tx, done_rx) = oneshot::channel();
		let wrapped: Task = Box::new(move |stage| {
			let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(stage))).map_err(|payload| {
				DispatchError::Panicked {
					message: panic_message(payload.as_ref()),
					stack: take_captured_stack(),
				}
			});
			let _ = done_tx.send(outcome);
		});
		self.tx.send(wrapped).map_err(|_| DispatchError::Closed)?;
		done_rx.await.map_err(|_| DispatchError::Closed)?
	}
}
