use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::SyncError;

/// Cancellation and deadline for one sync call.
///
/// Store calls made by the syncers race against both; whichever fires first
/// aborts the call with [`SyncError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
	cancel: Option<watch::Receiver<bool>>,
	deadline: Option<Instant>,
}

/// Trigger for the contexts created by [`SyncContext::cancellable`].
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
	pub fn cancel(&self) {
		self.0.send_replace(true);
	}
}

impl SyncContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// A context cancelled through the returned handle.
	pub fn cancellable() -> (CancelHandle, Self) {
		let (tx, rx) = watch::channel(false);
		let ctx = Self {
			cancel: Some(rx),
			deadline: None,
		};
		(CancelHandle(tx), ctx)
	}

	/// Limit the context to `timeout` from now, keeping an earlier deadline.
	pub fn with_timeout(self, timeout: Duration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	pub fn with_deadline(mut self, deadline: Instant) -> Self {
		self.deadline = Some(match self.deadline {
			Some(current) => current.min(deadline),
			None => deadline,
		});
		self
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	pub fn is_cancelled(&self) -> bool {
		let cancelled = self.cancel.as_ref().is_some_and(|rx| *rx.borrow());
		let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
		cancelled || expired
	}

	async fn done(&self) {
		let cancelled = async {
			match self.cancel.clone() {
				Some(mut rx) => {
					// a dropped handle can never cancel
					let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
					if closed {
						std::future::pending::<()>().await;
					}
				}
				None => std::future::pending::<()>().await,
			}
		};
		let expired = async {
			match self.deadline {
				Some(deadline) => tokio::time::sleep_until(deadline).await,
				None => std::future::pending::<()>().await,
			}
		};

		tokio::select! {
			_ = cancelled => {}
			_ = expired => {}
		}
	}

	/// Run `fut` unless the context is done first.
	pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, SyncError> {
		if self.is_cancelled() {
			return Err(SyncError::Cancelled);
		}
		tokio::select! {
			biased;
			_ = self.done() => Err(SyncError::Cancelled),
			out = fut => Ok(out),
		}
	}
}
