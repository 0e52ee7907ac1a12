use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

/// A periodic trigger carrying no object, used to requeue every watched
/// object (e.g. once a day).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
	pub at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BeatError {
	#[error("beat interval must be greater than zero")]
	ZeroInterval,
}

pub struct Beat {
	interval: Duration,
	tx: mpsc::Sender<Tick>,
}

impl Beat {
	/// Create a beat and the stream its ticks are delivered on.
	pub fn new(interval: Duration) -> Result<(Self, ReceiverStream<Tick>), BeatError> {
		if interval.is_zero() {
			return Err(BeatError::ZeroInterval);
		}
		let (tx, rx) = mpsc::channel(1);
		Ok((Self { interval, tx }, ReceiverStream::new(rx)))
	}

	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Emit one tick right away, then one per interval, until `shutdown`
	/// flips to true or the stream is dropped.
	pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(self.interval);
			loop {
				tokio::select! {
					biased;
					changed = shutdown.changed() => {
						if changed.is_err() || *shutdown.borrow() {
							break;
						}
					}
					_ = ticker.tick() => {
						if self.tx.send(Tick { at: Utc::now() }).await.is_err() {
							log::debug!("beat receiver dropped");
							break;
						}
					}
				}
			}
			log::debug!("beat stopped");
		})
	}
}
