//! Cooperative fixed-interval polling loops.
//!
//! A poller never gets forcibly aborted. Every iteration first observes its
//! liveness switch and returns instead of rescheduling once the switch is
//! revoked, so a tick that has started always runs to completion.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::Liveness;

/// Shortest period a poller will run at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Continuation directive returned by one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollFlow {
	/// Keep polling.
	Continue,
	/// Exit the loop.
	Stop,
}

/// Handle to a background polling loop started by [`spawn_poller`].
#[derive(Debug)]
pub struct Poller {
	name: &'static str,
	liveness: Liveness,
	task: JoinHandle<()>,
}

impl Poller {
	/// Asks the loop to exit at its next suspension point.
	pub fn cancel(&self) {
		tracing::trace!(task = self.name, "worker.poller.cancel");
		self.liveness.revoke();
	}

	/// Returns true once the loop has exited.
	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	/// Waits for the loop to exit.
	pub async fn join(self) {
		let _ = self.task.await;
	}
}

/// Spawns a loop that calls `tick` once per `interval` while `liveness` holds.
///
/// The first tick fires one full interval after spawning. The poller owns a
/// child of `liveness`, so [`Poller::cancel`] stops only this loop.
pub fn spawn_poller<F>(name: &'static str, interval: Duration, liveness: &Liveness, mut tick: F) -> Poller
where
	F: FnMut() -> PollFlow + Send + 'static,
{
	let interval = interval.max(MIN_POLL_INTERVAL);
	let liveness = liveness.child();
	let loop_liveness = liveness.clone();

	let task = crate::spawn(name, async move {
		let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		let mut ticks = 0u64;

		loop {
			tokio::select! {
				biased;
				_ = loop_liveness.revoked() => break,
				_ = ticker.tick() => {}
			}
			if !loop_liveness.is_live() {
				break;
			}
			ticks = ticks.wrapping_add(1);
			if tick() == PollFlow::Stop {
				break;
			}
		}

		tracing::trace!(task = name, ticks, "worker.poller.exit");
	});

	Poller { name, liveness, task }
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	fn counting(counter: &Arc<AtomicUsize>) -> impl FnMut() -> PollFlow + Send + 'static {
		let counter = Arc::clone(counter);
		move || {
			counter.fetch_add(1, Ordering::SeqCst);
			PollFlow::Continue
		}
	}

	#[tokio::test(start_paused = true)]
	async fn first_tick_waits_one_interval() {
		let ticks = Arc::new(AtomicUsize::new(0));
		let live = Liveness::new();
		let poller = spawn_poller("test.poll", Duration::from_secs(1), &live, counting(&ticks));

		tokio::time::sleep(Duration::from_millis(500)).await;
		assert_eq!(ticks.load(Ordering::SeqCst), 0);

		tokio::time::sleep(Duration::from_millis(2_000)).await;
		assert_eq!(ticks.load(Ordering::SeqCst), 2);

		poller.cancel();
		poller.join().await;
	}

	#[tokio::test(start_paused = true)]
	async fn revoking_owner_stops_loop() {
		let ticks = Arc::new(AtomicUsize::new(0));
		let live = Liveness::new();
		let poller = spawn_poller("test.poll", Duration::from_secs(1), &live, counting(&ticks));

		tokio::time::sleep(Duration::from_millis(1_500)).await;
		live.revoke();
		tokio::time::sleep(Duration::from_secs(10)).await;

		assert_eq!(ticks.load(Ordering::SeqCst), 1);
		assert!(poller.is_finished());
	}

	#[tokio::test(start_paused = true)]
	async fn cancel_leaves_owner_live() {
		let ticks = Arc::new(AtomicUsize::new(0));
		let live = Liveness::new();
		let poller = spawn_poller("test.poll", Duration::from_secs(1), &live, counting(&ticks));

		poller.cancel();
		poller.join().await;

		assert!(live.is_live());
		assert_eq!(ticks.load(Ordering::SeqCst), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn stop_flow_ends_loop() {
		let live = Liveness::new();
		let poller = spawn_poller("test.poll", Duration::from_secs(1), &live, || PollFlow::Stop);

		tokio::time::sleep(Duration::from_millis(1_500)).await;
		assert!(poller.is_finished());
	}
}
