//! Session-scoped memoization primitives.
//!
//! Both caches are invalidated in one sweep by bumping the owning session's
//! cache epoch ([`Session::invalidate_caches`](crate::Session::invalidate_caches));
//! a stale epoch is detected lazily on the next access. Neither cache
//! cancels or blocks work in flight elsewhere in the session.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::session::SessionCore;
use crate::{Error, Result};

pub(crate) type ComputeFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Single-flight, lazily computed, epoch-invalidated memo.
///
/// The first access after creation or invalidation runs the computation
/// under the cache lock: concurrent first readers block until the one
/// computation finishes and then observe its result — never a partial
/// value, never a second computation. Once the session has terminated,
/// accesses serve the last successfully computed value (or the
/// construction default) without touching the remote side.
pub struct Cached<T> {
	core: Arc<SessionCore>,
	compute: Box<dyn Fn() -> Result<T> + Send + Sync>,
	state: Mutex<CachedState<T>>,
}

struct CachedState<T> {
	epoch: Option<u64>,
	value: Option<T>,
	fallback: Option<T>,
}

impl<T: Clone> Cached<T> {
	pub(crate) fn new(
		core: Arc<SessionCore>,
		default: Option<T>,
		compute: Box<dyn Fn() -> Result<T> + Send + Sync>,
	) -> Self {
		Self {
			core,
			compute,
			state: Mutex::new(CachedState {
				epoch: None,
				value: None,
				fallback: default,
			}),
		}
	}

	/// Returns the memoized value, computing it first if stale.
	///
	/// A computation that fails with [`Error::Terminated`] falls back to
	/// the previous value; other failures propagate and leave the memo
	/// empty, so the next access retries.
	pub fn get(&self) -> Result<T> {
		let mut state = self.state.lock();
		let current = self.core.epoch();
		if state.epoch == Some(current) {
			if let Some(value) = &state.value {
				return Ok(value.clone());
			}
		}
		state.epoch = Some(current);
		state.value = None;
		let computed = if self.core.is_alive() {
			(self.compute)()
		} else {
			Err(Error::Terminated)
		};
		let value = match computed {
			Ok(value) => {
				state.fallback = Some(value.clone());
				value
			}
			Err(Error::Terminated) => state.fallback.clone().ok_or(Error::Terminated)?,
			Err(err) => return Err(err),
		};
		state.value = Some(value.clone());
		Ok(value)
	}
}

/// Last-known-good asynchronous memo.
///
/// Always holds a value, starting from a caller-supplied default, and runs
/// at most one recomputation per cache epoch. The stored value is replaced
/// only by a successfully completed recomputation: a failure leaves it in
/// place, and a recomputation hitting a terminated session resolves
/// waiters with the previous value.
pub struct AsyncCached<T> {
	inner: Arc<AsyncCachedInner<T>>,
}

struct AsyncCachedInner<T> {
	core: Arc<SessionCore>,
	compute: Box<dyn Fn() -> ComputeFuture<T> + Send + Sync>,
	state: Mutex<AsyncCachedState<T>>,
}

struct AsyncCachedState<T> {
	epoch: Option<u64>,
	value: T,
	flight: Option<Arc<Flight<T>>>,
}

/// One recomputation. Waiters park on `notify` until `outcome` is settled;
/// the settled flight stays around so late readers of the same epoch get
/// the outcome without recomputing.
struct Flight<T> {
	outcome: Mutex<Option<Result<T>>>,
	notify: Notify,
}

impl<T: Clone> Flight<T> {
	fn settle(&self, outcome: Result<T>) {
		*self.outcome.lock() = Some(outcome);
		self.notify.notify_waiters();
	}

	async fn wait(&self) -> Result<T> {
		loop {
			// Register the notification before checking, against a lost
			// wakeup between the check and the await.
			let notified = self.notify.notified();
			if let Some(outcome) = self.outcome.lock().clone() {
				return outcome;
			}
			notified.await;
		}
	}
}

impl<T> Clone for AsyncCached<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> AsyncCached<T>
where
	T: Clone + Send + Sync + 'static,
{
	pub(crate) fn new(
		core: Arc<SessionCore>,
		default: T,
		compute: Box<dyn Fn() -> ComputeFuture<T> + Send + Sync>,
	) -> Self {
		Self {
			inner: Arc::new(AsyncCachedInner {
				core,
				compute,
				state: Mutex::new(AsyncCachedState {
					epoch: None,
					value: default,
					flight: None,
				}),
			}),
		}
	}

	/// Ensures a recomputation exists for the current epoch and returns its
	/// flight (possibly already settled).
	fn refresh(&self) -> Arc<Flight<T>> {
		let (flight, epoch) = {
			let mut state = self.inner.state.lock();
			let current = self.inner.core.epoch();
			if state.epoch == Some(current) {
				if let Some(flight) = &state.flight {
					return Arc::clone(flight);
				}
			}
			state.epoch = Some(current);
			let flight = Arc::new(Flight {
				outcome: Mutex::new(None),
				notify: Notify::new(),
			});
			state.flight = Some(Arc::clone(&flight));
			(flight, current)
		};

		let inner = Arc::clone(&self.inner);
		let recompute = (self.inner.compute)();
		let task_flight = Arc::clone(&flight);
		tokio::spawn(async move {
			let result = recompute.await;
			let outcome = {
				let mut state = inner.state.lock();
				match result {
					Ok(value) => {
						// A newer epoch may have superseded this run; its
						// value must not clobber the fresher one.
						if state.epoch == Some(epoch) {
							state.value = value.clone();
						}
						Ok(value)
					}
					Err(Error::Terminated) => Ok(state.value.clone()),
					Err(err) => Err(err),
				}
			};
			task_flight.settle(outcome);
		});
		flight
	}

	/// The last known good value, kicking off a recomputation when stale.
	///
	/// Never waits and never exposes a recomputation that has not
	/// completed.
	pub fn latest(&self) -> T {
		let _ = self.refresh();
		self.inner.state.lock().value.clone()
	}

	/// Awaits the freshest value for the current epoch.
	///
	/// Propagates the error of a failed recomputation; a recomputation cut
	/// short by session termination resolves with the last known good
	/// value instead.
	pub async fn get(&self) -> Result<T> {
		self.refresh().wait().await
	}

	/// Awaits the freshest value, falling back to the last known good one
	/// when the recomputation failed.
	pub async fn safe_get(&self) -> T {
		match self.refresh().wait().await {
			Ok(value) => value,
			Err(_) => self.inner.state.lock().value.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicU32, Ordering};

	use skua_rpc::TransportError;
	use tokio::sync::Semaphore;

	use super::*;
	use crate::Error;
	use crate::testing::{ScriptedReply, session_with};

	fn idle_session() -> crate::Session {
		let (session, _transport) = session_with(|_| ScriptedReply::Hang);
		session
	}

	// ── Cached ──

	#[test]
	fn cached_computes_lazily_and_once() {
		let session = idle_session();
		let runs = Arc::new(AtomicU32::new(0));
		let cached = session.cached(None, {
			let runs = Arc::clone(&runs);
			move || {
				runs.fetch_add(1, Ordering::SeqCst);
				Ok(21)
			}
		});
		assert_eq!(runs.load(Ordering::SeqCst), 0);
		assert_eq!(cached.get().unwrap(), 21);
		assert_eq!(cached.get().unwrap(), 21);
		assert_eq!(runs.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn cached_is_single_flight_under_concurrent_first_access() {
		let session = idle_session();
		let runs = Arc::new(AtomicU32::new(0));
		let cached = Arc::new(session.cached(None, {
			let runs = Arc::clone(&runs);
			move || {
				runs.fetch_add(1, Ordering::SeqCst);
				// Widen the race window.
				std::thread::sleep(std::time::Duration::from_millis(20));
				Ok("computed".to_owned())
			}
		}));

		std::thread::scope(|scope| {
			for _ in 0..4 {
				let cached = Arc::clone(&cached);
				scope.spawn(move || assert_eq!(cached.get().unwrap(), "computed"));
			}
		});
		assert_eq!(runs.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn cached_recomputes_after_invalidation() {
		let session = idle_session();
		let runs = Arc::new(AtomicU32::new(0));
		let cached = session.cached(None, {
			let runs = Arc::clone(&runs);
			move || Ok(runs.fetch_add(1, Ordering::SeqCst))
		});
		assert_eq!(cached.get().unwrap(), 0);
		assert_eq!(cached.get().unwrap(), 0);
		session.invalidate_caches();
		assert_eq!(cached.get().unwrap(), 1);
	}

	#[test]
	fn cached_serves_previous_value_after_termination() {
		let session = idle_session();
		let runs = Arc::new(AtomicU32::new(0));
		let cached = session.cached(None, {
			let runs = Arc::clone(&runs);
			move || {
				runs.fetch_add(1, Ordering::SeqCst);
				Ok("live".to_owned())
			}
		});
		assert_eq!(cached.get().unwrap(), "live");

		session.mark_terminated();
		session.invalidate_caches();
		assert_eq!(cached.get().unwrap(), "live");
		// The compute closure was not consulted again.
		assert_eq!(runs.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn cached_on_dead_session_without_history_uses_default() {
		let session = idle_session();
		session.mark_terminated();

		let with_default = session.cached(Some(7), || Ok(0));
		assert_eq!(with_default.get().unwrap(), 7);

		let without_default = session.cached(None, || Ok(0));
		assert!(matches!(without_default.get(), Err(Error::Terminated)));
	}

	#[test]
	fn cached_failure_propagates_and_retries() {
		let session = idle_session();
		let runs = Arc::new(AtomicU32::new(0));
		let cached = session.cached(None, {
			let runs = Arc::clone(&runs);
			move || {
				if runs.fetch_add(1, Ordering::SeqCst) == 0 {
					Err(Error::Transport(TransportError::Protocol("garbled".into())))
				} else {
					Ok(5)
				}
			}
		});
		assert!(matches!(cached.get(), Err(Error::Transport(_))));
		assert_eq!(cached.get().unwrap(), 5);
	}

	// ── AsyncCached ──

	#[tokio::test]
	async fn async_cached_serves_default_until_computed() {
		let session = idle_session();
		let gate = Arc::new(Semaphore::new(0));
		let cached = session.async_cached(0u32, {
			let gate = Arc::clone(&gate);
			move || {
				let gate = Arc::clone(&gate);
				async move {
					gate.acquire().await.unwrap().forget();
					Ok(42)
				}
			}
		});

		// In flight: only the default is visible.
		assert_eq!(cached.latest(), 0);
		assert_eq!(cached.latest(), 0);

		gate.add_permits(1);
		assert_eq!(cached.get().await.unwrap(), 42);
		assert_eq!(cached.latest(), 42);
	}

	#[tokio::test]
	async fn async_cached_runs_once_per_epoch() {
		let session = idle_session();
		let runs = Arc::new(AtomicU32::new(0));
		let cached = session.async_cached(0u32, {
			let runs = Arc::clone(&runs);
			move || {
				let runs = Arc::clone(&runs);
				async move { Ok(runs.fetch_add(1, Ordering::SeqCst) + 1) }
			}
		});

		let (a, b, c) = tokio::join!(cached.get(), cached.get(), cached.safe_get());
		assert_eq!(a.unwrap(), 1);
		assert_eq!(b.unwrap(), 1);
		assert_eq!(c, 1);
		assert_eq!(runs.load(Ordering::SeqCst), 1);

		session.invalidate_caches();
		assert_eq!(cached.get().await.unwrap(), 2);
		assert_eq!(runs.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn async_cached_keeps_previous_value_on_failure() {
		let session = idle_session();
		let runs = Arc::new(AtomicU32::new(0));
		let cached = session.async_cached(String::new(), {
			let runs = Arc::clone(&runs);
			move || {
				let attempt = runs.fetch_add(1, Ordering::SeqCst);
				async move {
					if attempt == 0 {
						Ok("good".to_owned())
					} else {
						Err(Error::Transport(TransportError::Protocol("garbled".into())))
					}
				}
			}
		});
		assert_eq!(cached.get().await.unwrap(), "good");

		session.invalidate_caches();
		assert!(matches!(cached.get().await, Err(Error::Transport(_))));
		assert_eq!(cached.safe_get().await, "good");
		assert_eq!(cached.latest(), "good");
	}

	#[tokio::test]
	async fn async_cached_resolves_with_previous_value_on_termination() {
		let session = idle_session();
		let runs = Arc::new(AtomicU32::new(0));
		let cached = session.async_cached(0u32, {
			let runs = Arc::clone(&runs);
			move || {
				let attempt = runs.fetch_add(1, Ordering::SeqCst);
				async move {
					if attempt == 0 { Ok(10) } else { Err(Error::Terminated) }
				}
			}
		});
		assert_eq!(cached.get().await.unwrap(), 10);

		session.invalidate_caches();
		assert_eq!(cached.get().await.unwrap(), 10);
		assert_eq!(cached.latest(), 10);
	}

	#[tokio::test]
	async fn async_cached_stale_success_does_not_clobber_newer_epoch() {
		let session = idle_session();
		let gate = Arc::new(Semaphore::new(0));
		let runs = Arc::new(AtomicU32::new(0));
		let cached = session.async_cached(0u32, {
			let gate = Arc::clone(&gate);
			let runs = Arc::clone(&runs);
			move || {
				let gate = Arc::clone(&gate);
				let attempt = runs.fetch_add(1, Ordering::SeqCst);
				async move {
					gate.acquire().await.unwrap().forget();
					Ok(attempt + 1)
				}
			}
		});

		// Epoch 0 starts computing (result 1), then is invalidated.
		assert_eq!(cached.latest(), 0);
		session.invalidate_caches();
		// Epoch 1 starts computing (result 2).
		let fresh = tokio::spawn({
			let cached = cached.clone();
			async move { cached.get().await }
		});

		// Release both runs; the semaphore is FIFO, so the superseded
		// epoch-0 run completes first. Its success must not be stored.
		gate.add_permits(2);
		assert_eq!(fresh.await.unwrap().unwrap(), 2);
		assert_eq!(cached.latest(), 2);
	}
}
