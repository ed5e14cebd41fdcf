//! Session ownership: liveness, cache epoch, and the cancellable call path.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use skua_rpc::{InteropRequest, InteropResponse, Place, Transport, TransportError};

use crate::cache::{AsyncCached, Cached, ComputeFuture};
use crate::call::PendingCall;
use crate::handle::ObjectRef;
use crate::{Error, Result};

/// Shared per-session state. Read by many concurrent callers; mutated only
/// through [`Session`] itself (liveness transition, epoch bump).
pub(crate) struct SessionCore {
	transport: Arc<dyn Transport>,
	alive: AtomicBool,
	epoch: AtomicU64,
	termination: CancellationToken,
}

impl SessionCore {
	pub(crate) fn is_alive(&self) -> bool {
		self.alive.load(Ordering::Acquire)
	}

	pub(crate) fn epoch(&self) -> u64 {
		self.epoch.load(Ordering::Acquire)
	}

	pub(crate) fn mark_terminated(&self) {
		if self.alive.swap(false, Ordering::AcqRel) {
			debug!("interop session terminated");
			self.termination.cancel();
		}
	}

	/// One protocol exchange. A disconnect report from the transport is the
	/// liveness transition: the session is marked dead and the caller sees
	/// [`Error::Terminated`], as do all calls issued afterwards.
	async fn dispatch(&self, request: InteropRequest) -> Result<InteropResponse> {
		if !self.is_alive() {
			return Err(Error::Terminated);
		}
		match self.transport.call(request).await {
			Ok(response) => Ok(response),
			Err(TransportError::Disconnected) => {
				self.mark_terminated();
				Err(Error::Terminated)
			}
			Err(err) => Err(Error::Transport(err)),
		}
	}
}

/// Gateway to one interpreter process.
///
/// Cheap to clone; clones share the transport, the liveness flag and the
/// cache epoch. The session serializes nothing: independent calls run
/// concurrently, and cache invalidation never cancels work in flight.
#[derive(Clone)]
pub struct Session {
	core: Arc<SessionCore>,
}

impl Session {
	/// Creates a session over `transport`, initially alive.
	pub fn new(transport: Arc<dyn Transport>) -> Self {
		Self {
			core: Arc::new(SessionCore {
				transport,
				alive: AtomicBool::new(true),
				epoch: AtomicU64::new(0),
				termination: CancellationToken::new(),
			}),
		}
	}

	/// True until the remote process or its channel terminates.
	pub fn is_alive(&self) -> bool {
		self.core.is_alive()
	}

	/// Marks the session dead.
	///
	/// Entered by the lifecycle collaborator on process exit; also entered
	/// internally when the transport reports a disconnect.
	pub fn mark_terminated(&self) {
		self.core.mark_terminated();
	}

	/// Resolves once the session is dead.
	pub async fn terminated(&self) {
		self.core.termination.cancelled().await;
	}

	/// Drops every [`Cached`]/[`AsyncCached`] value created through this
	/// session; the next access recomputes. In-flight calls keep running.
	pub fn invalidate_caches(&self) {
		self.core.epoch.fetch_add(1, Ordering::AcqRel);
	}

	/// Handle on the interpreter's global environment.
	pub fn global_env(&self) -> ObjectRef {
		ObjectRef::from_place(Place::GlobalEnv, self.clone())
	}

	/// Issues one asynchronous unit of work.
	pub fn call(&self, request: InteropRequest) -> PendingCall<InteropResponse> {
		self.call_map(request, Ok)
	}

	/// Issues one call and applies `map` to the reply inside the call task,
	/// so every logical operation is exactly one outstanding attempt.
	pub(crate) fn call_map<T, F>(&self, request: InteropRequest, map: F) -> PendingCall<T>
	where
		T: Send + 'static,
		F: FnOnce(InteropResponse) -> Result<T> + Send + 'static,
	{
		let (tx, rx) = oneshot::channel();
		let cancel = CancellationToken::new();
		let core = Arc::clone(&self.core);
		let task_cancel = cancel.clone();
		tokio::spawn(async move {
			let outcome = tokio::select! {
				() = task_cancel.cancelled() => Err(Error::Cancelled),
				result = core.dispatch(request) => result.and_then(map),
			};
			if let Err(Error::Transport(err)) = &outcome {
				warn!(error = %err, "interop call failed");
			}
			let _ = tx.send(outcome);
		});
		PendingCall::new(cancel, rx)
	}

	/// Releases persistent slots in one batched, best-effort call.
	///
	/// No-op when `slots` is empty or the session is already dead; failures
	/// are logged and swallowed. Never blocks unrelated operations.
	pub fn dispose_persistent(&self, slots: Vec<u32>) {
		if slots.is_empty() || !self.is_alive() {
			return;
		}
		let core = Arc::clone(&self.core);
		tokio::spawn(async move {
			debug!(count = slots.len(), "releasing persistent slots");
			match core.dispatch(InteropRequest::DisposePersistent { slots }).await {
				Ok(_) | Err(Error::Terminated) | Err(Error::Cancelled) => {}
				Err(err) => debug!(error = %err, "persistent slot release failed"),
			}
		});
	}

	/// Session-scoped synchronous memo; see [`Cached`].
	pub fn cached<T, F>(&self, default: Option<T>, compute: F) -> Cached<T>
	where
		T: Clone + Send + 'static,
		F: Fn() -> Result<T> + Send + Sync + 'static,
	{
		Cached::new(Arc::clone(&self.core), default, Box::new(compute))
	}

	/// Session-scoped asynchronous memo with a last-known-good default;
	/// see [`AsyncCached`].
	pub fn async_cached<T, F, Fut>(&self, default: T, compute: F) -> AsyncCached<T>
	where
		T: Clone + Send + Sync + 'static,
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<T>> + Send + 'static,
	{
		AsyncCached::new(
			Arc::clone(&self.core),
			default,
			Box::new(move || Box::pin(compute()) as ComputeFuture<T>),
		)
	}

	pub(crate) fn same_session(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.core, &other.core)
	}
}
