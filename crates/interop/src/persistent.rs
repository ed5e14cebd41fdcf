//! Scoped lifetime management for values that must outlive a single call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use skua_rpc::Place;

use crate::handle::ObjectRef;
use crate::session::Session;

/// A remote value pinned into a slot that survives across calls.
///
/// Every slot obtained must be released exactly once: [`dispose`]
/// short-circuits after the first call and is a no-op once the owning
/// session is dead. Dropping a `PersistentRef` does *not* release the slot
/// — tie it to a [`Disposer`] or call [`dispose`] explicitly.
///
/// [`dispose`]: Self::dispose
#[derive(Clone)]
pub struct PersistentRef {
	inner: Arc<PersistentInner>,
}

struct PersistentInner {
	slot: u32,
	handle: ObjectRef,
	disposed: AtomicBool,
}

impl PersistentRef {
	pub(crate) fn new(slot: u32, session: Session, owner: Option<&Disposer>) -> Self {
		let persistent = Self {
			inner: Arc::new(PersistentInner {
				slot,
				handle: ObjectRef::from_place(Place::Persistent(slot), session),
				disposed: AtomicBool::new(false),
			}),
		};
		if let Some(owner) = owner {
			owner.register_persistent(persistent.clone());
		}
		persistent
	}

	/// The persistent slot index.
	pub fn slot(&self) -> u32 {
		self.inner.slot
	}

	/// Handle addressing the pinned value; composes like any other handle.
	pub fn handle(&self) -> &ObjectRef {
		&self.inner.handle
	}

	/// Releases the slot, best-effort.
	///
	/// Safe to call concurrently with resolution on other handles of the
	/// same session; never blocks them.
	pub fn dispose(&self) {
		if let Some(slot) = self.take_slot() {
			self.inner.handle.session().dispose_persistent(vec![slot]);
		}
	}

	/// Claims the slot for release. `None` when it was already claimed or
	/// the session is dead (the remote side reclaims slots itself then).
	fn take_slot(&self) -> Option<u32> {
		if self.inner.disposed.swap(true, Ordering::AcqRel) {
			return None;
		}
		if !self.inner.handle.session().is_alive() {
			return None;
		}
		Some(self.inner.slot)
	}
}

type Teardown = Box<dyn FnOnce() + Send>;

/// Teardown list standing in for an owning UI or debugger component.
///
/// Callbacks registered here run at most once, in reverse registration
/// order, when [`dispose`](Self::dispose) is called. Persistent refs
/// registered against an owner are released together afterwards — one
/// batched call per session — instead of one release call per handle.
#[derive(Clone, Default)]
pub struct Disposer {
	inner: Arc<Mutex<DisposerState>>,
}

#[derive(Default)]
struct DisposerState {
	disposed: bool,
	callbacks: Vec<Teardown>,
	persistent: Vec<PersistentRef>,
}

impl Disposer {
	/// Creates an undisposed owner.
	pub fn new() -> Self {
		Self::default()
	}

	/// True once [`dispose`](Self::dispose) ran.
	pub fn is_disposed(&self) -> bool {
		self.inner.lock().disposed
	}

	/// Registers a teardown callback.
	///
	/// On an already disposed owner the callback runs immediately, so a
	/// resource arriving late is still torn down.
	pub fn register(&self, callback: impl FnOnce() + Send + 'static) {
		let mut state = self.inner.lock();
		if state.disposed {
			drop(state);
			callback();
		} else {
			state.callbacks.push(Box::new(callback));
		}
	}

	/// Registers a persistent ref for batched release at teardown.
	pub fn register_persistent(&self, persistent: PersistentRef) {
		let mut state = self.inner.lock();
		if state.disposed {
			drop(state);
			persistent.dispose();
		} else {
			state.persistent.push(persistent);
		}
	}

	/// Runs teardown: callbacks in reverse registration order, then one
	/// batched slot release per session. Subsequent calls are no-ops.
	pub fn dispose(&self) {
		let (callbacks, persistent) = {
			let mut state = self.inner.lock();
			if state.disposed {
				return;
			}
			state.disposed = true;
			(
				std::mem::take(&mut state.callbacks),
				std::mem::take(&mut state.persistent),
			)
		};
		for callback in callbacks.into_iter().rev() {
			callback();
		}
		release_batched(persistent);
	}
}

/// Groups still-unclaimed slots by session and issues one release call per
/// group.
fn release_batched(refs: Vec<PersistentRef>) {
	let mut groups: Vec<(Session, Vec<u32>)> = Vec::new();
	for persistent in refs {
		let Some(slot) = persistent.take_slot() else {
			continue;
		};
		let session = persistent.handle().session();
		match groups.iter_mut().find(|(s, _)| s.same_session(session)) {
			Some((_, slots)) => slots.push(slot),
			None => groups.push((session.clone(), vec![slot])),
		}
	}
	for (session, slots) in groups {
		session.dispose_persistent(slots);
	}
}
