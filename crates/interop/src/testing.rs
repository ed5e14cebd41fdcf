//! Canned in-process transport for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use skua_rpc::{InteropRequest, InteropResponse, Transport, TransportError};

use crate::session::Session;

/// What the scripted transport does with one request.
pub(crate) enum ScriptedReply {
	/// Answer immediately.
	Reply(Result<InteropResponse, TransportError>),
	/// Never answer. The transport flags when the hung call future is
	/// dropped, which is how tests observe cancellation propagating.
	Hang,
}

type Responder = Box<dyn Fn(&InteropRequest) -> ScriptedReply + Send + Sync>;

/// Transport double driven by a responder closure, recording every request.
pub(crate) struct ScriptedTransport {
	responder: Responder,
	calls: Mutex<Vec<InteropRequest>>,
	hung_call_dropped: Arc<AtomicBool>,
}

impl ScriptedTransport {
	pub(crate) fn new(
		responder: impl Fn(&InteropRequest) -> ScriptedReply + Send + Sync + 'static,
	) -> Arc<Self> {
		Arc::new(Self {
			responder: Box::new(responder),
			calls: Mutex::new(Vec::new()),
			hung_call_dropped: Arc::new(AtomicBool::new(false)),
		})
	}

	/// Every request seen so far, in arrival order.
	pub(crate) fn calls(&self) -> Vec<InteropRequest> {
		self.calls.lock().clone()
	}

	pub(crate) fn call_count(&self) -> usize {
		self.calls.lock().len()
	}

	/// True once a hung call's future was dropped (i.e. cancelled).
	pub(crate) fn hung_call_dropped(&self) -> bool {
		self.hung_call_dropped.load(Ordering::Acquire)
	}
}

/// Flags on drop; armed only while a hung call is pending.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
	fn drop(&mut self) {
		self.0.store(true, Ordering::Release);
	}
}

#[async_trait]
impl Transport for ScriptedTransport {
	async fn call(&self, request: InteropRequest) -> Result<InteropResponse, TransportError> {
		let reply = (self.responder)(&request);
		self.calls.lock().push(request);
		match reply {
			ScriptedReply::Reply(outcome) => outcome,
			ScriptedReply::Hang => {
				let _dropped = DropFlag(Arc::clone(&self.hung_call_dropped));
				std::future::pending().await
			}
		}
	}
}

/// Session over a fresh scripted transport.
pub(crate) fn session_with(
	responder: impl Fn(&InteropRequest) -> ScriptedReply + Send + Sync + 'static,
) -> (Session, Arc<ScriptedTransport>) {
	let transport = ScriptedTransport::new(responder);
	(Session::new(Arc::clone(&transport) as Arc<dyn Transport>), transport)
}
