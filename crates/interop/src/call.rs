//! Cancellable call futures and the synchronous wait bridge.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// How often the blocking bridge wakes up to check the interrupt token.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One in-flight terminal operation.
///
/// Awaiting yields the operation's result. [`cancel`](Self::cancel)
/// abandons the call: the call task drops the underlying transport future,
/// so the remote side is not left computing a discarded result. The session
/// issues exactly one attempt per `PendingCall` — waiting, including the
/// blocking bridge, never re-sends the request.
pub struct PendingCall<T> {
	cancel: CancellationToken,
	rx: oneshot::Receiver<Result<T>>,
}

impl<T> PendingCall<T> {
	pub(crate) fn new(cancel: CancellationToken, rx: oneshot::Receiver<Result<T>>) -> Self {
		Self { cancel, rx }
	}

	/// Requests cancellation; the call resolves to [`Error::Cancelled`].
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// True once cancellation was requested.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Token cancelling this call. Register it with an owner's teardown to
	/// abandon work that would outlive its requester.
	pub fn cancellation_token(&self) -> &CancellationToken {
		&self.cancel
	}

	/// Blocking bridge for synchronous call sites.
	///
	/// Polls the call with a short timeout in a loop, checking `interrupt`
	/// on every lap; an interrupt cancels the call itself and propagates as
	/// [`Error::Cancelled`]. A terminated session surfaces as
	/// [`Error::Terminated`], distinguishable so callers can degrade
	/// instead of reporting an error. Timeouts beyond the interrupt check
	/// are the caller's business — none are imposed here.
	///
	/// `runtime` must belong to a multi-threaded runtime and this must not
	/// be called from one of its worker threads.
	pub fn wait_interruptible(mut self, runtime: &Handle, interrupt: &CancellationToken) -> Result<T> {
		loop {
			if interrupt.is_cancelled() {
				self.cancel();
				return Err(Error::Cancelled);
			}
			match runtime.block_on(async { tokio::time::timeout(WAIT_POLL_INTERVAL, &mut self.rx).await }) {
				Ok(Ok(outcome)) => return outcome,
				Ok(Err(_)) => return Err(Error::Cancelled),
				Err(_) => {}
			}
		}
	}
}

impl<T> Future for PendingCall<T> {
	type Output = Result<T>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
			// The call task vanished without answering; treat as abandoned.
			Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Cancelled)),
			Poll::Pending => Poll::Pending,
		}
	}
}
