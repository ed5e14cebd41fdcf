//! The abstract asynchronous call primitive.

use async_trait::async_trait;

use crate::protocol::{InteropRequest, InteropResponse};

/// Failure of the call mechanism itself, never of the remote expression.
///
/// Remote evaluation failures travel as
/// [`InteropResponse::EvalError`](crate::InteropResponse::EvalError) —
/// a successful protocol exchange — and must not be folded into this type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
	/// The remote process or its channel is gone.
	#[error("interpreter connection lost")]
	Disconnected,
	/// The reply violates the interop protocol.
	#[error("protocol error: {0}")]
	Protocol(String),
}

/// Asynchronous call seam to the interpreter process.
///
/// Implementations own serialization and the subprocess lifecycle; the
/// client layer depends on nothing else. Dropping the returned future must
/// abandon the call, so a cancelled caller does not leave the remote side
/// computing a discarded result.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Issue one request and await its reply.
	async fn call(&self, request: InteropRequest) -> Result<InteropResponse, TransportError>;
}
