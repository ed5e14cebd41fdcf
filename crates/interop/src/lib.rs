//! Asynchronous client runtime for a remote statistical-interpreter process.
//!
//! This crate is the IDE-side half of the interop protocol defined in
//! [`skua_rpc`]. One [`Session`] exists per interpreter process; on top of
//! the abstract transport it layers
//! * cancellable calls ([`PendingCall`]) with a blocking-wait bridge for
//!   synchronous call sites,
//! * composable value addresses ([`ObjectRef`]) that never contact the
//!   remote side until a terminal operation,
//! * explicit lifetimes for values that must stay reachable across calls
//!   ([`PersistentRef`], [`Disposer`]),
//! * session-scoped memoization ([`Cached`], [`AsyncCached`]) invalidated
//!   in one sweep when the interpreter restarts,
//! * chunked enumeration of large collections ([`VariableLoader`]).

#![warn(missing_docs)]

mod cache;
mod call;
mod handle;
mod loader;
mod persistent;
mod session;
#[cfg(test)]
mod testing;

pub use cache::{AsyncCached, Cached};
pub use call::PendingCall;
pub use handle::ObjectRef;
pub use loader::{Binding, LoadedChunk, ParentEnvironment, VariableLoader};
pub use persistent::{Disposer, PersistentRef};
pub use session::Session;

pub use skua_rpc::{Place, RemoteValue};

use skua_rpc::TransportError;

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of a terminal operation.
///
/// Handle composition never fails; every terminal operation resolves to its
/// result or to exactly one of these.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The interpreter process is gone. Best-effort callers degrade to an
	/// empty result instead of surfacing this to the user.
	#[error("interpreter session terminated")]
	Terminated,
	/// The protocol exchange succeeded but the expression raised inside the
	/// interpreter. The message originates from the interpreter and is
	/// shown to the user verbatim.
	#[error("{0}")]
	Evaluation(String),
	/// The call mechanism itself failed.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The caller abandoned the call. Not an error condition for logging.
	#[error("call cancelled")]
	Cancelled,
}
