//! Request and response shapes, one per terminal operation.

use serde::{Deserialize, Serialize};

use crate::place::Place;
use crate::value::RemoteValue;

/// One unit of work sent to the interpreter process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InteropRequest {
	/// Resolve the value snapshot at `place`.
	ResolveValue {
		/// Address of the value.
		place: Place,
	},
	/// Print the value at `place` the way the interpreter would.
	EvaluateAsText {
		/// Address of the value.
		place: Place,
	},
	/// Distinct string contents of the vector-like value at `place`.
	DistinctStrings {
		/// Address of the value.
		place: Place,
	},
	/// Names bound inside the collection-like value at `place`.
	ListNames {
		/// Address of the collection.
		place: Place,
	},
	/// Stable token identifying the object at `place`.
	IdentityToken {
		/// Address of the value.
		place: Place,
	},
	/// Store the value at `value` into the location at `target`.
	Assign {
		/// Storage location to write.
		target: Place,
		/// Address of the value to store.
		value: Place,
	},
	/// Copy the value at `place` into a slot that survives across calls.
	CopyToPersistent {
		/// Address of the value to pin.
		place: Place,
	},
	/// Release persistent slots in one batch.
	DisposePersistent {
		/// Slots to release.
		slots: Vec<u32>,
	},
	/// Load bindings `[start, end)` of the collection at `place`.
	LoadBindings {
		/// Address of the collection.
		place: Place,
		/// First binding index to load.
		start: u64,
		/// One past the last binding index to load.
		end: u64,
	},
	/// Enumerate the enclosing-environment chain of `place`.
	ParentEnvironments {
		/// Address of the starting environment.
		place: Place,
	},
}

/// Container kind reported by a `LoadBindings` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
	/// Name-addressed container; bindings are environment members.
	Environment,
	/// Index-addressed container; positions are the stable address.
	List,
}

/// One loaded binding: its name and resolved snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingSlot {
	/// Binding name; empty for unnamed list elements.
	pub name: String,
	/// Snapshot of the bound value.
	pub value: RemoteValue,
}

/// One enclosing environment: display name plus the place addressing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentSlot {
	/// Display name of the environment.
	pub name: String,
	/// Address chosen by the remote side for this environment.
	pub place: Place,
}

/// Reply to an [`InteropRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InteropResponse {
	/// Resolved value snapshot.
	Value(RemoteValue),
	/// Printed form of a value.
	Text(String),
	/// Distinct strings or binding names.
	Strings(Vec<String>),
	/// Identity token for the addressed object.
	Identity(i64),
	/// Slot allocated by `CopyToPersistent`.
	Persistent {
		/// The allocated slot index.
		slot: u32,
	},
	/// Persistent slots were released.
	Disposed,
	/// One page of bindings. `total` is authoritative for the whole
	/// container and may exceed the requested range.
	Bindings {
		/// How the container addresses its bindings.
		kind: ContainerKind,
		/// Bindings of the requested range, in container order.
		entries: Vec<BindingSlot>,
		/// Total number of bindings in the container.
		total: u64,
	},
	/// Enclosing environments, innermost first.
	Parents(Vec<ParentSlot>),
	/// The exchange succeeded but the expression raised inside the
	/// interpreter. Never conflated with a transport failure.
	EvalError {
		/// Error text produced by the interpreter, meaningful to the user.
		message: String,
	},
}

impl InteropResponse {
	/// Short label used in protocol-mismatch diagnostics.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Value(_) => "value",
			Self::Text(_) => "text",
			Self::Strings(_) => "strings",
			Self::Identity(_) => "identity",
			Self::Persistent { .. } => "persistent",
			Self::Disposed => "disposed",
			Self::Bindings { .. } => "bindings",
			Self::Parents(_) => "parents",
			Self::EvalError { .. } => "eval-error",
		}
	}
}
