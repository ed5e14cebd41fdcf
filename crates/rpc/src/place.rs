//! Composable addresses into the remote object graph.

use serde::{Deserialize, Serialize};

/// Address recipe locating a value inside the interpreter process.
///
/// A `Place` is a pure local description: building one, or deriving one from
/// an existing place, never contacts the remote side. Only the terminal
/// operations of the client layer turn a place into an outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Place {
	/// The interpreter's global environment.
	GlobalEnv,
	/// A slot that keeps its value reachable across calls, allocated by
	/// [`CopyToPersistent`](crate::InteropRequest::CopyToPersistent).
	Persistent(u32),
	/// Binding `name` inside the environment addressed by `env`.
	Member {
		/// Environment containing the binding.
		env: Box<Place>,
		/// Binding name.
		name: String,
	},
	/// Element of the list addressed by `list`.
	ListElement {
		/// The containing list.
		list: Box<Place>,
		/// Zero-based element index.
		index: i64,
	},
	/// The attribute set of the addressed value.
	Attributes(Box<Place>),
	/// An arbitrary expression evaluated in the environment addressed by `env`.
	Expression {
		/// Evaluation environment.
		env: Box<Place>,
		/// Source text of the expression.
		code: String,
	},
	/// The environment of the execution-stack frame at the given depth.
	SysFrame(u32),
	/// The environment of the error-stack frame at the given depth.
	ErrorFrame(u32),
}

impl Place {
	/// Whether an `Assign` targeting this place can succeed.
	///
	/// Persistent slots, environment members and list elements are stable
	/// storage locations; everything else is a derived or read-only view.
	pub fn is_assignable(&self) -> bool {
		matches!(self, Self::Persistent(_) | Self::Member { .. } | Self::ListElement { .. })
	}
}
