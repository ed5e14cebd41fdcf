//! Immutable snapshots of remote values.

use serde::{Deserialize, Serialize};

/// What a remote value is, without transferring its full contents.
///
/// Snapshots are taken at resolution time and never hold a live connection
/// back to the remote object; re-resolving the same place after the
/// interpreter state changed yields a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RemoteValue {
	/// A promise that has not been forced yet; resolving it would run `code`.
	Unevaluated {
		/// Expression the promise would evaluate.
		code: String,
		/// Class list of the promise.
		classes: Vec<String>,
	},
	/// A printed scalar or vector.
	Simple {
		/// The interpreter's printed form.
		text: String,
		/// True when the underlying object is a vector.
		is_vector: bool,
		/// False when `text` was truncated by the interpreter.
		is_complete: bool,
		/// True when the object comes from an S4-style class.
		is_s4: bool,
	},
	/// A tabular data frame.
	DataFrame {
		/// Row count.
		rows: u64,
		/// Column count.
		cols: u64,
	},
	/// A list-like container.
	List {
		/// Element count.
		length: u64,
	},
	/// A function.
	Function {
		/// Header text (formals without the body).
		header: String,
	},
	/// An environment.
	Environment {
		/// Display name of the environment.
		name: String,
	},
	/// A multi-dimensional array.
	Matrix {
		/// Dimension vector.
		dim: Vec<i64>,
	},
	/// A plot handle; contents are fetched through the graphics layer.
	Graph,
	/// Resolution ran but the value itself is an error condition.
	Error {
		/// Error text produced by the interpreter.
		message: String,
	},
}
