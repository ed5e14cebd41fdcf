//! Composable addresses over one session.

use skua_rpc::{InteropRequest, InteropResponse, Place, RemoteValue, TransportError};

use crate::call::PendingCall;
use crate::loader::VariableLoader;
use crate::persistent::{Disposer, PersistentRef};
use crate::session::Session;
use crate::{Error, Result};

/// Address of a value inside the remote interpreter, bound to its session.
///
/// Building a handle, and deriving one from another, is pure and local —
/// the remote process is contacted only by the terminal operations, each of
/// which issues exactly one call. Handles are cheap, immutable and freely
/// cloneable; nothing remote is held alive by one (see [`PersistentRef`]
/// for that).
#[derive(Clone)]
pub struct ObjectRef {
	place: Place,
	session: Session,
}

impl ObjectRef {
	pub(crate) fn from_place(place: Place, session: Session) -> Self {
		Self { place, session }
	}

	/// The address recipe this handle denotes.
	pub fn place(&self) -> &Place {
		&self.place
	}

	/// The owning session.
	pub fn session(&self) -> &Session {
		&self.session
	}

	// ── Composition: pure, no call issued ──

	/// Handle on binding `name` of this environment.
	pub fn member(&self, name: impl Into<String>) -> Self {
		self.derive(Place::Member {
			env: Box::new(self.place.clone()),
			name: name.into(),
		})
	}

	/// Handle on element `index` (zero-based) of this list.
	pub fn list_element(&self, index: i64) -> Self {
		self.derive(Place::ListElement {
			list: Box::new(self.place.clone()),
			index,
		})
	}

	/// Handle on this value's attribute set.
	pub fn attributes(&self) -> Self {
		self.derive(Place::Attributes(Box::new(self.place.clone())))
	}

	/// Handle on `code` evaluated in the environment `env` addresses.
	pub fn expression(code: impl Into<String>, env: &Self) -> Self {
		env.derive(Place::Expression {
			env: Box::new(env.place.clone()),
			code: code.into(),
		})
	}

	/// Handle on the environment of the execution-stack frame at `depth`.
	pub fn sys_frame(session: &Session, depth: u32) -> Self {
		Self::from_place(Place::SysFrame(depth), session.clone())
	}

	/// Handle on the environment of the error-stack frame at `depth`.
	pub fn error_frame(session: &Session, depth: u32) -> Self {
		Self::from_place(Place::ErrorFrame(depth), session.clone())
	}

	fn derive(&self, place: Place) -> Self {
		Self::from_place(place, self.session.clone())
	}

	/// Chunked enumerator over this collection's bindings.
	pub fn loader(&self) -> VariableLoader {
		VariableLoader::new(self.clone())
	}

	// ── Terminal operations: one call each ──

	/// Resolves what this handle denotes into a value snapshot.
	pub fn resolve_value(&self) -> PendingCall<RemoteValue> {
		self.session.call_map(
			InteropRequest::ResolveValue { place: self.place.clone() },
			|response| match response {
				InteropResponse::Value(value) => Ok(value),
				InteropResponse::EvalError { message } => Err(Error::Evaluation(message)),
				other => Err(protocol_mismatch("ResolveValue", &other)),
			},
		)
	}

	/// Prints the addressed value the way the interpreter would.
	///
	/// Fails with [`Error::Evaluation`] when the expression itself raised,
	/// carrying the interpreter's message verbatim.
	pub fn evaluate_as_text(&self) -> PendingCall<String> {
		self.session.call_map(
			InteropRequest::EvaluateAsText { place: self.place.clone() },
			|response| match response {
				InteropResponse::Text(text) => Ok(text),
				InteropResponse::EvalError { message } => Err(Error::Evaluation(message)),
				other => Err(protocol_mismatch("EvaluateAsText", &other)),
			},
		)
	}

	/// Distinct strings of a vector-like value.
	///
	/// Best-effort: a terminated session yields an empty list, because
	/// callers populate non-critical UI from this.
	pub async fn distinct_strings(&self) -> Result<Vec<String>> {
		let call = self.session.call_map(
			InteropRequest::DistinctStrings { place: self.place.clone() },
			|response| match response {
				InteropResponse::Strings(strings) => Ok(strings),
				InteropResponse::EvalError { message } => Err(Error::Evaluation(message)),
				other => Err(protocol_mismatch("DistinctStrings", &other)),
			},
		);
		absorb_terminated(call.await)
	}

	/// Names bound in this collection. Best-effort like
	/// [`distinct_strings`](Self::distinct_strings).
	pub async fn list_names(&self) -> Result<Vec<String>> {
		let call = self.session.call_map(
			InteropRequest::ListNames { place: self.place.clone() },
			|response| match response {
				InteropResponse::Strings(names) => Ok(names),
				InteropResponse::EvalError { message } => Err(Error::Evaluation(message)),
				other => Err(protocol_mismatch("ListNames", &other)),
			},
		);
		absorb_terminated(call.await)
	}

	/// Stable token for testing whether two handles denote the same remote
	/// object.
	pub fn identity_token(&self) -> PendingCall<i64> {
		self.session.call_map(
			InteropRequest::IdentityToken { place: self.place.clone() },
			|response| match response {
				InteropResponse::Identity(token) => Ok(token),
				other => Err(protocol_mismatch("IdentityToken", &other)),
			},
		)
	}

	/// Whether [`assign`](Self::assign) can target this handle. Pure;
	/// check before offering assignment as a user action.
	pub fn can_assign(&self) -> bool {
		self.place.is_assignable()
	}

	/// Stores the value `value` addresses into this location, returning the
	/// freshly resolved snapshot of the target.
	///
	/// Fails with [`Error::Evaluation`] when the remote side rejects the
	/// assignment.
	pub fn assign(&self, value: &Self) -> PendingCall<RemoteValue> {
		self.session.call_map(
			InteropRequest::Assign {
				target: self.place.clone(),
				value: value.place.clone(),
			},
			|response| match response {
				InteropResponse::Value(value) => Ok(value),
				InteropResponse::EvalError { message } => Err(Error::Evaluation(message)),
				other => Err(protocol_mismatch("Assign", &other)),
			},
		)
	}

	/// Copies the addressed value into a slot that survives across calls.
	///
	/// With an `owner`, the resulting slot's release is registered against
	/// the owner's teardown, and so is cancellation of this call should the
	/// owner go away while it is still pending.
	pub fn copy_to_persistent(&self, owner: Option<&Disposer>) -> PendingCall<PersistentRef> {
		let session = self.session.clone();
		let slot_owner = owner.cloned();
		let call = self.session.call_map(
			InteropRequest::CopyToPersistent { place: self.place.clone() },
			move |response| match response {
				InteropResponse::Persistent { slot } => {
					Ok(PersistentRef::new(slot, session, slot_owner.as_ref()))
				}
				InteropResponse::EvalError { message } => Err(Error::Evaluation(message)),
				other => Err(protocol_mismatch("CopyToPersistent", &other)),
			},
		);
		// A late copy against an already torn-down owner still completes;
		// its slot is then released immediately by `register_persistent`.
		if let Some(owner) = owner {
			if !owner.is_disposed() {
				let token = call.cancellation_token().clone();
				owner.register(move || token.cancel());
			}
		}
		call
	}
}

pub(crate) fn protocol_mismatch(operation: &str, response: &InteropResponse) -> Error {
	Error::Transport(TransportError::Protocol(format!(
		"{operation}: unexpected {} reply",
		response.kind()
	)))
}

fn absorb_terminated(outcome: Result<Vec<String>>) -> Result<Vec<String>> {
	match outcome {
		Err(Error::Terminated) => Ok(Vec::new()),
		other => other,
	}
}
