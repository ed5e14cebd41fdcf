//! Chunked enumeration of collection-like remote objects.

use skua_rpc::{ContainerKind, InteropRequest, InteropResponse, RemoteValue};

use crate::cache::AsyncCached;
use crate::call::PendingCall;
use crate::handle::{ObjectRef, protocol_mismatch};
use crate::{Error, Result};

/// One enumerated binding of a remote collection.
#[derive(Clone)]
pub struct Binding {
	/// Binding name; empty for unnamed list elements.
	pub name: String,
	/// Handle addressing the bound value: `member(name)` for environments,
	/// `list_element(index)` for lists.
	pub handle: ObjectRef,
	/// Snapshot resolved at load time.
	pub value: RemoteValue,
}

/// One page of bindings plus the authoritative container size.
#[derive(Clone)]
pub struct LoadedChunk {
	/// Bindings of the requested range, in container order.
	pub bindings: Vec<Binding>,
	/// Total number of bindings in the container; may exceed the range.
	pub total: u64,
}

/// One enclosing environment of a loader's subject.
#[derive(Clone)]
pub struct ParentEnvironment {
	/// Display name of the environment.
	pub name: String,
	/// Handle addressing it.
	pub handle: ObjectRef,
}

/// Chunked enumerator over one collection-like remote object.
///
/// [`bindings`](Self::bindings) fetches pages of [`CHUNK_SIZE`] strictly in
/// offset order: a page is requested only after the previous one merged, so
/// remote load and memory stay bounded and the merged order is
/// deterministic. Both the merged list and the parent-environment chain are
/// cached against the owning session's epoch; an interpreter restart
/// invalidates them in one sweep with everything else.
///
/// [`CHUNK_SIZE`]: Self::CHUNK_SIZE
pub struct VariableLoader {
	subject: ObjectRef,
	bindings: AsyncCached<Vec<Binding>>,
	parents: AsyncCached<Vec<ParentEnvironment>>,
}

impl VariableLoader {
	/// Bindings requested per `LoadBindings` call.
	pub const CHUNK_SIZE: u64 = 500;

	pub(crate) fn new(subject: ObjectRef) -> Self {
		let session = subject.session().clone();
		let bindings = session.async_cached(Vec::new(), {
			let subject = subject.clone();
			move || load_all(subject.clone())
		});
		let parents = session.async_cached(Vec::new(), {
			let subject = subject.clone();
			move || load_parents(subject.clone())
		});
		Self {
			subject,
			bindings,
			parents,
		}
	}

	/// The collection this loader enumerates.
	pub fn subject(&self) -> &ObjectRef {
		&self.subject
	}

	/// All bindings, merged from sequential chunk loads.
	pub fn bindings(&self) -> &AsyncCached<Vec<Binding>> {
		&self.bindings
	}

	/// The enclosing-environment chain, innermost first. One call, cached
	/// separately from the bindings.
	pub fn parent_environments(&self) -> &AsyncCached<Vec<ParentEnvironment>> {
		&self.parents
	}

	/// Loads bindings `[start, end)` in one call.
	pub fn load_chunk(&self, start: u64, end: u64) -> PendingCall<LoadedChunk> {
		load_chunk(self.subject.clone(), start, end)
	}
}

fn load_chunk(subject: ObjectRef, start: u64, end: u64) -> PendingCall<LoadedChunk> {
	let request = InteropRequest::LoadBindings {
		place: subject.place().clone(),
		start,
		end,
	};
	let session = subject.session().clone();
	session.call_map(request, move |response| match response {
		InteropResponse::Bindings { kind, entries, total } => {
			let bindings = entries
				.into_iter()
				.enumerate()
				.map(|(offset, entry)| {
					// Environments bind by name; list positions are the
					// stable address, names there are decoration.
					let handle = match kind {
						ContainerKind::Environment => subject.member(entry.name.clone()),
						ContainerKind::List => subject.list_element((start + offset as u64) as i64),
					};
					Binding {
						name: entry.name,
						handle,
						value: entry.value,
					}
				})
				.collect();
			Ok(LoadedChunk { bindings, total })
		}
		InteropResponse::EvalError { message } => Err(Error::Evaluation(message)),
		other => Err(protocol_mismatch("LoadBindings", &other)),
	})
}

async fn load_all(subject: ObjectRef) -> Result<Vec<Binding>> {
	let first = load_chunk(subject.clone(), 0, VariableLoader::CHUNK_SIZE).await?;
	let total = first.total;
	let mut merged = first.bindings;
	let mut offset = VariableLoader::CHUNK_SIZE;
	// Strictly sequential: the next page goes out only after the previous
	// one merged.
	while offset < total {
		let chunk = load_chunk(subject.clone(), offset, offset + VariableLoader::CHUNK_SIZE).await?;
		merged.extend(chunk.bindings);
		offset += VariableLoader::CHUNK_SIZE;
	}
	Ok(merged)
}

async fn load_parents(subject: ObjectRef) -> Result<Vec<ParentEnvironment>> {
	let request = InteropRequest::ParentEnvironments {
		place: subject.place().clone(),
	};
	let session = subject.session().clone();
	let for_handles = session.clone();
	session
		.call_map(request, move |response| match response {
			InteropResponse::Parents(parents) => Ok(parents
				.into_iter()
				.map(|parent| ParentEnvironment {
					name: parent.name,
					handle: ObjectRef::from_place(parent.place, for_handles.clone()),
				})
				.collect()),
			InteropResponse::EvalError { message } => Err(Error::Evaluation(message)),
			other => Err(protocol_mismatch("ParentEnvironments", &other)),
		})
		.await
}
