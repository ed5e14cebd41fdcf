//! Protocol data model and transport seam for the interpreter interop runtime.
//!
//! This crate defines the client-visible shapes of the interop protocol:
//! * [`Place`]: composable address of a value inside the interpreter process
//! * [`InteropRequest`] / [`InteropResponse`]: one request shape per terminal operation
//! * [`RemoteValue`]: immutable snapshot describing a remote value
//! * [`Transport`]: the abstract asynchronous call primitive
//!
//! Wire format, serialization and the subprocess lifecycle live behind a
//! [`Transport`] implementation; nothing in this crate touches I/O.

#![warn(missing_docs)]

pub mod place;
pub mod protocol;
pub mod transport;
pub mod value;

pub use place::Place;
pub use protocol::{BindingSlot, ContainerKind, InteropRequest, InteropResponse, ParentSlot};
pub use transport::{Transport, TransportError};
pub use value::RemoteValue;
