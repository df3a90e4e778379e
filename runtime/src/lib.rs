//! The pyrite object runtime.
//!
//! Compiled Python 2.7 code links against this crate: it allocates objects
//! through the [`Context`], pushes [`Frame`]s, and funnels every Python
//! operation through the dispatch entry points in [`ops`]. Exceptions are
//! ordinary values; every fallible operation returns a [`PyResult`].

#[macro_use]
mod macros;

pub mod builtins;
pub mod class;
pub mod code;
pub mod context;
pub mod exceptions;
pub mod frame;
pub mod function;
pub mod generator;
pub mod object;
pub mod ops;
pub mod protocol;
pub mod stdio;
pub mod threading;
pub mod tie;
pub mod types;

pub use pyrite_common as common;

pub use class::{new_basis_type, new_class, prepare_type, PyType, PyTypeRef, TypeFlags};
pub use code::{CodeFlags, ExecutionResult, PyCode, PyCodeRef};
pub use context::Context;
pub use exceptions::{PyBaseException, PyBaseExceptionRef};
pub use frame::{Frame, FrameRef};
pub use function::{FuncArgs, Param, Signature};
pub use generator::PyGenerator;
pub use object::{Basis, PyObject, PyObjectRef, PyPayload, PyRef};
pub use tie::{tie, TieTree};

/// The uniform result pair of the runtime: exactly one of the value and the
/// exception is present.
pub type PyResult<T = PyObjectRef> = Result<T, PyBaseExceptionRef>;
