mod core;
mod reference;

pub use self::core::{Basis, PyObject, PyObjectPayload, PyObjectRef, PyObjectWeak, PyPayload};
pub use reference::PyRef;
