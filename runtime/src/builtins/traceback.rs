use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::{Frame, FrameRef};
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::PyResult;

/// One node of the traceback chain; `next` points at the more deeply nested
/// activation.
#[derive(Debug)]
pub struct PyTraceback {
    pub frame: FrameRef,
    pub lineno: u32,
    pub next: Option<PyTracebackRef>,
}

pub type PyTracebackRef = PyRef<PyTraceback>;

impl PyPayload for PyTraceback {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.traceback_type
    }
}

impl PyTraceback {
    pub fn new(frame: FrameRef, lineno: u32, next: Option<PyTracebackRef>) -> Self {
        PyTraceback {
            frame,
            lineno,
            next,
        }
    }
}

fn traceback_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    Ok(f
        .ctx()
        .new_str(format!("<traceback object at {:#x}>", zelf.get_id()))
        .into_object())
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.traceback_type;
    t.slots.repr.store(Some(traceback_repr));
}
