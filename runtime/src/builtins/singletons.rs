use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::object::{PyObjectRef, PyPayload};
use crate::PyResult;

#[derive(Debug)]
pub struct PyNone;

impl PyPayload for PyNone {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.none_type
    }
}

#[derive(Debug)]
pub struct PyNotImplemented;

impl PyPayload for PyNotImplemented {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.not_implemented_type
    }
}

fn none_repr(f: &Frame, _zelf: &PyObjectRef) -> PyResult {
    Ok(f.ctx().new_str("None").into_object())
}

fn none_nonzero(_f: &Frame, _zelf: &PyObjectRef) -> PyResult<bool> {
    Ok(false)
}

fn not_implemented_repr(f: &Frame, _zelf: &PyObjectRef) -> PyResult {
    Ok(f.ctx().new_str("NotImplemented").into_object())
}

pub(crate) fn init(ctx: &Context) {
    let none = &ctx.types.none_type;
    none.slots.repr.store(Some(none_repr));
    none.slots.nonzero.store(Some(none_nonzero));

    let ni = &ctx.types.not_implemented_type;
    ni.slots.repr.store(Some(not_implemented_repr));
}
