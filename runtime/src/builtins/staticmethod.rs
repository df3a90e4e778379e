use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::PyResult;

#[derive(Debug)]
pub struct PyStaticMethod {
    pub callable: PyObjectRef,
}

impl From<PyObjectRef> for PyStaticMethod {
    fn from(callable: PyObjectRef) -> Self {
        PyStaticMethod { callable }
    }
}

impl PyPayload for PyStaticMethod {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.staticmethod_type
    }
}

fn staticmethod_descr_get(
    f: &Frame,
    zelf: &PyObjectRef,
    _obj: Option<&PyObjectRef>,
    _cls: Option<&PyObjectRef>,
) -> PyResult {
    let sm = zelf
        .payload_if_subclass::<PyStaticMethod>(f.ctx())
        .ok_or_else(|| f.new_type_error("expected a staticmethod".to_owned()))?;
    Ok(sm.callable.clone())
}

fn staticmethod_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let [callable] = std::mem::take(args).bind_exact::<1>(f, "staticmethod")?;
    PyStaticMethod::from(callable)
        .into_ref_with_type(f, cls.clone())
        .map(PyRef::into_object)
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.staticmethod_type;
    t.slots.descr_get.store(Some(staticmethod_descr_get));
    t.slots.new.store(Some(staticmethod_new));
}
