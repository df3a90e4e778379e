use crate::builtins::method::PyMethod;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::PyResult;

#[derive(Debug)]
pub struct PyClassMethod {
    pub callable: PyObjectRef,
}

impl From<PyObjectRef> for PyClassMethod {
    fn from(callable: PyObjectRef) -> Self {
        PyClassMethod { callable }
    }
}

impl PyPayload for PyClassMethod {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.classmethod_type
    }
}

/// Binding a classmethod produces a method whose receiver is the class
/// itself.
fn classmethod_descr_get(
    f: &Frame,
    zelf: &PyObjectRef,
    obj: Option<&PyObjectRef>,
    cls: Option<&PyObjectRef>,
) -> PyResult {
    let cm = zelf
        .payload_if_subclass::<PyClassMethod>(f.ctx())
        .ok_or_else(|| f.new_type_error("expected a classmethod".to_owned()))?;
    let bound_class = match cls {
        Some(c) => c.clone(),
        None => match obj {
            Some(o) => o.class().clone().into_object(),
            None => f.ctx().none(),
        },
    };
    Ok(
        PyMethod::new(cm.callable.clone(), Some(bound_class.clone()), Some(bound_class))
            .into_ref(f.ctx())
            .into_object(),
    )
}

fn classmethod_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let [callable] = std::mem::take(args).bind_exact::<1>(f, "classmethod")?;
    PyClassMethod::from(callable)
        .into_ref_with_type(f, cls.clone())
        .map(PyRef::into_object)
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.classmethod_type;
    t.slots.descr_get.store(Some(classmethod_descr_get));
    t.slots.new.store(Some(classmethod_new));
}
