//! Python-level function objects: a code block bound to a globals dict.

use std::fmt;

use crate::builtins::dict::PyDictRef;
use crate::builtins::method::PyMethod;
use crate::class::PyTypeRef;
use crate::code::PyCodeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::PyResult;

pub struct PyFunction {
    pub name: String,
    pub code: PyCodeRef,
    pub globals: PyDictRef,
}

impl fmt::Debug for PyFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[PyFunction {}]", self.name)
    }
}

impl PyPayload for PyFunction {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.function_type
    }
}

impl PyFunction {
    pub fn new(ctx: &Context, code: PyCodeRef, globals: PyDictRef) -> PyRef<PyFunction> {
        PyFunction {
            name: code.name.clone(),
            code,
            globals,
        }
        .into_ref(ctx)
    }
}

fn function_call(f: &Frame, zelf: &PyObjectRef, args: FuncArgs) -> PyResult {
    let func = zelf
        .payload::<PyFunction>()
        .ok_or_else(|| f.new_type_error("expected a function".to_owned()))?;
    func.code
        .eval(&f.self_ref(), Some(func.globals.clone()), args)
}

fn function_descr_get(
    f: &Frame,
    zelf: &PyObjectRef,
    obj: Option<&PyObjectRef>,
    cls: Option<&PyObjectRef>,
) -> PyResult {
    Ok(PyMethod::new(zelf.clone(), obj.cloned(), cls.cloned())
        .into_ref(f.ctx())
        .into_object())
}

fn function_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let func = zelf
        .payload::<PyFunction>()
        .ok_or_else(|| f.new_type_error("expected a function".to_owned()))?;
    Ok(f
        .ctx()
        .new_str(format!(
            "<function {} at {:#x}>",
            func.name,
            zelf.get_id()
        ))
        .into_object())
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.function_type;
    t.slots.call.store(Some(function_call));
    t.slots.descr_get.store(Some(function_descr_get));
    t.slots.repr.store(Some(function_repr));
}
