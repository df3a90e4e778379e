//! The shell presenting a native function as a Python callable.

use std::fmt;

use crate::builtins::method::PyMethod;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload};
use crate::PyResult;

pub type NativeFunc = Box<dyn Fn(&Frame, FuncArgs) -> PyResult + Send + Sync>;

pub struct PyBuiltinFunction {
    name: String,
    func: NativeFunc,
}

impl fmt::Debug for PyBuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[PyBuiltinFunction {}]", self.name)
    }
}

impl PyPayload for PyBuiltinFunction {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.builtin_function_type
    }
}

impl PyBuiltinFunction {
    pub fn new(name: String, func: NativeFunc) -> Self {
        PyBuiltinFunction { name, func }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn builtin_call(f: &Frame, zelf: &PyObjectRef, args: FuncArgs) -> PyResult {
    let func = zelf
        .payload::<PyBuiltinFunction>()
        .ok_or_else(|| f.new_type_error("expected a builtin function".to_owned()))?;
    (func.func)(f, args)
}

/// In a class dict a builtin behaves like a Python function: attribute
/// access binds it to the instance.
fn builtin_descr_get(
    f: &Frame,
    zelf: &PyObjectRef,
    obj: Option<&PyObjectRef>,
    cls: Option<&PyObjectRef>,
) -> PyResult {
    let im_class = cls.and_then(|c| PyTypeRef::new(c.clone()));
    Ok(PyMethod::new(zelf.clone(), obj.cloned(), im_class.map(|c| c.into_object()))
        .into_ref(f.ctx())
        .into_object())
}

fn builtin_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let func = zelf
        .payload::<PyBuiltinFunction>()
        .ok_or_else(|| f.new_type_error("expected a builtin function".to_owned()))?;
    Ok(f
        .ctx()
        .new_str(format!("<built-in function {}>", func.name))
        .into_object())
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.builtin_function_type;
    t.slots.call.store(Some(builtin_call));
    t.slots.descr_get.store(Some(builtin_descr_get));
    t.slots.repr.store(Some(builtin_repr));
}
