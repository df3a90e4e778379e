//! Bound and unbound methods.

use std::fmt;

use crate::builtins::builtinfunc::PyBuiltinFunction;
use crate::builtins::function::PyFunction;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload};
use crate::{ops, PyResult};

pub struct PyMethod {
    pub im_func: PyObjectRef,
    pub im_self: Option<PyObjectRef>,
    pub im_class: Option<PyObjectRef>,
}

impl fmt::Debug for PyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[PyMethod bound={}]",
            if self.im_self.is_some() { "yes" } else { "no" }
        )
    }
}

impl PyPayload for PyMethod {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.method_type
    }
}

impl PyMethod {
    pub fn new(
        im_func: PyObjectRef,
        im_self: Option<PyObjectRef>,
        im_class: Option<PyObjectRef>,
    ) -> Self {
        PyMethod {
            im_func,
            im_self,
            im_class,
        }
    }

    fn func_name(&self) -> String {
        if let Some(func) = self.im_func.payload::<PyFunction>() {
            return func.name.clone();
        }
        if let Some(func) = self.im_func.payload::<PyBuiltinFunction>() {
            return func.name().to_owned();
        }
        "?".to_owned()
    }

    fn class_name(&self) -> String {
        match &self.im_class {
            Some(cls) => match PyTypeRef::new(cls.clone()) {
                Some(t) => t.name.clone(),
                None => "?".to_owned(),
            },
            None => "?".to_owned(),
        }
    }
}

fn method_payload<'a>(f: &Frame, zelf: &'a PyObjectRef) -> PyResult<&'a PyMethod> {
    zelf.payload::<PyMethod>()
        .ok_or_else(|| f.new_type_error("expected a method".to_owned()))
}

fn method_call(f: &Frame, zelf: &PyObjectRef, mut args: FuncArgs) -> PyResult {
    let method = method_payload(f, zelf)?;
    match &method.im_self {
        Some(receiver) => {
            args.prepend_arg(receiver.clone());
        }
        None => {
            // the first positional argument becomes the receiver, after a
            // class check
            let got = |desc: String| {
                f.new_type_error(format!(
                    "unbound method {}() must be called with {} instance as first argument \
                     (got {} instead)",
                    method.func_name(),
                    method.class_name(),
                    desc
                ))
            };
            let first = match args.args.first() {
                Some(first) => first.clone(),
                None => return Err(got("nothing".to_owned())),
            };
            if let Some(cls) = &method.im_class {
                if !ops::isinstance(f, &first, cls)? {
                    return Err(got(format!("{} instance", first.class().name)));
                }
            }
        }
    }
    ops::invoke(f, &method.im_func, args)
}

fn method_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let method = method_payload(f, zelf)?;
    let s = match &method.im_self {
        Some(receiver) => format!(
            "<bound method {}.{} of {}>",
            method.class_name(),
            method.func_name(),
            ops::repr_str(f, receiver)?
        ),
        None => format!(
            "<unbound method {}.{}>",
            method.class_name(),
            method.func_name()
        ),
    };
    Ok(f.ctx().new_str(s).into_object())
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.method_type;
    t.slots.call.store(Some(method_call));
    t.slots.repr.store(Some(method_repr));
}
