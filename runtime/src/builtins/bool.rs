//! `bool`: an `int` subclass with two interned instances.

use crate::builtins::int::PyInt;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::PyObjectRef;
use crate::{ops, PyResult};

fn bool_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    let v = zelf
        .payload_if_subclass::<PyInt>(ctx)
        .map(PyInt::value)
        .ok_or_else(|| f.new_type_error("expected a bool".to_owned()))?;
    let s = if v != 0 { "True" } else { "False" };
    Ok(ctx.new_str(s).into_object())
}

fn bool_new(f: &Frame, _cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let ctx = f.ctx();
    let [value] = std::mem::take(args).bind_range::<0, 1>(f, "bool")?;
    let truth = match value {
        None => false,
        Some(v) => ops::is_true(f, &v)?,
    };
    Ok(ctx.new_bool(truth))
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.bool_type;
    t.slots.repr.store(Some(bool_repr));
    t.slots.new.store(Some(bool_new));
}
