//! `super`: attribute lookup that resumes the MRO walk past a given type.

use crate::builtins::str::PyStrRef;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::{ops, PyResult};

#[derive(Debug)]
pub struct PySuper {
    typ: PyTypeRef,
    obj: Option<(PyObjectRef, PyTypeRef)>,
}

impl PyPayload for PySuper {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.super_type
    }
}

/// Validate `obj` against `typ`, yielding the type whose MRO the lookup
/// walks.
fn supercheck(f: &Frame, typ: &PyTypeRef, obj: &PyObjectRef) -> PyResult<PyTypeRef> {
    if let Some(cls) = PyTypeRef::new(obj.clone()) {
        if cls.issubclass(typ) {
            return Ok(cls);
        }
    }
    if obj.fast_isinstance(typ) {
        return Ok(obj.class().clone());
    }
    Err(f.new_type_error(
        "super(type, obj): obj must be an instance or subtype of type".to_owned(),
    ))
}

fn super_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let ctx = f.ctx();
    let [typ, obj] = std::mem::take(args).bind_range::<1, 2>(f, "super")?;
    let typ = typ.unwrap_or_else(|| unreachable!("arity checked"));
    let typ = PyTypeRef::new(typ)
        .ok_or_else(|| f.new_type_error("super() argument 1 must be type".to_owned()))?;
    let obj = match obj {
        Some(obj) if !ctx.is_none(&obj) => {
            let obj_type = supercheck(f, &typ, &obj)?;
            Some((obj, obj_type))
        }
        _ => None,
    };
    PySuper { typ, obj }
        .into_ref_with_type(f, cls.clone())
        .map(PyRef::into_object)
}

fn super_getattro(f: &Frame, zelf: &PyObjectRef, name: &PyStrRef) -> PyResult {
    let ctx = f.ctx();
    let su = zelf
        .payload_if_subclass::<PySuper>(ctx)
        .ok_or_else(|| f.new_type_error("expected a super object".to_owned()))?;

    let (obj, start_type) = match &su.obj {
        Some(pair) => pair,
        None => return crate::builtins::object::generic_getattro(f, zelf, name),
    };

    // __class__ names the super object's own class, never the target's
    if name.as_str() == "__class__" {
        return crate::builtins::object::generic_getattro(f, zelf, name);
    }

    let mut seen_start = false;
    for cls in start_type.iter_mro_refs() {
        if !seen_start {
            if cls.is(&su.typ) {
                seen_start = true;
            }
            continue;
        }
        if let Some(attr) = cls.get_direct_attr(name.as_str()) {
            // bind to the instance, or to nothing when the target is a type
            let obj_is_type = PyTypeRef::new(obj.clone()).is_some();
            let inst = if obj_is_type { None } else { Some(obj) };
            return ops::call_if_get_descriptor(
                f,
                attr,
                inst,
                Some(start_type.as_object()),
            );
        }
    }
    crate::builtins::object::generic_getattro(f, zelf, name)
}

fn super_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let su = zelf
        .payload_if_subclass::<PySuper>(f.ctx())
        .ok_or_else(|| f.new_type_error("expected a super object".to_owned()))?;
    let s = match &su.obj {
        Some((_, obj_type)) => format!(
            "<super: <class '{}'>, <{} object>>",
            su.typ.name, obj_type.name
        ),
        None => format!("<super: <class '{}'>, NULL>", su.typ.name),
    };
    Ok(f.ctx().new_str(s).into_object())
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.super_type;
    t.slots.new.store(Some(super_new));
    t.slots.getattro.store(Some(super_getattro));
    t.slots.repr.store(Some(super_repr));
}
