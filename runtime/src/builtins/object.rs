//! The root `object` type: default allocation, attribute access, repr and
//! hashing for every instance.

use pyrite_common::hash::{mod_int, PyHash};

use crate::builtins::str::PyStrRef;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::{ops, PyResult};

/// The empty storage layout shared by plain `object` instances and user
/// classes that add nothing to it.
#[derive(Debug)]
pub struct PyBaseObject;

impl PyPayload for PyBaseObject {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.object_type
    }
}

fn object_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let ctx = f.ctx();
    if cls.is(&ctx.types.object_type) && !args.is_empty() {
        return Err(f.new_type_error("object() takes no parameters".to_owned()));
    }
    PyBaseObject
        .into_ref_with_type(f, cls.clone())
        .map(PyRef::into_object)
}

fn object_init(f: &Frame, zelf: &PyObjectRef, args: &mut FuncArgs) -> PyResult<()> {
    let ctx = f.ctx();
    if zelf.class().is(&ctx.types.object_type) && !args.is_empty() {
        return Err(f.new_type_error("object.__init__() takes no parameters".to_owned()));
    }
    Ok(())
}

/// Instance attribute lookup: data descriptors on the type, then the
/// instance dict, then non-data descriptors and plain class attributes,
/// then a `__getattr__` hook.
pub(crate) fn generic_getattro(f: &Frame, obj: &PyObjectRef, name: &PyStrRef) -> PyResult {
    let name_str = name.as_str();
    let cls = obj.class().clone();
    let cls_attr = cls.get_attr(name_str);

    if let Some(ref attr) = cls_attr {
        let attr_class = attr.class().clone();
        if attr_class.mro_find_map(|c| c.slots.descr_set.load()).is_some() {
            if let Some(descr_get) = attr_class.mro_find_map(|c| c.slots.descr_get.load()) {
                return descr_get(f, attr, Some(obj), Some(cls.as_object()));
            }
        }
    }

    if let Some(dict) = obj.dict() {
        if let Some(value) = dict.get_item_str(f, name_str)? {
            return Ok(value);
        }
    }

    if let Some(attr) = cls_attr {
        return ops::call_if_get_descriptor(f, attr, Some(obj), Some(cls.as_object()));
    }

    if cls.has_attr("__getattr__") {
        return ops::call_class_attr(f, obj, "__getattr__", vec![name.clone().into_object()]);
    }

    Err(f.new_attribute_error(format!(
        "'{}' object has no attribute '{}'",
        cls.name, name_str
    )))
}

/// Instance attribute write/delete: a data descriptor on the type wins,
/// otherwise the instance dict.
pub(crate) fn generic_setattro(
    f: &Frame,
    obj: &PyObjectRef,
    name: &PyStrRef,
    value: Option<&PyObjectRef>,
) -> PyResult<()> {
    let name_str = name.as_str();
    let cls = obj.class().clone();
    if let Some(attr) = cls.get_attr(name_str) {
        if let Some(descr_set) = attr.class().mro_find_map(|c| c.slots.descr_set.load()) {
            return descr_set(f, &attr, obj, value);
        }
    }
    let dict = obj.dict().ok_or_else(|| {
        f.new_attribute_error(format!(
            "'{}' object has no attribute '{}'",
            cls.name, name_str
        ))
    })?;
    match value {
        Some(value) => dict.set_item_str(f, name_str, value.clone()),
        None => {
            let removed = dict.del_item_str(f, name_str)?;
            if !removed {
                return Err(f.new_attribute_error(name_str.to_owned()));
            }
            Ok(())
        }
    }
}

fn object_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let cls = zelf.class();
    let s = format!(
        "<{}.{} object at {:#x}>",
        cls.module_name(),
        cls.name,
        zelf.get_id()
    );
    Ok(f.ctx().new_str(s).into_object())
}

fn object_hash(_f: &Frame, zelf: &PyObjectRef) -> PyResult<PyHash> {
    Ok(mod_int(zelf.get_id() as i64))
}

fn object_class_getter(_f: &Frame, zelf: &PyObjectRef) -> PyResult {
    Ok(zelf.class().clone().into_object())
}

fn object_dict_getter(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    match zelf.dict() {
        Some(d) => Ok(d.clone().into_object()),
        None => Err(f.new_attribute_error(format!(
            "'{}' object has no attribute '__dict__'",
            zelf.class().name
        ))),
    }
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.object_type;
    t.slots.new.store(Some(object_new));
    t.slots.init.store(Some(object_init));
    t.slots.getattro.store(Some(generic_getattro));
    t.slots.setattro.store(Some(generic_setattro));
    t.slots.repr.store(Some(object_repr));
    t.slots.hash.store(Some(object_hash));
    t.set_str_attr(
        "__class__",
        ctx.new_getset("__class__", t.clone(), object_class_getter, None),
    );
    t.set_str_attr(
        "__dict__",
        ctx.new_getset("__dict__", t.clone(), object_dict_getter, None),
    );
}
