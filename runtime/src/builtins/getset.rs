//! The struct-field descriptor: a named native field surfaced as an
//! attribute, validated against the declaring type.

use std::fmt;

use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::object::{PyObjectRef, PyPayload};
use crate::PyResult;

pub type GetterFunc = fn(&Frame, &PyObjectRef) -> PyResult;
pub type SetterFunc = fn(&Frame, &PyObjectRef, &PyObjectRef) -> PyResult<()>;

pub struct PyGetSet {
    name: String,
    class: PyTypeRef,
    getter: GetterFunc,
    setter: Option<SetterFunc>,
}

impl fmt::Debug for PyGetSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[PyGetSet {} of {} settable={}]",
            self.name,
            self.class.name,
            self.setter.is_some()
        )
    }
}

impl PyPayload for PyGetSet {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.getset_type
    }
}

impl PyGetSet {
    pub fn new(
        name: String,
        class: PyTypeRef,
        getter: GetterFunc,
        setter: Option<SetterFunc>,
    ) -> Self {
        PyGetSet {
            name,
            class,
            getter,
            setter,
        }
    }
}

fn getset_payload<'a>(f: &Frame, zelf: &'a PyObjectRef) -> PyResult<&'a PyGetSet> {
    zelf.payload::<PyGetSet>()
        .ok_or_else(|| f.new_type_error("expected a getset descriptor".to_owned()))
}

fn check_receiver(f: &Frame, descr: &PyGetSet, obj: &PyObjectRef) -> PyResult<()> {
    if obj.fast_isinstance(&descr.class) {
        Ok(())
    } else {
        Err(f.new_type_error(format!(
            "descriptor '{}' for '{}' objects doesn't apply to '{}' objects",
            descr.name,
            descr.class.name,
            obj.class().name
        )))
    }
}

fn getset_descr_get(
    f: &Frame,
    zelf: &PyObjectRef,
    obj: Option<&PyObjectRef>,
    _cls: Option<&PyObjectRef>,
) -> PyResult {
    let descr = getset_payload(f, zelf)?;
    let obj = match obj {
        None => return Ok(zelf.clone()),
        Some(obj) => obj,
    };
    check_receiver(f, descr, obj)?;
    (descr.getter)(f, obj)
}

fn getset_descr_set(
    f: &Frame,
    zelf: &PyObjectRef,
    obj: &PyObjectRef,
    value: Option<&PyObjectRef>,
) -> PyResult<()> {
    let descr = getset_payload(f, zelf)?;
    check_receiver(f, descr, obj)?;
    match (descr.setter, value) {
        (Some(setter), Some(value)) => setter(f, obj, value),
        (Some(_), None) => Err(f.new_attribute_error(format!(
            "attribute '{}' of '{}' objects cannot be deleted",
            descr.name, descr.class.name
        ))),
        (None, _) => Err(f.new_attribute_error(format!(
            "attribute '{}' of '{}' objects is not writable",
            descr.name, descr.class.name
        ))),
    }
}

fn getset_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let descr = getset_payload(f, zelf)?;
    Ok(f
        .ctx()
        .new_str(format!(
            "<attribute '{}' of '{}' objects>",
            descr.name, descr.class.name
        ))
        .into_object())
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.getset_type;
    t.slots.descr_get.store(Some(getset_descr_get));
    t.slots.descr_set.store(Some(getset_descr_set));
    t.slots.repr.store(Some(getset_repr));
}
