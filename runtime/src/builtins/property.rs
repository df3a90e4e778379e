//! The `property` descriptor.

use pyrite_common::lock::PyRwLock;

use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::{ops, PyResult};

#[derive(Debug)]
pub struct PyProperty {
    getter: PyRwLock<Option<PyObjectRef>>,
    setter: PyRwLock<Option<PyObjectRef>>,
    deleter: PyRwLock<Option<PyObjectRef>>,
    pub doc: PyRwLock<Option<PyObjectRef>>,
}

impl PyPayload for PyProperty {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.property_type
    }
}

impl PyProperty {
    pub fn new(
        getter: Option<PyObjectRef>,
        setter: Option<PyObjectRef>,
        deleter: Option<PyObjectRef>,
        doc: Option<PyObjectRef>,
    ) -> Self {
        PyProperty {
            getter: PyRwLock::new(getter),
            setter: PyRwLock::new(setter),
            deleter: PyRwLock::new(deleter),
            doc: PyRwLock::new(doc),
        }
    }
}

fn property_payload<'a>(f: &Frame, zelf: &'a PyObjectRef) -> PyResult<&'a PyProperty> {
    zelf.payload_if_subclass::<PyProperty>(f.ctx())
        .ok_or_else(|| f.new_type_error("expected a property".to_owned()))
}

fn property_descr_get(
    f: &Frame,
    zelf: &PyObjectRef,
    obj: Option<&PyObjectRef>,
    _cls: Option<&PyObjectRef>,
) -> PyResult {
    let prop = property_payload(f, zelf)?;
    let obj = match obj {
        None => return Ok(zelf.clone()),
        Some(obj) => obj,
    };
    let getter = prop.getter.read().clone();
    match getter {
        Some(getter) => ops::invoke(f, &getter, vec![obj.clone()].into()),
        None => Err(f.new_attribute_error("unreadable attribute".to_owned())),
    }
}

fn property_descr_set(
    f: &Frame,
    zelf: &PyObjectRef,
    obj: &PyObjectRef,
    value: Option<&PyObjectRef>,
) -> PyResult<()> {
    let prop = property_payload(f, zelf)?;
    match value {
        Some(value) => {
            let setter = prop.setter.read().clone();
            match setter {
                Some(setter) => {
                    ops::invoke(f, &setter, vec![obj.clone(), value.clone()].into())?;
                    Ok(())
                }
                None => Err(f.new_attribute_error("can't set attribute".to_owned())),
            }
        }
        None => {
            let deleter = prop.deleter.read().clone();
            match deleter {
                Some(deleter) => {
                    ops::invoke(f, &deleter, vec![obj.clone()].into())?;
                    Ok(())
                }
                None => Err(f.new_attribute_error("can't delete attribute".to_owned())),
            }
        }
    }
}

fn property_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let ctx = f.ctx();
    let mut args = std::mem::take(args);
    let mut named = |name: &str| args.take_keyword(name);
    let kw = (named("fget"), named("fset"), named("fdel"), named("doc"));
    let [fget, fset, fdel, doc] = args.bind_range::<0, 4>(f, "property")?;
    let not_none = |v: Option<PyObjectRef>| v.filter(|v| !ctx.is_none(v));
    let payload = PyProperty::new(
        not_none(fget.or(kw.0)),
        not_none(fset.or(kw.1)),
        not_none(fdel.or(kw.2)),
        not_none(doc.or(kw.3)),
    );
    payload
        .into_ref_with_type(f, cls.clone())
        .map(PyRef::into_object)
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.property_type;
    t.slots.descr_get.store(Some(property_descr_get));
    t.slots.descr_set.store(Some(property_descr_set));
    t.slots.new.store(Some(property_new));

    // each decorator form returns a fresh property with one slot replaced
    t.set_str_attr(
        "getter",
        ctx.new_builtin_func("getter", |f, args| {
            let [zelf, func] = args.bind_exact::<2>(f, "getter")?;
            let prop = property_payload(f, &zelf)?;
            let result = PyProperty::new(
                Some(func),
                prop.setter.read().clone(),
                prop.deleter.read().clone(),
                prop.doc.read().clone(),
            )
            .into_ref(f.ctx())
            .into_object();
            Ok(result)
        }),
    );
    t.set_str_attr(
        "setter",
        ctx.new_builtin_func("setter", |f, args| {
            let [zelf, func] = args.bind_exact::<2>(f, "setter")?;
            let prop = property_payload(f, &zelf)?;
            let result = PyProperty::new(
                prop.getter.read().clone(),
                Some(func),
                prop.deleter.read().clone(),
                prop.doc.read().clone(),
            )
            .into_ref(f.ctx())
            .into_object();
            Ok(result)
        }),
    );
    t.set_str_attr(
        "deleter",
        ctx.new_builtin_func("deleter", |f, args| {
            let [zelf, func] = args.bind_exact::<2>(f, "deleter")?;
            let prop = property_payload(f, &zelf)?;
            let result = PyProperty::new(
                prop.getter.read().clone(),
                prop.setter.read().clone(),
                Some(func),
                prop.doc.read().clone(),
            )
            .into_ref(f.ctx())
            .into_object();
            Ok(result)
        }),
    );
}
