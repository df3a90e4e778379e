use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use itertools::Itertools;
use pyrite_common::lock::{OnceCell, PyRwLock};

use crate::builtins::str::PyStrRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{Basis, PyObject, PyObjectRef, PyPayload, PyRef};
use crate::types::slot::SlotTable;
use crate::{ops, PyResult};

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct TypeFlags: u64 {
        /// Instances of this type may be created by calling it.
        const INSTANTIABLE = 1 << 0;
        /// This type may appear in a class statement's bases.
        const BASETYPE = 1 << 1;
        /// This type introduces its own storage layout.
        const BASIS = 1 << 2;
        /// Instances carry an attribute dict.
        const HAS_DICT = 1 << 3;
        /// Created by a class statement rather than runtime registration.
        const HEAP = 1 << 4;
    }
}

pub type PyAttributes = IndexMap<String, PyObjectRef>;

pub struct PyType {
    pub name: String,
    pub base: Option<PyTypeRef>,
    pub bases: Vec<PyTypeRef>,
    mro: OnceCell<Vec<PyTypeRef>>,
    pub attributes: PyRwLock<PyAttributes>,
    pub slots: SlotTable,
    basis: Basis,
    pub flags: TypeFlags,
}

pub type PyTypeRef = PyRef<PyType>;

impl PyPayload for PyType {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.type_type
    }
}

impl fmt::Display for PyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.name, f)
    }
}

impl fmt::Debug for PyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[PyType {}]", &self.name)
    }
}

impl PyType {
    pub(crate) fn new_ref(
        name: impl Into<String>,
        base: Option<PyTypeRef>,
        bases: Vec<PyTypeRef>,
        attributes: PyAttributes,
        basis: Basis,
        flags: TypeFlags,
        metatype: Option<PyTypeRef>,
    ) -> PyTypeRef {
        let typ = PyType {
            name: name.into(),
            base,
            bases,
            mro: OnceCell::new(),
            attributes: PyRwLock::new(attributes),
            slots: SlotTable::new(),
            basis,
            flags,
        };
        let obj = match metatype {
            Some(m) => PyObject::new(typ, m, None),
            None => PyObject::new_uninit_class(typ, None),
        };
        unsafe { PyRef::from_obj_unchecked(obj) }
    }

    pub fn basis(&self) -> Basis {
        self.basis
    }

    /// The linearized resolution order past the type itself.
    pub fn mro(&self) -> &[PyTypeRef] {
        self.mro.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter_mro(&self) -> impl Iterator<Item = &PyType> {
        std::iter::once(self).chain(self.mro().iter().map(|cls| &**cls))
    }

    pub(crate) fn mro_find_map<F, R>(&self, f: F) -> Option<R>
    where
        F: Fn(&Self) -> Option<R>,
    {
        // the hot path is primitive types which hit the result on themselves
        if let Some(r) = f(self) {
            Some(r)
        } else {
            self.mro().iter().find_map(|cls| f(cls))
        }
    }

    pub fn set_str_attr<V: Into<PyObjectRef>>(&self, attr_name: &str, value: V) {
        self.attributes
            .write()
            .insert(attr_name.to_owned(), value.into());
    }

    pub fn get_direct_attr(&self, attr_name: &str) -> Option<PyObjectRef> {
        self.attributes.read().get(attr_name).cloned()
    }

    /// Attribute lookup through the resolution order, without descriptors.
    pub fn get_attr(&self, attr_name: &str) -> Option<PyObjectRef> {
        self.get_direct_attr(attr_name)
            .or_else(|| self.get_super_attr(attr_name))
    }

    pub fn get_super_attr(&self, attr_name: &str) -> Option<PyObjectRef> {
        self.mro()
            .iter()
            .find_map(|class| class.attributes.read().get(attr_name).cloned())
    }

    pub fn has_attr(&self, attr_name: &str) -> bool {
        self.iter_mro()
            .any(|c| c.attributes.read().contains_key(attr_name))
    }

    pub fn issubclass(&self, cls: &PyTypeRef) -> bool {
        self.is(cls) || self.mro().iter().any(|c| c.is(cls))
    }

    pub fn is(&self, other: &PyType) -> bool {
        std::ptr::eq(self, other)
    }

    pub fn module_name(&self) -> String {
        self.get_direct_attr("__module__")
            .and_then(|m| {
                m.payload::<crate::builtins::str::PyStr>()
                    .map(|s| s.as_str().to_owned())
            })
            .unwrap_or_else(|| "__builtin__".to_owned())
    }

    /// Re-derive the slot for a dunder name after a dict mutation.
    pub(crate) fn update_slot(&self, name: &str) {
        self.slots.update_from_dunder(name);
    }
}

impl PyTypeRef {
    /// The nearest type in the resolution order that introduced its own
    /// storage layout.
    pub fn solid_base(&self) -> PyTypeRef {
        if self.flags.contains(TypeFlags::BASIS) {
            return self.clone();
        }
        self.mro()
            .iter()
            .find(|c| c.flags.contains(TypeFlags::BASIS))
            .cloned()
            .unwrap_or_else(|| unreachable!("every resolution order ends at object"))
    }
}

/// Register a built-in type backed by a native storage layout. The caller
/// populates slots and dict methods, then finalizes with [`prepare_type`].
pub fn new_basis_type(
    name: &'static str,
    base: &PyTypeRef,
    metatype: &PyTypeRef,
    basis: Basis,
    flags: TypeFlags,
) -> PyTypeRef {
    PyType::new_ref(
        name,
        Some(base.clone()),
        vec![base.clone()],
        PyAttributes::new(),
        basis,
        flags,
        Some(metatype.clone()),
    )
}

/// Finalize a registered type: compute its MRO from its bases, inherit
/// unset slots from the nearest ancestor, and surface native slots as
/// callables under their dunder names.
pub fn prepare_type(ctx: &Context, t: &PyTypeRef) {
    if t.mro.get().is_none() {
        let mros = t
            .bases
            .iter()
            .map(|x| x.iter_mro_refs().cloned().collect())
            .collect();
        let mro = linearise_mro(mros)
            .unwrap_or_else(|e| panic!("mro of builtin type {}: {}", t.name, e));
        t.mro.set(mro).unwrap_or_else(|_| unreachable!());
    }
    // surface the type's own native slots before ancestors' slots are
    // copied in, so only genuinely owned operations land in its dict
    if !t.flags.contains(TypeFlags::HEAP) {
        crate::types::slot::expose_native_slots(ctx, t);
    }
    for ancestor in t.mro() {
        t.slots.inherit(&ancestor.slots);
    }
}

impl PyTypeRef {
    pub fn iter_mro_refs(&self) -> impl Iterator<Item = &PyTypeRef> {
        std::iter::once(self).chain(self.mro().iter())
    }
}

fn take_next_base(mut bases: Vec<Vec<PyTypeRef>>) -> (Option<PyTypeRef>, Vec<Vec<PyTypeRef>>) {
    bases.retain(|x| !x.is_empty());

    for base in &bases {
        let head = base[0].clone();
        if !bases
            .iter()
            .any(|x| x[1..].iter().any(|y| y.is(&head)))
        {
            // remove from other heads
            for item in &mut bases {
                if item[0].is(&head) {
                    item.remove(0);
                }
            }
            return (Some(head), bases);
        }
    }

    (None, bases)
}

pub(crate) fn linearise_mro(mut bases: Vec<Vec<PyTypeRef>>) -> Result<Vec<PyTypeRef>, String> {
    rt_trace!("linearise mro: {:?}", bases);
    // Python requires that direct bases keep their local precedence order:
    // for A(), B(A), the class C(A, B) must be rejected even though a
    // linearisation [C, B, A, object] exists.
    for (i, base_mro) in bases.iter().enumerate() {
        let base = &base_mro[0]; // linearisations are never empty
        for later_mro in &bases[i + 1..] {
            if later_mro[1..].iter().any(|cls| cls.is(base)) {
                return Err(
                    "Unable to find mro order which keeps local precedence ordering".to_owned(),
                );
            }
        }
    }

    let mut result = vec![];
    while !bases.iter().all(Vec::is_empty) {
        let (head, new_bases) = take_next_base(bases);
        match head {
            Some(head) => {
                result.push(head);
                bases = new_bases;
            }
            None => {
                return Err(format!(
                    "Cannot create a consistent method resolution order (MRO) for bases {}",
                    new_bases.iter().map(|x| &x[0].name).join(", ")
                ));
            }
        }
    }
    Ok(result)
}

fn calculate_meta_class(
    f: &Frame,
    metatype: PyTypeRef,
    bases: &[PyTypeRef],
) -> PyResult<PyTypeRef> {
    let mut winner = metatype;
    for base in bases {
        let base_type = base.as_object().class().clone();
        if winner.issubclass(&base_type) {
            continue;
        } else if base_type.issubclass(&winner) {
            winner = base_type;
            continue;
        }
        return Err(f.new_type_error(
            "metaclass conflict: the metaclass of a derived class must be a (non-strict) subclass \
             of the metaclasses of all its bases"
                .to_owned(),
        ));
    }
    Ok(winner)
}

/// The unique most-derived storage layout among the bases; the new class's
/// instances use it.
fn best_basis(f: &Frame, bases: &[PyTypeRef]) -> PyResult<(PyTypeRef, PyTypeRef)> {
    let mut winner: Option<(PyTypeRef, PyTypeRef)> = None; // (solid, direct base)
    for base in bases {
        if !base.flags.contains(TypeFlags::BASETYPE) {
            return Err(f.new_type_error(format!(
                "type '{}' is not an acceptable base type",
                base.name
            )));
        }
        let candidate = base.solid_base();
        winner = match winner {
            None => Some((candidate, base.clone())),
            Some((solid, prior)) => {
                if solid.issubclass(&candidate) {
                    Some((solid, prior))
                } else if candidate.issubclass(&solid) {
                    Some((candidate, base.clone()))
                } else {
                    return Err(f.new_type_error("class layout error".to_owned()));
                }
            }
        };
    }
    Ok(winner.unwrap_or_else(|| unreachable!("bases checked non-empty by the caller")))
}

/// Create a class the way a class statement (or a three-argument `type`
/// call) does.
pub fn new_class(
    f: &Frame,
    metatype: PyTypeRef,
    name: &str,
    bases: Vec<PyTypeRef>,
    dict: PyAttributes,
) -> PyResult<PyTypeRef> {
    rt_trace!("new_class: {} bases={:?}", name, bases);
    let ctx = f.ctx();
    if bases.is_empty() {
        return Err(f.new_type_error("class must have base classes".to_owned()));
    }

    let mut unique_bases = HashSet::new();
    for base in &bases {
        if !unique_bases.insert(base.get_id()) {
            return Err(f.new_type_error(format!("duplicate base class {}", base.name)));
        }
    }

    let metatype = calculate_meta_class(f, metatype, &bases)?;
    let (solid, primary) = best_basis(f, &bases)?;

    let mros = bases
        .iter()
        .map(|x| x.iter_mro_refs().cloned().collect())
        .collect();
    let mro = linearise_mro(mros)
        .map_err(|_| f.new_type_error(format!("mro error for: {}", name)))?;

    let mut attributes = dict;
    if !attributes.contains_key("__module__") {
        attributes.insert(
            "__module__".to_owned(),
            ctx.new_str("__builtin__".to_owned()).into_object(),
        );
    }
    // __new__ is an implicit staticmethod
    if let Some(new) = attributes.get_mut("__new__") {
        if new.payload_is::<crate::builtins::function::PyFunction>() {
            *new = ctx.new_staticmethod(new.clone());
        }
    }

    let flags = TypeFlags::INSTANTIABLE
        | TypeFlags::BASETYPE
        | TypeFlags::HAS_DICT
        | TypeFlags::HEAP;
    let typ = PyType::new_ref(
        name,
        Some(primary),
        bases,
        attributes,
        solid.basis(),
        flags,
        Some(metatype),
    );
    typ.mro
        .set(mro)
        .unwrap_or_else(|_| unreachable!("fresh type has no mro"));
    for ancestor in typ.mro() {
        typ.slots.inherit(&ancestor.slots);
    }
    let dunders: Vec<String> = typ
        .attributes
        .read()
        .keys()
        .filter(|k| (k.starts_with("__") && k.ends_with("__")) || k.as_str() == "next")
        .cloned()
        .collect();
    for name in dunders {
        typ.update_slot(&name);
    }
    Ok(typ)
}

/// The call slot shared by every type object: `T(...)` resolves `__new__`
/// along the MRO, then conditionally `__init__`.
pub(crate) fn type_call(f: &Frame, callee: &PyObjectRef, args: FuncArgs) -> PyResult {
    let cls = PyTypeRef::try_from_object(f, callee.clone())?;
    rt_trace!("type_call: {:?}", cls);
    let ctx = f.ctx();

    // type(x) -> the dynamic type of x
    if cls.is(&ctx.types.type_type) && args.args.len() == 1 && args.kwargs.is_empty() {
        return Ok(args.args[0].class().clone().into_object());
    }

    if !cls.flags.contains(TypeFlags::INSTANTIABLE) {
        return Err(f.new_type_error(format!("cannot create '{}' instances", cls.name)));
    }

    let new = cls
        .iter_mro()
        .find_map(|c| c.get_direct_attr("__new__"))
        .ok_or_else(|| f.new_type_error(format!("type {} has no __new__", cls.name)))?;
    let new = ops::call_if_get_descriptor(f, new, None, Some(callee))?;
    let mut new_args = args.clone();
    new_args.prepend_arg(callee.clone());
    let obj = ops::invoke(f, &new, new_args)?;

    if obj.fast_isinstance(&cls) {
        if let Some(init) = obj.class().get_attr("__init__") {
            let init = ops::call_if_get_descriptor(f, init, Some(&obj), None)?;
            let res = ops::invoke(f, &init, args)?;
            if !ctx.is_none(&res) {
                return Err(f.new_type_error(format!(
                    "__init__() should return None, not '{}'",
                    res.class().name
                )));
            }
        }
    }
    Ok(obj)
}

/// `type.__new__`: one argument inspects, three arguments build a class.
pub(crate) fn type_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let ctx = f.ctx();
    let is_type_type = cls.is(&ctx.types.type_type);
    if is_type_type && args.args.len() == 1 && args.kwargs.is_empty() {
        return Ok(args.args[0].class().clone().into_object());
    }
    if args.args.len() != 3 {
        return Err(f.new_type_error(if is_type_type {
            "type() takes 1 or 3 arguments".to_owned()
        } else {
            format!(
                "type.__new__() takes exactly 3 arguments ({} given)",
                args.args.len()
            )
        }));
    }

    let name = PyStrRef::try_from_object(f, args.args[0].clone())?;
    let bases_obj = &args.args[1];
    let dict_obj = &args.args[2];

    let bases_tuple = bases_obj
        .payload::<crate::builtins::tuple::PyTuple>()
        .ok_or_else(|| f.new_type_error("class must have base classes".to_owned()))?;
    if bases_tuple.as_slice().is_empty() {
        return Err(f.new_type_error("class must have base classes".to_owned()));
    }
    let mut bases = Vec::with_capacity(bases_tuple.as_slice().len());
    for b in bases_tuple.as_slice() {
        match PyTypeRef::new(b.clone()) {
            Some(t) => bases.push(t),
            None => {
                let repr = ops::repr_str(f, b)?;
                return Err(f.new_type_error(format!("not a valid base class: {}", repr)));
            }
        }
    }

    let dict = dict_obj
        .payload::<crate::builtins::dict::PyDict>()
        .ok_or_else(|| {
            f.new_type_error(format!(
                "type() argument 3 must be dict, not {}",
                dict_obj.class().name
            ))
        })?;
    let mut attributes = PyAttributes::new();
    for (key, value) in dict.entries(f)? {
        let key = key.payload::<crate::builtins::str::PyStr>().ok_or_else(|| {
            f.new_type_error(format!(
                "attribute name must be string, not '{}'",
                key.class().name
            ))
        })?;
        attributes.insert(key.as_str().to_owned(), value);
    }

    let typ = new_class(f, cls.clone(), name.as_str(), bases, attributes)?;
    Ok(typ.into_object())
}

/// Attribute lookup on a type object is metatype-aware: data descriptors on
/// the metatype win, then the type's own MRO with unbound binding, then
/// non-data metatype attributes.
pub(crate) fn type_getattro(f: &Frame, obj: &PyObjectRef, name: &PyStrRef) -> PyResult {
    let zelf = PyTypeRef::try_from_object(f, obj.clone())?;
    let name_str = name.as_str();
    rt_trace!("type_getattro({}, {})", zelf.name, name_str);
    let mcl = zelf.as_object().class().clone();

    let mcl_attr = mcl.get_attr(name_str);
    if let Some(ref attr) = mcl_attr {
        let attr_class = attr.class().clone();
        if attr_class
            .mro_find_map(|cls| cls.slots.descr_set.load())
            .is_some()
        {
            if let Some(descr_get) = attr_class.mro_find_map(|cls| cls.slots.descr_get.load()) {
                return descr_get(f, attr, Some(obj), Some(mcl.as_object()));
            }
        }
    }

    if let Some(attr) = zelf.get_attr(name_str) {
        if let Some(descr_get) = attr.class().mro_find_map(|cls| cls.slots.descr_get.load()) {
            return descr_get(f, &attr, None, Some(obj));
        }
        return Ok(attr);
    }

    if let Some(attr) = mcl_attr {
        return ops::call_if_get_descriptor(f, attr, Some(obj), Some(mcl.as_object()));
    }

    Err(f.new_attribute_error(format!(
        "type object '{}' has no attribute '{}'",
        zelf.name, name_str
    )))
}

pub(crate) fn type_setattro(
    f: &Frame,
    obj: &PyObjectRef,
    name: &PyStrRef,
    value: Option<&PyObjectRef>,
) -> PyResult<()> {
    let zelf = PyTypeRef::try_from_object(f, obj.clone())?;
    let name_str = name.as_str();
    if let Some(attr) = zelf.as_object().class().get_attr(name_str) {
        if let Some(descr_set) = attr.class().mro_find_map(|cls| cls.slots.descr_set.load()) {
            return descr_set(f, &attr, obj, value);
        }
    }
    match value {
        Some(value) => {
            zelf.attributes
                .write()
                .insert(name_str.to_owned(), value.clone());
        }
        None => {
            let removed = zelf.attributes.write().shift_remove(name_str);
            if removed.is_none() {
                return Err(f.new_attribute_error(format!(
                    "type object '{}' has no attribute '{}'",
                    zelf.name, name_str
                )));
            }
        }
    }
    if (name_str.starts_with("__") && name_str.ends_with("__")) || name_str == "next" {
        zelf.update_slot(name_str);
    }
    Ok(())
}

pub(crate) fn type_repr(f: &Frame, obj: &PyObjectRef) -> PyResult {
    let zelf = PyTypeRef::try_from_object(f, obj.clone())?;
    let s = if zelf.flags.contains(TypeFlags::HEAP) {
        format!("<class '{}.{}'>", zelf.module_name(), zelf.name)
    } else {
        format!("<type '{}'>", zelf.name)
    };
    Ok(f.ctx().new_str(s).into_object())
}

fn type_name_getter(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let t = PyTypeRef::try_from_object(f, zelf.clone())?;
    Ok(f.ctx().new_str(t.name.clone()).into_object())
}

fn type_name_setter(f: &Frame, zelf: &PyObjectRef, _value: &PyObjectRef) -> PyResult<()> {
    Err(f.new_type_error(format!(
        "can't set attributes of built-in/extension type '{}'",
        zelf.class().name
    )))
}

fn type_module_getter(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let t = PyTypeRef::try_from_object(f, zelf.clone())?;
    Ok(f.ctx().new_str(t.module_name()).into_object())
}

fn type_module_setter(f: &Frame, zelf: &PyObjectRef, value: &PyObjectRef) -> PyResult<()> {
    let t = PyTypeRef::try_from_object(f, zelf.clone())?;
    t.attributes
        .write()
        .insert("__module__".to_owned(), value.clone());
    Ok(())
}

fn type_bases_getter(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let t = PyTypeRef::try_from_object(f, zelf.clone())?;
    let bases = t.bases.iter().map(|b| b.clone().into_object()).collect();
    Ok(f.ctx().new_tuple(bases).into_object())
}

fn type_mro_getter(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let t = PyTypeRef::try_from_object(f, zelf.clone())?;
    let mro = t
        .iter_mro_refs()
        .map(|c| c.clone().into_object())
        .collect();
    Ok(f.ctx().new_tuple(mro).into_object())
}

fn type_dict_getter(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let t = PyTypeRef::try_from_object(f, zelf.clone())?;
    let ctx = f.ctx();
    let snapshot = ctx.new_dict();
    for (name, value) in t.attributes.read().iter() {
        let key = ctx.new_str(name.clone()).into_object();
        snapshot.set_item(f, key, value.clone())?;
    }
    Ok(snapshot.into_object())
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.type_type;
    t.slots.call.store(Some(type_call));
    t.slots.getattro.store(Some(type_getattro));
    t.slots.setattro.store(Some(type_setattro));
    t.slots.repr.store(Some(type_repr));
    t.slots.new.store(Some(type_new));
    t.set_str_attr(
        "__name__",
        ctx.new_getset("__name__", t.clone(), type_name_getter, Some(type_name_setter)),
    );
    t.set_str_attr(
        "__module__",
        ctx.new_getset(
            "__module__",
            t.clone(),
            type_module_getter,
            Some(type_module_setter),
        ),
    );
    t.set_str_attr(
        "__bases__",
        ctx.new_getset("__bases__", t.clone(), type_bases_getter, None),
    );
    t.set_str_attr(
        "__mro__",
        ctx.new_getset("__mro__", t.clone(), type_mro_getter, None),
    );
    t.set_str_attr(
        "__dict__",
        ctx.new_getset("__dict__", t.clone(), type_dict_getter, None),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    fn map_ids(obj: Result<Vec<PyTypeRef>, String>) -> Result<Vec<usize>, String> {
        Ok(obj?.into_iter().map(|x| x.get_id()).collect())
    }

    #[test]
    fn test_linearise() {
        let ctx = Context::global();
        let f = Frame::new_root(ctx);
        let object = &ctx.types.object_type;

        let a = new_class(
            &f,
            ctx.types.type_type.clone(),
            "A",
            vec![object.clone()],
            PyAttributes::new(),
        )
        .unwrap();
        let b = new_class(
            &f,
            ctx.types.type_type.clone(),
            "B",
            vec![object.clone()],
            PyAttributes::new(),
        )
        .unwrap();

        assert_eq!(
            map_ids(linearise_mro(vec![
                vec![object.clone()],
                vec![object.clone()]
            ])),
            map_ids(Ok(vec![object.clone()]))
        );
        assert_eq!(
            map_ids(linearise_mro(vec![
                vec![a.clone(), object.clone()],
                vec![b.clone(), object.clone()],
            ])),
            map_ids(Ok(vec![a.clone(), b.clone(), object.clone()]))
        );
    }

    #[test]
    fn local_precedence_ordering_rejected() {
        let ctx = Context::global();
        let f = Frame::new_root(ctx);
        let object = &ctx.types.object_type;
        let a = new_class(
            &f,
            ctx.types.type_type.clone(),
            "A",
            vec![object.clone()],
            PyAttributes::new(),
        )
        .unwrap();
        let b = new_class(
            &f,
            ctx.types.type_type.clone(),
            "B",
            vec![a.clone()],
            PyAttributes::new(),
        )
        .unwrap();
        // C(A, B) has no linearisation keeping local precedence
        let err = new_class(
            &f,
            ctx.types.type_type.clone(),
            "C",
            vec![a, b],
            PyAttributes::new(),
        )
        .unwrap_err();
        assert_eq!(err.message(), "mro error for: C");
    }

    #[test]
    fn diamond_mro() {
        let ctx = Context::global();
        let f = Frame::new_root(ctx);
        let object = &ctx.types.object_type;
        let top = new_class(
            &f,
            ctx.types.type_type.clone(),
            "Top",
            vec![object.clone()],
            PyAttributes::new(),
        )
        .unwrap();
        let left = new_class(
            &f,
            ctx.types.type_type.clone(),
            "Left",
            vec![top.clone()],
            PyAttributes::new(),
        )
        .unwrap();
        let right = new_class(
            &f,
            ctx.types.type_type.clone(),
            "Right",
            vec![top.clone()],
            PyAttributes::new(),
        )
        .unwrap();
        let bottom = new_class(
            &f,
            ctx.types.type_type.clone(),
            "Bottom",
            vec![left.clone(), right.clone()],
            PyAttributes::new(),
        )
        .unwrap();
        let mro: Vec<usize> = bottom.iter_mro_refs().map(|t| t.get_id()).collect();
        let expected: Vec<usize> = [&bottom, &left, &right, &top, object]
            .iter()
            .map(|t| t.get_id())
            .collect();
        assert_eq!(mro, expected);
    }
}
