//! The dispatch entry points consumed by compiled code.
//!
//! Every operation resolves a slot through the receiver's MRO and returns
//! the uniform result pair. Binary operations run the forward slot, then the
//! reflected slot, with the reflected slot first when the right operand's
//! type is a proper subtype of the left's.

use std::cmp::Ordering;

use pyrite_common::hash::PyHash;

use crate::builtins::int::PyInt;
use crate::builtins::iter::PySeqIterator;
use crate::builtins::long::PyLong;
use crate::builtins::str::{PyStr, PyStrRef, PyUnicode};
use crate::builtins::tuple::PyTuple;
use crate::class::PyTypeRef;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload};
use crate::types::slot::{BinOp, CmpOp};
use crate::PyResult;

// ---------------------------------------------------------------------------
// calling

pub fn invoke(f: &Frame, callable: &PyObjectRef, args: FuncArgs) -> PyResult {
    rt_trace!("invoke: {:?}", callable);
    let slot = callable
        .class()
        .mro_find_map(|c| c.slots.call.load())
        .ok_or_else(|| {
            f.new_type_error(format!("'{}' object is not callable", callable.class().name))
        })?;
    slot(f, callable, args)
}

/// Bind `attr` through its `__get__` slot if it is a descriptor, otherwise
/// return it unchanged.
pub fn call_if_get_descriptor(
    f: &Frame,
    attr: PyObjectRef,
    obj: Option<&PyObjectRef>,
    cls: Option<&PyObjectRef>,
) -> PyResult {
    match attr.class().mro_find_map(|c| c.slots.descr_get.load()) {
        Some(descr_get) => descr_get(f, &attr, obj, cls),
        None => Ok(attr),
    }
}

/// Resolve a method through the receiver's class (never the instance dict),
/// bind it, and call it.
pub(crate) fn call_class_attr(
    f: &Frame,
    obj: &PyObjectRef,
    name: &str,
    args: Vec<PyObjectRef>,
) -> PyResult {
    let method = lookup_special(f, obj, name)?;
    invoke(f, &method, FuncArgs::from(args))
}

pub(crate) fn lookup_special(f: &Frame, obj: &PyObjectRef, name: &str) -> PyResult {
    let attr = obj.class().get_attr(name).ok_or_else(|| {
        f.new_attribute_error(format!(
            "'{}' object has no attribute '{}'",
            obj.class().name,
            name
        ))
    })?;
    call_if_get_descriptor(f, attr, Some(obj), None)
}

// ---------------------------------------------------------------------------
// attributes

pub fn get_attr(f: &Frame, obj: &PyObjectRef, name: &PyStrRef) -> PyResult {
    let slot = obj
        .class()
        .mro_find_map(|c| c.slots.getattro.load())
        .unwrap_or_else(|| unreachable!("object provides a getattribute slot"));
    slot(f, obj, name)
}

pub fn get_attr_str(f: &Frame, obj: &PyObjectRef, name: &str) -> PyResult {
    let name = f.ctx().new_str(name);
    get_attr(f, obj, &name)
}

pub fn set_attr(f: &Frame, obj: &PyObjectRef, name: &PyStrRef, value: &PyObjectRef) -> PyResult<()> {
    let slot = obj
        .class()
        .mro_find_map(|c| c.slots.setattro.load())
        .unwrap_or_else(|| unreachable!("object provides a setattr slot"));
    slot(f, obj, name, Some(value))
}

pub fn del_attr(f: &Frame, obj: &PyObjectRef, name: &PyStrRef) -> PyResult<()> {
    let slot = obj
        .class()
        .mro_find_map(|c| c.slots.setattro.load())
        .unwrap_or_else(|| unreachable!("object provides a setattr slot"));
    slot(f, obj, name, None)
}

// ---------------------------------------------------------------------------
// binary operations

fn binary_op_inner(
    f: &Frame,
    v: &PyObjectRef,
    w: &PyObjectRef,
    op: BinOp,
    symbol: &str,
) -> PyResult {
    let ctx = f.ctx();
    let vt = v.class();
    let wt = w.class();
    let same_type = vt.is(wt);
    let w_priority = !same_type && wt.issubclass(vt);

    if w_priority {
        if let Some(reflected) = wt.mro_find_map(|c| c.slots.binary_reflected(op)) {
            let res = reflected(f, w, v)?;
            if !ctx.is_not_implemented(&res) {
                return Ok(res);
            }
        }
    }
    if let Some(forward) = vt.mro_find_map(|c| c.slots.binary(op)) {
        let res = forward(f, v, w)?;
        if !ctx.is_not_implemented(&res) {
            return Ok(res);
        }
    }
    if !w_priority && !same_type {
        if let Some(reflected) = wt.mro_find_map(|c| c.slots.binary_reflected(op)) {
            let res = reflected(f, w, v)?;
            if !ctx.is_not_implemented(&res) {
                return Ok(res);
            }
        }
    }
    Err(f.new_type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        symbol,
        vt.name,
        wt.name
    )))
}

pub fn binary_op(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: BinOp) -> PyResult {
    binary_op_inner(f, v, w, op, op.symbol())
}

pub fn inplace_binary_op(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: BinOp) -> PyResult {
    let ctx = f.ctx();
    if let Some(inplace) = v.class().mro_find_map(|c| c.slots.binary_inplace(op)) {
        let res = inplace(f, v, w)?;
        if !ctx.is_not_implemented(&res) {
            return Ok(res);
        }
    }
    binary_op_inner(f, v, w, op, op.inplace_symbol())
}

macro_rules! binary_entry {
    ($name:ident, $iname:ident, $op:ident) => {
        pub fn $name(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
            binary_op(f, v, w, BinOp::$op)
        }
        pub fn $iname(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
            inplace_binary_op(f, v, w, BinOp::$op)
        }
    };
}

binary_entry!(add, iadd, Add);
binary_entry!(sub, isub, Sub);
binary_entry!(mul, imul, Mul);
binary_entry!(div, idiv, Div);
binary_entry!(floordiv, ifloordiv, FloorDiv);
binary_entry!(mod_, imod, Mod);
binary_entry!(divmod_, idivmod, DivMod);
binary_entry!(pow, ipow, Pow);
binary_entry!(lshift, ilshift, LShift);
binary_entry!(rshift, irshift, RShift);
binary_entry!(and_, iand, And);
binary_entry!(or_, ior, Or);
binary_entry!(xor, ixor, Xor);

// ---------------------------------------------------------------------------
// unary operations

macro_rules! unary_entry {
    ($name:ident, $field:ident, $symbol:literal) => {
        pub fn $name(f: &Frame, v: &PyObjectRef) -> PyResult {
            match v.class().mro_find_map(|c| c.slots.$field.load()) {
                Some(slot) => slot(f, v),
                None => Err(f.new_type_error(format!(
                    concat!("bad operand type for unary ", $symbol, ": '{}'"),
                    v.class().name
                ))),
            }
        }
    };
}

unary_entry!(neg, neg, "-");
unary_entry!(pos, pos, "+");
unary_entry!(invert, invert, "~");

// ---------------------------------------------------------------------------
// comparison

fn is_numeric(f: &Frame, t: &PyTypeRef) -> bool {
    let types = &f.ctx().types;
    t.issubclass(&types.int_type)
        || t.issubclass(&types.long_type)
        || t.issubclass(&types.float_type)
        || t.issubclass(&types.complex_type)
}

/// The default total order: numbers sort before everything, then type name,
/// then type identity; within a type, object identity.
fn default_cmp(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> Ordering {
    if v.is(w) {
        return Ordering::Equal;
    }
    let vt = v.class();
    let wt = w.class();
    if vt.is(wt) {
        return v.get_id().cmp(&w.get_id());
    }
    let vname = if is_numeric(f, vt) { "" } else { vt.name.as_str() };
    let wname = if is_numeric(f, wt) { "" } else { wt.name.as_str() };
    match vname.cmp(wname) {
        Ordering::Equal => vt.get_id().cmp(&wt.get_id()),
        ord => ord,
    }
}

fn cmp_result_to_ordering(f: &Frame, res: &PyObjectRef) -> PyResult<Ordering> {
    let value = res
        .payload_if_subclass::<PyInt>(f.ctx())
        .map(PyInt::value)
        .ok_or_else(|| f.new_type_error("comparison did not return an int".to_owned()))?;
    Ok(value.cmp(&0))
}

/// Rich comparison with the Python 2 fallback chain; always produces a
/// result.
pub fn rich_compare(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: CmpOp) -> PyResult {
    let ctx = f.ctx();
    let vt = v.class();
    let wt = w.class();
    let w_priority = !vt.is(wt) && wt.issubclass(vt);

    let try_rich = |obj: &PyObjectRef, other: &PyObjectRef, op: CmpOp| -> PyResult<Option<PyObjectRef>> {
        if let Some(slot) = obj.class().mro_find_map(|c| c.slots.richcompare.load()) {
            let res = slot(f, obj, other, op)?;
            if !ctx.is_not_implemented(&res) {
                return Ok(Some(res));
            }
        }
        Ok(None)
    };

    if w_priority {
        if let Some(res) = try_rich(w, v, op.swapped())? {
            return Ok(res);
        }
    }
    if let Some(res) = try_rich(v, w, op)? {
        return Ok(res);
    }
    if !w_priority {
        if let Some(res) = try_rich(w, v, op.swapped())? {
            return Ok(res);
        }
    }

    // the three-way protocol
    if let Some(cmp) = vt.mro_find_map(|c| c.slots.cmp.load()) {
        let res = cmp(f, v, w)?;
        if !ctx.is_not_implemented(&res) {
            let ord = cmp_result_to_ordering(f, &res)?;
            return Ok(ctx.new_bool(op.eval_ord(ord)));
        }
    }
    if let Some(cmp) = wt.mro_find_map(|c| c.slots.cmp.load()) {
        let res = cmp(f, w, v)?;
        if !ctx.is_not_implemented(&res) {
            let ord = cmp_result_to_ordering(f, &res)?.reverse();
            return Ok(ctx.new_bool(op.eval_ord(ord)));
        }
    }

    let ord = default_cmp(f, v, w);
    Ok(ctx.new_bool(op.eval_ord(ord)))
}

macro_rules! compare_entry {
    ($name:ident, $op:ident) => {
        pub fn $name(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
            rich_compare(f, v, w, CmpOp::$op)
        }
    };
}

compare_entry!(lt, Lt);
compare_entry!(le, Le);
compare_entry!(eq, Eq);
compare_entry!(ne, Ne);
compare_entry!(gt, Gt);
compare_entry!(ge, Ge);

pub fn eq_bool(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult<bool> {
    if v.is(w) {
        return Ok(true);
    }
    let res = rich_compare(f, v, w, CmpOp::Eq)?;
    is_true(f, &res)
}

/// A total three-way comparison, the shape `cmp()` and sorting want.
pub fn cmp3(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult<Ordering> {
    if eq_bool(f, v, w)? {
        return Ok(Ordering::Equal);
    }
    if is_true(f, &rich_compare(f, v, w, CmpOp::Lt)?)? {
        return Ok(Ordering::Less);
    }
    Ok(Ordering::Greater)
}

// ---------------------------------------------------------------------------
// object protocol

pub fn is_true(f: &Frame, obj: &PyObjectRef) -> PyResult<bool> {
    if let Some(slot) = obj.class().mro_find_map(|c| c.slots.nonzero.load()) {
        return slot(f, obj);
    }
    if let Some(slot) = obj.class().mro_find_map(|c| c.slots.len.load()) {
        return Ok(slot(f, obj)? != 0);
    }
    Ok(true)
}

pub fn len(f: &Frame, obj: &PyObjectRef) -> PyResult<usize> {
    let slot = obj
        .class()
        .mro_find_map(|c| c.slots.len.load())
        .ok_or_else(|| {
            f.new_type_error(format!("object of type '{}' has no len()", obj.class().name))
        })?;
    slot(f, obj)
}

pub fn hash(f: &Frame, obj: &PyObjectRef) -> PyResult<PyHash> {
    let slot = obj
        .class()
        .mro_find_map(|c| c.slots.hash.load())
        .ok_or_else(|| {
            f.new_type_error(format!("unhashable type: '{}'", obj.class().name))
        })?;
    slot(f, obj)
}

fn expect_string_result(f: &Frame, res: PyObjectRef, method: &str) -> PyResult<String> {
    if let Some(s) = res.payload::<PyStr>() {
        return Ok(s.as_str().to_owned());
    }
    if let Some(u) = res.payload::<PyUnicode>() {
        return Ok(u.as_str().to_owned());
    }
    Err(f.new_type_error(format!(
        "{} returned non-string (type {})",
        method,
        res.class().name
    )))
}

pub fn repr(f: &Frame, obj: &PyObjectRef) -> PyResult {
    let s = repr_str(f, obj)?;
    Ok(f.ctx().new_str(s).into_object())
}

pub fn repr_str(f: &Frame, obj: &PyObjectRef) -> PyResult<String> {
    let slot = obj
        .class()
        .mro_find_map(|c| c.slots.repr.load())
        .unwrap_or_else(|| unreachable!("object provides a repr slot"));
    let res = slot(f, obj)?;
    expect_string_result(f, res, "__repr__")
}

pub fn to_str(f: &Frame, obj: &PyObjectRef) -> PyResult {
    let s = to_str_string(f, obj)?;
    Ok(f.ctx().new_str(s).into_object())
}

pub fn to_str_string(f: &Frame, obj: &PyObjectRef) -> PyResult<String> {
    if let Some(slot) = obj.class().mro_find_map(|c| c.slots.str.load()) {
        let res = slot(f, obj)?;
        return expect_string_result(f, res, "__str__");
    }
    repr_str(f, obj)
}

// ---------------------------------------------------------------------------
// iteration

pub fn iter(f: &Frame, obj: &PyObjectRef) -> PyResult {
    if let Some(slot) = obj.class().mro_find_map(|c| c.slots.iter.load()) {
        return slot(f, obj);
    }
    if obj.class().mro_find_map(|c| c.slots.getitem.load()).is_some() {
        return Ok(PySeqIterator::new(obj.clone())
            .into_ref(f.ctx())
            .into_object());
    }
    Err(f.new_type_error(format!("'{}' object is not iterable", obj.class().name)))
}

pub fn next(f: &Frame, obj: &PyObjectRef) -> PyResult {
    let slot = obj
        .class()
        .mro_find_map(|c| c.slots.iternext.load())
        .ok_or_else(|| {
            f.new_type_error(format!("'{}' object is not an iterator", obj.class().name))
        })?;
    slot(f, obj)
}

pub fn contains(f: &Frame, container: &PyObjectRef, item: &PyObjectRef) -> PyResult<bool> {
    if let Some(slot) = container.class().mro_find_map(|c| c.slots.contains.load()) {
        return slot(f, container, item);
    }
    let mut found = false;
    crate::protocol::for_each(f, container, &mut |elem| {
        if !found && eq_bool(f, &elem, item)? {
            found = true;
        }
        Ok(())
    })?;
    Ok(found)
}

// ---------------------------------------------------------------------------
// items

pub fn get_item(f: &Frame, obj: &PyObjectRef, key: &PyObjectRef) -> PyResult {
    let slot = obj
        .class()
        .mro_find_map(|c| c.slots.getitem.load())
        .ok_or_else(|| {
            f.new_type_error(format!(
                "'{}' object has no attribute '__getitem__'",
                obj.class().name
            ))
        })?;
    slot(f, obj, key)
}

pub fn set_item(
    f: &Frame,
    obj: &PyObjectRef,
    key: &PyObjectRef,
    value: &PyObjectRef,
) -> PyResult<()> {
    let slot = obj
        .class()
        .mro_find_map(|c| c.slots.setitem.load())
        .ok_or_else(|| {
            f.new_type_error(format!(
                "'{}' object does not support item assignment",
                obj.class().name
            ))
        })?;
    slot(f, obj, key, value)
}

pub fn del_item(f: &Frame, obj: &PyObjectRef, key: &PyObjectRef) -> PyResult<()> {
    let slot = obj
        .class()
        .mro_find_map(|c| c.slots.delitem.load())
        .ok_or_else(|| {
            f.new_type_error(format!(
                "'{}' object doesn't support item deletion",
                obj.class().name
            ))
        })?;
    slot(f, obj, key)
}

// ---------------------------------------------------------------------------
// numeric conversion

pub fn index(f: &Frame, obj: &PyObjectRef) -> PyResult<i64> {
    let ctx = f.ctx();
    if let Some(i) = obj.payload_if_subclass::<PyInt>(ctx) {
        return Ok(i.value());
    }
    let slot = obj
        .class()
        .mro_find_map(|c| c.slots.index.load())
        .ok_or_else(|| {
            f.new_type_error(format!(
                "'{}' object cannot be interpreted as an index",
                obj.class().name
            ))
        })?;
    let res = slot(f, obj)?;
    if let Some(i) = res.payload_if_subclass::<PyInt>(ctx) {
        return Ok(i.value());
    }
    if let Some(l) = res.payload_if_subclass::<PyLong>(ctx) {
        return l.to_i64().ok_or_else(|| {
            f.new_overflow_error("cannot fit 'long' into an index-sized integer".to_owned())
        });
    }
    Err(f.new_type_error(format!(
        "__index__ returned non-(int,long) (type {})",
        res.class().name
    )))
}

/// `int(x)` through the conversion slot.
pub fn to_int(f: &Frame, obj: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    if obj.payload_if_subclass::<PyInt>(ctx).is_some()
        || obj.payload_if_subclass::<PyLong>(ctx).is_some()
    {
        return Ok(obj.clone());
    }
    let slot = obj
        .class()
        .mro_find_map(|c| c.slots.int.load())
        .ok_or_else(|| {
            f.new_type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                obj.class().name
            ))
        })?;
    let res = slot(f, obj)?;
    if res.payload_if_subclass::<PyInt>(ctx).is_some()
        || res.payload_if_subclass::<PyLong>(ctx).is_some()
    {
        Ok(res)
    } else {
        Err(f.new_type_error(format!(
            "__int__ returned non-int (type {})",
            res.class().name
        )))
    }
}

pub fn to_int_value(f: &Frame, obj: &PyObjectRef) -> PyResult<i64> {
    let res = to_int(f, obj)?;
    let ctx = f.ctx();
    if let Some(i) = res.payload_if_subclass::<PyInt>(ctx) {
        return Ok(i.value());
    }
    if let Some(l) = res.payload_if_subclass::<PyLong>(ctx) {
        return l.to_i64().ok_or_else(|| {
            f.new_overflow_error("long int too large to convert to int".to_owned())
        });
    }
    unreachable!("to_int returns int or long")
}

// ---------------------------------------------------------------------------
// type tests

pub fn isinstance(f: &Frame, obj: &PyObjectRef, classinfo: &PyObjectRef) -> PyResult<bool> {
    if let Some(cls) = PyTypeRef::new(classinfo.clone()) {
        return Ok(obj.fast_isinstance(&cls));
    }
    if let Some(tuple) = classinfo.payload::<PyTuple>() {
        for entry in tuple.as_slice() {
            if isinstance(f, obj, entry)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    Err(f.new_type_error("classinfo must be a type or tuple of types".to_owned()))
}

pub fn issubclass(f: &Frame, cls: &PyObjectRef, classinfo: &PyObjectRef) -> PyResult<bool> {
    let cls = PyTypeRef::new(cls.clone())
        .ok_or_else(|| f.new_type_error("issubclass() arg 1 must be a class".to_owned()))?;
    if let Some(other) = PyTypeRef::new(classinfo.clone()) {
        return Ok(cls.issubclass(&other));
    }
    if let Some(tuple) = classinfo.payload::<PyTuple>() {
        for entry in tuple.as_slice() {
            if issubclass(f, cls.as_object(), entry)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    Err(f.new_type_error("classinfo must be a type or tuple of types".to_owned()))
}
