use pyrite_common::hash::PyHash;

use crate::builtins::slice::PySlice;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::protocol;
use crate::types::slot::{BinOp, CmpOp};
use crate::{ops, PyResult};

#[derive(Debug)]
pub struct PyTuple {
    elements: Vec<PyObjectRef>,
}

pub type PyTupleRef = PyRef<PyTuple>;

impl PyPayload for PyTuple {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.tuple_type
    }
}

impl PyTuple {
    pub fn new(elements: Vec<PyObjectRef>) -> Self {
        PyTuple { elements }
    }

    pub fn as_slice(&self) -> &[PyObjectRef] {
        &self.elements
    }
}

fn tuple_elements<'a>(f: &Frame, zelf: &'a PyObjectRef) -> PyResult<&'a [PyObjectRef]> {
    zelf.payload_if_subclass::<PyTuple>(f.ctx())
        .map(PyTuple::as_slice)
        .ok_or_else(|| f.new_type_error("expected a tuple".to_owned()))
}

fn tuple_len(f: &Frame, zelf: &PyObjectRef) -> PyResult<usize> {
    Ok(tuple_elements(f, zelf)?.len())
}

fn tuple_getitem(f: &Frame, zelf: &PyObjectRef, key: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    let elements = tuple_elements(f, zelf)?;
    if let Some(slice) = key.payload::<PySlice>() {
        let indices = slice.indices(f, elements.len())?;
        let mut out = Vec::with_capacity(indices.len);
        let mut i = indices.start;
        while i != indices.term() {
            out.push(elements[i as usize].clone());
            i += indices.step;
        }
        return Ok(ctx.new_tuple(out).into_object());
    }
    let idx = ops::index(f, key)?;
    let pos = protocol::normalize_index(idx, elements.len())
        .ok_or_else(|| f.new_index_error("tuple index out of range".to_owned()))?;
    Ok(elements[pos].clone())
}

fn tuple_add(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    let a = tuple_elements(f, v)?;
    match w.payload_if_subclass::<PyTuple>(ctx) {
        Some(b) => {
            protocol::checked_add(f, a.len(), b.as_slice().len())?;
            let mut out = a.to_vec();
            out.extend_from_slice(b.as_slice());
            Ok(ctx.new_tuple(out).into_object())
        }
        None => Err(f.new_type_error(format!(
            "can only concatenate tuple (not \"{}\") to tuple",
            w.class().name
        ))),
    }
}

fn tuple_mul(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    let elements = tuple_elements(f, v)?;
    let count = match w.payload_if_subclass::<crate::builtins::int::PyInt>(ctx) {
        Some(i) => i.value(),
        None => return Ok(ctx.not_implemented()),
    };
    let out = protocol::seq_mul(f, elements, count)?;
    Ok(ctx.new_tuple(out).into_object())
}

fn tuple_contains(f: &Frame, zelf: &PyObjectRef, item: &PyObjectRef) -> PyResult<bool> {
    let elements = tuple_elements(f, zelf)?.to_vec();
    for element in &elements {
        if ops::eq_bool(f, element, item)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn tuple_richcompare(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: CmpOp) -> PyResult {
    let ctx = f.ctx();
    let a = match v.payload_if_subclass::<PyTuple>(ctx) {
        Some(t) => t.as_slice().to_vec(),
        None => return Ok(ctx.not_implemented()),
    };
    let b = match w.payload_if_subclass::<PyTuple>(ctx) {
        Some(t) => t.as_slice().to_vec(),
        None => return Ok(ctx.not_implemented()),
    };
    Ok(ctx.new_bool(protocol::seq_richcompare(f, &a, &b, op)?))
}

fn tuple_hash(f: &Frame, zelf: &PyObjectRef) -> PyResult<PyHash> {
    let elements = tuple_elements(f, zelf)?.to_vec();
    f.ctx()
        .hash_secret
        .hash_iter(elements.iter(), |e| ops::hash(f, e))
}

fn tuple_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let elements = tuple_elements(f, zelf)?.to_vec();
    let s = protocol::seq_repr(f, zelf, "(", ")", &elements, true)?;
    Ok(f.ctx().new_str(s).into_object())
}

fn tuple_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let ctx = f.ctx();
    let [iterable] = std::mem::take(args).bind_range::<0, 1>(f, "tuple")?;
    let mut elements = Vec::new();
    if let Some(obj) = iterable {
        protocol::for_each(f, &obj, &mut |item| {
            elements.push(item);
            Ok(())
        })?;
    }
    if cls.is(&ctx.types.tuple_type) {
        Ok(ctx.new_tuple(elements).into_object())
    } else {
        PyTuple::new(elements)
            .into_ref_with_type(f, cls.clone())
            .map(PyRef::into_object)
    }
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.tuple_type;
    t.slots.len.store(Some(tuple_len));
    t.slots.getitem.store(Some(tuple_getitem));
    t.slots.set_binary(BinOp::Add, tuple_add);
    t.slots.set_binary(BinOp::Mul, tuple_mul);
    t.slots.set_binary_reflected(BinOp::Mul, tuple_mul);
    t.slots.contains.store(Some(tuple_contains));
    t.slots.richcompare.store(Some(tuple_richcompare));
    t.slots.hash.store(Some(tuple_hash));
    t.slots.repr.store(Some(tuple_repr));
    t.slots.new.store(Some(tuple_new));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;

    #[test]
    fn repr_trailing_comma() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let one = ctx.new_tuple(vec![ctx.new_int(1).into_object()]).into_object();
        assert_eq!(ops::repr_str(&f, &one).unwrap(), "(1,)");
        let two = ctx
            .new_tuple(vec![
                ctx.new_int(1).into_object(),
                ctx.new_int(2).into_object(),
            ])
            .into_object();
        assert_eq!(ops::repr_str(&f, &two).unwrap(), "(1, 2)");
    }

    #[test]
    fn lexicographic_comparison() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let a = ctx
            .new_tuple(vec![ctx.new_int(1).into_object(), ctx.new_int(2).into_object()])
            .into_object();
        let b = ctx
            .new_tuple(vec![ctx.new_int(1).into_object(), ctx.new_int(3).into_object()])
            .into_object();
        assert!(ops::is_true(&f, &ops::lt(&f, &a, &b).unwrap()).unwrap());
        assert!(!ops::eq_bool(&f, &a, &b).unwrap());
    }

    #[test]
    fn hashable_when_elements_are() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let a = ctx
            .new_tuple(vec![ctx.new_int(1).into_object(), ctx.new_str("x").into_object()])
            .into_object();
        let b = ctx
            .new_tuple(vec![ctx.new_int(1).into_object(), ctx.new_str("x").into_object()])
            .into_object();
        assert_eq!(ops::hash(&f, &a).unwrap(), ops::hash(&f, &b).unwrap());
    }
}
