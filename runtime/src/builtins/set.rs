//! `set` and `frozenset`, sharing the dict's bucket table with unit values.

use crossbeam_utils::atomic::AtomicCell;
use pyrite_common::hash::{mod_int, PyHash};
use pyrite_common::lock::PyRwLock;

use crate::builtins::dict::{probe, Table};
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::{Frame, ReprGuard};
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::protocol;
use crate::types::slot::{BinOp, CmpOp};
use crate::{ops, PyResult};

#[derive(Debug, Default)]
pub(crate) struct SetInner {
    table: PyRwLock<Table>,
}

impl SetInner {
    fn len(&self) -> usize {
        self.table.read().len()
    }

    fn elements(&self) -> Vec<PyObjectRef> {
        self.table
            .read()
            .flatten()
            .into_iter()
            .map(|(k, _)| k)
            .collect()
    }

    fn contains(&self, f: &Frame, item: &PyObjectRef) -> PyResult<bool> {
        let hash = ops::hash(f, item)?;
        let bucket = self.table.read().bucket(hash);
        Ok(probe(f, &bucket, item)?.is_some())
    }

    fn add(&self, f: &Frame, item: PyObjectRef) -> PyResult<()> {
        let hash = ops::hash(f, &item)?;
        let bucket = self.table.read().bucket(hash);
        if probe(f, &bucket, &item)?.is_some() {
            return Ok(());
        }
        let mut table = self.table.write();
        let none = f.ctx().none();
        table.buckets_mut().entry(hash).or_default().push((item, none));
        table.bump_len();
        Ok(())
    }

    fn discard(&self, f: &Frame, item: &PyObjectRef) -> PyResult<bool> {
        let hash = ops::hash(f, item)?;
        let bucket = self.table.read().bucket(hash);
        let matched = match probe(f, &bucket, item)? {
            Some(k) => k,
            None => return Ok(false),
        };
        let mut table = self.table.write();
        if let Some(bucket) = table.buckets_mut().get_mut(&hash) {
            let before = bucket.len();
            bucket.retain(|(k, _)| !k.is(&matched));
            if bucket.len() < before {
                table.drop_len();
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[derive(Debug, Default)]
pub struct PySet {
    inner: SetInner,
}

#[derive(Debug, Default)]
pub struct PyFrozenSet {
    inner: SetInner,
    hash: AtomicCell<Option<PyHash>>,
}

impl PyPayload for PySet {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.set_type
    }
}

impl PyPayload for PyFrozenSet {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.frozenset_type
    }
}

impl PySet {
    pub fn new() -> Self {
        PySet::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&self, f: &Frame, item: PyObjectRef) -> PyResult<()> {
        self.inner.add(f, item)
    }

    pub fn elements(&self) -> Vec<PyObjectRef> {
        self.inner.elements()
    }
}

impl PyFrozenSet {
    pub fn new() -> Self {
        PyFrozenSet::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn elements(&self) -> Vec<PyObjectRef> {
        self.inner.elements()
    }

    pub(crate) fn fill(&self, f: &Frame, items: Vec<PyObjectRef>) -> PyResult<()> {
        for item in items {
            self.inner.add(f, item)?;
        }
        Ok(())
    }
}

fn set_inner<'a>(f: &Frame, obj: &'a PyObjectRef) -> PyResult<&'a SetInner> {
    let ctx = f.ctx();
    if let Some(s) = obj.payload_if_subclass::<PySet>(ctx) {
        return Ok(&s.inner);
    }
    if let Some(s) = obj.payload_if_subclass::<PyFrozenSet>(ctx) {
        return Ok(&s.inner);
    }
    Err(f.new_type_error(format!("expected a set, got '{}'", obj.class().name)))
}

fn either_set_inner<'a>(ctx: &Context, obj: &'a PyObjectRef) -> Option<&'a SetInner> {
    if let Some(s) = obj.payload_if_subclass::<PySet>(ctx) {
        return Some(&s.inner);
    }
    obj.payload_if_subclass::<PyFrozenSet>(ctx).map(|s| &s.inner)
}

fn set_len(f: &Frame, zelf: &PyObjectRef) -> PyResult<usize> {
    Ok(set_inner(f, zelf)?.len())
}

fn set_contains(f: &Frame, zelf: &PyObjectRef, item: &PyObjectRef) -> PyResult<bool> {
    set_inner(f, zelf)?.contains(f, item)
}

fn set_iter(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let elements = set_inner(f, zelf)?.elements();
    let list = f.ctx().new_list(elements).into_object();
    ops::iter(f, &list)
}

fn same_elements(f: &Frame, a: &SetInner, b: &SetInner) -> PyResult<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for item in a.elements() {
        if !b.contains(f, &item)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn set_richcompare(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: CmpOp) -> PyResult {
    let ctx = f.ctx();
    if !matches!(op, CmpOp::Eq | CmpOp::Ne) {
        return Ok(ctx.not_implemented());
    }
    let (a, b) = match (either_set_inner(ctx, v), either_set_inner(ctx, w)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(ctx.not_implemented()),
    };
    let eq = same_elements(f, a, b)?;
    Ok(ctx.new_bool(eq == (op == CmpOp::Eq)))
}

fn set_repr_with(f: &Frame, zelf: &PyObjectRef, name: &str) -> PyResult {
    let ctx = f.ctx();
    let guard = match ReprGuard::enter(f, zelf) {
        Some(guard) => guard,
        None => return Ok(ctx.new_str(format!("{}(...)", name)).into_object()),
    };
    let mut parts = Vec::new();
    for item in set_inner(f, zelf)?.elements() {
        parts.push(ops::repr_str(f, &item)?);
    }
    drop(guard);
    Ok(ctx
        .new_str(format!("{}([{}])", name, parts.join(", ")))
        .into_object())
}

fn set_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    set_repr_with(f, zelf, "set")
}

fn frozenset_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    set_repr_with(f, zelf, "frozenset")
}

fn set_hash(f: &Frame, _zelf: &PyObjectRef) -> PyResult<PyHash> {
    Err(f.new_type_error("unhashable type: 'set'".to_owned()))
}

fn frozenset_hash(f: &Frame, zelf: &PyObjectRef) -> PyResult<PyHash> {
    let fs = zelf
        .payload_if_subclass::<PyFrozenSet>(f.ctx())
        .ok_or_else(|| f.new_type_error("expected a frozenset".to_owned()))?;
    if let Some(h) = fs.hash.load() {
        return Ok(h);
    }
    // order independent: xor the element hashes
    let mut acc: PyHash = 0;
    for item in fs.elements() {
        acc ^= ops::hash(f, &item)?;
    }
    let h = mod_int(acc);
    fs.hash.store(Some(h));
    Ok(h)
}

macro_rules! set_binop {
    ($name:ident, $keep_a:expr, $keep_b:expr) => {
        fn $name(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
            let ctx = f.ctx();
            let (a, b) = match (either_set_inner(ctx, v), either_set_inner(ctx, w)) {
                (Some(a), Some(b)) => (a, b),
                _ => return Ok(ctx.not_implemented()),
            };
            let out = ctx.new_set();
            let keep_a: fn(bool) -> bool = $keep_a;
            let keep_b: fn(bool) -> bool = $keep_b;
            for item in a.elements() {
                if keep_a(b.contains(f, &item)?) {
                    out.add(f, item)?;
                }
            }
            for item in b.elements() {
                if keep_b(a.contains(f, &item)?) {
                    out.add(f, item)?;
                }
            }
            Ok(out.into_object())
        }
    };
}

// keep an element of a (resp. b) given its membership in the other operand
set_binop!(set_and, |in_b| in_b, |_| false);
set_binop!(set_or, |_| true, |_| true);
set_binop!(set_sub, |in_b| !in_b, |_| false);
set_binop!(set_xor, |in_b| !in_b, |in_a| !in_a);

fn collect_iterable(f: &Frame, iterable: Option<PyObjectRef>) -> PyResult<Vec<PyObjectRef>> {
    let mut items = Vec::new();
    if let Some(obj) = iterable {
        protocol::for_each(f, &obj, &mut |item| {
            items.push(item);
            Ok(())
        })?;
    }
    Ok(items)
}

fn set_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let [iterable] = std::mem::take(args).bind_range::<0, 1>(f, "set")?;
    let items = collect_iterable(f, iterable)?;
    let set = PySet::new().into_ref_with_type(f, cls.clone())?;
    for item in items {
        set.add(f, item)?;
    }
    Ok(set.into_object())
}

fn frozenset_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let [iterable] = std::mem::take(args).bind_range::<0, 1>(f, "frozenset")?;
    let items = collect_iterable(f, iterable)?;
    let set = PyFrozenSet::new().into_ref_with_type(f, cls.clone())?;
    set.fill(f, items)?;
    Ok(set.into_object())
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.set_type;
    t.slots.len.store(Some(set_len));
    t.slots.contains.store(Some(set_contains));
    t.slots.iter.store(Some(set_iter));
    t.slots.richcompare.store(Some(set_richcompare));
    t.slots.repr.store(Some(set_repr));
    t.slots.hash.store(Some(set_hash));
    t.slots.new.store(Some(set_new));
    t.slots.set_binary(BinOp::And, set_and);
    t.slots.set_binary(BinOp::Or, set_or);
    t.slots.set_binary(BinOp::Sub, set_sub);
    t.slots.set_binary(BinOp::Xor, set_xor);

    t.set_str_attr(
        "add",
        ctx.new_builtin_func("add", |f, args| {
            let [zelf, item] = args.bind_exact::<2>(f, "add")?;
            set_inner(f, &zelf)?.add(f, item)?;
            Ok(f.ctx().none())
        }),
    );
    t.set_str_attr(
        "discard",
        ctx.new_builtin_func("discard", |f, args| {
            let [zelf, item] = args.bind_exact::<2>(f, "discard")?;
            set_inner(f, &zelf)?.discard(f, &item)?;
            Ok(f.ctx().none())
        }),
    );
    t.set_str_attr(
        "remove",
        ctx.new_builtin_func("remove", |f, args| {
            let [zelf, item] = args.bind_exact::<2>(f, "remove")?;
            if set_inner(f, &zelf)?.discard(f, &item)? {
                Ok(f.ctx().none())
            } else {
                Err(f.new_key_error(item))
            }
        }),
    );

    let fs = &ctx.types.frozenset_type;
    fs.slots.len.store(Some(set_len));
    fs.slots.contains.store(Some(set_contains));
    fs.slots.iter.store(Some(set_iter));
    fs.slots.richcompare.store(Some(set_richcompare));
    fs.slots.repr.store(Some(frozenset_repr));
    fs.slots.hash.store(Some(frozenset_hash));
    fs.slots.new.store(Some(frozenset_new));
    fs.slots.set_binary(BinOp::And, set_and);
    fs.slots.set_binary(BinOp::Or, set_or);
    fs.slots.set_binary(BinOp::Sub, set_sub);
    fs.slots.set_binary(BinOp::Xor, set_xor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;

    #[test]
    fn membership_and_dedup() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let s = ctx.new_set();
        s.add(&f, ctx.new_int(1).into_object()).unwrap();
        s.add(&f, ctx.new_int(1).into_object()).unwrap();
        s.add(&f, ctx.new_int(2).into_object()).unwrap();
        assert_eq!(s.len(), 2);
        assert!(ops::contains(&f, s.as_object(), &ctx.new_int(1).into_object()).unwrap());
        assert!(!ops::contains(&f, s.as_object(), &ctx.new_int(3).into_object()).unwrap());
    }

    #[test]
    fn set_operations() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let a = ctx.new_set();
        let b = ctx.new_set();
        for v in [1, 2, 3] {
            a.add(&f, ctx.new_int(v).into_object()).unwrap();
        }
        for v in [2, 3, 4] {
            b.add(&f, ctx.new_int(v).into_object()).unwrap();
        }
        let and = ops::and_(&f, a.as_object(), b.as_object()).unwrap();
        assert_eq!(and.payload::<PySet>().unwrap().len(), 2);
        let or = ops::or_(&f, a.as_object(), b.as_object()).unwrap();
        assert_eq!(or.payload::<PySet>().unwrap().len(), 4);
        let sub = ops::sub(&f, a.as_object(), b.as_object()).unwrap();
        assert_eq!(sub.payload::<PySet>().unwrap().len(), 1);
        let xor = ops::xor(&f, a.as_object(), b.as_object()).unwrap();
        assert_eq!(xor.payload::<PySet>().unwrap().len(), 2);
    }

    #[test]
    fn frozenset_is_hashable() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let a = ctx.new_frozenset();
        a.fill(&f, vec![ctx.new_int(1).into_object()]).unwrap();
        let b = ctx.new_frozenset();
        b.fill(&f, vec![ctx.new_int(1).into_object()]).unwrap();
        assert_eq!(
            ops::hash(&f, a.as_object()).unwrap(),
            ops::hash(&f, b.as_object()).unwrap()
        );
        let s = ctx.new_set().into_object();
        assert!(ops::hash(&f, &s).is_err());
    }
}
