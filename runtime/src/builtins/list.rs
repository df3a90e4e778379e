//! The mutable sequence. Element storage sits behind a reader-writer lock;
//! readers may inspect the slice in place and every mutation takes the
//! writer side.

use pyrite_common::hash::PyHash;
use pyrite_common::lock::{PyRwLock, PyRwLockReadGuard};

use crate::builtins::int::PyInt;
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
pub struct PyList {
    elements: PyRwLock<Vec<PyObjectRef>>,
}

pub type PyListRef = PyRef<PyList>;

impl PyPayload for PyList {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.list_type
    }
}

impl PyList {
    pub fn new(elements: Vec<PyObjectRef>) -> Self {
        PyList {
            elements: PyRwLock::new(elements),
        }
    }

    pub fn borrow_elements(&self) -> PyRwLockReadGuard<'_, Vec<PyObjectRef>> {
        self.elements.read()
    }

    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<PyObjectRef> {
        self.elements.read().clone()
    }

    pub fn append(&self, item: PyObjectRef) {
        self.elements.write().push(item);
    }
}

fn list_payload<'a>(f: &Frame, zelf: &'a PyObjectRef) -> PyResult<&'a PyList> {
    zelf.payload_if_subclass::<PyList>(f.ctx())
        .ok_or_else(|| f.new_type_error("expected a list".to_owned()))
}

fn list_len(f: &Frame, zelf: &PyObjectRef) -> PyResult<usize> {
    Ok(list_payload(f, zelf)?.len())
}

fn list_getitem(f: &Frame, zelf: &PyObjectRef, key: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    let list = list_payload(f, zelf)?;
    if let Some(slice) = key.payload::<PySlice>() {
        let snapshot = list.snapshot();
        let indices = slice.indices(f, snapshot.len())?;
        let mut out = Vec::with_capacity(indices.len);
        let mut i = indices.start;
        while i != indices.term() {
            out.push(snapshot[i as usize].clone());
            i += indices.step;
        }
        return Ok(ctx.new_list(out).into_object());
    }
    let idx = ops::index(f, key)?;
    let elements = list.borrow_elements();
    let pos = protocol::normalize_index(idx, elements.len())
        .ok_or_else(|| f.new_index_error("list index out of range".to_owned()))?;
    Ok(elements[pos].clone())
}

fn list_setitem(
    f: &Frame,
    zelf: &PyObjectRef,
    key: &PyObjectRef,
    value: &PyObjectRef,
) -> PyResult<()> {
    let list = list_payload(f, zelf)?;
    if let Some(slice) = key.payload::<PySlice>() {
        let replacement: Vec<PyObjectRef> =
            protocol::apply(f, value, |items, _| Ok(items.to_vec()))?;
        let len = list.len();
        let indices = slice.indices(f, len)?;
        let mut elements = list.elements.write();
        if indices.step == 1 {
            let start = indices.start as usize;
            let stop = (indices.start + indices.len as i64) as usize;
            elements.splice(start..stop, replacement);
            return Ok(());
        }
        if replacement.len() != indices.len {
            return Err(f.new_value_error(format!(
                "attempt to assign sequence of size {} to extended slice of size {}",
                replacement.len(),
                indices.len
            )));
        }
        let mut i = indices.start;
        for item in replacement {
            elements[i as usize] = item;
            i += indices.step;
        }
        return Ok(());
    }
    let idx = ops::index(f, key)?;
    let mut elements = list.elements.write();
    let pos = protocol::normalize_index(idx, elements.len())
        .ok_or_else(|| f.new_index_error("list assignment index out of range".to_owned()))?;
    elements[pos] = value.clone();
    Ok(())
}

fn list_delitem(f: &Frame, zelf: &PyObjectRef, key: &PyObjectRef) -> PyResult<()> {
    let list = list_payload(f, zelf)?;
    if let Some(slice) = key.payload::<PySlice>() {
        let len = list.len();
        let indices = slice.indices(f, len)?;
        let mut positions: Vec<usize> = Vec::with_capacity(indices.len);
        let mut i = indices.start;
        while i != indices.term() {
            positions.push(i as usize);
            i += indices.step;
        }
        positions.sort_unstable();
        let mut elements = list.elements.write();
        for pos in positions.into_iter().rev() {
            elements.remove(pos);
        }
        return Ok(());
    }
    let idx = ops::index(f, key)?;
    let mut elements = list.elements.write();
    let pos = protocol::normalize_index(idx, elements.len())
        .ok_or_else(|| f.new_index_error("list assignment index out of range".to_owned()))?;
    elements.remove(pos);
    Ok(())
}

fn list_add(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    let a = list_payload(f, v)?.snapshot();
    match w.payload_if_subclass::<PyList>(ctx) {
        Some(b) => {
            let b = b.snapshot();
            protocol::checked_add(f, a.len(), b.len())?;
            let mut out = a;
            out.extend(b);
            Ok(ctx.new_list(out).into_object())
        }
        None => Err(f.new_type_error(format!(
            "can only concatenate list (not \"{}\") to list",
            w.class().name
        ))),
    }
}

fn list_iadd(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    let list = list_payload(f, v)?;
    let items: Vec<PyObjectRef> = protocol::apply(f, w, |items, _| Ok(items.to_vec()))?;
    list.elements.write().extend(items);
    Ok(v.clone())
}

fn list_mul(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    let elements = list_payload(f, v)?.snapshot();
    let count = match w.payload_if_subclass::<PyInt>(ctx) {
        Some(i) => i.value(),
        None => return Ok(ctx.not_implemented()),
    };
    let out = protocol::seq_mul(f, &elements, count)?;
    Ok(ctx.new_list(out).into_object())
}

fn list_imul(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    let list = list_payload(f, v)?;
    let count = match w.payload_if_subclass::<PyInt>(ctx) {
        Some(i) => i.value(),
        None => return Ok(ctx.not_implemented()),
    };
    let current = list.snapshot();
    let out = protocol::seq_mul(f, &current, count)?;
    *list.elements.write() = out;
    Ok(v.clone())
}

fn list_contains(f: &Frame, zelf: &PyObjectRef, item: &PyObjectRef) -> PyResult<bool> {
    let snapshot = list_payload(f, zelf)?.snapshot();
    for element in &snapshot {
        if ops::eq_bool(f, element, item)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn list_richcompare(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: CmpOp) -> PyResult {
    let ctx = f.ctx();
    let a = match v.payload_if_subclass::<PyList>(ctx) {
        Some(l) => l.snapshot(),
        None => return Ok(ctx.not_implemented()),
    };
    let b = match w.payload_if_subclass::<PyList>(ctx) {
        Some(l) => l.snapshot(),
        None => return Ok(ctx.not_implemented()),
    };
    Ok(ctx.new_bool(protocol::seq_richcompare(f, &a, &b, op)?))
}

fn list_hash(f: &Frame, _zelf: &PyObjectRef) -> PyResult<PyHash> {
    Err(f.new_type_error("unhashable type: 'list'".to_owned()))
}

fn list_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let snapshot = list_payload(f, zelf)?.snapshot();
    let s = protocol::seq_repr(f, zelf, "[", "]", &snapshot, false)?;
    Ok(f.ctx().new_str(s).into_object())
}

fn list_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let [iterable] = std::mem::take(args).bind_range::<0, 1>(f, "list")?;
    let mut elements = Vec::new();
    if let Some(obj) = iterable {
        protocol::for_each(f, &obj, &mut |item| {
            elements.push(item);
            Ok(())
        })?;
    }
    PyList::new(elements)
        .into_ref_with_type(f, cls.clone())
        .map(PyRef::into_object)
}

/// Stable merge sort driven by a fallible comparator; on error the list is
/// left in its pre-sort state.
fn merge_sort(
    f: &Frame,
    mut items: Vec<PyObjectRef>,
    less: &dyn Fn(&Frame, &PyObjectRef, &PyObjectRef) -> PyResult<bool>,
) -> PyResult<Vec<PyObjectRef>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(f, items, less)?;
    let right = merge_sort(f, right, less)?;
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut li = left.into_iter();
    let mut ri = right.into_iter();
    let mut lcur = li.next();
    let mut rcur = ri.next();
    loop {
        match (lcur.take(), rcur.take()) {
            // stability: take from the left unless the right is strictly less
            (Some(l), Some(r)) => {
                if less(f, &r, &l)? {
                    out.push(r);
                    lcur = Some(l);
                    rcur = ri.next();
                } else {
                    out.push(l);
                    lcur = li.next();
                    rcur = Some(r);
                }
            }
            (Some(l), None) => {
                out.push(l);
                out.extend(li);
                break;
            }
            (None, Some(r)) => {
                out.push(r);
                out.extend(ri);
                break;
            }
            (None, None) => break,
        }
    }
    Ok(out)
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.list_type;
    t.slots.len.store(Some(list_len));
    t.slots.getitem.store(Some(list_getitem));
    t.slots.setitem.store(Some(list_setitem));
    t.slots.delitem.store(Some(list_delitem));
    t.slots.set_binary(BinOp::Add, list_add);
    t.slots.set_binary_inplace(BinOp::Add, list_iadd);
    t.slots.set_binary(BinOp::Mul, list_mul);
    t.slots.set_binary_reflected(BinOp::Mul, list_mul);
    t.slots.set_binary_inplace(BinOp::Mul, list_imul);
    t.slots.contains.store(Some(list_contains));
    t.slots.richcompare.store(Some(list_richcompare));
    t.slots.hash.store(Some(list_hash));
    t.slots.repr.store(Some(list_repr));
    t.slots.new.store(Some(list_new));

    t.set_str_attr(
        "append",
        ctx.new_builtin_func("append", |f, args| {
            let [zelf, item] = args.bind_exact::<2>(f, "append")?;
            list_payload(f, &zelf)?.append(item);
            Ok(f.ctx().none())
        }),
    );
    t.set_str_attr(
        "extend",
        ctx.new_builtin_func("extend", |f, args| {
            let [zelf, iterable] = args.bind_exact::<2>(f, "extend")?;
            list_iadd(f, &zelf, &iterable)?;
            Ok(f.ctx().none())
        }),
    );
    t.set_str_attr(
        "insert",
        ctx.new_builtin_func("insert", |f, args| {
            let [zelf, index, item] = args.bind_exact::<3>(f, "insert")?;
            let list = list_payload(f, &zelf)?;
            let idx = ops::index(f, &index)?;
            let mut elements = list.elements.write();
            let len = elements.len() as i64;
            let pos = if idx < 0 {
                (idx + len).max(0)
            } else {
                idx.min(len)
            } as usize;
            elements.insert(pos, item);
            Ok(f.ctx().none())
        }),
    );
    t.set_str_attr(
        "pop",
        ctx.new_builtin_func("pop", |f, args| {
            let [zelf, index] = args.bind_range::<1, 2>(f, "pop")?;
            let zelf = zelf.unwrap_or_else(|| unreachable!("receiver bound"));
            let list = list_payload(f, &zelf)?;
            let mut elements = list.elements.write();
            if elements.is_empty() {
                return Err(f.new_index_error("pop from empty list".to_owned()));
            }
            let pos = match index {
                None => elements.len() - 1,
                Some(i) => {
                    let idx = ops::index(f, &i)?;
                    protocol::normalize_index(idx, elements.len())
                        .ok_or_else(|| f.new_index_error("pop index out of range".to_owned()))?
                }
            };
            Ok(elements.remove(pos))
        }),
    );
    t.set_str_attr(
        "remove",
        ctx.new_builtin_func("remove", |f, args| {
            let [zelf, item] = args.bind_exact::<2>(f, "remove")?;
            let list = list_payload(f, &zelf)?;
            let snapshot = list.snapshot();
            for (i, element) in snapshot.iter().enumerate() {
                if ops::eq_bool(f, element, &item)? {
                    list.elements.write().remove(i);
                    return Ok(f.ctx().none());
                }
            }
            Err(f.new_value_error("list.remove(x): x not in list".to_owned()))
        }),
    );
    t.set_str_attr(
        "index",
        ctx.new_builtin_func("index", |f, args| {
            let [zelf, item] = args.bind_exact::<2>(f, "index")?;
            let snapshot = list_payload(f, &zelf)?.snapshot();
            for (i, element) in snapshot.iter().enumerate() {
                if ops::eq_bool(f, element, &item)? {
                    return Ok(f.ctx().new_int(i as i64).into_object());
                }
            }
            Err(f.new_value_error("list.index(x): x not in list".to_owned()))
        }),
    );
    t.set_str_attr(
        "count",
        ctx.new_builtin_func("count", |f, args| {
            let [zelf, item] = args.bind_exact::<2>(f, "count")?;
            let snapshot = list_payload(f, &zelf)?.snapshot();
            let mut n = 0i64;
            for element in &snapshot {
                if ops::eq_bool(f, element, &item)? {
                    n += 1;
                }
            }
            Ok(f.ctx().new_int(n).into_object())
        }),
    );
    t.set_str_attr(
        "reverse",
        ctx.new_builtin_func("reverse", |f, args| {
            let [zelf] = args.bind_exact::<1>(f, "reverse")?;
            list_payload(f, &zelf)?.elements.write().reverse();
            Ok(f.ctx().none())
        }),
    );
    t.set_str_attr(
        "sort",
        ctx.new_builtin_func("sort", |f, args| {
            let [zelf, cmp] = args.bind_range::<1, 2>(f, "sort")?;
            let zelf = zelf.unwrap_or_else(|| unreachable!("receiver bound"));
            let list = list_payload(f, &zelf)?;
            let items = list.snapshot();
            let sorted = match cmp {
                None => merge_sort(f, items, &|f, a, b| {
                    Ok(ops::cmp3(f, a, b)? == std::cmp::Ordering::Less)
                })?,
                Some(cmp) => {
                    let by_cmp = move |f: &Frame, a: &PyObjectRef, b: &PyObjectRef| {
                        let res =
                            ops::invoke(f, &cmp, vec![a.clone(), b.clone()].into())?;
                        Ok(crate::ops::to_int_value(f, &res)? < 0)
                    };
                    merge_sort(f, items, &by_cmp)?
                }
            };
            *list.elements.write() = sorted;
            Ok(f.ctx().none())
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;

    fn make_list(f: &Frame, values: &[i64]) -> PyObjectRef {
        let ctx = f.ctx();
        ctx.new_list(
            values
                .iter()
                .map(|v| ctx.new_int(*v).into_object())
                .collect(),
        )
        .into_object()
    }

    fn as_ints(list: &PyObjectRef) -> Vec<i64> {
        list.payload::<PyList>()
            .unwrap()
            .snapshot()
            .iter()
            .map(|o| o.payload::<PyInt>().unwrap().value())
            .collect()
    }

    #[test]
    fn mutation_and_indexing() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let l = make_list(&f, &[10, 20, 30]);
        let key = ctx.new_int(-1).into_object();
        let last = ops::get_item(&f, &l, &key).unwrap();
        assert_eq!(last.payload::<PyInt>().unwrap().value(), 30);

        ops::set_item(&f, &l, &key, &ctx.new_int(99).into_object()).unwrap();
        assert_eq!(as_ints(&l), vec![10, 20, 99]);

        ops::del_item(&f, &l, &ctx.new_int(0).into_object()).unwrap();
        assert_eq!(as_ints(&l), vec![20, 99]);
    }

    #[test]
    fn slice_assignment() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let l = make_list(&f, &[1, 2, 3, 4]);
        let sl = ctx
            .new_slice(
                Some(ctx.new_int(1).into_object()),
                Some(ctx.new_int(3).into_object()),
                None,
            )
            .into_object();
        let replacement = make_list(&f, &[9]);
        ops::set_item(&f, &l, &sl, &replacement).unwrap();
        assert_eq!(as_ints(&l), vec![1, 9, 4]);
    }

    #[test]
    fn sort_default_order() {
        let f = Frame::new_root(Context::global());
        let l = make_list(&f, &[3, 1, 2]);
        let sort = ops::get_attr_str(&f, &l, "sort").unwrap();
        ops::invoke(&f, &sort, FuncArgs::default()).unwrap();
        assert_eq!(as_ints(&l), vec![1, 2, 3]);
    }

    #[test]
    fn unhashable() {
        let f = Frame::new_root(Context::global());
        let l = make_list(&f, &[1]);
        let err = ops::hash(&f, &l).unwrap_err();
        assert_eq!(err.message(), "unhashable type: 'list'");
    }

    #[test]
    fn recursive_repr() {
        let f = Frame::new_root(Context::global());
        let l = make_list(&f, &[]);
        l.payload::<PyList>().unwrap().append(l.clone());
        assert_eq!(ops::repr_str(&f, &l).unwrap(), "[[...]]");
    }
}
