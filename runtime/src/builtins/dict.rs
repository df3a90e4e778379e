//! The mapping type. A bucket table keyed by Python hash, guarded by a
//! per-dict reader-writer lock. Equality probes run outside the lock, since
//! a user `__eq__` may re-enter the dict.

use ahash::AHashMap;
use pyrite_common::hash::PyHash;
use pyrite_common::lock::PyRwLock;

use crate::builtins::str::PyStr;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::{Frame, ReprGuard};
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::protocol;
use crate::types::slot::CmpOp;
use crate::{ops, PyResult};

#[derive(Debug, Default)]
pub(crate) struct Table {
    buckets: AHashMap<PyHash, Vec<(PyObjectRef, PyObjectRef)>>,
    len: usize,
}

impl Table {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn bucket(&self, hash: PyHash) -> Vec<(PyObjectRef, PyObjectRef)> {
        self.buckets.get(&hash).cloned().unwrap_or_default()
    }

    pub(crate) fn flatten(&self) -> Vec<(PyObjectRef, PyObjectRef)> {
        self.buckets.values().flatten().cloned().collect()
    }

    pub(crate) fn buckets_mut(
        &mut self,
    ) -> &mut AHashMap<PyHash, Vec<(PyObjectRef, PyObjectRef)>> {
        &mut self.buckets
    }

    pub(crate) fn bump_len(&mut self) {
        self.len += 1;
    }

    pub(crate) fn drop_len(&mut self) {
        self.len -= 1;
    }
}

/// Probe a snapshot bucket for a key, using identity before Python
/// equality.
pub(crate) fn probe(
    f: &Frame,
    bucket: &[(PyObjectRef, PyObjectRef)],
    key: &PyObjectRef,
) -> PyResult<Option<PyObjectRef>> {
    for (k, _) in bucket {
        if k.is(key) {
            return Ok(Some(k.clone()));
        }
    }
    for (k, _) in bucket {
        if ops::eq_bool(f, k, key)? {
            return Ok(Some(k.clone()));
        }
    }
    Ok(None)
}

#[derive(Debug, Default)]
pub struct PyDict {
    table: PyRwLock<Table>,
}

pub type PyDictRef = PyRef<PyDict>;

impl PyPayload for PyDict {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.dict_type
    }
}

impl PyDict {
    pub fn new() -> Self {
        PyDict::default()
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_item_opt(&self, f: &Frame, key: &PyObjectRef) -> PyResult<Option<PyObjectRef>> {
        let hash = ops::hash(f, key)?;
        let bucket = self.table.read().bucket(hash);
        let matched = match probe(f, &bucket, key)? {
            Some(k) => k,
            None => return Ok(None),
        };
        Ok(bucket
            .iter()
            .find(|(k, _)| k.is(&matched))
            .map(|(_, v)| v.clone()))
    }

    pub fn get_item_str(&self, f: &Frame, key: &str) -> PyResult<Option<PyObjectRef>> {
        let hash = f.ctx().hash_secret.hash_str(key);
        let bucket = self.table.read().bucket(hash);
        for (k, v) in &bucket {
            if let Some(s) = k.payload::<PyStr>() {
                if s.as_str() == key {
                    return Ok(Some(v.clone()));
                }
            }
        }
        // a non-str key may still collide and compare equal
        for (k, v) in &bucket {
            if k.payload::<PyStr>().is_none() {
                let probe_key = f.ctx().new_str(key).into_object();
                if ops::eq_bool(f, k, &probe_key)? {
                    return Ok(Some(v.clone()));
                }
            }
        }
        Ok(None)
    }

    pub fn set_item(&self, f: &Frame, key: PyObjectRef, value: PyObjectRef) -> PyResult<()> {
        let hash = ops::hash(f, &key)?;
        let bucket = self.table.read().bucket(hash);
        let matched = probe(f, &bucket, &key)?;
        let mut table = self.table.write();
        let bucket = table.buckets.entry(hash).or_default();
        if let Some(matched) = matched {
            if let Some(entry) = bucket.iter_mut().find(|(k, _)| k.is(&matched)) {
                entry.1 = value;
                return Ok(());
            }
        }
        bucket.push((key, value));
        table.len += 1;
        Ok(())
    }

    pub fn set_item_str(&self, f: &Frame, key: &str, value: PyObjectRef) -> PyResult<()> {
        let key = f.ctx().new_str(key).into_object();
        self.set_item(f, key, value)
    }

    pub fn del_item(&self, f: &Frame, key: &PyObjectRef) -> PyResult<bool> {
        let hash = ops::hash(f, key)?;
        let bucket = self.table.read().bucket(hash);
        let matched = match probe(f, &bucket, key)? {
            Some(k) => k,
            None => return Ok(false),
        };
        let mut table = self.table.write();
        if let Some(bucket) = table.buckets.get_mut(&hash) {
            let before = bucket.len();
            bucket.retain(|(k, _)| !k.is(&matched));
            if bucket.len() < before {
                table.len -= 1;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn del_item_str(&self, f: &Frame, key: &str) -> PyResult<bool> {
        let key = f.ctx().new_str(key).into_object();
        self.del_item(f, &key)
    }

    pub fn entries(&self, _f: &Frame) -> PyResult<Vec<(PyObjectRef, PyObjectRef)>> {
        Ok(self.table.read().flatten())
    }

    pub fn keys(&self) -> Vec<PyObjectRef> {
        self.table
            .read()
            .flatten()
            .into_iter()
            .map(|(k, _)| k)
            .collect()
    }

    pub fn values(&self) -> Vec<PyObjectRef> {
        self.table
            .read()
            .flatten()
            .into_iter()
            .map(|(_, v)| v)
            .collect()
    }

    pub fn clear(&self) {
        *self.table.write() = Table::default();
    }
}

fn dict_payload<'a>(f: &Frame, zelf: &'a PyObjectRef) -> PyResult<&'a PyDict> {
    zelf.payload_if_subclass::<PyDict>(f.ctx())
        .ok_or_else(|| f.new_type_error("expected a dict".to_owned()))
}

fn dict_len(f: &Frame, zelf: &PyObjectRef) -> PyResult<usize> {
    Ok(dict_payload(f, zelf)?.len())
}

fn dict_getitem(f: &Frame, zelf: &PyObjectRef, key: &PyObjectRef) -> PyResult {
    match dict_payload(f, zelf)?.get_item_opt(f, key)? {
        Some(value) => Ok(value),
        None => Err(f.new_key_error(key.clone())),
    }
}

fn dict_setitem(
    f: &Frame,
    zelf: &PyObjectRef,
    key: &PyObjectRef,
    value: &PyObjectRef,
) -> PyResult<()> {
    dict_payload(f, zelf)?.set_item(f, key.clone(), value.clone())
}

fn dict_delitem(f: &Frame, zelf: &PyObjectRef, key: &PyObjectRef) -> PyResult<()> {
    if dict_payload(f, zelf)?.del_item(f, key)? {
        Ok(())
    } else {
        Err(f.new_key_error(key.clone()))
    }
}

fn dict_contains(f: &Frame, zelf: &PyObjectRef, key: &PyObjectRef) -> PyResult<bool> {
    Ok(dict_payload(f, zelf)?.get_item_opt(f, key)?.is_some())
}

fn dict_iter(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let keys = dict_payload(f, zelf)?.keys();
    let list = f.ctx().new_list(keys).into_object();
    ops::iter(f, &list)
}

fn dict_hash(f: &Frame, _zelf: &PyObjectRef) -> PyResult<PyHash> {
    Err(f.new_type_error("unhashable type: 'dict'".to_owned()))
}

fn dict_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    let dict = dict_payload(f, zelf)?;
    let guard = match ReprGuard::enter(f, zelf) {
        Some(guard) => guard,
        None => return Ok(ctx.new_str("{...}").into_object()),
    };
    let mut parts = Vec::with_capacity(dict.len());
    for (k, v) in dict.entries(f)? {
        parts.push(format!(
            "{}: {}",
            ops::repr_str(f, &k)?,
            ops::repr_str(f, &v)?
        ));
    }
    drop(guard);
    Ok(ctx
        .new_str(format!("{{{}}}", parts.join(", ")))
        .into_object())
}

fn dict_eq_inner(f: &Frame, a: &PyDict, b: &PyDict) -> PyResult<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (k, v) in a.entries(f)? {
        match b.get_item_opt(f, &k)? {
            Some(other) => {
                if !ops::eq_bool(f, &v, &other)? {
                    return Ok(false);
                }
            }
            None => return Ok(false),
        }
    }
    Ok(true)
}

fn dict_richcompare(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: CmpOp) -> PyResult {
    let ctx = f.ctx();
    if !matches!(op, CmpOp::Eq | CmpOp::Ne) {
        return Ok(ctx.not_implemented());
    }
    let a = match v.payload_if_subclass::<PyDict>(ctx) {
        Some(d) => d,
        None => return Ok(ctx.not_implemented()),
    };
    let b = match w.payload_if_subclass::<PyDict>(ctx) {
        Some(d) => d,
        None => return Ok(ctx.not_implemented()),
    };
    let eq = dict_eq_inner(f, a, b)?;
    Ok(ctx.new_bool(eq == (op == CmpOp::Eq)))
}

fn fill_from(f: &Frame, dict: &PyDict, source: &PyObjectRef) -> PyResult<()> {
    let ctx = f.ctx();
    if let Some(other) = source.payload_if_subclass::<PyDict>(ctx) {
        for (k, v) in other.entries(f)? {
            dict.set_item(f, k, v)?;
        }
        return Ok(());
    }
    // an iterable of key/value pairs
    protocol::for_each(f, source, &mut |pair| {
        let parts: Vec<PyObjectRef> = protocol::apply(f, &pair, |items, _| Ok(items.to_vec()))?;
        if parts.len() != 2 {
            return Err(f.new_value_error(format!(
                "dictionary update sequence element has length {}; 2 is required",
                parts.len()
            )));
        }
        dict.set_item(f, parts[0].clone(), parts[1].clone())
    })
}

fn dict_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let args = std::mem::take(args);
    if args.args.len() > 1 {
        return Err(f.new_type_error(format!(
            "dict expected at most 1 arguments, got {}",
            args.args.len()
        )));
    }
    let dict = PyDict::new()
        .into_ref_with_type(f, cls.clone())?;
    if let Some(source) = args.args.first() {
        fill_from(f, &dict, source)?;
    }
    for (name, value) in args.kwargs {
        dict.set_item_str(f, &name, value)?;
    }
    Ok(dict.into_object())
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.dict_type;
    t.slots.len.store(Some(dict_len));
    t.slots.getitem.store(Some(dict_getitem));
    t.slots.setitem.store(Some(dict_setitem));
    t.slots.delitem.store(Some(dict_delitem));
    t.slots.contains.store(Some(dict_contains));
    t.slots.iter.store(Some(dict_iter));
    t.slots.hash.store(Some(dict_hash));
    t.slots.repr.store(Some(dict_repr));
    t.slots.richcompare.store(Some(dict_richcompare));
    t.slots.new.store(Some(dict_new));

    t.set_str_attr(
        "get",
        ctx.new_builtin_func("get", |f, args| {
            let [zelf, key, default] = args.bind_range::<2, 3>(f, "get")?;
            let (zelf, key) = match (zelf, key) {
                (Some(z), Some(k)) => (z, k),
                _ => unreachable!("arity checked"),
            };
            match dict_payload(f, &zelf)?.get_item_opt(f, &key)? {
                Some(v) => Ok(v),
                None => Ok(default.unwrap_or_else(|| f.ctx().none())),
            }
        }),
    );
    t.set_str_attr(
        "keys",
        ctx.new_builtin_func("keys", |f, args| {
            let [zelf] = args.bind_exact::<1>(f, "keys")?;
            let keys = dict_payload(f, &zelf)?.keys();
            Ok(f.ctx().new_list(keys).into_object())
        }),
    );
    t.set_str_attr(
        "values",
        ctx.new_builtin_func("values", |f, args| {
            let [zelf] = args.bind_exact::<1>(f, "values")?;
            let values = dict_payload(f, &zelf)?.values();
            Ok(f.ctx().new_list(values).into_object())
        }),
    );
    t.set_str_attr(
        "items",
        ctx.new_builtin_func("items", |f, args| {
            let [zelf] = args.bind_exact::<1>(f, "items")?;
            let ctx = f.ctx();
            let items = dict_payload(f, &zelf)?
                .entries(f)?
                .into_iter()
                .map(|(k, v)| ctx.new_tuple(vec![k, v]).into_object())
                .collect();
            Ok(ctx.new_list(items).into_object())
        }),
    );
    t.set_str_attr(
        "has_key",
        ctx.new_builtin_func("has_key", |f, args| {
            let [zelf, key] = args.bind_exact::<2>(f, "has_key")?;
            let found = dict_payload(f, &zelf)?.get_item_opt(f, &key)?.is_some();
            Ok(f.ctx().new_bool(found))
        }),
    );
    t.set_str_attr(
        "update",
        ctx.new_builtin_func("update", |f, args| {
            let [zelf, source] = args.bind_exact::<2>(f, "update")?;
            fill_from(f, dict_payload(f, &zelf)?, &source)?;
            Ok(f.ctx().none())
        }),
    );
    t.set_str_attr(
        "pop",
        ctx.new_builtin_func("pop", |f, args| {
            let [zelf, key, default] = args.bind_range::<2, 3>(f, "pop")?;
            let (zelf, key) = match (zelf, key) {
                (Some(z), Some(k)) => (z, k),
                _ => unreachable!("arity checked"),
            };
            let dict = dict_payload(f, &zelf)?;
            match dict.get_item_opt(f, &key)? {
                Some(value) => {
                    dict.del_item(f, &key)?;
                    Ok(value)
                }
                None => default.ok_or_else(|| f.new_key_error(key)),
            }
        }),
    );
    t.set_str_attr(
        "clear",
        ctx.new_builtin_func("clear", |f, args| {
            let [zelf] = args.bind_exact::<1>(f, "clear")?;
            dict_payload(f, &zelf)?.clear();
            Ok(f.ctx().none())
        }),
    );
    t.set_str_attr(
        "copy",
        ctx.new_builtin_func("copy", |f, args| {
            let [zelf] = args.bind_exact::<1>(f, "copy")?;
            let dict = dict_payload(f, &zelf)?;
            let out = f.ctx().new_dict();
            for (k, v) in dict.entries(f)? {
                out.set_item(f, k, v)?;
            }
            Ok(out.into_object())
        }),
    );
    t.set_str_attr(
        "setdefault",
        ctx.new_builtin_func("setdefault", |f, args| {
            let [zelf, key, default] = args.bind_range::<2, 3>(f, "setdefault")?;
            let (zelf, key) = match (zelf, key) {
                (Some(z), Some(k)) => (z, k),
                _ => unreachable!("arity checked"),
            };
            let dict = dict_payload(f, &zelf)?;
            if let Some(v) = dict.get_item_opt(f, &key)? {
                return Ok(v);
            }
            let default = default.unwrap_or_else(|| f.ctx().none());
            dict.set_item(f, key, default.clone())?;
            Ok(default)
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::int::PyInt;
    use crate::ops;

    #[test]
    fn insert_lookup_delete() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let d = ctx.new_dict();
        let key = ctx.new_str("a").into_object();
        d.set_item(&f, key.clone(), ctx.new_int(1).into_object()).unwrap();
        assert_eq!(d.len(), 1);

        // an equal-but-distinct key finds the entry
        let key2 = ctx.new_str("a").into_object();
        let got = d.get_item_opt(&f, &key2).unwrap().unwrap();
        assert_eq!(got.payload::<PyInt>().unwrap().value(), 1);

        // overwrite keeps the size
        d.set_item(&f, key2, ctx.new_int(2).into_object()).unwrap();
        assert_eq!(d.len(), 1);

        assert!(d.del_item(&f, &key).unwrap());
        assert_eq!(d.len(), 0);
    }

    #[test]
    fn int_float_key_equivalence() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let d = ctx.new_dict();
        d.set_item(&f, ctx.new_int(1).into_object(), ctx.new_str("x").into_object())
            .unwrap();
        let got = d
            .get_item_opt(&f, &ctx.new_float(1.0).into_object())
            .unwrap()
            .unwrap();
        assert_eq!(got.payload::<crate::builtins::str::PyStr>().unwrap().as_str(), "x");
    }

    #[test]
    fn missing_key_raises_key_error() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let d = ctx.new_dict().into_object();
        let key = ctx.new_str("missing").into_object();
        let err = ops::get_item(&f, &d, &key).unwrap_err();
        assert!(err.isinstance(&ctx.exceptions.key_error));
    }

    #[test]
    fn unhashable_key_rejected() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let d = ctx.new_dict().into_object();
        let key = ctx.new_list(vec![]).into_object();
        let err = ops::set_item(&f, &d, &key, &ctx.none()).unwrap_err();
        assert_eq!(err.message(), "unhashable type: 'list'");
    }

    #[test]
    fn dict_equality() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let a = ctx.new_dict();
        let b = ctx.new_dict();
        a.set_item_str(&f, "k", ctx.new_int(1).into_object()).unwrap();
        b.set_item_str(&f, "k", ctx.new_int(1).into_object()).unwrap();
        assert!(ops::eq_bool(&f, a.as_object(), b.as_object()).unwrap());
        b.set_item_str(&f, "j", ctx.new_int(2).into_object()).unwrap();
        assert!(!ops::eq_bool(&f, a.as_object(), b.as_object()).unwrap());
    }
}
