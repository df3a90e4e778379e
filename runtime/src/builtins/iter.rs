//! The index-driven iterator backing `__getitem__`-only sequences.

use crossbeam_utils::atomic::AtomicCell;

use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::object::{PyObjectRef, PyPayload};
use crate::{ops, PyResult};

#[derive(Debug)]
pub struct PySeqIterator {
    obj: PyObjectRef,
    index: AtomicCell<i64>,
    exhausted: AtomicCell<bool>,
}

impl PyPayload for PySeqIterator {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.seq_iterator_type
    }
}

impl PySeqIterator {
    pub fn new(obj: PyObjectRef) -> Self {
        PySeqIterator {
            obj,
            index: AtomicCell::new(0),
            exhausted: AtomicCell::new(false),
        }
    }
}

fn seq_iterator_iter(_f: &Frame, zelf: &PyObjectRef) -> PyResult {
    Ok(zelf.clone())
}

fn seq_iterator_next(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let it = zelf
        .payload::<PySeqIterator>()
        .ok_or_else(|| f.new_type_error("expected an iterator".to_owned()))?;
    if it.exhausted.load() {
        return Err(f.new_stop_iteration());
    }
    let i = it.index.fetch_add(1);
    let key = f.ctx().new_int(i).into_object();
    match ops::get_item(f, &it.obj, &key) {
        Ok(item) => Ok(item),
        Err(exc) => {
            let excs = &f.ctx().exceptions;
            if exc.isinstance(&excs.index_error) || exc.isinstance(&excs.stop_iteration) {
                it.exhausted.store(true);
                Err(f.new_stop_iteration())
            } else {
                Err(exc)
            }
        }
    }
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.seq_iterator_type;
    t.slots.iter.store(Some(seq_iterator_iter));
    t.slots.iternext.store(Some(seq_iterator_next));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::str::PyStr;

    #[test]
    fn iterates_getitem_sequences() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let s = ctx.new_str("ab").into_object();
        let it = ops::iter(&f, &s).unwrap();
        let a = ops::next(&f, &it).unwrap();
        assert_eq!(a.payload::<PyStr>().unwrap().as_str(), "a");
        let b = ops::next(&f, &it).unwrap();
        assert_eq!(b.payload::<PyStr>().unwrap().as_str(), "b");
        let err = ops::next(&f, &it).unwrap_err();
        assert!(err.isinstance(&ctx.exceptions.stop_iteration));
    }

    #[test]
    fn iter_of_iterator_is_identity() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let s = ctx.new_str("ab").into_object();
        let it = ops::iter(&f, &s).unwrap();
        let it2 = ops::iter(&f, &it).unwrap();
        assert!(it.is(&it2));
    }
}
