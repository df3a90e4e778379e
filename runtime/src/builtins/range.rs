//! `xrange`: a lazily evaluated arithmetic progression over host integers.

use crossbeam_utils::atomic::AtomicCell;

use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::protocol;
use crate::{ops, PyResult};

#[derive(Debug, Clone, Copy)]
pub struct PyRange {
    pub start: i64,
    pub step: i64,
    pub len: i64,
}

impl PyPayload for PyRange {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.xrange_type
    }
}

impl PyRange {
    /// The progression length, guarding against host overflow.
    fn compute_len(f: &Frame, start: i64, stop: i64, step: i64) -> PyResult<i64> {
        let (start, stop, step) = (start as i128, stop as i128, step as i128);
        let len = if step > 0 {
            if stop > start {
                (stop - start + step - 1) / step
            } else {
                0
            }
        } else if stop < start {
            (stop - start + step + 1) / step
        } else {
            0
        };
        if len > i64::MAX as i128 {
            return Err(f.new_overflow_error("xrange() result has too many items".to_owned()));
        }
        Ok(len as i64)
    }

    pub fn new(f: &Frame, start: i64, stop: i64, step: i64) -> PyResult<Self> {
        if step == 0 {
            return Err(f.new_value_error("xrange() arg 3 must not be zero".to_owned()));
        }
        let len = Self::compute_len(f, start, stop, step)?;
        Ok(PyRange { start, step, len })
    }

    fn item(&self, f: &Frame, i: i64) -> PyResult<i64> {
        self.start
            .checked_add(
                i.checked_mul(self.step)
                    .ok_or_else(|| f.new_overflow_error("result too large".to_owned()))?,
            )
            .ok_or_else(|| f.new_overflow_error("result too large".to_owned()))
    }

    fn stop(&self) -> i64 {
        // the normalized bound, as Python 2 reports it
        self.start.saturating_add(self.len.saturating_mul(self.step))
    }
}

fn range_payload(f: &Frame, zelf: &PyObjectRef) -> PyResult<PyRange> {
    zelf.payload::<PyRange>()
        .copied()
        .ok_or_else(|| f.new_type_error("expected an xrange".to_owned()))
}

fn range_len(f: &Frame, zelf: &PyObjectRef) -> PyResult<usize> {
    Ok(range_payload(f, zelf)?.len as usize)
}

fn range_getitem(f: &Frame, zelf: &PyObjectRef, key: &PyObjectRef) -> PyResult {
    let range = range_payload(f, zelf)?;
    let idx = ops::index(f, key)?;
    let pos = protocol::normalize_index(idx, range.len as usize)
        .ok_or_else(|| f.new_index_error("xrange object index out of range".to_owned()))?;
    let value = range.item(f, pos as i64)?;
    Ok(f.ctx().new_int(value).into_object())
}

fn range_iter(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let range = range_payload(f, zelf)?;
    Ok(PyRangeIterator {
        range,
        index: AtomicCell::new(0),
    }
    .into_ref(f.ctx())
    .into_object())
}

fn range_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let range = range_payload(f, zelf)?;
    let stop = range.stop();
    let s = if range.step == 1 {
        if range.start == 0 {
            format!("xrange({})", stop)
        } else {
            format!("xrange({}, {})", range.start, stop)
        }
    } else {
        format!("xrange({}, {}, {})", range.start, stop, range.step)
    };
    Ok(f.ctx().new_str(s).into_object())
}

fn range_new(f: &Frame, _cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let [a, b, c] = std::mem::take(args).bind_range::<1, 3>(f, "xrange")?;
    let (start, stop, step) = match (a, b, c) {
        (Some(stop), None, None) => (0, ops::index(f, &stop)?, 1),
        (Some(start), Some(stop), None) => (ops::index(f, &start)?, ops::index(f, &stop)?, 1),
        (Some(start), Some(stop), Some(step)) => (
            ops::index(f, &start)?,
            ops::index(f, &stop)?,
            ops::index(f, &step)?,
        ),
        _ => unreachable!("arity checked"),
    };
    let range = PyRange::new(f, start, stop, step)?;
    Ok(range.into_ref(f.ctx()).into_object())
}

/// The progression's iterator. The cursor is atomic, so concurrent `next`
/// calls never hand out the same index twice.
#[derive(Debug)]
pub struct PyRangeIterator {
    range: PyRange,
    index: AtomicCell<i64>,
}

impl PyPayload for PyRangeIterator {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.xrange_iterator_type
    }
}

fn range_iterator_iter(_f: &Frame, zelf: &PyObjectRef) -> PyResult {
    Ok(zelf.clone())
}

fn range_iterator_next(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let it = zelf
        .payload::<PyRangeIterator>()
        .ok_or_else(|| f.new_type_error("expected a rangeiterator".to_owned()))?;
    let claimed = it
        .index
        .fetch_update(|i| if i < it.range.len { Some(i + 1) } else { None });
    match claimed {
        Ok(i) => {
            let value = it.range.item(f, i)?;
            Ok(f.ctx().new_int(value).into_object())
        }
        Err(_) => Err(f.new_stop_iteration()),
    }
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.xrange_type;
    t.slots.len.store(Some(range_len));
    t.slots.getitem.store(Some(range_getitem));
    t.slots.iter.store(Some(range_iter));
    t.slots.repr.store(Some(range_repr));
    t.slots.new.store(Some(range_new));

    let it = &ctx.types.xrange_iterator_type;
    it.slots.iter.store(Some(range_iterator_iter));
    it.slots.iternext.store(Some(range_iterator_next));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::int::PyInt;
    use crate::builtins::list::PyList;

    fn make(f: &Frame, args: &[i64]) -> PyObjectRef {
        let ctx = f.ctx();
        let cls = ctx.types.xrange_type.clone().into_object();
        let args: Vec<PyObjectRef> = args
            .iter()
            .map(|v| ctx.new_int(*v).into_object())
            .collect();
        ops::invoke(f, &cls, args.into()).unwrap()
    }

    fn to_ints(f: &Frame, obj: &PyObjectRef) -> Vec<i64> {
        let mut out = vec![];
        protocol::for_each(f, obj, &mut |item| {
            out.push(item.payload::<PyInt>().unwrap().value());
            Ok(())
        })
        .unwrap();
        out
    }

    #[test]
    fn negative_step_progression() {
        let f = Frame::new_root(Context::global());
        let r = make(&f, &[-12, -23, -5]);
        assert_eq!(to_ints(&f, &r), vec![-12, -17, -22]);
    }

    #[test]
    fn list_of_xrange() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let r = make(&f, &[3]);
        let cls = ctx.types.list_type.clone().into_object();
        let l = ops::invoke(&f, &cls, vec![r].into()).unwrap();
        let values: Vec<i64> = l
            .payload::<PyList>()
            .unwrap()
            .snapshot()
            .iter()
            .map(|o| o.payload::<PyInt>().unwrap().value())
            .collect();
        assert_eq!(values, vec![0, 1, 2]);
    }

    #[test]
    fn zero_step_rejected() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let cls = ctx.types.xrange_type.clone().into_object();
        let args: Vec<PyObjectRef> = vec![
            ctx.new_int(0).into_object(),
            ctx.new_int(5).into_object(),
            ctx.new_int(0).into_object(),
        ];
        let err = ops::invoke(&f, &cls, args.into()).unwrap_err();
        assert_eq!(err.message(), "xrange() arg 3 must not be zero");
    }

    #[test]
    fn repr_normalizes_stop() {
        let f = Frame::new_root(Context::global());
        let r = make(&f, &[-12, -23, -5]);
        assert_eq!(ops::repr_str(&f, &r).unwrap(), "xrange(-12, -27, -5)");
    }
}
