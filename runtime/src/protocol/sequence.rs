//! Iteration, slicing and rendering helpers shared by the sequence and
//! mapping types.

use crate::builtins::list::PyList;
use crate::builtins::tuple::PyTuple;
use crate::frame::{Frame, ReprGuard};
use crate::object::PyObjectRef;
use crate::types::slot::CmpOp;
use crate::{ops, PyResult};

/// Pull every item out of an iterable. Only StopIteration terminates the
/// loop; any other exception propagates.
pub fn for_each(
    f: &Frame,
    iterable: &PyObjectRef,
    callback: &mut dyn FnMut(PyObjectRef) -> PyResult<()>,
) -> PyResult<()> {
    let iter = ops::iter(f, iterable)?;
    loop {
        match ops::next(f, &iter) {
            Ok(item) => callback(item)?,
            Err(exc) => {
                if exc.isinstance(&f.ctx().exceptions.stop_iteration) {
                    return Ok(());
                }
                return Err(exc);
            }
        }
    }
}

/// Run a callback over an iterable's elements as a slice. Lists are borrowed
/// in place under their read lock (`borrowed` is true and the callback must
/// not retain or mutate); every other iterable is materialized first.
pub fn apply<R>(
    f: &Frame,
    iterable: &PyObjectRef,
    callback: impl FnOnce(&[PyObjectRef], bool) -> PyResult<R>,
) -> PyResult<R> {
    if let Some(list) = iterable.payload::<PyList>() {
        let elements = list.borrow_elements();
        return callback(&elements, true);
    }
    if let Some(tuple) = iterable.payload::<PyTuple>() {
        return callback(tuple.as_slice(), false);
    }
    let mut collected = Vec::new();
    for_each(f, iterable, &mut |item| {
        collected.push(item);
        Ok(())
    })?;
    callback(&collected, false)
}

pub fn checked_add(f: &Frame, a: usize, b: usize) -> PyResult<usize> {
    a.checked_add(b)
        .ok_or_else(|| f.new_overflow_error("result too large".to_owned()))
}

pub fn checked_mul(f: &Frame, a: usize, b: usize) -> PyResult<usize> {
    a.checked_mul(b)
        .ok_or_else(|| f.new_overflow_error("result too large".to_owned()))
}

/// Adjust a possibly negative index against a length; `None` when out of
/// range.
pub fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    if i < 0 || i >= len {
        None
    } else {
        Some(i as usize)
    }
}

/// Normalized slice bounds: iterate `start, start+step, ...` while the
/// cursor differs from `term`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceIndices {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
    pub len: usize,
}

impl SliceIndices {
    pub fn term(&self) -> i64 {
        self.start + self.len as i64 * self.step
    }
}

/// Normalize user-visible slice operands against a sequence length. `None`
/// operands take their sign-dependent defaults; bounds are clamped; a zero
/// step is rejected.
pub fn calc_slice(
    f: &Frame,
    start: Option<&PyObjectRef>,
    stop: Option<&PyObjectRef>,
    step: Option<&PyObjectRef>,
    n: usize,
) -> PyResult<SliceIndices> {
    let n = n as i64;
    let step = match step {
        None => 1,
        Some(s) => ops::index(f, s)?,
    };
    if step == 0 {
        return Err(f.new_value_error("slice step cannot be zero".to_owned()));
    }
    let (def_start, def_stop) = if step < 0 { (n - 1, -1) } else { (0, n) };

    let clamp = |value: i64| -> i64 {
        let v = if value < 0 { value + n } else { value };
        if v < 0 {
            if step < 0 {
                -1
            } else {
                0
            }
        } else if v >= n {
            if step < 0 {
                n - 1
            } else {
                n
            }
        } else {
            v
        }
    };

    let start = match start {
        None => def_start,
        Some(s) => clamp(ops::index(f, s)?),
    };
    let stop = match stop {
        None => def_stop,
        Some(s) => clamp(ops::index(f, s)?),
    };

    let len = if step > 0 {
        if stop > start {
            ((stop - start - 1) / step + 1) as usize
        } else {
            0
        }
    } else if stop < start {
        ((stop - start + 1) / step + 1) as usize
    } else {
        0
    };
    debug_assert!(len as i64 <= n.max(0));

    Ok(SliceIndices {
        start,
        stop,
        step,
        len,
    })
}

/// Render a sequence's items between delimiters, emitting the collapsed
/// form when the rendering re-enters itself.
pub fn seq_repr(
    f: &Frame,
    obj: &PyObjectRef,
    open: &str,
    close: &str,
    items: &[PyObjectRef],
    trailing_comma_if_single: bool,
) -> PyResult<String> {
    let guard = match ReprGuard::enter(f, obj) {
        Some(guard) => guard,
        None => return Ok(format!("{}...{}", open, close)),
    };
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        parts.push(ops::repr_str(f, item)?);
    }
    drop(guard);
    let mut body = parts.join(", ");
    if trailing_comma_if_single && items.len() == 1 {
        body.push(',');
    }
    Ok(format!("{}{}{}", open, body, close))
}

/// Repeat a slice of elements `count` times (negative counts are empty),
/// guarding the size arithmetic.
pub fn seq_mul(
    f: &Frame,
    elements: &[PyObjectRef],
    count: i64,
) -> PyResult<Vec<PyObjectRef>> {
    if count <= 0 {
        return Ok(Vec::new());
    }
    let total = checked_mul(f, elements.len(), count as usize)?;
    let mut out = Vec::with_capacity(total);
    for _ in 0..count {
        out.extend_from_slice(elements);
    }
    Ok(out)
}

/// Lexicographic rich comparison over two element slices.
pub fn seq_richcompare(
    f: &Frame,
    a: &[PyObjectRef],
    b: &[PyObjectRef],
    op: CmpOp,
) -> PyResult<bool> {
    for (x, y) in a.iter().zip(b.iter()) {
        if !ops::eq_bool(f, x, y)? {
            return match op {
                CmpOp::Eq => Ok(false),
                CmpOp::Ne => Ok(true),
                _ => ops::is_true(f, &ops::rich_compare(f, x, y, op)?),
            };
        }
    }
    let ord = a.len().cmp(&b.len());
    Ok(op.eval_ord(ord))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    fn indices(
        f: &Frame,
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
        n: usize,
    ) -> SliceIndices {
        let ctx = f.ctx();
        let mk = |v: Option<i64>| v.map(|v| ctx.new_int(v).into_object());
        let (start, stop, step) = (mk(start), mk(stop), mk(step));
        calc_slice(f, start.as_ref(), stop.as_ref(), step.as_ref(), n).unwrap()
    }

    #[test]
    fn forward_slices() {
        let f = Frame::new_root(Context::global());
        let s = indices(&f, None, None, None, 5);
        assert_eq!((s.start, s.stop, s.step, s.len), (0, 5, 1, 5));
        let s = indices(&f, Some(1), Some(4), None, 5);
        assert_eq!((s.start, s.len), (1, 3));
        let s = indices(&f, Some(-2), None, None, 5);
        assert_eq!((s.start, s.len), (3, 2));
        let s = indices(&f, Some(10), Some(20), None, 5);
        assert_eq!(s.len, 0);
    }

    #[test]
    fn backward_slices() {
        let f = Frame::new_root(Context::global());
        let s = indices(&f, None, None, Some(-1), 5);
        assert_eq!((s.start, s.stop, s.step, s.len), (4, -1, -1, 5));
        let s = indices(&f, Some(3), Some(0), Some(-2), 5);
        assert_eq!((s.start, s.len), (3, 2));
    }

    #[test]
    fn zero_step_rejected() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let zero = ctx.new_int(0).into_object();
        let err = calc_slice(&f, None, None, Some(&zero), 5).unwrap_err();
        assert_eq!(err.message(), "slice step cannot be zero");
    }

    #[test]
    fn term_visits_whole_slice() {
        let f = Frame::new_root(Context::global());
        let s = indices(&f, Some(3), Some(0), Some(-2), 5);
        let mut visited = vec![];
        let mut i = s.start;
        while i != s.term() {
            visited.push(i);
            i += s.step;
        }
        assert_eq!(visited, vec![3, 1]);
    }
}
