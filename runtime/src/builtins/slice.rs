use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::protocol::{calc_slice, SliceIndices};
use crate::{ops, PyResult};

#[derive(Debug)]
pub struct PySlice {
    pub start: PyObjectRef,
    pub stop: PyObjectRef,
    pub step: PyObjectRef,
}

impl PyPayload for PySlice {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.slice_type
    }
}

impl PySlice {
    pub fn new(start: PyObjectRef, stop: PyObjectRef, step: PyObjectRef) -> Self {
        PySlice { start, stop, step }
    }

    /// Normalize against a sequence length.
    pub fn indices(&self, f: &Frame, len: usize) -> PyResult<SliceIndices> {
        let ctx = f.ctx();
        let opt = |obj: &PyObjectRef| {
            if ctx.is_none(obj) {
                None
            } else {
                Some(obj.clone())
            }
        };
        let (start, stop, step) = (opt(&self.start), opt(&self.stop), opt(&self.step));
        calc_slice(f, start.as_ref(), stop.as_ref(), step.as_ref(), len)
    }
}

fn slice_payload<'a>(f: &Frame, zelf: &'a PyObjectRef) -> PyResult<&'a PySlice> {
    zelf.payload::<PySlice>()
        .ok_or_else(|| f.new_type_error("expected a slice".to_owned()))
}

fn slice_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let slice = slice_payload(f, zelf)?;
    let s = format!(
        "slice({}, {}, {})",
        ops::repr_str(f, &slice.start)?,
        ops::repr_str(f, &slice.stop)?,
        ops::repr_str(f, &slice.step)?
    );
    Ok(f.ctx().new_str(s).into_object())
}

fn slice_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let ctx = f.ctx();
    let [a, b, c] = std::mem::take(args).bind_range::<1, 3>(f, "slice")?;
    let (start, stop, step) = match (a, b, c) {
        (Some(stop), None, None) => (None, Some(stop), None),
        (start, stop, step) => (start, stop, step),
    };
    let payload = PySlice::new(
        start.unwrap_or_else(|| ctx.none()),
        stop.unwrap_or_else(|| ctx.none()),
        step.unwrap_or_else(|| ctx.none()),
    );
    payload
        .into_ref_with_type(f, cls.clone())
        .map(PyRef::into_object)
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.slice_type;
    t.slots.repr.store(Some(slice_repr));
    t.slots.new.store(Some(slice_new));

    t.set_str_attr(
        "indices",
        ctx.new_builtin_func("indices", |f, args| {
            let [zelf, len] = args.bind_exact::<2>(f, "indices")?;
            let slice = slice_payload(f, &zelf)?;
            let len = ops::index(f, &len)?;
            if len < 0 {
                return Err(f.new_value_error("length should not be negative".to_owned()));
            }
            let indices = slice.indices(f, len as usize)?;
            let ctx = f.ctx();
            Ok(ctx
                .new_tuple(vec![
                    ctx.new_int(indices.start).into_object(),
                    ctx.new_int(indices.stop).into_object(),
                    ctx.new_int(indices.step).into_object(),
                ])
                .into_object())
        }),
    );
    t.set_str_attr(
        "start",
        ctx.new_getset("start", t.clone(), slice_start_getter, None),
    );
    t.set_str_attr(
        "stop",
        ctx.new_getset("stop", t.clone(), slice_stop_getter, None),
    );
    t.set_str_attr(
        "step",
        ctx.new_getset("step", t.clone(), slice_step_getter, None),
    );
}

fn slice_start_getter(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    Ok(slice_payload(f, zelf)?.start.clone())
}

fn slice_stop_getter(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    Ok(slice_payload(f, zelf)?.stop.clone())
}

fn slice_step_getter(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    Ok(slice_payload(f, zelf)?.step.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::int::PyInt;

    #[test]
    fn indices_matches_slice_law() {
        // list(range(n))[s] == [i for i in range(*s.indices(n))]
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let s = ctx.new_slice(
            Some(ctx.new_int(7).into_object()),
            None,
            Some(ctx.new_int(-2).into_object()),
        );
        let indices = s.indices(&f, 5).unwrap();
        assert_eq!((indices.start, indices.stop, indices.step), (4, -1, -2));
        let mut collected = vec![];
        let mut i = indices.start;
        while i != indices.term() {
            collected.push(i);
            i += indices.step;
        }
        assert_eq!(collected, vec![4, 2, 0]);
    }

    #[test]
    fn single_argument_is_stop() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let cls = ctx.types.slice_type.clone().into_object();
        let s = crate::ops::invoke(&f, &cls, vec![ctx.new_int(3).into_object()].into()).unwrap();
        let slice = s.payload::<PySlice>().unwrap();
        assert!(ctx.is_none(&slice.start));
        assert_eq!(slice.stop.payload::<PyInt>().unwrap().value(), 3);
    }
}
