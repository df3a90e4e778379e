use crossbeam_utils::atomic::AtomicCell;

use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::{ops, PyResult};

#[derive(Debug)]
pub struct PyEnumerate {
    iterator: PyObjectRef,
    counter: AtomicCell<i64>,
}

impl PyPayload for PyEnumerate {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.enumerate_type
    }
}

fn enumerate_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let [iterable, start] = std::mem::take(args).bind_range::<1, 2>(f, "enumerate")?;
    let iterable = iterable.unwrap_or_else(|| unreachable!("arity checked"));
    let start = match start {
        None => 0,
        // a negative start clamps to zero
        Some(s) => ops::index(f, &s)?.max(0),
    };
    let iterator = ops::iter(f, &iterable)?;
    PyEnumerate {
        iterator,
        counter: AtomicCell::new(start),
    }
    .into_ref_with_type(f, cls.clone())
    .map(PyRef::into_object)
}

fn enumerate_iter(_f: &Frame, zelf: &PyObjectRef) -> PyResult {
    Ok(zelf.clone())
}

fn enumerate_next(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let e = zelf
        .payload_if_subclass::<PyEnumerate>(f.ctx())
        .ok_or_else(|| f.new_type_error("expected an enumerate".to_owned()))?;
    let item = ops::next(f, &e.iterator)?;
    let position = e.counter.fetch_add(1);
    let ctx = f.ctx();
    Ok(ctx
        .new_tuple(vec![ctx.new_int(position).into_object(), item])
        .into_object())
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.enumerate_type;
    t.slots.new.store(Some(enumerate_new));
    t.slots.iter.store(Some(enumerate_iter));
    t.slots.iternext.store(Some(enumerate_next));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::int::PyInt;
    use crate::builtins::tuple::PyTuple;

    fn make(f: &Frame, iterable: PyObjectRef, start: Option<i64>) -> PyObjectRef {
        let ctx = f.ctx();
        let cls = ctx.types.enumerate_type.clone().into_object();
        let mut args = vec![iterable];
        if let Some(s) = start {
            args.push(ctx.new_int(s).into_object());
        }
        ops::invoke(f, &cls, args.into()).unwrap()
    }

    fn pairs(f: &Frame, e: &PyObjectRef) -> Vec<(i64, i64)> {
        let mut out = vec![];
        crate::protocol::for_each(f, e, &mut |item| {
            let t = item.payload::<PyTuple>().unwrap();
            let i = t.as_slice()[0].payload::<PyInt>().unwrap().value();
            let v = t.as_slice()[1].payload::<PyInt>().unwrap().value();
            out.push((i, v));
            Ok(())
        })
        .unwrap();
        out
    }

    #[test]
    fn counts_from_start() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let l = ctx
            .new_list(vec![
                ctx.new_int(10).into_object(),
                ctx.new_int(20).into_object(),
                ctx.new_int(30).into_object(),
            ])
            .into_object();
        let e = make(&f, l.clone(), Some(5));
        assert_eq!(pairs(&f, &e), vec![(5, 10), (6, 20), (7, 30)]);

        // negative starts clamp to zero
        let e = make(&f, l, Some(-3));
        assert_eq!(pairs(&f, &e), vec![(0, 10), (1, 20), (2, 30)]);
    }
}
