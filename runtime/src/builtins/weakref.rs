//! Weak references.
//!
//! An object owns at most one weak cell, installed on first use and never
//! replaced; further weak references to the same object reuse it, appending
//! their callbacks. Finalization runs when the referent's storage is
//! released: callbacks fire in reverse registration order, outside the cell
//! lock, with the weakref as sole argument.

use std::fmt;

use crossbeam_utils::atomic::AtomicCell;
use pyrite_common::hash::PyHash;
use pyrite_common::lock::PyMutex;

use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyObjectWeak, PyPayload, PyRef};
use crate::types::slot::CmpOp;
use crate::{ops, PyResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CellState {
    /// No `get` has handed out the referent since the cell was installed.
    New,
    /// The referent escaped through `get` at least once.
    Used,
    /// The referent's storage has been released.
    Dead,
}

pub struct PyWeak {
    referent: PyObjectWeak,
    addr: usize,
    state: PyMutex<CellState>,
    callbacks: PyMutex<Vec<PyObjectRef>>,
    hash: AtomicCell<Option<PyHash>>,
}

impl fmt::Debug for PyWeak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[PyWeak {:#x} {:?}]", self.addr, *self.state.lock())
    }
}

impl PyPayload for PyWeak {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.weakref_type
    }
}

impl PyWeak {
    /// The referent, or `None` once the cell is dead.
    pub fn get(&self) -> Option<PyObjectRef> {
        let upgraded = self.referent.upgrade();
        if upgraded.is_some() {
            let mut state = self.state.lock();
            if *state == CellState::New {
                *state = CellState::Used;
            }
        }
        upgraded
    }

    pub fn is_dead(&self) -> bool {
        *self.state.lock() == CellState::Dead
    }

    pub fn referent_addr(&self) -> usize {
        self.addr
    }

    fn push_callback(&self, callback: PyObjectRef) {
        self.callbacks.lock().push(callback);
    }
}

/// Install-time constructor used by the object core.
pub(crate) fn new_cell(referent: PyObjectWeak, addr: usize) -> PyRef<PyWeak> {
    let ctx = Context::global();
    PyWeak {
        referent,
        addr,
        state: PyMutex::new(CellState::New),
        callbacks: PyMutex::new(Vec::new()),
        hash: AtomicCell::new(None),
    }
    .into_ref(ctx)
}

/// The public constructor: reuse the object's cell, appending a callback.
pub fn new_weak_ref(
    obj: &PyObjectRef,
    callback: Option<PyObjectRef>,
) -> PyRef<PyWeak> {
    let cell = crate::object::PyObject::weak_cell(obj).clone();
    if let Some(callback) = callback {
        cell.push_callback(callback);
    }
    cell
}

/// Run from the referent's release hook. Marks the cell dead, then invokes
/// the callbacks outside the lock; a failing callback's traceback goes to
/// the error stream.
pub(crate) fn finalize(cell: &PyRef<PyWeak>) {
    let callbacks = {
        let mut state = cell.state.lock();
        if *state == CellState::Dead {
            return;
        }
        *state = CellState::Dead;
        std::mem::take(&mut *cell.callbacks.lock())
    };
    if callbacks.is_empty() {
        return;
    }
    let ctx = Context::global();
    let frame = Frame::new_root(ctx);
    let weak_obj = cell.clone().into_object();
    for callback in callbacks.into_iter().rev() {
        if let Err(exc) = ops::invoke(&frame, &callback, vec![weak_obj.clone()].into()) {
            crate::exceptions::print_exception(&frame, &exc);
        }
    }
}

fn weak_payload<'a>(f: &Frame, zelf: &'a PyObjectRef) -> PyResult<&'a PyWeak> {
    zelf.payload::<PyWeak>()
        .ok_or_else(|| f.new_type_error("expected a weakref".to_owned()))
}

fn weak_call(f: &Frame, zelf: &PyObjectRef, args: FuncArgs) -> PyResult {
    let _: [PyObjectRef; 0] = args.bind_exact::<0>(f, "__call__")?;
    let weak = weak_payload(f, zelf)?;
    Ok(weak.get().unwrap_or_else(|| f.ctx().none()))
}

fn weak_hash(f: &Frame, zelf: &PyObjectRef) -> PyResult<PyHash> {
    let weak = weak_payload(f, zelf)?;
    if let Some(hash) = weak.hash.load() {
        return Ok(hash);
    }
    let referent = weak
        .get()
        .ok_or_else(|| f.new_type_error("weak object has gone away".to_owned()))?;
    let hash = ops::hash(f, &referent)?;
    weak.hash.store(Some(hash));
    Ok(hash)
}

fn weak_richcompare(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: CmpOp) -> PyResult {
    let ctx = f.ctx();
    if !matches!(op, CmpOp::Eq | CmpOp::Ne) {
        return Ok(ctx.not_implemented());
    }
    let a = match v.payload::<PyWeak>() {
        Some(weak) => weak,
        None => return Ok(ctx.not_implemented()),
    };
    let b = match w.payload::<PyWeak>() {
        Some(weak) => weak,
        None => return Ok(ctx.not_implemented()),
    };
    let eq = match (a.get(), b.get()) {
        (Some(x), Some(y)) => ops::eq_bool(f, &x, &y)?,
        _ => v.is(w),
    };
    Ok(ctx.new_bool(eq == (op == CmpOp::Eq)))
}

fn weak_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let weak = weak_payload(f, zelf)?;
    let s = match weak.get() {
        Some(o) => format!(
            "<weakref at {:#x}; to '{}' at {:#x}>",
            zelf.get_id(),
            o.class().name,
            o.get_id(),
        ),
        None => format!("<weakref at {:#x}; dead>", zelf.get_id()),
    };
    Ok(f.ctx().new_str(s).into_object())
}

fn weak_new(f: &Frame, _cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let [referent, callback] = std::mem::take(args).bind_range::<1, 2>(f, "weakref")?;
    let referent = referent.unwrap_or_else(|| unreachable!("arity checked"));
    Ok(new_weak_ref(&referent, callback).into_object())
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.weakref_type;
    t.slots.call.store(Some(weak_call));
    t.slots.hash.store(Some(weak_hash));
    t.slots.richcompare.store(Some(weak_richcompare));
    t.slots.repr.store(Some(weak_repr));
    t.slots.new.store(Some(weak_new));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_is_shared_per_object() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let obj = ctx.new_list(vec![]).into_object();
        let a = new_weak_ref(&obj, None);
        let b = new_weak_ref(&obj, None);
        assert!(a.is(&b));
    }

    #[test]
    fn get_returns_referent_until_death() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let obj = ctx.new_list(vec![]).into_object();
        let weak = new_weak_ref(&obj, None);
        assert!(weak.get().unwrap().is(&obj));
        drop(obj);
        assert!(weak.get().is_none());
        assert!(weak.is_dead());
        let r = ops::invoke(&f, weak.as_object(), FuncArgs::default()).unwrap();
        assert!(ctx.is_none(&r));
    }

    #[test]
    fn hash_cached_across_death() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let obj = ctx.new_str("k").into_object();
        let expected = ops::hash(&f, &obj).unwrap();
        let weak = new_weak_ref(&obj, None);
        assert_eq!(ops::hash(&f, weak.as_object()).unwrap(), expected);
        drop(obj);
        // still hashable once cached
        assert_eq!(ops::hash(&f, weak.as_object()).unwrap(), expected);
    }

    #[test]
    fn dead_unhashed_weakref_rejects_hash() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let obj = ctx.new_str("k").into_object();
        let weak = new_weak_ref(&obj, None);
        drop(obj);
        let err = ops::hash(&f, weak.as_object()).unwrap_err();
        assert_eq!(err.message(), "weak object has gone away");
    }

    #[test]
    fn callbacks_fire_in_reverse_order() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let log = ctx.new_list(vec![]);
        let mk = |tag: i64| {
            let log = log.clone();
            ctx.new_builtin_func("cb", move |f, args| {
                let [_weak] = args.bind_exact::<1>(f, "cb")?;
                log.append(f.ctx().new_int(tag).into_object());
                Ok(f.ctx().none())
            })
        };
        let obj = ctx.new_list(vec![]).into_object();
        let _w1 = new_weak_ref(&obj, Some(mk(1)));
        let _w2 = new_weak_ref(&obj, Some(mk(2)));
        drop(obj);
        let order: Vec<i64> = log
            .snapshot()
            .iter()
            .map(|o| o.payload::<crate::builtins::int::PyInt>().unwrap().value())
            .collect();
        assert_eq!(order, vec![2, 1]);
    }
}
