//! Call-stack activations.
//!
//! A frame is owned by the thread that pushed it; its state register,
//! checkpoint stack and exc-info are never shared across threads, so plain
//! atomics and a mutex on the rarely contended parts suffice.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crossbeam_utils::atomic::AtomicCell;
use pyrite_common::lock::{OnceCell, PyMutex};

use crate::builtins::dict::PyDictRef;
use crate::builtins::traceback::PyTracebackRef;
use crate::code::PyCodeRef;
use crate::context::Context;
use crate::exceptions::PyBaseExceptionRef;
use crate::object::{PyObject, PyObjectRef, PyObjectWeak, PyPayload, PyRef};
use crate::class::PyTypeRef;

/// Per-host-thread state shared by every frame of one lineage: the set of
/// object identities currently being repr'd.
pub struct ThreadState {
    repr_set: PyMutex<HashSet<usize>>,
}

impl ThreadState {
    fn new() -> Arc<Self> {
        Arc::new(ThreadState {
            repr_set: PyMutex::new(HashSet::new()),
        })
    }
}

pub struct Frame {
    pub back: Option<FrameRef>,
    pub code: Option<PyCodeRef>,
    globals: PyDictRef,
    state: AtomicCell<u32>,
    checkpoints: PyMutex<Vec<u32>>,
    exc: PyMutex<(Option<PyBaseExceptionRef>, Option<PyTracebackRef>)>,
    args_cache: PyMutex<Vec<Vec<PyObjectRef>>>,
    lineno: AtomicCell<u32>,
    thread: Arc<ThreadState>,
    self_weak: OnceCell<PyObjectWeak>,
}

pub type FrameRef = PyRef<Frame>;

impl PyPayload for Frame {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.frame_type
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .code
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or("<root>");
        write!(f, "[Frame {} state={}]", name, self.state.load())
    }
}

fn alloc(frame: Frame, ctx: &Context) -> FrameRef {
    let r = frame.into_ref(ctx);
    r.self_weak
        .set(Arc::downgrade(r.as_object()))
        .unwrap_or_else(|_| unreachable!("fresh frame"));
    r
}

impl Frame {
    /// A frame with no code block: the base of a thread's stack. Skipped in
    /// tracebacks.
    pub fn new_root(ctx: &Context) -> FrameRef {
        alloc(
            Frame {
                back: None,
                code: None,
                globals: ctx.new_dict(),
                state: AtomicCell::new(0),
                checkpoints: PyMutex::new(Vec::new()),
                exc: PyMutex::new((None, None)),
                args_cache: PyMutex::new(Vec::new()),
                lineno: AtomicCell::new(0),
                thread: ThreadState::new(),
                self_weak: OnceCell::new(),
            },
            ctx,
        )
    }

    pub fn ctx(&self) -> &'static Context {
        Context::global()
    }

    pub(crate) fn self_ref(&self) -> FrameRef {
        let weak = self
            .self_weak
            .get()
            .unwrap_or_else(|| unreachable!("frame self reference set at allocation"));
        let obj = weak
            .upgrade()
            .unwrap_or_else(|| unreachable!("frame alive while running"));
        unsafe { PyRef::from_obj_unchecked(obj) }
    }

    pub fn globals(&self) -> &PyDictRef {
        &self.globals
    }

    pub fn thread(&self) -> &Arc<ThreadState> {
        &self.thread
    }

    // ----- the state register -----

    pub fn state(&self) -> u32 {
        self.state.load()
    }

    pub fn set_state(&self, state: u32) {
        self.state.store(state);
    }

    // ----- the checkpoint stack -----

    pub fn push_checkpoint(&self, state: u32) {
        self.checkpoints.lock().push(state);
    }

    /// Pop the top resume state into the state register.
    pub fn pop_checkpoint(&self) -> Option<u32> {
        let state = self.checkpoints.lock().pop();
        if let Some(s) = state {
            self.state.store(s);
        }
        state
    }

    pub fn checkpoint_depth(&self) -> usize {
        self.checkpoints.lock().len()
    }

    // ----- exception info -----

    pub fn exc_info(&self) -> (Option<PyBaseExceptionRef>, Option<PyTracebackRef>) {
        self.exc.lock().clone()
    }

    pub fn set_exc_info(
        &self,
        exc: Option<PyBaseExceptionRef>,
        tb: Option<PyTracebackRef>,
    ) {
        *self.exc.lock() = (exc, tb);
    }

    /// Swap in saved exc-info, returning the previous pair.
    pub fn restore_exc(
        &self,
        saved: (Option<PyBaseExceptionRef>, Option<PyTracebackRef>),
    ) -> (Option<PyBaseExceptionRef>, Option<PyTracebackRef>) {
        std::mem::replace(&mut *self.exc.lock(), saved)
    }

    // ----- argument buffers -----

    pub fn make_args(&self, n: usize) -> Vec<PyObjectRef> {
        let mut cache = self.args_cache.lock();
        match cache.pop() {
            Some(mut buf) => {
                buf.reserve(n);
                buf
            }
            None => Vec::with_capacity(n),
        }
    }

    pub fn free_args(&self, mut buf: Vec<PyObjectRef>) {
        buf.clear();
        self.args_cache.lock().push(buf);
    }

    // ----- source position -----

    pub fn lineno(&self) -> u32 {
        self.lineno.load()
    }

    pub fn set_lineno(&self, lineno: u32) {
        self.lineno.store(lineno);
    }
}

impl FrameRef {
    /// Push an activation for `code` below this frame.
    pub fn new_child(&self, code: Option<PyCodeRef>, globals: Option<PyDictRef>) -> FrameRef {
        let ctx = self.ctx();
        alloc(
            Frame {
                back: Some(self.clone()),
                code,
                globals: globals.unwrap_or_else(|| self.globals.clone()),
                state: AtomicCell::new(0),
                checkpoints: PyMutex::new(Vec::new()),
                exc: PyMutex::new((None, None)),
                args_cache: PyMutex::new(Vec::new()),
                lineno: AtomicCell::new(0),
                thread: self.thread.clone(),
                self_weak: OnceCell::new(),
            },
            ctx,
        )
    }

    /// Drop bookkeeping once the callee has returned. The frame object
    /// itself stays alive while anything (a generator, a traceback) holds
    /// it.
    pub fn release(&self) {
        self.args_cache.lock().clear();
    }
}

/// Guards a repr recursion: present in the thread's set while the guarded
/// object is being rendered.
pub struct ReprGuard {
    thread: Arc<ThreadState>,
    id: usize,
}

impl ReprGuard {
    /// `None` when the object is already being repr'd somewhere up the
    /// chain.
    pub fn enter(frame: &Frame, obj: &PyObjectRef) -> Option<ReprGuard> {
        let thread = frame.thread().clone();
        let id = obj.get_id();
        if !thread.repr_set.lock().insert(id) {
            return None;
        }
        Some(ReprGuard { thread, id })
    }
}

impl Drop for ReprGuard {
    fn drop(&mut self) {
        self.thread.repr_set.lock().remove(&self.id);
    }
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.frame_type;
    t.slots.repr.store(Some(frame_repr));
}

fn frame_repr(f: &Frame, zelf: &PyObjectRef) -> crate::PyResult {
    let frame = zelf
        .payload::<Frame>()
        .ok_or_else(|| f.new_type_error("expected a frame".to_owned()))?;
    let name = frame
        .code
        .as_ref()
        .map(|c| c.name.as_str())
        .unwrap_or("<root>");
    let s = format!("<frame object for {} at {:#x}>", name, zelf.get_id());
    Ok(f.ctx().new_str(s).into_object())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_roundtrip() {
        let f = Frame::new_root(Context::global());
        assert_eq!(f.state(), 0);
        f.push_checkpoint(3);
        f.push_checkpoint(7);
        assert_eq!(f.checkpoint_depth(), 2);
        assert_eq!(f.pop_checkpoint(), Some(7));
        assert_eq!(f.state(), 7);
        assert_eq!(f.pop_checkpoint(), Some(3));
        assert_eq!(f.state(), 3);
        assert_eq!(f.pop_checkpoint(), None);
    }

    #[test]
    fn child_shares_thread_state() {
        let root = Frame::new_root(Context::global());
        let child = root.new_child(None, None);
        assert!(Arc::ptr_eq(child.thread(), root.thread()));
        assert!(child.back.as_ref().unwrap().is(&root));
    }

    #[test]
    fn exc_info_restore() {
        let f = Frame::new_root(Context::global());
        let exc = f.new_type_error("x".to_owned());
        f.set_exc_info(Some(exc.clone()), None);
        let saved = f.restore_exc((None, None));
        assert!(saved.0.unwrap().as_object().is(exc.as_object()));
        assert!(f.exc_info().0.is_none());
    }
}
