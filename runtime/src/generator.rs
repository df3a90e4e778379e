//! The generator state machine.
//!
//! A generator owns the frame its code block was entered on and a driving
//! closure that resumes the block with a sent value. Transitions are
//! serialized by a mutex; the block itself always runs outside it.

use std::fmt;

use pyrite_common::lock::PyMutex;

use crate::class::PyTypeRef;
use crate::code::{exec_block, ExecutionResult};
use crate::context::Context;
use crate::exceptions::PyBaseExceptionRef;
use crate::frame::{Frame, FrameRef};
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::PyResult;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum GenState {
    Created,
    Ready,
    Running,
    Done,
}

pub type GenBlock =
    Box<dyn Fn(&FrameRef, Option<PyObjectRef>) -> PyResult<ExecutionResult> + Send + Sync>;

pub struct PyGenerator {
    frame: FrameRef,
    block: GenBlock,
    state: PyMutex<GenState>,
}

impl fmt::Debug for PyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[PyGenerator state={:?}]", *self.state.lock())
    }
}

impl PyPayload for PyGenerator {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.generator_type
    }
}

impl PyGenerator {
    /// Take over `frame` (the activation the generator's code block was
    /// entered on) and the resuming closure.
    pub fn new(ctx: &Context, frame: FrameRef, block: GenBlock) -> PyRef<PyGenerator> {
        PyGenerator {
            frame,
            block,
            state: PyMutex::new(GenState::Created),
        }
        .into_ref(ctx)
    }

    pub fn frame(&self) -> &FrameRef {
        &self.frame
    }

    pub fn send(&self, f: &Frame, value: PyObjectRef) -> PyResult {
        let ctx = f.ctx();
        let sent = {
            let mut state = self.state.lock();
            match *state {
                GenState::Done => return Err(f.new_stop_iteration()),
                GenState::Running => {
                    return Err(f.new_value_error("generator already executing".to_owned()))
                }
                GenState::Created => {
                    if !ctx.is_none(&value) {
                        return Err(f.new_type_error(
                            "can't send non-None value to a just-started generator".to_owned(),
                        ));
                    }
                    *state = GenState::Running;
                    None
                }
                GenState::Ready => {
                    *state = GenState::Running;
                    Some(value)
                }
            }
        };

        // the block runs outside the state lock
        let mut sent = Some(sent);
        let result = exec_block(&self.frame, &mut |fr| {
            (self.block)(fr, sent.take().flatten())
        });

        let mut state = self.state.lock();
        match result {
            Ok(ExecutionResult::Yield(value)) => {
                *state = GenState::Ready;
                Ok(value)
            }
            Ok(ExecutionResult::Return(_)) => {
                *state = GenState::Done;
                Err(f.new_stop_iteration())
            }
            Err(exc) => {
                *state = GenState::Done;
                Err(exc)
            }
        }
    }

    pub fn next(&self, f: &Frame) -> PyResult {
        self.send(f, f.ctx().none())
    }

    /// Raise `exc` at the generator's suspension point. The block may catch
    /// it through a pending checkpoint; otherwise the generator finishes
    /// with the exception.
    pub fn throw(&self, f: &Frame, exc: PyBaseExceptionRef) -> PyResult {
        {
            let mut state = self.state.lock();
            match *state {
                GenState::Done => return Err(exc),
                GenState::Running => {
                    return Err(f.new_value_error("generator already executing".to_owned()))
                }
                GenState::Created | GenState::Ready => *state = GenState::Running,
            }
        }

        let result = if self.frame.pop_checkpoint().is_some() {
            self.frame.set_exc_info(Some(exc.clone()), exc.traceback());
            exec_block(&self.frame, &mut |fr| (self.block)(fr, None))
        } else {
            Err(exc)
        };

        let mut state = self.state.lock();
        match result {
            Ok(ExecutionResult::Yield(value)) => {
                *state = GenState::Ready;
                Ok(value)
            }
            Ok(ExecutionResult::Return(_)) => {
                *state = GenState::Done;
                Err(f.new_stop_iteration())
            }
            Err(exc) => {
                *state = GenState::Done;
                Err(exc)
            }
        }
    }

    /// Wind the generator down with GeneratorExit.
    pub fn close(&self, f: &Frame) -> PyResult<()> {
        if *self.state.lock() == GenState::Done {
            return Ok(());
        }
        let ctx = f.ctx();
        let exit = f.new_exception(ctx.exceptions.generator_exit.clone(), vec![]);
        match self.throw(f, exit) {
            Ok(_) => Err(f.new_runtime_error("generator ignored GeneratorExit".to_owned())),
            Err(exc)
                if exc.isinstance(&ctx.exceptions.generator_exit)
                    || exc.isinstance(&ctx.exceptions.stop_iteration) =>
            {
                Ok(())
            }
            Err(exc) => Err(exc),
        }
    }
}

fn gen_iter(_f: &Frame, zelf: &PyObjectRef) -> PyResult {
    Ok(zelf.clone())
}

fn gen_next(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let gen = zelf
        .payload::<PyGenerator>()
        .ok_or_else(|| f.new_type_error("expected a generator".to_owned()))?;
    gen.next(f)
}

fn gen_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let name = zelf
        .payload::<PyGenerator>()
        .and_then(|g| g.frame.code.as_ref().map(|c| c.name.clone()))
        .unwrap_or_else(|| "<generator>".to_owned());
    let s = format!("<generator object {} at {:#x}>", name, zelf.get_id());
    Ok(f.ctx().new_str(s).into_object())
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.generator_type;
    t.slots.iter.store(Some(gen_iter));
    t.slots.iternext.store(Some(gen_next));
    t.slots.repr.store(Some(gen_repr));
    t.set_str_attr(
        "send",
        ctx.new_builtin_func("send", |f, args| {
            let [zelf, value] = args.bind_exact::<2>(f, "send")?;
            let gen = zelf
                .payload::<PyGenerator>()
                .ok_or_else(|| f.new_type_error("expected a generator".to_owned()))?;
            gen.send(f, value)
        }),
    );
    t.set_str_attr(
        "throw",
        ctx.new_builtin_func("throw", |f, args| {
            let [zelf, exc_type, value, tb] = args.bind_range::<2, 4>(f, "throw")?;
            let (zelf, exc_type) = match (zelf, exc_type) {
                (Some(z), Some(e)) => (z, e),
                _ => unreachable!("arity checked"),
            };
            let gen = zelf
                .payload::<PyGenerator>()
                .ok_or_else(|| f.new_type_error("expected a generator".to_owned()))?;
            let exc = crate::exceptions::normalize(f, exc_type, value, tb)?;
            gen.throw(f, exc)
        }),
    );
    t.set_str_attr(
        "close",
        ctx.new_builtin_func("close", |f, args| {
            let [zelf] = args.bind_exact::<1>(f, "close")?;
            let gen = zelf
                .payload::<PyGenerator>()
                .ok_or_else(|| f.new_type_error("expected a generator".to_owned()))?;
            gen.close(f)?;
            Ok(f.ctx().none())
        }),
    );
}
