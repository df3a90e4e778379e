//! Compiled code blocks and the driver that runs them.
//!
//! A block is a re-entrant closure: it reads the frame's state register on
//! entry and jumps to the matching arm of its dispatch switch. The driver
//! re-enters the block for as long as an exception finds a checkpoint to
//! service.

use std::fmt;

use crate::builtins::dict::PyDictRef;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::exceptions;
use crate::frame::{Frame, FrameRef};
use crate::function::{FuncArgs, Signature};
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::PyResult;

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct CodeFlags: u32 {
        /// The signature packs surplus positional arguments into a tuple.
        const VARARGS = 1 << 0;
        /// The signature collects surplus keywords into a dict.
        const VARKWARGS = 1 << 1;
        /// The block body is a generator; calling it produces the generator
        /// object rather than running the body.
        const GENERATOR = 1 << 2;
    }
}

/// What one entry into a block produced.
pub enum ExecutionResult {
    Return(PyObjectRef),
    Yield(PyObjectRef),
}

pub type BlockFn =
    Box<dyn Fn(&FrameRef, &mut Vec<PyObjectRef>) -> PyResult<ExecutionResult> + Send + Sync>;

pub struct PyCode {
    pub name: String,
    pub filename: String,
    pub signature: Signature,
    pub flags: CodeFlags,
    block: BlockFn,
}

pub type PyCodeRef = PyRef<PyCode>;

impl fmt::Debug for PyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[PyCode {} {}]", self.name, self.filename)
    }
}

impl PyPayload for PyCode {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.code_type
    }
}

impl PyCode {
    pub fn new(
        ctx: &Context,
        name: impl Into<String>,
        filename: impl Into<String>,
        signature: Signature,
        flags: CodeFlags,
        block: BlockFn,
    ) -> PyCodeRef {
        PyCode {
            name: name.into(),
            filename: filename.into(),
            signature,
            flags,
            block,
        }
        .into_ref(ctx)
    }
}

/// Re-enter `step` until it completes without a pending checkpoint. On an
/// exception the top checkpoint, if any, is popped into the state register
/// and the exception parked in the frame's exc-info for the handler arm.
pub(crate) fn exec_block(
    frame: &FrameRef,
    step: &mut dyn FnMut(&FrameRef) -> PyResult<ExecutionResult>,
) -> PyResult<ExecutionResult> {
    loop {
        match step(frame) {
            Err(exc) => match frame.pop_checkpoint() {
                Some(_) => {
                    exceptions::add_frame(frame.ctx(), &exc, frame);
                    frame.set_exc_info(Some(exc.clone()), exc.traceback());
                }
                None => {
                    exceptions::add_frame(frame.ctx(), &exc, frame);
                    return Err(exc);
                }
            },
            done => return done,
        }
    }
}

impl PyCodeRef {
    /// Run this block to completion on a fresh child frame.
    pub fn eval(
        &self,
        caller: &FrameRef,
        globals: Option<PyDictRef>,
        args: FuncArgs,
    ) -> PyResult {
        let frame = caller.new_child(Some(self.clone()), globals);
        let saved = caller.exc_info();
        let mut locals = self.signature.bind(&frame, args)?;
        let code = self.clone();
        let result = exec_block(&frame, &mut |fr| (code.block)(fr, &mut locals));
        match result {
            Ok(ExecutionResult::Return(value)) => {
                caller.restore_exc(saved);
                frame.release();
                Ok(value)
            }
            Ok(ExecutionResult::Yield(_)) => {
                unreachable!("a block only yields under the generator driver")
            }
            Err(exc) => {
                caller.set_exc_info(Some(exc.clone()), exc.traceback());
                Err(exc)
            }
        }
    }
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.code_type;
    t.slots.repr.store(Some(code_repr));
}

fn code_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let code = zelf
        .payload::<PyCode>()
        .ok_or_else(|| f.new_type_error("expected a code object".to_owned()))?;
    let s = format!(
        "<code object {}, file \"{}\">",
        code.name, code.filename
    );
    Ok(f.ctx().new_str(s).into_object())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Param;

    fn ctx() -> &'static Context {
        Context::global()
    }

    fn int_arg(locals: &[PyObjectRef], i: usize) -> i64 {
        locals[i]
            .payload::<crate::builtins::int::PyInt>()
            .unwrap()
            .value()
    }

    #[test]
    fn eval_runs_block_to_return() {
        let root = Frame::new_root(ctx());
        let code = PyCode::new(
            ctx(),
            "double",
            "test.py",
            Signature::new("double", vec![Param::new("x")], false, false),
            CodeFlags::empty(),
            Box::new(|fr, locals| {
                let v = int_arg(locals, 0);
                Ok(ExecutionResult::Return(
                    fr.ctx().new_int(v * 2).into_object(),
                ))
            }),
        );
        let out = code
            .eval(
                &root,
                None,
                FuncArgs::from(vec![ctx().new_int(21).into_object()]),
            )
            .unwrap();
        assert_eq!(out.payload::<crate::builtins::int::PyInt>().unwrap().value(), 42);
    }

    #[test]
    fn checkpoint_services_exception() {
        // a block shaped like `try: raise ValueError\nexcept: return 7`
        let root = Frame::new_root(ctx());
        let code = PyCode::new(
            ctx(),
            "guarded",
            "test.py",
            Signature::new("guarded", vec![], false, false),
            CodeFlags::empty(),
            Box::new(|fr, _locals| match fr.state() {
                0 => {
                    fr.push_checkpoint(1);
                    Err(fr.new_value_error("boom".to_owned()))
                }
                1 => {
                    let (exc, _) = fr.exc_info();
                    assert!(exc.is_some());
                    Ok(ExecutionResult::Return(fr.ctx().new_int(7).into_object()))
                }
                s => unreachable!("state {}", s),
            }),
        );
        let out = code.eval(&root, None, FuncArgs::default()).unwrap();
        assert_eq!(out.payload::<crate::builtins::int::PyInt>().unwrap().value(), 7);
    }

    #[test]
    fn unhandled_exception_propagates_with_traceback() {
        let root = Frame::new_root(ctx());
        let code = PyCode::new(
            ctx(),
            "broken",
            "lib.py",
            Signature::new("broken", vec![], false, false),
            CodeFlags::empty(),
            Box::new(|fr, _| Err(fr.new_value_error("nope".to_owned()))),
        );
        let err = code.eval(&root, None, FuncArgs::default()).unwrap_err();
        assert_eq!(err.message(), "nope");
        let tb = err.traceback().unwrap();
        assert_eq!(tb.frame.code.as_ref().unwrap().name, "broken");
        // the caller's exc-info now names the failure
        assert!(root.exc_info().0.unwrap().as_object().is(err.as_object()));
    }
}
