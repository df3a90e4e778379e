//! The exception value model: the Python 2 exception hierarchy, raise
//! normalization, tracebacks and their formatting.
//!
//! Exceptions are ordinary objects whose dynamic type encodes the kind;
//! there is no out-of-band error channel anywhere in the runtime.

use pyrite_common::lock::{PyMutex, PyRwLock};

use crate::builtins::str::PyStr;
use crate::builtins::traceback::{PyTraceback, PyTracebackRef};
use crate::class::{PyAttributes, PyType, PyTypeRef, TypeFlags};
use crate::context::Context;
use crate::frame::Frame;
use crate::object::{Basis, PyObject, PyObjectRef, PyPayload, PyRef};
use crate::{ops, PyResult};

pub struct PyBaseException {
    args: PyRwLock<Vec<PyObjectRef>>,
    traceback: PyMutex<Option<PyTracebackRef>>,
}

pub type PyBaseExceptionRef = PyRef<PyBaseException>;

impl std::fmt::Debug for PyBaseException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PyBaseException").finish()
    }
}

impl PyPayload for PyBaseException {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.exceptions.base_exception
    }
}

impl PyBaseException {
    pub fn new(args: Vec<PyObjectRef>) -> Self {
        PyBaseException {
            args: PyRwLock::new(args),
            traceback: PyMutex::new(None),
        }
    }

    pub fn args(&self) -> Vec<PyObjectRef> {
        self.args.read().clone()
    }

    pub fn set_args(&self, args: Vec<PyObjectRef>) {
        *self.args.write() = args;
    }

    pub fn traceback(&self) -> Option<PyTracebackRef> {
        self.traceback.lock().clone()
    }

    pub fn set_traceback(&self, tb: Option<PyTracebackRef>) {
        *self.traceback.lock() = tb;
    }

    /// The conventional message: the sole string argument, if that is what
    /// the args tuple holds.
    pub fn message(&self) -> String {
        let args = self.args.read();
        match args.as_slice() {
            [arg] => arg
                .payload::<PyStr>()
                .map(|s| s.as_str().to_owned())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }
}

impl PyBaseExceptionRef {
    pub fn class_of(&self) -> &PyTypeRef {
        self.as_object().class()
    }

    pub fn isinstance(&self, cls: &PyTypeRef) -> bool {
        self.as_object().fast_isinstance(cls)
    }
}

/// All exception types, in hierarchy order.
pub struct ExceptionZoo {
    pub base_exception: PyTypeRef,
    pub system_exit: PyTypeRef,
    pub keyboard_interrupt: PyTypeRef,
    pub generator_exit: PyTypeRef,
    pub exception: PyTypeRef,
    pub standard_error: PyTypeRef,
    pub stop_iteration: PyTypeRef,
    pub arithmetic_error: PyTypeRef,
    pub overflow_error: PyTypeRef,
    pub zero_division_error: PyTypeRef,
    pub floating_point_error: PyTypeRef,
    pub assertion_error: PyTypeRef,
    pub attribute_error: PyTypeRef,
    pub environment_error: PyTypeRef,
    pub io_error: PyTypeRef,
    pub os_error: PyTypeRef,
    pub eof_error: PyTypeRef,
    pub lookup_error: PyTypeRef,
    pub index_error: PyTypeRef,
    pub key_error: PyTypeRef,
    pub name_error: PyTypeRef,
    pub unbound_local_error: PyTypeRef,
    pub runtime_error: PyTypeRef,
    pub not_implemented_error: PyTypeRef,
    pub type_error: PyTypeRef,
    pub value_error: PyTypeRef,
    pub unicode_error: PyTypeRef,
    pub unicode_decode_error: PyTypeRef,
    pub unicode_encode_error: PyTypeRef,
}

fn create_exc_type(name: &str, base: &PyTypeRef, metatype: &PyTypeRef) -> PyTypeRef {
    let flags =
        TypeFlags::INSTANTIABLE | TypeFlags::BASETYPE | TypeFlags::HAS_DICT;
    PyType::new_ref(
        name,
        Some(base.clone()),
        vec![base.clone()],
        PyAttributes::new(),
        base.basis(),
        flags,
        Some(metatype.clone()),
    )
}

impl ExceptionZoo {
    pub(crate) fn init(object_type: &PyTypeRef, type_type: &PyTypeRef) -> Self {
        let base_exception = PyType::new_ref(
            "BaseException",
            Some(object_type.clone()),
            vec![object_type.clone()],
            PyAttributes::new(),
            Basis::of::<PyBaseException>("BaseException"),
            TypeFlags::INSTANTIABLE
                | TypeFlags::BASETYPE
                | TypeFlags::BASIS
                | TypeFlags::HAS_DICT,
            Some(type_type.clone()),
        );
        let new = |name: &str, base: &PyTypeRef| create_exc_type(name, base, type_type);

        let system_exit = new("SystemExit", &base_exception);
        let keyboard_interrupt = new("KeyboardInterrupt", &base_exception);
        let generator_exit = new("GeneratorExit", &base_exception);
        let exception = new("Exception", &base_exception);
        let standard_error = new("StandardError", &exception);
        let stop_iteration = new("StopIteration", &exception);
        let arithmetic_error = new("ArithmeticError", &standard_error);
        let overflow_error = new("OverflowError", &arithmetic_error);
        let zero_division_error = new("ZeroDivisionError", &arithmetic_error);
        let floating_point_error = new("FloatingPointError", &arithmetic_error);
        let assertion_error = new("AssertionError", &standard_error);
        let attribute_error = new("AttributeError", &standard_error);
        let environment_error = new("EnvironmentError", &standard_error);
        let io_error = new("IOError", &environment_error);
        let os_error = new("OSError", &environment_error);
        let eof_error = new("EOFError", &standard_error);
        let lookup_error = new("LookupError", &standard_error);
        let index_error = new("IndexError", &lookup_error);
        let key_error = new("KeyError", &lookup_error);
        let name_error = new("NameError", &standard_error);
        let unbound_local_error = new("UnboundLocalError", &name_error);
        let runtime_error = new("RuntimeError", &standard_error);
        let not_implemented_error = new("NotImplementedError", &runtime_error);
        let type_error = new("TypeError", &standard_error);
        let value_error = new("ValueError", &standard_error);
        let unicode_error = new("UnicodeError", &value_error);
        let unicode_decode_error = new("UnicodeDecodeError", &unicode_error);
        let unicode_encode_error = new("UnicodeEncodeError", &unicode_error);

        ExceptionZoo {
            base_exception,
            system_exit,
            keyboard_interrupt,
            generator_exit,
            exception,
            standard_error,
            stop_iteration,
            arithmetic_error,
            overflow_error,
            zero_division_error,
            floating_point_error,
            assertion_error,
            attribute_error,
            environment_error,
            io_error,
            os_error,
            eof_error,
            lookup_error,
            index_error,
            key_error,
            name_error,
            unbound_local_error,
            runtime_error,
            not_implemented_error,
            type_error,
            value_error,
            unicode_error,
            unicode_decode_error,
            unicode_encode_error,
        }
    }

    pub(crate) fn all(&self) -> Vec<&PyTypeRef> {
        vec![
            &self.base_exception,
            &self.system_exit,
            &self.keyboard_interrupt,
            &self.generator_exit,
            &self.exception,
            &self.standard_error,
            &self.stop_iteration,
            &self.arithmetic_error,
            &self.overflow_error,
            &self.zero_division_error,
            &self.floating_point_error,
            &self.assertion_error,
            &self.attribute_error,
            &self.environment_error,
            &self.io_error,
            &self.os_error,
            &self.eof_error,
            &self.lookup_error,
            &self.index_error,
            &self.key_error,
            &self.name_error,
            &self.unbound_local_error,
            &self.runtime_error,
            &self.not_implemented_error,
            &self.type_error,
            &self.value_error,
            &self.unicode_error,
            &self.unicode_decode_error,
            &self.unicode_encode_error,
        ]
    }
}

fn exc_new(f: &Frame, cls: &PyTypeRef, args: &mut crate::function::FuncArgs) -> PyResult {
    let payload = PyBaseException::new(args.args.clone());
    payload
        .into_ref_with_type(f, cls.clone())
        .map(PyRef::into_object)
}

fn exc_init(
    f: &Frame,
    zelf: &PyObjectRef,
    args: &mut crate::function::FuncArgs,
) -> PyResult<()> {
    let exc = PyBaseExceptionRef::try_from_object(f, zelf.clone())?;
    exc.set_args(args.args.clone());
    Ok(())
}

fn exc_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let exc = PyBaseExceptionRef::try_from_object(f, zelf.clone())?;
    let args = exc.args();
    let mut parts = Vec::with_capacity(args.len());
    for arg in &args {
        parts.push(ops::repr_str(f, arg)?);
    }
    let inner = if parts.len() == 1 {
        format!("{},", parts[0])
    } else {
        parts.join(", ")
    };
    let s = format!("{}({})", zelf.class().name, inner);
    Ok(f.ctx().new_str(s).into_object())
}

fn exc_str(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let exc = PyBaseExceptionRef::try_from_object(f, zelf.clone())?;
    let args = exc.args();
    let s = match args.len() {
        0 => String::new(),
        1 => ops::to_str_string(f, &args[0])?,
        _ => {
            let tuple = f.ctx().new_tuple(args).into_object();
            ops::repr_str(f, &tuple)?
        }
    };
    Ok(f.ctx().new_str(s).into_object())
}

fn exc_args_getter(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let exc = PyBaseExceptionRef::try_from_object(f, zelf.clone())?;
    Ok(f.ctx().new_tuple(exc.args()).into_object())
}

pub(crate) fn init(ctx: &Context) {
    let excs = &ctx.exceptions;
    let base = &excs.base_exception;
    base.slots.new.store(Some(exc_new));
    base.slots.init.store(Some(exc_init));
    base.slots.repr.store(Some(exc_repr));
    base.slots.str.store(Some(exc_str));
    base.set_str_attr(
        "args",
        ctx.new_getset("args", base.clone(), exc_args_getter, None),
    );
}

/// Normalize the operands of a `raise` statement into a concrete exception
/// instance carrying a traceback.
pub fn normalize(
    f: &Frame,
    exc_type: PyObjectRef,
    value: Option<PyObjectRef>,
    traceback: Option<PyObjectRef>,
) -> PyResult<PyBaseExceptionRef> {
    let ctx = f.ctx();
    let instance = if let Some(cls) = PyTypeRef::new(exc_type.clone()) {
        if !cls.issubclass(&ctx.exceptions.base_exception) {
            return Err(f.new_type_error(format!(
                "exceptions must be derived from BaseException, not \"{}\"",
                cls.name
            )));
        }
        let args = match value {
            None => vec![],
            Some(v) if ctx.is_none(&v) => vec![],
            Some(v) => match v.payload::<crate::builtins::tuple::PyTuple>() {
                Some(t) => t.as_slice().to_vec(),
                None => vec![v],
            },
        };
        let raised = ops::invoke(f, &cls.clone().into_object(), args.into())?;
        PyBaseExceptionRef::try_from_object(f, raised)?
    } else if exc_type.fast_isinstance(&ctx.exceptions.base_exception) {
        match value {
            Some(v) if !ctx.is_none(&v) => {
                return Err(f.new_type_error(
                    "instance exception may not have a separate value".to_owned(),
                ));
            }
            _ => {}
        }
        PyBaseExceptionRef::try_from_object(f, exc_type)?
    } else {
        return Err(f.new_type_error(format!(
            "exceptions must be derived from BaseException, not \"{}\"",
            exc_type.class().name
        )));
    };

    match traceback {
        None => {}
        Some(tb) if ctx.is_none(&tb) => {}
        Some(tb) => {
            let tb = PyRef::<PyTraceback>::new(tb).ok_or_else(|| {
                f.new_type_error("raise: arg 3 must be a traceback or None".to_owned())
            })?;
            instance.set_traceback(Some(tb));
        }
    }
    Ok(instance)
}

/// Record `frame` in the exception's traceback unless it is already the most
/// recent entry. Root frames carry no code and are skipped.
pub(crate) fn add_frame(ctx: &Context, exc: &PyBaseExceptionRef, frame: &crate::frame::FrameRef) {
    if frame.code.is_none() {
        return;
    }
    let current = exc.traceback();
    if let Some(ref tb) = current {
        if tb.frame.as_object().is(frame.as_object()) {
            return;
        }
    }
    let node = PyTraceback::new(frame.clone(), frame.lineno(), current).into_ref(ctx);
    exc.set_traceback(Some(node));
}

/// Render an exception the way the top-level driver prints one.
pub fn format_exc(f: &Frame, exc: &PyBaseExceptionRef) -> String {
    let mut out = String::new();
    let mut frames = Vec::new();
    let mut cursor = exc.traceback();
    while let Some(tb) = cursor {
        frames.push((
            tb.frame.clone(),
            tb.lineno,
        ));
        cursor = tb.next.clone();
    }
    if !frames.is_empty() {
        out.push_str("Traceback (most recent call last):\n");
        for (frame, lineno) in frames.into_iter().rev() {
            let (file, name) = match &frame.code {
                Some(code) => (code.filename.clone(), code.name.clone()),
                None => ("<unknown>".to_owned(), "<unknown>".to_owned()),
            };
            out.push_str(&format!("  File \"{}\", line {}, in {}\n", file, lineno, name));
        }
    }
    let cls = exc.as_object().class().name.clone();
    let msg = ops::to_str_string(f, exc.as_object()).unwrap_or_default();
    if msg.is_empty() {
        out.push_str(&cls);
    } else {
        out.push_str(&format!("{}: {}", cls, msg));
    }
    out.push('\n');
    out
}

/// Write an unhandled exception to the error stream.
pub fn print_exception(f: &Frame, exc: &PyBaseExceptionRef) {
    crate::stdio::write_stderr(&format_exc(f, exc));
}

impl Frame {
    pub fn new_exception(&self, cls: PyTypeRef, args: Vec<PyObjectRef>) -> PyBaseExceptionRef {
        let ctx = self.ctx();
        let payload = PyBaseException::new(args);
        let dict = if cls.flags.contains(TypeFlags::HAS_DICT) {
            Some(ctx.new_dict())
        } else {
            None
        };
        let exc = unsafe {
            PyRef::<PyBaseException>::from_obj_unchecked(PyObject::new(payload, cls, dict))
        };
        add_frame(ctx, &exc, &self.self_ref());
        exc
    }

    pub fn new_exception_msg(&self, cls: PyTypeRef, msg: String) -> PyBaseExceptionRef {
        let arg = self.ctx().new_str(msg).into_object();
        self.new_exception(cls, vec![arg])
    }

    pub fn new_type_error(&self, msg: String) -> PyBaseExceptionRef {
        self.new_exception_msg(self.ctx().exceptions.type_error.clone(), msg)
    }

    pub fn new_value_error(&self, msg: String) -> PyBaseExceptionRef {
        self.new_exception_msg(self.ctx().exceptions.value_error.clone(), msg)
    }

    pub fn new_attribute_error(&self, msg: String) -> PyBaseExceptionRef {
        self.new_exception_msg(self.ctx().exceptions.attribute_error.clone(), msg)
    }

    pub fn new_name_error(&self, msg: String) -> PyBaseExceptionRef {
        self.new_exception_msg(self.ctx().exceptions.name_error.clone(), msg)
    }

    pub fn new_unbound_local_error(&self, msg: String) -> PyBaseExceptionRef {
        self.new_exception_msg(self.ctx().exceptions.unbound_local_error.clone(), msg)
    }

    pub fn new_index_error(&self, msg: String) -> PyBaseExceptionRef {
        self.new_exception_msg(self.ctx().exceptions.index_error.clone(), msg)
    }

    pub fn new_key_error(&self, key: PyObjectRef) -> PyBaseExceptionRef {
        self.new_exception(self.ctx().exceptions.key_error.clone(), vec![key])
    }

    pub fn new_runtime_error(&self, msg: String) -> PyBaseExceptionRef {
        self.new_exception_msg(self.ctx().exceptions.runtime_error.clone(), msg)
    }

    pub fn new_overflow_error(&self, msg: String) -> PyBaseExceptionRef {
        self.new_exception_msg(self.ctx().exceptions.overflow_error.clone(), msg)
    }

    pub fn new_zero_division_error(&self, msg: String) -> PyBaseExceptionRef {
        self.new_exception_msg(self.ctx().exceptions.zero_division_error.clone(), msg)
    }

    pub fn new_stop_iteration(&self) -> PyBaseExceptionRef {
        self.new_exception(self.ctx().exceptions.stop_iteration.clone(), vec![])
    }

    /// The `raise` statement: normalize, record in this frame's exc-info and
    /// hand back the exception for propagation.
    pub fn raise(
        &self,
        exc_type: PyObjectRef,
        value: Option<PyObjectRef>,
        traceback: Option<PyObjectRef>,
    ) -> PyBaseExceptionRef {
        match normalize(self, exc_type, value, traceback) {
            Ok(exc) => {
                if exc.traceback().is_none() {
                    add_frame(self.ctx(), &exc, &self.self_ref());
                }
                self.set_exc_info(Some(exc.clone()), exc.traceback());
                exc
            }
            Err(e) => e,
        }
    }

    pub fn raise_type(&self, cls: PyTypeRef, msg: &str) -> PyBaseExceptionRef {
        let exc = self.new_exception_msg(cls, msg.to_owned());
        self.set_exc_info(Some(exc.clone()), exc.traceback());
        exc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn hierarchy() {
        let ctx = Context::global();
        let excs = &ctx.exceptions;
        assert!(excs.overflow_error.issubclass(&excs.arithmetic_error));
        assert!(excs.index_error.issubclass(&excs.lookup_error));
        assert!(excs.key_error.issubclass(&excs.lookup_error));
        assert!(excs.unbound_local_error.issubclass(&excs.name_error));
        assert!(excs.stop_iteration.issubclass(&excs.exception));
        assert!(!excs.system_exit.issubclass(&excs.exception));
        assert!(excs.system_exit.issubclass(&excs.base_exception));
        for t in excs.all() {
            assert!(t.issubclass(&excs.base_exception));
        }
    }

    #[test]
    fn raise_with_type_and_message() {
        let ctx = Context::global();
        let f = crate::frame::Frame::new_root(ctx);
        let err = f.new_type_error("boom".to_owned());
        assert!(err.isinstance(&ctx.exceptions.type_error));
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn instance_with_separate_value_rejected() {
        let ctx = Context::global();
        let f = crate::frame::Frame::new_root(ctx);
        let inst = f
            .new_exception_msg(ctx.exceptions.value_error.clone(), "x".to_owned());
        let err = normalize(
            &f,
            inst.into_object(),
            Some(ctx.new_int(1).into_object()),
            None,
        )
        .unwrap_err();
        assert_eq!(
            err.message(),
            "instance exception may not have a separate value"
        );
    }

    #[test]
    fn raising_non_exception_type() {
        let ctx = Context::global();
        let f = crate::frame::Frame::new_root(ctx);
        let err = normalize(&f, ctx.types.int_type.clone().into_object(), None, None).unwrap_err();
        assert_eq!(
            err.message(),
            "exceptions must be derived from BaseException, not \"int\""
        );
    }
}
