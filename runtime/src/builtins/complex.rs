//! The complex number shell: enough of the slot contract for arithmetic
//! dispatch, equality and rendering.

use num_complex::Complex64;
use pyrite_common::hash::{hash_complex, PyHash};

use crate::builtins::float::{format_float, PyFloat};
use crate::builtins::int::PyInt;
use crate::builtins::long::PyLong;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::types::slot::{BinOp, CmpOp};
use crate::PyResult;

use num_traits::ToPrimitive;

#[derive(Debug, Clone, Copy)]
pub struct PyComplex {
    value: Complex64,
}

impl From<Complex64> for PyComplex {
    fn from(value: Complex64) -> Self {
        PyComplex { value }
    }
}

impl PyPayload for PyComplex {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.complex_type
    }
}

impl PyComplex {
    pub fn value(&self) -> Complex64 {
        self.value
    }
}

fn coerce(f: &Frame, obj: &PyObjectRef) -> Option<Complex64> {
    let ctx = f.ctx();
    if let Some(c) = obj.payload_if_subclass::<PyComplex>(ctx) {
        return Some(c.value);
    }
    if let Some(fl) = obj.payload_if_subclass::<PyFloat>(ctx) {
        return Some(Complex64::new(fl.value(), 0.0));
    }
    if let Some(i) = obj.payload_if_subclass::<PyInt>(ctx) {
        return Some(Complex64::new(i.value() as f64, 0.0));
    }
    obj.payload_if_subclass::<PyLong>(ctx)
        .map(|l| Complex64::new(l.as_bigint().to_f64().unwrap_or(f64::INFINITY), 0.0))
}

macro_rules! complex_binop {
    ($fwd:ident, $rfl:ident, $apply:expr) => {
        fn $fwd(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
            match (coerce(f, v), coerce(f, w)) {
                (Some(a), Some(b)) => ($apply)(f, a, b),
                _ => Ok(f.ctx().not_implemented()),
            }
        }
        fn $rfl(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
            match (coerce(f, w), coerce(f, v)) {
                (Some(a), Some(b)) => ($apply)(f, a, b),
                _ => Ok(f.ctx().not_implemented()),
            }
        }
    };
}

fn ok_complex(f: &Frame, value: Complex64) -> PyResult {
    Ok(f.ctx().new_complex(value).into_object())
}

complex_binop!(complex_add, complex_radd, |f, a: Complex64, b: Complex64| {
    ok_complex(f, a + b)
});
complex_binop!(complex_sub, complex_rsub, |f, a: Complex64, b: Complex64| {
    ok_complex(f, a - b)
});
complex_binop!(complex_mul, complex_rmul, |f, a: Complex64, b: Complex64| {
    ok_complex(f, a * b)
});
complex_binop!(complex_div, complex_rdiv, |f: &Frame, a: Complex64, b: Complex64| {
    if b.re == 0.0 && b.im == 0.0 {
        Err(f.new_zero_division_error("complex division by zero".to_owned()))
    } else {
        ok_complex(f, a / b)
    }
});

fn complex_value(f: &Frame, zelf: &PyObjectRef) -> PyResult<Complex64> {
    zelf.payload_if_subclass::<PyComplex>(f.ctx())
        .map(PyComplex::value)
        .ok_or_else(|| f.new_type_error("expected a complex".to_owned()))
}

fn complex_neg(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ok_complex(f, -complex_value(f, zelf)?)
}

fn complex_pos(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ok_complex(f, complex_value(f, zelf)?)
}

fn complex_richcompare(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: CmpOp) -> PyResult {
    let ctx = f.ctx();
    let a = match v.payload_if_subclass::<PyComplex>(ctx) {
        Some(c) => c.value,
        None => return Ok(ctx.not_implemented()),
    };
    match op {
        CmpOp::Eq | CmpOp::Ne => match coerce(f, w) {
            Some(b) => Ok(ctx.new_bool((a == b) == (op == CmpOp::Eq))),
            None => Ok(ctx.not_implemented()),
        },
        _ => Err(f.new_type_error("no ordering relation is defined for complex numbers".to_owned())),
    }
}

fn complex_hash(f: &Frame, zelf: &PyObjectRef) -> PyResult<PyHash> {
    let v = complex_value(f, zelf)?;
    Ok(hash_complex(&v))
}

fn complex_nonzero(f: &Frame, zelf: &PyObjectRef) -> PyResult<bool> {
    let v = complex_value(f, zelf)?;
    Ok(v.re != 0.0 || v.im != 0.0)
}

fn complex_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = complex_value(f, zelf)?;
    let s = if v.re == 0.0 {
        format!("{}j", format_float(v.im))
    } else if v.im >= 0.0 || v.im.is_nan() {
        format!("({}+{}j)", format_float(v.re), format_float(v.im))
    } else {
        format!("({}-{}j)", format_float(v.re), format_float(-v.im))
    };
    Ok(f.ctx().new_str(s).into_object())
}

fn complex_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let [real, imag] = std::mem::take(args).bind_range::<0, 2>(f, "complex")?;
    let re = match real {
        None => Complex64::new(0.0, 0.0),
        Some(v) => coerce(f, &v).ok_or_else(|| {
            f.new_type_error(format!(
                "complex() argument must be a string or a number, not '{}'",
                v.class().name
            ))
        })?,
    };
    let im = match imag {
        None => Complex64::new(0.0, 0.0),
        Some(v) => coerce(f, &v).ok_or_else(|| {
            f.new_type_error(format!(
                "complex() second argument must be a number, not '{}'",
                v.class().name
            ))
        })?,
    };
    // complex(a, b) == a + b*1j
    let value = re + im * Complex64::new(0.0, 1.0);
    PyComplex::from(value)
        .into_ref_with_type(f, cls.clone())
        .map(PyRef::into_object)
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.complex_type;
    macro_rules! set {
        ($op:ident, $fwd:ident, $rfl:ident) => {
            t.slots.set_binary(BinOp::$op, $fwd);
            t.slots.set_binary_reflected(BinOp::$op, $rfl);
        };
    }
    set!(Add, complex_add, complex_radd);
    set!(Sub, complex_sub, complex_rsub);
    set!(Mul, complex_mul, complex_rmul);
    set!(Div, complex_div, complex_rdiv);
    t.slots.neg.store(Some(complex_neg));
    t.slots.pos.store(Some(complex_pos));
    t.slots.richcompare.store(Some(complex_richcompare));
    t.slots.hash.store(Some(complex_hash));
    t.slots.nonzero.store(Some(complex_nonzero));
    t.slots.repr.store(Some(complex_repr));
    t.slots.new.store(Some(complex_new));
}
