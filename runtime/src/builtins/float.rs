//! The double-precision float.

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use pyrite_common::hash::{hash_float, PyHash};

use crate::builtins::int::PyInt;
use crate::builtins::long::PyLong;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::types::slot::{BinOp, CmpOp};
use crate::PyResult;

#[derive(Debug, Clone, Copy)]
pub struct PyFloat {
    value: f64,
}

impl From<f64> for PyFloat {
    fn from(value: f64) -> Self {
        PyFloat { value }
    }
}

impl PyPayload for PyFloat {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.float_type
    }
}

impl PyFloat {
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Accept a float, int or long operand.
fn coerce(f: &Frame, obj: &PyObjectRef) -> Option<f64> {
    let ctx = f.ctx();
    if let Some(fl) = obj.payload_if_subclass::<PyFloat>(ctx) {
        return Some(fl.value);
    }
    if let Some(i) = obj.payload_if_subclass::<PyInt>(ctx) {
        return Some(i.value() as f64);
    }
    obj.payload_if_subclass::<PyLong>(ctx)
        .map(|l| l.as_bigint().to_f64().unwrap_or(f64::INFINITY))
}

macro_rules! float_binop {
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

fn ok_float(f: &Frame, value: f64) -> PyResult {
    Ok(f.ctx().new_float(value).into_object())
}

float_binop!(float_add, float_radd, |f, a: f64, b: f64| ok_float(f, a + b));
float_binop!(float_sub, float_rsub, |f, a: f64, b: f64| ok_float(f, a - b));
float_binop!(float_mul, float_rmul, |f, a: f64, b: f64| ok_float(f, a * b));
float_binop!(float_div, float_rdiv, |f: &Frame, a: f64, b: f64| {
    if b == 0.0 {
        Err(f.new_zero_division_error("float division".to_owned()))
    } else {
        ok_float(f, a / b)
    }
});
float_binop!(float_floordiv, float_rfloordiv, |f: &Frame, a: f64, b: f64| {
    if b == 0.0 {
        Err(f.new_zero_division_error("float floor division".to_owned()))
    } else {
        ok_float(f, (a / b).floor())
    }
});
float_binop!(float_mod, float_rmod, |f: &Frame, a: f64, b: f64| {
    if b == 0.0 {
        Err(f.new_zero_division_error("float modulo".to_owned()))
    } else {
        ok_float(f, a - b * (a / b).floor())
    }
});
float_binop!(float_pow, float_rpow, |f: &Frame, a: f64, b: f64| {
    if a == 0.0 && b < 0.0 {
        Err(f.new_zero_division_error(
            "0.0 cannot be raised to a negative power".to_owned(),
        ))
    } else {
        ok_float(f, a.powf(b))
    }
});

fn float_value(f: &Frame, zelf: &PyObjectRef) -> PyResult<f64> {
    zelf.payload_if_subclass::<PyFloat>(f.ctx())
        .map(PyFloat::value)
        .ok_or_else(|| f.new_type_error("expected a float".to_owned()))
}

fn float_neg(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ok_float(f, -float_value(f, zelf)?)
}

fn float_pos(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ok_float(f, float_value(f, zelf)?)
}

fn float_richcompare(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: CmpOp) -> PyResult {
    let ctx = f.ctx();
    let a = match v.payload_if_subclass::<PyFloat>(ctx) {
        Some(fl) => fl.value,
        None => return Ok(ctx.not_implemented()),
    };
    let b = match coerce(f, w) {
        Some(b) => b,
        None => return Ok(ctx.not_implemented()),
    };
    let result = match a.partial_cmp(&b) {
        Some(ord) => op.eval_ord(ord),
        None => op == CmpOp::Ne,
    };
    Ok(ctx.new_bool(result))
}

fn float_hash(f: &Frame, zelf: &PyObjectRef) -> PyResult<PyHash> {
    Ok(hash_float(float_value(f, zelf)?))
}

fn float_nonzero(f: &Frame, zelf: &PyObjectRef) -> PyResult<bool> {
    Ok(float_value(f, zelf)? != 0.0)
}

/// Python 2.7 shortest-round-trip rendering; integral values keep a
/// trailing `.0`.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    format!("{:?}", value)
}

fn float_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = float_value(f, zelf)?;
    Ok(f.ctx().new_str(format_float(v)).into_object())
}

fn float_int(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = float_value(f, zelf)?.trunc();
    if v >= i64::MIN as f64 && v <= i64::MAX as f64 {
        Ok(f.ctx().new_int(v as i64).into_object())
    } else {
        Ok(crate::builtins::int::int_or_long(
            f,
            BigInt::from(v as i128),
        ))
    }
}

fn float_float(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    float_pos(f, zelf)
}

fn float_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let [value] = std::mem::take(args).bind_range::<0, 1>(f, "float")?;
    let parsed = match value {
        None => 0.0,
        Some(v) => {
            if let Some((s, _)) = crate::builtins::str::text_of(f.ctx(), &v) {
                let text = s.trim();
                text.parse::<f64>().map_err(|_| {
                    f.new_value_error(format!(
                        "could not convert string to float: {}",
                        text
                    ))
                })?
            } else if let Some(value) = coerce(f, &v) {
                value
            } else if let Some(slot) = v.class().mro_find_map(|c| c.slots.float.load()) {
                let res = slot(f, &v)?;
                coerce(f, &res).ok_or_else(|| {
                    f.new_type_error(format!(
                        "__float__ returned non-float (type {})",
                        res.class().name
                    ))
                })?
            } else {
                return Err(f.new_type_error(format!(
                    "float() argument must be a string or a number, not '{}'",
                    v.class().name
                )));
            }
        }
    };
    PyFloat::from(parsed)
        .into_ref_with_type(f, cls.clone())
        .map(PyRef::into_object)
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.float_type;
    macro_rules! set {
        ($op:ident, $fwd:ident, $rfl:ident) => {
            t.slots.set_binary(BinOp::$op, $fwd);
            t.slots.set_binary_reflected(BinOp::$op, $rfl);
        };
    }
    set!(Add, float_add, float_radd);
    set!(Sub, float_sub, float_rsub);
    set!(Mul, float_mul, float_rmul);
    set!(Div, float_div, float_rdiv);
    set!(FloorDiv, float_floordiv, float_rfloordiv);
    set!(Mod, float_mod, float_rmod);
    set!(Pow, float_pow, float_rpow);
    t.slots.neg.store(Some(float_neg));
    t.slots.pos.store(Some(float_pos));
    t.slots.richcompare.store(Some(float_richcompare));
    t.slots.hash.store(Some(float_hash));
    t.slots.nonzero.store(Some(float_nonzero));
    t.slots.repr.store(Some(float_repr));
    t.slots.int.store(Some(float_int));
    t.slots.float.store(Some(float_float));
    t.slots.new.store(Some(float_new));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;

    #[test]
    fn mixed_arithmetic_goes_through_reflected_slot() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let a = ctx.new_int(1).into_object();
        let b = ctx.new_float(0.5).into_object();
        let r = ops::add(&f, &a, &b).unwrap();
        assert_eq!(r.payload::<PyFloat>().unwrap().value(), 1.5);
    }

    #[test]
    fn repr_round_trip_texture() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(f64::INFINITY), "inf");
        assert_eq!(format_float(f64::NAN), "nan");
    }

    #[test]
    fn float_eq_int() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let a = ctx.new_float(42.0).into_object();
        let b = ctx.new_int(42).into_object();
        assert!(ops::eq_bool(&f, &a, &b).unwrap());
        assert_eq!(ops::hash(&f, &a).unwrap(), ops::hash(&f, &b).unwrap());
    }
}
