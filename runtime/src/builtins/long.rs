//! The arbitrary-precision integer.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};
use pyrite_common::hash::{hash_bigint, PyHash};

use crate::builtins::float::PyFloat;
use crate::builtins::int::PyInt;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::types::slot::{BinOp, CmpOp};
use crate::PyResult;

#[derive(Debug, Clone)]
pub struct PyLong {
    value: BigInt,
}

impl From<BigInt> for PyLong {
    fn from(value: BigInt) -> Self {
        PyLong { value }
    }
}

impl PyPayload for PyLong {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.long_type
    }
}

impl PyLong {
    pub fn as_bigint(&self) -> &BigInt {
        &self.value
    }

    pub fn to_i64(&self) -> Option<i64> {
        self.value.to_i64()
    }
}

/// Accept a `long` or an `int` operand.
fn coerce(f: &Frame, obj: &PyObjectRef) -> Option<BigInt> {
    let ctx = f.ctx();
    if let Some(l) = obj.payload_if_subclass::<PyLong>(ctx) {
        return Some(l.value.clone());
    }
    obj.payload_if_subclass::<PyInt>(ctx)
        .map(|i| BigInt::from(i.value()))
}

macro_rules! long_binop {
    ($fwd:ident, $rfl:ident, $apply:expr) => {
        fn $fwd(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
            match (coerce(f, v), coerce(f, w)) {
                (Some(a), Some(b)) => ($apply)(f, a, b),
                _ => Ok(f.ctx().not_implemented()),
            }
        }
        fn $rfl(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
            // reflected: the receiver is the right operand
            match (coerce(f, w), coerce(f, v)) {
                (Some(a), Some(b)) => ($apply)(f, a, b),
                _ => Ok(f.ctx().not_implemented()),
            }
        }
    };
}

fn ok_long(f: &Frame, value: BigInt) -> PyResult {
    Ok(f.ctx().new_long(value).into_object())
}

long_binop!(long_add, long_radd, |f, a: BigInt, b: BigInt| ok_long(f, a + b));
long_binop!(long_sub, long_rsub, |f, a: BigInt, b: BigInt| ok_long(f, a - b));
long_binop!(long_mul, long_rmul, |f, a: BigInt, b: BigInt| ok_long(f, a * b));
long_binop!(long_div, long_rdiv, |f: &Frame, a: BigInt, b: BigInt| {
    if b.is_zero() {
        Err(f.new_zero_division_error(
            "integer division or modulo by zero".to_owned(),
        ))
    } else {
        ok_long(f, a.div_floor(&b))
    }
});
long_binop!(long_mod, long_rmod, |f: &Frame, a: BigInt, b: BigInt| {
    if b.is_zero() {
        Err(f.new_zero_division_error(
            "integer division or modulo by zero".to_owned(),
        ))
    } else {
        ok_long(f, a.mod_floor(&b))
    }
});
long_binop!(long_divmod, long_rdivmod, |f: &Frame, a: BigInt, b: BigInt| {
    if b.is_zero() {
        return Err(f.new_zero_division_error(
            "integer division or modulo by zero".to_owned(),
        ));
    }
    let (q, r) = a.div_mod_floor(&b);
    let q = f.ctx().new_long(q).into_object();
    let r = f.ctx().new_long(r).into_object();
    Ok(f.ctx().new_tuple(vec![q, r]).into_object())
});
long_binop!(long_pow, long_rpow, |f: &Frame, a: BigInt, b: BigInt| {
    if b.is_negative() {
        let base = a.to_f64().unwrap_or(f64::INFINITY);
        let exp = b.to_f64().unwrap_or(f64::NEG_INFINITY);
        if base == 0.0 {
            return Err(f.new_zero_division_error(
                "0.0 cannot be raised to a negative power".to_owned(),
            ));
        }
        return Ok(f.ctx().new_float(base.powf(exp)).into_object());
    }
    let exp = b.to_u64().ok_or_else(|| {
        f.new_overflow_error("result too large".to_owned())
    })?;
    ok_long(f, num_traits::pow::Pow::pow(a, exp))
});
long_binop!(long_and, long_rand, |f, a: BigInt, b: BigInt| ok_long(f, a & b));
long_binop!(long_or, long_ror, |f, a: BigInt, b: BigInt| ok_long(f, a | b));
long_binop!(long_xor, long_rxor, |f, a: BigInt, b: BigInt| ok_long(f, a ^ b));
long_binop!(long_lshift, long_rlshift, |f: &Frame, a: BigInt, b: BigInt| {
    if b.is_negative() {
        return Err(f.new_value_error("negative shift count".to_owned()));
    }
    let shift = b
        .to_usize()
        .ok_or_else(|| f.new_overflow_error("result too large".to_owned()))?;
    ok_long(f, a << shift)
});
long_binop!(long_rshift, long_rrshift, |f: &Frame, a: BigInt, b: BigInt| {
    if b.is_negative() {
        return Err(f.new_value_error("negative shift count".to_owned()));
    }
    let shift = b
        .to_usize()
        .ok_or_else(|| f.new_overflow_error("result too large".to_owned()))?;
    ok_long(f, a >> shift)
});

fn long_value<'a>(f: &Frame, zelf: &'a PyObjectRef) -> PyResult<&'a PyLong> {
    zelf.payload_if_subclass::<PyLong>(f.ctx())
        .ok_or_else(|| f.new_type_error("expected a long".to_owned()))
}

fn long_neg(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = long_value(f, zelf)?;
    ok_long(f, -v.value.clone())
}

fn long_pos(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = long_value(f, zelf)?;
    ok_long(f, v.value.clone())
}

fn long_invert(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = long_value(f, zelf)?;
    ok_long(f, !v.value.clone())
}

fn long_richcompare(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: CmpOp) -> PyResult {
    let ctx = f.ctx();
    let a = match v.payload_if_subclass::<PyLong>(ctx) {
        Some(l) => l.value.clone(),
        None => return Ok(ctx.not_implemented()),
    };
    let ord = if let Some(b) = coerce(f, w) {
        a.cmp(&b)
    } else if let Some(fl) = w.payload_if_subclass::<PyFloat>(ctx) {
        let left = a.to_f64().unwrap_or(f64::INFINITY);
        match left.partial_cmp(&fl.value()) {
            Some(ord) => ord,
            None => return Ok(ctx.new_bool(op == CmpOp::Ne)),
        }
    } else {
        return Ok(ctx.not_implemented());
    };
    Ok(ctx.new_bool(op.eval_ord(ord)))
}

fn long_hash(f: &Frame, zelf: &PyObjectRef) -> PyResult<PyHash> {
    let v = long_value(f, zelf)?;
    Ok(hash_bigint(&v.value))
}

fn long_nonzero(f: &Frame, zelf: &PyObjectRef) -> PyResult<bool> {
    Ok(!long_value(f, zelf)?.value.is_zero())
}

fn long_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = long_value(f, zelf)?;
    Ok(f.ctx().new_str(format!("{}L", v.value)).into_object())
}

fn long_str(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = long_value(f, zelf)?;
    Ok(f.ctx().new_str(v.value.to_string()).into_object())
}

fn long_index(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    long_pos(f, zelf)
}

fn long_float(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = long_value(f, zelf)?;
    let as_float = v.value.to_f64().ok_or_else(|| {
        f.new_overflow_error("long int too large to convert to float".to_owned())
    })?;
    Ok(f.ctx().new_float(as_float).into_object())
}

fn long_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let ctx = f.ctx();
    let [value, base] = std::mem::take(args).bind_range::<0, 2>(f, "long")?;
    let result = match value {
        None => BigInt::from(0),
        Some(v) => {
            if let Some((s, _)) = crate::builtins::str::text_of(ctx, &v) {
                let base = match base {
                    None => 10,
                    Some(b) => crate::ops::index(f, &b)? as u32,
                };
                let text = s.trim().trim_end_matches(|c| c == 'l' || c == 'L');
                crate::builtins::int::parse_int_literal(f, text, base)?
            } else if base.is_some() {
                return Err(f.new_type_error(
                    "long() can't convert non-string with explicit base".to_owned(),
                ));
            } else if let Some(b) = coerce(f, &v) {
                b
            } else if let Some(fl) = v.payload_if_subclass::<PyFloat>(ctx) {
                BigInt::from(fl.value().trunc() as i64)
            } else {
                return Err(f.new_type_error(format!(
                    "long() argument must be a string or a number, not '{}'",
                    v.class().name
                )));
            }
        }
    };
    PyLong::from(result)
        .into_ref_with_type(f, cls.clone())
        .map(PyRef::into_object)
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.long_type;
    macro_rules! set {
        ($op:ident, $fwd:ident, $rfl:ident) => {
            t.slots.set_binary(BinOp::$op, $fwd);
            t.slots.set_binary_reflected(BinOp::$op, $rfl);
        };
    }
    set!(Add, long_add, long_radd);
    set!(Sub, long_sub, long_rsub);
    set!(Mul, long_mul, long_rmul);
    set!(Div, long_div, long_rdiv);
    set!(FloorDiv, long_div, long_rdiv);
    set!(Mod, long_mod, long_rmod);
    set!(DivMod, long_divmod, long_rdivmod);
    set!(Pow, long_pow, long_rpow);
    set!(LShift, long_lshift, long_rlshift);
    set!(RShift, long_rshift, long_rrshift);
    set!(And, long_and, long_rand);
    set!(Or, long_or, long_ror);
    set!(Xor, long_xor, long_rxor);
    t.slots.neg.store(Some(long_neg));
    t.slots.pos.store(Some(long_pos));
    t.slots.invert.store(Some(long_invert));
    t.slots.richcompare.store(Some(long_richcompare));
    t.slots.hash.store(Some(long_hash));
    t.slots.nonzero.store(Some(long_nonzero));
    t.slots.repr.store(Some(long_repr));
    t.slots.str.store(Some(long_str));
    t.slots.index.store(Some(long_index));
    t.slots.int.store(Some(long_index));
    t.slots.float.store(Some(long_float));
    t.slots.new.store(Some(long_new));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;

    #[test]
    fn mixed_int_long_arithmetic() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let a = ctx.new_int(2).into_object();
        let b = ctx.new_long(BigInt::from(40)).into_object();
        // int.__add__ declines, long.__radd__ handles
        let r = ops::add(&f, &a, &b).unwrap();
        assert_eq!(
            r.payload::<PyLong>().unwrap().as_bigint().to_i64(),
            Some(42)
        );
    }

    #[test]
    fn long_repr_has_suffix() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let l = ctx.new_long(BigInt::from(7)).into_object();
        assert_eq!(ops::repr_str(&f, &l).unwrap(), "7L");
        assert_eq!(ops::to_str_string(&f, &l).unwrap(), "7");
    }

    #[test]
    fn int_long_equality() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let a = ctx.new_int(5).into_object();
        let b = ctx.new_long(BigInt::from(5)).into_object();
        assert!(ops::eq_bool(&f, &a, &b).unwrap());
        assert_eq!(
            ops::hash(&f, &a).unwrap(),
            ops::hash(&f, &b).unwrap()
        );
    }
}
