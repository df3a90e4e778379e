//! The machine-word integer. Results that no longer fit promote to `long`,
//! the way Python 2 arithmetic does.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::ToPrimitive;
use pyrite_common::hash::{mod_int, PyHash};

use crate::builtins::float::PyFloat;
use crate::builtins::long::PyLong;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::types::slot::{BinOp, CmpOp};
use crate::PyResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyInt {
    value: i64,
}

impl From<i64> for PyInt {
    fn from(value: i64) -> Self {
        PyInt { value }
    }
}

impl PyPayload for PyInt {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.int_type
    }
}

impl PyInt {
    pub fn value(&self) -> i64 {
        self.value
    }
}

/// Produce an `int` when the result fits, otherwise a `long`.
pub(crate) fn int_or_long(f: &Frame, value: BigInt) -> PyObjectRef {
    let ctx = f.ctx();
    match value.to_i64() {
        Some(v) => ctx.new_int(v).into_object(),
        None => ctx.new_long(value).into_object(),
    }
}

fn operands(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> Option<(i64, i64)> {
    let ctx = f.ctx();
    let a = v.payload_if_subclass::<PyInt>(ctx)?.value;
    let b = w.payload_if_subclass::<PyInt>(ctx)?.value;
    Some((a, b))
}

macro_rules! int_checked_binop {
    ($name:ident, $checked:ident, $wide:tt) => {
        fn $name(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
            match operands(f, v, w) {
                Some((a, b)) => match a.$checked(b) {
                    Some(r) => Ok(f.ctx().new_int(r).into_object()),
                    None => Ok(int_or_long(f, BigInt::from(a) $wide BigInt::from(b))),
                },
                None => Ok(f.ctx().not_implemented()),
            }
        }
    };
}

int_checked_binop!(int_add, checked_add, +);
int_checked_binop!(int_sub, checked_sub, -);
int_checked_binop!(int_mul, checked_mul, *);

fn div_parts(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult<Option<(i64, i64)>> {
    match operands(f, v, w) {
        Some((_, 0)) => Err(f.new_zero_division_error(
            "integer division or modulo by zero".to_owned(),
        )),
        pair => Ok(pair),
    }
}

fn int_div(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    match div_parts(f, v, w)? {
        // MIN // -1 is the one overflowing case
        Some((a, b)) => match a.checked_div_euclid(b) {
            Some(_) => Ok(f.ctx().new_int(a.div_floor(&b)).into_object()),
            None => Ok(int_or_long(f, BigInt::from(a) / BigInt::from(b))),
        },
        None => Ok(f.ctx().not_implemented()),
    }
}

fn int_mod(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    match div_parts(f, v, w)? {
        Some((a, b)) => Ok(f.ctx().new_int(a.mod_floor(&b)).into_object()),
        None => Ok(f.ctx().not_implemented()),
    }
}

fn int_divmod(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    match div_parts(f, v, w)? {
        Some((a, b)) => {
            let q = int_div(f, v, w)?;
            let r = f.ctx().new_int(a.mod_floor(&b)).into_object();
            Ok(f.ctx().new_tuple(vec![q, r]).into_object())
        }
        None => Ok(f.ctx().not_implemented()),
    }
}

fn int_pow(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    match operands(f, v, w) {
        Some((a, b)) => {
            if b < 0 {
                if a == 0 {
                    return Err(f.new_zero_division_error(
                        "0.0 cannot be raised to a negative power".to_owned(),
                    ));
                }
                return Ok(ctx.new_float((a as f64).powf(b as f64)).into_object());
            }
            let result = num_traits::pow::Pow::pow(BigInt::from(a), b as u64);
            Ok(int_or_long(f, result))
        }
        None => Ok(ctx.not_implemented()),
    }
}

fn int_lshift(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    match operands(f, v, w) {
        Some((a, b)) => {
            if b < 0 {
                return Err(f.new_value_error("negative shift count".to_owned()));
            }
            if b < 63 {
                if let Some(r) = a.checked_shl(b as u32).filter(|r| r >> b == a) {
                    return Ok(f.ctx().new_int(r).into_object());
                }
            }
            Ok(int_or_long(f, BigInt::from(a) << (b as usize)))
        }
        None => Ok(f.ctx().not_implemented()),
    }
}

fn int_rshift(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    match operands(f, v, w) {
        Some((a, b)) => {
            if b < 0 {
                return Err(f.new_value_error("negative shift count".to_owned()));
            }
            let r = if b >= 64 {
                if a < 0 {
                    -1
                } else {
                    0
                }
            } else {
                a >> b
            };
            Ok(f.ctx().new_int(r).into_object())
        }
        None => Ok(f.ctx().not_implemented()),
    }
}

macro_rules! int_bitop {
    ($name:ident, $op:tt) => {
        fn $name(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
            match operands(f, v, w) {
                Some((a, b)) => Ok(f.ctx().new_int(a $op b).into_object()),
                None => Ok(f.ctx().not_implemented()),
            }
        }
    };
}

int_bitop!(int_and, &);
int_bitop!(int_or, |);
int_bitop!(int_xor, ^);

fn int_neg(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = zelf
        .payload_if_subclass::<PyInt>(f.ctx())
        .map(PyInt::value)
        .ok_or_else(|| f.new_type_error("expected an int".to_owned()))?;
    match v.checked_neg() {
        Some(r) => Ok(f.ctx().new_int(r).into_object()),
        None => Ok(int_or_long(f, -BigInt::from(v))),
    }
}

fn int_pos(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = zelf
        .payload_if_subclass::<PyInt>(f.ctx())
        .map(PyInt::value)
        .ok_or_else(|| f.new_type_error("expected an int".to_owned()))?;
    Ok(f.ctx().new_int(v).into_object())
}

fn int_invert(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = zelf
        .payload_if_subclass::<PyInt>(f.ctx())
        .map(PyInt::value)
        .ok_or_else(|| f.new_type_error("expected an int".to_owned()))?;
    Ok(f.ctx().new_int(!v).into_object())
}

fn int_richcompare(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: CmpOp) -> PyResult {
    let ctx = f.ctx();
    let a = match v.payload_if_subclass::<PyInt>(ctx) {
        Some(i) => i.value,
        None => return Ok(ctx.not_implemented()),
    };
    let ord = if let Some(i) = w.payload_if_subclass::<PyInt>(ctx) {
        a.cmp(&i.value)
    } else if let Some(l) = w.payload_if_subclass::<PyLong>(ctx) {
        BigInt::from(a).cmp(l.as_bigint())
    } else if let Some(fl) = w.payload_if_subclass::<PyFloat>(ctx) {
        match (a as f64).partial_cmp(&fl.value()) {
            Some(ord) => ord,
            None => return Ok(ctx.new_bool(op == CmpOp::Ne)),
        }
    } else {
        return Ok(ctx.not_implemented());
    };
    Ok(ctx.new_bool(op.eval_ord(ord)))
}

fn int_hash(f: &Frame, zelf: &PyObjectRef) -> PyResult<PyHash> {
    let v = zelf
        .payload_if_subclass::<PyInt>(f.ctx())
        .map(PyInt::value)
        .ok_or_else(|| f.new_type_error("expected an int".to_owned()))?;
    Ok(mod_int(v))
}

fn int_nonzero(f: &Frame, zelf: &PyObjectRef) -> PyResult<bool> {
    Ok(zelf
        .payload_if_subclass::<PyInt>(f.ctx())
        .map(PyInt::value)
        .unwrap_or(0)
        != 0)
}

fn int_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = zelf
        .payload_if_subclass::<PyInt>(f.ctx())
        .map(PyInt::value)
        .ok_or_else(|| f.new_type_error("expected an int".to_owned()))?;
    Ok(f.ctx().new_str(v.to_string()).into_object())
}

fn int_index(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    int_pos(f, zelf)
}

fn int_float(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = zelf
        .payload_if_subclass::<PyInt>(f.ctx())
        .map(PyInt::value)
        .ok_or_else(|| f.new_type_error("expected an int".to_owned()))?;
    Ok(f.ctx().new_float(v as f64).into_object())
}

pub(crate) fn parse_int_literal(f: &Frame, text: &str, base: u32) -> PyResult<BigInt> {
    let trimmed = text.trim();
    let parsed = if trimmed.is_empty() {
        None
    } else {
        BigInt::parse_bytes(trimmed.as_bytes(), base)
    };
    parsed.ok_or_else(|| {
        f.new_value_error(format!(
            "invalid literal for int() with base {}: '{}'",
            base, trimmed
        ))
    })
}

fn int_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let ctx = f.ctx();
    let [value, base] = std::mem::take(args).bind_range::<0, 2>(f, "int")?;
    let result: BigInt = match value {
        None => BigInt::from(0),
        Some(v) => {
            if let Some((text, _)) = crate::builtins::str::text_of(ctx, &v) {
                let base = match base {
                    None => 10,
                    Some(b) => crate::ops::index(f, &b)? as u32,
                };
                parse_int_literal(f, &text, base)?
            } else if base.is_some() {
                return Err(
                    f.new_type_error("int() can't convert non-string with explicit base".to_owned())
                );
            } else if let Some(i) = v.payload_if_subclass::<PyInt>(ctx) {
                BigInt::from(i.value)
            } else if let Some(l) = v.payload_if_subclass::<PyLong>(ctx) {
                l.as_bigint().clone()
            } else if let Some(fl) = v.payload_if_subclass::<PyFloat>(ctx) {
                BigInt::from(fl.value().trunc() as i64)
            } else {
                let converted = crate::ops::to_int(f, &v)?;
                return Ok(converted);
            }
        }
    };

    if cls.is(&ctx.types.int_type) {
        Ok(int_or_long(f, result))
    } else {
        let small = result.to_i64().ok_or_else(|| {
            f.new_overflow_error("long int too large to convert to int".to_owned())
        })?;
        PyInt::from(small)
            .into_ref_with_type(f, cls.clone())
            .map(PyRef::into_object)
    }
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.int_type;
    t.slots.set_binary(BinOp::Add, int_add);
    t.slots.set_binary(BinOp::Sub, int_sub);
    t.slots.set_binary(BinOp::Mul, int_mul);
    t.slots.set_binary(BinOp::Div, int_div);
    t.slots.set_binary(BinOp::FloorDiv, int_div);
    t.slots.set_binary(BinOp::Mod, int_mod);
    t.slots.set_binary(BinOp::DivMod, int_divmod);
    t.slots.set_binary(BinOp::Pow, int_pow);
    t.slots.set_binary(BinOp::LShift, int_lshift);
    t.slots.set_binary(BinOp::RShift, int_rshift);
    t.slots.set_binary(BinOp::And, int_and);
    t.slots.set_binary(BinOp::Or, int_or);
    t.slots.set_binary(BinOp::Xor, int_xor);
    t.slots.neg.store(Some(int_neg));
    t.slots.pos.store(Some(int_pos));
    t.slots.invert.store(Some(int_invert));
    t.slots.richcompare.store(Some(int_richcompare));
    t.slots.hash.store(Some(int_hash));
    t.slots.nonzero.store(Some(int_nonzero));
    t.slots.repr.store(Some(int_repr));
    t.slots.index.store(Some(int_index));
    t.slots.int.store(Some(int_index));
    t.slots.float.store(Some(int_float));
    t.slots.new.store(Some(int_new));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;

    fn root() -> crate::frame::FrameRef {
        Frame::new_root(Context::global())
    }

    fn int_of(obj: &PyObjectRef) -> i64 {
        obj.payload::<PyInt>().unwrap().value()
    }

    #[test]
    fn arithmetic() {
        let f = root();
        let ctx = f.ctx();
        let a = ctx.new_int(7).into_object();
        let b = ctx.new_int(3).into_object();
        assert_eq!(int_of(&ops::add(&f, &a, &b).unwrap()), 10);
        assert_eq!(int_of(&ops::sub(&f, &a, &b).unwrap()), 4);
        assert_eq!(int_of(&ops::mul(&f, &a, &b).unwrap()), 21);
        assert_eq!(int_of(&ops::div(&f, &a, &b).unwrap()), 2);
        assert_eq!(int_of(&ops::mod_(&f, &a, &b).unwrap()), 1);
    }

    #[test]
    fn floor_semantics() {
        let f = root();
        let ctx = f.ctx();
        let a = ctx.new_int(-7).into_object();
        let b = ctx.new_int(2).into_object();
        assert_eq!(int_of(&ops::div(&f, &a, &b).unwrap()), -4);
        assert_eq!(int_of(&ops::mod_(&f, &a, &b).unwrap()), 1);
    }

    #[test]
    fn overflow_promotes_to_long() {
        let f = root();
        let ctx = f.ctx();
        let a = ctx.new_int(i64::MAX).into_object();
        let b = ctx.new_int(1).into_object();
        let r = ops::add(&f, &a, &b).unwrap();
        let l = r.payload::<PyLong>().unwrap();
        assert_eq!(
            l.as_bigint().clone(),
            BigInt::from(i64::MAX) + BigInt::from(1)
        );
    }

    #[test]
    fn division_by_zero() {
        let f = root();
        let ctx = f.ctx();
        let a = ctx.new_int(1).into_object();
        let b = ctx.new_int(0).into_object();
        let err = ops::div(&f, &a, &b).unwrap_err();
        assert_eq!(err.message(), "integer division or modulo by zero");
    }

    #[test]
    fn unsupported_operand_message() {
        let f = root();
        let ctx = f.ctx();
        let a = ctx.new_int(1).into_object();
        let b = ctx.new_str("x").into_object();
        let err = ops::sub(&f, &a, &b).unwrap_err();
        assert_eq!(
            err.message(),
            "unsupported operand type(s) for -: 'int' and 'str'"
        );
    }

    #[test]
    fn int_constructor() {
        let f = root();
        let ctx = f.ctx();
        let cls = ctx.types.int_type.clone().into_object();
        let r = ops::invoke(
            &f,
            &cls,
            vec![ctx.new_str("42").into_object()].into(),
        )
        .unwrap();
        assert_eq!(int_of(&r), 42);

        let err = ops::invoke(
            &f,
            &cls,
            vec![ctx.new_str("4x2").into_object()].into(),
        )
        .unwrap_err();
        assert_eq!(
            err.message(),
            "invalid literal for int() with base 10: '4x2'"
        );
    }
}
