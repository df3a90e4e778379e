//! `str`, `unicode` and their abstract parent `basestring`.
//!
//! Both concrete types store UTF-8 host strings; `str` models the byte
//! string of Python 2 well enough for the ASCII-centered contracts here.

use pyrite_common::hash::PyHash;

use crate::builtins::int::PyInt;
use crate::builtins::long::PyLong;
use crate::builtins::slice::PySlice;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{PyObjectRef, PyPayload, PyRef};
use crate::protocol;
use crate::types::slot::{BinOp, CmpOp};
use crate::{ops, PyResult};

#[derive(Debug, Clone)]
pub struct PyStr {
    value: String,
}

pub type PyStrRef = PyRef<PyStr>;

impl From<String> for PyStr {
    fn from(value: String) -> Self {
        PyStr { value }
    }
}

impl From<&str> for PyStr {
    fn from(value: &str) -> Self {
        PyStr {
            value: value.to_owned(),
        }
    }
}

impl PyPayload for PyStr {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.str_type
    }
}

impl PyStr {
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Clone)]
pub struct PyUnicode {
    value: String,
}

impl From<String> for PyUnicode {
    fn from(value: String) -> Self {
        PyUnicode { value }
    }
}

impl PyPayload for PyUnicode {
    fn class(ctx: &Context) -> &PyTypeRef {
        &ctx.types.unicode_type
    }
}

impl PyUnicode {
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

/// Either string flavor's text.
pub(crate) fn text_of(ctx: &Context, obj: &PyObjectRef) -> Option<(String, bool)> {
    if let Some(s) = obj.payload_if_subclass::<PyStr>(ctx) {
        return Some((s.value.clone(), false));
    }
    obj.payload_if_subclass::<PyUnicode>(ctx)
        .map(|u| (u.value.clone(), true))
}

/// Python 2 string repr: single quotes preferred, escapes for the quote in
/// use, backslashes, control characters and non-ASCII bytes.
pub(crate) fn escape_str(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || (c as u32) >= 0x7f => {
                for b in c.to_string().bytes() {
                    out.push_str(&format!("\\x{:02x}", b));
                }
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn repr_quote(value: &str) -> char {
    if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    }
}

fn str_value(f: &Frame, zelf: &PyObjectRef) -> PyResult<String> {
    zelf.payload_if_subclass::<PyStr>(f.ctx())
        .map(|s| s.value.clone())
        .ok_or_else(|| f.new_type_error("expected a str".to_owned()))
}

fn str_add(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    let a = str_value(f, v)?;
    match text_of(ctx, w) {
        Some((b, false)) => Ok(ctx.new_str(a + &b).into_object()),
        Some((b, true)) => Ok(ctx.new_unicode(a + &b).into_object()),
        None => Err(f.new_type_error(format!(
            "cannot concatenate 'str' and '{}' objects",
            w.class().name
        ))),
    }
}

fn repeat_count(f: &Frame, obj: &PyObjectRef) -> PyResult<Option<i64>> {
    let ctx = f.ctx();
    if let Some(i) = obj.payload_if_subclass::<PyInt>(ctx) {
        return Ok(Some(i.value()));
    }
    if let Some(l) = obj.payload_if_subclass::<PyLong>(ctx) {
        return Ok(Some(l.to_i64().ok_or_else(|| {
            f.new_overflow_error("result too large".to_owned())
        })?));
    }
    Ok(None)
}

fn repeat_text(f: &Frame, text: &str, count: i64) -> PyResult<String> {
    if count <= 0 {
        return Ok(String::new());
    }
    protocol::checked_mul(f, text.len(), count as usize)?;
    Ok(text.repeat(count as usize))
}

fn str_mul(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    let a = str_value(f, v)?;
    match repeat_count(f, w)? {
        Some(n) => Ok(f.ctx().new_str(repeat_text(f, &a, n)?).into_object()),
        None => Ok(f.ctx().not_implemented()),
    }
}

fn str_rmul(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    str_mul(f, v, w)
}

fn str_len(f: &Frame, zelf: &PyObjectRef) -> PyResult<usize> {
    Ok(str_value(f, zelf)?.len())
}

fn string_getitem(f: &Frame, text: &str, key: &PyObjectRef) -> PyResult<String> {
    let chars: Vec<char> = text.chars().collect();
    if let Some(slice) = key.payload::<PySlice>() {
        let indices = slice.indices(f, chars.len())?;
        let mut out = String::with_capacity(indices.len);
        let mut i = indices.start;
        while i != indices.term() {
            out.push(chars[i as usize]);
            i += indices.step;
        }
        return Ok(out);
    }
    let idx = ops::index(f, key)?;
    let pos = protocol::normalize_index(idx, chars.len())
        .ok_or_else(|| f.new_index_error("string index out of range".to_owned()))?;
    Ok(chars[pos].to_string())
}

fn str_getitem(f: &Frame, zelf: &PyObjectRef, key: &PyObjectRef) -> PyResult {
    let text = str_value(f, zelf)?;
    Ok(f.ctx().new_str(string_getitem(f, &text, key)?).into_object())
}

fn str_contains(f: &Frame, zelf: &PyObjectRef, item: &PyObjectRef) -> PyResult<bool> {
    let a = str_value(f, zelf)?;
    match text_of(f.ctx(), item) {
        Some((needle, _)) => Ok(a.contains(&needle)),
        None => Err(f.new_type_error(format!(
            "'in <string>' requires string as left operand, not {}",
            item.class().name
        ))),
    }
}

fn str_richcompare(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: CmpOp) -> PyResult {
    let ctx = f.ctx();
    let a = match v.payload_if_subclass::<PyStr>(ctx) {
        Some(s) => s.value.clone(),
        None => return Ok(ctx.not_implemented()),
    };
    match text_of(ctx, w) {
        Some((b, _)) => Ok(ctx.new_bool(op.eval_ord(a.cmp(&b)))),
        None => Ok(ctx.not_implemented()),
    }
}

fn str_hash(f: &Frame, zelf: &PyObjectRef) -> PyResult<PyHash> {
    let ctx = f.ctx();
    Ok(ctx.hash_secret.hash_str(&str_value(f, zelf)?))
}

fn str_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = str_value(f, zelf)?;
    let quote = repr_quote(&v);
    Ok(f.ctx().new_str(escape_str(&v, quote)).into_object())
}

fn str_str(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    if zelf.class().is(&ctx.types.str_type) {
        Ok(zelf.clone())
    } else {
        Ok(ctx.new_str(str_value(f, zelf)?).into_object())
    }
}

fn str_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let ctx = f.ctx();
    let [value] = std::mem::take(args).bind_range::<0, 1>(f, "str")?;
    let text = match value {
        None => String::new(),
        Some(v) => ops::to_str_string(f, &v)?,
    };
    if cls.is(&ctx.types.str_type) {
        Ok(ctx.new_str(text).into_object())
    } else {
        PyStr::from(text)
            .into_ref_with_type(f, cls.clone())
            .map(PyRef::into_object)
    }
}

// ---------------------------------------------------------------------------
// unicode

fn unicode_value(f: &Frame, zelf: &PyObjectRef) -> PyResult<String> {
    zelf.payload_if_subclass::<PyUnicode>(f.ctx())
        .map(|u| u.value.clone())
        .ok_or_else(|| f.new_type_error("expected a unicode".to_owned()))
}

fn unicode_add(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    let ctx = f.ctx();
    let a = unicode_value(f, v)?;
    match text_of(ctx, w) {
        Some((b, _)) => Ok(ctx.new_unicode(a + &b).into_object()),
        None => Err(f.new_type_error(format!(
            "cannot concatenate 'unicode' and '{}' objects",
            w.class().name
        ))),
    }
}

fn unicode_radd(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    // str + unicode coerces to unicode
    let ctx = f.ctx();
    let a = unicode_value(f, v)?;
    match text_of(ctx, w) {
        Some((b, _)) => Ok(ctx.new_unicode(b + &a).into_object()),
        None => Ok(ctx.not_implemented()),
    }
}

fn unicode_mul(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
    let a = unicode_value(f, v)?;
    match repeat_count(f, w)? {
        Some(n) => Ok(f.ctx().new_unicode(repeat_text(f, &a, n)?).into_object()),
        None => Ok(f.ctx().not_implemented()),
    }
}

fn unicode_len(f: &Frame, zelf: &PyObjectRef) -> PyResult<usize> {
    Ok(unicode_value(f, zelf)?.chars().count())
}

fn unicode_getitem(f: &Frame, zelf: &PyObjectRef, key: &PyObjectRef) -> PyResult {
    let text = unicode_value(f, zelf)?;
    Ok(f
        .ctx()
        .new_unicode(string_getitem(f, &text, key)?)
        .into_object())
}

fn unicode_contains(f: &Frame, zelf: &PyObjectRef, item: &PyObjectRef) -> PyResult<bool> {
    let a = unicode_value(f, zelf)?;
    match text_of(f.ctx(), item) {
        Some((needle, _)) => Ok(a.contains(&needle)),
        None => Err(f.new_type_error(format!(
            "'in <string>' requires string as left operand, not {}",
            item.class().name
        ))),
    }
}

fn unicode_richcompare(f: &Frame, v: &PyObjectRef, w: &PyObjectRef, op: CmpOp) -> PyResult {
    let ctx = f.ctx();
    let a = match v.payload_if_subclass::<PyUnicode>(ctx) {
        Some(u) => u.value.clone(),
        None => return Ok(ctx.not_implemented()),
    };
    match text_of(ctx, w) {
        Some((b, _)) => Ok(ctx.new_bool(op.eval_ord(a.cmp(&b)))),
        None => Ok(ctx.not_implemented()),
    }
}

fn unicode_hash(f: &Frame, zelf: &PyObjectRef) -> PyResult<PyHash> {
    // equal str and unicode values hash alike
    Ok(f.ctx().hash_secret.hash_str(&unicode_value(f, zelf)?))
}

fn unicode_repr(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = unicode_value(f, zelf)?;
    let quote = repr_quote(&v);
    Ok(f
        .ctx()
        .new_str(format!("u{}", escape_str(&v, quote)))
        .into_object())
}

fn unicode_str(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    let v = unicode_value(f, zelf)?;
    if v.is_ascii() {
        Ok(f.ctx().new_str(v).into_object())
    } else {
        Err(f.new_exception_msg(
            f.ctx().exceptions.unicode_encode_error.clone(),
            "'ascii' codec can't encode character".to_owned(),
        ))
    }
}

fn unicode_new(f: &Frame, cls: &PyTypeRef, args: &mut FuncArgs) -> PyResult {
    let ctx = f.ctx();
    let [value] = std::mem::take(args).bind_range::<0, 1>(f, "unicode")?;
    let text = match value {
        None => String::new(),
        Some(v) => match text_of(ctx, &v) {
            Some((text, _)) => text,
            None => ops::to_str_string(f, &v)?,
        },
    };
    PyUnicode::from(text)
        .into_ref_with_type(f, cls.clone())
        .map(PyRef::into_object)
}

/// The receiver of a string method, accepting either flavor.
fn method_text(f: &Frame, zelf: &PyObjectRef) -> PyResult<String> {
    text_of(f.ctx(), zelf)
        .map(|(text, _)| text)
        .ok_or_else(|| f.new_type_error("expected a string".to_owned()))
}

fn argument_text(f: &Frame, obj: &PyObjectRef, method: &str) -> PyResult<String> {
    text_of(f.ctx(), obj).map(|(text, _)| text).ok_or_else(|| {
        f.new_type_error(format!(
            "{}() argument must be a string, not '{}'",
            method,
            obj.class().name
        ))
    })
}

fn install_string_methods(ctx: &Context, t: &PyTypeRef) {
    t.set_str_attr(
        "join",
        ctx.new_builtin_func("join", |f, args| {
            let [zelf, iterable] = args.bind_exact::<2>(f, "join")?;
            let sep = method_text(f, &zelf)?;
            let mut parts: Vec<String> = Vec::new();
            crate::protocol::for_each(f, &iterable, &mut |item| {
                match text_of(f.ctx(), &item) {
                    Some((text, _)) => {
                        parts.push(text);
                        Ok(())
                    }
                    None => Err(f.new_type_error(format!(
                        "sequence item {}: expected string, {} found",
                        parts.len(),
                        item.class().name
                    ))),
                }
            })?;
            Ok(f.ctx().new_str(parts.join(&sep)).into_object())
        }),
    );
    t.set_str_attr(
        "split",
        ctx.new_builtin_func("split", |f, args| {
            let [zelf, sep] = args.bind_range::<1, 2>(f, "split")?;
            let zelf = zelf.unwrap_or_else(|| unreachable!("receiver bound"));
            let text = method_text(f, &zelf)?;
            let ctx = f.ctx();
            let pieces: Vec<PyObjectRef> = match sep.filter(|s| !ctx.is_none(s)) {
                None => text
                    .split_whitespace()
                    .map(|p| ctx.new_str(p).into_object())
                    .collect(),
                Some(sep) => {
                    let sep = argument_text(f, &sep, "split")?;
                    if sep.is_empty() {
                        return Err(f.new_value_error("empty separator".to_owned()));
                    }
                    text.split(&sep)
                        .map(|p| ctx.new_str(p).into_object())
                        .collect()
                }
            };
            Ok(ctx.new_list(pieces).into_object())
        }),
    );
    t.set_str_attr(
        "startswith",
        ctx.new_builtin_func("startswith", |f, args| {
            let [zelf, prefix] = args.bind_exact::<2>(f, "startswith")?;
            let text = method_text(f, &zelf)?;
            let prefix = argument_text(f, &prefix, "startswith")?;
            Ok(f.ctx().new_bool(text.starts_with(&prefix)))
        }),
    );
    t.set_str_attr(
        "endswith",
        ctx.new_builtin_func("endswith", |f, args| {
            let [zelf, suffix] = args.bind_exact::<2>(f, "endswith")?;
            let text = method_text(f, &zelf)?;
            let suffix = argument_text(f, &suffix, "endswith")?;
            Ok(f.ctx().new_bool(text.ends_with(&suffix)))
        }),
    );
    t.set_str_attr(
        "find",
        ctx.new_builtin_func("find", |f, args| {
            let [zelf, needle] = args.bind_exact::<2>(f, "find")?;
            let text = method_text(f, &zelf)?;
            let needle = argument_text(f, &needle, "find")?;
            let index = match text.find(&needle) {
                Some(byte_pos) => text[..byte_pos].chars().count() as i64,
                None => -1,
            };
            Ok(f.ctx().new_int(index).into_object())
        }),
    );
    t.set_str_attr(
        "replace",
        ctx.new_builtin_func("replace", |f, args| {
            let [zelf, old, new] = args.bind_exact::<3>(f, "replace")?;
            let text = method_text(f, &zelf)?;
            let old = argument_text(f, &old, "replace")?;
            let new = argument_text(f, &new, "replace")?;
            Ok(f.ctx().new_str(text.replace(&old, &new)).into_object())
        }),
    );
    t.set_str_attr(
        "strip",
        ctx.new_builtin_func("strip", |f, args| {
            let [zelf, chars] = args.bind_range::<1, 2>(f, "strip")?;
            let zelf = zelf.unwrap_or_else(|| unreachable!("receiver bound"));
            let text = method_text(f, &zelf)?;
            let ctx = f.ctx();
            let stripped = match chars.filter(|c| !ctx.is_none(c)) {
                None => text.trim().to_owned(),
                Some(chars) => {
                    let set: Vec<char> =
                        argument_text(f, &chars, "strip")?.chars().collect();
                    text.trim_matches(|c| set.contains(&c)).to_owned()
                }
            };
            Ok(ctx.new_str(stripped).into_object())
        }),
    );
    t.set_str_attr(
        "upper",
        ctx.new_builtin_func("upper", |f, args| {
            let [zelf] = args.bind_exact::<1>(f, "upper")?;
            let text = method_text(f, &zelf)?;
            Ok(f.ctx().new_str(text.to_uppercase()).into_object())
        }),
    );
    t.set_str_attr(
        "lower",
        ctx.new_builtin_func("lower", |f, args| {
            let [zelf] = args.bind_exact::<1>(f, "lower")?;
            let text = method_text(f, &zelf)?;
            Ok(f.ctx().new_str(text.to_lowercase()).into_object())
        }),
    );
}

pub(crate) fn init(ctx: &Context) {
    let t = &ctx.types.str_type;
    t.slots.set_binary(BinOp::Add, str_add);
    t.slots.set_binary(BinOp::Mul, str_mul);
    t.slots.set_binary_reflected(BinOp::Mul, str_rmul);
    t.slots.len.store(Some(str_len));
    t.slots.getitem.store(Some(str_getitem));
    t.slots.contains.store(Some(str_contains));
    t.slots.richcompare.store(Some(str_richcompare));
    t.slots.hash.store(Some(str_hash));
    t.slots.repr.store(Some(str_repr));
    t.slots.str.store(Some(str_str));
    t.slots.new.store(Some(str_new));
    install_string_methods(ctx, t);

    let u = &ctx.types.unicode_type;
    u.slots.set_binary(BinOp::Add, unicode_add);
    u.slots.set_binary_reflected(BinOp::Add, unicode_radd);
    u.slots.set_binary(BinOp::Mul, unicode_mul);
    u.slots.set_binary_reflected(BinOp::Mul, unicode_mul);
    u.slots.len.store(Some(unicode_len));
    u.slots.getitem.store(Some(unicode_getitem));
    u.slots.contains.store(Some(unicode_contains));
    u.slots.richcompare.store(Some(unicode_richcompare));
    u.slots.hash.store(Some(unicode_hash));
    u.slots.repr.store(Some(unicode_repr));
    u.slots.str.store(Some(unicode_str));
    u.slots.new.store(Some(unicode_new));
    install_string_methods(ctx, u);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops;

    #[test]
    fn repr_escaping() {
        assert_eq!(escape_str("abc", '\''), "'abc'");
        assert_eq!(escape_str("a'b", '"'), "\"a'b\"");
        assert_eq!(escape_str("a\nb", '\''), "'a\\nb'");
        assert_eq!(escape_str("a\\b", '\''), "'a\\\\b'");
    }

    #[test]
    fn concat_and_repeat() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let a = ctx.new_str("ab").into_object();
        let b = ctx.new_str("cd").into_object();
        let r = ops::add(&f, &a, &b).unwrap();
        assert_eq!(r.payload::<PyStr>().unwrap().as_str(), "abcd");

        let three = ctx.new_int(3).into_object();
        let r = ops::mul(&f, &a, &three).unwrap();
        assert_eq!(r.payload::<PyStr>().unwrap().as_str(), "ababab");
        // int * str goes through the reflected slot
        let r = ops::mul(&f, &three, &a).unwrap();
        assert_eq!(r.payload::<PyStr>().unwrap().as_str(), "ababab");
    }

    #[test]
    fn concat_type_error_message() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let a = ctx.new_str("ab").into_object();
        let b = ctx.new_int(1).into_object();
        let err = ops::add(&f, &a, &b).unwrap_err();
        assert_eq!(err.message(), "cannot concatenate 'str' and 'int' objects");
    }

    #[test]
    fn slicing() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let s = ctx.new_str("hello").into_object();
        let sl = ctx
            .new_slice(
                None,
                None,
                Some(ctx.new_int(-1).into_object()),
            )
            .into_object();
        let r = ops::get_item(&f, &s, &sl).unwrap();
        assert_eq!(r.payload::<PyStr>().unwrap().as_str(), "olleh");
    }

    #[test]
    fn string_methods() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let s = ctx.new_str("a,b,c").into_object();

        let split = ops::get_attr_str(&f, &s, "split").unwrap();
        let parts = ops::invoke(&f, &split, vec![ctx.new_str(",").into_object()].into()).unwrap();
        assert_eq!(ops::len(&f, &parts).unwrap(), 3);

        let sep = ctx.new_str("-").into_object();
        let join = ops::get_attr_str(&f, &sep, "join").unwrap();
        let joined = ops::invoke(&f, &join, vec![parts].into()).unwrap();
        assert_eq!(joined.payload::<PyStr>().unwrap().as_str(), "a-b-c");

        let find = ops::get_attr_str(&f, &joined, "find").unwrap();
        let idx = ops::invoke(&f, &find, vec![ctx.new_str("b").into_object()].into()).unwrap();
        assert_eq!(
            idx.payload::<crate::builtins::int::PyInt>().unwrap().value(),
            2
        );

        let err_join = ops::invoke(
            &f,
            &ops::get_attr_str(&f, &sep, "join").unwrap(),
            vec![ctx
                .new_list(vec![ctx.new_int(1).into_object()])
                .into_object()]
            .into(),
        )
        .unwrap_err();
        assert_eq!(
            err_join.message(),
            "sequence item 0: expected string, int found"
        );
    }

    #[test]
    fn str_unicode_equality() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let s = ctx.new_str("abc").into_object();
        let u = ctx.new_unicode("abc").into_object();
        assert!(ops::eq_bool(&f, &s, &u).unwrap());
        assert_eq!(ops::hash(&f, &s).unwrap(), ops::hash(&f, &u).unwrap());
        assert_eq!(ops::repr_str(&f, &u).unwrap(), "u'abc'");
    }
}
