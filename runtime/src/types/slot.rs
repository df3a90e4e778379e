//! Per-type operation tables.
//!
//! Every type carries a fixed record of nullable slots. A slot holds either
//! a native function or a generic wrapper that re-resolves the Python-level
//! dunder through the receiver's MRO at call time, so redefinition in a
//! class dict takes effect immediately. Conversely, native slots are
//! surfaced as callables under their dunder names when a type is prepared.

use crossbeam_utils::atomic::AtomicCell;
use pyrite_common::hash::PyHash;

use crate::builtins::int::PyInt;
use crate::builtins::str::PyStrRef;
use crate::class::PyTypeRef;
use crate::context::Context;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::PyObjectRef;
use crate::{ops, PyResult};

pub type UnaryFunc = fn(&Frame, &PyObjectRef) -> PyResult;
pub type BinaryFunc = fn(&Frame, &PyObjectRef, &PyObjectRef) -> PyResult;
pub type CallFunc = fn(&Frame, &PyObjectRef, FuncArgs) -> PyResult;
pub type GetattroFunc = fn(&Frame, &PyObjectRef, &PyStrRef) -> PyResult;
pub type SetattroFunc = fn(&Frame, &PyObjectRef, &PyStrRef, Option<&PyObjectRef>) -> PyResult<()>;
pub type DescrGetFunc =
    fn(&Frame, &PyObjectRef, Option<&PyObjectRef>, Option<&PyObjectRef>) -> PyResult;
pub type DescrSetFunc = fn(&Frame, &PyObjectRef, &PyObjectRef, Option<&PyObjectRef>) -> PyResult<()>;
pub type HashFunc = fn(&Frame, &PyObjectRef) -> PyResult<PyHash>;
pub type LenFunc = fn(&Frame, &PyObjectRef) -> PyResult<usize>;
pub type BoolFunc = fn(&Frame, &PyObjectRef) -> PyResult<bool>;
pub type RichCmpFunc = fn(&Frame, &PyObjectRef, &PyObjectRef, CmpOp) -> PyResult;
pub type SetItemFunc = fn(&Frame, &PyObjectRef, &PyObjectRef, &PyObjectRef) -> PyResult<()>;
pub type DelItemFunc = fn(&Frame, &PyObjectRef, &PyObjectRef) -> PyResult<()>;
pub type ContainsFunc = fn(&Frame, &PyObjectRef, &PyObjectRef) -> PyResult<bool>;
pub type NewFunc = fn(&Frame, &PyTypeRef, &mut FuncArgs) -> PyResult;
pub type InitFunc = fn(&Frame, &PyObjectRef, &mut FuncArgs) -> PyResult<()>;

/// The binary number operations, each with a forward, reflected and
/// in-place row in the slot table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    DivMod,
    Pow,
    LShift,
    RShift,
    And,
    Or,
    Xor,
}

pub const NUM_BINOPS: usize = 13;

impl BinOp {
    pub const ALL: [BinOp; NUM_BINOPS] = [
        BinOp::Add,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::Div,
        BinOp::FloorDiv,
        BinOp::Mod,
        BinOp::DivMod,
        BinOp::Pow,
        BinOp::LShift,
        BinOp::RShift,
        BinOp::And,
        BinOp::Or,
        BinOp::Xor,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn dunder(self) -> &'static str {
        match self {
            BinOp::Add => "__add__",
            BinOp::Sub => "__sub__",
            BinOp::Mul => "__mul__",
            BinOp::Div => "__div__",
            BinOp::FloorDiv => "__floordiv__",
            BinOp::Mod => "__mod__",
            BinOp::DivMod => "__divmod__",
            BinOp::Pow => "__pow__",
            BinOp::LShift => "__lshift__",
            BinOp::RShift => "__rshift__",
            BinOp::And => "__and__",
            BinOp::Or => "__or__",
            BinOp::Xor => "__xor__",
        }
    }

    pub fn reflected_dunder(self) -> &'static str {
        match self {
            BinOp::Add => "__radd__",
            BinOp::Sub => "__rsub__",
            BinOp::Mul => "__rmul__",
            BinOp::Div => "__rdiv__",
            BinOp::FloorDiv => "__rfloordiv__",
            BinOp::Mod => "__rmod__",
            BinOp::DivMod => "__rdivmod__",
            BinOp::Pow => "__rpow__",
            BinOp::LShift => "__rlshift__",
            BinOp::RShift => "__rrshift__",
            BinOp::And => "__rand__",
            BinOp::Or => "__ror__",
            BinOp::Xor => "__rxor__",
        }
    }

    pub fn inplace_dunder(self) -> &'static str {
        match self {
            BinOp::Add => "__iadd__",
            BinOp::Sub => "__isub__",
            BinOp::Mul => "__imul__",
            BinOp::Div => "__idiv__",
            BinOp::FloorDiv => "__ifloordiv__",
            BinOp::Mod => "__imod__",
            BinOp::DivMod => "__idivmod__",
            BinOp::Pow => "__ipow__",
            BinOp::LShift => "__ilshift__",
            BinOp::RShift => "__irshift__",
            BinOp::And => "__iand__",
            BinOp::Or => "__ior__",
            BinOp::Xor => "__ixor__",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::DivMod => "divmod()",
            BinOp::Pow => "** or pow()",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
        }
    }

    pub fn inplace_symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+=",
            BinOp::Sub => "-=",
            BinOp::Mul => "*=",
            BinOp::Div => "/=",
            BinOp::FloorDiv => "//=",
            BinOp::Mod => "%=",
            BinOp::DivMod => "divmod()",
            BinOp::Pow => "**=",
            BinOp::LShift => "<<=",
            BinOp::RShift => ">>=",
            BinOp::And => "&=",
            BinOp::Or => "|=",
            BinOp::Xor => "^=",
        }
    }

    fn from_dunder(name: &str) -> Option<(Self, SlotRow)> {
        for op in Self::ALL {
            if name == op.dunder() {
                return Some((op, SlotRow::Forward));
            }
            if name == op.reflected_dunder() {
                return Some((op, SlotRow::Reflected));
            }
            if name == op.inplace_dunder() {
                return Some((op, SlotRow::Inplace));
            }
        }
        None
    }
}

#[derive(Copy, Clone)]
enum SlotRow {
    Forward,
    Reflected,
    Inplace,
}

/// The rich comparison operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn method_name(self) -> &'static str {
        match self {
            CmpOp::Lt => "__lt__",
            CmpOp::Le => "__le__",
            CmpOp::Eq => "__eq__",
            CmpOp::Ne => "__ne__",
            CmpOp::Gt => "__gt__",
            CmpOp::Ge => "__ge__",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    /// The operation with its operands exchanged.
    pub fn swapped(self) -> Self {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
        }
    }

    /// Resolve a three-way comparison result for this operation.
    pub fn eval_ord(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CmpOp::Lt => ord == Less,
            CmpOp::Le => ord != Greater,
            CmpOp::Eq => ord == Equal,
            CmpOp::Ne => ord != Equal,
            CmpOp::Gt => ord == Greater,
            CmpOp::Ge => ord != Less,
        }
    }

    pub const ALL: [CmpOp; 6] = [
        CmpOp::Lt,
        CmpOp::Le,
        CmpOp::Eq,
        CmpOp::Ne,
        CmpOp::Gt,
        CmpOp::Ge,
    ];
}

type BinaryRow = [AtomicCell<Option<BinaryFunc>>; NUM_BINOPS];

fn empty_row() -> BinaryRow {
    std::array::from_fn(|_| AtomicCell::new(None))
}

/// The per-type table of operation slots.
pub struct SlotTable {
    pub new: AtomicCell<Option<NewFunc>>,
    pub init: AtomicCell<Option<InitFunc>>,
    pub call: AtomicCell<Option<CallFunc>>,
    pub getattro: AtomicCell<Option<GetattroFunc>>,
    pub setattro: AtomicCell<Option<SetattroFunc>>,
    pub descr_get: AtomicCell<Option<DescrGetFunc>>,
    pub descr_set: AtomicCell<Option<DescrSetFunc>>,
    pub hash: AtomicCell<Option<HashFunc>>,
    pub repr: AtomicCell<Option<UnaryFunc>>,
    pub str: AtomicCell<Option<UnaryFunc>>,
    pub nonzero: AtomicCell<Option<BoolFunc>>,
    pub len: AtomicCell<Option<LenFunc>>,
    pub richcompare: AtomicCell<Option<RichCmpFunc>>,
    pub cmp: AtomicCell<Option<BinaryFunc>>,
    pub iter: AtomicCell<Option<UnaryFunc>>,
    pub iternext: AtomicCell<Option<UnaryFunc>>,
    pub getitem: AtomicCell<Option<BinaryFunc>>,
    pub setitem: AtomicCell<Option<SetItemFunc>>,
    pub delitem: AtomicCell<Option<DelItemFunc>>,
    pub contains: AtomicCell<Option<ContainsFunc>>,
    pub index: AtomicCell<Option<UnaryFunc>>,
    pub int: AtomicCell<Option<UnaryFunc>>,
    pub float: AtomicCell<Option<UnaryFunc>>,
    pub neg: AtomicCell<Option<UnaryFunc>>,
    pub pos: AtomicCell<Option<UnaryFunc>>,
    pub invert: AtomicCell<Option<UnaryFunc>>,
    binary: BinaryRow,
    binary_reflected: BinaryRow,
    binary_inplace: BinaryRow,
}

macro_rules! for_each_simple_slot {
    ($m:ident!($self:expr, $from:expr)) => {
        $m!($self, $from, new);
        $m!($self, $from, init);
        $m!($self, $from, call);
        $m!($self, $from, getattro);
        $m!($self, $from, setattro);
        $m!($self, $from, descr_get);
        $m!($self, $from, descr_set);
        $m!($self, $from, hash);
        $m!($self, $from, repr);
        $m!($self, $from, str);
        $m!($self, $from, nonzero);
        $m!($self, $from, len);
        $m!($self, $from, richcompare);
        $m!($self, $from, cmp);
        $m!($self, $from, iter);
        $m!($self, $from, iternext);
        $m!($self, $from, getitem);
        $m!($self, $from, setitem);
        $m!($self, $from, delitem);
        $m!($self, $from, contains);
        $m!($self, $from, index);
        $m!($self, $from, int);
        $m!($self, $from, float);
        $m!($self, $from, neg);
        $m!($self, $from, pos);
        $m!($self, $from, invert);
    };
}

impl SlotTable {
    pub fn new() -> Self {
        SlotTable {
            new: AtomicCell::new(None),
            init: AtomicCell::new(None),
            call: AtomicCell::new(None),
            getattro: AtomicCell::new(None),
            setattro: AtomicCell::new(None),
            descr_get: AtomicCell::new(None),
            descr_set: AtomicCell::new(None),
            hash: AtomicCell::new(None),
            repr: AtomicCell::new(None),
            str: AtomicCell::new(None),
            nonzero: AtomicCell::new(None),
            len: AtomicCell::new(None),
            richcompare: AtomicCell::new(None),
            cmp: AtomicCell::new(None),
            iter: AtomicCell::new(None),
            iternext: AtomicCell::new(None),
            getitem: AtomicCell::new(None),
            setitem: AtomicCell::new(None),
            delitem: AtomicCell::new(None),
            contains: AtomicCell::new(None),
            index: AtomicCell::new(None),
            int: AtomicCell::new(None),
            float: AtomicCell::new(None),
            neg: AtomicCell::new(None),
            pos: AtomicCell::new(None),
            invert: AtomicCell::new(None),
            binary: empty_row(),
            binary_reflected: empty_row(),
            binary_inplace: empty_row(),
        }
    }

    pub fn binary(&self, op: BinOp) -> Option<BinaryFunc> {
        self.binary[op.index()].load()
    }

    pub fn binary_reflected(&self, op: BinOp) -> Option<BinaryFunc> {
        self.binary_reflected[op.index()].load()
    }

    pub fn binary_inplace(&self, op: BinOp) -> Option<BinaryFunc> {
        self.binary_inplace[op.index()].load()
    }

    pub fn set_binary(&self, op: BinOp, func: BinaryFunc) {
        self.binary[op.index()].store(Some(func));
    }

    pub fn set_binary_reflected(&self, op: BinOp, func: BinaryFunc) {
        self.binary_reflected[op.index()].store(Some(func));
    }

    pub fn set_binary_inplace(&self, op: BinOp, func: BinaryFunc) {
        self.binary_inplace[op.index()].store(Some(func));
    }

    /// Copy every slot this table lacks from an ancestor's table.
    pub fn inherit(&self, from: &SlotTable) {
        macro_rules! inherit_slot {
            ($self:expr, $from:expr, $field:ident) => {
                if $self.$field.load().is_none() {
                    $self.$field.store($from.$field.load());
                }
            };
        }
        for_each_simple_slot!(inherit_slot!(self, from));
        for i in 0..NUM_BINOPS {
            if self.binary[i].load().is_none() {
                self.binary[i].store(from.binary[i].load());
            }
            if self.binary_reflected[i].load().is_none() {
                self.binary_reflected[i].store(from.binary_reflected[i].load());
            }
            if self.binary_inplace[i].load().is_none() {
                self.binary_inplace[i].store(from.binary_inplace[i].load());
            }
        }
    }

    /// Install the Python-dispatch wrapper for a dunder defined (or
    /// redefined) in a class dict.
    pub(crate) fn update_from_dunder(&self, name: &str) {
        if let Some((op, row)) = BinOp::from_dunder(name) {
            let func = py_binary_dispatch(op, row);
            match row {
                SlotRow::Forward => self.binary[op.index()].store(Some(func)),
                SlotRow::Reflected => self.binary_reflected[op.index()].store(Some(func)),
                SlotRow::Inplace => self.binary_inplace[op.index()].store(Some(func)),
            }
            return;
        }
        match name {
            "__call__" => self.call.store(Some(py_call_slot)),
            "__repr__" => self.repr.store(Some(py_repr_slot)),
            "__str__" => self.str.store(Some(py_str_slot)),
            "__hash__" => self.hash.store(Some(py_hash_slot)),
            "__len__" => self.len.store(Some(py_len_slot)),
            "__nonzero__" => self.nonzero.store(Some(py_nonzero_slot)),
            "__iter__" => self.iter.store(Some(py_iter_slot)),
            "next" => self.iternext.store(Some(py_iternext_slot)),
            "__contains__" => self.contains.store(Some(py_contains_slot)),
            "__getitem__" => self.getitem.store(Some(py_getitem_slot)),
            "__setitem__" => self.setitem.store(Some(py_setitem_slot)),
            "__delitem__" => self.delitem.store(Some(py_delitem_slot)),
            "__cmp__" => self.cmp.store(Some(py_cmp_slot)),
            "__eq__" | "__ne__" | "__lt__" | "__le__" | "__gt__" | "__ge__" => {
                self.richcompare.store(Some(py_richcompare_slot))
            }
            "__get__" => self.descr_get.store(Some(py_descr_get_slot)),
            "__set__" | "__delete__" => self.descr_set.store(Some(py_descr_set_slot)),
            "__getattribute__" => self.getattro.store(Some(py_getattro_slot)),
            "__setattr__" | "__delattr__" => self.setattro.store(Some(py_setattro_slot)),
            "__neg__" => self.neg.store(Some(py_neg_slot)),
            "__pos__" => self.pos.store(Some(py_pos_slot)),
            "__invert__" => self.invert.store(Some(py_invert_slot)),
            "__index__" => self.index.store(Some(py_index_slot)),
            "__int__" => self.int.store(Some(py_int_slot)),
            "__float__" => self.float.store(Some(py_float_slot)),
            _ => {}
        }
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Generic wrappers dispatching a slot invocation back into a Python-defined
// dunder. The method is re-resolved through the receiver's MRO on each call.

macro_rules! py_binop_slots {
    ($(($op:ident, $fwd:ident, $rfl:ident, $inp:ident)),* $(,)?) => {
        $(
            fn $fwd(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
                ops::call_class_attr(f, v, BinOp::$op.dunder(), vec![w.clone()])
            }
            fn $rfl(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
                ops::call_class_attr(f, v, BinOp::$op.reflected_dunder(), vec![w.clone()])
            }
            fn $inp(f: &Frame, v: &PyObjectRef, w: &PyObjectRef) -> PyResult {
                ops::call_class_attr(f, v, BinOp::$op.inplace_dunder(), vec![w.clone()])
            }
        )*
        fn py_binary_dispatch(op: BinOp, row: SlotRow) -> BinaryFunc {
            match (op, row) {
                $(
                    (BinOp::$op, SlotRow::Forward) => $fwd,
                    (BinOp::$op, SlotRow::Reflected) => $rfl,
                    (BinOp::$op, SlotRow::Inplace) => $inp,
                )*
            }
        }
    };
}

py_binop_slots!(
    (Add, py_add, py_radd, py_iadd),
    (Sub, py_sub, py_rsub, py_isub),
    (Mul, py_mul, py_rmul, py_imul),
    (Div, py_div, py_rdiv, py_idiv),
    (FloorDiv, py_floordiv, py_rfloordiv, py_ifloordiv),
    (Mod, py_mod, py_rmod, py_imod),
    (DivMod, py_divmod, py_rdivmod, py_idivmod),
    (Pow, py_pow, py_rpow, py_ipow),
    (LShift, py_lshift, py_rlshift, py_ilshift),
    (RShift, py_rshift, py_rrshift, py_irshift),
    (And, py_and, py_rand, py_iand),
    (Or, py_or, py_ror, py_ior),
    (Xor, py_xor, py_rxor, py_ixor),
);

fn py_call_slot(f: &Frame, zelf: &PyObjectRef, args: FuncArgs) -> PyResult {
    let method = ops::lookup_special(f, zelf, "__call__")?;
    ops::invoke(f, &method, args)
}

fn py_repr_slot(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ops::call_class_attr(f, zelf, "__repr__", vec![])
}

fn py_str_slot(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ops::call_class_attr(f, zelf, "__str__", vec![])
}

fn py_hash_slot(f: &Frame, zelf: &PyObjectRef) -> PyResult<PyHash> {
    let res = ops::call_class_attr(f, zelf, "__hash__", vec![])?;
    match res.payload_if_subclass::<PyInt>(f.ctx()) {
        Some(i) => Ok(pyrite_common::hash::mod_int(i.value())),
        None => Err(f.new_type_error("__hash__ method should return an integer".to_owned())),
    }
}

fn py_len_slot(f: &Frame, zelf: &PyObjectRef) -> PyResult<usize> {
    let res = ops::call_class_attr(f, zelf, "__len__", vec![])?;
    let len = res
        .payload_if_subclass::<PyInt>(f.ctx())
        .map(PyInt::value)
        .ok_or_else(|| f.new_type_error("an integer is required".to_owned()))?;
    if len < 0 {
        Err(f.new_value_error("__len__() should return >= 0".to_owned()))
    } else {
        Ok(len as usize)
    }
}

fn py_nonzero_slot(f: &Frame, zelf: &PyObjectRef) -> PyResult<bool> {
    let res = ops::call_class_attr(f, zelf, "__nonzero__", vec![])?;
    match res.payload_if_subclass::<PyInt>(f.ctx()) {
        Some(i) => Ok(i.value() != 0),
        None => Err(f.new_type_error(format!(
            "__nonzero__ should return bool or int, returned {}",
            res.class().name
        ))),
    }
}

fn py_iter_slot(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ops::call_class_attr(f, zelf, "__iter__", vec![])
}

fn py_iternext_slot(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ops::call_class_attr(f, zelf, "next", vec![])
}

fn py_contains_slot(f: &Frame, zelf: &PyObjectRef, item: &PyObjectRef) -> PyResult<bool> {
    let res = ops::call_class_attr(f, zelf, "__contains__", vec![item.clone()])?;
    ops::is_true(f, &res)
}

fn py_getitem_slot(f: &Frame, zelf: &PyObjectRef, key: &PyObjectRef) -> PyResult {
    ops::call_class_attr(f, zelf, "__getitem__", vec![key.clone()])
}

fn py_setitem_slot(
    f: &Frame,
    zelf: &PyObjectRef,
    key: &PyObjectRef,
    value: &PyObjectRef,
) -> PyResult<()> {
    ops::call_class_attr(f, zelf, "__setitem__", vec![key.clone(), value.clone()]).map(drop)
}

fn py_delitem_slot(f: &Frame, zelf: &PyObjectRef, key: &PyObjectRef) -> PyResult<()> {
    ops::call_class_attr(f, zelf, "__delitem__", vec![key.clone()]).map(drop)
}

fn py_cmp_slot(f: &Frame, zelf: &PyObjectRef, other: &PyObjectRef) -> PyResult {
    ops::call_class_attr(f, zelf, "__cmp__", vec![other.clone()])
}

fn py_richcompare_slot(f: &Frame, zelf: &PyObjectRef, other: &PyObjectRef, op: CmpOp) -> PyResult {
    match zelf.class().get_attr(op.method_name()) {
        Some(method) => {
            let method = ops::call_if_get_descriptor(f, method, Some(zelf), None)?;
            ops::invoke(f, &method, FuncArgs::from(vec![other.clone()]))
        }
        None => Ok(f.ctx().not_implemented()),
    }
}

fn py_descr_get_slot(
    f: &Frame,
    zelf: &PyObjectRef,
    obj: Option<&PyObjectRef>,
    cls: Option<&PyObjectRef>,
) -> PyResult {
    let ctx = f.ctx();
    let obj = obj.cloned().unwrap_or_else(|| ctx.none());
    let cls = cls.cloned().unwrap_or_else(|| ctx.none());
    ops::call_class_attr(f, zelf, "__get__", vec![obj, cls])
}

fn py_descr_set_slot(
    f: &Frame,
    zelf: &PyObjectRef,
    obj: &PyObjectRef,
    value: Option<&PyObjectRef>,
) -> PyResult<()> {
    match value {
        Some(value) => {
            ops::call_class_attr(f, zelf, "__set__", vec![obj.clone(), value.clone()]).map(drop)
        }
        None => ops::call_class_attr(f, zelf, "__delete__", vec![obj.clone()]).map(drop),
    }
}

fn py_getattro_slot(f: &Frame, zelf: &PyObjectRef, name: &PyStrRef) -> PyResult {
    if zelf.class().has_attr("__getattribute__") {
        let res = ops::call_class_attr(
            f,
            zelf,
            "__getattribute__",
            vec![name.clone().into_object()],
        );
        match res {
            Err(exc)
                if exc
                    .as_object()
                    .class()
                    .issubclass(&f.ctx().exceptions.attribute_error) =>
            {
                if zelf.class().has_attr("__getattr__") {
                    ops::call_class_attr(f, zelf, "__getattr__", vec![name.clone().into_object()])
                } else {
                    Err(exc)
                }
            }
            other => other,
        }
    } else {
        crate::builtins::object::generic_getattro(f, zelf, name)
    }
}

fn py_setattro_slot(
    f: &Frame,
    zelf: &PyObjectRef,
    name: &PyStrRef,
    value: Option<&PyObjectRef>,
) -> PyResult<()> {
    let (dunder, mut args) = match value {
        Some(value) => (
            "__setattr__",
            vec![name.clone().into_object(), value.clone()],
        ),
        None => ("__delattr__", vec![name.clone().into_object()]),
    };
    if zelf.class().has_attr(dunder) {
        ops::call_class_attr(f, zelf, dunder, std::mem::take(&mut args)).map(drop)
    } else {
        crate::builtins::object::generic_setattro(f, zelf, name, value)
    }
}

fn py_neg_slot(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ops::call_class_attr(f, zelf, "__neg__", vec![])
}

fn py_pos_slot(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ops::call_class_attr(f, zelf, "__pos__", vec![])
}

fn py_invert_slot(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ops::call_class_attr(f, zelf, "__invert__", vec![])
}

fn py_index_slot(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ops::call_class_attr(f, zelf, "__index__", vec![])
}

fn py_int_slot(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ops::call_class_attr(f, zelf, "__int__", vec![])
}

fn py_float_slot(f: &Frame, zelf: &PyObjectRef) -> PyResult {
    ops::call_class_attr(f, zelf, "__float__", vec![])
}

// ---------------------------------------------------------------------------
// Surfacing native slots as Python callables.

fn check_receiver(f: &Frame, zelf: &PyObjectRef, owner: &PyTypeRef, name: &str) -> PyResult<()> {
    if zelf.fast_isinstance(owner) {
        Ok(())
    } else {
        Err(f.new_type_error(format!(
            "descriptor '{}' requires a '{}' object but received a '{}'",
            name,
            owner.name,
            zelf.class().name
        )))
    }
}

/// Insert a callable wrapper under each populated native slot's dunder name,
/// unless the type dict already defines it.
pub(crate) fn expose_native_slots(ctx: &Context, t: &PyTypeRef) {
    let add = |name: &'static str, value: PyObjectRef| {
        let mut attrs = t.attributes.write();
        if !attrs.contains_key(name) {
            attrs.insert(name.to_owned(), value);
        }
    };

    macro_rules! unary_wrapper {
        ($field:ident, $name:literal) => {
            if let Some(slot) = t.slots.$field.load() {
                let owner = t.clone();
                add(
                    $name,
                    ctx.new_builtin_func($name, move |f, args| {
                        let [zelf] = args.bind_exact::<1>(f, $name)?;
                        check_receiver(f, &zelf, &owner, $name)?;
                        slot(f, &zelf)
                    }),
                );
            }
        };
    }

    unary_wrapper!(repr, "__repr__");
    unary_wrapper!(str, "__str__");
    unary_wrapper!(iter, "__iter__");
    unary_wrapper!(neg, "__neg__");
    unary_wrapper!(pos, "__pos__");
    unary_wrapper!(invert, "__invert__");
    unary_wrapper!(index, "__index__");
    unary_wrapper!(int, "__int__");
    unary_wrapper!(float, "__float__");
    unary_wrapper!(iternext, "next");

    if let Some(slot) = t.slots.hash.load() {
        let owner = t.clone();
        add(
            "__hash__",
            ctx.new_builtin_func("__hash__", move |f, args| {
                let [zelf] = args.bind_exact::<1>(f, "__hash__")?;
                check_receiver(f, &zelf, &owner, "__hash__")?;
                let h = slot(f, &zelf)?;
                Ok(f.ctx().new_int(h).into_object())
            }),
        );
    }
    if let Some(slot) = t.slots.len.load() {
        let owner = t.clone();
        add(
            "__len__",
            ctx.new_builtin_func("__len__", move |f, args| {
                let [zelf] = args.bind_exact::<1>(f, "__len__")?;
                check_receiver(f, &zelf, &owner, "__len__")?;
                let n = slot(f, &zelf)?;
                Ok(f.ctx().new_int(n as i64).into_object())
            }),
        );
    }
    if let Some(slot) = t.slots.nonzero.load() {
        let owner = t.clone();
        add(
            "__nonzero__",
            ctx.new_builtin_func("__nonzero__", move |f, args| {
                let [zelf] = args.bind_exact::<1>(f, "__nonzero__")?;
                check_receiver(f, &zelf, &owner, "__nonzero__")?;
                let b = slot(f, &zelf)?;
                Ok(f.ctx().new_bool(b))
            }),
        );
    }
    if let Some(slot) = t.slots.contains.load() {
        let owner = t.clone();
        add(
            "__contains__",
            ctx.new_builtin_func("__contains__", move |f, args| {
                let [zelf, item] = args.bind_exact::<2>(f, "__contains__")?;
                check_receiver(f, &zelf, &owner, "__contains__")?;
                let b = slot(f, &zelf, &item)?;
                Ok(f.ctx().new_bool(b))
            }),
        );
    }
    if let Some(slot) = t.slots.getitem.load() {
        let owner = t.clone();
        add(
            "__getitem__",
            ctx.new_builtin_func("__getitem__", move |f, args| {
                let [zelf, key] = args.bind_exact::<2>(f, "__getitem__")?;
                check_receiver(f, &zelf, &owner, "__getitem__")?;
                slot(f, &zelf, &key)
            }),
        );
    }
    if let Some(slot) = t.slots.setitem.load() {
        let owner = t.clone();
        add(
            "__setitem__",
            ctx.new_builtin_func("__setitem__", move |f, args| {
                let [zelf, key, value] = args.bind_exact::<3>(f, "__setitem__")?;
                check_receiver(f, &zelf, &owner, "__setitem__")?;
                slot(f, &zelf, &key, &value)?;
                Ok(f.ctx().none())
            }),
        );
    }
    if let Some(slot) = t.slots.delitem.load() {
        let owner = t.clone();
        add(
            "__delitem__",
            ctx.new_builtin_func("__delitem__", move |f, args| {
                let [zelf, key] = args.bind_exact::<2>(f, "__delitem__")?;
                check_receiver(f, &zelf, &owner, "__delitem__")?;
                slot(f, &zelf, &key)?;
                Ok(f.ctx().none())
            }),
        );
    }
    if let Some(slot) = t.slots.cmp.load() {
        let owner = t.clone();
        add(
            "__cmp__",
            ctx.new_builtin_func("__cmp__", move |f, args| {
                let [zelf, other] = args.bind_exact::<2>(f, "__cmp__")?;
                check_receiver(f, &zelf, &owner, "__cmp__")?;
                slot(f, &zelf, &other)
            }),
        );
    }
    if let Some(slot) = t.slots.richcompare.load() {
        for op in CmpOp::ALL {
            let owner = t.clone();
            let name = op.method_name();
            add(
                name,
                ctx.new_builtin_func(name, move |f, args| {
                    let [zelf, other] = args.bind_exact::<2>(f, name)?;
                    check_receiver(f, &zelf, &owner, name)?;
                    slot(f, &zelf, &other, op)
                }),
            );
        }
    }
    if let Some(slot) = t.slots.call.load() {
        let owner = t.clone();
        add(
            "__call__",
            ctx.new_builtin_func("__call__", move |f, mut args| {
                let zelf = args.take_positional().ok_or_else(|| {
                    f.new_type_error("__call__() takes at least 1 argument (0 given)".to_owned())
                })?;
                check_receiver(f, &zelf, &owner, "__call__")?;
                slot(f, &zelf, args)
            }),
        );
    }
    if let Some(slot) = t.slots.getattro.load() {
        let owner = t.clone();
        add(
            "__getattribute__",
            ctx.new_builtin_func("__getattribute__", move |f, args| {
                let [zelf, name] = args.bind_exact::<2>(f, "__getattribute__")?;
                check_receiver(f, &zelf, &owner, "__getattribute__")?;
                let name = PyStrRef::try_from_object(f, name)?;
                slot(f, &zelf, &name)
            }),
        );
    }
    if let Some(slot) = t.slots.setattro.load() {
        let owner = t.clone();
        add(
            "__setattr__",
            ctx.new_builtin_func("__setattr__", move |f, args| {
                let [zelf, name, value] = args.bind_exact::<3>(f, "__setattr__")?;
                check_receiver(f, &zelf, &owner, "__setattr__")?;
                let name = PyStrRef::try_from_object(f, name)?;
                slot(f, &zelf, &name, Some(&value))?;
                Ok(f.ctx().none())
            }),
        );
        let owner = t.clone();
        add(
            "__delattr__",
            ctx.new_builtin_func("__delattr__", move |f, args| {
                let [zelf, name] = args.bind_exact::<2>(f, "__delattr__")?;
                check_receiver(f, &zelf, &owner, "__delattr__")?;
                let name = PyStrRef::try_from_object(f, name)?;
                slot(f, &zelf, &name, None)?;
                Ok(f.ctx().none())
            }),
        );
    }
    if let Some(slot) = t.slots.descr_get.load() {
        let owner = t.clone();
        add(
            "__get__",
            ctx.new_builtin_func("__get__", move |f, args| {
                let [zelf, obj, cls] = args.bind_exact::<3>(f, "__get__")?;
                check_receiver(f, &zelf, &owner, "__get__")?;
                let ctx = f.ctx();
                let obj = if ctx.is_none(&obj) { None } else { Some(&obj) };
                let cls = if ctx.is_none(&cls) { None } else { Some(&cls) };
                slot(f, &zelf, obj, cls)
            }),
        );
    }
    if let Some(slot) = t.slots.descr_set.load() {
        let owner = t.clone();
        add(
            "__set__",
            ctx.new_builtin_func("__set__", move |f, args| {
                let [zelf, obj, value] = args.bind_exact::<3>(f, "__set__")?;
                check_receiver(f, &zelf, &owner, "__set__")?;
                slot(f, &zelf, &obj, Some(&value))?;
                Ok(f.ctx().none())
            }),
        );
        let owner = t.clone();
        add(
            "__delete__",
            ctx.new_builtin_func("__delete__", move |f, args| {
                let [zelf, obj] = args.bind_exact::<2>(f, "__delete__")?;
                check_receiver(f, &zelf, &owner, "__delete__")?;
                slot(f, &zelf, &obj, None)?;
                Ok(f.ctx().none())
            }),
        );
    }
    if let Some(slot) = t.slots.init.load() {
        let owner = t.clone();
        add(
            "__init__",
            ctx.new_builtin_func("__init__", move |f, mut args| {
                let zelf = args.take_positional().ok_or_else(|| {
                    f.new_type_error("__init__() takes at least 1 argument (0 given)".to_owned())
                })?;
                check_receiver(f, &zelf, &owner, "__init__")?;
                slot(f, &zelf, &mut args)?;
                Ok(f.ctx().none())
            }),
        );
    }
    if let Some(slot) = t.slots.new.load() {
        let owner = t.clone();
        let func = ctx.new_builtin_func("__new__", move |f, mut args| {
            let cls_obj = args.take_positional().ok_or_else(|| {
                f.new_type_error("__new__() takes at least 1 argument (0 given)".to_owned())
            })?;
            let cls = PyTypeRef::try_from_object(f, cls_obj)?;
            if !cls.issubclass(&owner) {
                return Err(f.new_type_error(format!(
                    "{}.__new__({}): {} is not a subtype of {}",
                    owner.name, cls.name, cls.name, owner.name
                )));
            }
            slot(f, &cls, &mut args)
        });
        add("__new__", ctx.new_staticmethod(func));
    }

    for op in BinOp::ALL {
        if let Some(slot) = t.slots.binary(op) {
            let owner = t.clone();
            let name = op.dunder();
            add(
                name,
                ctx.new_builtin_func(name, move |f, args| {
                    let [zelf, other] = args.bind_exact::<2>(f, name)?;
                    check_receiver(f, &zelf, &owner, name)?;
                    slot(f, &zelf, &other)
                }),
            );
        }
        if let Some(slot) = t.slots.binary_reflected(op) {
            let owner = t.clone();
            let name = op.reflected_dunder();
            add(
                name,
                ctx.new_builtin_func(name, move |f, args| {
                    let [zelf, other] = args.bind_exact::<2>(f, name)?;
                    check_receiver(f, &zelf, &owner, name)?;
                    slot(f, &zelf, &other)
                }),
            );
        }
        if let Some(slot) = t.slots.binary_inplace(op) {
            let owner = t.clone();
            let name = op.inplace_dunder();
            add(
                name,
                ctx.new_builtin_func(name, move |f, args| {
                    let [zelf, other] = args.bind_exact::<2>(f, name)?;
                    check_receiver(f, &zelf, &owner, name)?;
                    slot(f, &zelf, &other)
                }),
            );
        }
    }
}
