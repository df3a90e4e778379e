//! The built-in type shells.

pub mod bool;
pub mod builtinfunc;
pub mod classmethod;
pub mod complex;
pub mod dict;
pub mod enumerate;
pub mod float;
pub mod function;
pub mod getset;
pub mod int;
pub mod iter;
pub mod list;
pub mod long;
pub mod method;
pub mod object;
pub mod property;
pub mod pysuper;
pub mod range;
pub mod set;
pub mod singletons;
pub mod slice;
pub mod staticmethod;
pub mod str;
pub mod traceback;
pub mod tuple;
pub mod weakref;

pub use builtinfunc::PyBuiltinFunction;
pub use classmethod::PyClassMethod;
pub use complex::PyComplex;
pub use dict::{PyDict, PyDictRef};
pub use enumerate::PyEnumerate;
pub use float::PyFloat;
pub use function::PyFunction;
pub use getset::PyGetSet;
pub use int::PyInt;
pub use iter::PySeqIterator;
pub use list::{PyList, PyListRef};
pub use long::PyLong;
pub use method::PyMethod;
pub use object::PyBaseObject;
pub use property::PyProperty;
pub use pysuper::PySuper;
pub use range::{PyRange, PyRangeIterator};
pub use set::{PyFrozenSet, PySet};
pub use singletons::{PyNone, PyNotImplemented};
pub use slice::PySlice;
pub use staticmethod::PyStaticMethod;
pub use str::{PyStr, PyStrRef, PyUnicode};
pub use traceback::{PyTraceback, PyTracebackRef};
pub use tuple::{PyTuple, PyTupleRef};
pub use weakref::PyWeak;
