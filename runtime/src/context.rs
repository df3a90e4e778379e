//! The process-wide runtime context: every registered type, the exception
//! zoo, the shared singletons and the hash secret. Created once, leaked, and
//! reachable from any thread through [`Context::global`].

use num_bigint::BigInt;
use num_complex::Complex64;
use pyrite_common::hash::HashSecret;
use pyrite_common::static_cell::StaticCell;

use crate::builtins::builtinfunc::{NativeFunc, PyBuiltinFunction};
use crate::builtins::classmethod::PyClassMethod;
use crate::builtins::complex::PyComplex;
use crate::builtins::dict::{PyDict, PyDictRef};
use crate::builtins::float::PyFloat;
use crate::builtins::getset::{GetterFunc, PyGetSet, SetterFunc};
use crate::builtins::int::PyInt;
use crate::builtins::list::PyList;
use crate::builtins::long::PyLong;
use crate::builtins::set::{PyFrozenSet, PySet};
use crate::builtins::singletons::{PyNone, PyNotImplemented};
use crate::builtins::slice::PySlice;
use crate::builtins::staticmethod::PyStaticMethod;
use crate::builtins::str::{PyStr, PyUnicode};
use crate::builtins::tuple::PyTuple;
use crate::builtins::weakref::PyWeak;
use crate::class::{PyAttributes, PyType, PyTypeRef, TypeFlags};
use crate::exceptions::{ExceptionZoo, PyBaseException};
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::{Basis, PyObject, PyObjectRef, PyPayload, PyRef};
use crate::PyResult;

pub struct TypeZoo {
    pub object_type: PyTypeRef,
    pub type_type: PyTypeRef,
    pub basestring_type: PyTypeRef,
    pub str_type: PyTypeRef,
    pub unicode_type: PyTypeRef,
    pub int_type: PyTypeRef,
    pub long_type: PyTypeRef,
    pub bool_type: PyTypeRef,
    pub float_type: PyTypeRef,
    pub complex_type: PyTypeRef,
    pub tuple_type: PyTypeRef,
    pub list_type: PyTypeRef,
    pub dict_type: PyTypeRef,
    pub set_type: PyTypeRef,
    pub frozenset_type: PyTypeRef,
    pub slice_type: PyTypeRef,
    pub xrange_type: PyTypeRef,
    pub xrange_iterator_type: PyTypeRef,
    pub seq_iterator_type: PyTypeRef,
    pub enumerate_type: PyTypeRef,
    pub none_type: PyTypeRef,
    pub not_implemented_type: PyTypeRef,
    pub function_type: PyTypeRef,
    pub builtin_function_type: PyTypeRef,
    pub method_type: PyTypeRef,
    pub staticmethod_type: PyTypeRef,
    pub classmethod_type: PyTypeRef,
    pub property_type: PyTypeRef,
    pub super_type: PyTypeRef,
    pub getset_type: PyTypeRef,
    pub generator_type: PyTypeRef,
    pub weakref_type: PyTypeRef,
    pub traceback_type: PyTypeRef,
    pub frame_type: PyTypeRef,
    pub code_type: PyTypeRef,
}

fn create_type(
    name: &'static str,
    base: &PyTypeRef,
    type_type: &PyTypeRef,
    basis: Basis,
    flags: TypeFlags,
) -> PyTypeRef {
    crate::class::new_basis_type(name, base, type_type, basis, flags)
}

impl TypeZoo {
    fn init() -> Self {
        use TypeFlags as F;
        let full = F::BASIS | F::BASETYPE | F::INSTANTIABLE;

        // the object/type fixed point: both are created before either class
        // reference can be installed
        let object_type = PyType::new_ref(
            "object",
            None,
            vec![],
            PyAttributes::new(),
            Basis::of::<crate::builtins::object::PyBaseObject>("object"),
            full,
            None,
        );
        let type_type = PyType::new_ref(
            "type",
            Some(object_type.clone()),
            vec![object_type.clone()],
            PyAttributes::new(),
            Basis::of::<PyType>("type"),
            full,
            None,
        );
        object_type.as_object().init_class(type_type.clone());
        type_type.as_object().init_class(type_type.clone());

        let t = |name, base: &PyTypeRef, basis, flags| {
            create_type(name, base, &type_type, basis, flags)
        };

        let basestring_type = t(
            "basestring",
            &object_type,
            object_type.basis(),
            F::BASETYPE,
        );
        let str_type = t("str", &basestring_type, Basis::of::<PyStr>("str"), full);
        let unicode_type = t(
            "unicode",
            &basestring_type,
            Basis::of::<PyUnicode>("unicode"),
            full,
        );
        let int_type = t("int", &object_type, Basis::of::<PyInt>("int"), full);
        let long_type = t("long", &object_type, Basis::of::<PyLong>("long"), full);
        let bool_type = t(
            "bool",
            &int_type,
            Basis::of::<PyInt>("int"),
            F::INSTANTIABLE,
        );
        let float_type = t("float", &object_type, Basis::of::<PyFloat>("float"), full);
        let complex_type = t(
            "complex",
            &object_type,
            Basis::of::<PyComplex>("complex"),
            full,
        );
        let tuple_type = t("tuple", &object_type, Basis::of::<PyTuple>("tuple"), full);
        let list_type = t("list", &object_type, Basis::of::<PyList>("list"), full);
        let dict_type = t("dict", &object_type, Basis::of::<PyDict>("dict"), full);
        let set_type = t("set", &object_type, Basis::of::<PySet>("set"), full);
        let frozenset_type = t(
            "frozenset",
            &object_type,
            Basis::of::<PyFrozenSet>("frozenset"),
            full,
        );
        let slice_type = t(
            "slice",
            &object_type,
            Basis::of::<PySlice>("slice"),
            F::BASIS | F::INSTANTIABLE,
        );
        let xrange_type = t(
            "xrange",
            &object_type,
            Basis::of::<crate::builtins::range::PyRange>("xrange"),
            F::BASIS | F::INSTANTIABLE,
        );
        let xrange_iterator_type = t(
            "rangeiterator",
            &object_type,
            Basis::of::<crate::builtins::range::PyRangeIterator>("rangeiterator"),
            F::BASIS,
        );
        let seq_iterator_type = t(
            "iterator",
            &object_type,
            Basis::of::<crate::builtins::iter::PySeqIterator>("iterator"),
            F::BASIS,
        );
        let enumerate_type = t(
            "enumerate",
            &object_type,
            Basis::of::<crate::builtins::enumerate::PyEnumerate>("enumerate"),
            full,
        );
        let none_type = t(
            "NoneType",
            &object_type,
            Basis::of::<PyNone>("NoneType"),
            F::BASIS,
        );
        let not_implemented_type = t(
            "NotImplementedType",
            &object_type,
            Basis::of::<PyNotImplemented>("NotImplementedType"),
            F::BASIS,
        );
        let function_type = t(
            "function",
            &object_type,
            Basis::of::<crate::builtins::function::PyFunction>("function"),
            F::BASIS,
        );
        let builtin_function_type = t(
            "builtin_function_or_method",
            &object_type,
            Basis::of::<PyBuiltinFunction>("builtin_function_or_method"),
            F::BASIS,
        );
        let method_type = t(
            "instancemethod",
            &object_type,
            Basis::of::<crate::builtins::method::PyMethod>("instancemethod"),
            F::BASIS,
        );
        let staticmethod_type = t(
            "staticmethod",
            &object_type,
            Basis::of::<PyStaticMethod>("staticmethod"),
            full,
        );
        let classmethod_type = t(
            "classmethod",
            &object_type,
            Basis::of::<PyClassMethod>("classmethod"),
            full,
        );
        let property_type = t(
            "property",
            &object_type,
            Basis::of::<crate::builtins::property::PyProperty>("property"),
            full,
        );
        let super_type = t(
            "super",
            &object_type,
            Basis::of::<crate::builtins::pysuper::PySuper>("super"),
            full,
        );
        let getset_type = t(
            "getset_descriptor",
            &object_type,
            Basis::of::<PyGetSet>("getset_descriptor"),
            F::BASIS,
        );
        let generator_type = t(
            "generator",
            &object_type,
            Basis::of::<crate::generator::PyGenerator>("generator"),
            F::BASIS,
        );
        let weakref_type = t(
            "weakref",
            &object_type,
            Basis::of::<PyWeak>("weakref"),
            F::BASIS | F::INSTANTIABLE,
        );
        let traceback_type = t(
            "traceback",
            &object_type,
            Basis::of::<crate::builtins::traceback::PyTraceback>("traceback"),
            F::BASIS,
        );
        let frame_type = t(
            "frame",
            &object_type,
            Basis::of::<Frame>("frame"),
            F::BASIS,
        );
        let code_type = t(
            "code",
            &object_type,
            Basis::of::<crate::code::PyCode>("code"),
            F::BASIS,
        );

        TypeZoo {
            object_type,
            type_type,
            basestring_type,
            str_type,
            unicode_type,
            int_type,
            long_type,
            bool_type,
            float_type,
            complex_type,
            tuple_type,
            list_type,
            dict_type,
            set_type,
            frozenset_type,
            slice_type,
            xrange_type,
            xrange_iterator_type,
            seq_iterator_type,
            enumerate_type,
            none_type,
            not_implemented_type,
            function_type,
            builtin_function_type,
            method_type,
            staticmethod_type,
            classmethod_type,
            property_type,
            super_type,
            getset_type,
            generator_type,
            weakref_type,
            traceback_type,
            frame_type,
            code_type,
        }
    }

    fn all(&self) -> Vec<&PyTypeRef> {
        vec![
            &self.object_type,
            &self.type_type,
            &self.basestring_type,
            &self.str_type,
            &self.unicode_type,
            &self.int_type,
            &self.long_type,
            &self.bool_type,
            &self.float_type,
            &self.complex_type,
            &self.tuple_type,
            &self.list_type,
            &self.dict_type,
            &self.set_type,
            &self.frozenset_type,
            &self.slice_type,
            &self.xrange_type,
            &self.xrange_iterator_type,
            &self.seq_iterator_type,
            &self.enumerate_type,
            &self.none_type,
            &self.not_implemented_type,
            &self.function_type,
            &self.builtin_function_type,
            &self.method_type,
            &self.staticmethod_type,
            &self.classmethod_type,
            &self.property_type,
            &self.super_type,
            &self.getset_type,
            &self.generator_type,
            &self.weakref_type,
            &self.traceback_type,
            &self.frame_type,
            &self.code_type,
        ]
    }
}

pub struct Context {
    pub types: TypeZoo,
    pub exceptions: ExceptionZoo,
    pub none: PyRef<PyNone>,
    pub not_implemented: PyRef<PyNotImplemented>,
    pub true_value: PyRef<PyInt>,
    pub false_value: PyRef<PyInt>,
    pub empty_tuple: PyRef<PyTuple>,
    pub hash_secret: HashSecret,
}

static CONTEXT: StaticCell<Context> = StaticCell::new();

impl Context {
    pub fn global() -> &'static Context {
        CONTEXT.get_or_init(Context::new)
    }

    fn new() -> Self {
        let types = TypeZoo::init();
        let exceptions = ExceptionZoo::init(&types.object_type, &types.type_type);

        let none = unsafe {
            PyRef::from_obj_unchecked(PyObject::new(PyNone, types.none_type.clone(), None))
        };
        let not_implemented = unsafe {
            PyRef::from_obj_unchecked(PyObject::new(
                PyNotImplemented,
                types.not_implemented_type.clone(),
                None,
            ))
        };
        let true_value = unsafe {
            PyRef::from_obj_unchecked(PyObject::new(
                PyInt::from(1),
                types.bool_type.clone(),
                None,
            ))
        };
        let false_value = unsafe {
            PyRef::from_obj_unchecked(PyObject::new(
                PyInt::from(0),
                types.bool_type.clone(),
                None,
            ))
        };
        let empty_tuple = unsafe {
            PyRef::from_obj_unchecked(PyObject::new(
                PyTuple::new(vec![]),
                types.tuple_type.clone(),
                None,
            ))
        };

        let ctx = Context {
            types,
            exceptions,
            none,
            not_implemented,
            true_value,
            false_value,
            empty_tuple,
            hash_secret: rand::random(),
        };
        ctx.init_builtins();
        ctx
    }

    /// Populate slots and dict methods for every registered type, then
    /// finalize each one.
    fn init_builtins(&self) {
        crate::builtins::object::init(self);
        crate::class::init(self);
        crate::builtins::singletons::init(self);
        crate::builtins::int::init(self);
        crate::builtins::long::init(self);
        crate::builtins::bool::init(self);
        crate::builtins::float::init(self);
        crate::builtins::complex::init(self);
        crate::builtins::str::init(self);
        crate::builtins::tuple::init(self);
        crate::builtins::list::init(self);
        crate::builtins::dict::init(self);
        crate::builtins::set::init(self);
        crate::builtins::slice::init(self);
        crate::builtins::range::init(self);
        crate::builtins::iter::init(self);
        crate::builtins::enumerate::init(self);
        crate::builtins::function::init(self);
        crate::builtins::builtinfunc::init(self);
        crate::builtins::method::init(self);
        crate::builtins::staticmethod::init(self);
        crate::builtins::classmethod::init(self);
        crate::builtins::property::init(self);
        crate::builtins::pysuper::init(self);
        crate::builtins::getset::init(self);
        crate::generator::init(self);
        crate::builtins::weakref::init(self);
        crate::builtins::traceback::init(self);
        crate::frame::init(self);
        crate::code::init(self);
        crate::exceptions::init(self);

        for t in self.types.all() {
            crate::class::prepare_type(self, t);
        }
        for t in self.exceptions.all() {
            crate::class::prepare_type(self, t);
        }
    }

    // ----- singletons -----

    pub fn none(&self) -> PyObjectRef {
        self.none.clone().into_object()
    }

    pub fn is_none(&self, obj: &PyObjectRef) -> bool {
        obj.is(self.none.as_object())
    }

    pub fn not_implemented(&self) -> PyObjectRef {
        self.not_implemented.clone().into_object()
    }

    pub fn is_not_implemented(&self, obj: &PyObjectRef) -> bool {
        obj.is(self.not_implemented.as_object())
    }

    pub fn new_bool(&self, value: bool) -> PyObjectRef {
        if value {
            self.true_value.clone().into_object()
        } else {
            self.false_value.clone().into_object()
        }
    }

    // ----- constructors -----

    pub fn new_int(&self, value: i64) -> PyRef<PyInt> {
        PyInt::from(value).into_ref(self)
    }

    pub fn new_long(&self, value: BigInt) -> PyRef<PyLong> {
        PyLong::from(value).into_ref(self)
    }

    pub fn new_float(&self, value: f64) -> PyRef<PyFloat> {
        PyFloat::from(value).into_ref(self)
    }

    pub fn new_complex(&self, value: Complex64) -> PyRef<PyComplex> {
        PyComplex::from(value).into_ref(self)
    }

    pub fn new_str(&self, value: impl Into<String>) -> PyRef<PyStr> {
        PyStr::from(value.into()).into_ref(self)
    }

    pub fn new_unicode(&self, value: impl Into<String>) -> PyRef<PyUnicode> {
        PyUnicode::from(value.into()).into_ref(self)
    }

    pub fn new_tuple(&self, elements: Vec<PyObjectRef>) -> PyRef<PyTuple> {
        if elements.is_empty() {
            self.empty_tuple.clone()
        } else {
            PyTuple::new(elements).into_ref(self)
        }
    }

    pub fn new_list(&self, elements: Vec<PyObjectRef>) -> PyRef<PyList> {
        PyList::new(elements).into_ref(self)
    }

    pub fn new_dict(&self) -> PyDictRef {
        PyDict::new().into_ref(self)
    }

    pub fn new_set(&self) -> PyRef<PySet> {
        PySet::new().into_ref(self)
    }

    pub fn new_frozenset(&self) -> PyRef<PyFrozenSet> {
        PyFrozenSet::new().into_ref(self)
    }

    pub fn new_slice(
        &self,
        start: Option<PyObjectRef>,
        stop: Option<PyObjectRef>,
        step: Option<PyObjectRef>,
    ) -> PyRef<PySlice> {
        PySlice::new(
            start.unwrap_or_else(|| self.none()),
            stop.unwrap_or_else(|| self.none()),
            step.unwrap_or_else(|| self.none()),
        )
        .into_ref(self)
    }

    pub fn new_builtin_func<F>(&self, name: &str, func: F) -> PyObjectRef
    where
        F: Fn(&Frame, FuncArgs) -> PyResult + Send + Sync + 'static,
    {
        PyBuiltinFunction::new(name.to_owned(), Box::new(func) as NativeFunc)
            .into_ref(self)
            .into_object()
    }

    pub fn new_staticmethod(&self, callable: PyObjectRef) -> PyObjectRef {
        PyStaticMethod::from(callable).into_ref(self).into_object()
    }

    pub fn new_classmethod(&self, callable: PyObjectRef) -> PyObjectRef {
        PyClassMethod::from(callable).into_ref(self).into_object()
    }

    pub fn new_getset(
        &self,
        name: &str,
        class: PyTypeRef,
        getter: GetterFunc,
        setter: Option<SetterFunc>,
    ) -> PyObjectRef {
        PyGetSet::new(name.to_owned(), class, getter, setter)
            .into_ref(self)
            .into_object()
    }

    pub fn new_exception(
        &self,
        cls: PyTypeRef,
        args: Vec<PyObjectRef>,
    ) -> PyRef<PyBaseException> {
        unsafe {
            PyRef::from_obj_unchecked(PyObject::new(
                PyBaseException::new(args),
                cls,
                Some(self.new_dict()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metatype_fixed_point() {
        let ctx = Context::global();
        let tt = &ctx.types.type_type;
        assert!(tt.as_object().class().is(tt));
        assert!(ctx.types.object_type.as_object().class().is(tt));
    }

    #[test]
    fn mro_invariants() {
        let ctx = Context::global();
        for t in ctx.types.all() {
            if t.is(&ctx.types.object_type) {
                assert!(t.mro().is_empty());
            } else {
                let last = t.mro().last().unwrap();
                assert!(last.is(&ctx.types.object_type), "{} mro", t.name);
            }
        }
    }

    #[test]
    fn bool_shares_int_basis() {
        let ctx = Context::global();
        assert_eq!(ctx.types.bool_type.basis(), ctx.types.int_type.basis());
        assert!(ctx.types.bool_type.issubclass(&ctx.types.int_type));
    }

    #[test]
    fn singletons_are_shared() {
        let ctx = Context::global();
        assert!(ctx.new_bool(true).is(ctx.true_value.as_object()));
        assert!(ctx.is_none(&ctx.none()));
        let t1 = ctx.new_tuple(vec![]);
        let t2 = ctx.new_tuple(vec![]);
        assert!(t1.is(&t2));
    }
}
