use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use pyrite_common::lock::OnceCell;

use crate::builtins::dict::PyDictRef;
use crate::builtins::weakref::{self, PyWeak};
use crate::class::{PyTypeRef, TypeFlags};
use crate::context::Context;
use crate::frame::Frame;
use crate::object::PyRef;
use crate::PyResult;

/// Identifies the storage layout ("struct shape") of an instance. Two types
/// share a basis iff their instances carry the same payload type.
#[derive(Copy, Clone, Debug)]
pub struct Basis {
    pub name: &'static str,
    id: TypeId,
}

impl Basis {
    pub fn of<T: PyPayload>(name: &'static str) -> Self {
        Basis {
            name,
            id: TypeId::of::<T>(),
        }
    }

    pub fn matches<T: PyPayload>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for Basis {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Basis {}

/// Anything that can live behind an object's payload pointer.
pub trait PyObjectPayload: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + fmt::Debug> PyObjectPayload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A payload that is the storage layout of some registered type.
pub trait PyPayload: PyObjectPayload + Sized {
    fn class(ctx: &Context) -> &PyTypeRef;

    fn into_ref(self, ctx: &Context) -> PyRef<Self> {
        let cls = Self::class(ctx).clone();
        unsafe { PyRef::from_obj_unchecked(PyObject::new(self, cls, None)) }
    }

    fn into_object(self, ctx: &Context) -> PyObjectRef {
        self.into_ref(ctx).into_object()
    }

    /// Allocate an instance of `cls`, which must be `Self::class` or a
    /// subclass sharing its storage layout.
    fn into_ref_with_type(self, f: &Frame, cls: PyTypeRef) -> PyResult<PyRef<Self>> {
        let ctx = Context::global();
        let declared = Self::class(ctx);
        if !cls.basis().matches::<Self>() {
            return Err(f.new_type_error(format!(
                "{}.__new__({}) is not safe, use {}.__new__()",
                declared.name,
                cls.name,
                cls.basis().name,
            )));
        }
        let dict = if cls.flags.contains(TypeFlags::HAS_DICT) {
            Some(ctx.new_dict())
        } else {
            None
        };
        Ok(unsafe { PyRef::from_obj_unchecked(PyObject::new(self, cls, dict)) })
    }
}

pub type PyObjectRef = Arc<PyObject>;
pub type PyObjectWeak = std::sync::Weak<PyObject>;

/// The universal value: a type reference, an optional instance-attribute
/// dict, an at-most-one weak-reference cell, and the layout payload.
pub struct PyObject {
    class: OnceCell<PyTypeRef>,
    dict: Option<PyDictRef>,
    weak_cell: OnceCell<PyRef<PyWeak>>,
    payload: Box<dyn PyObjectPayload>,
}

impl PyObject {
    pub fn new<T: PyObjectPayload>(
        payload: T,
        class: PyTypeRef,
        dict: Option<PyDictRef>,
    ) -> PyObjectRef {
        Arc::new(PyObject {
            class: OnceCell::from(class),
            dict,
            weak_cell: OnceCell::new(),
            payload: Box::new(payload),
        })
    }

    /// Used while wiring up the `object`/`type` fixed point, where the class
    /// of the first type objects does not exist yet.
    pub(crate) fn new_uninit_class<T: PyObjectPayload>(
        payload: T,
        dict: Option<PyDictRef>,
    ) -> PyObjectRef {
        Arc::new(PyObject {
            class: OnceCell::new(),
            dict,
            weak_cell: OnceCell::new(),
            payload: Box::new(payload),
        })
    }

    pub(crate) fn init_class(&self, class: PyTypeRef) {
        self.class
            .set(class)
            .unwrap_or_else(|_| panic!("object class initialized twice"));
    }

    #[inline]
    pub fn class(&self) -> &PyTypeRef {
        self.class
            .get()
            .unwrap_or_else(|| unreachable!("object class is set at construction"))
    }

    #[inline]
    pub fn payload<T: PyPayload>(&self) -> Option<&T> {
        self.payload.as_any().downcast_ref()
    }

    #[inline]
    pub fn payload_is<T: PyPayload>(&self) -> bool {
        let a = self.payload.as_any();
        eprintln!(
            "payload_is check: want={:?} want_tid={:?} actual_tid={:?} actual_debug={:?}",
            std::any::type_name::<T>(),
            TypeId::of::<T>(),
            a.type_id(),
            self.payload
        );
        a.is::<T>()
    }

    /// Downcast helper for payloads reachable through subclassing: succeeds
    /// when the dynamic type's basis is `T`'s layout.
    pub fn payload_if_subclass<'a, T: PyPayload>(&'a self, ctx: &Context) -> Option<&'a T> {
        if self.class().issubclass(T::class(ctx)) {
            self.payload()
        } else {
            None
        }
    }

    pub fn dict(&self) -> Option<&PyDictRef> {
        self.dict.as_ref()
    }

    #[inline]
    pub fn get_id(&self) -> usize {
        self as *const PyObject as *const () as usize
    }

    #[inline]
    pub fn is(&self, other: &PyObject) -> bool {
        std::ptr::eq(self, other)
    }

    pub fn fast_isinstance(&self, cls: &PyTypeRef) -> bool {
        self.class().issubclass(cls)
    }

    /// The object's weak-reference cell, installing it on first use. The
    /// cell, once installed, is never replaced.
    pub fn weak_cell(this: &PyObjectRef) -> &PyRef<PyWeak> {
        this.weak_cell
            .get_or_init(|| weakref::new_cell(Arc::downgrade(this), this.get_id()))
    }

}

impl Drop for PyObject {
    fn drop(&mut self) {
        if let Some(cell) = self.weak_cell.get() {
            weakref::finalize(cell);
        }
    }
}

impl fmt::Debug for PyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the class cell may legitimately be empty mid-bootstrap
        let name = self.class.get().map(|c| c.name.as_str()).unwrap_or("?");
        write!(f, "[{} {:?}]", name, &self.payload)
    }
}
