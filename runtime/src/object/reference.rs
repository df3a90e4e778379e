use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

use crate::context::Context;
use crate::frame::Frame;
use crate::object::{PyObjectRef, PyPayload};
use crate::PyResult;

/// A reference statically known to point at an object whose payload is `T`.
pub struct PyRef<T: PyPayload> {
    obj: PyObjectRef,
    _marker: PhantomData<fn() -> T>,
}

impl<T: PyPayload> PyRef<T> {
    /// # Safety
    ///
    /// `obj`'s payload must be a `T`.
    pub unsafe fn from_obj_unchecked(obj: PyObjectRef) -> Self {
        debug_assert!(obj.payload_is::<T>());
        PyRef {
            obj,
            _marker: PhantomData,
        }
    }

    pub fn new(obj: PyObjectRef) -> Option<Self> {
        if obj.payload_is::<T>() {
            Some(unsafe { Self::from_obj_unchecked(obj) })
        } else {
            None
        }
    }

    pub fn try_from_object(f: &Frame, obj: PyObjectRef) -> PyResult<Self> {
        if obj.payload_is::<T>() {
            Ok(unsafe { Self::from_obj_unchecked(obj) })
        } else {
            let expected = T::class(Context::global()).name.clone();
            Err(f.new_type_error(format!(
                "expected a '{}' object but got '{}'",
                expected,
                obj.class().name
            )))
        }
    }

    pub fn as_object(&self) -> &PyObjectRef {
        &self.obj
    }

    pub fn into_object(self) -> PyObjectRef {
        self.obj
    }

    pub fn get_id(&self) -> usize {
        self.obj.get_id()
    }

    pub fn is<T2: PyPayload>(&self, other: &PyRef<T2>) -> bool {
        self.obj.is(other.as_object())
    }
}

impl<T: PyPayload> AsRef<PyObjectRef> for PyRef<T> {
    fn as_ref(&self) -> &PyObjectRef {
        &self.obj
    }
}

impl<T: PyPayload> Clone for PyRef<T> {
    fn clone(&self) -> Self {
        PyRef {
            obj: self.obj.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: PyPayload> Deref for PyRef<T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        // the payload type was checked when this reference was constructed
        unsafe { self.obj.payload::<T>().unwrap_unchecked() }
    }
}

impl<T: PyPayload> From<PyRef<T>> for PyObjectRef {
    fn from(r: PyRef<T>) -> Self {
        r.obj
    }
}

impl<T: PyPayload + fmt::Debug> fmt::Debug for PyRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
