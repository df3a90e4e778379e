use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use lock_api::{GetThreadId, GuardNoSend, RawMutex};

// based off ReentrantMutex from lock_api

/// A recursive mutex owned by a thread lineage.
///
/// Re-acquiring on the owning thread only bumps a depth counter. Unlocking
/// from a non-owning thread, or more times than it was locked, is an
/// implementation bug and panics rather than raising a Python-level error.
pub struct RawThreadMutex<R: RawMutex, G: GetThreadId> {
    owner: AtomicUsize,
    depth: AtomicUsize,
    mutex: R,
    get_thread_id: G,
}

impl<R: RawMutex, G: GetThreadId> RawThreadMutex<R, G> {
    #[allow(clippy::declare_interior_mutable_const)]
    pub const INIT: Self = RawThreadMutex {
        owner: AtomicUsize::new(0),
        depth: AtomicUsize::new(0),
        mutex: R::INIT,
        get_thread_id: G::INIT,
    };

    pub fn lock(&self) {
        let id = self.get_thread_id.nonzero_thread_id().get();
        if self.owner.load(Ordering::Relaxed) == id {
            self.depth.fetch_add(1, Ordering::Relaxed);
        } else {
            self.mutex.lock();
            self.owner.store(id, Ordering::Relaxed);
            debug_assert_eq!(self.depth.load(Ordering::Relaxed), 0);
            self.depth.store(1, Ordering::Relaxed);
        }
    }

    pub fn try_lock(&self) -> bool {
        let id = self.get_thread_id.nonzero_thread_id().get();
        if self.owner.load(Ordering::Relaxed) == id {
            self.depth.fetch_add(1, Ordering::Relaxed);
            true
        } else if self.mutex.try_lock() {
            self.owner.store(id, Ordering::Relaxed);
            self.depth.store(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// # Safety
    ///
    /// This method may only be called if the mutex is held by the current thread.
    pub unsafe fn unlock(&self) {
        let id = self.get_thread_id.nonzero_thread_id().get();
        if self.owner.load(Ordering::Relaxed) != id {
            panic!("thread mutex unlocked from a thread that does not own it");
        }
        match self.depth.load(Ordering::Relaxed) {
            0 => panic!("thread mutex unlocked more times than it was locked"),
            1 => {
                self.depth.store(0, Ordering::Relaxed);
                self.owner.store(0, Ordering::Relaxed);
                self.mutex.unlock();
            }
            n => self.depth.store(n - 1, Ordering::Relaxed),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.owner.load(Ordering::Relaxed) != 0
    }
}

unsafe impl<R: RawMutex + Send, G: GetThreadId + Send> Send for RawThreadMutex<R, G> {}
unsafe impl<R: RawMutex + Sync, G: GetThreadId + Sync> Sync for RawThreadMutex<R, G> {}

pub struct ThreadMutex<R: RawMutex, G: GetThreadId, T: ?Sized> {
    raw: RawThreadMutex<R, G>,
    data: UnsafeCell<T>,
}

unsafe impl<R: RawMutex + Send, G: GetThreadId + Send, T: ?Sized + Send> Send
    for ThreadMutex<R, G, T>
{
}
unsafe impl<R: RawMutex + Sync, G: GetThreadId + Sync, T: ?Sized + Send> Sync
    for ThreadMutex<R, G, T>
{
}

impl<R: RawMutex, G: GetThreadId, T> ThreadMutex<R, G, T> {
    pub fn new(val: T) -> Self {
        ThreadMutex {
            raw: RawThreadMutex::INIT,
            data: UnsafeCell::new(val),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<R: RawMutex, G: GetThreadId, T: Default> Default for ThreadMutex<R, G, T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<R: RawMutex, G: GetThreadId, T: ?Sized> ThreadMutex<R, G, T> {
    pub fn lock(&self) -> ThreadMutexGuard<R, G, T> {
        self.raw.lock();
        ThreadMutexGuard {
            mu: self,
            marker: PhantomData,
        }
    }

    pub fn try_lock(&self) -> Option<ThreadMutexGuard<R, G, T>> {
        if self.raw.try_lock() {
            Some(ThreadMutexGuard {
                mu: self,
                marker: PhantomData,
            })
        } else {
            None
        }
    }
}

impl<R: RawMutex, G: GetThreadId, T: ?Sized + fmt::Debug> fmt::Debug for ThreadMutex<R, G, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_locked() {
            f.debug_struct("ThreadMutex")
                .field("data", &"<locked>")
                .finish()
        } else {
            let guard = self.lock();
            f.debug_struct("ThreadMutex").field("data", &&*guard).finish()
        }
    }
}

pub struct ThreadMutexGuard<'a, R: RawMutex, G: GetThreadId, T: ?Sized> {
    mu: &'a ThreadMutex<R, G, T>,
    marker: PhantomData<(&'a mut T, GuardNoSend)>,
}

impl<R: RawMutex, G: GetThreadId, T: ?Sized> Deref for ThreadMutexGuard<'_, R, G, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mu.data.get() }
    }
}

impl<R: RawMutex, G: GetThreadId, T: ?Sized> DerefMut for ThreadMutexGuard<'_, R, G, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mu.data.get() }
    }
}

impl<R: RawMutex, G: GetThreadId, T: ?Sized> Drop for ThreadMutexGuard<'_, R, G, T> {
    fn drop(&mut self) {
        unsafe { self.mu.raw.unlock() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{RawMutex, RawThreadId};

    type Mutex<T> = ThreadMutex<RawMutex, RawThreadId, T>;

    #[test]
    fn reentrant_on_owner() {
        let m = Mutex::new(0u32);
        let mut a = m.lock();
        *a += 1;
        {
            // recursive acquisition must not deadlock
            let b = m.lock();
            assert_eq!(*b, 1);
        }
        *a += 1;
        drop(a);
        assert_eq!(*m.lock(), 2);
    }

    #[test]
    fn contended_from_other_thread() {
        let m = std::sync::Arc::new(Mutex::new(0u32));
        let g = m.lock();
        let m2 = m.clone();
        let handle = std::thread::spawn(move || m2.try_lock().is_none());
        assert!(handle.join().unwrap());
        drop(g);
    }
}
