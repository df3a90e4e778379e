use crate::lock::OnceCell;

/// A once-initialized static slot. The value is leaked so references to it
/// are `'static` and can be handed out freely across threads.
pub struct StaticCell<T: 'static> {
    inner: OnceCell<&'static T>,
}

impl<T> StaticCell<T> {
    pub const fn new() -> Self {
        Self {
            inner: OnceCell::new(),
        }
    }

    pub fn get(&self) -> Option<&'static T> {
        self.inner.get().copied()
    }

    pub fn get_or_init<F>(&self, f: F) -> &'static T
    where
        F: FnOnce() -> T,
    {
        self.inner.get_or_init(|| Box::leak(Box::new(f())))
    }

    pub fn init_expect(&self, value: T, msg: &'static str) -> &'static T {
        let static_ref = Box::leak(Box::new(value)) as &_;
        self.inner
            .set(static_ref)
            .unwrap_or_else(|_| panic!("double initializing '{}'", msg));
        static_ref
    }
}

impl<T> Default for StaticCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_once() {
        static CELL: StaticCell<u32> = StaticCell::new();
        assert!(CELL.get().is_none());
        assert_eq!(*CELL.get_or_init(|| 7), 7);
        assert_eq!(*CELL.get_or_init(|| 8), 7);
        assert_eq!(CELL.get(), Some(&7));
    }
}
