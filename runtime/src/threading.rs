//! Host-thread spawning for Python-level callables.
//!
//! Each spawned thread runs on a fresh root frame with its own thread
//! state; unhandled exceptions are formatted to the error stream, matching
//! the behavior of a thread's top-level driver.

use std::thread::JoinHandle;

use crate::context::Context;
use crate::exceptions::print_exception;
use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::PyObjectRef;
use crate::ops;

pub fn start_thread(callable: PyObjectRef) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let ctx = Context::global();
        let frame = Frame::new_root(ctx);
        if let Err(exc) = ops::invoke(&frame, &callable, FuncArgs::default()) {
            print_exception(&frame, &exc);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn threads_share_the_object_graph() {
        let ctx = Context::global();
        let f = Frame::new_root(ctx);
        let list = ctx.new_list(vec![]);
        let hits = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let list = list.clone();
                let hits = hits.clone();
                let callable = ctx.new_builtin_func("worker", move |f, _args| {
                    list.append(f.ctx().new_int(i).into_object());
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(f.ctx().none())
                });
                start_thread(callable)
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert_eq!(list.len(), 4);
        drop(f);
    }
}
