/// Tracing for the dispatch and class machinery; routed through the `log`
/// facade so the embedding host decides where records go.
macro_rules! rt_trace {
    ($($arg:tt)*) => {
        log::trace!($($arg)*)
    };
}
