//! Destructuring an iterable into a tree of assignment targets.

use crate::frame::Frame;
use crate::object::PyObjectRef;
use crate::{ops, PyResult};

/// An assignment target: a leaf slot to fill, or a nested target list.
#[derive(Debug)]
pub enum TieTree {
    Leaf(Option<PyObjectRef>),
    Node(Vec<TieTree>),
}

impl TieTree {
    pub fn leaf() -> Self {
        TieTree::Leaf(None)
    }

    pub fn node(children: Vec<TieTree>) -> Self {
        TieTree::Node(children)
    }

    /// The value bound into a leaf, once `tie` has run.
    pub fn value(&self) -> Option<&PyObjectRef> {
        match self {
            TieTree::Leaf(v) => v.as_ref(),
            TieTree::Node(_) => None,
        }
    }
}

pub fn tie(f: &Frame, target: &mut TieTree, obj: &PyObjectRef) -> PyResult<()> {
    match target {
        TieTree::Leaf(slot) => {
            *slot = Some(obj.clone());
            Ok(())
        }
        TieTree::Node(children) => {
            let iter = ops::iter(f, obj)?;
            let stop_iteration = f.ctx().exceptions.stop_iteration.clone();
            for (i, child) in children.iter_mut().enumerate() {
                match ops::next(f, &iter) {
                    Ok(value) => tie(f, child, &value)?,
                    Err(exc) if exc.isinstance(&stop_iteration) => {
                        return Err(f.new_value_error(format!(
                            "need more than {} value{} to unpack",
                            i,
                            if i == 1 { "" } else { "s" }
                        )));
                    }
                    Err(exc) => return Err(exc),
                }
            }
            match ops::next(f, &iter) {
                Err(exc) if exc.isinstance(&stop_iteration) => Ok(()),
                Ok(_) => Err(f.new_value_error("too many values to unpack".to_owned())),
                Err(exc) => Err(exc),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::int::PyInt;
    use crate::context::Context;

    fn ints(f: &Frame, values: &[i64]) -> PyObjectRef {
        let ctx = f.ctx();
        ctx.new_tuple(
            values
                .iter()
                .map(|v| ctx.new_int(*v).into_object())
                .collect(),
        )
        .into_object()
    }

    fn leaf_int(t: &TieTree) -> i64 {
        t.value().unwrap().payload::<PyInt>().unwrap().value()
    }

    #[test]
    fn flat_unpack() {
        let f = Frame::new_root(Context::global());
        let mut target = TieTree::node(vec![TieTree::leaf(), TieTree::leaf()]);
        tie(&f, &mut target, &ints(&f, &[1, 2])).unwrap();
        match target {
            TieTree::Node(children) => {
                assert_eq!(leaf_int(&children[0]), 1);
                assert_eq!(leaf_int(&children[1]), 2);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn nested_unpack() {
        let f = Frame::new_root(Context::global());
        let ctx = f.ctx();
        let inner = ints(&f, &[2, 3]);
        let outer = ctx
            .new_tuple(vec![ctx.new_int(1).into_object(), inner])
            .into_object();
        let mut target = TieTree::node(vec![
            TieTree::leaf(),
            TieTree::node(vec![TieTree::leaf(), TieTree::leaf()]),
        ]);
        tie(&f, &mut target, &outer).unwrap();
        match target {
            TieTree::Node(children) => match &children[1] {
                TieTree::Node(grandchildren) => {
                    assert_eq!(leaf_int(&grandchildren[0]), 2);
                    assert_eq!(leaf_int(&grandchildren[1]), 3);
                }
                _ => unreachable!(),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn arity_errors() {
        let f = Frame::new_root(Context::global());
        let mut target = TieTree::node(vec![TieTree::leaf(), TieTree::leaf(), TieTree::leaf()]);
        let err = tie(&f, &mut target, &ints(&f, &[1, 2])).unwrap_err();
        assert_eq!(err.message(), "need more than 2 values to unpack");

        let mut target = TieTree::node(vec![TieTree::leaf()]);
        let err = tie(&f, &mut target, &ints(&f, &[1, 2])).unwrap_err();
        assert_eq!(err.message(), "too many values to unpack");
    }
}
