mod sequence;

pub use sequence::{
    apply, calc_slice, checked_add, checked_mul, for_each, normalize_index, seq_mul, seq_repr,
    seq_richcompare, SliceIndices,
};
