pub mod slot;

pub use slot::{BinOp, CmpOp, SlotTable};
