//! Per-packet sample corrections applied in physical acquisition order.
pub mod rf_chop;
pub mod row_flip;

pub use rf_chop::undo_rf_chop;
pub use row_flip::{RowFlipConfig, RowFlipMode, RowFlipTable, RowOp};
