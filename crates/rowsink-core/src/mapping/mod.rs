//! Record-to-operation mapping.
//!
//! Pure, in-memory translation of input records into row writes and counter
//! increments. Nothing in this module performs I/O.

mod operation;
mod record;
mod table;

pub use operation::{Cell, CounterUpdate, IncrementOp, WriteOp};
pub use record::Record;
pub use table::TableMapping;
