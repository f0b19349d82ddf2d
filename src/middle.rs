//! The middle-end: the target IR, control-flow graphs over it, the
//! source-to-target translator, the dataflow analyses, and the two register
//! reduction passes (coalescing, then allocation with spilling).

pub mod allocate;
pub mod cfg;
pub mod coalesce;
pub mod dataflow;
pub mod definite_assign;
pub mod error;
pub mod ir;
pub mod liveness;
pub mod regs;
pub mod safety;
pub mod source_cfg;
pub mod translate;

pub use cfg::{BlockId, Cfg, EdgeLabel};
pub use error::MiddleError;
pub use ir::{Block, Instruction, Reg, Terminator};
