//! The middle-end's error taxonomy. Each phase that can fail gets its own
//! variant set; [`MiddleError`] wraps all of them so `bin/smolc.rs` has one
//! type to match on.

use thiserror::Error;

use super::cfg::BlockId;
use super::ir::Reg;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SafetyError {
    #[error("block {block}: register `{register}` used before it is definitely assigned")]
    UseBeforeDefinition { block: BlockId, register: Reg },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    #[error("{n} physical registers requested, but at least 4 are required to hold r_in, r_out, r_a, and r_b")]
    TooFewRegisters { n: usize },
}

#[derive(Error, Debug)]
pub enum MiddleError {
    #[error("program rejected by the safety checker:\n{}", format_safety(.0))]
    Unsafe(Vec<SafetyError>),

    #[error(transparent)]
    Alloc(#[from] AllocError),
}

fn format_safety(errors: &[SafetyError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}
