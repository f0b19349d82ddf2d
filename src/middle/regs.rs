//! Register utilities: `used`/`defined` sets per instruction, and the
//! instruction-point type the dataflow analyses and coalescing key their
//! per-point facts on.

use crate::common::Set;

use super::cfg::BlockId;
use super::ir::{Instruction, Reg, Terminator};

/// A point within a single block: either "before the first instruction" or
/// "just after instruction `i`". Entry is defined to precede every
/// `AfterInstr`, and instructions compare by index, which gives exactly the
/// program order `Entry < AfterInstr(0) < AfterInstr(1) < ...`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum InstrPoint {
    Entry,
    AfterInstr(usize),
}

/// A point anywhere in the program.
pub type Point = (BlockId, InstrPoint);

/// Registers read by an instruction.
pub fn used(instr: &Instruction) -> Set<Reg> {
    match instr {
        Instruction::Copy { src, .. } => Set::from([*src]),
        Instruction::LoadImm { .. } => Set::new(),
        Instruction::Load { addr, .. } => Set::from([*addr]),
        Instruction::Store { val, addr } => Set::from([*val, *addr]),
        Instruction::Binary { lhs, rhs, .. } => Set::from([*lhs, *rhs]),
        Instruction::Not { src, .. } => Set::from([*src]),
        Instruction::Nop => Set::new(),
    }
}

/// Registers written by an instruction.
pub fn defined(instr: &Instruction) -> Set<Reg> {
    match instr {
        Instruction::Copy { dst, .. }
        | Instruction::LoadImm { dst, .. }
        | Instruction::Load { dst, .. }
        | Instruction::Not { dst, .. }
        | Instruction::Binary { dst, .. } => Set::from([*dst]),
        Instruction::Store { .. } | Instruction::Nop => Set::new(),
    }
}

/// Registers read by a terminator (only `cjump` reads one; `jump`/no
/// terminator read none). Terminators never define a register.
pub fn term_used(term: &Terminator) -> Set<Reg> {
    match term {
        Terminator::CJump(r) => Set::from([*r]),
        Terminator::Jump | Terminator::None => Set::new(),
    }
}

/// `defined(B)`: the union of `defined(i)` over every instruction in the
/// block (terminators never define anything, so they don't contribute).
pub fn block_defined(instrs: &[Instruction]) -> Set<Reg> {
    instrs.iter().flat_map(defined).collect()
}

/// `killed(B)`: every register written anywhere in the block, including by
/// the terminator (which, for this ISA, never adds anything beyond
/// `block_defined`, but is included for symmetry with `upward_exposed`).
pub fn killed(instrs: &[Instruction], _term: &Terminator) -> Set<Reg> {
    block_defined(instrs)
}

/// `upward_exposed(B)`: registers read before being (re)defined within `B`,
/// scanning in program order and including the terminator's use.
pub fn upward_exposed(instrs: &[Instruction], term: &Terminator) -> Set<Reg> {
    let mut exposed = Set::new();
    let mut defined_so_far: Set<Reg> = Set::new();
    for instr in instrs {
        for r in used(instr) {
            if !defined_so_far.contains(&r) {
                exposed.insert(r);
            }
        }
        defined_so_far.extend(defined(instr));
    }
    for r in term_used(term) {
        if !defined_so_far.contains(&r) {
            exposed.insert(r);
        }
    }
    exposed
}
