//! The target IR: a three-address, load/store RISC-style instruction set
//! over symbolic virtual registers.
//!
//! Registers are plain interned strings (the same [`Id`](crate::common::Id)
//! type the front-end uses for source variable names) rather than a
//! dedicated numeric index type. This is a deliberate simplification: the
//! target has no hardware register file to model beneath the symbolic
//! names, so "this register got a physical slot" and "this register kept
//! its original virtual name" are the same fact (see [`super::allocate`]).

use std::fmt;

use crate::common::Id;

pub use super::cfg::{BlockId, Cfg, EdgeLabel};

/// A (virtual or, after allocation, physical-slot) register name.
pub type Reg = Id;

/// The reserved input register.
pub fn r_in() -> Reg {
    Id::from("r_in".to_string())
}

/// The reserved output register.
pub fn r_out() -> Reg {
    Id::from("r_out".to_string())
}

/// The first swap register, reserved for spill materialization.
pub fn r_a() -> Reg {
    Id::from("r_a".to_string())
}

/// The second swap register, reserved for spill materialization.
pub fn r_b() -> Reg {
    Id::from("r_b".to_string())
}

/// Is this one of the four reserved registers (never a coalescing or
/// allocation candidate)?
pub fn is_reserved(r: Reg) -> bool {
    r == r_in() || r == r_out() || r == r_a() || r == r_b()
}

/// Generates fresh virtual registers `r0`, `r1`, ... in translation order.
#[derive(Default)]
pub struct RegGen {
    next: u32,
}

impl RegGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> Reg {
        let name = format!("r{}", self.next);
        self.next += 1;
        Id::from(name)
    }
}

/// Binary arithmetic/logic/comparison operations. `Less` yields 0 or 1.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinOp {
    Add,
    Sub,
    Mult,
    And,
    Less,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mult => "mult",
            BinOp::And => "and",
            BinOp::Less => "less",
        };
        write!(f, "{s}")
    }
}

/// A single target instruction. Never encodes two memory operands.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Instruction {
    Copy { src: Reg, dst: Reg },
    LoadImm { imm: i64, dst: Reg },
    Load { addr: Reg, dst: Reg },
    Store { val: Reg, addr: Reg },
    Binary { op: BinOp, lhs: Reg, rhs: Reg, dst: Reg },
    Not { src: Reg, dst: Reg },
    Nop,
}

/// The terminator implied by a target block's out-edges. The jump target(s)
/// are not stored here: they are exactly the block's out-edges in the owning
/// [`Cfg`], and are resolved to labels only at linearization time
/// (see [`crate::back::linearize`]).
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Terminator {
    /// The exit block: no out-edges, no terminator instruction.
    None,
    /// One out-edge, unconditional.
    Jump,
    /// Two out-edges, labeled [`EdgeLabel::True`]/[`EdgeLabel::False`];
    /// nonzero `cond` takes the true edge.
    CJump(Reg),
}

/// A target basic block: straight-line instructions plus the terminator
/// shape (its actual jump targets live in the owning [`Cfg`]'s edge map).
#[derive(Clone, Debug)]
pub struct Block {
    pub instrs: Vec<Instruction>,
    pub term: Terminator,
}

impl Block {
    pub fn new() -> Self {
        Block {
            instrs: Vec::new(),
            term: Terminator::None,
        }
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}
