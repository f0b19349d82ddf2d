//! Textual assembly emission: `Display` impls matching the target
//! program's on-disk format exactly — two-space indented instructions,
//! labels flush left, hex for any immediate `>= 4096`.

use std::fmt;

use crate::middle::ir::Instruction;

use super::linearize::{LinearBlock, LinearProgram, LinearTerminator};

fn format_imm(n: i64) -> String {
    if n >= 4096 {
        format!("{n:#x}")
    } else {
        n.to_string()
    }
}

fn format_instr(instr: &Instruction) -> String {
    match instr {
        Instruction::Nop => "nop".to_string(),
        Instruction::Copy { src, dst } => format!("copy {src} => {dst}"),
        Instruction::LoadImm { imm, dst } => format!("loadi {} => {dst}", format_imm(*imm)),
        Instruction::Load { addr, dst } => format!("load {addr} => {dst}"),
        Instruction::Store { val, addr } => format!("store {val} => {addr}"),
        Instruction::Binary { op, lhs, rhs, dst } => format!("{op} {lhs} {rhs} => {dst}"),
        Instruction::Not { src, dst } => format!("not {src} => {dst}"),
    }
}

impl fmt::Display for LinearTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinearTerminator::None => Ok(()),
            LinearTerminator::Jump(target) => writeln!(f, "  jump {target}"),
            LinearTerminator::CJump { cond, if_true, if_false } => {
                writeln!(f, "  cjump {cond} {if_true} {if_false}")
            }
        }
    }
}

impl fmt::Display for LinearBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        for instr in &self.instrs {
            writeln!(f, "  {}", format_instr(instr))?;
        }
        write!(f, "{}", self.term)
    }
}

impl fmt::Display for LinearProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        Ok(())
    }
}
