//! The use-before-definition checker: walks every block using definite
//! assignment's block-level facts as the starting point, then tracks which
//! registers have been defined so far instruction by instruction, flagging
//! any read of a register that isn't guaranteed defined yet.

use crate::common::Set;

use super::cfg::{BlockId, Cfg};
use super::definite_assign;
use super::error::SafetyError;
use super::ir::{Block, Reg};
use super::regs;

/// Check every block for reads of registers that aren't definitely
/// assigned yet. Returns one error per distinct `(block, register)`
/// violation found, in block-id order, so the report is deterministic and
/// doesn't drown in duplicate reports of the same bad register within one
/// block.
pub fn check(cfg: &Cfg<Block>) -> Result<(), Vec<SafetyError>> {
    let facts = definite_assign::solve(cfg);
    let mut errors = Vec::new();

    for id in cfg.block_ids() {
        let block = &cfg.blocks[&id];
        let mut defined: Set<Reg> = facts[&id].in_fact.clone();
        let mut reported: Set<Reg> = Set::new();

        for instr in &block.instrs {
            for r in regs::used(instr) {
                if !defined.contains(&r) && reported.insert(r) {
                    errors.push(SafetyError::UseBeforeDefinition { block: id, register: r });
                }
            }
            defined.extend(regs::defined(instr));
        }
        for r in regs::term_used(&block.term) {
            if !defined.contains(&r) && reported.insert(r) {
                errors.push(SafetyError::UseBeforeDefinition { block: id, register: r });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Ergonomic wrapper for callers that only want the first violation, e.g.
/// a CLI reporting the earliest problem and bailing out.
pub fn first_violation(cfg: &Cfg<Block>) -> Option<(BlockId, Reg)> {
    match check(cfg) {
        Ok(()) => None,
        Err(errors) => errors.into_iter().next().map(|e| match e {
            SafetyError::UseBeforeDefinition { block, register } => (block, register),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Id;
    use crate::middle::cfg::CfgBuilder;
    use crate::middle::ir::{Instruction, Terminator};

    fn reg(s: &str) -> Reg {
        Id::from(s.to_string())
    }

    #[test]
    fn reading_an_undefined_register_is_rejected() {
        let mut b: CfgBuilder<Block> = CfgBuilder::new();
        let block = b.add_block(Block {
            instrs: vec![Instruction::Copy { src: reg("x"), dst: reg("r_out") }],
            term: Terminator::None,
        });
        let cfg = b.finish(block, block);

        let result = check(&cfg);
        assert!(result.is_err());
    }

    #[test]
    fn defining_before_use_is_accepted() {
        let mut b: CfgBuilder<Block> = CfgBuilder::new();
        let block = b.add_block(Block {
            instrs: vec![
                Instruction::LoadImm { imm: 1, dst: reg("x") },
                Instruction::Copy { src: reg("x"), dst: reg("r_out") },
            ],
            term: Terminator::None,
        });
        let cfg = b.finish(block, block);

        assert!(check(&cfg).is_ok());
    }
}
