//! Definite assignment: the forward "must" analysis. A register is
//! definitely assigned at a program point if it has been written on every
//! path reaching that point. Meet is set intersection; the identity for
//! intersection is the universe of registers, so that's what every
//! non-boundary block starts from before the first pass narrows it down.

use crate::common::Set;

use super::cfg::Cfg;
use super::dataflow::{self, BlockFacts, Direction, Problem};
use super::ir::{Block, Reg};
use super::regs;

pub type Facts = dataflow::BlockFacts<Set<Reg>>;

struct DefiniteAssign {
    universe: Set<Reg>,
}

impl Problem<Block> for DefiniteAssign {
    type Value = Set<Reg>;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn boundary_value(&self) -> Set<Reg> {
        // Only the reserved input register is guaranteed assigned before
        // the program's first real instruction runs.
        Set::from([super::ir::r_in()])
    }

    fn non_boundary_init(&self) -> Set<Reg> {
        self.universe.clone()
    }

    fn meet(&self, values: &[&Set<Reg>]) -> Set<Reg> {
        let mut iter = values.iter();
        let Some(first) = iter.next() else {
            return self.universe.clone();
        };
        let mut acc = (*first).clone();
        for v in iter {
            acc = acc.intersection(v).copied().collect();
        }
        acc
    }

    fn transfer(&self, block: &Block, input: &Set<Reg>) -> Set<Reg> {
        let mut out = input.clone();
        out.extend(regs::block_defined(&block.instrs));
        out
    }
}

/// Every register that appears anywhere in the CFG, as either a def or a
/// use. Bounds the "could possibly be assigned" universe the intersection
/// meet narrows down from.
fn universe(cfg: &Cfg<Block>) -> Set<Reg> {
    let mut all = Set::new();
    for id in cfg.block_ids() {
        let block = &cfg.blocks[&id];
        for instr in &block.instrs {
            all.extend(regs::used(instr));
            all.extend(regs::defined(instr));
        }
        all.extend(regs::term_used(&block.term));
    }
    all
}

/// Solve definite assignment for the whole CFG: for each block, the set of
/// registers assigned on every path into it (`in_fact`) and assigned on
/// every path out of it (`out_fact`).
pub fn solve(cfg: &Cfg<Block>) -> crate::common::Map<super::cfg::BlockId, BlockFacts<Set<Reg>>> {
    let problem = DefiniteAssign { universe: universe(cfg) };
    dataflow::solve(cfg, &problem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Id;
    use crate::middle::cfg::{CfgBuilder, EdgeLabel};
    use crate::middle::ir::{BinOp, Instruction, Terminator};

    fn reg(s: &str) -> Reg {
        Id::from(s.to_string())
    }

    #[test]
    fn diamond_join_keeps_only_common_definitions() {
        let mut b: CfgBuilder<Block> = CfgBuilder::new();
        let entry = b.add_block(Block {
            instrs: vec![],
            term: Terminator::CJump(reg("r_in")),
        });
        let then_blk = b.add_block(Block {
            instrs: vec![
                Instruction::LoadImm { imm: 1, dst: reg("x") },
                Instruction::LoadImm { imm: 2, dst: reg("y") },
            ],
            term: Terminator::Jump,
        });
        let else_blk = b.add_block(Block {
            instrs: vec![Instruction::LoadImm { imm: 3, dst: reg("x") }],
            term: Terminator::Jump,
        });
        let join = b.add_block(Block {
            instrs: vec![Instruction::Binary {
                op: BinOp::Add,
                lhs: reg("x"),
                rhs: reg("x"),
                dst: reg("z"),
            }],
            term: Terminator::None,
        });
        b.add_edge(entry, EdgeLabel::True, then_blk);
        b.add_edge(entry, EdgeLabel::False, else_blk);
        b.add_edge(then_blk, EdgeLabel::Unconditional, join);
        b.add_edge(else_blk, EdgeLabel::Unconditional, join);
        let cfg = b.finish(entry, join);

        let facts = solve(&cfg);
        // `x` is assigned on both paths, `y` only on one.
        assert!(facts[&join].in_fact.contains(&reg("x")));
        assert!(!facts[&join].in_fact.contains(&reg("y")));
    }
}
