//! Liveness: the backward "may" analysis. A register is live at a point if
//! some path from that point reads it before it is next written. Meet is
//! set union; the identity for union is the empty set, which is what every
//! non-boundary block starts from.
//!
//! Block-level liveness alone isn't precise enough for coalescing (it only
//! says what's live at block boundaries), so [`analyze`] also runs a single
//! backward walk per block to refine that into a live-set at every
//! [`InstrPoint`].

use crate::common::{Map, Set};

use super::cfg::{BlockId, Cfg};
use super::dataflow::{self, Direction, Problem};
use super::ir::{Block, Reg};
use super::regs::{self, InstrPoint};

struct Liveness;

impl Problem<Block> for Liveness {
    type Value = Set<Reg>;

    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn boundary_value(&self) -> Set<Reg> {
        Set::from([super::ir::r_out()])
    }

    fn non_boundary_init(&self) -> Set<Reg> {
        Set::new()
    }

    fn meet(&self, values: &[&Set<Reg>]) -> Set<Reg> {
        values.iter().fold(Set::new(), |mut acc, v| {
            acc.extend(v.iter().copied());
            acc
        })
    }

    fn transfer(&self, block: &Block, live_out: &Set<Reg>) -> Set<Reg> {
        let mut live_in: Set<Reg> = live_out
            .difference(&regs::killed(&block.instrs, &block.term))
            .copied()
            .collect();
        live_in.extend(regs::upward_exposed(&block.instrs, &block.term));
        live_in
    }
}

/// Per-block live-in/live-out sets, plus the live-after set at every
/// instruction point within each block.
pub struct LiveSets {
    pub live_in: Map<BlockId, Set<Reg>>,
    pub live_out: Map<BlockId, Set<Reg>>,
    pub points: Map<BlockId, Map<InstrPoint, Set<Reg>>>,
}

pub fn analyze(cfg: &Cfg<Block>) -> LiveSets {
    // `dataflow::solve`'s generic field names are flipped for a backward
    // problem: `in_fact` is the meet nearest the successor side (live-out
    // here), `out_fact` is what `transfer` derives from it (live-in here).
    let raw = dataflow::solve(cfg, &Liveness);

    let mut live_in = Map::new();
    let mut live_out = Map::new();
    let mut points = Map::new();
    for id in cfg.block_ids() {
        let facts = &raw[&id];
        live_out.insert(id, facts.in_fact.clone());
        live_in.insert(id, facts.out_fact.clone());
        points.insert(id, instr_level(&cfg.blocks[&id], &facts.in_fact));
    }

    LiveSets { live_in, live_out, points }
}

/// A single backward walk over one block's instructions, producing the
/// live-after set at every point: `AfterInstr(i)` for each instruction
/// plus `Entry` for the point before the first instruction (which equals
/// the block's live-in set).
fn instr_level(block: &Block, live_out_of_block: &Set<Reg>) -> Map<InstrPoint, Set<Reg>> {
    let mut points = Map::new();
    let mut live: Set<Reg> = live_out_of_block
        .union(&regs::term_used(&block.term))
        .copied()
        .collect();

    if block.instrs.is_empty() {
        points.insert(InstrPoint::Entry, live);
        return points;
    }

    for i in (0..block.instrs.len()).rev() {
        points.insert(InstrPoint::AfterInstr(i), live.clone());
        let instr = &block.instrs[i];
        let defined = regs::defined(instr);
        let mut before: Set<Reg> = live.into_iter().filter(|r| !defined.contains(r)).collect();
        before.extend(regs::used(instr));
        live = before;
    }
    points.insert(InstrPoint::Entry, live);
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Id;
    use crate::middle::cfg::{CfgBuilder, EdgeLabel};
    use crate::middle::ir::{Instruction, Terminator};

    fn reg(s: &str) -> Reg {
        Id::from(s.to_string())
    }

    #[test]
    fn dead_store_is_not_live_after_its_own_point() {
        let mut b: CfgBuilder<Block> = CfgBuilder::new();
        let block = b.add_block(Block {
            instrs: vec![
                Instruction::LoadImm { imm: 1, dst: reg("x") },
                Instruction::LoadImm { imm: 2, dst: reg("x") },
                Instruction::Copy { src: reg("x"), dst: reg("r_out") },
            ],
            term: Terminator::None,
        });
        let cfg = b.finish(block, block);

        let live = analyze(&cfg);
        let points = &live.points[&block];
        // After the first (dead) store to `x`, `x` is not yet live because
        // it's immediately overwritten before any read.
        assert!(!points[&InstrPoint::AfterInstr(0)].contains(&reg("x")));
        assert!(points[&InstrPoint::AfterInstr(1)].contains(&reg("x")));
    }

    #[test]
    fn loop_back_edge_keeps_counter_live() {
        let mut b: CfgBuilder<Block> = CfgBuilder::new();
        let header = b.add_block(Block {
            instrs: vec![],
            term: Terminator::CJump(reg("cond")),
        });
        let body = b.add_block(Block {
            instrs: vec![Instruction::Binary {
                op: crate::middle::ir::BinOp::Sub,
                lhs: reg("n"),
                rhs: reg("one"),
                dst: reg("n"),
            }],
            term: Terminator::Jump,
        });
        let exit = b.add_block(Block {
            instrs: vec![],
            term: Terminator::None,
        });
        b.add_edge(header, EdgeLabel::True, body);
        b.add_edge(header, EdgeLabel::False, exit);
        b.add_edge(body, EdgeLabel::Unconditional, header);
        let cfg = b.finish(header, exit);

        let live = analyze(&cfg);
        assert!(live.live_in[&header].contains(&reg("n")));
        assert!(live.live_out[&body].contains(&reg("n")));
    }
}
