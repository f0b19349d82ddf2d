//! Register coalescing: greedily group virtual registers whose
//! instruction-level live point sets never overlap, so the group can later
//! share one physical slot. Unlike classic copy coalescing, candidacy here
//! is not limited to registers connected by a `copy` — any two registers
//! that are never simultaneously live can merge, which is what lets a
//! straight-line chain like `r1 = x+1; r2 = r1+2; r3 = r2+3` collapse into
//! one register even though no single `copy` links all three.

use crate::common::{Map, Set};

use super::cfg::{BlockId, Cfg};
use super::ir::{self, Block, Instruction, Reg, Terminator};
use super::liveness;
use super::regs::InstrPoint;

type Point = (BlockId, InstrPoint);

/// Coalesce `cfg`, returning a new CFG in which every coalesced register is
/// rewritten to its group's representative, and any `copy r => r` left
/// behind by a successful merge is dropped.
pub fn coalesce(cfg: Cfg<Block>) -> Cfg<Block> {
    let live = liveness::analyze(&cfg);
    let live_points = register_live_points(&cfg, &live.points);
    let rename = group_registers(live_points);

    let mut blocks = Map::new();
    for id in cfg.block_ids() {
        let block = &cfg.blocks[&id];
        let mut instrs = Vec::with_capacity(block.instrs.len());
        for instr in &block.instrs {
            let renamed = rename_instr(instr, &rename);
            if let Instruction::Copy { src, dst } = renamed {
                if src == dst {
                    continue;
                }
            }
            instrs.push(renamed);
        }
        let term = rename_term(&block.term, &rename);
        blocks.insert(id, Block { instrs, term });
    }

    Cfg {
        blocks,
        edges: cfg.edges,
        entry: cfg.entry,
        exit: cfg.exit,
    }
}

/// Invert the per-block, per-point live sets into a live point set per
/// register: the set of `(block, point)` pairs at which that register is
/// live. This is the representation coalescing's interference test is
/// defined over (two registers interfere iff these sets intersect).
fn register_live_points(
    cfg: &Cfg<Block>,
    points: &Map<BlockId, Map<InstrPoint, Set<Reg>>>,
) -> Map<Reg, Set<Point>> {
    let mut per_reg: Map<Reg, Set<Point>> = Map::new();
    for id in cfg.block_ids() {
        // Ensure every register that appears anywhere gets an (possibly
        // empty) entry, even if it is never live at any recorded point.
        let block = &cfg.blocks[&id];
        for instr in &block.instrs {
            for r in super::regs::used(instr).into_iter().chain(super::regs::defined(instr)) {
                per_reg.entry(r).or_default();
            }
        }
    }
    for (&block_id, block_points) in points {
        for (&instr_point, live) in block_points {
            for &r in live {
                per_reg.entry(r).or_default().insert((block_id, instr_point));
            }
        }
    }
    per_reg
}

/// The greedy grouping pass (spec §4.8): process non-reserved registers in
/// deterministic (lexicographic) order; for each, join the first existing
/// group it doesn't interfere with, or start a new group.
fn group_registers(live_points: Map<Reg, Set<Point>>) -> Map<Reg, Reg> {
    let mut candidates: Vec<Reg> = live_points
        .keys()
        .copied()
        .filter(|&r| !ir::is_reserved(r))
        .collect();
    candidates.sort_by(|a, b| a.as_str().cmp(b.as_str()));

    // Groups in creation order: (representative, accumulated live points).
    let mut groups: Vec<(Reg, Set<Point>)> = Vec::new();
    let mut rename: Map<Reg, Reg> = Map::new();

    for r in candidates {
        let r_points = live_points.get(&r).cloned().unwrap_or_default();
        let found = groups
            .iter()
            .position(|(_, group_points)| group_points.is_disjoint(&r_points));
        match found {
            Some(idx) => {
                let (rep, group_points) = &mut groups[idx];
                group_points.extend(r_points);
                rename.insert(r, *rep);
            }
            None => {
                rename.insert(r, r);
                groups.push((r, r_points));
            }
        }
    }
    rename
}

fn rename_instr(instr: &Instruction, rename: &Map<Reg, Reg>) -> Instruction {
    let r = |reg: Reg| *rename.get(&reg).unwrap_or(&reg);
    match *instr {
        Instruction::Copy { src, dst } => Instruction::Copy { src: r(src), dst: r(dst) },
        Instruction::LoadImm { imm, dst } => Instruction::LoadImm { imm, dst: r(dst) },
        Instruction::Load { addr, dst } => Instruction::Load { addr: r(addr), dst: r(dst) },
        Instruction::Store { val, addr } => Instruction::Store { val: r(val), addr: r(addr) },
        Instruction::Binary { op, lhs, rhs, dst } => Instruction::Binary { op, lhs: r(lhs), rhs: r(rhs), dst: r(dst) },
        Instruction::Not { src, dst } => Instruction::Not { src: r(src), dst: r(dst) },
        Instruction::Nop => Instruction::Nop,
    }
}

fn rename_term(term: &Terminator, rename: &Map<Reg, Reg>) -> Terminator {
    let r = |reg: Reg| *rename.get(&reg).unwrap_or(&reg);
    match *term {
        Terminator::CJump(reg) => Terminator::CJump(r(reg)),
        Terminator::Jump => Terminator::Jump,
        Terminator::None => Terminator::None,
    }
}
