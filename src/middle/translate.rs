//! Source CFG to target CFG translation.
//!
//! The target CFG reuses the source CFG's block ids and edges outright: a
//! source block becomes exactly one target block, and translation never
//! splits or merges blocks. Only each block's *contents* change, from
//! `SimpleStmt`/`BoolExpr` to `Instruction`/`Terminator`.

use std::collections::BTreeSet;

use crate::common::{Id, Map};
use crate::front::ast::{BoolExpr, IntExpr, IntOp};

use super::cfg::{BlockId, Cfg, EdgeLabel};
use super::ir::{self, BinOp, Block, Instruction, Reg, RegGen, Terminator};
use super::source_cfg::{SimpleStmt, SourceBlock, SourceProgram};

/// Variable name to register mapping, fixed before any block is lowered so
/// every occurrence of a given source variable resolves to the same
/// register regardless of which block it appears in.
struct Env {
    vars: Map<Id, Reg>,
}

impl Env {
    fn reg(&self, var: Id) -> Reg {
        *self
            .vars
            .get(&var)
            .unwrap_or_else(|| panic!("unbound source variable `{var}`"))
    }
}

/// Translate a whole source program into a target CFG. `input`/`output` are
/// bound to the reserved `r_in`/`r_out` registers; every other variable
/// gets its own fresh virtual register, assigned in sorted-name order so
/// the mapping (and therefore everything downstream) is deterministic.
pub fn translate(sp: SourceProgram) -> Cfg<Block> {
    let mut gen = RegGen::new();
    let env = build_env(&sp, &mut gen);

    let mut blocks = Map::new();
    for id in sp.cfg.block_ids() {
        let source_block = &sp.cfg.blocks[&id];
        let out_edges = sp.cfg.successors(id);
        blocks.insert(id, lower_block(source_block, out_edges, &env, &mut gen));
    }

    Cfg {
        blocks,
        edges: sp.cfg.edges,
        entry: sp.cfg.entry,
        exit: sp.cfg.exit,
    }
}

fn build_env(sp: &SourceProgram, gen: &mut RegGen) -> Env {
    let mut names: BTreeSet<String> = BTreeSet::new();
    for id in sp.cfg.block_ids() {
        let block = &sp.cfg.blocks[&id];
        collect_block_vars(block, &mut names);
    }
    names.remove(sp.input.as_str());
    names.remove(sp.output.as_str());

    let mut vars = Map::new();
    vars.insert(sp.input, ir::r_in());
    vars.insert(sp.output, ir::r_out());
    for name in names {
        vars.insert(Id::from(name), gen.fresh());
    }
    Env { vars }
}

fn collect_block_vars(block: &SourceBlock, names: &mut BTreeSet<String>) {
    for stmt in &block.stmts {
        match stmt {
            SimpleStmt::Skip => {}
            SimpleStmt::Assign(x, e) => {
                names.insert(x.as_str().to_string());
                collect_int_vars(e, names);
            }
        }
    }
    if let Some(cond) = &block.cond {
        collect_bool_vars(cond, names);
    }
}

fn collect_int_vars(expr: &IntExpr, names: &mut BTreeSet<String>) {
    match expr {
        IntExpr::Var(x) => {
            names.insert(x.as_str().to_string());
        }
        IntExpr::Const(_) => {}
        IntExpr::BinOp { lhs, rhs, .. } => {
            collect_int_vars(lhs, names);
            collect_int_vars(rhs, names);
        }
    }
}

fn collect_bool_vars(expr: &BoolExpr, names: &mut BTreeSet<String>) {
    match expr {
        BoolExpr::True | BoolExpr::False => {}
        BoolExpr::And(a, b) => {
            collect_bool_vars(a, names);
            collect_bool_vars(b, names);
        }
        BoolExpr::Not(a) => collect_bool_vars(a, names),
        BoolExpr::Less(a, b) => {
            collect_int_vars(a, names);
            collect_int_vars(b, names);
        }
    }
}

fn lower_block(block: &SourceBlock, out_edges: &[(BlockId, EdgeLabel)], env: &Env, gen: &mut RegGen) -> Block {
    let mut instrs = Vec::new();
    for stmt in &block.stmts {
        lower_stmt(stmt, env, gen, &mut instrs);
    }

    let term = match &block.cond {
        Some(cond) => {
            let r = lower_bool(cond, env, gen, &mut instrs);
            Terminator::CJump(r)
        }
        None => {
            if out_edges.is_empty() {
                Terminator::None
            } else {
                Terminator::Jump
            }
        }
    };

    Block { instrs, term }
}

fn lower_stmt(stmt: &SimpleStmt, env: &Env, gen: &mut RegGen, instrs: &mut Vec<Instruction>) {
    match stmt {
        SimpleStmt::Skip => instrs.push(Instruction::Nop),
        SimpleStmt::Assign(x, e) => {
            let src = lower_int(e, env, gen, instrs);
            let dst = env.reg(*x);
            // Assigning a variable to itself (`x := x`) lowers to nothing.
            if src != dst {
                instrs.push(Instruction::Copy { src, dst });
            }
        }
    }
}

/// Lower an integer expression, folding the identity/annihilator laws for
/// `+`, `-`, and `*` at translation time rather than emitting dead
/// arithmetic a later pass would have to clean up.
fn lower_int(expr: &IntExpr, env: &Env, gen: &mut RegGen, instrs: &mut Vec<Instruction>) -> Reg {
    match expr {
        IntExpr::Var(x) => env.reg(*x),
        IntExpr::Const(c) => {
            let dst = gen.fresh();
            instrs.push(Instruction::LoadImm { imm: *c, dst });
            dst
        }
        IntExpr::BinOp { op, lhs, rhs } => match (op, lhs.as_ref(), rhs.as_ref()) {
            (IntOp::Add, IntExpr::Const(c1), IntExpr::Const(c2)) => {
                let dst = gen.fresh();
                instrs.push(Instruction::LoadImm { imm: c1 + c2, dst });
                dst
            }
            (IntOp::Sub, IntExpr::Const(c1), IntExpr::Const(c2)) => {
                let dst = gen.fresh();
                instrs.push(Instruction::LoadImm { imm: c1 - c2, dst });
                dst
            }
            (IntOp::Mul, IntExpr::Const(c1), IntExpr::Const(c2)) => {
                let dst = gen.fresh();
                instrs.push(Instruction::LoadImm { imm: c1 * c2, dst });
                dst
            }
            (IntOp::Add, _, IntExpr::Const(0)) | (IntOp::Sub, _, IntExpr::Const(0)) => {
                lower_int(lhs, env, gen, instrs)
            }
            (IntOp::Add, IntExpr::Const(0), _) => lower_int(rhs, env, gen, instrs),
            (IntOp::Mul, _, IntExpr::Const(1)) => lower_int(lhs, env, gen, instrs),
            (IntOp::Mul, IntExpr::Const(1), _) => lower_int(rhs, env, gen, instrs),
            (IntOp::Mul, _, IntExpr::Const(0)) | (IntOp::Mul, IntExpr::Const(0), _) => {
                let dst = gen.fresh();
                instrs.push(Instruction::LoadImm { imm: 0, dst });
                dst
            }
            _ => {
                let lhs_reg = lower_int(lhs, env, gen, instrs);
                let rhs_reg = lower_int(rhs, env, gen, instrs);
                let dst = gen.fresh();
                let op = match op {
                    IntOp::Add => BinOp::Add,
                    IntOp::Sub => BinOp::Sub,
                    IntOp::Mul => BinOp::Mult,
                };
                instrs.push(Instruction::Binary {
                    op,
                    lhs: lhs_reg,
                    rhs: rhs_reg,
                    dst,
                });
                dst
            }
        },
    }
}

/// Lower a boolean expression, folding `and`/`not` constant laws the same
/// way `lower_int` folds arithmetic identities.
fn lower_bool(expr: &BoolExpr, env: &Env, gen: &mut RegGen, instrs: &mut Vec<Instruction>) -> Reg {
    match expr {
        BoolExpr::True => {
            let dst = gen.fresh();
            instrs.push(Instruction::LoadImm { imm: 1, dst });
            dst
        }
        BoolExpr::False => {
            let dst = gen.fresh();
            instrs.push(Instruction::LoadImm { imm: 0, dst });
            dst
        }
        BoolExpr::Not(inner) => match inner.as_ref() {
            BoolExpr::Not(double) => lower_bool(double, env, gen, instrs),
            BoolExpr::True => {
                let dst = gen.fresh();
                instrs.push(Instruction::LoadImm { imm: 0, dst });
                dst
            }
            BoolExpr::False => {
                let dst = gen.fresh();
                instrs.push(Instruction::LoadImm { imm: 1, dst });
                dst
            }
            _ => {
                let src = lower_bool(inner, env, gen, instrs);
                let dst = gen.fresh();
                instrs.push(Instruction::Not { src, dst });
                dst
            }
        },
        BoolExpr::And(a, b) => match (a.as_ref(), b.as_ref()) {
            (BoolExpr::True, _) => lower_bool(b, env, gen, instrs),
            (_, BoolExpr::True) => lower_bool(a, env, gen, instrs),
            (BoolExpr::False, _) | (_, BoolExpr::False) => {
                let dst = gen.fresh();
                instrs.push(Instruction::LoadImm { imm: 0, dst });
                dst
            }
            _ => {
                let a_reg = lower_bool(a, env, gen, instrs);
                let b_reg = lower_bool(b, env, gen, instrs);
                let dst = gen.fresh();
                instrs.push(Instruction::Binary {
                    op: BinOp::And,
                    lhs: a_reg,
                    rhs: b_reg,
                    dst,
                });
                dst
            }
        },
        BoolExpr::Less(lhs, rhs) => {
            let lhs_reg = lower_int(lhs, env, gen, instrs);
            let rhs_reg = lower_int(rhs, env, gen, instrs);
            let dst = gen.fresh();
            instrs.push(Instruction::Binary {
                op: BinOp::Less,
                lhs: lhs_reg,
                rhs: rhs_reg,
                dst,
            });
            dst
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::ast::Program;

    fn id(s: &str) -> Id {
        Id::from(s.to_string())
    }

    #[test]
    fn direct_copy_has_no_dead_arithmetic() {
        let program = Program {
            input: id("x"),
            output: id("y"),
            body: crate::front::ast::Command::Assign(id("y"), IntExpr::Var(id("x"))),
        };
        let sp = super::super::source_cfg::build(program);
        let cfg = translate(sp);
        let all_instrs: Vec<_> = cfg.blocks.values().flat_map(|b| b.instrs.iter()).collect();
        assert!(all_instrs
            .iter()
            .any(|i| matches!(i, Instruction::Copy { .. })));
    }

    #[test]
    fn add_zero_is_simplified_away() {
        let expr = IntExpr::BinOp {
            op: IntOp::Add,
            lhs: Box::new(IntExpr::Var(id("x"))),
            rhs: Box::new(IntExpr::Const(0)),
        };
        let env = Env {
            vars: Map::from([(id("x"), id("rX"))]),
        };
        let mut gen = RegGen::new();
        let mut instrs = Vec::new();
        let r = lower_int(&expr, &env, &mut gen, &mut instrs);
        assert_eq!(r, id("rX"));
        assert!(instrs.is_empty());
    }

    #[test]
    fn double_negation_is_eliminated() {
        let expr = BoolExpr::Not(Box::new(BoolExpr::Not(Box::new(BoolExpr::True))));
        let env = Env { vars: Map::new() };
        let mut gen = RegGen::new();
        let mut instrs = Vec::new();
        lower_bool(&expr, &env, &mut gen, &mut instrs);
        assert!(!instrs.iter().any(|i| matches!(i, Instruction::Not { .. })));
    }

    #[test]
    fn not_of_a_constant_folds_to_the_opposite_constant() {
        let env = Env { vars: Map::new() };
        let mut gen = RegGen::new();

        let mut instrs = Vec::new();
        lower_bool(&BoolExpr::Not(Box::new(BoolExpr::True)), &env, &mut gen, &mut instrs);
        assert!(!instrs.iter().any(|i| matches!(i, Instruction::Not { .. })));
        assert!(matches!(instrs.last(), Some(Instruction::LoadImm { imm: 0, .. })));

        let mut instrs = Vec::new();
        lower_bool(&BoolExpr::Not(Box::new(BoolExpr::False)), &env, &mut gen, &mut instrs);
        assert!(!instrs.iter().any(|i| matches!(i, Instruction::Not { .. })));
        assert!(matches!(instrs.last(), Some(Instruction::LoadImm { imm: 1, .. })));
    }

    #[test]
    fn constant_arithmetic_folds_at_translation_time() {
        let env = Env { vars: Map::new() };
        let mut gen = RegGen::new();

        for (op, c1, c2, expected) in [
            (IntOp::Add, 2, 3, 5),
            (IntOp::Sub, 5, 3, 2),
            (IntOp::Mul, 4, 3, 12),
        ] {
            let expr = IntExpr::BinOp {
                op,
                lhs: Box::new(IntExpr::Const(c1)),
                rhs: Box::new(IntExpr::Const(c2)),
            };
            let mut instrs = Vec::new();
            lower_int(&expr, &env, &mut gen, &mut instrs);
            assert!(!instrs.iter().any(|i| matches!(i, Instruction::Binary { .. })));
            assert!(matches!(instrs.last(), Some(Instruction::LoadImm { imm, .. }) if *imm == expected));
        }
    }
}
