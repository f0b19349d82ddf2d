//! Building the source CFG: flatten the command tree into a statement list
//! and accumulate straight-line statements into the currently open block,
//! closing it only at branching constructs. One pass, maximal basic blocks
//! by construction.

use crate::common::Id;
use crate::front::ast::{BoolExpr, Command, IntExpr, Program};

use super::cfg::{BlockId, Cfg, CfgBuilder, EdgeLabel};

/// A straight-line source statement (everything but `if`/`while`, which
/// become block terminators rather than block contents).
#[derive(Clone, Debug)]
pub enum SimpleStmt {
    Skip,
    Assign(Id, IntExpr),
}

/// A source-CFG block: straight-line statements, plus the boolean the block
/// branches on, if any. `cond.is_some()` implies two out-edges (true/false);
/// `cond.is_none()` implies zero or one out-edge.
#[derive(Clone, Debug, Default)]
pub struct SourceBlock {
    pub stmts: Vec<SimpleStmt>,
    pub cond: Option<BoolExpr>,
}

pub struct SourceProgram {
    pub cfg: Cfg<SourceBlock>,
    pub input: Id,
    pub output: Id,
}

/// Build the source CFG for a whole program, including the explicit
/// `nop`-only entry and exit blocks (§4.3: uniform start/stop points
/// simplify every later phase).
pub fn build(program: Program) -> SourceProgram {
    let mut builder: CfgBuilder<SourceBlock> = CfgBuilder::new();

    let entry = builder.add_block(SourceBlock {
        stmts: vec![SimpleStmt::Skip],
        cond: None,
    });
    let start = builder.add_block(SourceBlock::default());
    builder.add_edge(entry, EdgeLabel::Unconditional, start);

    let last_open = build_stmts(&mut builder, start, program.body.flatten());

    let exit = builder.add_block(SourceBlock {
        stmts: vec![SimpleStmt::Skip],
        cond: None,
    });
    builder.add_edge(last_open, EdgeLabel::Unconditional, exit);

    SourceProgram {
        cfg: builder.finish(entry, exit),
        input: program.input,
        output: program.output,
    }
}

/// Process a flattened statement list on the currently open block `open`,
/// returning the block that is open once every statement has been
/// accumulated (closed by the last `if`/`while`, or `open` itself if the
/// list was all straight-line).
fn build_stmts(builder: &mut CfgBuilder<SourceBlock>, open: BlockId, stmts: Vec<Command>) -> BlockId {
    let mut open = open;
    for stmt in stmts {
        match stmt {
            Command::Skip => builder.block_mut(open).stmts.push(SimpleStmt::Skip),
            Command::Assign(x, e) => builder.block_mut(open).stmts.push(SimpleStmt::Assign(x, e)),
            Command::Seq(..) => unreachable!("Command::flatten removes every Seq node"),
            Command::If { cond, tt, ff } => {
                builder.block_mut(open).cond = Some(cond);
                let join = builder.add_block(SourceBlock::default());

                let t_start = builder.add_block(SourceBlock::default());
                builder.add_edge(open, EdgeLabel::True, t_start);
                let t_end = build_stmts(builder, t_start, tt.flatten());
                builder.add_edge(t_end, EdgeLabel::Unconditional, join);

                let e_start = builder.add_block(SourceBlock::default());
                builder.add_edge(open, EdgeLabel::False, e_start);
                let e_end = build_stmts(builder, e_start, ff.flatten());
                builder.add_edge(e_end, EdgeLabel::Unconditional, join);

                open = join;
            }
            Command::While { cond, body } => {
                builder.block_mut(open).cond = Some(cond);
                let exit = builder.add_block(SourceBlock::default());
                let body_start = builder.add_block(SourceBlock::default());
                builder.add_edge(open, EdgeLabel::True, body_start);
                builder.add_edge(open, EdgeLabel::False, exit);

                let body_end = build_stmts(builder, body_start, body.flatten());
                builder.add_edge(body_end, EdgeLabel::Unconditional, open);

                open = exit;
            }
        }
    }
    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::ast::IntOp;

    fn id(s: &str) -> Id {
        Id::from(s.to_string())
    }

    #[test]
    fn direct_assignment_stays_in_one_block() {
        let program = Program {
            input: id("x"),
            output: id("y"),
            body: Command::Assign(id("y"), IntExpr::Var(id("x"))),
        };
        let sp = build(program);
        // entry, the single straight-line block, exit.
        assert_eq!(sp.cfg.blocks.len(), 3);
        assert_eq!(sp.cfg.successors(sp.cfg.entry).len(), 1);
        assert_eq!(sp.cfg.successors(sp.cfg.exit).len(), 0);
    }

    #[test]
    fn if_produces_two_successors_and_a_join() {
        let program = Program {
            input: id("x"),
            output: id("y"),
            body: Command::If {
                cond: BoolExpr::Less(
                    Box::new(IntExpr::Var(id("x"))),
                    Box::new(IntExpr::Const(0)),
                ),
                tt: Box::new(Command::Assign(id("y"), IntExpr::Const(1))),
                ff: Box::new(Command::Skip),
            },
        };
        let sp = build(program);
        // entry, header(if), then, else, join, exit
        assert_eq!(sp.cfg.blocks.len(), 6);
        let header = sp.cfg.successors(sp.cfg.entry)[0].0;
        let outs = sp.cfg.successors(header);
        assert_eq!(outs.len(), 2);
        assert!(outs.iter().any(|&(_, l)| l == EdgeLabel::True));
        assert!(outs.iter().any(|&(_, l)| l == EdgeLabel::False));
    }

    #[test]
    fn while_creates_a_back_edge() {
        let program = Program {
            input: id("n"),
            output: id("sum"),
            body: Command::While {
                cond: BoolExpr::Less(Box::new(IntExpr::Const(0)), Box::new(IntExpr::Var(id("n")))),
                body: Box::new(Command::Assign(
                    id("n"),
                    IntExpr::BinOp {
                        op: IntOp::Sub,
                        lhs: Box::new(IntExpr::Var(id("n"))),
                        rhs: Box::new(IntExpr::Const(1)),
                    },
                )),
            },
        };
        let sp = build(program);
        let header = sp.cfg.successors(sp.cfg.entry)[0].0;
        let body = sp
            .cfg
            .successors(header)
            .iter()
            .find(|&&(_, l)| l == EdgeLabel::True)
            .unwrap()
            .0;
        let body_outs = sp.cfg.successors(body);
        assert_eq!(body_outs.len(), 1);
        assert_eq!(body_outs[0].0, header);
    }
}
