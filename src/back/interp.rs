//! A direct interpreter over a linearized target program. Exists purely so
//! compiled output is checkable end to end without a separate native
//! assembler/runtime: feed it `r_in`, run it, read back `r_out`.

use crate::common::Map;
use crate::middle::ir::{BinOp, Instruction, Reg};

use super::linearize::{Label, LinearProgram, LinearTerminator};

pub struct Interp<'a> {
    program: &'a LinearProgram,
    registers: Map<Reg, i64>,
    memory: Map<i64, i64>,
}

impl<'a> Interp<'a> {
    pub fn new(program: &'a LinearProgram) -> Self {
        Interp { program, registers: Map::new(), memory: Map::new() }
    }

    fn reg(&self, r: Reg) -> i64 {
        self.registers.get(&r).copied().unwrap_or(0)
    }

    fn block_index(&self, label: Label) -> usize {
        self.program
            .blocks
            .iter()
            .position(|b| b.label == label)
            .unwrap_or_else(|| panic!("no block labeled {label}"))
    }

    /// Run the program to completion with `r_in` bound to `input`, and
    /// return the final value of `r_out`.
    pub fn run(&mut self, input: i64) -> i64 {
        self.registers.insert(crate::middle::ir::r_in(), input);

        let mut index = self.block_index(Label::Main);
        loop {
            let block = &self.program.blocks[index];
            for instr in &block.instrs {
                self.step(instr);
            }
            match &block.term {
                LinearTerminator::None => break,
                LinearTerminator::Jump(target) => index = self.block_index(*target),
                LinearTerminator::CJump { cond, if_true, if_false } => {
                    index = if self.reg(*cond) != 0 {
                        self.block_index(*if_true)
                    } else {
                        self.block_index(*if_false)
                    };
                }
            }
        }

        self.reg(crate::middle::ir::r_out())
    }

    fn step(&mut self, instr: &Instruction) {
        match *instr {
            Instruction::Nop => {}
            Instruction::Copy { src, dst } => {
                let v = self.reg(src);
                self.registers.insert(dst, v);
            }
            Instruction::LoadImm { imm, dst } => {
                self.registers.insert(dst, imm);
            }
            Instruction::Load { addr, dst } => {
                let a = self.reg(addr);
                let v = self.memory.get(&a).copied().unwrap_or(0);
                self.registers.insert(dst, v);
            }
            Instruction::Store { val, addr } => {
                let v = self.reg(val);
                let a = self.reg(addr);
                self.memory.insert(a, v);
            }
            Instruction::Binary { op, lhs, rhs, dst } => {
                let l = self.reg(lhs);
                let r = self.reg(rhs);
                let v = match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mult => l * r,
                    BinOp::And => i64::from(l != 0 && r != 0),
                    BinOp::Less => i64::from(l < r),
                };
                self.registers.insert(dst, v);
            }
            Instruction::Not { src, dst } => {
                let v = self.reg(src);
                self.registers.insert(dst, i64::from(v == 0));
            }
        }
    }
}

/// Convenience entry point: run `program` on `input` and return `r_out`.
pub fn run(program: &LinearProgram, input: i64) -> i64 {
    Interp::new(program).run(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Id;
    use crate::middle::cfg::{CfgBuilder, EdgeLabel};
    use crate::middle::ir::{self, Block, Terminator};

    fn reg(s: &str) -> Reg {
        Id::from(s.to_string())
    }

    #[test]
    fn direct_copy_passes_input_through() {
        let mut b: CfgBuilder<Block> = CfgBuilder::new();
        let entry = b.add_block(Block {
            instrs: vec![Instruction::Copy { src: ir::r_in(), dst: ir::r_out() }],
            term: Terminator::None,
        });
        let cfg = b.finish(entry, entry);
        let program = super::super::linearize::linearize(&cfg);

        assert_eq!(run(&program, 5), 5);
    }

    #[test]
    fn loop_sums_one_through_n() {
        // while 0 < n do { sum := sum + n; n := n - 1 }; r_out := sum
        let mut b: CfgBuilder<Block> = CfgBuilder::new();
        let header = b.add_block(Block { instrs: vec![], term: Terminator::CJump(reg("cond")) });
        let body = b.add_block(Block::new());
        let exit = b.add_block(Block { instrs: vec![], term: Terminator::None });
        b.add_edge(header, EdgeLabel::True, body);
        b.add_edge(header, EdgeLabel::False, exit);
        b.add_edge(body, EdgeLabel::Unconditional, header);
        let mut cfg = b.finish(header, exit);

        cfg.blocks.get_mut(&header).unwrap().instrs = vec![
            Instruction::LoadImm { imm: 0, dst: reg("zero") },
            Instruction::Binary { op: BinOp::Less, lhs: reg("zero"), rhs: reg("n"), dst: reg("cond") },
        ];
        cfg.blocks.get_mut(&body).unwrap().instrs = vec![
            Instruction::Binary { op: BinOp::Add, lhs: reg("sum"), rhs: reg("n"), dst: reg("sum") },
            Instruction::LoadImm { imm: 1, dst: reg("one") },
            Instruction::Binary { op: BinOp::Sub, lhs: reg("n"), rhs: reg("one"), dst: reg("n") },
        ];
        cfg.blocks.get_mut(&exit).unwrap().instrs = vec![Instruction::Copy { src: reg("sum"), dst: ir::r_out() }];

        // Seed n := r_in, sum := 0 before the loop by folding them into the
        // entry block directly (header doubles as entry here).
        let mut seeded = cfg.blocks[&header].instrs.clone();
        let mut prelude = vec![
            Instruction::Copy { src: ir::r_in(), dst: reg("n") },
            Instruction::LoadImm { imm: 0, dst: reg("sum") },
        ];
        prelude.append(&mut seeded);
        cfg.blocks.get_mut(&header).unwrap().instrs = prelude;

        let program = super::super::linearize::linearize(&cfg);
        assert_eq!(run(&program, 4), 10);
    }
}
