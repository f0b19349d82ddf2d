//! Linearization: flatten a target CFG into the labeled instruction
//! sequence the textual assembly format describes. Mechanical by design
//! (spec.md §4.10): blocks in ascending id order, the entry block's label
//! written as `main`, every other block as `L{id}`.

use crate::middle::cfg::{BlockId, Cfg, EdgeLabel};
use crate::middle::ir::{Block, Instruction, Terminator};

/// A label, either the program's single entry point or an ordinary block.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Label {
    Main,
    Block(BlockId),
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Main => write!(f, "main"),
            Label::Block(id) => write!(f, "L{id}"),
        }
    }
}

/// A linearized terminator: the jump target(s) resolved to labels.
#[derive(Clone, Debug)]
pub enum LinearTerminator {
    None,
    Jump(Label),
    CJump { cond: crate::middle::ir::Reg, if_true: Label, if_false: Label },
}

/// One emitted block: its label, its straight-line instructions, and its
/// resolved terminator.
pub struct LinearBlock {
    pub label: Label,
    pub instrs: Vec<Instruction>,
    pub term: LinearTerminator,
}

pub struct LinearProgram {
    pub blocks: Vec<LinearBlock>,
}

pub fn linearize(cfg: &Cfg<Block>) -> LinearProgram {
    let label_of = |id: BlockId| if id == cfg.entry { Label::Main } else { Label::Block(id) };

    let mut blocks = Vec::new();
    for id in cfg.block_ids() {
        let block = &cfg.blocks[&id];
        let term = match &block.term {
            Terminator::None => LinearTerminator::None,
            Terminator::Jump => {
                let (target, _) = cfg.successors(id)[0];
                LinearTerminator::Jump(label_of(target))
            }
            Terminator::CJump(r) => {
                let successors = cfg.successors(id);
                let if_true = successors
                    .iter()
                    .find(|&&(_, label)| label == EdgeLabel::True)
                    .map(|&(to, _)| label_of(to))
                    .expect("a cjump block must have a true successor");
                let if_false = successors
                    .iter()
                    .find(|&&(_, label)| label == EdgeLabel::False)
                    .map(|&(to, _)| label_of(to))
                    .expect("a cjump block must have a false successor");
                LinearTerminator::CJump { cond: *r, if_true, if_false }
            }
        };
        blocks.push(LinearBlock { label: label_of(id), instrs: block.instrs.clone(), term });
    }

    LinearProgram { blocks }
}
