//! A tiny interpreter for the linearized target language. Loads a program
//! written by `smolc`, binds `r_in` to a supplied integer, runs it to
//! completion, and prints `r_out`.
//!
//! This is not part of the compiler proper: it exists so compiled output
//! can be checked end to end without a separate assembler or hardware
//! target (see `back::interp`).

use std::process::ExitCode;

use clap::Parser;

use smol::back::interp;
use smol::back::linearize::{Label, LinearBlock, LinearProgram, LinearTerminator};
use smol::common::Id;
use smol::middle::ir::{BinOp, Instruction};

#[derive(Debug, Parser)]
#[command(version, about = "Interpreter for the smol target language", long_about = None)]
struct Args {
    /// Path to a linearized target program.
    program: String,

    /// The integer bound to `r_in`.
    input: i64,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let Ok(text) = std::fs::read_to_string(&args.program) else {
        eprintln!("error: could not read `{}`", args.program);
        return ExitCode::FAILURE;
    };

    let program = match parse_program(&text) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let r_out = interp::run(&program, args.input);
    println!("{r_out}");
    ExitCode::SUCCESS
}

/// Parse the textual assembly format emitted by `back::asm`/`back::linearize`
/// back into a [`LinearProgram`]. This is a convenience reader for the `vm`
/// binary and tests; it is deliberately line-oriented and forgiving, since
/// it only ever reads output this same crate produced.
fn parse_program(text: &str) -> Result<LinearProgram, String> {
    let mut blocks = Vec::new();
    let mut current_label: Option<Label> = None;
    let mut current_instrs: Vec<Instruction> = Vec::new();
    let mut current_term = LinearTerminator::None;

    let flush = |blocks: &mut Vec<LinearBlock>,
                 label: &mut Option<Label>,
                 instrs: &mut Vec<Instruction>,
                 term: &mut LinearTerminator| {
        if let Some(label) = label.take() {
            blocks.push(LinearBlock {
                label,
                instrs: std::mem::take(instrs),
                term: std::mem::replace(term, LinearTerminator::None),
            });
        }
    };

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = raw_line.strip_suffix(':').filter(|_| !raw_line.starts_with(' ')) {
            flush(&mut blocks, &mut current_label, &mut current_instrs, &mut current_term);
            current_label = Some(parse_label(name.trim())?);
            continue;
        }
        let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
        match head {
            "nop" => current_instrs.push(Instruction::Nop),
            "copy" => {
                let (src, dst) = parse_arrow(rest)?;
                current_instrs.push(Instruction::Copy { src: reg(&src), dst: reg(&dst) });
            }
            "loadi" => {
                let (imm, dst) = parse_arrow(rest)?;
                current_instrs.push(Instruction::LoadImm { imm: parse_imm(&imm)?, dst: reg(&dst) });
            }
            "load" => {
                let (addr, dst) = parse_arrow(rest)?;
                current_instrs.push(Instruction::Load { addr: reg(&addr), dst: reg(&dst) });
            }
            "store" => {
                let (val, addr) = parse_arrow(rest)?;
                current_instrs.push(Instruction::Store { val: reg(&val), addr: reg(&addr) });
            }
            "not" => {
                let (src, dst) = parse_arrow(rest)?;
                current_instrs.push(Instruction::Not { src: reg(&src), dst: reg(&dst) });
            }
            "add" | "sub" | "mult" | "and" | "less" => {
                let (operands, dst) = parse_arrow(rest)?;
                let mut it = operands.split_whitespace();
                let lhs = it.next().ok_or("missing lhs operand")?;
                let rhs = it.next().ok_or("missing rhs operand")?;
                let op = match head {
                    "add" => BinOp::Add,
                    "sub" => BinOp::Sub,
                    "mult" => BinOp::Mult,
                    "and" => BinOp::And,
                    "less" => BinOp::Less,
                    _ => unreachable!(),
                };
                current_instrs.push(Instruction::Binary { op, lhs: reg(lhs), rhs: reg(rhs), dst: reg(&dst) });
            }
            "jump" => {
                current_term = LinearTerminator::Jump(parse_label(rest.trim())?);
            }
            "cjump" => {
                let mut it = rest.split_whitespace();
                let cond = it.next().ok_or("missing cjump condition")?;
                let if_true = it.next().ok_or("missing cjump true target")?;
                let if_false = it.next().ok_or("missing cjump false target")?;
                current_term = LinearTerminator::CJump {
                    cond: reg(cond),
                    if_true: parse_label(if_true)?,
                    if_false: parse_label(if_false)?,
                };
            }
            other => return Err(format!("unrecognized instruction `{other}`")),
        }
    }
    flush(&mut blocks, &mut current_label, &mut current_instrs, &mut current_term);

    Ok(LinearProgram { blocks })
}

fn reg(s: &str) -> Id {
    Id::from(s.to_string())
}

fn parse_imm(s: &str) -> Result<i64, String> {
    if let Some(hex) = s.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).map_err(|e| format!("invalid hex immediate `{s}`: {e}"))
    } else {
        s.parse().map_err(|e| format!("invalid immediate `{s}`: {e}"))
    }
}

fn parse_label(s: &str) -> Result<Label, String> {
    if s == "main" {
        Ok(Label::Main)
    } else {
        let id: usize = s
            .strip_prefix('L')
            .ok_or_else(|| format!("invalid label `{s}`"))?
            .parse()
            .map_err(|e| format!("invalid label `{s}`: {e}"))?;
        Ok(Label::Block(smol::middle::BlockId(id)))
    }
}

/// Split `"a => b"` into `("a", "b")`, for instructions with a single
/// source side (possibly containing internal spaces for binary ops).
fn parse_arrow(rest: &str) -> Result<(String, String), String> {
    let (lhs, rhs) = rest
        .split_once("=>")
        .ok_or_else(|| format!("expected `=>` in `{rest}`"))?;
    Ok((lhs.trim().to_string(), rhs.trim().to_string()))
}
