//! The compiler CLI: parse a source file, run it through the pipeline, and
//! write the linearized target program to an output file.
//!
//! Exit codes: `0` on success, `1` on a safety-check failure or any
//! malformed input (parse error, invalid register budget).

use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{debug, info};

use smol::back;
use smol::common::Set;
use smol::front;
use smol::middle::{self, allocate::AllocOptions};
use smol::middle::ir::{self, Block, Cfg, Reg};
use smol::middle::regs;

#[derive(Debug, Parser)]
#[command(version, about = "A miniature optimizing compiler", long_about = None)]
struct Args {
    /// Path to the source program.
    input: String,

    /// Path to write the compiled target program to.
    output: String,

    /// Number of physical registers available to the allocator (>= 4).
    #[arg(short = 'n', long = "registers", default_value_t = 4)]
    n_registers: usize,

    /// Run the definite-assignment/liveness safety checker before emitting code.
    #[arg(long)]
    safety: bool,

    /// Enable coalescing and dead-store elimination.
    #[arg(short = 'O', long)]
    optimize: bool,

    /// Print diagnostic tracing (block counts, fixpoint sizes, spill counts).
    #[arg(short, long)]
    verbose: bool,

    /// Print an intermediate artifact to stdout instead of (or in addition
    /// to) writing the compiled output, for debugging the pipeline.
    #[arg(value_enum, long)]
    dump: Option<Dump>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Dump {
    /// The token stream.
    Tokens,
    /// The parsed source AST.
    Ast,
    /// The target CFG immediately after translation, before any reduction pass.
    Ir,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let Ok(source) = std::fs::read_to_string(&args.input) else {
        eprintln!("error: could not read `{}`", args.input);
        return ExitCode::FAILURE;
    };

    if let Some(Dump::Tokens) = args.dump {
        match front::lex::Lexer::tokenize(&source) {
            Ok(tokens) => {
                for tok in tokens {
                    println!("{tok}");
                }
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    let program = match front::parse(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(Dump::Ast) = args.dump {
        println!("{program:#?}");
        return ExitCode::SUCCESS;
    }

    info!("building source CFG");
    let source_program = middle::source_cfg::build(program);
    debug!("source CFG has {} blocks", source_program.cfg.blocks.len());

    info!("translating to target IR");
    let mut cfg = middle::translate::translate(source_program);
    debug!("target CFG has {} blocks", cfg.blocks.len());

    if let Some(Dump::Ir) = args.dump {
        let linear = back::linearize(&cfg);
        println!("{linear}");
        return ExitCode::SUCCESS;
    }

    if args.safety {
        info!("running safety checker");
        if let Err(errors) = middle::safety::check(&cfg) {
            for e in &errors {
                eprintln!("error: {e}");
            }
            return ExitCode::FAILURE;
        }
    }

    if args.optimize {
        info!("coalescing");
        let before = count_registers(&cfg);
        cfg = middle::coalesce::coalesce(cfg);
        debug!("coalescing: {} registers -> {}", before, count_registers(&cfg));
    }

    info!("allocating registers (n = {})", args.n_registers);
    let opts = AllocOptions {
        n_registers: args.n_registers,
        eliminate_dead_stores: args.optimize,
    };
    let allocation = match middle::allocate::allocate(cfg, &opts) {
        Ok(allocation) => allocation,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    debug!("{} register(s) spilled", allocation.spills.len());

    let linear = back::linearize(&allocation.cfg);
    let rendered = format!("{linear}");

    if let Err(e) = std::fs::write(&args.output, &rendered) {
        eprintln!("error: could not write `{}`: {e}", args.output);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Count of distinct non-reserved registers still in use, for the
/// `--verbose` coalescing trace.
fn count_registers(cfg: &Cfg<Block>) -> usize {
    let mut all: Set<Reg> = Set::new();
    for id in cfg.block_ids() {
        let block = &cfg.blocks[&id];
        for instr in &block.instrs {
            all.extend(regs::used(instr));
            all.extend(regs::defined(instr));
        }
        all.extend(regs::term_used(&block.term));
    }
    all.retain(|&r| !ir::is_reserved(r));
    all.len()
}
