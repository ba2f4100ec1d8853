use anyhow::{Context, Result};
use chronal_core::{
    count_ambiguous, parse_device_dump, parse_program, resolve_opcode_mapping,
    run_identified_program, Machine, Program, Registers, PROGRAM_REGISTERS,
};
use clap::{ArgAction, Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "chronal-cli")]
#[command(about = "Chronal wrist-device VM: run programs, identify opcodes", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an '#ip'-bound program and print the final registers
    Run {
        /// Program file ('-' reads stdin)
        input: PathBuf,

        /// Initial register value as <index>=<value>; repeatable
        #[arg(long = "reg", value_parser = parse_reg_init)]
        regs: Vec<(usize, i64)>,

        /// Abort after this many steps (0 = unbounded)
        #[arg(long, default_value_t = 0)]
        max_steps: u64,

        /// Print one 'ip=.. [regs] instr [regs]' line per cycle
        #[arg(long, action = ArgAction::SetTrue)]
        trace: bool,

        /// Emit JSON instead of text
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Analyze a sample dump: ambiguity count or full opcode table
    Identify {
        /// Sample dump file ('-' reads stdin)
        input: PathBuf,

        /// Count samples matching at least this many instructions
        #[arg(long, default_value_t = 3)]
        threshold: usize,

        /// Resolve the numeric-opcode table instead of counting
        #[arg(long, action = ArgAction::SetTrue)]
        resolve: bool,

        /// Also execute the dump's trailing test program
        #[arg(long, action = ArgAction::SetTrue)]
        execute: bool,

        /// Emit JSON instead of text
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
}

fn parse_reg_init(s: &str) -> Result<(usize, i64), String> {
    let (index, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <index>=<value>, got '{s}'"))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("bad register index '{index}': {e}"))?;
    let value = value
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("bad register value '{value}': {e}"))?;
    Ok((index, value))
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("read stdin")?;
        Ok(buffer)
    } else {
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
    }
}

fn run_program(
    program: Program,
    inits: &[(usize, i64)],
    max_steps: u64,
    trace: bool,
) -> Result<Registers> {
    let mut regs = Registers::new(PROGRAM_REGISTERS);
    for &(index, value) in inits {
        regs.set(index, value)
            .with_context(|| format!("--reg {index}={value}"))?;
    }
    let mut machine = Machine::with_registers(program, regs)?;
    if !trace {
        if max_steps == 0 {
            machine.run()?;
        } else {
            machine.run_with_budget(max_steps)?;
        }
        return Ok(machine.registers().clone());
    }
    loop {
        let (ip, instruction, before) = match machine.current_instruction() {
            Some(instruction) => (machine.ip(), *instruction, machine.registers().clone()),
            None => break,
        };
        if max_steps != 0 && machine.steps() >= max_steps {
            anyhow::bail!("execution budget of {max_steps} steps exhausted at ip {ip}");
        }
        machine.step()?;
        println!(
            "ip={ip} {before} {instruction} {after}",
            after = machine.registers()
        );
    }
    Ok(machine.registers().clone())
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Run {
            input,
            regs,
            max_steps,
            trace,
            json,
        } => {
            let text = read_input(&input)?;
            let program = parse_program(&text)?;
            let final_regs = run_program(program, &regs, max_steps, trace)?;
            if json {
                let payload = serde_json::json!({
                    "registers": final_regs.as_slice(),
                    "reg0": final_regs.get(0)?,
                });
                println!("{payload}");
            } else {
                println!("registers: {final_regs}");
                println!("reg0: {}", final_regs.get(0)?);
            }
        }
        Command::Identify {
            input,
            threshold,
            resolve,
            execute,
            json,
        } => {
            let text = read_input(&input)?;
            let (samples, tail) = parse_device_dump(&text)?;
            if !resolve && !execute {
                let ambiguous = count_ambiguous(&samples, threshold);
                if json {
                    let payload = serde_json::json!({
                        "samples": samples.len(),
                        "threshold": threshold,
                        "ambiguous": ambiguous,
                    });
                    println!("{payload}");
                } else {
                    println!(
                        "{ambiguous} of {} samples match at least {threshold} instructions",
                        samples.len()
                    );
                }
                return Ok(());
            }

            let mapping = resolve_opcode_mapping(&samples)?;
            if json && !execute {
                println!("{}", serde_json::to_string(&mapping)?);
            } else if !execute {
                for (number, op) in &mapping {
                    println!("{number:>2} -> {op}");
                }
            }
            if execute {
                let regs =
                    run_identified_program(&mapping, &tail, Registers::new(sample_width(&samples)))?;
                if json {
                    let payload = serde_json::json!({
                        "mapping": mapping,
                        "registers": regs.as_slice(),
                        "reg0": regs.get(0)?,
                    });
                    println!("{payload}");
                } else {
                    println!("registers: {regs}");
                    println!("reg0: {}", regs.get(0)?);
                }
            }
        }
    }
    Ok(())
}

/// Register-file width of the dump's samples (4 on real hardware).
fn sample_width(samples: &[chronal_core::Sample]) -> usize {
    samples.first().map_or(4, |sample| sample.before.len())
}
