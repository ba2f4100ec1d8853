//! Execution engine: runs an `#ip`-bound program against a register file.
//!
//! One general-purpose register is kept synchronized with the instruction
//! pointer. The sync is two deliberate copies around each dispatch — ip into
//! the bound register before `apply`, the bound register back out after — so
//! programs can read and overwrite their own control flow (jumps, branches,
//! loops) with ordinary instructions.

use crate::isa::Instruction;
use crate::state::{RegisterError, Registers};

/// Register count used by ip-bound device programs.
pub const PROGRAM_REGISTERS: usize = 6;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error(transparent)]
    Register(#[from] RegisterError),
    #[error("execution budget of {budget} steps exhausted at ip {ip}")]
    BudgetExceeded { budget: u64, ip: i64 },
}

/// An immutable program: instruction list plus the ip-bound register index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    ip_reg: usize,
    instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(ip_reg: usize, instructions: Vec<Instruction>) -> Self {
        Self {
            ip_reg,
            instructions,
        }
    }

    pub fn ip_reg(&self) -> usize {
        self.ip_reg
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

/// Outcome of a single execution step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Running,
    /// The instruction pointer left `[0, len)` — normal termination.
    Halted,
}

/// A program together with its mutable run state.
pub struct Machine {
    program: Program,
    regs: Registers,
    ip: i64,
    steps: u64,
}

impl Machine {
    /// Build a machine over zeroed registers.
    pub fn new(program: Program) -> Result<Self, RegisterError> {
        Self::with_registers(program, Registers::new(PROGRAM_REGISTERS))
    }

    /// Build a machine over externally supplied initial registers.
    ///
    /// Fails if the ip-bound register does not exist in the file.
    pub fn with_registers(program: Program, regs: Registers) -> Result<Self, RegisterError> {
        // Surface a bad ip binding before the first step rather than mid-run.
        regs.get(program.ip_reg())?;
        Ok(Self {
            program,
            regs,
            ip: 0,
            steps: 0,
        })
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn ip(&self) -> i64 {
        self.ip
    }

    /// Steps executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Instruction about to execute, if the ip is in range.
    pub fn current_instruction(&self) -> Option<&Instruction> {
        usize::try_from(self.ip)
            .ok()
            .and_then(|ip| self.program.instructions().get(ip))
    }

    /// Run one fetch-sync-apply-sync-increment cycle.
    pub fn step(&mut self) -> Result<StepOutcome, ExecError> {
        let index = match usize::try_from(self.ip) {
            Ok(index) if index < self.program.len() => index,
            _ => return Ok(StepOutcome::Halted),
        };
        let instruction = self.program.instructions()[index];
        self.regs.set(self.program.ip_reg(), self.ip)?;
        instruction.apply(&mut self.regs)?;
        self.ip = self.regs.get(self.program.ip_reg())?;
        self.ip += 1;
        self.steps += 1;
        Ok(StepOutcome::Running)
    }

    /// Run until the ip leaves the program, returning the final registers.
    pub fn run(&mut self) -> Result<&Registers, ExecError> {
        while self.step()? == StepOutcome::Running {}
        Ok(&self.regs)
    }

    /// Run with an external step ceiling for untrusted programs.
    ///
    /// The ceiling is checked before each step, so at most `budget` steps
    /// execute; a zero budget fails before mutating anything.
    pub fn run_with_budget(&mut self, budget: u64) -> Result<&Registers, ExecError> {
        loop {
            if self.current_instruction().is_none() {
                return Ok(&self.regs);
            }
            if self.steps >= budget {
                return Err(ExecError::BudgetExceeded {
                    budget,
                    ip: self.ip,
                });
            }
            self.step()?;
        }
    }
}
