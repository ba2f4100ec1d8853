//! The chronal device's closed 16-instruction set.
//!
//! Every instruction reads at most two operands, computes a value, and writes
//! it into the register named by `c`. The four families differ only in which
//! of `a`/`b` name registers and which are literal immediates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::state::{RegisterError, Registers};

/// One of the 16 known instruction semantics.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    Addr,
    Addi,
    Mulr,
    Muli,
    Banr,
    Bani,
    Borr,
    Bori,
    Setr,
    Seti,
    Gtir,
    Gtri,
    Gtrr,
    Eqir,
    Eqri,
    Eqrr,
}

impl Opcode {
    pub const COUNT: usize = 16;

    /// Every opcode, in canonical table order.
    pub const ALL: [Opcode; Opcode::COUNT] = [
        Opcode::Addr,
        Opcode::Addi,
        Opcode::Mulr,
        Opcode::Muli,
        Opcode::Banr,
        Opcode::Bani,
        Opcode::Borr,
        Opcode::Bori,
        Opcode::Setr,
        Opcode::Seti,
        Opcode::Gtir,
        Opcode::Gtri,
        Opcode::Gtrr,
        Opcode::Eqir,
        Opcode::Eqri,
        Opcode::Eqrr,
    ];

    /// Position of this opcode in [`Opcode::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Addr => "addr",
            Opcode::Addi => "addi",
            Opcode::Mulr => "mulr",
            Opcode::Muli => "muli",
            Opcode::Banr => "banr",
            Opcode::Bani => "bani",
            Opcode::Borr => "borr",
            Opcode::Bori => "bori",
            Opcode::Setr => "setr",
            Opcode::Seti => "seti",
            Opcode::Gtir => "gtir",
            Opcode::Gtri => "gtri",
            Opcode::Gtrr => "gtrr",
            Opcode::Eqir => "eqir",
            Opcode::Eqri => "eqri",
            Opcode::Eqrr => "eqrr",
        }
    }

    /// Compute the value this opcode writes into `reg[c]`.
    ///
    /// `addr`/`addi`/`mulr`/`muli` wrap on `i64` overflow; device programs
    /// never rely on overflow, wrapping just keeps the result deterministic.
    pub fn eval(self, a: i64, b: i64, regs: &Registers) -> Result<i64, RegisterError> {
        let value = match self {
            Opcode::Addr => reg(regs, a)?.wrapping_add(reg(regs, b)?),
            Opcode::Addi => reg(regs, a)?.wrapping_add(b),
            Opcode::Mulr => reg(regs, a)?.wrapping_mul(reg(regs, b)?),
            Opcode::Muli => reg(regs, a)?.wrapping_mul(b),
            Opcode::Banr => reg(regs, a)? & reg(regs, b)?,
            Opcode::Bani => reg(regs, a)? & b,
            Opcode::Borr => reg(regs, a)? | reg(regs, b)?,
            Opcode::Bori => reg(regs, a)? | b,
            Opcode::Setr => reg(regs, a)?,
            Opcode::Seti => a,
            Opcode::Gtir => bool_reg(a > reg(regs, b)?),
            Opcode::Gtri => bool_reg(reg(regs, a)? > b),
            Opcode::Gtrr => bool_reg(reg(regs, a)? > reg(regs, b)?),
            Opcode::Eqir => bool_reg(a == reg(regs, b)?),
            Opcode::Eqri => bool_reg(reg(regs, a)? == b),
            Opcode::Eqrr => bool_reg(reg(regs, a)? == reg(regs, b)?),
        };
        Ok(value)
    }
}

fn bool_reg(condition: bool) -> i64 {
    if condition {
        1
    } else {
        0
    }
}

/// Resolve a register-mode operand against the file length.
fn reg(regs: &Registers, operand: i64) -> Result<i64, RegisterError> {
    let index = reg_index(operand, regs.len())?;
    regs.get(index)
}

/// Convert an operand into a validated register index.
pub(crate) fn reg_index(operand: i64, len: usize) -> Result<usize, RegisterError> {
    match usize::try_from(operand) {
        Ok(index) if index < len => Ok(index),
        _ => Err(RegisterError::OutOfBounds {
            index: operand,
            len,
        }),
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Error for a mnemonic not in the 16-instruction table.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown mnemonic '{0}'")]
pub struct UnknownMnemonic(pub String);

impl FromStr for Opcode {
    type Err = UnknownMnemonic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "addr" => Ok(Opcode::Addr),
            "addi" => Ok(Opcode::Addi),
            "mulr" => Ok(Opcode::Mulr),
            "muli" => Ok(Opcode::Muli),
            "banr" => Ok(Opcode::Banr),
            "bani" => Ok(Opcode::Bani),
            "borr" => Ok(Opcode::Borr),
            "bori" => Ok(Opcode::Bori),
            "setr" => Ok(Opcode::Setr),
            "seti" => Ok(Opcode::Seti),
            "gtir" => Ok(Opcode::Gtir),
            "gtri" => Ok(Opcode::Gtri),
            "gtrr" => Ok(Opcode::Gtrr),
            "eqir" => Ok(Opcode::Eqir),
            "eqri" => Ok(Opcode::Eqri),
            "eqrr" => Ok(Opcode::Eqrr),
            other => Err(UnknownMnemonic(other.to_string())),
        }
    }
}

/// A decoded instruction: opcode plus three operand fields.
///
/// `c` always names the destination register; whether `a` and `b` are
/// register indices or immediates depends on the opcode. Instructions are
/// immutable once built.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: Opcode,
    pub a: i64,
    pub b: i64,
    pub c: i64,
}

impl Instruction {
    pub fn new(op: Opcode, a: i64, b: i64, c: i64) -> Self {
        Self { op, a, b, c }
    }

    /// Execute this instruction against `regs`, writing only register `c`.
    pub fn apply(&self, regs: &mut Registers) -> Result<(), RegisterError> {
        let value = self.op.eval(self.a, self.b, regs)?;
        let c = reg_index(self.c, regs.len())?;
        regs.set(c, value)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.op, self.a, self.b, self.c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(op: Opcode, a: i64, b: i64, c: i64, before: &[i64]) -> Vec<i64> {
        let mut regs = Registers::from_values(before.to_vec());
        Instruction::new(op, a, b, c).apply(&mut regs).unwrap();
        regs.as_slice().to_vec()
    }

    #[test]
    fn addr_adds_two_registers() {
        assert_eq!(applied(Opcode::Addr, 0, 1, 3, &[3, 5, 0, 0]), [3, 5, 0, 8]);
    }

    #[test]
    fn addi_adds_an_immediate() {
        assert_eq!(applied(Opcode::Addi, 0, 7, 3, &[3, 5, 0, 0]), [3, 5, 0, 10]);
    }

    #[test]
    fn mulr_multiplies_two_registers() {
        assert_eq!(applied(Opcode::Mulr, 0, 1, 2, &[3, 5, 0, 0]), [3, 5, 15, 0]);
    }

    #[test]
    fn muli_multiplies_by_an_immediate() {
        assert_eq!(applied(Opcode::Muli, 1, 4, 0, &[3, 5, 0, 0]), [20, 5, 0, 0]);
    }

    #[test]
    fn banr_ands_two_registers() {
        assert_eq!(
            applied(Opcode::Banr, 0, 1, 2, &[0b110, 0b011, 0, 0]),
            [0b110, 0b011, 0b010, 0]
        );
    }

    #[test]
    fn bani_ands_an_immediate() {
        assert_eq!(applied(Opcode::Bani, 0, 0b001, 3, &[0b111, 0, 0, 0]), [0b111, 0, 0, 1]);
    }

    #[test]
    fn borr_ors_two_registers() {
        assert_eq!(
            applied(Opcode::Borr, 0, 1, 2, &[0b100, 0b001, 0, 0]),
            [0b100, 0b001, 0b101, 0]
        );
    }

    #[test]
    fn bori_ors_an_immediate() {
        assert_eq!(applied(Opcode::Bori, 0, 0b010, 3, &[0b100, 0, 0, 0]), [0b100, 0, 0, 0b110]);
    }

    #[test]
    fn setr_copies_a_register() {
        assert_eq!(applied(Opcode::Setr, 1, 9, 0, &[3, 5, 0, 0]), [5, 5, 0, 0]);
    }

    #[test]
    fn seti_stores_an_immediate() {
        assert_eq!(applied(Opcode::Seti, 42, 9, 2, &[3, 5, 0, 0]), [3, 5, 42, 0]);
    }

    #[test]
    fn gtir_compares_immediate_to_register() {
        assert_eq!(applied(Opcode::Gtir, 6, 1, 3, &[3, 5, 0, 0]), [3, 5, 0, 1]);
        assert_eq!(applied(Opcode::Gtir, 4, 1, 3, &[3, 5, 0, 0]), [3, 5, 0, 0]);
    }

    #[test]
    fn gtri_compares_register_to_immediate() {
        assert_eq!(applied(Opcode::Gtri, 1, 4, 2, &[3, 5, 0, 0]), [3, 5, 1, 0]);
        assert_eq!(applied(Opcode::Gtri, 1, 5, 2, &[3, 5, 0, 0]), [3, 5, 0, 0]);
    }

    #[test]
    fn gtrr_compares_two_registers() {
        assert_eq!(applied(Opcode::Gtrr, 1, 0, 2, &[3, 5, 0, 0]), [3, 5, 1, 0]);
        assert_eq!(applied(Opcode::Gtrr, 0, 1, 2, &[3, 5, 0, 0]), [3, 5, 0, 0]);
    }

    #[test]
    fn eqir_tests_immediate_equality_against_register() {
        assert_eq!(applied(Opcode::Eqir, 5, 1, 0, &[3, 5, 0, 0]), [1, 5, 0, 0]);
        assert_eq!(applied(Opcode::Eqir, 4, 1, 0, &[3, 5, 0, 0]), [0, 5, 0, 0]);
    }

    #[test]
    fn eqri_tests_register_equality_against_immediate() {
        // Worked example from the device manual: reg=[3,5,0,0], a=1, b=5, c=2.
        assert_eq!(applied(Opcode::Eqri, 1, 5, 2, &[3, 5, 0, 0]), [3, 5, 1, 0]);
    }

    #[test]
    fn eqrr_tests_register_equality() {
        assert_eq!(applied(Opcode::Eqrr, 0, 1, 2, &[5, 5, 0, 0]), [5, 5, 1, 0]);
        assert_eq!(applied(Opcode::Eqrr, 0, 1, 2, &[3, 5, 0, 0]), [3, 5, 0, 0]);
    }

    #[test]
    fn apply_touches_only_the_destination_register() {
        let mut regs = Registers::from_values(vec![1, 2, 3, 4, 5, 6]);
        Instruction::new(Opcode::Addr, 0, 1, 5).apply(&mut regs).unwrap();
        assert_eq!(regs.as_slice(), &[1, 2, 3, 4, 5, 3]);
    }

    #[test]
    fn register_mode_operands_are_bounds_checked() {
        let mut regs = Registers::new(4);
        let err = Instruction::new(Opcode::Addr, 0, 4, 0)
            .apply(&mut regs)
            .unwrap_err();
        assert_eq!(err, RegisterError::OutOfBounds { index: 4, len: 4 });
        // Immediate-mode `b` is never treated as an index.
        assert!(Instruction::new(Opcode::Addi, 0, 99, 0).apply(&mut regs).is_ok());
    }

    #[test]
    fn destination_is_bounds_checked_before_writing() {
        let mut regs = Registers::from_values(vec![1, 2, 3, 4]);
        let err = Instruction::new(Opcode::Seti, 0, 0, -1)
            .apply(&mut regs)
            .unwrap_err();
        assert_eq!(err, RegisterError::OutOfBounds { index: -1, len: 4 });
        assert_eq!(regs.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn mnemonic_round_trip() {
        for op in Opcode::ALL {
            assert_eq!(op.mnemonic().parse::<Opcode>().unwrap(), op);
        }
        assert!("divr".parse::<Opcode>().is_err());
    }
}
