use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors surfaced while reading or writing the register file.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error("register index {index} is out of range for a {len}-register file")]
    OutOfBounds { index: i64, len: usize },
}

/// Fixed-length file of signed integer registers.
///
/// The device exposes either 4 registers (sample dumps) or 6 (programs that
/// bind a register to the instruction pointer); the length is fixed at
/// construction and every access is bounds-checked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registers {
    values: Vec<i64>,
}

impl Registers {
    /// A zeroed register file of the given length.
    pub fn new(len: usize) -> Self {
        Self {
            values: vec![0; len],
        }
    }

    pub fn from_values(values: Vec<i64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Read register `index`.
    pub fn get(&self, index: usize) -> Result<i64, RegisterError> {
        self.values
            .get(index)
            .copied()
            .ok_or(RegisterError::OutOfBounds {
                index: index as i64,
                len: self.values.len(),
            })
    }

    /// Write register `index`.
    pub fn set(&mut self, index: usize, value: i64) -> Result<(), RegisterError> {
        let len = self.values.len();
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RegisterError::OutOfBounds {
                index: index as i64,
                len,
            }),
        }
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.values
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, "]")
    }
}

impl From<Vec<i64>> for Registers {
    fn from(values: Vec<i64>) -> Self {
        Self::from_values(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registers_are_zeroed() {
        let regs = Registers::new(6);
        assert_eq!(regs.len(), 6);
        assert_eq!(regs.as_slice(), &[0; 6]);
    }

    #[test]
    fn get_and_set_round_trip() {
        let mut regs = Registers::new(4);
        regs.set(2, -7).unwrap();
        assert_eq!(regs.get(2), Ok(-7));
        assert_eq!(regs.as_slice(), &[0, 0, -7, 0]);
    }

    #[test]
    fn out_of_bounds_access_is_an_error() {
        let mut regs = Registers::new(4);
        assert_eq!(
            regs.get(4),
            Err(RegisterError::OutOfBounds { index: 4, len: 4 })
        );
        assert_eq!(
            regs.set(9, 1),
            Err(RegisterError::OutOfBounds { index: 9, len: 4 })
        );
    }

    #[test]
    fn display_matches_dump_format() {
        let regs = Registers::from_values(vec![3, 2, 1, 1]);
        assert_eq!(regs.to_string(), "[3, 2, 1, 1]");
    }
}
